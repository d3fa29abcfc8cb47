pub mod android;
pub mod cmd;
pub mod config;
pub mod scene;
