pub mod backup;
pub mod cache;
pub mod engine;

pub use engine::SceneMode;
