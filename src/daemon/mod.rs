pub mod ipc;
pub mod run;
pub mod watcher;
