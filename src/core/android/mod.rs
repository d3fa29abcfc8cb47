pub mod foreground;
pub mod freezer;
pub mod location;
pub mod power;
pub mod rotation;
pub mod settings;
