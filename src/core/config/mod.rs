pub mod scenes;
pub mod settings;

pub use scenes::*;
pub use settings::*;

use std::path::PathBuf;

pub const CONFIG_DIR: &str = "/data/adb/.config/scened";

pub fn settings_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("settings.toml")
}

pub fn scenes_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("scenes.toml")
}

pub fn load_all() -> anyhow::Result<(Settings, SceneList)> {
    let settings = Settings::load(settings_path())?;
    let scenes = SceneList::load(scenes_path())?;
    Ok((settings, scenes))
}
