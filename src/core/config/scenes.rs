use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenOrientation {
    #[default]
    Unspecified,
    Portrait,
    Landscape,
    ReversePortrait,
    ReverseLandscape,
}

/// One per-app override bundle, keyed by package name.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SceneConfigInfo {
    pub package: String,

    /// Eligible for background freezing.
    #[serde(default)]
    pub freeze: bool,

    /// Force manual brightness at `alone_light_value` while foreground.
    #[serde(default)]
    pub alone_light: bool,
    #[serde(default = "default_light_value")]
    pub alone_light_value: i32,

    /// Force the GPS location provider on while foreground.
    #[serde(default)]
    pub gps_on: bool,

    /// Suppress heads-up notification banners while foreground.
    #[serde(default)]
    pub dis_notice: bool,

    /// Suppress key-press handling while foreground.
    #[serde(default)]
    pub dis_button: bool,

    #[serde(default)]
    pub screen_orientation: ScreenOrientation,
}

impl SceneConfigInfo {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            freeze: false,
            alone_light: false,
            alone_light_value: default_light_value(),
            gps_on: false,
            dis_notice: false,
            dis_button: false,
            screen_orientation: ScreenOrientation::Unspecified,
        }
    }
}

fn default_light_value() -> i32 {
    50
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SceneList {
    #[serde(default)]
    pub scene: Vec<SceneConfigInfo>,
}

impl SceneList {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!(target: "scened::config", "Scene file not found, using empty list");
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;

        toml::from_str(&content).context("Failed to parse scenes.toml")
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        let toml_string = toml::to_string(self).context("Failed to serialize scene list")?;

        let temp_path = path.with_extension("toml.tmp");
        std::fs::write(&temp_path, toml_string).context("Failed to write temporary file")?;

        std::fs::rename(&temp_path, path).context("Failed to rename to final file")?;

        Ok(())
    }

    pub fn find(&self, package: &str) -> Option<&SceneConfigInfo> {
        self.scene.iter().find(|s| s.package == package)
    }

    pub fn upsert(&mut self, info: SceneConfigInfo) {
        if let Some(existing) = self.scene.iter_mut().find(|s| s.package == info.package) {
            *existing = info;
        } else {
            self.scene.push(info);
        }
    }
}

/// Handle over the shared scene list, persisting mutations back to disk.
///
/// Cloneable; the engine and the config watcher see the same list.
#[derive(Clone)]
pub struct SceneStore {
    list: Arc<RwLock<SceneList>>,
    path: PathBuf,
}

impl SceneStore {
    pub fn new(list: Arc<RwLock<SceneList>>, path: PathBuf) -> Self {
        Self { list, path }
    }

    pub fn get_app_config(&self, package: &str) -> Option<SceneConfigInfo> {
        match self.list.read() {
            Ok(list) => list.find(package).cloned(),
            Err(_) => {
                tracing::error!(target: "scened::config", "Scene list lock poisoned");
                None
            }
        }
    }

    pub fn set_app_config(&self, info: SceneConfigInfo) -> Result<()> {
        let mut list = self
            .list
            .write()
            .map_err(|_| anyhow::anyhow!("Scene list lock poisoned"))?;
        list.upsert(info);
        list.save(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_defaults_from_minimal_toml() {
        let list: SceneList = toml::from_str(
            r#"
            [[scene]]
            package = "com.example.game"
            freeze = true
            screen_orientation = "landscape"
            "#,
        )
        .unwrap();

        let scene = list.find("com.example.game").unwrap();
        assert!(scene.freeze);
        assert!(!scene.alone_light);
        assert_eq!(scene.alone_light_value, 50);
        assert_eq!(scene.screen_orientation, ScreenOrientation::Landscape);
        assert!(list.find("com.example.other").is_none());
    }

    #[test]
    fn store_write_back_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenes.toml");

        let mut scene = SceneConfigInfo::new("com.example.reader");
        scene.alone_light = true;
        scene.alone_light_value = 30;

        let list = Arc::new(RwLock::new(SceneList::default()));
        let store = SceneStore::new(list, path.clone());
        store.set_app_config(scene.clone()).unwrap();

        // A user-adjusted brightness is persisted over the old value.
        scene.alone_light_value = 180;
        store.set_app_config(scene.clone()).unwrap();

        let reloaded = SceneList::load(&path).unwrap();
        assert_eq!(reloaded.scene.len(), 1);
        assert_eq!(reloaded.find("com.example.reader").unwrap(), &scene);
    }
}
