use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub daemon: DaemonSettings,
    #[serde(default)]
    pub freezer: FreezerSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DaemonSettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FreezerSettings {
    /// Max unfrozen background apps tracked at once. <= 0 disables the bound.
    #[serde(default = "default_item_limit")]
    pub item_limit: i32,

    /// Minutes a backgrounded app may stay unfrozen. <= 0 disables the TTL.
    #[serde(default = "default_time_limit")]
    pub time_limit_mins: i64,

    /// Freeze via `pm suspend` (keeps the launcher icon) instead of `pm disable`.
    #[serde(default = "default_suspend_mode")]
    pub suspend_mode: bool,

    /// 0 means flush the freeze cache as soon as the screen turns off.
    #[serde(default)]
    pub freeze_delay: i64,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl Default for FreezerSettings {
    fn default() -> Self {
        Self {
            item_limit: default_item_limit(),
            time_limit_mins: default_time_limit(),
            suspend_mode: default_suspend_mode(),
            freeze_delay: 0,
        }
    }
}

impl FreezerSettings {
    pub fn time_limit_ms(&self) -> i64 {
        self.time_limit_mins.saturating_mul(60_000)
    }
}

impl Settings {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!(target: "scened::config", "Settings file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read {}", path.display()))?;

        toml::from_str(&content).context("Failed to parse settings.toml")
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_poll_interval() -> u64 {
    1500
}

fn default_item_limit() -> i32 {
    5
}

fn default_time_limit() -> i64 {
    2
}

fn default_suspend_mode() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_tunables() {
        let s = Settings::default();
        assert_eq!(s.freezer.item_limit, 5);
        assert_eq!(s.freezer.time_limit_mins, 2);
        assert_eq!(s.freezer.time_limit_ms(), 120_000);
        assert!(s.freezer.suspend_mode);
        assert_eq!(s.freezer.freeze_delay, 0);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let s: Settings = toml::from_str(
            r#"
            [freezer]
            item_limit = 3
            suspend_mode = false
            "#,
        )
        .unwrap();
        assert_eq!(s.freezer.item_limit, 3);
        assert!(!s.freezer.suspend_mode);
        assert_eq!(s.freezer.time_limit_mins, 2);
        assert_eq!(s.daemon.log_level, "info");
    }
}
