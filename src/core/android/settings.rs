use crate::core::cmd::run_sync_stdout;
use thiserror::Error;

const SETTINGS_BIN: &str = "/system/bin/settings";
const SETTINGS_TIMEOUT_MS: u64 = 1500;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingError {
    #[error("setting {0} not found")]
    NotFound(String),
    #[error("write rejected for setting {0}")]
    WriteFailed(String),
    #[error("settings shell failed: {0}")]
    Shell(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    System,
    Secure,
    Global,
}

impl Namespace {
    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::System => "system",
            Namespace::Secure => "secure",
            Namespace::Global => "global",
        }
    }
}

/// System-settings accessor boundary. The production implementation shells
/// out to the platform `settings` binary; tests substitute an in-memory map.
pub trait SystemSettings: Send + Sync {
    fn get(&self, ns: Namespace, key: &str) -> Result<String, SettingError>;

    fn put(&self, ns: Namespace, key: &str, value: &str) -> Result<(), SettingError>;

    /// Best-effort change notification. Failures are not reported.
    fn notify(&self, _ns: Namespace, _key: &str) {}

    fn get_int(&self, ns: Namespace, key: &str) -> Result<i32, SettingError> {
        let raw = self.get(ns, key)?;
        raw.trim()
            .parse()
            .map_err(|_| SettingError::NotFound(key.to_string()))
    }

    fn put_int(&self, ns: Namespace, key: &str, value: i32) -> Result<(), SettingError> {
        self.put(ns, key, &value.to_string())
    }
}

/// Accessor backed by the `settings get|put` shell interface.
#[derive(Debug, Default)]
pub struct ShellSettings;

impl SystemSettings for ShellSettings {
    fn get(&self, ns: Namespace, key: &str) -> Result<String, SettingError> {
        let out = run_sync_stdout(
            SETTINGS_BIN,
            &["get", ns.as_str(), key],
            SETTINGS_TIMEOUT_MS,
        )
        .map_err(|e| SettingError::Shell(format!("{:#}", e)))?;

        // `settings get` prints the literal string "null" for absent keys.
        if out.is_empty() || out == "null" {
            return Err(SettingError::NotFound(key.to_string()));
        }
        Ok(out)
    }

    fn put(&self, ns: Namespace, key: &str, value: &str) -> Result<(), SettingError> {
        run_sync_stdout(
            SETTINGS_BIN,
            &["put", ns.as_str(), key, value],
            SETTINGS_TIMEOUT_MS,
        )
        .map(|_| ())
        .map_err(|_| SettingError::WriteFailed(key.to_string()))
    }

    fn notify(&self, ns: Namespace, key: &str) {
        // `settings put` already broadcasts a content-observer change; nothing
        // further to do beyond tracing the intent.
        tracing::trace!(target: "scened::settings", "notify {}/{}", ns.as_str(), key);
    }
}

pub mod keys {
    pub const SCREEN_BRIGHTNESS: &str = "screen_brightness";
    pub const SCREEN_BRIGHTNESS_MODE: &str = "screen_brightness_mode";
    pub const LOCATION_PROVIDERS_ALLOWED: &str = "location_providers_allowed";
    pub const HEADS_UP_NOTIFICATIONS_ENABLED: &str = "heads_up_notifications_enabled";
    pub const ACCELEROMETER_ROTATION: &str = "accelerometer_rotation";
    pub const USER_ROTATION: &str = "user_rotation";
}

pub const BRIGHTNESS_MODE_MANUAL: i32 = 0;

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory accessor: a seeded key/value map plus a write log, with
    /// optional per-key write failure injection.
    #[derive(Debug, Default)]
    pub struct MemSettings {
        values: Mutex<HashMap<(Namespace, String), String>>,
        writes: Mutex<Vec<(Namespace, String, String)>>,
        failing: Mutex<Vec<String>>,
    }

    impl MemSettings {
        pub fn seed(&self, ns: Namespace, key: &str, value: &str) {
            self.values
                .lock()
                .unwrap()
                .insert((ns, key.to_string()), value.to_string());
        }

        pub fn value(&self, ns: Namespace, key: &str) -> Option<String> {
            self.values.lock().unwrap().get(&(ns, key.to_string())).cloned()
        }

        pub fn writes(&self) -> Vec<(Namespace, String, String)> {
            self.writes.lock().unwrap().clone()
        }

        pub fn clear_writes(&self) {
            self.writes.lock().unwrap().clear();
        }

        pub fn fail_writes_to(&self, key: &str) {
            self.failing.lock().unwrap().push(key.to_string());
        }
    }

    impl SystemSettings for MemSettings {
        fn get(&self, ns: Namespace, key: &str) -> Result<String, SettingError> {
            self.value(ns, key)
                .ok_or_else(|| SettingError::NotFound(key.to_string()))
        }

        fn put(&self, ns: Namespace, key: &str, value: &str) -> Result<(), SettingError> {
            if self.failing.lock().unwrap().iter().any(|k| k == key) {
                return Err(SettingError::WriteFailed(key.to_string()));
            }
            self.writes
                .lock()
                .unwrap()
                .push((ns, key.to_string(), value.to_string()));
            self.seed(ns, key, value);
            Ok(())
        }
    }
}
