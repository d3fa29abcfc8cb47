use crate::core::android::location;
use crate::core::android::settings::{
    keys, Namespace, SettingError, SystemSettings, BRIGHTNESS_MODE_MANUAL,
};
use tracing::{debug, warn};

/// Brightness backup: captures mode and level together, restores the level
/// only when the pre-override mode was manual (an automatic-mode level is
/// meaningless to replay).
#[derive(Debug, Default)]
pub struct BrightnessBackup {
    saved: Option<(i32, i32)>,
}

impl BrightnessBackup {
    /// Idempotent capture: a second backup without an intervening restore
    /// keeps the original pre-override values.
    pub fn backup(&mut self, settings: &dyn SystemSettings) {
        if self.saved.is_some() {
            return;
        }
        match settings.get_int(Namespace::System, keys::SCREEN_BRIGHTNESS_MODE) {
            Ok(mode) => {
                let level = settings
                    .get_int(Namespace::System, keys::SCREEN_BRIGHTNESS)
                    .unwrap_or(-1);
                self.saved = Some((mode, level));
            }
            Err(e) => debug!(target: "scened::backup", "No brightness to back up: {}", e),
        }
    }

    /// Force manual mode at the given level, skipping writes that would not
    /// change anything.
    pub fn apply(&mut self, settings: &dyn SystemSettings, level: i32) -> Result<(), SettingError> {
        if settings
            .get_int(Namespace::System, keys::SCREEN_BRIGHTNESS_MODE)
            .ok()
            != Some(BRIGHTNESS_MODE_MANUAL)
        {
            settings.put_int(
                Namespace::System,
                keys::SCREEN_BRIGHTNESS_MODE,
                BRIGHTNESS_MODE_MANUAL,
            )?;
            settings.notify(Namespace::System, keys::SCREEN_BRIGHTNESS_MODE);
        }
        if level >= 0
            && settings
                .get_int(Namespace::System, keys::SCREEN_BRIGHTNESS)
                .ok()
                != Some(level)
        {
            settings.put_int(Namespace::System, keys::SCREEN_BRIGHTNESS, level)?;
            settings.notify(Namespace::System, keys::SCREEN_BRIGHTNESS);
        }
        Ok(())
    }

    pub fn restore(&mut self, settings: &dyn SystemSettings) {
        let Some((mode, level)) = self.saved.take() else {
            return;
        };
        match settings.put_int(Namespace::System, keys::SCREEN_BRIGHTNESS_MODE, mode) {
            Ok(()) => settings.notify(Namespace::System, keys::SCREEN_BRIGHTNESS_MODE),
            Err(e) => warn!(target: "scened::backup", "Brightness mode restore failed: {}", e),
        }
        if mode == BRIGHTNESS_MODE_MANUAL && level >= 0 {
            match settings.put_int(Namespace::System, keys::SCREEN_BRIGHTNESS, level) {
                Ok(()) => settings.notify(Namespace::System, keys::SCREEN_BRIGHTNESS),
                Err(e) => warn!(target: "scened::backup", "Brightness restore failed: {}", e),
            }
        }
    }

    pub fn is_held(&self) -> bool {
        self.saved.is_some()
    }
}

/// Location backup: remembers the provider string, and on restore only ever
/// forces providers off that the backup did not have enabled. It never
/// force-enables anything.
#[derive(Debug, Default)]
pub struct LocationBackup {
    saved: Option<String>,
}

impl LocationBackup {
    pub fn backup(&mut self, settings: &dyn SystemSettings) {
        if self.saved.is_some() {
            return;
        }
        match settings.get(Namespace::Secure, keys::LOCATION_PROVIDERS_ALLOWED) {
            Ok(providers) => self.saved = Some(providers),
            Err(e) => debug!(target: "scened::backup", "No location state to back up: {}", e),
        }
    }

    /// Force the GPS provider on, unless it is already allowed.
    pub fn apply(&mut self, settings: &dyn SystemSettings) -> Result<(), SettingError> {
        if !location::providers_allowed(settings).contains("gps") {
            location::enable_gps(settings)?;
        }
        Ok(())
    }

    pub fn restore(&mut self, settings: &dyn SystemSettings) {
        let Some(providers) = self.saved.take() else {
            return;
        };
        if providers.contains("gps") {
            return;
        }
        let result = if providers.contains("network") {
            location::disable_gps(settings)
        } else {
            location::disable_location(settings)
        };
        if let Err(e) = result {
            warn!(target: "scened::backup", "Location restore failed: {}", e);
        }
    }

    pub fn is_held(&self) -> bool {
        self.saved.is_some()
    }
}

/// Heads-up banner backup over the global notification flag.
#[derive(Debug, Default)]
pub struct HeadsUpBackup {
    saved: Option<i32>,
}

impl HeadsUpBackup {
    pub fn backup(&mut self, settings: &dyn SystemSettings) {
        if self.saved.is_some() {
            return;
        }
        match settings.get_int(Namespace::Global, keys::HEADS_UP_NOTIFICATIONS_ENABLED) {
            Ok(v) => self.saved = Some(v),
            Err(e) => debug!(target: "scened::backup", "No heads-up state to back up: {}", e),
        }
    }

    /// Turn banners off if they are currently on.
    pub fn apply(&mut self, settings: &dyn SystemSettings) -> Result<(), SettingError> {
        if settings
            .get_int(Namespace::Global, keys::HEADS_UP_NOTIFICATIONS_ENABLED)
            .ok()
            != Some(0)
        {
            settings.put_int(Namespace::Global, keys::HEADS_UP_NOTIFICATIONS_ENABLED, 0)?;
            settings.notify(Namespace::Global, keys::HEADS_UP_NOTIFICATIONS_ENABLED);
        }
        Ok(())
    }

    pub fn restore(&mut self, settings: &dyn SystemSettings) {
        let Some(v) = self.saved.take() else {
            return;
        };
        match settings.put_int(Namespace::Global, keys::HEADS_UP_NOTIFICATIONS_ENABLED, v) {
            Ok(()) => settings.notify(Namespace::Global, keys::HEADS_UP_NOTIFICATIONS_ENABLED),
            Err(e) => warn!(target: "scened::backup", "Heads-up restore failed: {}", e),
        }
    }

    pub fn is_held(&self) -> bool {
        self.saved.is_some()
    }
}
