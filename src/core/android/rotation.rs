use super::settings::{keys, Namespace, SystemSettings};
use crate::core::config::ScreenOrientation;
use std::sync::Arc;

/// Forced-orientation collaborator. `update(Unspecified)` is equivalent to
/// `remove`: the user's auto-rotate preference prevails again.
pub trait RotationOverride: Send {
    fn update(&mut self, orientation: ScreenOrientation);
    fn remove(&mut self);
}

/// Implementation over the rotation settings keys: pins `user_rotation` to
/// the requested surface rotation with auto-rotate off, and hands rotation
/// back to the accelerometer on removal.
pub struct ShellRotation {
    settings: Arc<dyn SystemSettings>,
    forced: bool,
}

impl ShellRotation {
    pub fn new(settings: Arc<dyn SystemSettings>) -> Self {
        Self {
            settings,
            forced: false,
        }
    }
}

fn surface_rotation(orientation: ScreenOrientation) -> Option<i32> {
    match orientation {
        ScreenOrientation::Unspecified => None,
        ScreenOrientation::Portrait => Some(0),
        ScreenOrientation::Landscape => Some(1),
        ScreenOrientation::ReversePortrait => Some(2),
        ScreenOrientation::ReverseLandscape => Some(3),
    }
}

impl RotationOverride for ShellRotation {
    fn update(&mut self, orientation: ScreenOrientation) {
        let Some(rotation) = surface_rotation(orientation) else {
            self.remove();
            return;
        };

        let s = self.settings.as_ref();
        if let Err(e) = s.put_int(Namespace::System, keys::ACCELEROMETER_ROTATION, 0) {
            tracing::warn!(target: "scened::rotation", "Failed to disable auto-rotate: {}", e);
            return;
        }
        match s.put_int(Namespace::System, keys::USER_ROTATION, rotation) {
            Ok(()) => {
                s.notify(Namespace::System, keys::USER_ROTATION);
                self.forced = true;
            }
            Err(e) => {
                tracing::warn!(target: "scened::rotation", "Failed to pin rotation: {}", e);
            }
        }
    }

    fn remove(&mut self) {
        if !self.forced {
            return;
        }
        let s = self.settings.as_ref();
        match s.put_int(Namespace::System, keys::ACCELEROMETER_ROTATION, 1) {
            Ok(()) => {
                s.notify(Namespace::System, keys::ACCELEROMETER_ROTATION);
                self.forced = false;
            }
            Err(e) => {
                tracing::warn!(target: "scened::rotation", "Failed to restore auto-rotate: {}", e);
            }
        }
    }
}
