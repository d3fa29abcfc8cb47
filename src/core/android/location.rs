use super::settings::{keys, Namespace, SettingError, SystemSettings};

/// Current provider string, empty when the key is absent.
pub fn providers_allowed(settings: &dyn SystemSettings) -> String {
    settings
        .get(Namespace::Secure, keys::LOCATION_PROVIDERS_ALLOWED)
        .unwrap_or_default()
}

pub fn enable_gps(settings: &dyn SystemSettings) -> Result<(), SettingError> {
    settings.put(Namespace::Secure, keys::LOCATION_PROVIDERS_ALLOWED, "+gps")
}

pub fn disable_gps(settings: &dyn SystemSettings) -> Result<(), SettingError> {
    settings.put(Namespace::Secure, keys::LOCATION_PROVIDERS_ALLOWED, "-gps")
}

/// Turn location off entirely (gps and network).
pub fn disable_location(settings: &dyn SystemSettings) -> Result<(), SettingError> {
    settings.put(Namespace::Secure, keys::LOCATION_PROVIDERS_ALLOWED, "-gps")?;
    settings.put(
        Namespace::Secure,
        keys::LOCATION_PROVIDERS_ALLOWED,
        "-network",
    )
}
