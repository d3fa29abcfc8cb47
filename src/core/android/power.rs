use crate::core::cmd::run_async;

const DUMPSYS_BIN: &str = "/system/bin/dumpsys";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerState {
    pub screen_awake: bool,
}

impl Default for PowerState {
    fn default() -> Self {
        // Assume awake when the dump is unreadable; a false "asleep" would
        // flush the freeze cache under the user's feet.
        Self { screen_awake: true }
    }
}

impl PowerState {
    pub async fn fetch() -> PowerState {
        let out = match run_async(DUMPSYS_BIN, &["power"], 1500).await {
            Ok(o) => o,
            Err(e) => {
                tracing::debug!(target: "scened::dumpsys", "dumpsys power timeout: {:?}", e);
                return PowerState::default();
            }
        };

        Self::parse(&String::from_utf8_lossy(&out.stdout))
    }

    fn parse(dump: &str) -> PowerState {
        // Field names differ across Android releases; accept any of them.
        let screen_awake = dump.contains("mWakefulness=Awake")
            || dump.contains("mAwake=true")
            || dump.contains("mInteractive=true")
            || dump.contains("mScreenOn=true");

        PowerState { screen_awake }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_awake_variants() {
        assert!(PowerState::parse("POWER MANAGER\n  mWakefulness=Awake\n").screen_awake);
        assert!(PowerState::parse("mInteractive=true").screen_awake);
        assert!(!PowerState::parse("POWER MANAGER\n  mWakefulness=Asleep\n").screen_awake);
    }
}
