use crate::core::config::{scenes_path, settings_path, SceneList};
use notify::{EventKind, RecursiveMode, Watcher};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigChange {
    Settings,
    Scenes,
}

/// Watch both config files. Scene-list changes are reloaded into the shared
/// list here (with retries, since editors save non-atomically); the daemon
/// loop is then poked so it can re-apply the current scene.
pub fn start(shared_scenes: Arc<RwLock<SceneList>>) -> mpsc::Receiver<ConfigChange> {
    let (tx, rx) = mpsc::channel::<ConfigChange>(10);
    let scenes_file = scenes_path();
    let settings_file = settings_path();

    std::thread::spawn(move || {
        let reload_path = scenes_file.clone();
        let handler = move |res: Result<notify::Event, notify::Error>| {
            let event = match res {
                Ok(e) => e,
                Err(_) => return,
            };
            if !matches!(event.kind, EventKind::Modify(_)) {
                return;
            }

            let changed_settings = event
                .paths
                .iter()
                .any(|p| p.to_string_lossy().contains("settings.toml"));
            if changed_settings {
                let _ = tx.blocking_send(ConfigChange::Settings);
                return;
            }

            info!(target: "scened::daemon", "Scene file changed, reloading");
            let mut attempts = 0;
            loop {
                attempts += 1;
                match SceneList::load(&reload_path) {
                    Ok(new_list) => match shared_scenes.write() {
                        Ok(mut list) => {
                            info!(
                                target: "scened::daemon",
                                "Scene list reloaded: {} scenes",
                                new_list.scene.len()
                            );
                            *list = new_list;
                            break;
                        }
                        Err(_) => {
                            error!(target: "scened::daemon", "Scene list lock poisoned");
                            return;
                        }
                    },
                    Err(e) if attempts < 3 => {
                        warn!(
                            target: "scened::daemon",
                            "Scene reload attempt {} failed: {:?}, retrying",
                            attempts,
                            e
                        );
                        std::thread::sleep(std::time::Duration::from_secs(2));
                    }
                    Err(e) => {
                        error!(target: "scened::daemon", "Scene reload gave up: {:?}", e);
                        return;
                    }
                }
            }
            let _ = tx.blocking_send(ConfigChange::Scenes);
        };

        let mut watcher = match notify::recommended_watcher(handler) {
            Ok(w) => w,
            Err(e) => {
                error!(target: "scened::daemon", "Failed to create config watcher: {}", e);
                return;
            }
        };

        for path in [&scenes_file, &settings_file] {
            if let Err(e) = watcher.watch(path, RecursiveMode::NonRecursive) {
                error!(target: "scened::daemon", "Failed to watch {:?}: {}", path, e);
                return;
            }
        }

        info!(target: "scened::daemon", "Config file watchers started");
        loop {
            std::thread::sleep(std::time::Duration::from_secs(3600));
        }
    });

    rx
}
