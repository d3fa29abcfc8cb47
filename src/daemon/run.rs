use crate::core::android::settings::{ShellSettings, SystemSettings};
use crate::core::android::{foreground, freezer, power::PowerState, rotation::ShellRotation};
use crate::core::config::{self, SceneList, SceneStore, Settings};
use crate::core::scene::engine::{self, SceneMode};
use crate::daemon::ipc::{self, CtlCommand, CtlRequest};
use crate::daemon::watcher::{self, ConfigChange};
use anyhow::Result;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::{signal, time};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

const SOCKET_PATH: &str = "/dev/socket/scened.sock";
const SCREEN_OFF_INTERVAL_MS: u64 = 10_000;

pub type ReloadHandle =
    tracing_subscriber::reload::Handle<EnvFilter, tracing_subscriber::Registry>;

pub struct Daemon {
    shared_settings: Arc<RwLock<Settings>>,
    shared_scenes: Arc<RwLock<SceneList>>,
    engine: SceneMode,

    screen_awake: Option<bool>,
    last_error: Option<(String, u64)>,
    error_debounce_ms: u64,
    tick_count: u64,
}

impl Daemon {
    pub fn new(settings: Settings, scenes: SceneList) -> Self {
        let shared_settings = Arc::new(RwLock::new(settings));
        let shared_scenes = Arc::new(RwLock::new(scenes));

        let sys: Arc<dyn SystemSettings> = Arc::new(ShellSettings);
        let store = SceneStore::new(shared_scenes.clone(), config::scenes_path());
        let rotation = Box::new(ShellRotation::new(sys.clone()));
        let jobs = freezer::spawn_worker();

        let engine = SceneMode::new(sys, store, shared_settings.clone(), rotation, jobs);

        Self {
            shared_settings,
            shared_scenes,
            engine,
            screen_awake: None,
            last_error: None,
            error_debounce_ms: 30_000,
            tick_count: 0,
        }
    }

    fn poll_interval_ms(&self) -> u64 {
        if self.screen_awake == Some(false) {
            return SCREEN_OFF_INTERVAL_MS;
        }
        self.shared_settings
            .read()
            .map(|s| s.daemon.poll_interval_ms)
            .unwrap_or(1500)
    }

    async fn tick(&mut self) {
        self.tick_count = self.tick_count.wrapping_add(1);
        debug!(target: "scened::daemon", "Tick #{}", self.tick_count);

        if let Err(e) = self.process_tick().await {
            let err_msg = e.to_string();
            let now = engine::now_ms();

            let should_log = match &self.last_error {
                None => true,
                Some((last_msg, last_time)) => {
                    err_msg != *last_msg
                        || now.saturating_sub(*last_time) >= self.error_debounce_ms
                }
            };

            if should_log {
                error!(target: "scened::daemon", "Tick error: {:?}", e);
                self.last_error = Some((err_msg, now));
            } else {
                debug!(target: "scened::daemon", "Tick error suppressed: {:?}", e);
            }
        }
    }

    async fn process_tick(&mut self) -> Result<()> {
        let power = PowerState::fetch().await;
        let was_awake = self.screen_awake;
        self.screen_awake = Some(power.screen_awake);

        if !power.screen_awake {
            if was_awake != Some(false) {
                info!(target: "scened::daemon", "Screen off");
                self.engine.on_screen_off();
                self.engine.on_screen_off_delay();
            }
            return Ok(());
        }
        if was_awake == Some(false) {
            info!(target: "scened::daemon", "Screen on");
            self.engine.on_screen_on();
        }

        if let Some(pkg) = foreground::foreground_package().await? {
            self.engine.on_app_enter(&pkg, false);
        }

        // The periodic trigger for TTL eviction.
        self.engine.enforce_freeze_time_limit(engine::now_ms());
        Ok(())
    }

    fn reload_settings(&mut self) {
        match Settings::load(config::settings_path()) {
            Ok(new_settings) => {
                if let Ok(mut s) = self.shared_settings.write() {
                    *s = new_settings;
                }
                info!(target: "scened::daemon", "Settings reloaded");
                // Tunables feed the active scene too (freeze method, limits).
                self.engine.update_app_config();
            }
            Err(e) => {
                error!(target: "scened::daemon", "Failed to reload settings: {:?}", e);
            }
        }
    }

    fn handle_ctl(&mut self, req: CtlRequest) {
        let response = match req.cmd {
            CtlCommand::Status => {
                let scene = self
                    .engine
                    .current_scene()
                    .map(|s| s.package.clone())
                    .unwrap_or_else(|| "none".to_string());
                format!(
                    "foreground: {}\nscene: {}\ntracked: {}\nscreen_awake: {}",
                    self.engine.last_foreground(),
                    scene,
                    self.engine.tracked_count(),
                    self.screen_awake.unwrap_or(true)
                )
            }
            CtlCommand::List => {
                let tracked = self.engine.tracked_packages();
                if tracked.is_empty() {
                    "no tracked apps".to_string()
                } else {
                    tracked.join("\n")
                }
            }
            CtlCommand::Flush => {
                self.engine.flush_freeze_cache();
                "flushed".to_string()
            }
            CtlCommand::Reload => match SceneList::load(config::scenes_path()) {
                Ok(new_list) => {
                    let count = new_list.scene.len();
                    if let Ok(mut list) = self.shared_scenes.write() {
                        *list = new_list;
                    }
                    self.engine.update_app_config();
                    format!("reloaded {} scenes", count)
                }
                Err(e) => format!("reload failed: {:#}", e),
            },
            CtlCommand::Unfreeze(pkg) => {
                self.engine.note_unfrozen(&pkg);
                tokio::spawn(async move {
                    freezer::unfreeze_app(&pkg).await;
                });
                "ok".to_string()
            }
        };
        let _ = req.reply.send(response);
    }
}

pub async fn run_with_config(
    settings: Settings,
    scenes: SceneList,
    filter_handle: ReloadHandle,
) -> Result<()> {
    let mut daemon = Daemon::new(settings, scenes);

    let (ctl_tx, mut ctl_rx) = mpsc::channel::<CtlRequest>(8);
    let log_handle = filter_handle.clone();
    let set_log_level: ipc::SetLogLevel = Arc::new(move |level: &str| {
        if !matches!(level, "trace" | "debug" | "info" | "warn" | "error") {
            return false;
        }
        log_handle.reload(EnvFilter::new(level)).is_ok()
    });

    tokio::spawn(async move {
        match ipc::start(SOCKET_PATH, ctl_tx, set_log_level).await {
            Ok(()) => info!(target: "scened::daemon", "IPC listener stopped"),
            Err(e) => error!(target: "scened::daemon", "IPC error: {:?}", e),
        }
    });

    let mut watch_rx = watcher::start(daemon.shared_scenes.clone());

    daemon.tick().await;

    loop {
        let sleep_ms = daemon.poll_interval_ms();

        tokio::select! {
            _ = time::sleep(Duration::from_millis(sleep_ms)) => {
                daemon.tick().await;
            }
            Some(change) = watch_rx.recv() => {
                match change {
                    ConfigChange::Settings => daemon.reload_settings(),
                    ConfigChange::Scenes => {
                        // Watcher already swapped the shared list.
                        daemon.engine.update_app_config();
                    }
                }
            }
            Some(req) = ctl_rx.recv() => {
                daemon.handle_ctl(req);
            }
            _ = signal::ctrl_c() => {
                info!(target: "scened::daemon", "Received Ctrl-C, shutting down");
                break;
            }
        }
    }

    // Leave the device the way we found it.
    daemon.engine.clear_state();
    info!(target: "scened::daemon", "Stopped");
    Ok(())
}
