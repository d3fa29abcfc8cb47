use crate::core::android::freezer::{FreezeJob, FreezeMethod};
use crate::core::android::rotation::RotationOverride;
use crate::core::android::settings::{keys, Namespace, SystemSettings};
use crate::core::config::{
    FreezerSettings, SceneConfigInfo, SceneStore, ScreenOrientation, Settings,
};
use crate::core::scene::backup::{BrightnessBackup, HeadsUpBackup, LocationBackup};
use crate::core::scene::cache::{FreezeCache, FreezeEntry};
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Neutral app recorded as "foreground" when no real app is: the first real
/// transition always runs, and the shell itself never gets a scene.
pub const BASELINE_PACKAGE: &str = "com.android.systemui";

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_else(|_| {
            warn!(target: "scened::scene", "System clock before epoch, using 0");
            0
        })
}

/// The foreground-transition state machine.
///
/// One explicitly-constructed instance, owned by the daemon loop; the
/// foreground poller, the eviction tick and the control channel all mutate
/// it from that single task. Freeze commands are never executed here, only
/// queued to the worker.
pub struct SceneMode {
    settings: Arc<dyn SystemSettings>,
    store: SceneStore,
    tunables: Arc<RwLock<Settings>>,
    rotation: Box<dyn RotationOverride>,
    jobs: mpsc::UnboundedSender<FreezeJob>,

    cache: FreezeCache,
    brightness: BrightnessBackup,
    location: LocationBackup,
    heads_up: HeadsUpBackup,

    current: Option<SceneConfigInfo>,
    last_foreground: String,
}

impl SceneMode {
    pub fn new(
        settings: Arc<dyn SystemSettings>,
        store: SceneStore,
        tunables: Arc<RwLock<Settings>>,
        rotation: Box<dyn RotationOverride>,
        jobs: mpsc::UnboundedSender<FreezeJob>,
    ) -> Self {
        Self {
            settings,
            store,
            tunables,
            rotation,
            jobs,
            cache: FreezeCache::default(),
            brightness: BrightnessBackup::default(),
            location: LocationBackup::default(),
            heads_up: HeadsUpBackup::default(),
            current: None,
            last_foreground: BASELINE_PACKAGE.to_string(),
        }
    }

    fn freezer_settings(&self) -> FreezerSettings {
        self.tunables
            .read()
            .map(|s| s.freezer.clone())
            .unwrap_or_default()
    }

    fn freeze_method(freezer: &FreezerSettings) -> FreezeMethod {
        if freezer.suspend_mode {
            FreezeMethod::Suspend
        } else {
            FreezeMethod::Disable
        }
    }

    /// Foreground changed to `package`. Applies the new scene's overrides
    /// and unwinds whatever the previous scene forced. Each override is
    /// applied independently: one failing write never blocks the others,
    /// the orientation update, or the foreground bookkeeping.
    pub fn on_app_enter(&mut self, package: &str, force: bool) {
        if self.last_foreground == package && !force {
            return;
        }
        debug!(target: "scened::scene", "Foreground: {} -> {}", self.last_foreground, package);

        if let Some(previous) = self.current.take() {
            self.on_app_leave(&previous);
        }

        self.current = self.store.get_app_config(package);
        let s = self.settings.clone();
        let s = s.as_ref();

        match self.current.clone() {
            None => {
                self.location.restore(s);
                self.brightness.restore(s);
                self.heads_up.restore(s);
            }
            Some(scene) => {
                let mut failed: Vec<String> = Vec::new();

                if scene.alone_light {
                    self.brightness.backup(s);
                    if let Err(e) = self.brightness.apply(s, scene.alone_light_value) {
                        failed.push(format!("brightness: {}", e));
                    }
                } else {
                    self.brightness.restore(s);
                }

                if scene.gps_on {
                    self.location.backup(s);
                    if let Err(e) = self.location.apply(s) {
                        failed.push(format!("location: {}", e));
                    }
                } else {
                    self.location.restore(s);
                }

                if scene.dis_notice {
                    self.heads_up.backup(s);
                    if let Err(e) = self.heads_up.apply(s) {
                        failed.push(format!("heads-up: {}", e));
                    }
                } else {
                    self.heads_up.restore(s);
                }

                if scene.freeze {
                    // Exempt from eviction while foreground.
                    self.cache.record_foreground(package, now_ms());
                }

                if !failed.is_empty() {
                    warn!(
                        target: "scened::scene",
                        "Overrides partially failed for {}: {}",
                        package,
                        failed.join("; ")
                    );
                }
            }
        }

        match &self.current {
            Some(scene) => self.rotation.update(scene.screen_orientation),
            None => self.rotation.remove(),
        }

        self.last_foreground = package.to_string();
    }

    fn on_app_leave(&mut self, scene: &SceneConfigInfo) {
        if scene.freeze {
            self.cache.record_background(&scene.package, now_ms());
            let freezer = self.freezer_settings();
            let evicted = self.cache.enforce_count_limit(freezer.item_limit);
            self.dispatch_freeze(evicted, Self::freeze_method(&freezer));
        }

        if scene.alone_light {
            // The user may have adjusted brightness while inside the app;
            // carry the new value over to the next visit.
            match self.settings.get_int(Namespace::System, keys::SCREEN_BRIGHTNESS) {
                Ok(light) if light != scene.alone_light_value => {
                    let mut updated = scene.clone();
                    updated.alone_light_value = light;
                    debug!(
                        target: "scened::scene",
                        "Saving adjusted brightness {} for {}",
                        light,
                        updated.package
                    );
                    if let Err(e) = self.store.set_app_config(updated) {
                        warn!(target: "scened::scene", "Brightness write-back failed: {:#}", e);
                    }
                }
                _ => {}
            }
        }
    }

    fn dispatch_freeze(&self, entries: Vec<FreezeEntry>, method: FreezeMethod) {
        for entry in entries {
            info!(target: "scened::scene", "Evicting {} from freeze cache", entry.package);
            if self
                .jobs
                .send(FreezeJob {
                    package: entry.package,
                    method,
                })
                .is_err()
            {
                warn!(target: "scened::scene", "Freeze worker gone, dropping job");
            }
        }
    }

    /// Periodic TTL sweep; the daemon invokes this every tick.
    pub fn enforce_freeze_time_limit(&mut self, now_ms: u64) {
        let freezer = self.freezer_settings();
        let evicted =
            self.cache
                .enforce_time_limit(now_ms, freezer.time_limit_ms(), &self.last_foreground);
        self.dispatch_freeze(evicted, Self::freeze_method(&freezer));
    }

    /// Freeze everything tracked, re-checking each package's current
    /// `freeze` flag first: configuration may have changed since the entry
    /// was recorded.
    pub fn flush_freeze_cache(&mut self) {
        let freezer = self.freezer_settings();
        let method = Self::freeze_method(&freezer);
        let entries = self.cache.drain_all();
        let eligible = entries
            .into_iter()
            .filter(|e| {
                self.store
                    .get_app_config(&e.package)
                    .map(|c| c.freeze)
                    .unwrap_or(false)
            })
            .collect();
        self.dispatch_freeze(eligible, method);
    }

    /// An app was unfrozen externally: track it afresh so the count bound
    /// applies to it again.
    pub fn note_unfrozen(&mut self, package: &str) {
        self.cache.record_foreground(package, now_ms());
        let freezer = self.freezer_settings();
        let evicted = self.cache.enforce_count_limit(freezer.item_limit);
        self.dispatch_freeze(evicted, Self::freeze_method(&freezer));
    }

    /// Re-apply the current foreground app's scene after a tunable or
    /// scene-list change.
    pub fn update_app_config(&mut self) {
        let package = self.last_foreground.clone();
        self.on_app_enter(&package, true);
    }

    /// Back to baseline: restore every backup, drop the orientation
    /// override, forget the active scene.
    pub fn clear_state(&mut self) {
        self.last_foreground = BASELINE_PACKAGE.to_string();
        let s = self.settings.clone();
        self.location.restore(s.as_ref());
        self.brightness.restore(s.as_ref());
        self.heads_up.restore(s.as_ref());
        self.current = None;
        self.rotation.remove();
    }

    pub fn on_screen_on(&mut self) {
        let orientation = self.current.as_ref().map(|s| s.screen_orientation);
        if let Some(orientation) = orientation {
            self.rotation.update(orientation);
        }
    }

    /// While the screen is off the forced orientation must not interfere.
    pub fn on_screen_off(&mut self) {
        self.rotation.update(ScreenOrientation::Unspecified);
    }

    /// Screen-off grace expired: without a configured freeze delay, no
    /// eligible app survives into the sleep cycle.
    pub fn on_screen_off_delay(&mut self) {
        if self.freezer_settings().freeze_delay < 1 {
            self.flush_freeze_cache();
        }
    }

    pub fn should_block_notification(&self) -> bool {
        self.current.as_ref().map(|s| s.dis_notice).unwrap_or(false)
    }

    pub fn should_block_key(&self) -> bool {
        self.current.as_ref().map(|s| s.dis_button).unwrap_or(false)
    }

    pub fn last_foreground(&self) -> &str {
        &self.last_foreground
    }

    pub fn current_scene(&self) -> Option<&SceneConfigInfo> {
        self.current.as_ref()
    }

    pub fn tracked_packages(&self) -> Vec<String> {
        self.cache.packages()
    }

    pub fn tracked_count(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::android::settings::testing::MemSettings;
    use crate::core::config::SceneList;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRotation(Arc<Mutex<Option<ScreenOrientation>>>);

    impl RotationOverride for RecordingRotation {
        fn update(&mut self, orientation: ScreenOrientation) {
            *self.0.lock().unwrap() = Some(orientation);
        }
        fn remove(&mut self) {
            *self.0.lock().unwrap() = None;
        }
    }

    struct Harness {
        mem: Arc<MemSettings>,
        engine: SceneMode,
        jobs: mpsc::UnboundedReceiver<FreezeJob>,
        rotation: Arc<Mutex<Option<ScreenOrientation>>>,
        store: SceneStore,
        _dir: tempfile::TempDir,
    }

    fn harness(scenes: Vec<SceneConfigInfo>, freezer: FreezerSettings) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let mem = Arc::new(MemSettings::default());
        mem.seed(Namespace::System, keys::SCREEN_BRIGHTNESS_MODE, "1");
        mem.seed(Namespace::System, keys::SCREEN_BRIGHTNESS, "100");
        mem.seed(Namespace::Global, keys::HEADS_UP_NOTIFICATIONS_ENABLED, "1");
        mem.seed(Namespace::Secure, keys::LOCATION_PROVIDERS_ALLOWED, "network");

        let list = Arc::new(RwLock::new(SceneList { scene: scenes }));
        let store = SceneStore::new(list, dir.path().join("scenes.toml"));
        let tunables = Arc::new(RwLock::new(Settings {
            freezer,
            ..Default::default()
        }));
        let (tx, rx) = mpsc::unbounded_channel();
        let rotation = Arc::new(Mutex::new(None));

        let engine = SceneMode::new(
            mem.clone(),
            store.clone(),
            tunables,
            Box::new(RecordingRotation(rotation.clone())),
            tx,
        );

        Harness {
            mem,
            engine,
            jobs: rx,
            rotation,
            store,
            _dir: dir,
        }
    }

    fn freeze_scene(package: &str) -> SceneConfigInfo {
        let mut scene = SceneConfigInfo::new(package);
        scene.freeze = true;
        scene
    }

    #[test]
    fn repeated_enter_without_force_is_a_no_op() {
        let mut scene = SceneConfigInfo::new("com.example.game");
        scene.alone_light = true;
        scene.alone_light_value = 40;
        let mut h = harness(vec![scene], FreezerSettings::default());

        h.engine.on_app_enter("com.example.game", false);
        assert_eq!(
            h.mem.get_int(Namespace::System, keys::SCREEN_BRIGHTNESS),
            Ok(40)
        );

        h.mem.clear_writes();
        h.engine.on_app_enter("com.example.game", false);
        assert!(h.mem.writes().is_empty());
        assert_eq!(h.engine.last_foreground(), "com.example.game");
    }

    #[test]
    fn unconfigured_round_trip_touches_nothing() {
        let mut h = harness(vec![], FreezerSettings::default());

        h.engine.on_app_enter("com.example.a", false);
        h.engine.on_app_enter("com.example.b", false);
        h.engine.on_app_enter("com.example.a", false);

        assert!(h.mem.writes().is_empty());
        assert_eq!(h.engine.last_foreground(), "com.example.a");
        assert_eq!(h.engine.tracked_count(), 0);
    }

    #[test]
    fn override_round_trip_restores_baseline() {
        let mut a = SceneConfigInfo::new("com.example.a");
        a.alone_light = true;
        a.alone_light_value = 10;
        a.gps_on = true;
        a.dis_notice = true;

        let mut h = harness(vec![a], FreezerSettings::default());
        // Manual-mode baseline so the level restore path is exercised too.
        h.mem.seed(Namespace::System, keys::SCREEN_BRIGHTNESS_MODE, "0");

        h.engine.on_app_enter("com.example.a", false);
        assert_eq!(
            h.mem.get_int(Namespace::System, keys::SCREEN_BRIGHTNESS),
            Ok(10)
        );
        assert_eq!(
            h.mem.get_int(Namespace::Global, keys::HEADS_UP_NOTIFICATIONS_ENABLED),
            Ok(0)
        );

        // Entering an unconfigured app unwinds every override.
        h.engine.on_app_enter("com.example.plain", false);
        assert_eq!(
            h.mem.get_int(Namespace::System, keys::SCREEN_BRIGHTNESS_MODE),
            Ok(0)
        );
        assert_eq!(
            h.mem.get_int(Namespace::System, keys::SCREEN_BRIGHTNESS),
            Ok(100)
        );
        assert_eq!(
            h.mem.get_int(Namespace::Global, keys::HEADS_UP_NOTIFICATIONS_ENABLED),
            Ok(1)
        );
        assert!(!h.engine.brightness.is_held());
        assert!(!h.engine.heads_up.is_held());
        assert!(!h.engine.location.is_held());
    }

    #[test]
    fn count_limit_evicts_oldest_background_app() {
        let scenes = vec![
            freeze_scene("com.app.a"),
            freeze_scene("com.app.b"),
            freeze_scene("com.app.c"),
            freeze_scene("com.app.d"),
        ];
        let freezer = FreezerSettings {
            item_limit: 2,
            ..Default::default()
        };
        let mut h = harness(scenes, freezer);

        h.engine.on_app_enter("com.app.a", false);
        h.engine.on_app_enter("com.app.b", false);
        h.engine.on_app_enter("com.app.c", false);
        // Leaving c pushes tracked count to 3; a is the oldest touch.
        h.engine.on_app_enter("com.app.d", false);

        let job = h.jobs.try_recv().unwrap();
        assert_eq!(job.package, "com.app.a");
        assert_eq!(job.method, FreezeMethod::Suspend);
    }

    #[test]
    fn disable_method_used_when_suspend_mode_off() {
        let freezer = FreezerSettings {
            item_limit: 1,
            suspend_mode: false,
            ..Default::default()
        };
        let mut h = harness(
            vec![
                freeze_scene("com.app.a"),
                freeze_scene("com.app.b"),
                freeze_scene("com.app.c"),
            ],
            freezer,
        );

        h.engine.on_app_enter("com.app.a", false);
        h.engine.on_app_enter("com.app.b", false);
        h.engine.on_app_enter("com.app.c", false);

        let job = h.jobs.try_recv().unwrap();
        assert_eq!(job.package, "com.app.a");
        assert_eq!(job.method, FreezeMethod::Disable);
    }

    #[test]
    fn ttl_sweep_freezes_expired_apps_only() {
        let mut h = harness(vec![freeze_scene("com.app.a")], FreezerSettings::default());

        h.engine.on_app_enter("com.app.a", false);
        let left_at = now_ms();
        h.engine.on_app_enter("com.example.plain", false);

        // One minute later: inside the two-minute TTL.
        h.engine.enforce_freeze_time_limit(left_at + 60_000);
        assert!(h.jobs.try_recv().is_err());
        assert_eq!(h.engine.tracked_count(), 1);

        // Three minutes later: past it.
        h.engine.enforce_freeze_time_limit(left_at + 180_000);
        let job = h.jobs.try_recv().unwrap();
        assert_eq!(job.package, "com.app.a");
        assert_eq!(h.engine.tracked_count(), 0);
    }

    #[test]
    fn flush_rechecks_store_flag() {
        let mut h = harness(
            vec![freeze_scene("com.app.a"), freeze_scene("com.app.b")],
            FreezerSettings::default(),
        );

        h.engine.on_app_enter("com.app.a", false);
        h.engine.on_app_enter("com.app.b", false);

        // a's freeze flag is withdrawn after it was tracked.
        let mut a = h.store.get_app_config("com.app.a").unwrap();
        a.freeze = false;
        h.store.set_app_config(a).unwrap();

        h.engine.flush_freeze_cache();
        let job = h.jobs.try_recv().unwrap();
        assert_eq!(job.package, "com.app.b");
        assert!(h.jobs.try_recv().is_err());
        assert_eq!(h.engine.tracked_count(), 0);
    }

    #[test]
    fn screen_off_without_delay_flushes() {
        let mut h = harness(
            vec![freeze_scene("com.app.a")],
            FreezerSettings::default(),
        );
        h.engine.on_app_enter("com.app.a", false);
        h.engine.on_app_enter("com.example.plain", false);

        h.engine.on_screen_off();
        h.engine.on_screen_off_delay();
        let job = h.jobs.try_recv().unwrap();
        assert_eq!(job.package, "com.app.a");
    }

    #[test]
    fn configured_freeze_delay_skips_screen_off_flush() {
        let freezer = FreezerSettings {
            freeze_delay: 1,
            ..Default::default()
        };
        let mut h = harness(vec![freeze_scene("com.app.a")], freezer);
        h.engine.on_app_enter("com.app.a", false);
        h.engine.on_app_enter("com.example.plain", false);

        h.engine.on_screen_off_delay();
        assert!(h.jobs.try_recv().is_err());
        assert_eq!(h.engine.tracked_count(), 1);
    }

    #[test]
    fn adjusted_brightness_is_written_back_on_leave() {
        let mut scene = SceneConfigInfo::new("com.example.reader");
        scene.alone_light = true;
        scene.alone_light_value = 40;
        let mut h = harness(vec![scene], FreezerSettings::default());

        h.engine.on_app_enter("com.example.reader", false);
        // User nudges brightness while inside the app.
        h.mem.seed(Namespace::System, keys::SCREEN_BRIGHTNESS, "85");
        h.engine.on_app_enter("com.example.plain", false);

        let stored = h.store.get_app_config("com.example.reader").unwrap();
        assert_eq!(stored.alone_light_value, 85);
    }

    #[test]
    fn one_failing_override_does_not_block_the_rest() {
        let mut scene = SceneConfigInfo::new("com.example.game");
        scene.alone_light = true;
        scene.alone_light_value = 40;
        scene.dis_notice = true;
        scene.screen_orientation = ScreenOrientation::Landscape;
        let mut h = harness(vec![scene], FreezerSettings::default());

        h.mem.fail_writes_to(keys::SCREEN_BRIGHTNESS_MODE);
        h.engine.on_app_enter("com.example.game", false);

        // Brightness failed, heads-up and orientation still went through.
        assert_eq!(
            h.mem.get_int(Namespace::Global, keys::HEADS_UP_NOTIFICATIONS_ENABLED),
            Ok(0)
        );
        assert_eq!(
            *h.rotation.lock().unwrap(),
            Some(ScreenOrientation::Landscape)
        );
        assert_eq!(h.engine.last_foreground(), "com.example.game");
    }

    #[test]
    fn orientation_follows_scene_and_screen_state() {
        let mut scene = SceneConfigInfo::new("com.example.game");
        scene.screen_orientation = ScreenOrientation::Landscape;
        let mut h = harness(vec![scene], FreezerSettings::default());

        h.engine.on_app_enter("com.example.game", false);
        assert_eq!(
            *h.rotation.lock().unwrap(),
            Some(ScreenOrientation::Landscape)
        );

        h.engine.on_screen_off();
        assert_eq!(
            *h.rotation.lock().unwrap(),
            Some(ScreenOrientation::Unspecified)
        );

        h.engine.on_screen_on();
        assert_eq!(
            *h.rotation.lock().unwrap(),
            Some(ScreenOrientation::Landscape)
        );

        h.engine.on_app_enter("com.example.plain", false);
        assert_eq!(*h.rotation.lock().unwrap(), None);
    }

    #[test]
    fn update_app_config_reapplies_current_scene() {
        let mut scene = SceneConfigInfo::new("com.example.reader");
        scene.alone_light = true;
        scene.alone_light_value = 40;
        let mut h = harness(vec![scene.clone()], FreezerSettings::default());

        h.engine.on_app_enter("com.example.reader", false);

        scene.alone_light_value = 70;
        h.store.set_app_config(scene).unwrap();
        // Write-back on leave must not resurrect 40: the live value is 40,
        // but update_app_config forces a fresh read of the stored scene.
        h.mem.seed(Namespace::System, keys::SCREEN_BRIGHTNESS, "70");
        h.engine.update_app_config();

        assert_eq!(
            h.engine.current_scene().unwrap().alone_light_value,
            70
        );
        assert_eq!(
            h.mem.get_int(Namespace::System, keys::SCREEN_BRIGHTNESS),
            Ok(70)
        );
    }

    #[test]
    fn clear_state_returns_to_baseline() {
        let mut scene = SceneConfigInfo::new("com.example.game");
        scene.alone_light = true;
        scene.alone_light_value = 20;
        scene.dis_notice = true;
        scene.screen_orientation = ScreenOrientation::Portrait;
        let mut h = harness(vec![scene], FreezerSettings::default());

        h.engine.on_app_enter("com.example.game", false);
        h.engine.clear_state();

        assert_eq!(h.engine.last_foreground(), BASELINE_PACKAGE);
        assert!(h.engine.current_scene().is_none());
        assert_eq!(*h.rotation.lock().unwrap(), None);
        assert_eq!(
            h.mem.get_int(Namespace::System, keys::SCREEN_BRIGHTNESS_MODE),
            Ok(1)
        );
        assert_eq!(
            h.mem.get_int(Namespace::Global, keys::HEADS_UP_NOTIFICATIONS_ENABLED),
            Ok(1)
        );
    }

    #[test]
    fn blocking_queries_follow_active_scene() {
        let mut scene = SceneConfigInfo::new("com.example.game");
        scene.dis_notice = true;
        scene.dis_button = true;
        let mut h = harness(vec![scene], FreezerSettings::default());

        assert!(!h.engine.should_block_notification());
        h.engine.on_app_enter("com.example.game", false);
        assert!(h.engine.should_block_notification());
        assert!(h.engine.should_block_key());

        h.engine.on_app_enter("com.example.plain", false);
        assert!(!h.engine.should_block_notification());
        assert!(!h.engine.should_block_key());
    }
}
