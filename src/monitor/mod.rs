//! Blocking state machine.
//!
//! Consumes foreground events and block-list changes, owns the in-memory block
//! set, debounces block actions and drives the overlay and the home redirect.
//! Nothing in here returns an error to its caller: a bad event is logged and
//! the monitor stays available for the next one.

mod handle;

pub use handle::{BlockNotice, MonitorHandle, MonitorMessage, MonitorSnapshot, Phase};

use crate::config::Config;
use crate::constants::{BLOCKED_APPS_KEY, DEBOUNCE_WINDOW_MS, UPDATE_BLOCKED_APPS_ACTION};
use crate::error::AppError;
use crate::overlay::{
    DismissReason, OverlayAction, OverlayRenderer, OverlaySettings, ShowOutcome, ShowRequest,
};
use crate::platform::{AppCatalog, ForegroundEvent, HomeScreen, Platform};
use crate::scheduler::{Clock, Deferred, MonotonicClock, Scheduler};
use crate::store::{BlockListStore, BlockSet, ListenerId};
use crate::sync::{Broadcast, Registration, SyncChannel};
use crossbeam_channel::Sender;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Most recent block action on the monitor's clock, used to debounce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionGate {
    last_action_at: Option<Instant>,
}

impl ActionGate {
    /// True once the debounce window since the last action has fully elapsed.
    /// A reading earlier than the last action counts as elapsed.
    pub fn allows(&self, now: Instant) -> bool {
        let window = Duration::from_millis(DEBOUNCE_WINDOW_MS);
        match self.last_action_at {
            Some(last) => match now.checked_duration_since(last) {
                Some(elapsed) => elapsed >= window,
                None => true,
            },
            None => true,
        }
    }

    pub fn record(&mut self, now: Instant) {
        self.last_action_at = Some(now);
    }

    pub fn last_action_at(&self) -> Option<Instant> {
        self.last_action_at
    }
}

/// Loop control returned by [`BlockingMonitor::dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

pub struct BlockingMonitor {
    store: Arc<BlockListStore>,
    sync: Arc<SyncChannel>,
    handle: MonitorHandle,
    home: Box<dyn HomeScreen>,
    catalog: Box<dyn AppCatalog>,
    overlay: OverlayRenderer,
    redirect_delay: Duration,
    notices: Option<Sender<BlockNotice>>,
    clock: Box<dyn Clock>,

    block_set: BlockSet,
    gate: ActionGate,
    last_observed_at: Option<u64>,
    active: bool,
    redirect_pending: bool,
    permission_requested: bool,
    sync_registration: Option<Registration>,
    store_listener: Option<ListenerId>,
}

impl BlockingMonitor {
    pub fn new(
        platform: Platform,
        store: Arc<BlockListStore>,
        sync: Arc<SyncChannel>,
        handle: MonitorHandle,
        config: &Config,
    ) -> Self {
        let overlay = OverlayRenderer::new(
            platform.permission,
            platform.surface,
            OverlaySettings::from(config),
        );
        Self {
            store,
            sync,
            handle,
            home: platform.home,
            catalog: platform.catalog,
            overlay,
            redirect_delay: config.redirect_delay(),
            notices: None,
            clock: Box::new(MonotonicClock),
            block_set: BlockSet::new(),
            gate: ActionGate::default(),
            last_observed_at: None,
            active: false,
            redirect_pending: false,
            permission_requested: false,
            sync_registration: None,
            store_listener: None,
        }
    }

    /// Send a [`BlockNotice`] to `notices` on every block action.
    #[must_use]
    pub fn with_notices(mut self, notices: Sender<BlockNotice>) -> Self {
        self.notices = Some(notices);
        self
    }

    /// Debounce against `clock` instead of the system's monotonic clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn block_set(&self) -> &BlockSet {
        &self.block_set
    }

    pub fn gate(&self) -> ActionGate {
        self.gate
    }

    pub fn overlay(&self) -> &OverlayRenderer {
        &self.overlay
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn phase(&self) -> Phase {
        if self.redirect_pending || self.overlay.is_showing() {
            Phase::Acting
        } else {
            Phase::Idle
        }
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            active: self.active,
            blocked_apps: self.block_set.iter().cloned().collect(),
            overlay_showing: self.overlay.is_showing(),
            phase: self.phase(),
            last_action_at: self.last_observed_at,
        }
    }

    pub fn dispatch(&mut self, message: MonitorMessage, scheduler: &mut dyn Scheduler) -> Flow {
        match message {
            MonitorMessage::Activate => self.activate(),
            MonitorMessage::Deactivate => self.deactivate(),
            MonitorMessage::Foreground(event) => self.on_foreground_event(event, scheduler),
            MonitorMessage::BlockSetChanged(apps) => self.on_block_set_changed(apps),
            MonitorMessage::StoreChanged => self.on_store_changed(),
            MonitorMessage::Overlay(action) => self.on_overlay_action(action, scheduler),
            MonitorMessage::Snapshot(reply) => {
                if reply.send(self.snapshot()).is_err() {
                    debug!("Snapshot requester went away");
                }
            }
            MonitorMessage::Shutdown => {
                self.deactivate();
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    /// Load the block set and register for updates. Safe to call repeatedly:
    /// a listener that is already registered is not registered again, and one
    /// that failed last time is retried.
    pub fn activate(&mut self) {
        if self.sync_registration.is_none() {
            let handle = self.handle.clone();
            let receiver = Arc::new(move |broadcast: &Broadcast| match broadcast.block_set() {
                Ok(apps) => {
                    handle.block_set_changed(apps);
                }
                Err(e) => warn!("Ignoring malformed block list broadcast: {e}"),
            });
            match self.sync.register(UPDATE_BLOCKED_APPS_ACTION, receiver) {
                Ok(registration) => self.sync_registration = Some(registration),
                Err(e) => error!("Sync registration failed, will retry on next activation: {e}"),
            }
        }

        if self.store_listener.is_none() {
            let handle = self.handle.clone();
            let id = self.store.subscribe(
                BLOCKED_APPS_KEY,
                Arc::new(move |_key: &str, _apps: &BlockSet| {
                    handle.store_changed();
                }),
            );
            self.store_listener = Some(id);
        }

        match self.store.get(BLOCKED_APPS_KEY) {
            Ok(apps) => {
                info!("Loaded {} blocked apps", apps.len());
                self.block_set = apps;
            }
            Err(e) => warn!("Failed to load blocked apps, starting empty: {e}"),
        }
        self.active = true;
    }

    /// Drop all listeners and force the overlay hidden. Idempotent.
    pub fn deactivate(&mut self) {
        if let Some(registration) = self.sync_registration.take() {
            self.sync.unregister(&registration);
        }
        if let Some(id) = self.store_listener.take() {
            self.store.unsubscribe(id);
        }
        self.overlay.dismiss(DismissReason::Deactivated);
        self.redirect_pending = false;
        self.permission_requested = false;
        if self.active {
            info!("Monitor deactivated");
        }
        self.active = false;
    }

    pub fn on_foreground_event(&mut self, event: ForegroundEvent, scheduler: &mut dyn Scheduler) {
        if let Err(e) = self.handle_foreground(&event, scheduler) {
            error!("Failed to handle foreground change to {}: {e}", event.app_id);
        }
    }

    /// Replace the block set wholesale and persist it, so a restart sees the
    /// same list without waiting for a fresh sync.
    pub fn on_block_set_changed(&mut self, apps: BlockSet) {
        if apps == self.block_set {
            debug!("Block list unchanged ({} apps)", apps.len());
        } else {
            info!("Block list replaced: {} apps", apps.len());
        }
        self.block_set = apps;

        if let Err(e) = self.store.put(BLOCKED_APPS_KEY, &self.block_set) {
            warn!("Failed to persist block list: {e}");
        }
    }

    /// Adopt whatever the store holds now. A notification may be stale by the
    /// time it is handled, so the store is read again. The value is the
    /// store's own and is not written back.
    pub fn on_store_changed(&mut self) {
        match self.store.get(BLOCKED_APPS_KEY) {
            Ok(apps) => {
                if apps != self.block_set {
                    info!("Block list reloaded from store: {} apps", apps.len());
                    self.block_set = apps;
                }
            }
            Err(e) => warn!("Failed to reload block list after store change: {e}"),
        }
    }

    pub fn on_overlay_action(&mut self, action: OverlayAction, scheduler: &mut dyn Scheduler) {
        self.overlay.on_action(action, scheduler);
    }

    pub fn on_deferred(&mut self, task: Deferred) {
        match task {
            Deferred::Redirect { app_id } => {
                self.redirect_pending = false;
                if self.active {
                    debug!("Redirecting home away from {app_id}");
                    self.home.go_home();
                } else {
                    debug!("Skipping redirect for {app_id}, monitor inactive");
                }
            }
            Deferred::AutoDismiss(token) => {
                self.overlay.on_timer(token, DismissReason::AutoTimeout);
            }
            Deferred::GraceElapsed(token) => {
                self.overlay.on_timer(token, DismissReason::GraceElapsed);
            }
        }
    }

    fn handle_foreground(
        &mut self,
        event: &ForegroundEvent,
        scheduler: &mut dyn Scheduler,
    ) -> Result<(), AppError> {
        if !self.active {
            debug!("Monitor inactive, ignoring {}", event.app_id);
            return Ok(());
        }
        debug!("Foreground app: {}", event.app_id);

        if self.block_set.is_empty() {
            // A push sent before we registered is lost; pull instead.
            self.block_set = self.store.get(BLOCKED_APPS_KEY)?;
            if !self.block_set.is_empty() {
                info!("Reloaded {} blocked apps from store", self.block_set.len());
            }
        }

        if !self.block_set.contains(&event.app_id) {
            return Ok(());
        }
        let now = self.clock.now();
        if !self.gate.allows(now) {
            debug!("Debounced {} at {}", event.app_id, event.observed_at);
            return Ok(());
        }
        self.gate.record(now);
        self.last_observed_at = Some(event.observed_at);
        info!("Blocked app detected: {} -> HOME + OVERLAY", event.app_id);

        self.show_overlay(event, scheduler);

        scheduler.schedule(
            self.redirect_delay,
            Deferred::Redirect {
                app_id: event.app_id.clone(),
            },
        );
        self.redirect_pending = true;

        if let Some(notices) = &self.notices {
            let notice = BlockNotice {
                app_id: event.app_id.clone(),
                observed_at: event.observed_at,
            };
            if notices.send(notice).is_err() {
                debug!("No one is listening for block notices");
            }
        }
        Ok(())
    }

    /// The redirect does not depend on any of this succeeding.
    fn show_overlay(&mut self, event: &ForegroundEvent, scheduler: &mut dyn Scheduler) {
        let info = self.catalog.app_info(&event.app_id);
        let label = info
            .label
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| event.app_id.clone());
        let request = ShowRequest {
            app_id: event.app_id.clone(),
            label,
            icon: info.icon,
        };

        match self.overlay.show(request, event.observed_at, scheduler) {
            Ok(ShowOutcome::Shown) => {}
            Ok(ShowOutcome::AlreadyShowing) => debug!("Overlay already showing"),
            Ok(ShowOutcome::PermissionDenied) => {
                warn!("Overlay permission not granted, redirecting without overlay");
                if !self.permission_requested {
                    self.permission_requested = true;
                    self.overlay.request_permission();
                }
            }
            Err(e) => error!("Failed to show overlay for {}: {e}", event.app_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::{Badge, OverlayState};
    use crate::platform::{AppIcon, AppInfo};
    use crate::store::BlockListStore;
    use crate::test_utils::{block_set, setup_test_db, FakePlatform, ManualClock, ManualScheduler};
    use crossbeam_channel::Receiver;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const VIDEO: &str = "com.video.app";
    const MAX_DRAINED: usize = 100;

    struct Harness {
        monitor: BlockingMonitor,
        fake: FakePlatform,
        store: Arc<BlockListStore>,
        sync: Arc<SyncChannel>,
        inbox: crossbeam_channel::Receiver<MonitorMessage>,
        scheduler: ManualScheduler,
        clock: ManualClock,
        notices: Receiver<BlockNotice>,
        _dir: TempDir,
    }

    impl Harness {
        fn new(fake: FakePlatform) -> Self {
            let (db, dir) = setup_test_db();
            let store = Arc::new(BlockListStore::new(Arc::new(Mutex::new(db))));
            Self::with_store(fake, store, dir)
        }

        fn with_store(fake: FakePlatform, store: Arc<BlockListStore>, dir: TempDir) -> Self {
            let sync = Arc::new(SyncChannel::new());
            let (handle, inbox) = MonitorHandle::channel();
            let (notice_tx, notices) = crossbeam_channel::unbounded();
            let clock = ManualClock::new();
            let monitor = BlockingMonitor::new(
                fake.platform(),
                Arc::clone(&store),
                Arc::clone(&sync),
                handle,
                &Config::default(),
            )
            .with_notices(notice_tx)
            .with_clock(Box::new(clock.clone()));
            Self {
                monitor,
                fake,
                store,
                sync,
                inbox,
                scheduler: ManualScheduler::default(),
                clock,
                notices,
                _dir: dir,
            }
        }

        fn blocking(apps: &[&str]) -> Self {
            let mut h = Self::new(FakePlatform::new());
            h.store.put(BLOCKED_APPS_KEY, &block_set(apps)).unwrap();
            h.monitor.activate();
            h.drain_inbox();
            h
        }

        /// Deliver `app` with the monitor clock at `at` ms, stamped `at`.
        fn event(&mut self, app: &str, at: u64) {
            self.clock.set_millis(at);
            self.event_stamped(app, at);
        }

        /// Deliver `app` stamped `observed_at`, leaving the clock alone.
        fn event_stamped(&mut self, app: &str, observed_at: u64) {
            self.monitor.on_foreground_event(
                ForegroundEvent::new(app, observed_at),
                &mut self.scheduler,
            );
        }

        /// Run every deferred task scheduled so far.
        fn run_deferred(&mut self) {
            for (_, task) in self.scheduler.take() {
                self.monitor.on_deferred(task);
            }
        }

        /// Dispatch queued messages until the queue is empty.
        fn drain_inbox(&mut self) -> usize {
            let mut handled = 0;
            while let Ok(message) = self.inbox.try_recv() {
                self.monitor.dispatch(message, &mut self.scheduler);
                handled += 1;
                assert!(handled < MAX_DRAINED, "monitor queue never settles");
            }
            handled
        }

        fn broadcast(&self, apps: &[&str]) {
            let broadcast = Broadcast::new(UPDATE_BLOCKED_APPS_ACTION)
                .with_string_list(crate::constants::APPS_EXTRA, apps.iter().copied());
            assert_eq!(self.sync.broadcast(&broadcast), 1);
        }

        fn redirects_scheduled(&self) -> usize {
            self.scheduler
                .pending
                .iter()
                .filter(|(_, t)| matches!(t, Deferred::Redirect { .. }))
                .count()
        }

        fn notice_count(&self) -> usize {
            self.notices.try_iter().count()
        }
    }

    #[test]
    fn test_unblocked_app_has_no_side_effects() {
        let mut h = Harness::blocking(&[VIDEO]);

        h.event("com.notes.app", 0);
        h.run_deferred();

        assert_eq!(h.fake.recorder().home_calls, 0);
        assert!(h.fake.recorder().attached.is_empty());
        assert_eq!(h.monitor.phase(), Phase::Idle);
        assert_eq!(h.monitor.gate().last_action_at(), None);
    }

    #[test]
    fn test_blocked_app_shows_overlay_then_redirects() {
        let mut h = Harness::blocking(&[VIDEO]);

        h.event(VIDEO, 1_000);

        assert!(h.monitor.overlay().is_showing());
        assert_eq!(h.monitor.phase(), Phase::Acting);
        // The redirect is deferred, never immediate.
        assert_eq!(h.fake.recorder().home_calls, 0);
        let redirect_delay = h
            .scheduler
            .pending
            .iter()
            .find(|(_, t)| matches!(t, Deferred::Redirect { .. }))
            .map(|(d, _)| *d)
            .unwrap();
        assert!(redirect_delay > Duration::ZERO);

        h.run_deferred();
        assert_eq!(h.fake.recorder().home_calls, 1);
        assert_eq!(h.monitor.snapshot().last_action_at, Some(1_000));
        assert_eq!(h.notice_count(), 1);
    }

    #[test]
    fn test_debounce_scenario() {
        let mut h = Harness::blocking(&[VIDEO]);

        h.event(VIDEO, 0);
        h.event(VIDEO, 400);
        h.event(VIDEO, 1_200);

        assert_eq!(h.redirects_scheduled(), 2);
        let notices: Vec<u64> = h.notices.try_iter().map(|n| n.observed_at).collect();
        assert_eq!(notices, vec![0, 1_200]);
        h.run_deferred();
        assert_eq!(h.fake.recorder().home_calls, 2);
    }

    #[test]
    fn test_events_inside_window_produce_one_action_pair() {
        let mut h = Harness::blocking(&[VIDEO]);

        h.event(VIDEO, 5_000);
        h.event(VIDEO, 5_999);

        assert_eq!(h.redirects_scheduled(), 1);
        assert_eq!(h.fake.recorder().attached.len(), 1);
    }

    #[test]
    fn test_redirect_side_effect_does_not_retrigger() {
        let mut h = Harness::blocking(&[VIDEO]);

        h.event(VIDEO, 0);
        h.run_deferred();
        // The launcher coming to the front, then the blocked app bouncing back.
        h.event("com.android.launcher", 150);
        h.event(VIDEO, 300);
        h.run_deferred();

        assert_eq!(h.fake.recorder().home_calls, 1);
    }

    #[test]
    fn test_permission_denied_still_redirects() {
        let fake = FakePlatform::new();
        fake.set_permission(false);
        let mut h = Harness::new(fake);
        h.store.put(BLOCKED_APPS_KEY, &block_set(&[VIDEO])).unwrap();
        h.monitor.activate();

        h.event(VIDEO, 0);
        h.event(VIDEO, 2_000);
        h.run_deferred();

        assert_eq!(*h.monitor.overlay().state(), OverlayState::Hidden);
        assert!(h.fake.recorder().attached.is_empty());
        assert_eq!(h.fake.recorder().home_calls, 2);
        assert_eq!(h.fake.recorder().permission_requests, 1);
    }

    #[test]
    fn test_cleared_set_blocks_nothing_until_refilled() {
        let mut h = Harness::blocking(&[VIDEO]);

        h.monitor.on_block_set_changed(BlockSet::new());
        h.event(VIDEO, 0);
        assert_eq!(h.redirects_scheduled(), 0);
        assert!(h.store.get(BLOCKED_APPS_KEY).unwrap().is_empty());

        h.monitor.on_block_set_changed(block_set(&[VIDEO]));
        h.event(VIDEO, 100);
        assert_eq!(h.redirects_scheduled(), 1);
    }

    #[test]
    fn test_block_set_change_is_persisted() {
        let mut h = Harness::blocking(&[]);

        h.monitor.on_block_set_changed(block_set(&["com.a", "com.b"]));

        assert_eq!(h.store.get(BLOCKED_APPS_KEY).unwrap(), block_set(&["com.a", "com.b"]));
    }

    #[test]
    fn test_restart_round_trip() {
        for apps in [block_set(&[VIDEO, "com.social.app"]), BlockSet::new()] {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("test.db");
            {
                let db = crate::db::Database::open_migrated(&path).unwrap();
                let store = BlockListStore::new(Arc::new(Mutex::new(db)));
                store.put(BLOCKED_APPS_KEY, &apps).unwrap();
            }

            let db = crate::db::Database::open_migrated(&path).unwrap();
            let store = Arc::new(BlockListStore::new(Arc::new(Mutex::new(db))));
            let mut h = Harness::with_store(FakePlatform::new(), store, dir);
            h.monitor.activate();

            assert_eq!(*h.monitor.block_set(), apps);
        }
    }

    #[test]
    fn test_sync_broadcast_replaces_set() {
        let mut h = Harness::blocking(&[VIDEO]);

        h.broadcast(&["com.social.app"]);
        // The broadcast, then the store's notice of the write-back.
        assert_eq!(h.drain_inbox(), 2);

        assert_eq!(*h.monitor.block_set(), block_set(&["com.social.app"]));
        assert_eq!(h.store.get(BLOCKED_APPS_KEY).unwrap(), block_set(&["com.social.app"]));
        assert!(h.inbox.try_recv().is_err());
    }

    #[test]
    fn test_quick_successive_edits_settle_on_the_last() {
        let mut h = Harness::blocking(&[]);

        h.broadcast(&["com.a"]);
        h.broadcast(&["com.b"]);
        h.drain_inbox();

        assert_eq!(*h.monitor.block_set(), block_set(&["com.b"]));
        assert_eq!(h.store.get(BLOCKED_APPS_KEY).unwrap(), block_set(&["com.b"]));
        assert!(h.inbox.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_interleaved_with_store_write_settles() {
        let mut h = Harness::blocking(&[VIDEO]);

        // An editing surface writing the store and broadcasting the same edit,
        // with an older broadcast still queued ahead of both.
        h.broadcast(&["com.a"]);
        h.store.put(BLOCKED_APPS_KEY, &block_set(&["com.b", "com.c"])).unwrap();
        h.broadcast(&["com.b", "com.c"]);
        h.drain_inbox();

        let latest = block_set(&["com.b", "com.c"]);
        assert_eq!(*h.monitor.block_set(), latest);
        assert_eq!(h.store.get(BLOCKED_APPS_KEY).unwrap(), latest);
        assert!(h.inbox.try_recv().is_err());
    }

    #[test]
    fn test_store_notification_is_not_written_back() {
        let mut h = Harness::blocking(&[]);
        h.store.put(BLOCKED_APPS_KEY, &block_set(&["com.a"])).unwrap();
        h.store.put(BLOCKED_APPS_KEY, &block_set(&["com.b"])).unwrap();

        // Both notices reread the store; neither restores an older value.
        assert_eq!(h.drain_inbox(), 2);

        assert_eq!(*h.monitor.block_set(), block_set(&["com.b"]));
        assert_eq!(h.store.get(BLOCKED_APPS_KEY).unwrap(), block_set(&["com.b"]));
    }

    #[test]
    fn test_duplicate_broadcasts_are_idempotent() {
        let mut h = Harness::blocking(&[]);

        h.broadcast(&[VIDEO]);
        h.broadcast(&[VIDEO]);
        h.drain_inbox();

        assert_eq!(*h.monitor.block_set(), block_set(&[VIDEO]));
    }

    #[test]
    fn test_malformed_broadcast_is_ignored() {
        let mut h = Harness::blocking(&[VIDEO]);
        let broadcast = Broadcast::new(UPDATE_BLOCKED_APPS_ACTION)
            .with_string_list(crate::constants::APPS_EXTRA, ["com.ok", ""]);

        h.sync.broadcast(&broadcast);
        h.drain_inbox();

        assert_eq!(*h.monitor.block_set(), block_set(&[VIDEO]));
    }

    #[test]
    fn test_store_change_reaches_monitor() {
        let mut h = Harness::blocking(&[]);

        h.store.put(BLOCKED_APPS_KEY, &block_set(&[VIDEO])).unwrap();
        h.drain_inbox();

        assert_eq!(*h.monitor.block_set(), block_set(&[VIDEO]));
    }

    #[test]
    fn test_missed_push_is_recovered_by_lazy_reload() {
        let mut h = Harness::blocking(&[]);
        // Written behind the monitor's back, notification never processed.
        h.store.put(BLOCKED_APPS_KEY, &block_set(&[VIDEO])).unwrap();

        h.event(VIDEO, 0);

        assert_eq!(h.redirects_scheduled(), 1);
        assert_eq!(*h.monitor.block_set(), block_set(&[VIDEO]));
    }

    #[test]
    fn test_activate_is_idempotent() {
        let mut h = Harness::blocking(&[]);
        h.monitor.activate();
        h.monitor.activate();

        assert_eq!(h.sync.receiver_count(UPDATE_BLOCKED_APPS_ACTION), 1);
        assert_eq!(h.store.listener_count(BLOCKED_APPS_KEY), 1);

        h.monitor.deactivate();
        h.monitor.deactivate();
        assert_eq!(h.sync.receiver_count(UPDATE_BLOCKED_APPS_ACTION), 0);
        assert_eq!(h.store.listener_count(BLOCKED_APPS_KEY), 0);

        h.monitor.activate();
        assert_eq!(h.sync.receiver_count(UPDATE_BLOCKED_APPS_ACTION), 1);
    }

    #[test]
    fn test_deactivate_hides_overlay_and_cancels_redirect() {
        let mut h = Harness::blocking(&[VIDEO]);
        h.event(VIDEO, 0);
        assert!(h.monitor.overlay().is_showing());

        h.monitor.deactivate();
        h.run_deferred();

        assert!(!h.monitor.overlay().is_showing());
        assert_eq!(h.fake.recorder().released.len(), 1);
        assert_eq!(h.fake.recorder().home_calls, 0);
        assert_eq!(h.monitor.phase(), Phase::Idle);
    }

    #[test]
    fn test_events_ignored_while_inactive() {
        let mut h = Harness::new(FakePlatform::new());
        h.store.put(BLOCKED_APPS_KEY, &block_set(&[VIDEO])).unwrap();

        h.event(VIDEO, 0);

        assert_eq!(h.redirects_scheduled(), 0);
    }

    #[test]
    fn test_overlay_uses_catalog_data() {
        let fake = FakePlatform::new().with_app(
            VIDEO,
            AppInfo {
                label: Some("Video".into()),
                icon: Some(AppIcon::Named("video".into())),
            },
        );
        let mut h = Harness::new(fake);
        h.store.put(BLOCKED_APPS_KEY, &block_set(&[VIDEO])).unwrap();
        h.monitor.activate();

        h.event(VIDEO, 0);

        let attached = h.fake.recorder().attached;
        assert_eq!(attached[0].title, "Video");
        assert_eq!(attached[0].badge, Badge::Icon(AppIcon::Named("video".into())));
    }

    #[test]
    fn test_overlay_falls_back_to_identifier() {
        let mut h = Harness::blocking(&[VIDEO]);

        h.event(VIDEO, 0);

        let attached = h.fake.recorder().attached;
        assert_eq!(attached[0].title, VIDEO);
        assert_eq!(attached[0].badge, Badge::Glyph('C'));
    }

    #[test]
    fn test_overlay_failure_does_not_stop_redirect() {
        let fake = FakePlatform::new();
        fake.fail_attach();
        let mut h = Harness::new(fake);
        h.store.put(BLOCKED_APPS_KEY, &block_set(&[VIDEO])).unwrap();
        h.monitor.activate();

        h.event(VIDEO, 0);
        h.run_deferred();

        assert_eq!(h.fake.recorder().home_calls, 1);
        assert!(!h.monitor.overlay().is_showing());
    }

    #[test]
    fn test_auto_dismiss_returns_to_idle() {
        let mut h = Harness::blocking(&[VIDEO]);

        h.event(VIDEO, 0);
        h.run_deferred();

        assert!(!h.monitor.overlay().is_showing());
        assert_eq!(h.monitor.phase(), Phase::Idle);
        assert_eq!(h.fake.recorder().released.len(), 1);
    }

    #[test]
    fn test_shutdown_stops_and_deactivates() {
        let mut h = Harness::blocking(&[VIDEO]);

        let flow = h.monitor.dispatch(MonitorMessage::Shutdown, &mut h.scheduler);

        assert_eq!(flow, Flow::Stop);
        assert!(!h.monitor.is_active());
    }

    #[test]
    fn test_gate_window_and_backwards_reading() {
        let start = Instant::now();
        let at = |ms: u64| start + Duration::from_millis(ms);
        let mut gate = ActionGate::default();
        assert!(gate.allows(at(0)));

        gate.record(at(10_000));
        assert!(!gate.allows(at(10_999)));
        assert!(gate.allows(at(11_000)));
        assert!(gate.allows(at(9_000)));
    }

    #[test]
    fn test_debounce_ignores_client_timestamps() {
        let mut h = Harness::blocking(&[VIDEO]);

        // A client that always stamps zero.
        h.event_stamped(VIDEO, 0);
        h.clock.advance(Duration::from_millis(400));
        h.event_stamped(VIDEO, 0);
        h.clock.advance(Duration::from_millis(800));
        h.event_stamped(VIDEO, 0);

        assert_eq!(h.redirects_scheduled(), 2);
        assert_eq!(h.notice_count(), 2);
    }

    #[test]
    fn test_clock_stepping_back_does_not_stall_blocking() {
        let mut h = Harness::blocking(&[VIDEO]);

        h.event(VIDEO, 10_000);
        h.event(VIDEO, 2_000);

        assert_eq!(h.redirects_scheduled(), 2);
    }
}
