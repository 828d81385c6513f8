//! Shared test utilities.
//!
//! A temporary database, an in-memory fake of every platform seam, a
//! scheduler that records instead of waiting and a clock moved by hand.

#![cfg(test)]

use crate::db::{migrations, Database};
use crate::error::AppError;
use crate::overlay::{OverlayContent, OverlaySettings};
use crate::platform::{
    AppCatalog, AppInfo, HomeScreen, OverlayPermission, OverlaySurface, Platform, SurfaceId,
};
use crate::scheduler::{Clock, Deferred, Scheduler};
use crate::store::BlockSet;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::{tempdir, TempDir};

/// Create a temporary test database with migrations applied.
///
/// The TempDir must be kept alive for the duration of the test.
pub fn setup_test_db() -> (Database, TempDir) {
    let dir = tempdir().expect("Failed to create temp directory for test DB");
    let db_path = dir.path().join("test.db");
    let db = Database::open(&db_path).expect("Failed to open test database");
    migrations::run(db.connection()).expect("Failed to run migrations on test DB");
    (db, dir)
}

pub fn block_set(apps: &[&str]) -> BlockSet {
    apps.iter().map(|a| (*a).to_string()).collect()
}

pub fn test_settings() -> OverlaySettings {
    OverlaySettings {
        auto_dismiss: Duration::from_millis(3000),
        grace_delay: Duration::from_secs(5),
        grace_enabled: true,
        message: "Blocked".into(),
    }
}

/// Everything the fakes were asked to do.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    pub home_calls: usize,
    pub permission_requests: usize,
    pub attached: Vec<OverlayContent>,
    pub updated: Vec<OverlayContent>,
    pub released: Vec<SurfaceId>,
}

#[derive(Default)]
struct FakeState {
    denied: bool,
    fail_attach: bool,
    fail_release: bool,
    apps: HashMap<String, AppInfo>,
    panic_on: Option<String>,
    next_surface: u64,
    recorder: Recorder,
}

/// Fake platform whose pieces share one state, so a test can keep a handle
/// after the boxed traits have been moved into the monitor.
#[derive(Clone, Default)]
pub struct FakePlatform {
    state: Arc<Mutex<FakeState>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_app(self, app_id: &str, info: AppInfo) -> Self {
        self.lock().apps.insert(app_id.to_string(), info);
        self
    }

    /// Make the catalog panic when asked about `app_id`.
    #[must_use]
    pub fn panicking_on(self, app_id: &str) -> Self {
        self.lock().panic_on = Some(app_id.to_string());
        self
    }

    pub fn set_permission(&self, granted: bool) {
        self.lock().denied = !granted;
    }

    pub fn fail_attach(&self) {
        self.lock().fail_attach = true;
    }

    pub fn fail_release(&self) {
        self.lock().fail_release = true;
    }

    pub fn recorder(&self) -> Recorder {
        self.lock().recorder.clone()
    }

    pub fn platform(&self) -> Platform {
        Platform {
            home: Box::new(self.clone()),
            permission: Box::new(self.clone()),
            catalog: Box::new(self.clone()),
            surface: Box::new(self.clone()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake platform lock poisoned")
    }
}

impl HomeScreen for FakePlatform {
    fn go_home(&self) {
        self.lock().recorder.home_calls += 1;
    }
}

impl OverlayPermission for FakePlatform {
    fn is_granted(&self) -> bool {
        !self.lock().denied
    }

    fn request(&self) {
        self.lock().recorder.permission_requests += 1;
    }
}

impl AppCatalog for FakePlatform {
    fn app_info(&self, app_id: &str) -> AppInfo {
        let state = self.lock();
        if state.panic_on.as_deref() == Some(app_id) {
            drop(state);
            panic!("catalog exploded on {app_id}");
        }
        state.apps.get(app_id).cloned().unwrap_or_default()
    }
}

impl OverlaySurface for FakePlatform {
    fn attach(&mut self, content: &OverlayContent) -> Result<SurfaceId, AppError> {
        let mut state = self.lock();
        if state.fail_attach {
            return Err(AppError::Platform("attach refused".into()));
        }
        state.next_surface += 1;
        state.recorder.attached.push(content.clone());
        Ok(SurfaceId(state.next_surface))
    }

    fn update(&mut self, _id: SurfaceId, content: &OverlayContent) -> Result<(), AppError> {
        self.lock().recorder.updated.push(content.clone());
        Ok(())
    }

    fn release(&mut self, id: SurfaceId) -> Result<(), AppError> {
        let mut state = self.lock();
        state.recorder.released.push(id);
        if state.fail_release {
            return Err(AppError::Platform("surface already detached".into()));
        }
        Ok(())
    }
}

/// Records scheduled tasks; the test decides when they run.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    pub pending: Vec<(Duration, Deferred)>,
}

impl ManualScheduler {
    pub fn take(&mut self) -> Vec<(Duration, Deferred)> {
        std::mem::take(&mut self.pending)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, delay: Duration, task: Deferred) {
        self.pending.push((delay, task));
    }
}

/// Clock the test sets by hand. Clones share one reading.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Move to `ms` after the clock's origin, backwards if need be.
    pub fn set_millis(&self, ms: u64) {
        *self.offset.lock().expect("clock lock poisoned") = Duration::from_millis(ms);
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock().expect("clock lock poisoned") += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock().expect("clock lock poisoned")
    }
}
