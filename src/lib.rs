pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod monitor;
pub mod native_host;
pub mod overlay;
pub mod platform;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod sync;
#[cfg(test)]
mod test_utils;
pub mod validation;

use crate::config::{Config, CONFIG_FILE};
use crate::db::{migrations, Database};
use crate::error::InitError;
use crate::monitor::{BlockingMonitor, MonitorHandle};
use crate::native_host::NativeHost;
use crate::platform::Platform;
use crate::service::MonitorService;
use crate::store::BlockListStore;
use crate::sync::SyncChannel;
use directories::ProjectDirs;
use log::{error, info, warn};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub struct ProjectPaths {
    pub db: PathBuf,
    pub config: PathBuf,
}

/// Resolve the database and config paths, creating their directories.
pub fn project_paths() -> Result<ProjectPaths, InitError> {
    let proj_dirs =
        ProjectDirs::from("com", "focusguard", "Focusguard").ok_or(InitError::NoProjectDirs)?;
    let data_dir = proj_dirs.data_dir();
    let config_dir = proj_dirs.config_dir();
    std::fs::create_dir_all(data_dir).map_err(InitError::DataDirCreation)?;
    std::fs::create_dir_all(config_dir).map_err(InitError::DataDirCreation)?;
    Ok(ProjectPaths {
        db: data_dir.join("focusguard.db"),
        config: config_dir.join(CONFIG_FILE),
    })
}

/// Run the daemon until the host UI closes stdin.
pub fn run() -> Result<(), InitError> {
    let paths = project_paths()?;
    let config = Config::load_or_init(&paths.config).map_err(InitError::Config)?;

    let db = Database::open(&paths.db).map_err(InitError::DatabaseOpen)?;
    migrations::run(db.connection()).map_err(InitError::Migration)?;
    info!("Database ready at {}", paths.db.display());

    let store = Arc::new(BlockListStore::new(Arc::new(Mutex::new(db))));
    let sync = Arc::new(SyncChannel::new());
    let (handle, inbox) = MonitorHandle::channel();
    let (notice_tx, notices) = crossbeam_channel::unbounded();

    let platform = Platform::native(&paths.config, &handle);
    let monitor = BlockingMonitor::new(platform, store, Arc::clone(&sync), handle.clone(), &config)
        .with_notices(notice_tx);

    let service = MonitorService::new(handle.clone());
    let monitor_thread = service.start(monitor, inbox).map_err(InitError::Service)?;
    handle.activate();
    let source = crate::platform::start_foreground_source(&handle);

    let host = NativeHost::new(sync, handle, io::stdout());
    let notice_thread = match host.spawn_notice_writer(notices) {
        Ok(thread) => Some(thread),
        Err(e) => {
            warn!("Block notices will not reach the host UI: {e}");
            None
        }
    };

    if let Err(e) = host.run(&mut io::stdin().lock()) {
        error!("Native host stopped: {e}");
    }

    if let Some(source) = source {
        source.stop();
    }
    service.stop();
    if monitor_thread.join().is_err() {
        error!("Monitor thread panicked during shutdown");
    }
    if let Some(thread) = notice_thread {
        if thread.join().is_err() {
            warn!("Notice writer panicked during shutdown");
        }
    }
    info!("Shut down cleanly");
    Ok(())
}
