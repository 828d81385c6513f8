//! The monitor's serial worker.
//!
//! One thread owns the [`BlockingMonitor`] and drains its queue. Deferred tasks
//! live in a [`TimerQueue`] on the same thread, so every state transition
//! happens in order and without locks. A panic while handling one message is
//! caught and logged; the loop carries on with the next one.

use crate::error::AppError;
use crate::monitor::{BlockingMonitor, Flow, MonitorHandle, MonitorMessage};
use crate::scheduler::TimerQueue;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, error, info};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

pub struct MonitorService {
    handle: MonitorHandle,
    running: Arc<AtomicBool>,
}

impl MonitorService {
    pub fn new(handle: MonitorHandle) -> Self {
        Self {
            handle,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn start(
        &self,
        monitor: BlockingMonitor,
        inbox: Receiver<MonitorMessage>,
    ) -> Result<JoinHandle<()>, AppError> {
        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);

        let spawned = thread::Builder::new()
            .name("focusguard-monitor".into())
            .spawn(move || {
                run_loop(monitor, &inbox);
                running.store(false, Ordering::SeqCst);
            });
        match spawned {
            Ok(thread) => Ok(thread),
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                Err(AppError::Io(e))
            }
        }
    }

    /// Ask the loop to deactivate and exit. Join the handle from [`start`](Self::start)
    /// to wait for it.
    pub fn stop(&self) {
        if !self.handle.shutdown() {
            debug!("Monitor loop already gone");
        }
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

fn run_loop(mut monitor: BlockingMonitor, inbox: &Receiver<MonitorMessage>) {
    info!("Monitor loop started");
    let mut timers = TimerQueue::new();

    loop {
        let now = Instant::now();
        while let Some(task) = timers.pop_due(now) {
            guarded("deferred task", || monitor.on_deferred(task));
        }

        let message = match timers.next_deadline() {
            Some(deadline) => match inbox.recv_deadline(deadline) {
                Ok(message) => message,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match inbox.recv() {
                Ok(message) => message,
                Err(_) => break,
            },
        };

        let flow = guarded("message", || monitor.dispatch(message, &mut timers));
        if flow == Some(Flow::Stop) {
            break;
        }
    }

    monitor.deactivate();
    info!("Monitor loop stopped");
}

fn guarded<T>(what: &str, f: impl FnOnce() -> T) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!("Monitor recovered from panic while handling {what}: {reason}");
            None
        }
    }
}
