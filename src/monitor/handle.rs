use crate::overlay::OverlayAction;
use crate::platform::ForegroundEvent;
use crate::store::BlockSet;
use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;
use std::time::Duration;

/// Everything the monitor reacts to, delivered serially through one queue.
#[derive(Debug)]
pub enum MonitorMessage {
    Activate,
    Deactivate,
    Foreground(ForegroundEvent),
    BlockSetChanged(BlockSet),
    /// The stored block list was written; reread it.
    StoreChanged,
    Overlay(OverlayAction),
    Snapshot(Sender<MonitorSnapshot>),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Acting,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSnapshot {
    pub active: bool,
    pub blocked_apps: Vec<String>,
    pub overlay_showing: bool,
    pub phase: Phase,
    pub last_action_at: Option<u64>,
}

/// Emitted once per block action, for whoever is listening (the host UI).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockNotice {
    pub app_id: String,
    pub observed_at: u64,
}

/// Cloneable sender side of the monitor queue.
///
/// Every send reports whether the monitor loop is still there to receive it.
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    tx: Sender<MonitorMessage>,
}

impl MonitorHandle {
    pub fn channel() -> (Self, Receiver<MonitorMessage>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }

    pub fn send(&self, message: MonitorMessage) -> bool {
        match self.tx.send(message) {
            Ok(()) => true,
            Err(e) => {
                log::debug!("Monitor queue closed, dropping {:?}", e.into_inner());
                false
            }
        }
    }

    pub fn activate(&self) -> bool {
        self.send(MonitorMessage::Activate)
    }

    pub fn deactivate(&self) -> bool {
        self.send(MonitorMessage::Deactivate)
    }

    pub fn foreground(&self, event: ForegroundEvent) -> bool {
        self.send(MonitorMessage::Foreground(event))
    }

    pub fn block_set_changed(&self, apps: BlockSet) -> bool {
        self.send(MonitorMessage::BlockSetChanged(apps))
    }

    pub fn store_changed(&self) -> bool {
        self.send(MonitorMessage::StoreChanged)
    }

    pub fn overlay_action(&self, action: OverlayAction) -> bool {
        self.send(MonitorMessage::Overlay(action))
    }

    pub fn shutdown(&self) -> bool {
        self.send(MonitorMessage::Shutdown)
    }

    /// Ask the loop for its current state and wait up to `timeout` for the answer.
    pub fn snapshot(&self, timeout: Duration) -> Option<MonitorSnapshot> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        if !self.send(MonitorMessage::Snapshot(reply_tx)) {
            return None;
        }
        reply_rx.recv_timeout(timeout).ok()
    }
}
