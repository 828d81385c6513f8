//! Native messaging host for the editing surface.
//!
//! Frames are a little-endian `u32` length followed by that many bytes of JSON,
//! capped at 1 MiB. The host runs over stdin/stdout, so nothing else may write
//! to stdout while it is up.

use crate::constants::MAX_MESSAGE_SIZE;
use crate::db::safe_lock;
use crate::monitor::{BlockNotice, MonitorHandle, MonitorSnapshot};
use crate::overlay::OverlayAction;
use crate::platform::PlatformEvent;
use crate::sync::{Broadcast, SyncChannel};
use crossbeam_channel::Receiver;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const STATE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IncomingMessage {
    Broadcast(Broadcast),
    PlatformEvent(PlatformEvent),
    OverlayAction { action: OverlayAction },
    RequestState,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutgoingMessage {
    AppBlocked {
        package: String,
        #[serde(rename = "observedAt")]
        observed_at: u64,
    },
    State(MonitorSnapshot),
    Error { message: String },
}

impl From<BlockNotice> for OutgoingMessage {
    fn from(notice: BlockNotice) -> Self {
        Self::AppBlocked {
            package: notice.app_id,
            observed_at: notice.observed_at,
        }
    }
}

pub struct NativeHost<W> {
    sync: Arc<SyncChannel>,
    monitor: MonitorHandle,
    writer: Arc<Mutex<W>>,
}

impl<W: Write + Send + 'static> NativeHost<W> {
    pub fn new(sync: Arc<SyncChannel>, monitor: MonitorHandle, writer: W) -> Self {
        Self {
            sync,
            monitor,
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    /// Serve frames from `reader` until it reaches end of input.
    ///
    /// A frame that is not a valid message gets an `error` reply and the session
    /// continues. An oversized or truncated frame ends it, since the stream can
    /// no longer be trusted to be in sync.
    pub fn run<R: Read>(&self, reader: &mut R) -> io::Result<()> {
        info!("Native host listening");
        while let Some(frame) = read_frame(reader)? {
            let reply = match serde_json::from_slice::<IncomingMessage>(&frame) {
                Ok(message) => self.handle_message(message),
                Err(e) => {
                    warn!("Malformed message from host UI: {e}");
                    Some(OutgoingMessage::Error {
                        message: format!("malformed message: {e}"),
                    })
                }
            };
            if let Some(reply) = reply {
                write_message(&self.writer, &reply)?;
            }
        }
        info!("Host UI closed the connection");
        Ok(())
    }

    /// Forward every block notice to the host UI as an `app_blocked` message.
    /// The thread ends when the notice channel closes.
    pub fn spawn_notice_writer(
        &self,
        notices: Receiver<BlockNotice>,
    ) -> io::Result<JoinHandle<()>> {
        let writer = Arc::clone(&self.writer);
        thread::Builder::new()
            .name("native-host-notices".into())
            .spawn(move || {
                for notice in notices {
                    if let Err(e) = write_message(&writer, &OutgoingMessage::from(notice)) {
                        warn!("Failed to send block notice: {e}");
                        return;
                    }
                }
            })
    }

    fn handle_message(&self, message: IncomingMessage) -> Option<OutgoingMessage> {
        match message {
            IncomingMessage::Broadcast(broadcast) => {
                let delivered = self.sync.broadcast(&broadcast);
                debug!("Broadcast {} delivered to {delivered} receivers", broadcast.action);
                None
            }
            IncomingMessage::PlatformEvent(event) => {
                if let Some(foreground) = event.into_foreground() {
                    self.monitor.foreground(foreground);
                }
                None
            }
            IncomingMessage::OverlayAction { action } => {
                self.monitor.overlay_action(action);
                None
            }
            IncomingMessage::RequestState => Some(match self.monitor.snapshot(STATE_TIMEOUT) {
                Some(snapshot) => OutgoingMessage::State(snapshot),
                None => OutgoingMessage::Error {
                    message: "monitor is not running".into(),
                },
            }),
        }
    }
}

/// Read one frame. `None` means the stream ended cleanly between frames.
fn read_frame<R: Read>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let len = usize::try_from(u32::from_le_bytes(len_bytes))
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    if len > MAX_MESSAGE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Message too large: {len} bytes (max: {MAX_MESSAGE_SIZE} bytes)"),
        ));
    }

    let mut buffer = vec![0u8; len];
    reader.read_exact(&mut buffer)?;
    Ok(Some(buffer))
}

fn write_message<W: Write>(writer: &Mutex<W>, message: &OutgoingMessage) -> io::Result<()> {
    let json = serde_json::to_vec(message)?;
    if json.len() > MAX_MESSAGE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Reply too large: {} bytes", json.len()),
        ));
    }
    let len = u32::try_from(json.len()).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let mut writer = safe_lock(writer, "native host writer");
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&json)?;
    writer.flush()
}
