//! In-memory broadcast medium connecting simulated devices.

use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::protocol::Frame;

/// The shared air.
///
/// Every transmission is offered to every other registered device; the
/// receivers apply their own PAN and allow-list filtering. A sender
/// cannot tell who was listening, so delivery to a device whose task has
/// already exited is silently dropped.
#[derive(Clone, Default)]
pub struct Airwaves {
    inner: Arc<Mutex<FxHashMap<u64, UnboundedSender<Frame>>>>,
}

impl Airwaves {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a device on the air. A later registration under the same id
    /// replaces the previous inbox (device restart).
    pub fn register(&self, id64: u64, tx: UnboundedSender<Frame>) {
        self.inner
            .lock()
            .expect("airwaves lock poisoned")
            .insert(id64, tx);
        debug!(id64 = format_args!("{id64:#x}"), "device on the air");
    }

    /// Take a device off the air. No-op if it was never registered.
    pub fn unregister(&self, id64: u64) {
        self.inner
            .lock()
            .expect("airwaves lock poisoned")
            .remove(&id64);
        debug!(id64 = format_args!("{id64:#x}"), "device off the air");
    }

    /// Broadcast a frame to everyone except its sender.
    pub fn transmit(&self, frame: Frame) {
        let src = frame.src();
        let inner = self.inner.lock().expect("airwaves lock poisoned");
        for (id64, tx) in inner.iter() {
            if *id64 != src {
                let _ = tx.send(frame);
            }
        }
    }

    /// Number of devices currently on the air.
    pub fn listener_count(&self) -> usize {
        self.inner.lock().expect("airwaves lock poisoned").len()
    }
}
