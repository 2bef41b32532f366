//! In-process simulated device backend.
//!
//! Each started device runs [`engine::run_node`] as a task on the harness
//! runtime: a `select!` loop over its radio inbox, its command inbox, and
//! a housekeeping interval. The handle side talks to it through
//! [`SimDriver`], which implements [`DeviceDriver`] by publishing shared
//! state (role, weight, addresses, peer filter) and passing commands in.

mod engine;

use std::net::Ipv6Addr;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use rustc_hash::FxHashSet;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::config::{DeviceConfig, DeviceId, Timing};
use crate::driver::{AddressSet, DeviceDriver};
use crate::error::HarnessError;
use crate::protocol;
use crate::radio::Airwaves;
use crate::role::Role;

/// State a device task publishes for the handle side to query, and
/// receive-side filter state both sides mutate.
pub(crate) struct NodeShared {
    role: AtomicU8,
    weight: AtomicU8,
    filtering: AtomicBool,
    allowed: Mutex<FxHashSet<u64>>,
    addresses: Mutex<AddressSet>,
}

impl NodeShared {
    fn new(weight: u8) -> Self {
        NodeShared {
            role: AtomicU8::new(Role::Detached.as_u8()),
            weight: AtomicU8::new(weight),
            filtering: AtomicBool::new(false),
            allowed: Mutex::new(FxHashSet::default()),
            addresses: Mutex::new(AddressSet::new()),
        }
    }

    pub(crate) fn role(&self) -> Role {
        Role::from_u8(self.role.load(Ordering::Relaxed))
    }

    pub(crate) fn set_role(&self, role: Role) {
        self.role.store(role.as_u8(), Ordering::Relaxed);
    }

    pub(crate) fn weight(&self) -> u8 {
        self.weight.load(Ordering::Relaxed)
    }

    pub(crate) fn set_weight(&self, weight: u8) {
        self.weight.store(weight, Ordering::Relaxed);
    }

    pub(crate) fn addresses(&self) -> AddressSet {
        self.addresses.lock().expect("address lock poisoned").clone()
    }

    pub(crate) fn set_addresses(&self, addrs: AddressSet) {
        *self.addresses.lock().expect("address lock poisoned") = addrs;
    }

    pub(crate) fn owns_address(&self, addr: Ipv6Addr) -> bool {
        self.addresses
            .lock()
            .expect("address lock poisoned")
            .contains(&addr)
    }

    /// Receive-side filter: accept a frame from `src`?
    pub(crate) fn accepts(&self, src: u64) -> bool {
        if !self.filtering.load(Ordering::Relaxed) {
            return true;
        }
        self.allowed
            .lock()
            .expect("allow-list lock poisoned")
            .contains(&src)
    }
}

/// Commands from the handle into the device task.
pub(crate) enum Command {
    Ping {
        dst: Ipv6Addr,
        done: oneshot::Sender<bool>,
    },
    Shutdown,
}

enum Backend {
    Idle {
        config: DeviceConfig,
    },
    Running {
        config: DeviceConfig,
        cmd_tx: mpsc::UnboundedSender<Command>,
        task: tokio::task::JoinHandle<()>,
    },
}

/// Driver for one simulated device.
pub struct SimDriver {
    id: DeviceId,
    id64: u64,
    timing: Timing,
    air: Airwaves,
    runtime: Handle,
    shared: Arc<NodeShared>,
    backend: Mutex<Backend>,
}

impl SimDriver {
    pub fn new(id: DeviceId, timing: Timing, air: Airwaves, runtime: Handle) -> Self {
        let config = DeviceConfig::default();
        SimDriver {
            id,
            id64: protocol::hardware_id(id),
            timing,
            air,
            runtime,
            shared: Arc::new(NodeShared::new(config.weight)),
            backend: Mutex::new(Backend::Idle { config }),
        }
    }

    fn backend(&self) -> std::sync::MutexGuard<'_, Backend> {
        self.backend.lock().expect("backend lock poisoned")
    }
}

impl DeviceDriver for SimDriver {
    fn configure(&self, config: &DeviceConfig) -> Result<(), HarnessError> {
        match &mut *self.backend() {
            Backend::Idle { config: stored } => {
                *stored = *config;
                self.shared.set_weight(config.weight);
                Ok(())
            }
            Backend::Running { .. } => Err(HarnessError::configuration(
                self.id,
                "configure while running",
            )),
        }
    }

    fn set_weight(&self, weight: u8) -> Result<(), HarnessError> {
        if let Backend::Idle { config } = &mut *self.backend() {
            config.weight = weight;
        }
        self.shared.set_weight(weight);
        Ok(())
    }

    fn start(&self) -> Result<(), HarnessError> {
        let mut backend = self.backend();
        let config = match &*backend {
            Backend::Running { .. } => {
                return Err(HarnessError::configuration(self.id, "already started"))
            }
            Backend::Idle { config } => *config,
        };

        let (air_tx, air_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        self.air.register(self.id64, air_tx);

        let node = engine::NodeState::new(
            self.id,
            self.id64,
            config,
            self.timing,
            self.air.clone(),
            Arc::clone(&self.shared),
        );
        let task = self.runtime.spawn(engine::run_node(node, air_rx, cmd_rx));

        *backend = Backend::Running {
            config,
            cmd_tx,
            task,
        };
        Ok(())
    }

    fn stop(&self) -> Result<(), HarnessError> {
        let mut backend = self.backend();
        if let Backend::Running { config, .. } = *backend {
            let previous = std::mem::replace(&mut *backend, Backend::Idle { config });
            if let Backend::Running { cmd_tx, .. } = previous {
                self.air.unregister(self.id64);
                let _ = cmd_tx.send(Command::Shutdown);
            }
            self.shared.set_role(Role::Detached);
            self.shared.set_addresses(AddressSet::new());
            debug!(device = %self.id, "simulated device stopped");
        }
        Ok(())
    }

    fn role(&self) -> Role {
        self.shared.role()
    }

    fn id64(&self) -> u64 {
        self.id64
    }

    fn addresses(&self) -> AddressSet {
        self.shared.addresses()
    }

    fn ping(&self, dst: Ipv6Addr) -> Result<bool, HarnessError> {
        let done_rx = {
            let backend = self.backend();
            let cmd_tx = match &*backend {
                Backend::Running { cmd_tx, .. } => cmd_tx,
                Backend::Idle { .. } => {
                    return Err(HarnessError::resource(self.id, "ping on a stopped device"))
                }
            };
            let (done_tx, done_rx) = oneshot::channel();
            cmd_tx
                .send(Command::Ping { dst, done: done_tx })
                .map_err(|_| HarnessError::resource(self.id, "device task gone"))?;
            done_rx
        };

        let ping_timeout = self.timing.ping_timeout;
        let outcome = self
            .runtime
            .block_on(async { tokio::time::timeout(ping_timeout, done_rx).await });
        Ok(matches!(outcome, Ok(Ok(true))))
    }

    fn add_allowed_peer(&self, peer: u64) -> Result<(), HarnessError> {
        self.shared
            .allowed
            .lock()
            .expect("allow-list lock poisoned")
            .insert(peer);
        Ok(())
    }

    fn remove_allowed_peer(&self, peer: u64) -> Result<(), HarnessError> {
        self.shared
            .allowed
            .lock()
            .expect("allow-list lock poisoned")
            .remove(&peer);
        Ok(())
    }

    fn clear_allowed_peers(&self) -> Result<(), HarnessError> {
        self.shared
            .allowed
            .lock()
            .expect("allow-list lock poisoned")
            .clear();
        Ok(())
    }

    fn set_filtering(&self, enabled: bool) -> Result<(), HarnessError> {
        self.shared.filtering.store(enabled, Ordering::Relaxed);
        Ok(())
    }
}

impl Drop for SimDriver {
    fn drop(&mut self) {
        // Hard kill on drop, mirroring stop() without the graceful drain.
        if let Backend::Running { cmd_tx, task, .. } = &*self.backend() {
            self.air.unregister(self.id64);
            let _ = cmd_tx.send(Command::Shutdown);
            task.abort();
        }
    }
}
