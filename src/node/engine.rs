//! Device event loop: attach, election, advertisement, echo.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::oneshot;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::config::{DeviceConfig, DeviceId, Timing};
use crate::driver::AddressSet;
use crate::protocol::{self, Frame, Partition, ROUTER_ID_MAX};
use crate::radio::Airwaves;
use crate::role::Role;

use super::{Command, NodeShared};

/// Where the device is in its attach lifecycle.
#[derive(Clone, Copy)]
enum Phase {
    /// Probing for parents until the deadline. `best` is the strongest
    /// partition that answered so far and the responder it came from.
    Probing {
        deadline: Instant,
        best: Option<(Partition, u64)>,
    },
    /// Attached as child, asking the leader for a router id.
    Upgrading { next_request_at: Instant },
    /// Attached (or leading) with nothing pending.
    Settled,
}

pub(crate) struct NodeState {
    id: DeviceId,
    id64: u64,
    config: DeviceConfig,
    timing: Timing,
    air: Airwaves,
    shared: Arc<NodeShared>,

    phase: Phase,
    partition: Option<Partition>,
    parent: Option<u64>,
    router_id: Option<u8>,

    /// Leader-side router id allocator: next free id and the ids already
    /// handed out, keyed by requester so retries get the same answer.
    next_router_id: u8,
    allocated: FxHashMap<u64, u8>,

    /// Last time anything from the current partition was heard.
    last_heard: Instant,
    next_advertisement_at: Instant,

    /// Times this device has taken leadership; salts the partition id.
    incarnations: u32,

    /// Echo probes in flight: seq -> (completion, deadline).
    pending_echo: FxHashMap<u16, (oneshot::Sender<bool>, Instant)>,
    echo_seq: u16,
}

impl NodeState {
    pub(crate) fn new(
        id: DeviceId,
        id64: u64,
        config: DeviceConfig,
        timing: Timing,
        air: Airwaves,
        shared: Arc<NodeShared>,
    ) -> Self {
        let now = Instant::now();
        NodeState {
            id,
            id64,
            config,
            timing,
            air,
            shared,
            phase: Phase::Settled,
            partition: None,
            parent: None,
            router_id: None,
            next_router_id: 0,
            allocated: FxHashMap::default(),
            last_heard: now,
            next_advertisement_at: now,
            incarnations: 0,
            pending_echo: FxHashMap::default(),
            echo_seq: 0,
        }
    }

    /// Drop any partition state and start probing for parents.
    fn begin_probe(&mut self) {
        self.partition = None;
        self.parent = None;
        self.router_id = None;
        self.shared.set_role(Role::Detached);
        self.shared.set_addresses(AddressSet::new());
        self.phase = Phase::Probing {
            deadline: Instant::now() + self.timing.attach_window,
            best: None,
        };
        self.air.transmit(Frame::ParentRequest {
            pan: self.config.pan_id,
            src: self.id64,
        });
        debug!(device = %self.id, "probing for parents");
    }

    /// No parent answered: this segment is empty, take leadership.
    ///
    /// Weight is read here, not at start, so a live `set_weight` before
    /// the election is honored.
    fn take_leadership(&mut self) {
        self.incarnations += 1;
        let weight = self.shared.weight();
        let partition = Partition::mint(self.id64, weight, self.incarnations);

        self.allocated.clear();
        self.next_router_id = 0;
        let router_id = self.allocate_router_id(self.id64).unwrap_or(0);

        self.partition = Some(partition);
        self.parent = None;
        self.router_id = Some(router_id);
        self.shared.set_role(Role::Leader);
        self.publish_addresses();

        let now = Instant::now();
        self.last_heard = now;
        self.phase = Phase::Settled;
        info!(
            device = %self.id,
            partition = partition.id,
            weight,
            "no partition found, taking leadership"
        );
        self.advertise(now);
    }

    /// Join the strongest partition that answered the probe.
    fn attach(&mut self, partition: Partition, parent: u64) {
        self.partition = Some(partition);
        self.parent = Some(parent);
        self.router_id = None;
        self.shared.set_role(Role::Child);
        self.publish_addresses();
        self.last_heard = Instant::now();
        info!(
            device = %self.id,
            partition = partition.id,
            parent = format_args!("{parent:#x}"),
            "attached as child"
        );

        if self.config.mode.router_eligible() {
            self.request_router_id();
        } else {
            self.phase = Phase::Settled;
        }
    }

    fn request_router_id(&mut self) {
        if let Some(partition) = self.partition {
            self.air.transmit(Frame::RouterIdRequest {
                pan: self.config.pan_id,
                src: self.id64,
                dst: partition.leader,
            });
            self.phase = Phase::Upgrading {
                next_request_at: Instant::now() + self.timing.advertisement_interval,
            };
        }
    }

    fn become_router(&mut self, router_id: u8) {
        self.router_id = Some(router_id);
        self.shared.set_role(Role::Router);
        self.publish_addresses();
        self.phase = Phase::Settled;
        let now = Instant::now();
        info!(device = %self.id, router_id, "upgraded to router");
        self.advertise(now);
    }

    /// Recompute the address set for the current role: the mesh-local
    /// endpoint once attached, plus a routing locator when holding a
    /// router id.
    fn publish_addresses(&mut self) {
        let mut addrs = AddressSet::new();
        if self.partition.is_some() {
            addrs.push(protocol::mesh_local_eid(self.id64));
            if let Some(router_id) = self.router_id {
                addrs.push(protocol::rloc_address(protocol::rloc16(router_id)));
            }
        }
        self.shared.set_addresses(addrs);
    }

    fn allocate_router_id(&mut self, requester: u64) -> Option<u8> {
        if let Some(&assigned) = self.allocated.get(&requester) {
            return Some(assigned);
        }
        if self.next_router_id > ROUTER_ID_MAX {
            warn!(device = %self.id, "router id space exhausted");
            return None;
        }
        let router_id = self.next_router_id;
        self.next_router_id += 1;
        self.allocated.insert(requester, router_id);
        Some(router_id)
    }

    fn advertise(&mut self, now: Instant) {
        if let Some(partition) = self.partition {
            if self.shared.role().is_router_or_leader() {
                self.air.transmit(Frame::Advertisement {
                    pan: self.config.pan_id,
                    src: self.id64,
                    partition,
                });
                self.next_advertisement_at = now + self.timing.advertisement_interval;
            }
        }
    }

    /// React to a partition heard on the air.
    fn observe_partition(&mut self, heard: Partition) {
        match self.partition {
            Some(current) if current.id == heard.id => {
                self.last_heard = Instant::now();
            }
            Some(current) if heard > current => {
                info!(
                    device = %self.id,
                    ours = current.id,
                    theirs = heard.id,
                    "stronger partition heard, reattaching"
                );
                self.begin_probe();
            }
            // Ours wins: the other side migrates. Detached devices only
            // join through the parent request handshake.
            _ => {}
        }
    }

    pub(crate) fn handle_frame(&mut self, frame: Frame) {
        if !self.shared.accepts(frame.src()) {
            return;
        }

        match frame {
            Frame::ParentRequest { pan, src } => {
                if pan != self.config.pan_id {
                    return;
                }
                if let Some(partition) = self.partition {
                    if self.shared.role().is_router_or_leader() {
                        self.air.transmit(Frame::ParentResponse {
                            pan,
                            src: self.id64,
                            dst: src,
                            partition,
                        });
                    }
                }
            }

            Frame::ParentResponse {
                pan,
                src,
                dst,
                partition,
            } => {
                if pan != self.config.pan_id || dst != self.id64 {
                    return;
                }
                if let Phase::Probing { best, .. } = &mut self.phase {
                    let better = best.map_or(true, |(current, _)| partition > current);
                    if better {
                        *best = Some((partition, src));
                    }
                }
            }

            Frame::Advertisement { pan, partition, .. } => {
                if pan != self.config.pan_id {
                    return;
                }
                self.observe_partition(partition);
            }

            Frame::RouterIdRequest { pan, src, dst } => {
                if pan != self.config.pan_id || dst != self.id64 {
                    return;
                }
                if self.shared.role() != Role::Leader {
                    return;
                }
                let partition = match self.partition {
                    Some(p) => p,
                    None => return,
                };
                if let Some(router_id) = self.allocate_router_id(src) {
                    self.air.transmit(Frame::RouterIdAssign {
                        pan,
                        src: self.id64,
                        dst: src,
                        router_id,
                        partition,
                    });
                }
            }

            Frame::RouterIdAssign {
                pan,
                dst,
                router_id,
                partition,
                ..
            } => {
                if pan != self.config.pan_id || dst != self.id64 {
                    return;
                }
                let ours = match self.partition {
                    Some(p) => p.id == partition.id,
                    None => false,
                };
                if ours && matches!(self.phase, Phase::Upgrading { .. }) {
                    self.last_heard = Instant::now();
                    self.become_router(router_id);
                }
            }

            Frame::EchoRequest { src, dst, seq } => {
                if self.shared.owns_address(dst) {
                    self.air.transmit(Frame::EchoReply {
                        src: self.id64,
                        dst: src,
                        seq,
                    });
                }
            }

            Frame::EchoReply { dst, seq, .. } => {
                if dst != self.id64 {
                    return;
                }
                if let Some((done, _)) = self.pending_echo.remove(&seq) {
                    let _ = done.send(true);
                }
            }
        }
    }

    /// Returns true when the task should exit.
    pub(crate) fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Ping { dst, done } => {
                let seq = self.echo_seq;
                self.echo_seq = self.echo_seq.wrapping_add(1);
                self.pending_echo
                    .insert(seq, (done, Instant::now() + self.timing.ping_timeout));
                self.air.transmit(Frame::EchoRequest {
                    src: self.id64,
                    dst,
                    seq,
                });
                false
            }
            Command::Shutdown => true,
        }
    }

    pub(crate) fn handle_tick(&mut self) {
        let now = Instant::now();

        match self.phase {
            Phase::Probing { deadline, best } => {
                if now >= deadline {
                    match best {
                        Some((partition, parent)) => self.attach(partition, parent),
                        None => self.take_leadership(),
                    }
                }
            }
            Phase::Upgrading { next_request_at } => {
                if now >= next_request_at {
                    self.request_router_id();
                }
            }
            Phase::Settled => {}
        }

        // Partition watchdog: an attached non-leader that heard nothing
        // for a full leader timeout starts over.
        let role = self.shared.role();
        if role.is_attached()
            && role != Role::Leader
            && now.duration_since(self.last_heard) > self.timing.leader_timeout
        {
            warn!(
                device = %self.id,
                parent = ?self.parent,
                "partition went silent, reattaching"
            );
            self.begin_probe();
        }

        if self.shared.role().is_router_or_leader() && now >= self.next_advertisement_at {
            self.advertise(now);
        }

        // Expire echo probes whose budget ran out.
        let expired: Vec<u16> = self
            .pending_echo
            .iter()
            .filter(|(_, (_, deadline))| now >= *deadline)
            .map(|(&seq, _)| seq)
            .collect();
        for seq in expired {
            if let Some((done, _)) = self.pending_echo.remove(&seq) {
                let _ = done.send(false);
            }
        }
    }
}

/// Event loop for one simulated device.
pub(crate) async fn run_node(
    mut node: NodeState,
    mut air_rx: UnboundedReceiver<Frame>,
    mut cmd_rx: UnboundedReceiver<Command>,
) {
    node.begin_probe();

    let mut housekeeping = time::interval(node.timing.tick);
    housekeeping.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            frame = air_rx.recv() => match frame {
                Some(frame) => node.handle_frame(frame),
                None => break,
            },
            command = cmd_rx.recv() => match command {
                Some(command) => {
                    if node.handle_command(command) {
                        break;
                    }
                }
                None => break,
            },
            _ = housekeeping.tick() => node.handle_tick(),
        }
    }

    debug!(device = %node.id, "device task exiting");
}
