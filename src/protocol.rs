//! Election protocol data: partitions, frames, and address derivation.

use std::cmp::Ordering;
use std::net::Ipv6Addr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::config::DeviceId;

/// OUI prefix for simulated hardware ids.
const HW_OUI: u64 = 0x000d_6f00_0000_0000;

/// Mesh-local prefix all harness addresses live under.
pub const MESH_LOCAL_PREFIX: [u16; 4] = [0xfdde, 0xad00, 0xbeef, 0x0000];

/// Highest assignable router id.
pub const ROUTER_ID_MAX: u8 = 62;

/// Stable 64-bit hardware identity for a device. Valid before start and
/// used as the topology vertex key.
pub const fn hardware_id(id: DeviceId) -> u64 {
    HW_OUI | id.0 as u64
}

/// Routing locator short address for a router id.
pub const fn rloc16(router_id: u8) -> u16 {
    (router_id as u16) << 10
}

/// Mesh-local endpoint address, derived from the hardware id so it stays
/// stable across reattaches.
pub fn mesh_local_eid(id64: u64) -> Ipv6Addr {
    Ipv6Addr::new(
        MESH_LOCAL_PREFIX[0],
        MESH_LOCAL_PREFIX[1],
        MESH_LOCAL_PREFIX[2],
        MESH_LOCAL_PREFIX[3],
        (id64 >> 48) as u16,
        (id64 >> 32) as u16,
        (id64 >> 16) as u16,
        id64 as u16,
    )
}

/// Routing locator address for a short address.
pub fn rloc_address(rloc16: u16) -> Ipv6Addr {
    Ipv6Addr::new(
        MESH_LOCAL_PREFIX[0],
        MESH_LOCAL_PREFIX[1],
        MESH_LOCAL_PREFIX[2],
        MESH_LOCAL_PREFIX[3],
        0x0000,
        0x00ff,
        0xfe00,
        rloc16,
    )
}

/// A network partition as advertised on the air.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Partition {
    pub id: u32,
    pub weight: u8,
    /// Hardware id of the device that minted this partition.
    pub leader: u64,
}

impl Partition {
    /// Mint a partition for a device taking leadership.
    ///
    /// The id is drawn from an RNG seeded with the leader's hardware id
    /// and its leadership incarnation, so repeated runs produce the same
    /// partition ids and therefore the same merge outcomes.
    pub fn mint(leader: u64, weight: u8, incarnation: u32) -> Self {
        let mut rng = StdRng::seed_from_u64(leader ^ ((incarnation as u64) << 32));
        Partition {
            id: rng.random::<u32>(),
            weight,
            leader,
        }
    }
}

/// When two partitions meet, the greater one absorbs the other. Weight
/// decides; equal weights fall back to the partition id, then to the
/// leader's hardware id, keeping the order total and deterministic.
impl Ord for Partition {
    fn cmp(&self, other: &Self) -> Ordering {
        self.weight
            .cmp(&other.weight)
            .then(self.id.cmp(&other.id))
            .then(self.leader.cmp(&other.leader))
    }
}

impl PartialOrd for Partition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One frame on the shared medium.
///
/// Every frame names its sender; the receiving device applies PAN and
/// allow-list filtering before acting on it.
#[derive(Clone, Copy, Debug)]
pub enum Frame {
    /// Broadcast by a detached device probing for a partition to join.
    ParentRequest { pan: u16, src: u64 },
    /// Answer from an attached router or leader, addressed to the prober.
    ParentResponse {
        pan: u16,
        src: u64,
        dst: u64,
        partition: Partition,
    },
    /// Periodic partition heartbeat from routers and leaders.
    Advertisement {
        pan: u16,
        src: u64,
        partition: Partition,
    },
    /// Child asking its partition leader for a router id.
    RouterIdRequest { pan: u16, src: u64, dst: u64 },
    /// Leader handing out a router id.
    RouterIdAssign {
        pan: u16,
        src: u64,
        dst: u64,
        router_id: u8,
        partition: Partition,
    },
    /// Reachability probe to a unicast address.
    EchoRequest { src: u64, dst: Ipv6Addr, seq: u16 },
    /// Echo answer, addressed to the prober by hardware id.
    EchoReply { src: u64, dst: u64, seq: u16 },
}

impl Frame {
    /// Hardware id of the transmitting device.
    pub const fn src(&self) -> u64 {
        match *self {
            Frame::ParentRequest { src, .. }
            | Frame::ParentResponse { src, .. }
            | Frame::Advertisement { src, .. }
            | Frame::RouterIdRequest { src, .. }
            | Frame::RouterIdAssign { src, .. }
            | Frame::EchoRequest { src, .. }
            | Frame::EchoReply { src, .. } => src,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hardware_id_embeds_device_id() {
        assert_eq!(hardware_id(DeviceId(1)) & 0xff, 1);
        assert_ne!(hardware_id(DeviceId(1)), hardware_id(DeviceId(2)));
    }

    #[test]
    fn test_partition_mint_is_deterministic() {
        let a = Partition::mint(hardware_id(DeviceId(1)), 2, 1);
        let b = Partition::mint(hardware_id(DeviceId(1)), 2, 1);
        assert_eq!(a, b);

        let next_incarnation = Partition::mint(hardware_id(DeviceId(1)), 2, 2);
        assert_ne!(a.id, next_incarnation.id);
    }

    #[test]
    fn test_partition_order_weight_dominates() {
        let heavy = Partition::mint(hardware_id(DeviceId(2)), 3, 1);
        let light = Partition::mint(hardware_id(DeviceId(1)), 1, 1);
        assert!(heavy > light);
    }

    #[test]
    fn test_partition_order_total_on_equal_weight() {
        let a = Partition::mint(hardware_id(DeviceId(1)), 1, 1);
        let b = Partition::mint(hardware_id(DeviceId(2)), 1, 1);
        // Same weight: partition id breaks the tie, so exactly one wins.
        assert_ne!(a.cmp(&b), Ordering::Equal);
        assert_eq!(a.cmp(&b), b.cmp(&a).reverse());

        // Identical ids and weights: the leader id still decides.
        let c = Partition { leader: a.leader + 1, ..a };
        assert!(c > a);
    }

    #[test]
    fn test_address_derivation() {
        let id64 = hardware_id(DeviceId(3));
        let eid = mesh_local_eid(id64);
        assert_eq!(eid.segments()[0], 0xfdde);
        assert_eq!(eid.segments()[7], 3);
        assert_eq!(eid, mesh_local_eid(id64));

        let rloc = rloc_address(rloc16(2));
        assert_eq!(rloc.segments()[6], 0xfe00);
        assert_eq!(rloc.segments()[7], 2 << 10);
        assert_ne!(eid, rloc);
    }

    #[test]
    fn test_frame_src() {
        let id64 = hardware_id(DeviceId(1));
        let frame = Frame::ParentRequest { pan: 0xface, src: id64 };
        assert_eq!(frame.src(), id64);
    }
}
