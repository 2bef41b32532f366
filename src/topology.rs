//! Directed allow-list topology over the device arena.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::config::DeviceId;
use crate::device::DeviceHandle;
use crate::error::HarnessError;

type Arena = FxHashMap<DeviceId, DeviceHandle>;

/// Owns the permitted-peer graph across all devices in a context.
///
/// An edge `from -> to` means `from` accepts frames transmitted by `to`;
/// it says nothing about the reverse direction. Full connectivity between
/// two devices needs both directions plus filtering enabled on both —
/// [`connect_bidirectional`](TopologyController::connect_bidirectional)
/// inserts both edges in one call so scenario authors cannot forget one.
///
/// Each mutation is mirrored here and pushed down to the affected device
/// through its driver, keyed by the peer's hardware id.
#[derive(Debug, Default)]
pub struct TopologyController {
    edges: FxHashMap<DeviceId, FxHashSet<DeviceId>>,
    filtering: FxHashMap<DeviceId, bool>,
}

fn device(arena: &Arena, id: DeviceId) -> Result<&DeviceHandle, HarnessError> {
    arena.get(&id).ok_or(HarnessError::UnknownDevice(id))
}

impl TopologyController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Permit `from` to hear `to`. Does not imply the reverse edge.
    pub fn add_edge(
        &mut self,
        arena: &Arena,
        from: DeviceId,
        to: DeviceId,
    ) -> Result<(), HarnessError> {
        let peer = device(arena, to)?.id64();
        device(arena, from)?.add_allowed_peer(peer)?;
        self.edges.entry(from).or_default().insert(to);
        debug!(%from, %to, "edge added");
        Ok(())
    }

    /// Revoke one direction of permission.
    pub fn remove_edge(
        &mut self,
        arena: &Arena,
        from: DeviceId,
        to: DeviceId,
    ) -> Result<(), HarnessError> {
        let peer = device(arena, to)?.id64();
        device(arena, from)?.remove_allowed_peer(peer)?;
        if let Some(peers) = self.edges.get_mut(&from) {
            peers.remove(&to);
        }
        debug!(%from, %to, "edge removed");
        Ok(())
    }

    /// Revoke everything `from` is permitted to hear.
    pub fn clear_edges(&mut self, arena: &Arena, from: DeviceId) -> Result<(), HarnessError> {
        device(arena, from)?.clear_allowed_peers()?;
        self.edges.remove(&from);
        debug!(%from, "edges cleared");
        Ok(())
    }

    /// Enable or disable allow-list enforcement on a device.
    pub fn set_filtering(
        &mut self,
        arena: &Arena,
        id: DeviceId,
        enabled: bool,
    ) -> Result<(), HarnessError> {
        device(arena, id)?.set_filtering(enabled)?;
        self.filtering.insert(id, enabled);
        Ok(())
    }

    /// Insert both directions between `a` and `b`.
    pub fn connect_bidirectional(
        &mut self,
        arena: &Arena,
        a: DeviceId,
        b: DeviceId,
    ) -> Result<(), HarnessError> {
        self.add_edge(arena, a, b)?;
        self.add_edge(arena, b, a)
    }

    /// Whether `from` is permitted to hear `to`, per the graph mirror.
    pub fn allows(&self, from: DeviceId, to: DeviceId) -> bool {
        self.edges
            .get(&from)
            .is_some_and(|peers| peers.contains(&to))
    }

    pub fn filtering_enabled(&self, id: DeviceId) -> bool {
        self.filtering.get(&id).copied().unwrap_or(false)
    }

    /// Full bidirectional connectivity: both directions present and both
    /// devices enforcing their allow-lists.
    pub fn connected(&self, a: DeviceId, b: DeviceId) -> bool {
        self.allows(a, b)
            && self.allows(b, a)
            && self.filtering_enabled(a)
            && self.filtering_enabled(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::StubDriver;

    fn arena(count: u8) -> Arena {
        (1..=count)
            .map(|i| {
                let id = DeviceId(i);
                (id, DeviceHandle::new(id, Box::new(StubDriver::new(i))))
            })
            .collect()
    }

    #[test]
    fn test_edges_are_directional() {
        let arena = arena(2);
        let mut topo = TopologyController::new();
        topo.add_edge(&arena, DeviceId(1), DeviceId(2)).unwrap();

        assert!(topo.allows(DeviceId(1), DeviceId(2)));
        assert!(!topo.allows(DeviceId(2), DeviceId(1)));
    }

    #[test]
    fn test_connect_bidirectional_sets_both() {
        let arena = arena(2);
        let mut topo = TopologyController::new();
        topo.connect_bidirectional(&arena, DeviceId(1), DeviceId(2))
            .unwrap();

        assert!(topo.allows(DeviceId(1), DeviceId(2)));
        assert!(topo.allows(DeviceId(2), DeviceId(1)));
    }

    #[test]
    fn test_connected_requires_filtering_on_both() {
        let arena = arena(2);
        let mut topo = TopologyController::new();
        topo.connect_bidirectional(&arena, DeviceId(1), DeviceId(2))
            .unwrap();
        assert!(!topo.connected(DeviceId(1), DeviceId(2)));

        topo.set_filtering(&arena, DeviceId(1), true).unwrap();
        assert!(!topo.connected(DeviceId(1), DeviceId(2)));

        topo.set_filtering(&arena, DeviceId(2), true).unwrap();
        assert!(topo.connected(DeviceId(1), DeviceId(2)));
    }

    #[test]
    fn test_clear_edges_drops_only_one_side() {
        let arena = arena(3);
        let mut topo = TopologyController::new();
        topo.connect_bidirectional(&arena, DeviceId(1), DeviceId(2))
            .unwrap();
        topo.add_edge(&arena, DeviceId(1), DeviceId(3)).unwrap();

        topo.clear_edges(&arena, DeviceId(1)).unwrap();
        assert!(!topo.allows(DeviceId(1), DeviceId(2)));
        assert!(!topo.allows(DeviceId(1), DeviceId(3)));
        assert!(topo.allows(DeviceId(2), DeviceId(1)));
    }

    #[test]
    fn test_unknown_device_is_an_error() {
        let arena = arena(1);
        let mut topo = TopologyController::new();
        let err = topo.add_edge(&arena, DeviceId(1), DeviceId(9)).unwrap_err();
        assert!(matches!(err, HarnessError::UnknownDevice(DeviceId(9))));
    }
}
