//! Boundary to the device backend.
//!
//! The harness drives devices only through [`DeviceDriver`]: the
//! in-process simulated backend in [`crate::node`] implements it, and a
//! driver spawning real firmware could slot in without touching the
//! orchestration layered above.

use std::net::Ipv6Addr;

use smallvec::SmallVec;

use crate::config::DeviceConfig;
use crate::error::HarnessError;
use crate::role::Role;

/// Unicast addresses a device currently holds. Devices hold a handful at
/// most (endpoint id plus routing locators).
pub type AddressSet = SmallVec<[Ipv6Addr; 4]>;

/// Operations the automation layer needs from one device.
///
/// All methods take `&self`: a driver is expected to use interior
/// mutability so topology changes can be pushed to several devices while
/// the arena is borrowed shared. Lifecycle misuse (configure while
/// running, double start) is guarded by [`crate::device::DeviceHandle`];
/// drivers may re-check cheaply but are not required to.
pub trait DeviceDriver: Send {
    /// Store pre-start configuration.
    fn configure(&self, config: &DeviceConfig) -> Result<(), HarnessError>;

    /// Change the election weight, before or after start. The protocol
    /// reads it when leadership is taken, so there is no immediate
    /// observable effect.
    fn set_weight(&self, weight: u8) -> Result<(), HarnessError>;

    /// Bring the device up and begin executing the election protocol.
    fn start(&self) -> Result<(), HarnessError>;

    /// Bring the device down and release its resources.
    fn stop(&self) -> Result<(), HarnessError>;

    /// Current role. `Detached` while stopped or unconverged.
    fn role(&self) -> Role;

    /// Stable hardware identity; valid even before start.
    fn id64(&self) -> u64;

    /// Addresses currently assigned; empty before joining.
    fn addresses(&self) -> AddressSet;

    /// Reachability probe to an address. `Ok(false)` is "no answer
    /// within the probe budget", not an error.
    fn ping(&self, dst: Ipv6Addr) -> Result<bool, HarnessError>;

    /// Permit frames from `peer` (one direction only).
    fn add_allowed_peer(&self, peer: u64) -> Result<(), HarnessError>;

    /// Revoke a previously permitted peer.
    fn remove_allowed_peer(&self, peer: u64) -> Result<(), HarnessError>;

    /// Drop the entire allow-list.
    fn clear_allowed_peers(&self) -> Result<(), HarnessError>;

    /// Enable or disable allow-list enforcement. While disabled the
    /// device accepts every peer.
    fn set_filtering(&self, enabled: bool) -> Result<(), HarnessError>;
}
