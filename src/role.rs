//! Device role enum for the mesh election protocol.

use std::fmt;

use serde::Serialize;

/// Current role of a device in its partition.
///
/// Only meaningful while the device is running; a stopped device always
/// reports `Detached`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Not attached to any partition (starting up, reattaching, or stopped).
    #[default]
    Detached,

    /// Attached through a parent; not yet (or not eligible to be) a router.
    Child,

    /// Attached with a router id; advertises its partition and answers
    /// parent requests.
    Router,

    /// Elected head of the partition; assigns router ids.
    Leader,
}

impl Role {
    /// Convert to u8 for atomic storage.
    pub const fn as_u8(self) -> u8 {
        match self {
            Role::Detached => 0,
            Role::Child => 1,
            Role::Router => 2,
            Role::Leader => 3,
        }
    }

    /// Convert from u8, defaulting to Detached for invalid values.
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => Role::Child,
            2 => Role::Router,
            3 => Role::Leader,
            _ => Role::Detached,
        }
    }

    /// Check if this role belongs to a partition.
    pub const fn is_attached(self) -> bool {
        !matches!(self, Role::Detached)
    }

    /// Check if this role answers parent requests and advertises.
    pub const fn is_router_or_leader(self) -> bool {
        matches!(self, Role::Router | Role::Leader)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Detached => write!(f, "detached"),
            Role::Child => write!(f, "child"),
            Role::Router => write!(f, "router"),
            Role::Leader => write!(f, "leader"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "detached" => Ok(Role::Detached),
            "child" => Ok(Role::Child),
            "router" => Ok(Role::Router),
            "leader" => Ok(Role::Leader),
            _ => Err(format!(
                "invalid role '{}': use detached, child, router, or leader",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_default() {
        assert_eq!(Role::default(), Role::Detached);
    }

    #[test]
    fn test_role_u8_roundtrip() {
        for role in [Role::Detached, Role::Child, Role::Router, Role::Leader] {
            assert_eq!(Role::from_u8(role.as_u8()), role);
        }
        assert_eq!(Role::from_u8(200), Role::Detached);
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("detached".parse::<Role>().unwrap(), Role::Detached);
        assert_eq!("child".parse::<Role>().unwrap(), Role::Child);
        assert_eq!("router".parse::<Role>().unwrap(), Role::Router);
        assert_eq!("leader".parse::<Role>().unwrap(), Role::Leader);
        assert!("coordinator".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_display() {
        assert_eq!(format!("{}", Role::Detached), "detached");
        assert_eq!(format!("{}", Role::Leader), "leader");
    }

    #[test]
    fn test_role_checks() {
        assert!(!Role::Detached.is_attached());
        assert!(Role::Child.is_attached());
        assert!(!Role::Child.is_router_or_leader());
        assert!(Role::Router.is_router_or_leader());
        assert!(Role::Leader.is_router_or_leader());
    }
}
