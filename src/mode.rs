//! Device capability flags.

use std::fmt;

use serde::Serialize;

/// Operating mode of a device, fixed before start.
///
/// The compact letter form matches the automation command syntax used by
/// conformance scripts: `r` rx-on-when-idle, `s` secure, `d` full-function
/// device, `n` full network data. `"rsdn"` is the usual router-capable
/// configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DeviceMode {
    pub rx_on_when_idle: bool,
    pub secure: bool,
    pub full_function: bool,
    pub full_network_data: bool,
}

impl DeviceMode {
    /// All flags set (`"rsdn"`).
    pub const fn full() -> Self {
        DeviceMode {
            rx_on_when_idle: true,
            secure: true,
            full_function: true,
            full_network_data: true,
        }
    }

    /// A device may hold a router id only when it is a full-function
    /// device with its receiver always on.
    pub const fn router_eligible(self) -> bool {
        self.full_function && self.rx_on_when_idle
    }
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rx_on_when_idle {
            write!(f, "r")?;
        }
        if self.secure {
            write!(f, "s")?;
        }
        if self.full_function {
            write!(f, "d")?;
        }
        if self.full_network_data {
            write!(f, "n")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for DeviceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut mode = DeviceMode::default();
        for c in s.chars() {
            match c {
                'r' => mode.rx_on_when_idle = true,
                's' => mode.secure = true,
                'd' => mode.full_function = true,
                'n' => mode.full_network_data = true,
                other => return Err(format!("invalid mode flag '{}': use r, s, d, n", other)),
            }
        }
        Ok(mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse_roundtrip() {
        let mode: DeviceMode = "rsdn".parse().unwrap();
        assert_eq!(mode, DeviceMode::full());
        assert_eq!(mode.to_string(), "rsdn");

        let mode: DeviceMode = "rs".parse().unwrap();
        assert!(mode.rx_on_when_idle);
        assert!(mode.secure);
        assert!(!mode.full_function);
        assert_eq!(mode.to_string(), "rs");
    }

    #[test]
    fn test_mode_invalid_flag() {
        assert!("rsx".parse::<DeviceMode>().is_err());
    }

    #[test]
    fn test_router_eligibility() {
        assert!(DeviceMode::full().router_eligible());
        let sleepy: DeviceMode = "sn".parse().unwrap();
        assert!(!sleepy.router_eligible());
        let no_ffd: DeviceMode = "rsn".parse().unwrap();
        assert!(!no_ffd.router_eligible());
    }
}
