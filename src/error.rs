//! Error taxonomy for the conformance harness.
//!
//! A small hand-written enum with manual [`Display`] and [`std::error::Error`]
//! implementations (no derive macros), mirroring the teacher's `SkipReason`
//! style.

use std::error::Error;
use std::fmt;

use crate::config::DeviceId;

/// Errors surfaced while driving devices through a scenario.
#[derive(Debug)]
pub enum HarnessError {
    /// A device was configured incorrectly or in an invalid state.
    Configuration {
        /// Device the error concerns.
        device: DeviceId,
        /// Human-readable explanation.
        message: String,
    },
    /// A runtime resource was unavailable (stopped device, torn-down handle).
    Resource {
        /// Device the error concerns.
        device: DeviceId,
        /// Human-readable explanation.
        message: String,
    },
    /// A device id was referenced that the context does not know about.
    UnknownDevice(DeviceId),
    /// An error originating from the underlying infrastructure (e.g. runtime).
    Infrastructure(String),
}

impl HarnessError {
    /// Construct a [`HarnessError::Configuration`] for `device`.
    pub fn configuration(device: DeviceId, message: impl Into<String>) -> Self {
        HarnessError::Configuration {
            device,
            message: message.into(),
        }
    }

    /// Construct a [`HarnessError::Resource`] for `device`.
    pub fn resource(device: DeviceId, message: impl Into<String>) -> Self {
        HarnessError::Resource {
            device,
            message: message.into(),
        }
    }
}

impl fmt::Display for HarnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HarnessError::Configuration { device, message } => {
                write!(f, "configuration error on device {device}: {message}")
            }
            HarnessError::Resource { device, message } => {
                write!(f, "resource error on device {device}: {message}")
            }
            HarnessError::UnknownDevice(device) => {
                write!(f, "unknown device {device}")
            }
            HarnessError::Infrastructure(message) => {
                write!(f, "infrastructure error: {message}")
            }
        }
    }
}

impl Error for HarnessError {}
