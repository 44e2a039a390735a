//! Error types for the network model
//!
//! [`NetworkError`] covers everything that can go wrong while building,
//! mutating, validating or persisting a [`Network`](crate::Network).
//! Algorithm crates wrap it in their own error enums at stage boundaries.
//!
//! # Example
//!
//! ```
//! use redispatch_core::{Bus, Network, NetworkError, NetworkResult};
//!
//! fn build() -> NetworkResult<Network> {
//!     let mut network = Network::new("demo");
//!     network.add_bus(Bus::new("north"))?;
//!     network.add_bus(Bus::new("north"))?;
//!     Ok(network)
//! }
//!
//! assert!(matches!(build(), Err(NetworkError::DuplicateComponent { .. })));
//! ```

use crate::ComponentKind;
use thiserror::Error;

/// Errors raised by the network model.
#[derive(Error, Debug)]
pub enum NetworkError {
    /// A component with the same name already exists in its collection
    #[error("{kind} '{name}' already exists")]
    DuplicateComponent { kind: ComponentKind, name: String },

    /// A component references a bus that is not part of the network
    #[error("{kind} '{component}' references unknown bus '{bus}'")]
    UnknownBus {
        kind: ComponentKind,
        component: String,
        bus: String,
    },

    /// Lookup of a component by name failed
    #[error("{kind} '{name}' not found")]
    UnknownComponent { kind: ComponentKind, name: String },

    /// A time series does not line up with the network snapshots
    #[error("{kind} '{component}' series '{attribute}' has {found} values, expected {expected}")]
    SeriesLength {
        kind: ComponentKind,
        component: String,
        attribute: String,
        expected: usize,
        found: usize,
    },

    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// I/O errors (file access, directory bookkeeping)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using NetworkError.
pub type NetworkResult<T> = Result<T, NetworkError>;

impl From<anyhow::Error> for NetworkError {
    fn from(err: anyhow::Error) -> Self {
        NetworkError::Other(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NetworkError::UnknownBus {
            kind: ComponentKind::Generator,
            component: "coal".into(),
            bus: "DE0 1".into(),
        };
        assert_eq!(
            err.to_string(),
            "Generator 'coal' references unknown bus 'DE0 1'"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: NetworkError = io_err.into();
        assert!(matches!(err, NetworkError::Io(_)));
    }

    #[test]
    fn test_anyhow_conversion_keeps_context() {
        let err = anyhow::anyhow!("disk full").context("writing generators.csv");
        let err: NetworkError = err.into();
        let message = err.to_string();
        assert!(message.contains("writing generators.csv"));
        assert!(message.contains("disk full"));
    }
}
