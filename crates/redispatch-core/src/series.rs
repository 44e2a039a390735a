//! Snapshot-indexed attributes
//!
//! Most time-dependent attributes (`p_max_pu`, `p_set`, ...) are "switchable":
//! they carry a static default and may optionally be overridden by one value
//! per snapshot. Reading a snapshot that has no explicit value falls back to
//! the static default, so a missing series never produces a hole.

use serde::{Deserialize, Serialize};

/// A static value with an optional per-snapshot override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSeries {
    default: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    values: Option<Vec<f64>>,
}

impl SnapshotSeries {
    /// Static value applied to every snapshot.
    pub fn constant(value: f64) -> Self {
        Self {
            default: value,
            values: None,
        }
    }

    /// Per-snapshot values on top of a static default of zero.
    pub fn from_values(values: Vec<f64>) -> Self {
        Self {
            default: 0.0,
            values: Some(values),
        }
    }

    /// Replace the static default, keeping any per-snapshot values.
    pub fn with_default(mut self, default: f64) -> Self {
        self.default = default;
        self
    }

    pub fn static_value(&self) -> f64 {
        self.default
    }

    pub fn values(&self) -> Option<&[f64]> {
        self.values.as_deref()
    }

    pub fn is_varying(&self) -> bool {
        self.values.is_some()
    }

    /// Value at snapshot `t`, falling back to the static default.
    #[inline]
    pub fn get(&self, t: usize) -> f64 {
        self.values
            .as_ref()
            .and_then(|v| v.get(t).copied())
            .unwrap_or(self.default)
    }

    /// Dense view over `len` snapshots.
    pub fn to_dense(&self, len: usize) -> Vec<f64> {
        (0..len).map(|t| self.get(t)).collect()
    }

    pub fn set_values(&mut self, values: Vec<f64>) {
        self.values = Some(values);
    }

    pub fn set_static(&mut self, value: f64) {
        self.default = value;
        self.values = None;
    }
}

impl Default for SnapshotSeries {
    fn default() -> Self {
        Self::constant(0.0)
    }
}

impl From<f64> for SnapshotSeries {
    fn from(value: f64) -> Self {
        Self::constant(value)
    }
}

impl From<Vec<f64>> for SnapshotSeries {
    fn from(values: Vec<f64>) -> Self {
        Self::from_values(values)
    }
}
