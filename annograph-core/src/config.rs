//! Per-graph settings.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// What anchor offsets measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetUnits {
    /// Seconds into a recording.
    #[default]
    Seconds,
    /// Character offsets into a text.
    Characters,
    /// Anything else.
    Other,
}

impl fmt::Display for OffsetUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Seconds => "s",
            Self::Characters => "chars",
            Self::Other => "units",
        })
    }
}

/// Settings that shape how a graph stores offsets.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Offsets closer than this are treated as the same point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_granularity: Option<f64>,
    /// Unit of anchor offsets.
    #[serde(default)]
    pub offset_units: OffsetUnits,
}

impl GraphConfig {
    /// Default config: exact offsets, seconds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the offset granularity.
    #[must_use]
    pub fn with_granularity(mut self, granularity: f64) -> Self {
        self.offset_granularity = Some(granularity);
        self
    }

    /// Set the offset units.
    #[must_use]
    pub fn with_units(mut self, units: OffsetUnits) -> Self {
        self.offset_units = units;
        self
    }

    /// Reject non-positive or non-finite granularities.
    pub fn validate(&self) -> Result<()> {
        match self.offset_granularity {
            Some(g) if !(g.is_finite() && g > 0.0) => Err(Error::configuration(format!(
                "offset granularity must be a positive number, got {g}"
            ))),
            _ => Ok(()),
        }
    }
}
