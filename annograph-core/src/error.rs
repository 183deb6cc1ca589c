//! Error types for annograph-core.

use thiserror::Error;

use crate::anchor::AnchorId;
use crate::annotation::AnnotationId;

/// Result type for annograph-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for annograph-core operations.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// A layer id that the schema does not define.
    #[error("Unknown layer: {0}")]
    UnknownLayer(String),

    /// An annotation id that is not (or no longer) in the graph.
    #[error("Unknown annotation: {0}")]
    UnknownAnnotation(AnnotationId),

    /// An anchor id that is not (or no longer) in the graph.
    #[error("Unknown anchor: {0}")]
    UnknownAnchor(AnchorId),

    /// An anchor that live annotations still start or end at.
    #[error("Anchor {0} is still referenced by annotations")]
    AnchorInUse(AnchorId),

    /// A mutation that would break one of a layer's structural rules.
    #[error("Layer '{layer}' rule violated: {message}")]
    RuleViolation {
        /// Layer whose rule was violated.
        layer: String,
        /// What went wrong.
        message: String,
    },

    /// An offset that cannot be stored (NaN or infinite).
    #[error("Invalid offset: {0}")]
    InvalidOffset(f64),

    /// A string that does not follow the `<graph>__<start>-<end>` format.
    #[error("Invalid fragment id: {0}")]
    InvalidFragmentId(String),

    /// Invalid or inconsistent setup (layers, parameters, patterns).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Input that cannot be reconciled with the graph's existing tokens.
    #[error("Transformation error: {0}")]
    Transformation(String),
}

impl Error {
    /// Create a layer rule violation.
    #[must_use]
    pub fn rule(layer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RuleViolation {
            layer: layer.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a transformation error.
    #[must_use]
    pub fn transformation(msg: impl Into<String>) -> Self {
        Self::Transformation(msg.into())
    }

    /// Create an unknown-layer error.
    #[must_use]
    pub fn unknown_layer(layer: impl Into<String>) -> Self {
        Self::UnknownLayer(layer.into())
    }

    /// True for errors raised by setup calls before any mutation.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::UnknownLayer(_))
    }
}
