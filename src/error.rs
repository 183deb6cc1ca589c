//! Error types for annograph.

use std::fmt;
use thiserror::Error;

/// Result type for annograph operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Where in a graph a transformation failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformContext {
    /// Graph (or fragment) being transformed.
    pub graph_id: Option<String>,
    /// Unit of work within the graph, e.g. an utterance label or chunk number.
    pub chunk: Option<String>,
    /// Start of the offending range.
    pub start: Option<f64>,
    /// End of the offending range.
    pub end: Option<f64>,
}

impl TransformContext {
    /// Context naming only the graph.
    #[must_use]
    pub fn graph(graph_id: impl Into<String>) -> Self {
        Self {
            graph_id: Some(graph_id.into()),
            ..Self::default()
        }
    }

    /// Add the chunk description.
    #[must_use]
    pub fn with_chunk(mut self, chunk: impl Into<String>) -> Self {
        self.chunk = Some(chunk.into());
        self
    }

    /// Add the offset range.
    #[must_use]
    pub fn with_range(mut self, start: Option<f64>, end: Option<f64>) -> Self {
        self.start = start;
        self.end = end;
        self
    }
}

impl fmt::Display for TransformContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.graph_id.as_deref().unwrap_or("<graph>"))?;
        if let Some(chunk) = &self.chunk {
            write!(f, " [{chunk}]")?;
        }
        match (self.start, self.end) {
            (Some(s), Some(e)) => write!(f, " {s}-{e}"),
            (Some(s), None) => write!(f, " from {s}"),
            (None, Some(e)) => write!(f, " until {e}"),
            (None, None) => Ok(()),
        }
    }
}

/// Error type for annograph operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Error raised by the graph model.
    #[error(transparent)]
    Graph(#[from] annograph_core::Error),

    /// Missing or inconsistent setup: schema, task parameters, layer ids.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// External output that could not be reconciled with the graph.
    #[error("Transformation error at {context}: {message}")]
    Transformation {
        /// What went wrong.
        message: String,
        /// Where it went wrong.
        context: TransformContext,
    },

    /// Malformed input or output stream.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The task was cancelled before it finished.
    #[error("Cancelled")]
    Cancelled,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a transformation error with positional context.
    pub fn transformation(msg: impl Into<String>, context: TransformContext) -> Self {
        Error::Transformation {
            message: msg.into(),
            context,
        }
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Error::Serialization(msg.into())
    }

    /// Attach a fragment's id and window to a transformation error that
    /// does not name a graph yet.
    pub(crate) fn in_fragment(self, fragment: &annograph_core::Graph) -> Self {
        let window = || {
            let source = fragment.source();
            TransformContext::graph(fragment.id()).with_range(source.map(|s| s.start), source.map(|s| s.end))
        };
        match self {
            Error::Graph(annograph_core::Error::Transformation(message)) => Error::transformation(message, window()),
            Error::Transformation { message, context } if context.graph_id.is_none() => {
                let mut located = window();
                located.chunk = context.chunk;
                Error::transformation(message, located)
            }
            other => other,
        }
    }

    /// True for setup errors, raised before anything was mutated.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        match self {
            Error::Configuration(_) => true,
            Error::Graph(inner) => inner.is_configuration(),
            _ => false,
        }
    }
}
