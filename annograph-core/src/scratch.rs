//! Pass-scoped side maps for transient per-annotation state.
//!
//! A pass that needs to remember "already visited" or a score per
//! annotation keeps a [`Scratch`] next to the graph instead of writing into
//! the annotations, so the model stays closed and serializable.
//!
//! ```rust
//! use annograph_core::{Graph, Schema, Scratch, Confidence};
//!
//! let mut graph = Graph::new("g", Schema::conventional());
//! let start = graph.get_or_create_anchor_at(0.0, Confidence::Manual).unwrap();
//! let end = graph.get_or_create_anchor_at(1.0, Confidence::Manual).unwrap();
//! let who = graph.create_annotation("participant", "A", start, start, None).unwrap();
//!
//! let mut visited: Scratch<bool> = Scratch::new();
//! visited.insert(who, true);
//! assert_eq!(visited.get(who), Some(&true));
//! # let _ = end;
//! ```

use std::collections::HashMap;

use crate::annotation::AnnotationId;
use crate::graph::Graph;

/// Map from annotation id to per-pass state.
#[derive(Debug, Clone)]
pub struct Scratch<T> {
    values: HashMap<AnnotationId, T>,
}

impl<T> Default for Scratch<T> {
    fn default() -> Self {
        Self {
            values: HashMap::new(),
        }
    }
}

impl<T> Scratch<T> {
    /// Empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value for an annotation.
    #[must_use]
    pub fn get(&self, id: AnnotationId) -> Option<&T> {
        self.values.get(&id)
    }

    /// Mutable value for an annotation.
    pub fn get_mut(&mut self, id: AnnotationId) -> Option<&mut T> {
        self.values.get_mut(&id)
    }

    /// Set a value, returning the previous one.
    pub fn insert(&mut self, id: AnnotationId, value: T) -> Option<T> {
        self.values.insert(id, value)
    }

    /// Remove a value.
    pub fn remove(&mut self, id: AnnotationId) -> Option<T> {
        self.values.remove(&id)
    }

    /// True if the annotation has a value.
    #[must_use]
    pub fn contains(&self, id: AnnotationId) -> bool {
        self.values.contains_key(&id)
    }

    /// Value for an annotation, inserting `make()` first if absent.
    pub fn get_or_insert_with(&mut self, id: AnnotationId, make: impl FnOnce() -> T) -> &mut T {
        self.values.entry(id).or_insert_with(make)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Drop entries whose annotation is no longer live in `graph`.
    pub fn retain_live(&mut self, graph: &Graph) {
        self.values
            .retain(|id, _| graph.get(*id).map_or(false, |a| a.is_live()));
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl Scratch<()> {
    /// Mark an annotation; returns false if it was already marked.
    pub fn mark(&mut self, id: AnnotationId) -> bool {
        self.values.insert(id, ()).is_none()
    }
}
