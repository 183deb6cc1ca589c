//! Change tracking: which anchors and annotations a pass created, updated
//! or destroyed, and what the updated attributes held before.
//!
//! # Lifecycle
//!
//! ```text
//!               create                update (n times)
//!   (absent) ───────────▶ Create ─────────────────────▶ Create
//!                            │ destroy
//!                            ▼
//!                        (dropped from the record; entity removed on commit)
//!
//!               update                update (n times)
//!   Unchanged ──────────▶ Update ─────────────────────▶ Update
//!       │                    │ destroy
//!       │ destroy            ▼
//!       └──────────────▶ Destroy   (queryable until commit)
//! ```
//!
//! Only the first old value of each attribute is kept, so
//! [`ChangeTracker::original`] answers "what was here before this pass",
//! no matter how often the pass rewrote it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::anchor::AnchorId;
use crate::annotation::AnnotationId;
use crate::confidence::Confidence;

/// Lifecycle tag carried by anchors and annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Untouched since tracking started (or tracking is off).
    #[default]
    Unchanged,
    /// Created while tracking.
    Create,
    /// Existed before and had an attribute changed.
    Update,
    /// Destroyed; removed at the next commit.
    Destroy,
}

impl ChangeKind {
    /// Used by serde to omit the default tag.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        *self == Self::Unchanged
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unchanged => "unchanged",
            Self::Create => "create",
            Self::Update => "update",
            Self::Destroy => "destroy",
        };
        f.write_str(s)
    }
}

/// Reference to either kind of tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum EntityRef {
    /// An anchor.
    Anchor(AnchorId),
    /// An annotation.
    Annotation(AnnotationId),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anchor(id) => id.fmt(f),
            Self::Annotation(id) => id.fmt(f),
        }
    }
}

/// A tracked attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Attribute {
    /// Annotation label.
    Label,
    /// Anchor offset.
    Offset,
    /// Anchor or annotation confidence.
    Confidence,
    /// Annotation parent.
    Parent,
    /// Annotation ordinal.
    Ordinal,
    /// Annotation start anchor.
    Start,
    /// Annotation end anchor.
    End,
}

/// An attribute value as it was before a change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    /// A label.
    Text(String),
    /// An offset.
    Offset(Option<f64>),
    /// A confidence.
    Confidence(Confidence),
    /// A parent.
    Parent(Option<AnnotationId>),
    /// An ordinal.
    Ordinal(u32),
    /// An anchor reference.
    Anchor(AnchorId),
}

/// One entity's net change, as reported by [`crate::Graph::changes`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// What changed.
    pub entity: EntityRef,
    /// How.
    pub kind: ChangeKind,
    /// For updates: attributes touched and their values before the pass.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub originals: Vec<(Attribute, Value)>,
}

/// Record of changes since tracking started (or since the last commit).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeTracker {
    operations: BTreeMap<EntityRef, ChangeKind>,
    originals: BTreeMap<EntityRef, BTreeMap<Attribute, Value>>,
}

impl ChangeTracker {
    /// Empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a creation.
    pub fn created(&mut self, entity: EntityRef) {
        self.operations.insert(entity, ChangeKind::Create);
    }

    /// Record an attribute change; returns the entity's resulting tag.
    ///
    /// Updates to created or destroyed entities leave no extra record, and
    /// repeated updates keep the first old value.
    pub fn updated(&mut self, entity: EntityRef, attribute: Attribute, old: Value) -> ChangeKind {
        match self.kind(entity) {
            ChangeKind::Create => ChangeKind::Create,
            ChangeKind::Destroy => ChangeKind::Destroy,
            ChangeKind::Unchanged | ChangeKind::Update => {
                self.operations.insert(entity, ChangeKind::Update);
                self.originals
                    .entry(entity)
                    .or_default()
                    .entry(attribute)
                    .or_insert(old);
                ChangeKind::Update
            }
        }
    }

    /// Record a destruction; returns the entity's resulting tag.
    ///
    /// Destroying something created in the same pass cancels both records.
    pub fn destroyed(&mut self, entity: EntityRef) -> ChangeKind {
        if self.kind(entity) == ChangeKind::Create {
            self.operations.remove(&entity);
            self.originals.remove(&entity);
        } else {
            self.operations.insert(entity, ChangeKind::Destroy);
        }
        ChangeKind::Destroy
    }

    /// Current tag of an entity.
    #[must_use]
    pub fn kind(&self, entity: EntityRef) -> ChangeKind {
        self.operations
            .get(&entity)
            .copied()
            .unwrap_or(ChangeKind::Unchanged)
    }

    /// Value an attribute held before its first change in this pass.
    #[must_use]
    pub fn original(&self, entity: EntityRef, attribute: Attribute) -> Option<&Value> {
        self.originals.get(&entity)?.get(&attribute)
    }

    /// Tracked entities with their tags, in id order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityRef, ChangeKind)> + '_ {
        self.operations.iter().map(|(e, k)| (*e, *k))
    }

    /// Number of entities with a net change.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// True if nothing has changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub(crate) fn change_for(&self, entity: EntityRef) -> Option<Change> {
        let kind = *self.operations.get(&entity)?;
        let originals = self
            .originals
            .get(&entity)
            .map(|attrs| attrs.iter().map(|(a, v)| (*a, v.clone())).collect())
            .unwrap_or_default();
        Some(Change {
            entity,
            kind,
            originals,
        })
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.operations.clear();
        self.originals.clear();
    }
}
