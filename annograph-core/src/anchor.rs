//! Anchors: shared points in a graph's ordering space.
//!
//! An anchor is a position (seconds for audio transcripts, character
//! offsets for text) that annotations start or end at. Adjacent intervals
//! share one anchor rather than holding two equal numbers, so moving the
//! boundary moves both sides at once.
//!
//! ```text
//!   word:   [ the  ][   statute   ][ says ]
//!   anchor: n_1    n_2             n_3    n_4
//!   phone:         [s][t][{][J][@][t]
//!                  n_2             n_3      <- same anchors as the words
//! ```
//!
//! The [`AnchorStore`] owns anchors and an index from (quantized) offset to
//! anchor id, which is what lets independent passes requesting the same
//! offset converge on the same anchor.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::change::ChangeKind;
use crate::confidence::Confidence;
use crate::error::{Error, Result};

/// Identifier of an [`Anchor`] within one graph (and its fragments).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnchorId(pub u64);

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n_{}", self.0)
    }
}

/// A point in the graph's ordering space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    id: AnchorId,
    /// `None` until some pass knows where this point is.
    offset: Option<f64>,
    confidence: Confidence,
    #[serde(default, skip_serializing_if = "ChangeKind::is_unchanged")]
    change: ChangeKind,
}

impl Anchor {
    pub(crate) fn new(id: AnchorId, offset: Option<f64>, confidence: Confidence) -> Self {
        Self {
            id,
            offset,
            confidence,
            change: ChangeKind::Unchanged,
        }
    }

    /// Anchor id.
    #[must_use]
    pub fn id(&self) -> AnchorId {
        self.id
    }

    /// Offset, if known.
    #[must_use]
    pub fn offset(&self) -> Option<f64> {
        self.offset
    }

    /// Confidence of the current offset.
    #[must_use]
    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    /// Lifecycle tag while change tracking is active.
    #[must_use]
    pub fn change(&self) -> ChangeKind {
        self.change
    }

    /// False once destroyed under tracking (still readable until commit).
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.change != ChangeKind::Destroy
    }

    pub(crate) fn set_change(&mut self, change: ChangeKind) {
        self.change = change;
    }
}

/// Reject offsets that cannot be ordered.
pub(crate) fn check_offset(offset: f64) -> Result<f64> {
    if offset.is_finite() {
        Ok(offset)
    } else {
        Err(Error::InvalidOffset(offset))
    }
}

/// Snap `offset` to the nearest multiple of `granularity`.
#[must_use]
pub fn quantize(offset: f64, granularity: Option<f64>) -> f64 {
    match granularity {
        Some(g) if g > 0.0 => {
            let q = (offset / g).round() * g;
            // -0.0 and 0.0 must share a key
            if q == 0.0 {
                0.0
            } else {
                q
            }
        }
        _ => offset,
    }
}

/// Owner of a graph's anchors and the offset index used for deduplication.
#[derive(Debug, Clone, Default)]
pub struct AnchorStore {
    anchors: BTreeMap<AnchorId, Anchor>,
    by_offset: HashMap<u64, BTreeSet<AnchorId>>,
    granularity: Option<f64>,
}

impl AnchorStore {
    /// Empty store with the given offset granularity.
    #[must_use]
    pub fn new(granularity: Option<f64>) -> Self {
        Self {
            granularity,
            ..Self::default()
        }
    }

    /// Offset granularity used for dedup, if any.
    #[must_use]
    pub fn granularity(&self) -> Option<f64> {
        self.granularity
    }

    fn key(&self, offset: f64) -> u64 {
        match self.granularity {
            Some(g) if g > 0.0 => (offset / g).round() as i64 as u64,
            _ => {
                let normalized = if offset == 0.0 { 0.0 } else { offset };
                normalized.to_bits()
            }
        }
    }

    /// Change granularity and rebuild the offset index.
    ///
    /// Offsets already stored are not moved.
    pub(crate) fn set_granularity(&mut self, granularity: Option<f64>) {
        self.granularity = granularity;
        self.by_offset.clear();
        let entries: Vec<(AnchorId, f64)> = self
            .anchors
            .values()
            .filter_map(|a| a.offset.map(|o| (a.id, o)))
            .collect();
        for (id, offset) in entries {
            let key = self.key(offset);
            self.by_offset.entry(key).or_default().insert(id);
        }
    }

    /// Number of anchors, including ones pending destruction.
    #[must_use]
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// True if there are no anchors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Look up an anchor.
    #[must_use]
    pub fn get(&self, id: AnchorId) -> Option<&Anchor> {
        self.anchors.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: AnchorId) -> Option<&mut Anchor> {
        self.anchors.get_mut(&id)
    }

    /// True if the anchor exists.
    #[must_use]
    pub fn contains(&self, id: AnchorId) -> bool {
        self.anchors.contains_key(&id)
    }

    /// Live anchor at exactly `offset` (after quantization), lowest id first.
    #[must_use]
    pub fn at(&self, offset: f64) -> Option<AnchorId> {
        if !offset.is_finite() {
            return None;
        }
        let offset = quantize(offset, self.granularity);
        self.by_offset.get(&self.key(offset)).and_then(|ids| {
            ids.iter()
                .copied()
                .find(|id| self.anchors.get(id).map_or(false, Anchor::is_live))
        })
    }

    /// All anchors in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Anchor> + '_ {
        self.anchors.values()
    }

    /// Live anchors with a known offset, ordered by offset then id.
    #[must_use]
    pub fn sorted(&self) -> Vec<&Anchor> {
        let mut anchors: Vec<&Anchor> = self
            .anchors
            .values()
            .filter(|a| a.is_live() && a.offset.is_some())
            .collect();
        anchors.sort_by(|a, b| {
            let (x, y) = (a.offset.unwrap_or(0.0), b.offset.unwrap_or(0.0));
            x.total_cmp(&y).then(a.id.cmp(&b.id))
        });
        anchors
    }

    pub(crate) fn insert(&mut self, anchor: Anchor) {
        if let Some(offset) = anchor.offset {
            let key = self.key(offset);
            self.by_offset.entry(key).or_default().insert(anchor.id);
        }
        self.anchors.insert(anchor.id, anchor);
    }

    pub(crate) fn remove(&mut self, id: AnchorId) -> Option<Anchor> {
        let anchor = self.anchors.remove(&id)?;
        if let Some(offset) = anchor.offset {
            self.unindex(offset, id);
        }
        Some(anchor)
    }

    fn unindex(&mut self, offset: f64, id: AnchorId) {
        let key = self.key(offset);
        if let Some(ids) = self.by_offset.get_mut(&key) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_offset.remove(&key);
            }
        }
    }

    /// Overwrite offset and confidence unconditionally, keeping the index current.
    ///
    /// Returns the previous `(offset, confidence)`.
    pub(crate) fn write(
        &mut self,
        id: AnchorId,
        offset: Option<f64>,
        confidence: Confidence,
    ) -> Result<(Option<f64>, Confidence)> {
        let offset = match offset {
            Some(o) => Some(quantize(check_offset(o)?, self.granularity)),
            None => None,
        };
        let anchor = self.anchors.get_mut(&id).ok_or(Error::UnknownAnchor(id))?;
        let previous = (anchor.offset, anchor.confidence);
        anchor.offset = offset;
        anchor.confidence = confidence;
        if let Some(old) = previous.0 {
            self.unindex(old, id);
        }
        if let Some(new) = offset {
            let key = self.key(new);
            self.by_offset.entry(key).or_default().insert(id);
        }
        Ok(previous)
    }

    /// Raise an anchor's confidence, never lowering it.
    ///
    /// Returns the old confidence if it changed.
    pub(crate) fn upgrade_confidence(
        &mut self,
        id: AnchorId,
        confidence: Confidence,
    ) -> Option<Confidence> {
        let anchor = self.anchors.get_mut(&id)?;
        if confidence > anchor.confidence {
            let old = anchor.confidence;
            anchor.confidence = confidence;
            Some(old)
        } else {
            None
        }
    }
}
