//! Consistency checks over a whole graph.
//!
//! Creation enforces layer rules, but later edits (moving anchors, changing
//! parents, loading hand-edited JSON) can still break them. [`validate`]
//! reports every violation without changing anything.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use annograph_core::{Alignment, Annotation, AnnotationId, Graph};

/// How serious an issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Suspicious but allowed.
    Warning,
    /// Breaks a layer rule.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// Validation issue found in a graph.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    /// Annotation on a layer the schema lacks.
    UnknownLayer {
        /// Offending annotation.
        annotation: AnnotationId,
        /// Its layer id.
        layer: String,
    },
    /// Start offset after end offset.
    ReversedSpan {
        /// Offending annotation.
        annotation: AnnotationId,
        /// Start offset.
        start: f64,
        /// End offset.
        end: f64,
    },
    /// Width does not match the layer's alignment.
    WidthMismatch {
        /// Offending annotation.
        annotation: AnnotationId,
        /// Its layer id.
        layer: String,
        /// The layer's alignment.
        alignment: Alignment,
    },
    /// Parent missing, destroyed, or on the wrong layer.
    BadParent {
        /// Offending annotation.
        annotation: AnnotationId,
        /// What is wrong with the parent.
        reason: String,
    },
    /// More than one sibling on a `peers = false` layer.
    TooManyPeers {
        /// Shared parent (`None` for the root).
        parent: Option<AnnotationId>,
        /// Layer id.
        layer: String,
        /// Live siblings found.
        count: usize,
    },
    /// Siblings overlapping on a `peers_overlap = false` layer.
    PeerOverlap {
        /// Layer id.
        layer: String,
        /// Earlier sibling.
        first: AnnotationId,
        /// Later sibling.
        second: AnnotationId,
    },
    /// Child span leaving its interval parent's span.
    OutsideParent {
        /// Offending annotation.
        annotation: AnnotationId,
        /// Its parent.
        parent: AnnotationId,
    },
    /// Uncovered stretch of a parent on a saturated layer.
    SaturationGap {
        /// Parent whose extent is not covered.
        parent: AnnotationId,
        /// Layer id.
        layer: String,
        /// Gap start.
        start: f64,
        /// Gap end.
        end: f64,
    },
}

impl ValidationIssue {
    /// Severity of this issue.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            ValidationIssue::SaturationGap { .. } => Severity::Warning,
            ValidationIssue::WidthMismatch { alignment, .. } if *alignment == Alignment::Interval => {
                Severity::Warning
            }
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::UnknownLayer { annotation, layer } => {
                write!(f, "{annotation} is on unknown layer '{layer}'")
            }
            ValidationIssue::ReversedSpan {
                annotation,
                start,
                end,
            } => write!(f, "{annotation} starts at {start} after it ends at {end}"),
            ValidationIssue::WidthMismatch {
                annotation,
                layer,
                alignment,
            } => match alignment {
                Alignment::Interval => write!(f, "{annotation} on interval layer '{layer}' has zero width"),
                _ => write!(f, "{annotation} on layer '{layer}' should be zero-width"),
            },
            ValidationIssue::BadParent { annotation, reason } => {
                write!(f, "{annotation}: {reason}")
            }
            ValidationIssue::TooManyPeers {
                parent,
                layer,
                count,
            } => write!(
                f,
                "{count} annotations on single-peer layer '{layer}' under {}",
                parent.map_or_else(|| "root".to_string(), |p| p.to_string())
            ),
            ValidationIssue::PeerOverlap {
                layer,
                first,
                second,
            } => write!(f, "{first} and {second} overlap on layer '{layer}'"),
            ValidationIssue::OutsideParent { annotation, parent } => {
                write!(f, "{annotation} extends outside its parent {parent}")
            }
            ValidationIssue::SaturationGap {
                parent,
                layer,
                start,
                end,
            } => write!(f, "'{layer}' leaves {start}-{end} of {parent} uncovered"),
        }
    }
}

/// True if any issue is an error.
#[must_use]
pub fn has_errors(issues: &[ValidationIssue]) -> bool {
    issues.iter().any(|i| i.severity() == Severity::Error)
}

/// Check every live annotation against its layer's rules.
#[must_use]
pub fn validate(graph: &Graph) -> Vec<ValidationIssue> {
    let schema = graph.schema();
    let mut issues = Vec::new();
    let mut siblings: BTreeMap<(Option<AnnotationId>, String), Vec<&Annotation>> = BTreeMap::new();

    for annotation in graph.annotations().iter().filter(|a| a.is_live()) {
        let id = annotation.id();
        let Some(layer) = schema.layer(annotation.layer_id()) else {
            issues.push(ValidationIssue::UnknownLayer {
                annotation: id,
                layer: annotation.layer_id().to_string(),
            });
            continue;
        };
        let (s, e) = bounds(graph, annotation);
        if let (Some(s), Some(e)) = (s, e) {
            if s > e {
                issues.push(ValidationIssue::ReversedSpan {
                    annotation: id,
                    start: s,
                    end: e,
                });
            }
        }
        let zero_width = annotation.is_zero_width() || (s.is_some() && s == e);
        if layer.alignment.is_zero_width() != zero_width {
            issues.push(ValidationIssue::WidthMismatch {
                annotation: id,
                layer: layer.id.clone(),
                alignment: layer.alignment,
            });
        }

        let parent_layer = layer.parent_id.as_deref().unwrap_or(schema.root_id());
        match annotation.parent() {
            None if !schema.is_root(parent_layer) && !graph.is_fragment() => {
                issues.push(ValidationIssue::BadParent {
                    annotation: id,
                    reason: format!("no parent on layer '{parent_layer}'"),
                });
            }
            None => {}
            Some(p) => match graph.get(p).filter(|a| a.is_live()) {
                None => issues.push(ValidationIssue::BadParent {
                    annotation: id,
                    reason: format!("parent {p} does not exist"),
                }),
                Some(parent) if parent.layer_id() != parent_layer => {
                    issues.push(ValidationIssue::BadParent {
                        annotation: id,
                        reason: format!(
                            "parent {p} is on '{}', expected '{parent_layer}'",
                            parent.layer_id()
                        ),
                    });
                }
                Some(parent) => {
                    let interval_parent = schema
                        .layer(parent_layer)
                        .is_some_and(|l| l.alignment == Alignment::Interval);
                    if layer.parent_includes && interval_parent && !within(graph, annotation, parent) {
                        issues.push(ValidationIssue::OutsideParent {
                            annotation: id,
                            parent: p,
                        });
                    }
                }
            },
        }
        siblings
            .entry((annotation.parent(), layer.id.clone()))
            .or_default()
            .push(annotation);
    }

    for ((parent, layer_id), mut group) in siblings {
        let Some(layer) = schema.layer(&layer_id) else {
            continue;
        };
        if !layer.peers && group.len() > 1 {
            issues.push(ValidationIssue::TooManyPeers {
                parent,
                layer: layer_id.clone(),
                count: group.len(),
            });
        }
        group.sort_by(|a, b| by_start(graph, a, b));
        if !layer.peers_overlap && layer.alignment == Alignment::Interval {
            for pair in group.windows(2) {
                let (_, first_end) = bounds(graph, pair[0]);
                let (second_start, _) = bounds(graph, pair[1]);
                if let (Some(fe), Some(ss)) = (first_end, second_start) {
                    if ss < fe {
                        issues.push(ValidationIssue::PeerOverlap {
                            layer: layer_id.clone(),
                            first: pair[0].id(),
                            second: pair[1].id(),
                        });
                    }
                }
            }
        }
        if layer.saturated && layer.alignment == Alignment::Interval {
            if let Some(parent) = parent.and_then(|p| graph.get(p)) {
                let parent_is_interval = schema
                    .layer(parent.layer_id())
                    .is_some_and(|l| l.alignment == Alignment::Interval);
                if parent_is_interval {
                    issues.extend(gaps(graph, parent, &layer_id, &group));
                }
            }
        }
    }

    for issue in &issues {
        if issue.severity() == Severity::Error {
            log::warn!("{}: {issue}", graph.id());
        }
    }
    issues
}

fn bounds(graph: &Graph, annotation: &Annotation) -> (Option<f64>, Option<f64>) {
    (
        graph.offset_min(annotation.start()),
        graph.offset_max(annotation.end()),
    )
}

fn by_start(graph: &Graph, a: &Annotation, b: &Annotation) -> Ordering {
    let key = |x: &Annotation| bounds(graph, x).0.unwrap_or(f64::INFINITY);
    key(a).total_cmp(&key(b)).then(a.ordinal().cmp(&b.ordinal()))
}

fn within(graph: &Graph, child: &Annotation, parent: &Annotation) -> bool {
    match (bounds(graph, child), bounds(graph, parent)) {
        ((Some(s), Some(e)), (Some(ps), Some(pe))) => ps <= s && e <= pe,
        _ => true,
    }
}

fn gaps(graph: &Graph, parent: &Annotation, layer_id: &str, children: &[&Annotation]) -> Vec<ValidationIssue> {
    let (Some(ps), Some(pe)) = bounds(graph, parent) else {
        return Vec::new();
    };
    let mut found = Vec::new();
    let mut cursor = ps;
    for child in children {
        let (Some(s), Some(e)) = bounds(graph, child) else {
            continue;
        };
        if s > cursor {
            found.push(ValidationIssue::SaturationGap {
                parent: parent.id(),
                layer: layer_id.to_string(),
                start: cursor,
                end: s,
            });
        }
        cursor = cursor.max(e);
    }
    if cursor < pe {
        found.push(ValidationIssue::SaturationGap {
            parent: parent.id(),
            layer: layer_id.to_string(),
            start: cursor,
            end: pe,
        });
    }
    found
}
