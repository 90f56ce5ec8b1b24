//! Nearest-label face matching under a Euclidean distance threshold.
//!
//! A [`FaceMatcher`] is a read-only snapshot built from every registered
//! descriptor. It is rebuilt, never patched, when the registered set changes.

use crate::types::{Embedding, StudentRecord};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Label reported when no reference is within the threshold.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Maximum Euclidean distance at which two descriptors are the same person.
pub const DEFAULT_DISTANCE_THRESHOLD: f32 = 0.6;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatcherError {
    #[error("distance threshold must be finite and non-negative, got {0}")]
    InvalidThreshold(f32),
    #[error("descriptor has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("unknown label distance policy: {0} (expected \"nearest\" or \"mean\")")]
    UnknownPolicy(String),
}

/// Mapping from label to one or more reference embeddings.
///
/// Labels keep first-insertion order, which is also the tie-break order.
#[derive(Debug, Clone, Default)]
pub struct LabeledDescriptorSet {
    entries: Vec<(String, Vec<Embedding>)>,
}

impl LabeledDescriptorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the set from registered records, labelled by student name.
    pub fn from_records(records: &[StudentRecord]) -> Self {
        let mut set = Self::new();
        for record in records {
            set.insert(&record.name, record.descriptor.clone());
        }
        set
    }

    /// Append a reference embedding under `label`.
    pub fn insert(&mut self, label: &str, embedding: Embedding) {
        match self.entries.iter_mut().find(|(l, _)| l == label) {
            Some((_, refs)) => refs.push(embedding),
            None => self.entries.push((label.to_string(), vec![embedding])),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Embedding])> {
        self.entries.iter().map(|(l, refs)| (l.as_str(), refs.as_slice()))
    }

    /// Number of distinct labels.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// How the distance between a query and a multi-reference label is computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelDistance {
    /// Distance to the closest reference of the label.
    #[default]
    Nearest,
    /// Mean distance over all references of the label.
    Mean,
}

impl FromStr for LabelDistance {
    type Err = MatcherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "mean" => Ok(Self::Mean),
            other => Err(MatcherError::UnknownPolicy(other.to_string())),
        }
    }
}

/// Result of matching one query descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct BestMatch {
    /// Matched label, or [`UNKNOWN_LABEL`].
    pub label: String,
    /// Distance to the closest label. `+inf` when the matcher is empty.
    pub distance: f32,
    matched: bool,
}

impl BestMatch {
    fn unknown(distance: f32) -> Self {
        Self {
            label: UNKNOWN_LABEL.to_string(),
            distance,
            matched: false,
        }
    }

    pub fn is_unknown(&self) -> bool {
        !self.matched
    }

    /// The matched label, if any. A student literally named "unknown"
    /// still reports `Some` here.
    pub fn known_label(&self) -> Option<&str> {
        self.matched.then_some(self.label.as_str())
    }
}

impl fmt::Display for BestMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.2})", self.label, self.distance)
    }
}

/// Threshold matcher over a [`LabeledDescriptorSet`] snapshot.
#[derive(Debug, Clone)]
pub struct FaceMatcher {
    set: LabeledDescriptorSet,
    threshold: f32,
    policy: LabelDistance,
    dimension: Option<usize>,
}

impl FaceMatcher {
    /// Build a matcher. All references must share one dimensionality.
    pub fn new(set: LabeledDescriptorSet, threshold: f32) -> Result<Self, MatcherError> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(MatcherError::InvalidThreshold(threshold));
        }

        let mut dimension = None;
        for (_, refs) in set.iter() {
            for embedding in refs {
                match dimension {
                    None => dimension = Some(embedding.len()),
                    Some(expected) if expected != embedding.len() => {
                        return Err(MatcherError::DimensionMismatch {
                            expected,
                            actual: embedding.len(),
                        });
                    }
                    Some(_) => {}
                }
            }
        }

        tracing::debug!(labels = set.len(), threshold, ?dimension, "face matcher built");

        Ok(Self {
            set,
            threshold,
            policy: LabelDistance::default(),
            dimension,
        })
    }

    /// Shorthand for `new(LabeledDescriptorSet::from_records(records), threshold)`.
    pub fn from_records(records: &[StudentRecord], threshold: f32) -> Result<Self, MatcherError> {
        Self::new(LabeledDescriptorSet::from_records(records), threshold)
    }

    pub fn with_policy(mut self, policy: LabelDistance) -> Self {
        self.policy = policy;
        self
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Descriptor length of the references, `None` if the matcher is empty.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn label_count(&self) -> usize {
        self.set.len()
    }

    /// Find the closest label for `query`.
    ///
    /// Returns the label when its distance is `<= threshold`, otherwise
    /// [`UNKNOWN_LABEL`] with the minimum distance. Equal distances keep the
    /// label registered first.
    pub fn find_best_match(&self, query: &Embedding) -> Result<BestMatch, MatcherError> {
        if let Some(expected) = self.dimension {
            if query.len() != expected {
                return Err(MatcherError::DimensionMismatch {
                    expected,
                    actual: query.len(),
                });
            }
        }

        let mut best_distance = f32::INFINITY;
        let mut best_label: Option<&str> = None;

        for (label, refs) in self.set.iter() {
            let distance = self.label_distance(query, refs);
            if distance < best_distance {
                best_distance = distance;
                best_label = Some(label);
            }
        }

        match best_label {
            Some(label) if best_distance <= self.threshold => Ok(BestMatch {
                label: label.to_string(),
                distance: best_distance,
                matched: true,
            }),
            _ => Ok(BestMatch::unknown(best_distance)),
        }
    }

    fn label_distance(&self, query: &Embedding, refs: &[Embedding]) -> f32 {
        let distances = refs.iter().map(|r| query.euclidean_distance(r));
        match self.policy {
            LabelDistance::Nearest => distances.fold(f32::INFINITY, f32::min),
            LabelDistance::Mean => {
                if refs.is_empty() {
                    f32::INFINITY
                } else {
                    distances.sum::<f32>() / refs.len() as f32
                }
            }
        }
    }
}
