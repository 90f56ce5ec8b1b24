use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bounding box of a detected face in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Face descriptor vector (128-dimensional for the usual recognition nets).
///
/// Serialized as a bare JSON array so stored records stay readable by
/// anything that wrote them as plain number lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Compute Euclidean distance between two embeddings.
    ///
    /// Callers must check that both have the same length; extra trailing
    /// dimensions on either side are ignored.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self { values }
    }
}

/// One face found by the detector in a single frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    #[serde(alias = "descriptor")]
    pub embedding: Embedding,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    /// Detector confidence in [0, 1].
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub landmarks: Vec<(f32, f32)>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("{0} is empty")]
    EmptyField(&'static str),
    #[error("descriptor is empty")]
    EmptyDescriptor,
    #[error("descriptor value at index {0} is not finite")]
    NonFinite(usize),
}

/// A registered student: display name, unique roll number, face descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub name: String,
    pub roll: String,
    pub descriptor: Embedding,
}

impl StudentRecord {
    /// Check the shape invariants a stored record must satisfy.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.name.trim().is_empty() {
            return Err(RecordError::EmptyField("name"));
        }
        if self.roll.trim().is_empty() {
            return Err(RecordError::EmptyField("roll"));
        }
        if self.descriptor.is_empty() {
            return Err(RecordError::EmptyDescriptor);
        }
        if let Some(i) = self.descriptor.values.iter().position(|v| !v.is_finite()) {
            return Err(RecordError::NonFinite(i));
        }
        Ok(())
    }
}

/// One attendance mark. At most one exists per `(name, date)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub name: String,
    /// Local calendar date, serialized `YYYY-MM-DD`.
    pub date: NaiveDate,
    /// Local wall-clock time of the first match that day.
    #[serde(with = "hms")]
    pub time: NaiveTime,
}

impl AttendanceEntry {
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.name.trim().is_empty() {
            return Err(RecordError::EmptyField("name"));
        }
        Ok(())
    }
}

/// `HH:MM:SS` without fractional seconds.
mod hms {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M:%S";

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&time.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}
