//! rollcall-core — Face descriptor matching primitives.
//!
//! Holds the record types shared by every crate, the nearest-label face
//! matcher, and the seams to the outside world: the face detector, the
//! frame source and the wall clock.

pub mod clock;
pub mod detector;
pub mod matcher;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use detector::{CaptureError, DetectorError, FaceDetector, Frame, FrameSource};
pub use matcher::{
    BestMatch, FaceMatcher, LabelDistance, LabeledDescriptorSet, MatcherError,
    DEFAULT_DISTANCE_THRESHOLD, UNKNOWN_LABEL,
};
pub use types::{AttendanceEntry, BoundingBox, Detection, Embedding, RecordError, StudentRecord};
