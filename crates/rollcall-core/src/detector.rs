//! Seams to the face detection model and the frame source.
//!
//! Both are blocking collaborators: a detector pass may take hundreds of
//! milliseconds and a frame grab may wait on the device. The session keeps
//! them on their own thread.

use crate::types::Detection;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model not loaded: {0}")]
    ModelNotLoaded(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("camera access denied: {0}")]
    AccessDenied(String),
    #[error("camera disconnected: {0}")]
    Disconnected(String),
    /// A finite source (such as a recording) has no more frames.
    #[error("end of stream")]
    EndOfStream,
}

/// A captured video frame.
///
/// The pixel layout is whatever the paired detector expects; the session
/// never looks inside.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub sequence: u32,
}

impl Frame {
    /// A zero-sized frame means the device has not produced video yet.
    pub fn is_ready(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Pull-based source of the current video frame.
pub trait FrameSource: Send {
    /// Grab the current frame. `Ok(None)` means the source is not ready yet.
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError>;
}

/// Face detection + descriptor extraction model.
pub trait FaceDetector: Send {
    /// Every face in the frame, each with its descriptor and box.
    fn detect_all(&mut self, frame: &Frame) -> Result<Vec<Detection>, DetectorError>;

    /// The single most confident face in the frame, if any.
    fn detect_one(&mut self, frame: &Frame) -> Result<Option<Detection>, DetectorError> {
        let faces = self.detect_all(frame)?;
        Ok(faces.into_iter().reduce(|best, d| if d.score > best.score { d } else { best }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, Embedding};

    struct Fixed(Vec<Detection>);

    impl FaceDetector for Fixed {
        fn detect_all(&mut self, _frame: &Frame) -> Result<Vec<Detection>, DetectorError> {
            Ok(self.0.clone())
        }
    }

    fn det(score: f32, tag: f32) -> Detection {
        Detection {
            embedding: Embedding::new(vec![tag]),
            bbox: BoundingBox { x: 0.0, y: 0.0, width: 10.0, height: 10.0 },
            score,
            landmarks: Vec::new(),
        }
    }

    #[test]
    fn test_detect_one_picks_highest_score() {
        let mut d = Fixed(vec![det(0.7, 1.0), det(0.95, 2.0), det(0.95, 3.0), det(0.2, 4.0)]);
        let best = d.detect_one(&Frame::default()).unwrap().unwrap();
        // Ties keep the earlier detection.
        assert_eq!(best.embedding.values, vec![2.0]);
    }

    #[test]
    fn test_detect_one_none_when_empty() {
        let mut d = Fixed(Vec::new());
        assert!(d.detect_one(&Frame::default()).unwrap().is_none());
    }

    #[test]
    fn test_frame_ready() {
        assert!(!Frame::default().is_ready());
        let f = Frame { data: vec![0; 4], width: 2, height: 2, sequence: 0 };
        assert!(f.is_ready());
    }
}
