//! Scripted camera and detector for session tests.

use rollcall_core::{
    BoundingBox, CaptureError, Detection, DetectorError, Embedding, FaceDetector, Frame,
    FrameSource,
};

enum Mode {
    Frames { total: u32, next: u32 },
    Repeat,
    NotReady,
    Denied,
}

pub(crate) struct ScriptedCamera {
    mode: Mode,
}

impl ScriptedCamera {
    /// Frames with sequence `0..n`, then end of stream.
    pub fn frames(n: u32) -> Self {
        Self { mode: Mode::Frames { total: n, next: 0 } }
    }

    /// The same scene (sequence 0) forever.
    pub fn repeat() -> Self {
        Self { mode: Mode::Repeat }
    }

    pub fn not_ready() -> Self {
        Self { mode: Mode::NotReady }
    }

    pub fn denied() -> Self {
        Self { mode: Mode::Denied }
    }
}

fn frame(sequence: u32) -> Frame {
    Frame {
        data: Vec::new(),
        width: 640,
        height: 480,
        sequence,
    }
}

impl FrameSource for ScriptedCamera {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        match &mut self.mode {
            Mode::Frames { total, next } => {
                if *next >= *total {
                    return Err(CaptureError::EndOfStream);
                }
                let f = frame(*next);
                *next += 1;
                Ok(Some(f))
            }
            Mode::Repeat => Ok(Some(frame(0))),
            Mode::NotReady => Ok(None),
            Mode::Denied => Err(CaptureError::AccessDenied("permission denied".into())),
        }
    }
}

/// Returns `per_frame[frame.sequence]`, or nothing for frames past the end.
pub(crate) struct ScriptedDetector {
    per_frame: Vec<Vec<Detection>>,
    fail_on: Option<u32>,
}

impl ScriptedDetector {
    pub fn new(per_frame: Vec<Vec<Detection>>) -> Self {
        Self { per_frame, fail_on: None }
    }

    pub fn failing_on(mut self, sequence: u32) -> Self {
        self.fail_on = Some(sequence);
        self
    }
}

impl FaceDetector for ScriptedDetector {
    fn detect_all(&mut self, frame: &Frame) -> Result<Vec<Detection>, DetectorError> {
        if self.fail_on == Some(frame.sequence) {
            return Err(DetectorError::InferenceFailed("scripted failure".into()));
        }
        Ok(self
            .per_frame
            .get(frame.sequence as usize)
            .cloned()
            .unwrap_or_default())
    }
}

pub(crate) fn face(values: &[f32]) -> Detection {
    Detection {
        embedding: Embedding::new(values.to_vec()),
        bbox: BoundingBox { x: 10.0, y: 20.0, width: 100.0, height: 120.0 },
        score: 0.9,
        landmarks: Vec::new(),
    }
}
