//! Recorded detection feed.
//!
//! A recording is a JSON document listing, frame by frame, what the face
//! model saw. It stands in for both the camera and the detector so the
//! workflows can be driven without video hardware:
//!
//! ```json
//! { "width": 640, "height": 480,
//!   "frames": [ { "faces": [ { "embedding": [0.1, ...],
//!                              "box": { "x": 10, "y": 20, "width": 90, "height": 110 },
//!                              "score": 0.93 } ] } ] }
//! ```

use rollcall_core::{
    CaptureError, Detection, DetectorError, FaceDetector, Frame, FrameSource,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("recording {0} has no frames")]
    Empty(PathBuf),
}

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    480
}

#[derive(Debug, Deserialize)]
struct Recording {
    #[serde(default = "default_width")]
    width: u32,
    #[serde(default = "default_height")]
    height: u32,
    frames: Vec<RecordedFrame>,
}

#[derive(Debug, Deserialize)]
struct RecordedFrame {
    #[serde(default)]
    faces: Vec<Detection>,
}

/// Frame source half of a recording.
pub struct ReplayCamera {
    total: u32,
    next: u32,
    width: u32,
    height: u32,
    looping: bool,
}

impl FrameSource for ReplayCamera {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        if self.next >= self.total {
            if !self.looping {
                return Err(CaptureError::EndOfStream);
            }
            self.next = 0;
        }
        let sequence = self.next;
        self.next += 1;
        Ok(Some(Frame {
            data: Vec::new(),
            width: self.width,
            height: self.height,
            sequence,
        }))
    }
}

/// Detector half of a recording: replays the faces stored for each frame.
pub struct ReplayDetector {
    frames: Arc<Vec<RecordedFrame>>,
}

impl FaceDetector for ReplayDetector {
    fn detect_all(&mut self, frame: &Frame) -> Result<Vec<Detection>, DetectorError> {
        self.frames
            .get(frame.sequence as usize)
            .map(|f| f.faces.clone())
            .ok_or_else(|| {
                DetectorError::InferenceFailed(format!("frame {} not in recording", frame.sequence))
            })
    }
}

/// Load a recording. With `looping`, the camera restarts from the first
/// frame instead of ending.
pub fn open(path: &Path, looping: bool) -> Result<(ReplayCamera, ReplayDetector), ReplayError> {
    let text = std::fs::read_to_string(path).map_err(|source| ReplayError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&text, path, looping)
}

fn parse(
    text: &str,
    path: &Path,
    looping: bool,
) -> Result<(ReplayCamera, ReplayDetector), ReplayError> {
    let recording: Recording = serde_json::from_str(text).map_err(|source| ReplayError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if recording.frames.is_empty() {
        return Err(ReplayError::Empty(path.to_path_buf()));
    }

    tracing::info!(
        path = %path.display(),
        frames = recording.frames.len(),
        looping,
        "loaded recording"
    );

    let camera = ReplayCamera {
        total: recording.frames.len() as u32,
        next: 0,
        width: recording.width,
        height: recording.height,
        looping,
    };
    let detector = ReplayDetector {
        frames: Arc::new(recording.frames),
    };
    Ok((camera, detector))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_FRAMES: &str = r#"{
        "frames": [
            { "faces": [ { "embedding": [0.1, 0.2], "box": { "x": 1, "y": 2, "width": 3, "height": 4 }, "score": 0.9 } ] },
            { }
        ]
    }"#;

    #[test]
    fn test_replay_frames_then_end() {
        let (mut cam, mut det) = parse(TWO_FRAMES, Path::new("t.json"), false).unwrap();

        let f0 = cam.next_frame().unwrap().unwrap();
        assert!(f0.is_ready());
        assert_eq!(det.detect_all(&f0).unwrap().len(), 1);

        let f1 = cam.next_frame().unwrap().unwrap();
        assert!(det.detect_all(&f1).unwrap().is_empty());

        assert!(matches!(cam.next_frame(), Err(CaptureError::EndOfStream)));
    }

    #[test]
    fn test_replay_looping() {
        let (mut cam, _) = parse(TWO_FRAMES, Path::new("t.json"), true).unwrap();
        let seqs: Vec<u32> = (0..5).map(|_| cam.next_frame().unwrap().unwrap().sequence).collect();
        assert_eq!(seqs, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_descriptor_alias() {
        let text = r#"{"frames": [{"faces": [{"descriptor": [0.5], "box": {"x": 0, "y": 0, "width": 1, "height": 1}}]}]}"#;
        let (mut cam, mut det) = parse(text, Path::new("t.json"), false).unwrap();
        let f = cam.next_frame().unwrap().unwrap();
        assert_eq!(det.detect_one(&f).unwrap().unwrap().embedding.values, vec![0.5]);
    }

    #[test]
    fn test_empty_and_invalid() {
        assert!(matches!(
            parse(r#"{"frames": []}"#, Path::new("t.json"), false),
            Err(ReplayError::Empty(_))
        ));
        assert!(matches!(
            parse("[]", Path::new("t.json"), false),
            Err(ReplayError::Parse { .. })
        ));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            open(&dir.path().join("missing.json"), false),
            Err(ReplayError::Read { .. })
        ));
    }
}
