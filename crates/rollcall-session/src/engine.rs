use rollcall_core::{CaptureError, Detection, DetectorError, FaceDetector, Frame, FrameSource};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("camera has not produced a frame yet")]
    CameraNotReady,
    #[error("failed to spawn engine thread: {0}")]
    Spawn(std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Messages sent from the session to the engine thread.
enum EngineRequest {
    DetectOne {
        reply: oneshot::Sender<Result<Option<Detection>, EngineError>>,
    },
    DetectAll {
        reply: oneshot::Sender<Result<Vec<Detection>, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Grab the current frame and return its most confident face.
    pub async fn detect_one(&self) -> Result<Option<Detection>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::DetectOne { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Grab the current frame and return every face in it.
    pub async fn detect_all(&self) -> Result<Vec<Detection>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::DetectAll { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The thread owns the frame source and the detector for its whole life and
/// serves one request at a time. It exits when every handle is dropped.
pub fn spawn_engine(
    mut source: Box<dyn FrameSource>,
    mut detector: Box<dyn FaceDetector>,
    warmup_frames: usize,
) -> Result<EngineHandle, EngineError> {
    // Discard warmup frames for camera exposure stabilization
    if warmup_frames > 0 {
        tracing::info!(count = warmup_frames, "discarding warmup frames");
        for _ in 0..warmup_frames {
            let _ = source.next_frame();
        }
    }

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("rollcall-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::DetectOne { reply } => {
                        let result = grab(source.as_mut()).and_then(|frame| {
                            detector.detect_one(&frame).map_err(EngineError::from)
                        });
                        let _ = reply.send(result);
                    }
                    EngineRequest::DetectAll { reply } => {
                        let result = grab(source.as_mut()).and_then(|frame| {
                            let faces = detector.detect_all(&frame)?;
                            tracing::trace!(seq = frame.sequence, faces = faces.len(), "frame detected");
                            Ok(faces)
                        });
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx })
}

fn grab(source: &mut dyn FrameSource) -> Result<Frame, EngineError> {
    match source.next_frame()? {
        Some(frame) if frame.is_ready() => Ok(frame),
        _ => Err(EngineError::CameraNotReady),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{face, ScriptedCamera, ScriptedDetector};

    #[tokio::test]
    async fn test_detect_all_per_frame() {
        let camera = ScriptedCamera::frames(2);
        let detector = ScriptedDetector::new(vec![vec![face(&[0.0])], vec![face(&[1.0]), face(&[2.0])]]);
        let engine = spawn_engine(Box::new(camera), Box::new(detector), 0).unwrap();

        assert_eq!(engine.detect_all().await.unwrap().len(), 1);
        assert_eq!(engine.detect_all().await.unwrap().len(), 2);
        assert!(matches!(
            engine.detect_all().await,
            Err(EngineError::Capture(CaptureError::EndOfStream))
        ));
    }

    #[tokio::test]
    async fn test_warmup_frames_discarded() {
        let camera = ScriptedCamera::frames(3);
        let detector = ScriptedDetector::new(vec![vec![], vec![], vec![face(&[7.0])]]);
        let engine = spawn_engine(Box::new(camera), Box::new(detector), 2).unwrap();

        let one = engine.detect_one().await.unwrap().unwrap();
        assert_eq!(one.embedding.values, vec![7.0]);
    }

    #[tokio::test]
    async fn test_not_ready_frame() {
        let camera = ScriptedCamera::not_ready();
        let detector = ScriptedDetector::new(vec![vec![face(&[0.0])]]);
        let engine = spawn_engine(Box::new(camera), Box::new(detector), 0).unwrap();
        assert!(matches!(engine.detect_one().await, Err(EngineError::CameraNotReady)));
    }

    #[tokio::test]
    async fn test_access_denied() {
        let engine = spawn_engine(
            Box::new(ScriptedCamera::denied()),
            Box::new(ScriptedDetector::new(vec![])),
            0,
        )
        .unwrap();
        assert!(matches!(
            engine.detect_all().await,
            Err(EngineError::Capture(CaptureError::AccessDenied(_)))
        ));
    }
}
