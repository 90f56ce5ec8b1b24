use crate::engine::EngineError;
use rollcall_core::{CaptureError, MatcherError};
use rollcall_store::StoreError;
use thiserror::Error;

/// Everything the presentation layer can be told went wrong.
///
/// None of these are fatal; the display text is the user-facing message.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("roll number {0} already exists")]
    DuplicateId(String),
    #[error("user already registered as {label}")]
    DuplicateFace { label: String, distance: f32 },
    #[error("face not detected, look at the camera")]
    NoFaceDetected,
    #[error("camera access denied: {0}")]
    CameraAccess(String),
    #[error("camera not ready")]
    CameraNotReady,
    #[error("camera stream ended")]
    EndOfStream,
    #[error("no users in database")]
    EmptyDatabase,
    #[error("enter {0}")]
    MissingField(&'static str),
    #[error("scanner is not armed")]
    NotArmed,
    #[error("descriptor incompatible with enrolled faces: {0}")]
    IncompatibleDescriptor(#[from] MatcherError),
    #[error("detector failed: {0}")]
    Detector(String),
    #[error("store error: {0}")]
    Store(StoreError),
    #[error("detector engine is not running")]
    EngineUnavailable,
}

impl SessionError {
    /// Conditions the user clears by simply trying again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SessionError::NoFaceDetected | SessionError::CameraNotReady | SessionError::Detector(_)
        )
    }
}

impl From<StoreError> for SessionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateId(roll) => SessionError::DuplicateId(roll),
            other => SessionError::Store(other),
        }
    }
}

impl From<EngineError> for SessionError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Capture(CaptureError::EndOfStream) => SessionError::EndOfStream,
            EngineError::Capture(err) => SessionError::CameraAccess(err.to_string()),
            EngineError::CameraNotReady => SessionError::CameraNotReady,
            EngineError::Detector(err) => SessionError::Detector(err.to_string()),
            EngineError::Spawn(_) | EngineError::ChannelClosed => SessionError::EngineUnavailable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::DetectorError;

    #[test]
    fn test_store_duplicate_becomes_duplicate_id() {
        let e = SessionError::from(StoreError::DuplicateId("A1".into()));
        assert!(matches!(e, SessionError::DuplicateId(ref r) if r == "A1"));
        assert_eq!(e.to_string(), "roll number A1 already exists");
    }

    #[test]
    fn test_engine_errors_translate() {
        let denied = EngineError::Capture(CaptureError::AccessDenied("permission".into()));
        assert!(matches!(SessionError::from(denied), SessionError::CameraAccess(_)));
        assert!(matches!(
            SessionError::from(EngineError::Capture(CaptureError::EndOfStream)),
            SessionError::EndOfStream
        ));
        assert!(matches!(
            SessionError::from(EngineError::ChannelClosed),
            SessionError::EngineUnavailable
        ));
        let det = SessionError::from(EngineError::Detector(DetectorError::InferenceFailed(
            "oom".into(),
        )));
        assert!(det.is_retryable());
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            SessionError::DuplicateFace { label: "Alice".into(), distance: 0.2 }.to_string(),
            "user already registered as Alice"
        );
        assert_eq!(SessionError::EmptyDatabase.to_string(), "no users in database");
        assert_eq!(SessionError::MissingField("name").to_string(), "enter name");
    }
}
