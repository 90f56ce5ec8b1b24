//! Signals for the presentation layer: re-render triggers, status text and
//! per-tick overlay data.

use rollcall_core::{AttendanceEntry, BestMatch, BoundingBox};
use std::fmt;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub level: StatusLevel,
    pub message: String,
}

/// One detected face after matching, as drawn on the overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceHit {
    pub best: BestMatch,
    pub bbox: BoundingBox,
}

impl fmt::Display for FaceHit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at ({:.0}, {:.0}) {:.0}x{:.0}",
            self.best, self.bbox.x, self.bbox.y, self.bbox.width, self.bbox.height
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The student list changed; re-render it.
    StudentsChanged,
    /// A new attendance entry was written.
    AttendanceChanged(AttendanceEntry),
    Status(Status),
    /// Matches for the faces in the latest scanned frame.
    Overlay(Vec<FaceHit>),
}

/// Broadcast fan-out of [`SessionEvent`]s. Sending with no subscribers is
/// not an error.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }

    pub fn status(&self, level: StatusLevel, message: impl Into<String>) {
        self.emit(SessionEvent::Status(Status {
            level,
            message: message.into(),
        }));
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers() {
        EventBus::default().emit(SessionEvent::StudentsChanged);
    }

    #[test]
    fn test_subscriber_receives_status() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        bus.status(StatusLevel::Warning, "heads up");
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::Status(Status {
                level: StatusLevel::Warning,
                message: "heads up".into()
            })
        );
    }
}
