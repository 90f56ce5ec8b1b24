//! rollcall-session — Enrollment and live attendance workflows.
//!
//! Owns the in-memory matcher snapshots and talks to the blocking detector
//! through the engine thread. Every failure leaving this crate is a
//! [`SessionError`].

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod registration;
pub mod roster;
pub mod scanner;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{Config, ConfigError, MatchSettings, ScannerSettings};
pub use engine::{spawn_engine, EngineError, EngineHandle};
pub use error::SessionError;
pub use events::{EventBus, FaceHit, SessionEvent, Status, StatusLevel};
pub use registration::Registrar;
pub use roster::Roster;
pub use scanner::{AttendanceScanner, ScanReport, ScannerState};
