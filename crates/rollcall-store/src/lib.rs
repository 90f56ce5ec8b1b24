//! rollcall-store — Persistence for registered students and attendance.
//!
//! Both lists live as JSON arrays under fixed keys of a flat key-value
//! store. Every write is a read-modify-write of the whole list.

pub mod attendance;
pub mod kv;
pub mod records;
pub mod sqlite;
pub mod students;

pub use attendance::{AttendanceLog, Marked};
pub use kv::{KeyValueStore, MemoryStore};
pub use records::{CorruptionKind, Records, StoreCorruption};
pub use sqlite::SqliteStore;
pub use students::DescriptorStore;

use rollcall_core::RecordError;
use thiserror::Error;

/// Key holding the JSON array of registered students.
pub const STUDENTS_KEY: &str = "students";
/// Key holding the JSON array of attendance entries.
pub const ATTENDANCE_KEY: &str = "attendance_log";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("roll number {0} already exists")]
    DuplicateId(String),
    #[error("invalid record: {0}")]
    InvalidRecord(#[from] RecordError),
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
