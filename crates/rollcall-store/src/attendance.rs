//! Append-only attendance log, one entry per person per calendar day.

use crate::kv::KeyValueStore;
use crate::records::{load_list, store_list, Records, StoreCorruption};
use crate::{StoreError, ATTENDANCE_KEY};
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use rollcall_core::AttendanceEntry;
use std::sync::Arc;

/// Result of [`AttendanceLog::mark`].
#[derive(Debug, Clone, Default)]
pub struct Marked {
    /// The new entry, `None` when the person was already marked that day.
    pub entry: Option<AttendanceEntry>,
    /// Corruption found in the log while reading it for this write.
    pub corruption: Option<StoreCorruption>,
}

#[derive(Clone)]
pub struct AttendanceLog {
    kv: Arc<dyn KeyValueStore>,
}

impl AttendanceLog {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub fn load(&self) -> Result<Records<AttendanceEntry>, StoreError> {
        load_list(self.kv.as_ref(), ATTENDANCE_KEY, AttendanceEntry::validate)
    }

    /// All entries, oldest first.
    pub fn list(&self) -> Result<Vec<AttendanceEntry>, StoreError> {
        Ok(self.load()?.items)
    }

    pub fn on_date(&self, date: NaiveDate) -> Result<Vec<AttendanceEntry>, StoreError> {
        Ok(self.list()?.into_iter().filter(|e| e.date == date).collect())
    }

    /// Record `name` as present at `now`, unless already recorded that day.
    ///
    /// The returned entry is `None` when the call was a no-op.
    pub fn mark(&self, name: &str, now: NaiveDateTime) -> Result<Marked, StoreError> {
        let today = now.date();
        let Records {
            items: mut log,
            corruption,
        } = self.load()?;
        if log.iter().any(|e| e.name == name && e.date == today) {
            tracing::trace!(name, %today, "already marked");
            return Ok(Marked {
                entry: None,
                corruption,
            });
        }

        let entry = AttendanceEntry {
            name: name.to_string(),
            date: today,
            time: now.time().with_nanosecond(0).unwrap_or(now.time()),
        };
        log.push(entry.clone());
        store_list(self.kv.as_ref(), ATTENDANCE_KEY, &log)?;
        tracing::info!(name, date = %entry.date, time = %entry.time, "attendance marked");
        Ok(Marked {
            entry: Some(entry),
            corruption,
        })
    }
}
