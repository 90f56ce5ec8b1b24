//! The registered-student list as the presentation layer sees it.

use crate::error::SessionError;
use crate::events::{EventBus, SessionEvent, StatusLevel};
use rollcall_core::StudentRecord;
use rollcall_store::DescriptorStore;

/// Read and prune the student list, publishing changes and corruption
/// warnings on the event bus.
#[derive(Clone)]
pub struct Roster {
    students: DescriptorStore,
    events: EventBus,
}

impl Roster {
    pub fn new(students: DescriptorStore, events: EventBus) -> Self {
        Self { students, events }
    }

    /// Current students in registration order.
    pub fn students(&self) -> Result<Vec<StudentRecord>, SessionError> {
        let loaded = self.students.load()?;
        if let Some(c) = &loaded.corruption {
            self.events.status(StatusLevel::Warning, c.to_string());
        }
        Ok(loaded.items)
    }

    /// Remove a student by roll number. Returns whether one was removed.
    pub fn delete(&self, roll: &str) -> Result<bool, SessionError> {
        let removed = self.students.remove(roll)?;
        if removed {
            tracing::info!(roll, "student removed");
            self.events.emit(SessionEvent::StudentsChanged);
        }
        Ok(removed)
    }

    pub(crate) fn store(&self) -> &DescriptorStore {
        &self.students
    }

    pub(crate) fn events(&self) -> &EventBus {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Status;
    use rollcall_store::{KeyValueStore, MemoryStore};
    use std::sync::Arc;

    fn enrolled(kv: Arc<MemoryStore>) -> Roster {
        let store = DescriptorStore::new(kv);
        store
            .add(StudentRecord {
                name: "Alice".into(),
                roll: "A1".into(),
                descriptor: vec![0.0, 0.0].into(),
            })
            .unwrap();
        Roster::new(store, EventBus::new(16))
    }

    #[test]
    fn test_delete_publishes_change() {
        let roster = enrolled(Arc::new(MemoryStore::new()));
        let mut rx = roster.events().subscribe();

        assert!(roster.delete("A1").unwrap());
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::StudentsChanged);

        assert!(!roster.delete("A1").unwrap());
        assert!(rx.try_recv().is_err());
        assert!(roster.students().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_store_surfaces_warning() {
        let kv = Arc::new(MemoryStore::new().with_value("students", "[{\"name\": 1}]"));
        let roster = Roster::new(DescriptorStore::new(kv.clone()), EventBus::new(16));
        let mut rx = roster.events().subscribe();

        assert!(roster.students().unwrap().is_empty());
        assert!(matches!(
            rx.try_recv().unwrap(),
            SessionEvent::Status(Status { level: StatusLevel::Warning, .. })
        ));
        assert!(kv.get("students.quarantine").unwrap().is_some());
    }
}
