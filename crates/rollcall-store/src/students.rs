//! Registered students and their face descriptors.

use crate::kv::KeyValueStore;
use crate::records::{load_list, store_list, Records};
use crate::{StoreError, STUDENTS_KEY};
use rollcall_core::StudentRecord;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Handle to the persisted student list.
///
/// Clones share the backend and the revision counter, so a scanner holding
/// one clone can see that a registration happened through another.
#[derive(Clone)]
pub struct DescriptorStore {
    kv: Arc<dyn KeyValueStore>,
    revision: Arc<AtomicU64>,
}

impl DescriptorStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            revision: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Read all records along with any corruption found.
    pub fn load(&self) -> Result<Records<StudentRecord>, StoreError> {
        load_list(self.kv.as_ref(), STUDENTS_KEY, StudentRecord::validate)
    }

    /// All records, in registration order.
    pub fn list(&self) -> Result<Vec<StudentRecord>, StoreError> {
        Ok(self.load()?.items)
    }

    pub fn get(&self, roll: &str) -> Result<Option<StudentRecord>, StoreError> {
        Ok(self.list()?.into_iter().find(|s| s.roll == roll))
    }

    pub fn contains(&self, roll: &str) -> Result<bool, StoreError> {
        Ok(self.list()?.iter().any(|s| s.roll == roll))
    }

    /// Append a record. Fails with [`StoreError::DuplicateId`] without
    /// writing if the roll number is taken.
    pub fn add(&self, record: StudentRecord) -> Result<(), StoreError> {
        record.validate()?;
        let mut students = self.list()?;
        if students.iter().any(|s| s.roll == record.roll) {
            return Err(StoreError::DuplicateId(record.roll));
        }
        tracing::info!(roll = %record.roll, name = %record.name, "adding student");
        students.push(record);
        store_list(self.kv.as_ref(), STUDENTS_KEY, &students)?;
        self.bump();
        Ok(())
    }

    /// Remove the record with this roll number. Returns whether one existed.
    pub fn remove(&self, roll: &str) -> Result<bool, StoreError> {
        let mut students = self.list()?;
        let before = students.len();
        students.retain(|s| s.roll != roll);
        if students.len() == before {
            return Ok(false);
        }
        tracing::info!(roll, "removed student");
        store_list(self.kv.as_ref(), STUDENTS_KEY, &students)?;
        self.bump();
        Ok(true)
    }

    /// Count of successful mutations made through this store's handles.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    fn bump(&self) {
        self.revision.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;

    fn student(name: &str, roll: &str, d: &[f32]) -> StudentRecord {
        StudentRecord {
            name: name.into(),
            roll: roll.into(),
            descriptor: d.to_vec().into(),
        }
    }

    fn store() -> DescriptorStore {
        DescriptorStore::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_add_and_list_in_order() {
        let s = store();
        s.add(student("Alice", "A1", &[0.1])).unwrap();
        s.add(student("Bob", "B1", &[0.9])).unwrap();
        let names: Vec<_> = s.list().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
        assert_eq!(s.get("B1").unwrap().unwrap().name, "Bob");
        assert!(s.contains("A1").unwrap());
    }

    #[test]
    fn test_duplicate_roll_rejected_and_store_unchanged() {
        let s = store();
        s.add(student("Alice", "A1", &[0.1])).unwrap();
        let rev = s.revision();

        let err = s.add(student("Bob", "A1", &[0.9])).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(ref r) if r == "A1"));

        let all = s.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Alice");
        assert_eq!(s.revision(), rev);
    }

    #[test]
    fn test_invalid_record_rejected() {
        let s = store();
        assert!(matches!(
            s.add(student("Alice", "A1", &[])),
            Err(StoreError::InvalidRecord(_))
        ));
        assert!(s.list().unwrap().is_empty());
    }

    #[test]
    fn test_remove() {
        let s = store();
        s.add(student("Alice", "A1", &[0.1])).unwrap();
        s.add(student("Bob", "B1", &[0.9])).unwrap();
        assert!(s.remove("A1").unwrap());
        assert!(!s.remove("A1").unwrap());
        assert_eq!(s.list().unwrap().len(), 1);
    }

    #[test]
    fn test_revision_shared_between_clones() {
        let s = store();
        let other = s.clone();
        assert_eq!(other.revision(), 0);
        s.add(student("Alice", "A1", &[0.1])).unwrap();
        assert_eq!(other.revision(), 1);
        other.remove("A1").unwrap();
        assert_eq!(s.revision(), 2);
    }
}
