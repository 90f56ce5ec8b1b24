//! Typed list codec over the key-value store.
//!
//! Stored values are validated on the way in. Anything that does not decode
//! is copied to `<key>.quarantine` and dropped from the returned list. A
//! different corrupt value found later goes to `<key>.quarantine.2`, `.3`
//! and so on; re-reading the same corrupt value writes nothing new.

use crate::kv::KeyValueStore;
use crate::StoreError;
use rollcall_core::RecordError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorruptionKind {
    /// The whole value is not a JSON array; treated as an empty list.
    NotAList,
    /// Some entries were dropped; the count is how many.
    BadEntries(usize),
}

/// Warning raised when a stored list could not be fully decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("stored {key} is corrupt ({kind:?}); raw value quarantined under {quarantine_key}")]
pub struct StoreCorruption {
    pub key: String,
    pub quarantine_key: String,
    pub kind: CorruptionKind,
}

/// Decoded list plus any corruption found while reading it.
#[derive(Debug, Clone)]
pub struct Records<T> {
    pub items: Vec<T>,
    pub corruption: Option<StoreCorruption>,
}

pub fn quarantine_key(key: &str) -> String {
    format!("{key}.quarantine")
}

pub(crate) fn load_list<T>(
    kv: &dyn KeyValueStore,
    key: &str,
    validate: fn(&T) -> Result<(), RecordError>,
) -> Result<Records<T>, StoreError>
where
    T: DeserializeOwned,
{
    let Some(raw) = kv.get(key)? else {
        return Ok(Records {
            items: Vec::new(),
            corruption: None,
        });
    };

    let values: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
        Ok(values) => values,
        Err(e) => {
            tracing::warn!(key, error = %e, "stored list is not a JSON array; treating as empty");
            let corruption = quarantine(kv, key, &raw, CorruptionKind::NotAList)?;
            return Ok(Records {
                items: Vec::new(),
                corruption: Some(corruption),
            });
        }
    };

    let total = values.len();
    let mut items = Vec::with_capacity(total);
    for (index, value) in values.into_iter().enumerate() {
        let decoded = serde_json::from_value::<T>(value)
            .map_err(|e| e.to_string())
            .and_then(|item| validate(&item).map(|_| item).map_err(|e| e.to_string()));
        match decoded {
            Ok(item) => items.push(item),
            Err(reason) => tracing::warn!(key, index, %reason, "dropping malformed entry"),
        }
    }

    let dropped = total - items.len();
    let corruption = if dropped > 0 {
        Some(quarantine(kv, key, &raw, CorruptionKind::BadEntries(dropped))?)
    } else {
        None
    };

    Ok(Records { items, corruption })
}

pub(crate) fn store_list<T: Serialize>(
    kv: &dyn KeyValueStore,
    key: &str,
    items: &[T],
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(items)?;
    kv.set(key, &raw)
}

fn quarantine(
    kv: &dyn KeyValueStore,
    key: &str,
    raw: &str,
    kind: CorruptionKind,
) -> Result<StoreCorruption, StoreError> {
    let base = quarantine_key(key);
    let mut quarantine_key = base.clone();
    let mut slot = 1;
    loop {
        match kv.get(&quarantine_key)? {
            None => {
                kv.set(&quarantine_key, raw)?;
                break;
            }
            Some(held) if held == raw => break,
            Some(_) => {
                slot += 1;
                quarantine_key = format!("{base}.{slot}");
            }
        }
    }
    Ok(StoreCorruption {
        key: key.to_string(),
        quarantine_key,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;
    use rollcall_core::StudentRecord;

    fn load(kv: &MemoryStore) -> Records<StudentRecord> {
        load_list(kv, "students", StudentRecord::validate).unwrap()
    }

    #[test]
    fn test_missing_key_is_empty() {
        let r = load(&MemoryStore::new());
        assert!(r.items.is_empty());
        assert!(r.corruption.is_none());
    }

    #[test]
    fn test_not_a_list_is_quarantined() {
        let kv = MemoryStore::new().with_value("students", "{oops");
        let r = load(&kv);
        assert!(r.items.is_empty());
        let c = r.corruption.unwrap();
        assert_eq!(c.kind, CorruptionKind::NotAList);
        assert_eq!(kv.get(&c.quarantine_key).unwrap().as_deref(), Some("{oops"));
    }

    #[test]
    fn test_bad_entries_dropped_good_kept() {
        let raw = r#"[
            {"name": "Alice", "roll": "A1", "descriptor": [0.1, 0.2]},
            {"name": "NoDescriptor", "roll": "B2"},
            {"name": "", "roll": "C3", "descriptor": [0.3]},
            {"name": "Dan", "roll": "D4", "descriptor": [0.4, 0.5]}
        ]"#;
        let kv = MemoryStore::new().with_value("students", raw);
        let r = load(&kv);
        let rolls: Vec<_> = r.items.iter().map(|s| s.roll.as_str()).collect();
        assert_eq!(rolls, vec!["A1", "D4"]);
        assert_eq!(r.corruption.unwrap().kind, CorruptionKind::BadEntries(2));
        assert_eq!(kv.get("students.quarantine").unwrap().as_deref(), Some(raw));
    }

    #[test]
    fn test_quarantine_keeps_earlier_corruption() {
        let kv = MemoryStore::new().with_value("students", "{oops");
        assert_eq!(load(&kv).corruption.unwrap().quarantine_key, "students.quarantine");
        // Reading the same value again reuses the slot.
        assert_eq!(load(&kv).corruption.unwrap().quarantine_key, "students.quarantine");
        assert!(kv.get("students.quarantine.2").unwrap().is_none());

        kv.set("students", "42").unwrap();
        let c = load(&kv).corruption.unwrap();
        assert_eq!(c.quarantine_key, "students.quarantine.2");
        assert_eq!(kv.get("students.quarantine").unwrap().as_deref(), Some("{oops"));
        assert_eq!(kv.get("students.quarantine.2").unwrap().as_deref(), Some("42"));
    }

    #[test]
    fn test_store_then_load() {
        let kv = MemoryStore::new();
        let items = vec![StudentRecord {
            name: "Alice".into(),
            roll: "A1".into(),
            descriptor: vec![0.25, -0.5].into(),
        }];
        store_list(&kv, "students", &items).unwrap();
        assert_eq!(load(&kv).items, items);
    }
}
