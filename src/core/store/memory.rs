use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use super::{Filter, RecordStore, StoreError, StoredRecord};
use crate::core::shared::models::RecordType;

/// Process-local store; each record type keeps its documents in insertion order.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<RecordType, Vec<StoredRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Backend(format!("store lock poisoned: {e}"))
}

impl RecordStore for MemoryStore {
    fn get(&self, record_type: RecordType, id: Uuid) -> Result<Option<StoredRecord>, StoreError> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables
            .get(&record_type)
            .and_then(|rows| rows.iter().find(|r| r.id == id))
            .cloned())
    }

    fn insert(&self, record: StoredRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        let rows = tables.entry(record.record_type).or_default();
        if rows.iter().any(|r| r.id == record.id) {
            return Err(StoreError::Duplicate {
                record_type: record.record_type,
                id: record.id,
            });
        }
        rows.push(record);
        Ok(())
    }

    fn update(&self, record: StoredRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        let slot = tables
            .get_mut(&record.record_type)
            .and_then(|rows| rows.iter_mut().find(|r| r.id == record.id));
        match slot {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(StoreError::Missing {
                record_type: record.record_type,
                id: record.id,
            }),
        }
    }

    fn delete(&self, record_type: RecordType, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        let Some(rows) = tables.get_mut(&record_type) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|r| r.id != id);
        Ok(rows.len() != before)
    }

    fn list(
        &self,
        record_type: RecordType,
        filter: &Filter,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables
            .get(&record_type)
            .map(|rows| {
                rows.iter()
                    .filter(|r| filter.matches(&r.data))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(record_type: RecordType, company: &str) -> StoredRecord {
        StoredRecord {
            record_type,
            id: Uuid::new_v4(),
            company_id: None,
            data: json!({ "company": company }),
        }
    }

    #[test]
    fn test_insert_get_delete() {
        let store = MemoryStore::new();
        let rec = row(RecordType::Employee, "a");
        let id = rec.id;

        store.insert(rec.clone()).unwrap();
        assert_eq!(store.get(RecordType::Employee, id).unwrap(), Some(rec));
        assert_eq!(store.get(RecordType::Project, id).unwrap(), None);

        assert!(store.delete(RecordType::Employee, id).unwrap());
        assert!(!store.delete(RecordType::Employee, id).unwrap());
        assert_eq!(store.get(RecordType::Employee, id).unwrap(), None);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let store = MemoryStore::new();
        let rec = row(RecordType::Company, "a");
        store.insert(rec.clone()).unwrap();
        assert!(matches!(
            store.insert(rec),
            Err(StoreError::Duplicate { .. })
        ));
    }

    #[test]
    fn test_update_missing_fails() {
        let store = MemoryStore::new();
        let rec = row(RecordType::Department, "a");
        assert!(matches!(store.update(rec), Err(StoreError::Missing { .. })));
    }

    #[test]
    fn test_list_filters_and_keeps_order() {
        let store = MemoryStore::new();
        let first = row(RecordType::Employee, "a");
        let second = row(RecordType::Employee, "b");
        let third = row(RecordType::Employee, "a");
        for r in [&first, &second, &third] {
            store.insert(r.clone()).unwrap();
        }

        let in_a = store
            .list(RecordType::Employee, &Filter::new().eq("company", "a"))
            .unwrap();
        let ids: Vec<Uuid> = in_a.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![first.id, third.id]);
        assert_eq!(
            store.count(RecordType::Employee, &Filter::new()).unwrap(),
            3
        );
    }
}
