//! Document store for typed records.
//!
//! Records are persisted as JSON documents keyed by `(RecordType, id)`.
//! `RecordStore` is the object-safe backend contract; `Repository` adds the
//! typed, error-mapped layer the services use.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::error::{OrgError, OrgResult};
use crate::core::shared::models::{Record, RecordType};

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{record_type} {id} does not exist")]
    Missing { record_type: RecordType, id: Uuid },
    #[error("{record_type} {id} already exists")]
    Duplicate { record_type: RecordType, id: Uuid },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for OrgError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Missing { record_type, id } => OrgError::not_found(record_type, id),
            StoreError::Duplicate { .. } => OrgError::Validation(e.to_string()),
            StoreError::Serialization(_) | StoreError::Backend(_) => {
                OrgError::Storage(e.to_string())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub record_type: RecordType,
    pub id: Uuid,
    pub company_id: Option<Uuid>,
    pub data: Value,
}

impl StoredRecord {
    pub fn from_record<R: Record>(record: &R) -> Result<Self, StoreError> {
        Ok(Self {
            record_type: R::RECORD_TYPE,
            id: record.id(),
            company_id: record.company_id(),
            data: serde_json::to_value(record)?,
        })
    }

    pub fn into_record<R: Record>(self) -> Result<R, StoreError> {
        Ok(serde_json::from_value(self.data)?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(String, Value),
    In(String, Vec<Value>),
}

impl Condition {
    fn matches(&self, doc: &Value) -> bool {
        match self {
            Self::Eq(field, expected) => doc.get(field).unwrap_or(&Value::Null) == expected,
            Self::In(field, allowed) => {
                let actual = doc.get(field).unwrap_or(&Value::Null);
                allowed.iter().any(|v| v == actual)
            }
        }
    }
}

/// Conjunction of top-level field conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl serde::Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.conditions.push(Condition::Eq(field.to_string(), value));
        self
    }

    pub fn eq_opt<T: serde::Serialize>(self, field: &str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.eq(field, v),
            None => self,
        }
    }

    pub fn is_in<T: serde::Serialize>(mut self, field: &str, values: &[T]) -> Self {
        let values = values
            .iter()
            .map(|v| serde_json::to_value(v).unwrap_or(Value::Null))
            .collect();
        self.conditions.push(Condition::In(field.to_string(), values));
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.conditions.iter().all(|c| c.matches(doc))
    }
}

pub trait RecordStore: Send + Sync {
    fn get(&self, record_type: RecordType, id: Uuid) -> Result<Option<StoredRecord>, StoreError>;

    fn insert(&self, record: StoredRecord) -> Result<(), StoreError>;

    fn update(&self, record: StoredRecord) -> Result<(), StoreError>;

    fn delete(&self, record_type: RecordType, id: Uuid) -> Result<bool, StoreError>;

    /// Records of `record_type` matching `filter`, in insertion order.
    fn list(&self, record_type: RecordType, filter: &Filter)
        -> Result<Vec<StoredRecord>, StoreError>;

    fn count(&self, record_type: RecordType, filter: &Filter) -> Result<usize, StoreError> {
        Ok(self.list(record_type, filter)?.len())
    }
}

#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn RecordStore>,
}

impl Repository {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn get<R: Record>(&self, id: Uuid) -> OrgResult<Option<R>> {
        match self.store.get(R::RECORD_TYPE, id)? {
            Some(stored) => Ok(Some(stored.into_record()?)),
            None => Ok(None),
        }
    }

    /// Like `get`, but a missing record is a `NotFound` error.
    pub fn fetch<R: Record>(&self, id: Uuid) -> OrgResult<R> {
        self.get::<R>(id)?
            .ok_or_else(|| OrgError::not_found(R::RECORD_TYPE, id))
    }

    /// Resolves a reference held by another record; a dangling one is a validation error.
    pub fn link<R: Record>(&self, id: Uuid) -> OrgResult<R> {
        self.get::<R>(id)?
            .ok_or_else(|| OrgError::Validation(format!("Could not find {}: {id}", R::RECORD_TYPE)))
    }

    pub fn insert<R: Record>(&self, record: &R) -> OrgResult<()> {
        self.store.insert(StoredRecord::from_record(record)?)?;
        Ok(())
    }

    pub fn update<R: Record>(&self, record: &R) -> OrgResult<()> {
        self.store.update(StoredRecord::from_record(record)?)?;
        Ok(())
    }

    pub fn delete<R: Record>(&self, id: Uuid) -> OrgResult<bool> {
        Ok(self.store.delete(R::RECORD_TYPE, id)?)
    }

    pub fn list<R: Record>(&self, filter: &Filter) -> OrgResult<Vec<R>> {
        self.store
            .list(R::RECORD_TYPE, filter)?
            .into_iter()
            .map(|stored| stored.into_record().map_err(OrgError::from))
            .collect()
    }

    pub fn count<R: Record>(&self, filter: &Filter) -> OrgResult<usize> {
        Ok(self.store.count(R::RECORD_TYPE, filter)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_eq_and_in() {
        let doc = json!({"company": "a", "status": "Active"});

        assert!(Filter::new().matches(&doc));
        assert!(Filter::new().eq("company", "a").matches(&doc));
        assert!(!Filter::new().eq("company", "b").matches(&doc));
        assert!(Filter::new()
            .eq("company", "a")
            .is_in("status", &["Active", "Suspended"])
            .matches(&doc));
        assert!(!Filter::new().is_in("status", &["Left"]).matches(&doc));
    }

    #[test]
    fn test_filter_missing_field_matches_null() {
        let doc = json!({"company": "a"});
        assert!(Filter::new().eq("department", Value::Null).matches(&doc));
        assert!(!Filter::new().eq("department", "x").matches(&doc));
    }

    #[test]
    fn test_filter_eq_opt_skips_none() {
        let filter = Filter::new().eq_opt::<&str>("company", None);
        assert!(filter.conditions().is_empty());
    }

    #[test]
    fn test_store_error_maps_to_org_error() {
        let id = Uuid::new_v4();
        let err: OrgError = StoreError::Missing {
            record_type: RecordType::Project,
            id,
        }
        .into();
        assert!(matches!(err, OrgError::NotFound(_)));

        let err: OrgError = StoreError::Backend("down".into()).into();
        assert!(matches!(err, OrgError::Storage(_)));
    }
}
