use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde_json::Value;
use uuid::Uuid;

use super::{Filter, RecordStore, StoreError, StoredRecord};
use crate::core::shared::models::RecordType;
use crate::core::shared::schema::records;
use crate::core::shared::utils::DbPool;

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = records)]
struct DbRecord {
    record_type: String,
    id: Uuid,
    company_id: Option<Uuid>,
    data: Value,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = records)]
struct NewDbRecord {
    record_type: String,
    id: Uuid,
    company_id: Option<Uuid>,
    data: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DbRecord> for StoredRecord {
    type Error = StoreError;

    fn try_from(row: DbRecord) -> Result<Self, Self::Error> {
        let record_type = row
            .record_type
            .parse::<RecordType>()
            .map_err(StoreError::Backend)?;
        Ok(Self {
            record_type,
            id: row.id,
            company_id: row.company_id,
            data: row.data,
        })
    }
}

fn backend(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// PostgreSQL-backed store keeping every record type in one JSONB table.
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(
        &self,
    ) -> Result<diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<PgConnection>>, StoreError>
    {
        self.pool.get().map_err(backend)
    }
}

impl RecordStore for PgStore {
    fn get(&self, record_type: RecordType, id: Uuid) -> Result<Option<StoredRecord>, StoreError> {
        let mut conn = self.conn()?;
        let row: Option<DbRecord> = records::table
            .filter(records::record_type.eq(record_type.as_str()))
            .filter(records::id.eq(id))
            .select(DbRecord::as_select())
            .first(&mut conn)
            .optional()
            .map_err(backend)?;
        row.map(StoredRecord::try_from).transpose()
    }

    fn insert(&self, record: StoredRecord) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let now = Utc::now();
        let row = NewDbRecord {
            record_type: record.record_type.as_str().to_string(),
            id: record.id,
            company_id: record.company_id,
            data: record.data,
            created_at: now,
            updated_at: now,
        };
        match diesel::insert_into(records::table)
            .values(&row)
            .execute(&mut conn)
        {
            Ok(_) => Ok(()),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                Err(StoreError::Duplicate {
                    record_type: record.record_type,
                    id: record.id,
                })
            }
            Err(e) => Err(backend(e)),
        }
    }

    fn update(&self, record: StoredRecord) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let updated = diesel::update(
            records::table
                .filter(records::record_type.eq(record.record_type.as_str()))
                .filter(records::id.eq(record.id)),
        )
        .set((
            records::company_id.eq(record.company_id),
            records::data.eq(&record.data),
            records::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)
        .map_err(backend)?;

        if updated == 0 {
            return Err(StoreError::Missing {
                record_type: record.record_type,
                id: record.id,
            });
        }
        Ok(())
    }

    fn delete(&self, record_type: RecordType, id: Uuid) -> Result<bool, StoreError> {
        let mut conn = self.conn()?;
        let deleted = diesel::delete(
            records::table
                .filter(records::record_type.eq(record_type.as_str()))
                .filter(records::id.eq(id)),
        )
        .execute(&mut conn)
        .map_err(backend)?;
        Ok(deleted > 0)
    }

    fn list(
        &self,
        record_type: RecordType,
        filter: &Filter,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let mut conn = self.conn()?;
        let rows: Vec<DbRecord> = records::table
            .filter(records::record_type.eq(record_type.as_str()))
            .order(records::seq.asc())
            .select(DbRecord::as_select())
            .load(&mut conn)
            .map_err(backend)?;

        rows.into_iter()
            .filter(|row| filter.matches(&row.data))
            .map(StoredRecord::try_from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::utils::{create_pool, run_migrations};
    use serde_json::json;

    fn test_store() -> Option<PgStore> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let pool = create_pool(&url, 2).ok()?;
        run_migrations(&pool).ok()?;
        Some(PgStore::new(pool))
    }

    #[test]
    fn test_pg_roundtrip() {
        let Some(store) = test_store() else {
            eprintln!("Skipping test: DATABASE_URL not available");
            return;
        };

        let id = Uuid::new_v4();
        let record = StoredRecord {
            record_type: RecordType::Department,
            id,
            company_id: None,
            data: json!({"id": id, "department_name": "R&D"}),
        };
        store.insert(record.clone()).unwrap();
        assert!(matches!(
            store.insert(record.clone()),
            Err(StoreError::Duplicate { .. })
        ));
        assert_eq!(store.get(RecordType::Department, id).unwrap(), Some(record));
        assert!(store.delete(RecordType::Department, id).unwrap());
        assert_eq!(store.get(RecordType::Department, id).unwrap(), None);
    }
}
