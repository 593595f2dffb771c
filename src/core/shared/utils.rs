use std::sync::Arc;

use crate::core::error::OrgResult;
use crate::core::shared::state::AppState;

#[cfg(feature = "postgres")]
use diesel::{
    r2d2::{ConnectionManager, Pool},
    PgConnection,
};

#[cfg(feature = "postgres")]
pub type DbPool = Pool<ConnectionManager<PgConnection>>;

#[cfg(feature = "postgres")]
pub fn create_pool(database_url: &str, max_size: u32) -> Result<DbPool, diesel::r2d2::PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder().max_size(max_size).build(manager)
}

/// Run database migrations
#[cfg(feature = "postgres")]
pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

    const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

    let mut conn = pool.get()?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> {
            format!("Migration error: {e}").into()
        })?;
    Ok(())
}

/// Runs a synchronous service call on the blocking pool.
pub async fn run_blocking<T, F>(state: &Arc<AppState>, f: F) -> OrgResult<T>
where
    T: Send + 'static,
    F: FnOnce(&AppState) -> OrgResult<T> + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state)).await?
}

pub fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}
