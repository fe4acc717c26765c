use diesel::{
    PgConnection,
    r2d2::{ConnectionManager, Pool},
};
use thiserror::Error;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database URL is not configured")]
    MissingDatabaseUrl,
    #[error("Failed to create database connection pool: {0}")]
    PoolCreationError(String),
}

pub fn init_pool(database_url: &str) -> Result<DbPool, DatabaseError> {
    if database_url.is_empty() {
        return Err(DatabaseError::MissingDatabaseUrl);
    }
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = Pool::builder()
        .build(manager)
        .map_err(|e| DatabaseError::PoolCreationError(format!("Pool creation failed: {}", e)))?;
    Ok(pool)
}
