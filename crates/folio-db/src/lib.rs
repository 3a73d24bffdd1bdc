//! # folio-db
//!
//! PostgreSQL database layer for the folio ingestion pipeline.
//!
//! This crate provides:
//! - Connection pool management
//! - The journal entry repository with compare-and-set state transitions
//! - Partial unique indexes as the authoritative duplicate guard
//! - An in-memory repository for deterministic tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use folio_db::Database;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/folio").await?;
//!     db.migrate().await?;
//!
//!     let status = db.entries.status(entry_id).await?;
//!     println!("entry is {}", status.state);
//!     Ok(())
//! }
//! ```

pub mod entries;
pub mod memory;
pub mod pool;

// Re-export core types
pub use folio_core::*;

pub use entries::PgEntryRepository;
pub use memory::MemoryEntryRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Journal entry repository.
    pub entries: PgEntryRepository,
}

impl Database {
    /// Create a database context over an existing pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        let entries = PgEntryRepository::new(pool.clone());
        Self { pool, entries }
    }

    /// Connect with default pool configuration.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Connect with custom pool configuration.
    pub async fn connect_with_config(database_url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(database_url, config).await?;
        Ok(Self::new(pool))
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}
