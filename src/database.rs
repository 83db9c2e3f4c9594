use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::{Like, Page, User};
use crate::schema::{create_table_sql, ModelSchema};

// SQLite storage with foreign keys enforced
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn connect(database_url: &str) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| {
                AppError::ConfigurationError(format!("Invalid database URL {}: {}", database_url, e))
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
        if !in_memory {
            let filename = options.clone().get_filename();
            if let Some(parent) = filename.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await.map_err(|e| {
                        AppError::ConfigurationError(format!(
                            "Failed to create database directory {}: {}",
                            parent.display(),
                            e
                        ))
                    })?;
                }
            }
        }

        // Every connection to ":memory:" is a separate database
        let max_connections = if in_memory { 1 } else { 5 };
        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }
        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to connect to {}: {}", database_url, e))
            })?;

        info!(url = %database_url, max_connections, "Connected to SQLite");
        Ok(Self { pool })
    }

    pub async fn new_in_memory() -> AppResult<Self> {
        let db = Self::connect("sqlite::memory:").await?;
        db.migrate().await?;
        Ok(db)
    }

    /// Create model tables; parents before the tables referencing them
    pub async fn migrate(&self) -> AppResult<()> {
        self.create_table::<User>().await?;
        self.create_table::<Page>().await?;
        self.create_table::<Like>().await?;
        Ok(())
    }

    async fn create_table<S: ModelSchema>(&self) -> AppResult<()> {
        let ddl = create_table_sql::<S>();
        debug!(table = S::table(), "{}", ddl);
        sqlx::query(&ddl)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to create {} table: {}", S::table(), e))
            })?;
        Ok(())
    }
}
