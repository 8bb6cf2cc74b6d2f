use crate::config::AppConfig;
use crate::errors::{AppError, ServiceError};
use futures::future::BoxFuture;
use metrics::{counter, gauge, histogram};
use migrations::Migrator;
use sea_orm::{
    ConnectOptions, Database, DatabaseConnection, DatabaseTransaction, DbErr, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Minimum number of connections
    pub min_connections: u32,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Idle timeout duration
    pub idle_timeout: Duration,
    /// Acquire connection timeout
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

/// Establishes a connection pool to the database
///
/// # Errors
/// Returns an `AppError` if the connection cannot be established
pub async fn establish_connection(database_url: &str) -> Result<DbPool, AppError> {
    let config = DbConfig {
        url: database_url.to_string(),
        ..Default::default()
    };

    establish_connection_with_config(&config).await
}

/// Establishes a connection pool to the database with custom configuration
///
/// # Errors
/// Returns an `AppError` if the connection cannot be established
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, AppError> {
    debug!("Configuring database connection with: {:?}", config);

    let mut opt = ConnectOptions::new(config.url.clone());

    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(true);

    gauge!("storefront_db.max_connections", config.max_connections as f64);

    info!(
        "Connecting to database with max_connections={}",
        config.max_connections
    );

    let db_pool = Database::connect(opt).await.map_err(|e| {
        error!("Database connection establishment failed: {}", e);
        AppError::DatabaseError(e)
    })?;

    info!("Database connection pool established successfully");

    Ok(db_pool)
}

/// Establish DB pool using AppConfig tuning
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, AppError> {
    let db_cfg: DbConfig = cfg.into();
    establish_connection_with_config(&db_cfg).await
}

/// Connects using the application config and creates the schema when the
/// config asks for it
pub async fn connect_and_prepare(cfg: &AppConfig) -> Result<DbPool, AppError> {
    let pool = establish_connection_from_app_config(cfg).await?;
    if cfg.auto_migrate {
        run_migrations(&pool).await?;
    }
    Ok(pool)
}

/// Database access wrapper with built-in metrics and error handling
#[derive(Debug, Clone)]
pub struct DatabaseAccess {
    pool: Arc<DbPool>,
}

impl DatabaseAccess {
    /// Create a new database access instance
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    /// Run `f` inside a transaction that commits when it returns `Ok` and
    /// rolls back otherwise
    pub async fn transaction<F, T, E>(&self, name: &str, f: F) -> Result<T, E>
    where
        F: for<'a> FnOnce(&'a DatabaseTransaction) -> BoxFuture<'a, Result<T, E>> + Send,
        T: Send + 'static,
        E: From<DbErr> + Send + 'static + std::error::Error,
    {
        let db = &*self.pool;
        let start = Instant::now();

        debug!(transaction = %name, "Starting database transaction");
        counter!("storefront_db.transaction.started", 1);

        let result = db.transaction(move |txn| f(txn)).await;

        let elapsed = start.elapsed();
        histogram!("storefront_db.transaction.duration", elapsed);

        match &result {
            Ok(_) => {
                counter!("storefront_db.transaction.committed", 1);
                debug!(transaction = %name, "Transaction committed successfully in {:?}", elapsed);
            }
            Err(_) => {
                counter!("storefront_db.transaction.rolled_back", 1);
                warn!(transaction = %name, "Transaction rolled back after {:?}", elapsed);
            }
        }

        result.map_err(|e| match e {
            sea_orm::TransactionError::Connection(e) => E::from(e),
            sea_orm::TransactionError::Transaction(e) => e,
        })
    }

    /// Execute a read with metrics and logging
    pub async fn execute<F, Fut, T>(&self, operation: &str, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(Arc<DbPool>) -> Fut,
        Fut: Future<Output = Result<T, DbErr>>,
    {
        let start = Instant::now();

        debug!(operation = %operation, "Starting database operation");

        let result = f(self.pool.clone()).await.map_err(|e| {
            error!(operation = %operation, error = %e, "Database operation failed");
            counter!("storefront_db.operation.error", 1, "operation" => operation.to_string());
            ServiceError::DatabaseError(e)
        });

        let elapsed = start.elapsed();
        histogram!("storefront_db.operation.duration", elapsed, "operation" => operation.to_string());

        if result.is_ok() {
            debug!(operation = %operation, duration = ?elapsed, "Database operation completed successfully");
        }

        result
    }
}

/// Runs database migrations
///
/// # Errors
/// Returns an `AppError` if migrations fail to execute
pub async fn run_migrations(pool: &DbPool) -> Result<(), AppError> {
    info!("Running database migrations");
    let start = Instant::now();

    let result = Migrator::up(pool, None)
        .await
        .map_err(|e| AppError::MigrationError(e.to_string()));

    let elapsed = start.elapsed();
    match &result {
        Ok(_) => info!(
            "Database migrations completed successfully in {:?}",
            elapsed
        ),
        Err(e) => error!("Database migrations failed after {:?}: {}", elapsed, e),
    }

    result
}

/// Rolls back every applied migration, dropping the schema
pub async fn rollback_migrations(pool: &DbPool) -> Result<(), AppError> {
    warn!("Rolling back all database migrations");

    Migrator::down(pool, None).await.map_err(|e| {
        error!("Database rollback failed: {}", e);
        AppError::MigrationError(e.to_string())
    })
}

/// Checks if the database connection is active
pub async fn check_connection(pool: &DbPool) -> Result<(), AppError> {
    debug!("Checking database connection");
    let start = Instant::now();

    let result = pool.ping().await.map_err(AppError::DatabaseError);

    let elapsed = start.elapsed();
    match &result {
        Ok(_) => {
            debug!("Database connection check successful in {:?}", elapsed);
            gauge!("storefront_db.connection_latency", elapsed.as_millis() as f64);
        }
        Err(e) => {
            error!(
                "Database connection check failed after {:?}: {}",
                elapsed, e
            );
            counter!("storefront_db.connection_failures", 1);
        }
    }

    result
}

/// Closes the database connection pool
pub async fn close_pool(pool: DbPool) -> Result<(), AppError> {
    info!("Closing database connection pool");

    pool.close().await.map_err(AppError::DatabaseError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ConnectionTrait, DbBackend, Statement};

    async fn setup_test_pool() -> DbPool {
        establish_connection("sqlite::memory:")
            .await
            .expect("Failed to establish connection")
    }

    async fn table_names(pool: &DbPool) -> Vec<String> {
        let rows = pool
            .query_all(Statement::from_string(
                DbBackend::Sqlite,
                "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name".to_string(),
            ))
            .await
            .expect("list tables");
        rows.iter()
            .map(|row| row.try_get::<String>("", "name").expect("table name"))
            .collect()
    }

    #[tokio::test]
    async fn test_establish_connection() {
        let pool = setup_test_pool().await;
        assert!(check_connection(&pool).await.is_ok());
    }

    #[tokio::test]
    async fn migrations_create_and_drop_schema() {
        let pool = setup_test_pool().await;
        run_migrations(&pool).await.expect("migrate up");

        let tables = table_names(&pool).await;
        for expected in ["customers", "order_products", "orders", "products"] {
            assert!(tables.iter().any(|t| t == expected), "missing {expected}");
        }

        // Running again is a no-op
        run_migrations(&pool).await.expect("migrate up twice");

        rollback_migrations(&pool).await.expect("migrate down");
        let tables = table_names(&pool).await;
        assert!(!tables.iter().any(|t| t == "orders"));
    }

    #[tokio::test]
    async fn order_date_has_no_database_default() {
        let pool = setup_test_pool().await;
        run_migrations(&pool).await.unwrap();

        pool.execute(Statement::from_string(
            DbBackend::Sqlite,
            "INSERT INTO customers (first_name, last_name, address, city, postcode, email) \
             VALUES ('Ada', 'Byron', '1 Main Street', 'London', 'N1', 'ada@example.com')"
                .to_string(),
        ))
        .await
        .unwrap();

        let result = pool
            .execute(Statement::from_string(
                DbBackend::Sqlite,
                "INSERT INTO orders (customer_id) VALUES (1)".to_string(),
            ))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn transaction_commits_on_ok() {
        let pool = setup_test_pool().await;
        let db_access = DatabaseAccess::new(Arc::new(pool));

        let result = db_access
            .transaction("answer", |_txn| Box::pin(async move { Ok::<_, ServiceError>(42) }))
            .await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn transaction_rolls_back_on_err() {
        let pool = setup_test_pool().await;
        run_migrations(&pool).await.unwrap();
        let db_access = DatabaseAccess::new(Arc::new(pool));

        let result: Result<(), ServiceError> = db_access
            .transaction("doomed", |txn| {
                Box::pin(async move {
                    txn.execute(Statement::from_string(
                        DbBackend::Sqlite,
                        "INSERT INTO products (name, price) VALUES ('Teal', 12)".to_string(),
                    ))
                    .await?;
                    Err(ServiceError::InvalidInput("abort".into()))
                })
            })
            .await;
        assert!(result.is_err());

        let count = db_access
            .execute("count_products", |db| async move {
                db.query_one(Statement::from_string(
                    DbBackend::Sqlite,
                    "SELECT COUNT(*) AS n FROM products".to_string(),
                ))
                .await
            })
            .await
            .unwrap()
            .unwrap()
            .try_get::<i64>("", "n")
            .unwrap();
        assert_eq!(count, 0);
    }
}
