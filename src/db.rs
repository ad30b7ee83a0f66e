use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::CouponConfig;
use crate::coupons::error::{CouponError, CouponResult};

/// Type alias for the PostgreSQL connection pool
pub type DbPool = PgPool;

/// Creates and configures a PostgreSQL connection pool
///
/// # Arguments
/// * `config` - Engine configuration; `database_url` must be set
///
/// # Returns
/// * `CouponResult<DbPool>` - Configured connection pool or error
///
/// # Example
/// ```no_run
/// # async fn run() -> conditional_coupon::CouponResult<()> {
/// let config = conditional_coupon::CouponConfig::from_env()?;
/// let pool = conditional_coupon::db::create_pool(&config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn create_pool(config: &CouponConfig) -> CouponResult<DbPool> {
    let database_url = config
        .database_url
        .as_deref()
        .ok_or_else(|| CouponError::InvalidConfiguration("DATABASE_URL must be set".to_string()))?;

    tracing::debug!(
        "Creating database connection pool (max {} connections)",
        config.max_connections
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .connect(database_url)
        .await?;

    tracing::info!("Database connection pool created successfully");
    Ok(pool)
}

/// Apply the coupon schema migrations
pub async fn run_migrations(pool: &PgPool) -> CouponResult<()> {
    tracing::info!("Running coupon migrations...");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| CouponError::Database(e.into()))?;

    tracing::info!("Coupon migrations completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_pool_requires_database_url() {
        let result = create_pool(&CouponConfig::default()).await;
        assert!(matches!(result, Err(CouponError::InvalidConfiguration(ref msg)) if msg.contains("DATABASE_URL")));
    }
}
