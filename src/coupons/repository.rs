use async_trait::async_trait;
use sqlx::postgres::{PgConnection, PgPool};
use sqlx::{Postgres, Transaction};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::coupons::error::CouponResult;
use crate::coupons::models::{Coupon, CouponCondition, CouponStatus};

/// Read and usage access to coupons
///
/// Implementations return a coupon together with its conditions ordered by id.
#[async_trait]
pub trait CouponStore: Send + Sync {
    /// Find the active, non-deleted coupon with exactly this code
    ///
    /// `for_update` requests an exclusive row lock held until the surrounding
    /// transaction ends. Stores without transactions ignore it.
    async fn find_active_coupon_by_code(
        &self,
        code: &str,
        for_update: bool,
    ) -> CouponResult<Option<Coupon>>;

    /// Increment `used_count` if the coupon still has uses left
    ///
    /// Returns false when the coupon was already exhausted or does not exist.
    async fn increment_used_count(&self, coupon_id: i64) -> CouponResult<bool>;
}

const FIND_ACTIVE_COUPON: &str = r#"
    SELECT id, title, code, discount_percentage, discount_amount, currency,
           total_count, used_count, start_at, end_at, provider, status, description
    FROM coupons
    WHERE code = $1 AND status = $2 AND deleted_at IS NULL
    ORDER BY id
    LIMIT 1
"#;

const FIND_ACTIVE_COUPON_FOR_UPDATE: &str = r#"
    SELECT id, title, code, discount_percentage, discount_amount, currency,
           total_count, used_count, start_at, end_at, provider, status, description
    FROM coupons
    WHERE code = $1 AND status = $2 AND deleted_at IS NULL
    ORDER BY id
    LIMIT 1
    FOR UPDATE
"#;

const FIND_CONDITIONS: &str = r#"
    SELECT id, coupon_id, condition, data
    FROM coupon_conditions
    WHERE coupon_id = $1 AND deleted_at IS NULL
    ORDER BY id
"#;

const INCREMENT_USED_COUNT: &str = r#"
    UPDATE coupons
    SET used_count = used_count + 1, updated_at = NOW()
    WHERE id = $1 AND used_count < total_count AND deleted_at IS NULL
"#;

/// Load a coupon and its conditions over one connection
async fn fetch_active_coupon(
    conn: &mut PgConnection,
    code: &str,
    for_update: bool,
) -> CouponResult<Option<Coupon>> {
    tracing::debug!("Looking up active coupon: {} (for_update: {})", code, for_update);

    let sql = if for_update {
        FIND_ACTIVE_COUPON_FOR_UPDATE
    } else {
        FIND_ACTIVE_COUPON
    };

    let coupon = sqlx::query_as::<_, Coupon>(sql)
        .bind(code)
        .bind(CouponStatus::Active)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(mut coupon) = coupon else {
        return Ok(None);
    };

    coupon.conditions = sqlx::query_as::<_, CouponCondition>(FIND_CONDITIONS)
        .bind(coupon.id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(Some(coupon))
}

async fn bump_used_count(conn: &mut PgConnection, coupon_id: i64) -> CouponResult<bool> {
    let result = sqlx::query(INCREMENT_USED_COUNT)
        .bind(coupon_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Pool-backed coupon store
///
/// Each call runs on its own connection, so a `for_update` lock is released as soon
/// as the statement completes. Use `PgCouponTransaction` to hold it.
#[derive(Clone)]
pub struct PgCouponStore {
    pool: PgPool,
}

impl PgCouponStore {
    /// Create a new PgCouponStore
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Begin a transaction-backed store on the same pool
    pub async fn begin(&self) -> CouponResult<PgCouponTransaction> {
        PgCouponTransaction::begin(&self.pool).await
    }
}

#[async_trait]
impl CouponStore for PgCouponStore {
    async fn find_active_coupon_by_code(
        &self,
        code: &str,
        for_update: bool,
    ) -> CouponResult<Option<Coupon>> {
        let mut conn = self.pool.acquire().await?;
        fetch_active_coupon(&mut *conn, code, for_update).await
    }

    async fn increment_used_count(&self, coupon_id: i64) -> CouponResult<bool> {
        let mut conn = self.pool.acquire().await?;
        bump_used_count(&mut *conn, coupon_id).await
    }
}

/// Transaction-backed coupon store
///
/// Row locks taken by `for_update` lookups are held until `commit` or `rollback`.
/// Dropping the store without committing rolls the transaction back.
pub struct PgCouponTransaction {
    tx: Mutex<Transaction<'static, Postgres>>,
}

impl PgCouponTransaction {
    /// Begin a new transaction on the pool
    pub async fn begin(pool: &PgPool) -> CouponResult<Self> {
        let tx = pool.begin().await?;
        Ok(Self { tx: Mutex::new(tx) })
    }

    /// Commit every change made through this store
    pub async fn commit(self) -> CouponResult<()> {
        self.tx.into_inner().commit().await?;
        Ok(())
    }

    /// Discard every change made through this store
    pub async fn rollback(self) -> CouponResult<()> {
        self.tx.into_inner().rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl CouponStore for PgCouponTransaction {
    async fn find_active_coupon_by_code(
        &self,
        code: &str,
        for_update: bool,
    ) -> CouponResult<Option<Coupon>> {
        let mut tx = self.tx.lock().await;
        fetch_active_coupon(&mut **tx, code, for_update).await
    }

    async fn increment_used_count(&self, coupon_id: i64) -> CouponResult<bool> {
        let mut tx = self.tx.lock().await;
        bump_used_count(&mut **tx, coupon_id).await
    }
}

/// In-memory coupon store
///
/// Used by tests and by callers embedding the engine without a database. Counts
/// lookups so callers can assert that no lookup happened.
#[derive(Clone, Default)]
pub struct InMemoryCouponStore {
    coupons: Arc<RwLock<HashMap<i64, Coupon>>>,
    lookups: Arc<AtomicUsize>,
}

impl InMemoryCouponStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a coupon by id
    pub async fn insert(&self, coupon: Coupon) {
        self.coupons.write().await.insert(coupon.id, coupon);
    }

    /// Fetch a coupon by id regardless of status
    pub async fn get(&self, coupon_id: i64) -> Option<Coupon> {
        self.coupons.read().await.get(&coupon_id).cloned()
    }

    /// Number of code lookups served so far
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CouponStore for InMemoryCouponStore {
    async fn find_active_coupon_by_code(
        &self,
        code: &str,
        _for_update: bool,
    ) -> CouponResult<Option<Coupon>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        let coupons = self.coupons.read().await;
        let coupon = coupons
            .values()
            .filter(|coupon| coupon.code == code && coupon.status == CouponStatus::Active)
            .min_by_key(|coupon| coupon.id)
            .cloned()
            .map(|mut coupon| {
                coupon.conditions.sort_by_key(|condition| condition.id);
                coupon
            });

        Ok(coupon)
    }

    async fn increment_used_count(&self, coupon_id: i64) -> CouponResult<bool> {
        let mut coupons = self.coupons.write().await;

        match coupons.get_mut(&coupon_id) {
            Some(coupon) if coupon.used_count < coupon.total_count => {
                coupon.used_count += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coupons::models::Currency;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn coupon(id: i64, code: &str, status: CouponStatus) -> Coupon {
        let now = Utc::now();
        Coupon {
            id,
            title: Some("Welcome".to_string()),
            code: code.to_string(),
            discount_percentage: Some(dec!(10)),
            discount_amount: None,
            currency: Currency::Irr,
            total_count: 2,
            used_count: 0,
            start_at: now - Duration::days(1),
            end_at: now + Duration::days(1),
            provider: None,
            status,
            description: None,
            conditions: vec![],
        }
    }

    fn condition(id: i64, coupon_id: i64, name: &str) -> CouponCondition {
        CouponCondition {
            id,
            coupon_id,
            condition: name.to_string(),
            data: json!(null),
        }
    }

    #[tokio::test]
    async fn test_in_memory_finds_active_coupon_only() {
        let store = InMemoryCouponStore::new();
        store.insert(coupon(1, "OFF", CouponStatus::Inactive)).await;
        store.insert(coupon(2, "ON", CouponStatus::Active)).await;

        assert!(store.find_active_coupon_by_code("OFF", false).await.unwrap().is_none());
        let found = store.find_active_coupon_by_code("ON", false).await.unwrap().unwrap();
        assert_eq!(found.id, 2);
        assert!(store.find_active_coupon_by_code("on", false).await.unwrap().is_none());
        assert_eq!(store.lookups(), 3);
    }

    #[tokio::test]
    async fn test_in_memory_returns_conditions_in_id_order() {
        let store = InMemoryCouponStore::new();
        let mut stored = coupon(1, "ORDERED", CouponStatus::Active);
        stored.conditions = vec![condition(3, 1, "third"), condition(1, 1, "first")];
        store.insert(stored).await;

        let found = store
            .find_active_coupon_by_code("ORDERED", false)
            .await
            .unwrap()
            .unwrap();
        let names: Vec<&str> = found.conditions.iter().map(|c| c.condition.as_str()).collect();
        assert_eq!(names, vec!["first", "third"]);
    }

    #[tokio::test]
    async fn test_in_memory_increment_stops_at_total() {
        let store = InMemoryCouponStore::new();
        store.insert(coupon(1, "TWICE", CouponStatus::Active)).await;

        assert!(store.increment_used_count(1).await.unwrap());
        assert!(store.increment_used_count(1).await.unwrap());
        assert!(!store.increment_used_count(1).await.unwrap());
        assert!(!store.increment_used_count(99).await.unwrap());
        assert_eq!(store.get(1).await.unwrap().used_count, 2);
    }

    async fn test_pool() -> PgPool {
        let database_url = std::env::var("TEST_DATABASE_URL")
            .expect("TEST_DATABASE_URL must be set for Postgres store tests");
        let pool = PgPool::connect(&database_url).await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    async fn insert_coupon(pool: &PgPool, code: &str, status: CouponStatus) -> i64 {
        let now = Utc::now();
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO coupons (code, discount_percentage, currency, total_count, used_count,
                                 start_at, end_at, status)
            VALUES ($1, $2, $3, 1, 0, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(code)
        .bind(dec!(10))
        .bind(Currency::Irr)
        .bind(now - Duration::days(1))
        .bind(now + Duration::days(1))
        .bind(status)
        .fetch_one(pool)
        .await
        .unwrap();

        for name in ["payment_types", "minimum_amount"] {
            sqlx::query("INSERT INTO coupon_conditions (coupon_id, condition, data) VALUES ($1, $2, $3)")
                .bind(id)
                .bind(name)
                .bind(json!(["cash"]))
                .execute(pool)
                .await
                .unwrap();
        }

        id
    }

    fn unique_code(prefix: &str) -> String {
        format!("{}-{}", prefix, uuid::Uuid::new_v4())
    }

    #[tokio::test]
    #[ignore]
    async fn test_pg_store_loads_coupon_with_conditions() {
        let pool = test_pool().await;
        let code = unique_code("PG");
        let id = insert_coupon(&pool, &code, CouponStatus::Active).await;

        let store = PgCouponStore::new(pool);
        let found = store.find_active_coupon_by_code(&code, false).await.unwrap().unwrap();

        assert_eq!(found.id, id);
        assert_eq!(found.currency, Currency::Irr);
        let names: Vec<&str> = found.conditions.iter().map(|c| c.condition.as_str()).collect();
        assert_eq!(names, vec!["payment_types", "minimum_amount"]);
    }

    #[tokio::test]
    #[ignore]
    async fn test_pg_store_skips_inactive_coupon() {
        let pool = test_pool().await;
        let code = unique_code("PG-INACTIVE");
        insert_coupon(&pool, &code, CouponStatus::Inactive).await;

        let store = PgCouponStore::new(pool);
        assert!(store.find_active_coupon_by_code(&code, false).await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore]
    async fn test_pg_transaction_increment_and_rollback() {
        let pool = test_pool().await;
        let code = unique_code("PG-TX");
        let id = insert_coupon(&pool, &code, CouponStatus::Active).await;
        let store = PgCouponStore::new(pool.clone());

        let tx = store.begin().await.unwrap();
        let locked = tx.find_active_coupon_by_code(&code, true).await.unwrap().unwrap();
        assert_eq!(locked.id, id);
        assert!(tx.increment_used_count(id).await.unwrap());
        assert!(!tx.increment_used_count(id).await.unwrap());
        tx.rollback().await.unwrap();

        let found = store.find_active_coupon_by_code(&code, false).await.unwrap().unwrap();
        assert_eq!(found.used_count, 0);

        let tx = store.begin().await.unwrap();
        assert!(tx.increment_used_count(id).await.unwrap());
        tx.commit().await.unwrap();

        let found = store.find_active_coupon_by_code(&code, false).await.unwrap().unwrap();
        assert_eq!(found.used_count, 1);
    }
}
