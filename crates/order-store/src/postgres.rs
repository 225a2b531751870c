use async_trait::async_trait;
use domain::{Order, OrderDocument};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{OrderId, OrderQuery, OrderRepository, Result, StoreError, Version};

/// PostgreSQL-backed order repository.
///
/// Each order is one row: the document as JSONB plus the columns needed
/// for filtering (`user_id`, `is_deleted`, `created_at`) and the version.
#[derive(Clone)]
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    /// Creates a new PostgreSQL order repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let document: serde_json::Value = row.try_get("document")?;
        let document: OrderDocument = serde_json::from_value(document)?;
        let version = Version::new(row.try_get("version")?);
        Ok(Order::try_from(document)?.with_version(version))
    }

    async fn stored_version(&self, id: OrderId) -> Result<Version> {
        let version: Option<i64> = sqlx::query_scalar("SELECT version FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        Ok(version.map(Version::new).unwrap_or(Version::initial()))
    }
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    #[tracing::instrument(skip(self))]
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT document, version FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn find(&self, query: OrderQuery) -> Result<Vec<Order>> {
        let mut sql = String::from("SELECT document, version FROM orders WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic query
        if !query.include_deleted {
            sql.push_str(" AND NOT is_deleted");
        }
        if query.user_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND user_id = ${param_count}"));
        }

        sql.push_str(" ORDER BY created_at ASC, id ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(user_id) = query.user_id {
            sqlx_query = sqlx_query.bind(user_id.as_i64());
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(i64::try_from(offset).unwrap_or(i64::MAX));
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_order).collect()
    }

    #[tracing::instrument(skip(self, order), fields(order_id = %order.id(), version = %order.version()))]
    async fn save(&self, order: &Order) -> Result<Order> {
        let order_id = order.id();
        let expected = order.version();
        let document = serde_json::to_value(OrderDocument::from(order))?;

        let new_version: Option<i64> = if expected.is_initial() {
            sqlx::query_scalar(
                r#"
                INSERT INTO orders (id, user_id, version, document, is_deleted, created_at, updated_at)
                VALUES ($1, $2, 1, $3, $4, $5, $6)
                ON CONFLICT (id) DO NOTHING
                RETURNING version
                "#,
            )
            .bind(order_id.as_uuid())
            .bind(order.user_id().as_i64())
            .bind(&document)
            .bind(order.is_deleted())
            .bind(order.created_at())
            .bind(order.updated_at())
            .fetch_optional(&self.pool)
            .await?
        } else {
            sqlx::query_scalar(
                r#"
                UPDATE orders
                SET document = $3, is_deleted = $4, updated_at = $5, version = version + 1
                WHERE id = $1 AND version = $2
                RETURNING version
                "#,
            )
            .bind(order_id.as_uuid())
            .bind(expected.as_i64())
            .bind(&document)
            .bind(order.is_deleted())
            .bind(order.updated_at())
            .fetch_optional(&self.pool)
            .await?
        };

        match new_version {
            Some(version) => Ok(order.clone().with_version(Version::new(version))),
            None => {
                let actual = self.stored_version(order_id).await?;
                tracing::debug!(%actual, "version check rejected write");
                Err(StoreError::ConcurrencyConflict {
                    order_id,
                    expected,
                    actual,
                })
            }
        }
    }

    async fn exists_by_id(&self, id: OrderId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM orders WHERE id = $1)")
            .bind(Uuid::from(id))
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}
