//! Postgres-backed order store.
//!
//! ## Layout
//!
//! | Table | Key | Notes |
//! |-------|-----|-------|
//! | `orders` | `id` | `total_cents` in minor units, index on `(user_id, created_at DESC)` |
//! | `order_items` | `id` | `order_id` references `orders(id)`, `line_no` fixes read order |
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | Any other | `Database` |
//! | RowNotFound | N/A | `NotFound` |
//! | PoolClosed, PoolTimedOut, Io, ... | N/A | `Database` |
//!
//! ## Atomicity
//!
//! `create` runs inside a `sqlx::Transaction`. Every early return, including
//! the caller's deadline dropping the future, drops the transaction, which
//! rolls it back and returns the connection to the pool.

use super::{now, OrderStore, StoreError};
use crate::config::DatabaseConfig;
use crate::model::{
    Money, NewOrder, Order, OrderId, OrderItem, OrderStatus, PageRequest, ProductId, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Row};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        total_cents BIGINT NOT NULL,
        status TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_orders_user_created ON orders (user_id, created_at DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS order_items (
        id TEXT PRIMARY KEY,
        order_id TEXT NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
        line_no INTEGER NOT NULL,
        product_id TEXT NOT NULL,
        quantity BIGINT NOT NULL CHECK (quantity > 0),
        price_cents BIGINT NOT NULL,
        product_name TEXT NOT NULL,
        UNIQUE (order_id, line_no)
    )
    "#,
];

const ORDER_COLUMNS: &str = "id, user_id, total_cents, status, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens the pool and checks connectivity, bounded by the connect timeout.
    ///
    /// Failure here is fatal at startup.
    #[instrument(skip(config), fields(host = %config.host, db = %config.name), err)]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .max_lifetime(config.max_lifetime)
            .acquire_timeout(config.connect_timeout);

        let pool = tokio::time::timeout(config.connect_timeout, options.connect(&config.url()))
            .await
            .map_err(|_| {
                StoreError::Database(format!(
                    "timed out after {:?} connecting to {}:{}",
                    config.connect_timeout, config.host, config.port
                ))
            })?
            .map_err(|e| map_sqlx_error("connect", e))?;

        info!(max_connections = config.max_connections, "Connected to database");
        Ok(Self::new(pool))
    }

    /// Creates the tables and indexes when missing.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load_items(
        &self,
        order_ids: &[String],
    ) -> Result<HashMap<String, Vec<OrderItem>>, StoreError> {
        if order_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query(
            r#"
            SELECT order_id, product_id, quantity, price_cents, product_name
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, line_no
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_items", e))?;

        let mut items: HashMap<String, Vec<OrderItem>> = HashMap::new();
        for row in rows {
            let row = ItemRow::from_row(&row).map_err(|e| map_sqlx_error("decode_item", e))?;
            let order_id = row.order_id.clone();
            items.entry(order_id).or_default().push(row.try_into()?);
        }
        Ok(items)
    }

    async fn assemble(&self, rows: Vec<PgRow>) -> Result<Vec<Order>, StoreError> {
        let rows = rows
            .iter()
            .map(OrderRow::from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("decode_order", e))?;
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let mut items = self.load_items(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                row.into_order(lines)
            })
            .collect()
    }

    /// Explains why a conditional update matched no row.
    async fn missed_update(&self, id: &OrderId) -> StoreError {
        let current: Result<Option<String>, _> =
            sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await;
        match current {
            Ok(None) => StoreError::NotFound(id.to_string()),
            Ok(Some(actual)) => match actual.parse::<OrderStatus>() {
                Ok(actual) => StoreError::StatusChanged {
                    id: id.to_string(),
                    actual,
                },
                Err(e) => StoreError::Database(e.to_string()),
            },
            Err(e) => map_sqlx_error("read_status", e),
        }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    #[instrument(
        skip(self, order),
        fields(user_id = %order.user_id, item_count = order.items.len()),
        err
    )]
    async fn create(&self, order: NewOrder) -> Result<Order, StoreError> {
        let id = order.id.clone().unwrap_or_else(OrderId::generate);
        let created_at = now();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, total_cents, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            "#,
        )
        .bind(id.as_str())
        .bind(order.user_id.as_str())
        .bind(order.total.cents())
        .bind(order.status.as_str())
        .bind(created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        for (line_no, item) in order.items.iter().enumerate() {
            let line_no = i32::try_from(line_no)
                .map_err(|_| StoreError::Database(format!("too many items in order {id}")))?;
            sqlx::query(
                r#"
                INSERT INTO order_items
                    (id, order_id, line_no, product_id, quantity, price_cents, product_name)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(uuid::Uuid::now_v7().to_string())
            .bind(id.as_str())
            .bind(line_no)
            .bind(item.product_id.as_str())
            .bind(i64::from(item.quantity))
            .bind(item.price.cents())
            .bind(&item.product_name)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_item", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        info!(order_id = %id, "Order row committed");
        Ok(order.into_order(id, created_at))
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&self, id: &OrderId) -> Result<Order, StoreError> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_order", e))?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        self.assemble(vec![row])
            .await?
            .pop()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    #[instrument(skip(self), err)]
    async fn list(
        &self,
        user_id: &UserId,
        page: PageRequest,
    ) -> Result<(Vec<Order>, u64), StoreError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user_id.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_orders", e))?;

        let offset = i64::try_from(page.offset())
            .map_err(|_| StoreError::Database("page offset out of range".to_string()))?;
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id.as_str())
        .bind(i64::from(page.limit()))
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_orders", e))?;

        let orders = self.assemble(rows).await?;
        debug!(returned = orders.len(), total, "Listed orders");
        Ok((orders, total.max(0) as u64))
    }

    #[instrument(skip(self), err)]
    async fn update_status(
        &self,
        id: &OrderId,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> Result<Order, StoreError> {
        let updated = sqlx::query(&format!(
            "UPDATE orders \
             SET status = $2, updated_at = GREATEST($3, updated_at + INTERVAL '1 microsecond') \
             WHERE id = $1 AND status = $4 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id.as_str())
        .bind(status.as_str())
        .bind(now())
        .bind(expected.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_status", e))?;

        let row = match updated {
            Some(row) => row,
            None => return Err(self.missed_update(id).await),
        };

        self.assemble(vec![row])
            .await?
            .pop()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Database(msg),
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound(format!("no row in {operation}")),
        sqlx::Error::PoolClosed => {
            StoreError::Database(format!("connection pool closed in {operation}"))
        }
        _ => StoreError::Database(format!("sqlx error in {operation}: {err}")),
    }
}

struct OrderRow {
    id: String,
    user_id: String,
    total_cents: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for OrderRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(OrderRow {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            total_cents: row.try_get("total_cents")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, StoreError> {
        let status = self
            .status
            .parse::<OrderStatus>()
            .map_err(|e| StoreError::Database(format!("order {}: {e}", self.id)))?;
        Ok(Order {
            id: OrderId::new(self.id),
            user_id: UserId::new(self.user_id),
            items,
            total: Money::from_cents(self.total_cents),
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

struct ItemRow {
    order_id: String,
    product_id: String,
    quantity: i64,
    price_cents: i64,
    product_name: String,
}

impl<'r> FromRow<'r, PgRow> for ItemRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ItemRow {
            order_id: row.try_get("order_id")?,
            product_id: row.try_get("product_id")?,
            quantity: row.try_get("quantity")?,
            price_cents: row.try_get("price_cents")?,
            product_name: row.try_get("product_name")?,
        })
    }
}

impl TryFrom<ItemRow> for OrderItem {
    type Error = StoreError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity).map_err(|_| {
            StoreError::Database(format!(
                "order {}: quantity {} out of range",
                row.order_id, row.quantity
            ))
        })?;
        Ok(OrderItem {
            product_id: ProductId::new(row.product_id),
            quantity,
            price: Money::from_cents(row.price_cents),
            product_name: row.product_name,
        })
    }
}
