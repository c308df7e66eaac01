//! In-memory order store.
//!
//! Two tables behind one `RwLock`, mirroring the relational layout: order rows
//! keyed by id and item rows keyed by `(order_id, line_no)`. Creates go
//! through a [`Transaction`] that stages rows and only applies them on
//! [`Transaction::commit`]; dropping it discards everything staged.
//!
//! Faults can be injected to exercise the failure paths the service has to
//! survive (an item insert failing after the order row went in, a failing
//! update, a slow backend).

use super::{next_update_time, now, OrderStore, StoreError};
use crate::model::{NewOrder, Order, OrderId, OrderItem, OrderStatus, PageRequest, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
struct OrderRow {
    user_id: UserId,
    total: crate::model::Money,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    /// Insertion sequence, breaks `created_at` ties.
    seq: u64,
}

#[derive(Debug, Default)]
struct Faults {
    /// Item inserts allowed before the next one fails.
    item_insert_budget: Option<usize>,
    fail_next_update: bool,
}

#[derive(Debug, Default)]
struct Tables {
    orders: HashMap<OrderId, OrderRow>,
    items: BTreeMap<(OrderId, usize), OrderItem>,
    next_seq: u64,
    faults: Faults,
}

impl Tables {
    fn load(&self, id: &OrderId) -> Option<Order> {
        let row = self.orders.get(id)?;
        let items = self
            .items
            .range((id.clone(), 0)..=(id.clone(), usize::MAX))
            .map(|(_, item)| item.clone())
            .collect();
        Some(Order {
            id: id.clone(),
            user_id: row.user_id.clone(),
            items,
            total: row.total,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A write transaction over [`Tables`]. Holds the write lock for its lifetime.
struct Transaction<'a> {
    tables: RwLockWriteGuard<'a, Tables>,
    orders: Vec<(OrderId, OrderRow)>,
    items: Vec<((OrderId, usize), OrderItem)>,
}

impl<'a> Transaction<'a> {
    fn begin(tables: RwLockWriteGuard<'a, Tables>) -> Self {
        Self {
            tables,
            orders: Vec::new(),
            items: Vec::new(),
        }
    }

    fn insert_order(&mut self, id: OrderId, row: OrderRow) -> Result<(), StoreError> {
        let staged = self.orders.iter().any(|(existing, _)| existing == &id);
        if staged || self.tables.orders.contains_key(&id) {
            return Err(StoreError::Conflict(id.to_string()));
        }
        self.orders.push((id, row));
        Ok(())
    }

    fn insert_item(
        &mut self,
        order_id: OrderId,
        line_no: usize,
        item: OrderItem,
    ) -> Result<(), StoreError> {
        if let Some(budget) = self.tables.faults.item_insert_budget.as_mut() {
            if *budget == 0 {
                self.tables.faults.item_insert_budget = None;
                return Err(StoreError::Database(format!(
                    "injected failure inserting item {line_no} of order {order_id}"
                )));
            }
            *budget -= 1;
        }
        self.items.push(((order_id, line_no), item));
        Ok(())
    }

    fn next_seq(&mut self) -> u64 {
        self.tables.next_seq += 1;
        self.tables.next_seq
    }

    fn commit(mut self) {
        let orders = std::mem::take(&mut self.orders);
        let items = std::mem::take(&mut self.items);
        self.tables.orders.extend(orders);
        self.tables.items.extend(items);
    }
}

/// Lock-guarded, process-local [`OrderStore`].
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    tables: RwLock<Tables>,
    latency: Option<Duration>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation waits `latency` before touching the tables.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// The item insert after `successful_inserts` more inserts fails once.
    pub fn fail_item_insert_after(&self, successful_inserts: usize) -> Result<(), StoreError> {
        self.write()?.faults.item_insert_budget = Some(successful_inserts);
        Ok(())
    }

    /// The next `update_status` fails once.
    pub fn fail_next_update(&self) -> Result<(), StoreError> {
        self.write()?.faults.fail_next_update = true;
        Ok(())
    }

    /// Committed `(order rows, item rows)`.
    pub fn row_counts(&self) -> Result<(usize, usize), StoreError> {
        let tables = self.read()?;
        Ok((tables.orders.len(), tables.items.len()))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Database("order table lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Database("order table lock poisoned".to_string()))
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn create_now(&self, order: NewOrder) -> Result<Order, StoreError> {
        let id = order.id.clone().unwrap_or_else(OrderId::generate);
        let created_at = now();

        let mut tx = Transaction::begin(self.write()?);
        let seq = tx.next_seq();
        tx.insert_order(
            id.clone(),
            OrderRow {
                user_id: order.user_id.clone(),
                total: order.total,
                status: order.status,
                created_at,
                updated_at: created_at,
                seq,
            },
        )?;
        for (line_no, item) in order.items.iter().enumerate() {
            tx.insert_item(id.clone(), line_no, item.clone())?;
        }
        tx.commit();

        Ok(order.into_order(id, created_at))
    }

    fn list_now(
        &self,
        user_id: &UserId,
        page: PageRequest,
    ) -> Result<(Vec<Order>, u64), StoreError> {
        let tables = self.read()?;
        let mut owned: Vec<(&OrderId, &OrderRow)> = tables
            .orders
            .iter()
            .filter(|(_, row)| &row.user_id == user_id)
            .collect();
        owned.sort_by(|(_, a), (_, b)| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.seq.cmp(&a.seq))
        });

        let total = owned.len() as u64;
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let orders = owned
            .into_iter()
            .skip(offset)
            .take(page.limit() as usize)
            .filter_map(|(id, _)| tables.load(id))
            .collect();
        Ok((orders, total))
    }

    fn update_now(
        &self,
        id: &OrderId,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> Result<Order, StoreError> {
        let mut tables = self.write()?;
        if std::mem::take(&mut tables.faults.fail_next_update) {
            return Err(StoreError::Database(format!(
                "injected failure updating order {id}"
            )));
        }
        let row = tables
            .orders
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        // Compared and written under the same write guard.
        if row.status != expected {
            return Err(StoreError::StatusChanged {
                id: id.to_string(),
                actual: row.status,
            });
        }
        row.status = status;
        row.updated_at = next_update_time(row.updated_at);
        tables
            .load(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    #[instrument(
        skip(self, order),
        fields(user_id = %order.user_id, item_count = order.items.len())
    )]
    async fn create(&self, order: NewOrder) -> Result<Order, StoreError> {
        self.simulate_latency().await;
        match self.create_now(order) {
            Ok(order) => {
                info!(order_id = %order.id, "Order row committed");
                Ok(order)
            }
            Err(e) => {
                warn!(error = %e, "Create rolled back");
                Err(e)
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: &OrderId) -> Result<Order, StoreError> {
        self.simulate_latency().await;
        let order = self.read()?.load(id);
        debug!(found = order.is_some(), "Get");
        order.ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    #[instrument(skip(self))]
    async fn list(
        &self,
        user_id: &UserId,
        page: PageRequest,
    ) -> Result<(Vec<Order>, u64), StoreError> {
        self.simulate_latency().await;
        self.list_now(user_id, page)
    }

    #[instrument(skip(self))]
    async fn update_status(
        &self,
        id: &OrderId,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> Result<Order, StoreError> {
        self.simulate_latency().await;
        self.update_now(id, expected, status)
    }
}
