use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    CartItem, CartLine, LineId, OrderId, OrderLine, OrderRecord, OrderStatus, Product, ProductId,
    Result, StockLevel, StoreError, UserId,
    store::{Store, Transaction},
};

#[derive(Debug, Clone, Default)]
struct Tables {
    products: HashMap<ProductId, Product>,
    cart_items: Vec<CartItem>,
    orders: HashMap<OrderId, OrderRecord>,
    order_lines: Vec<OrderLine>,
}

impl Tables {
    fn cart_lines(&self, user_id: UserId) -> Vec<CartLine> {
        let mut lines: Vec<CartLine> = self
            .cart_items
            .iter()
            .filter(|item| item.user_id == user_id)
            .filter_map(|item| {
                self.products.get(&item.product_id).map(|product| CartLine {
                    item_id: item.id,
                    product_id: product.id,
                    name: product.name.clone(),
                    unit_price: product.price,
                    quantity: item.quantity,
                })
            })
            .collect();
        lines.sort_by_key(|line| line.product_id);
        lines
    }

    fn order_lines(&self, order_id: OrderId) -> Vec<OrderLine> {
        let mut lines: Vec<OrderLine> = self
            .order_lines
            .iter()
            .filter(|line| line.order_id == order_id)
            .cloned()
            .collect();
        lines.sort_by_key(|line| line.product_id);
        lines
    }
}

/// In-memory store implementation for testing.
///
/// A transaction holds the table lock from `begin` until it commits or is
/// dropped, so transactions are fully serialized. Writes go to a private copy
/// of the tables that replaces the shared one on commit.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    fail_on_commit: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures every subsequent commit to fail and roll back.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.fail_on_commit.store(fail, Ordering::SeqCst);
    }

    /// Overwrites the stock counters of a product, bypassing the ledger.
    pub async fn set_stock_level(
        &self,
        product_id: ProductId,
        stock: u32,
        reserved_stock: u32,
    ) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let product = tables
            .products
            .get_mut(&product_id)
            .ok_or_else(|| StoreError::Constraint(format!("no product {product_id}")))?;
        product.stock = stock;
        product.reserved_stock = reserved_stock;
        Ok(())
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.tables.lock().await.orders.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTransaction {
            guard,
            working,
            fail_on_commit: self.fail_on_commit.load(Ordering::SeqCst),
        }))
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        if product.reserved_stock > product.stock {
            return Err(StoreError::Constraint(format!(
                "reserved stock exceeds stock for product {}",
                product.id
            )));
        }

        let mut tables = self.tables.lock().await;
        if tables.products.contains_key(&product.id) {
            return Err(StoreError::Constraint(format!(
                "duplicate product {}",
                product.id
            )));
        }
        tables.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        Ok(self.tables.lock().await.products.get(&product_id).cloned())
    }

    async fn add_cart_item(&self, item: &CartItem) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if !tables.products.contains_key(&item.product_id) {
            return Err(StoreError::Constraint(format!(
                "cart item references unknown product {}",
                item.product_id
            )));
        }
        tables.cart_items.push(item.clone());
        Ok(())
    }

    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        Ok(self.tables.lock().await.cart_lines(user_id))
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        Ok(self.tables.lock().await.orders.get(&order_id).cloned())
    }

    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        Ok(self.tables.lock().await.order_lines(order_id))
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<OrderRecord>> {
        let tables = self.tables.lock().await;
        let mut orders: Vec<OrderRecord> = tables
            .orders
            .values()
            .filter(|order| order.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}

struct InMemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
    fail_on_commit: bool,
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn lock_cart(&mut self, user_id: UserId) -> Result<Vec<CartLine>> {
        Ok(self.working.cart_lines(user_id))
    }

    async fn lock_stock(&mut self, product_id: ProductId) -> Result<Option<StockLevel>> {
        Ok(self
            .working
            .products
            .get(&product_id)
            .map(|product| StockLevel {
                product_id,
                stock: product.stock,
                reserved_stock: product.reserved_stock,
            }))
    }

    async fn add_reserved_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<()> {
        let Some(product) = self.working.products.get_mut(&product_id) else {
            return Ok(());
        };

        let reserved = product.reserved_stock.saturating_add(quantity);
        if reserved > product.stock {
            return Err(StoreError::Constraint(format!(
                "reserved stock would exceed stock for product {product_id}"
            )));
        }
        product.reserved_stock = reserved;
        Ok(())
    }

    async fn deduct_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<u64> {
        match self.working.products.get_mut(&product_id) {
            Some(product) if product.stock >= quantity && product.reserved_stock >= quantity => {
                product.stock -= quantity;
                product.reserved_stock -= quantity;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn release_reserved_stock(
        &mut self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<u64> {
        match self.working.products.get_mut(&product_id) {
            Some(product) if product.reserved_stock >= quantity => {
                product.reserved_stock -= quantity;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn insert_order(&mut self, order: &OrderRecord) -> Result<()> {
        if self.working.orders.contains_key(&order.id) {
            return Err(StoreError::Constraint(format!("duplicate order {}", order.id)));
        }
        self.working.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn insert_order_line(&mut self, line: &OrderLine) -> Result<()> {
        if !self.working.orders.contains_key(&line.order_id) {
            return Err(StoreError::Constraint(format!(
                "order line references unknown order {}",
                line.order_id
            )));
        }
        if !self.working.products.contains_key(&line.product_id) {
            return Err(StoreError::Constraint(format!(
                "order line references unknown product {}",
                line.product_id
            )));
        }
        self.working.order_lines.push(line.clone());
        Ok(())
    }

    async fn order_lines(&mut self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        Ok(self.working.order_lines(order_id))
    }

    async fn lock_order(&mut self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        Ok(self.working.orders.get(&order_id).cloned())
    }

    async fn update_order_status(
        &mut self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<u64> {
        match self.working.orders.get_mut(&order_id) {
            Some(order) => {
                order.status = status;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn remove_cart_items(&mut self, item_ids: &[LineId]) -> Result<u64> {
        let before = self.working.cart_items.len();
        self.working
            .cart_items
            .retain(|item| !item_ids.contains(&item.id));
        Ok((before - self.working.cart_items.len()) as u64)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        if self.fail_on_commit {
            return Err(StoreError::Database(sqlx::Error::Protocol(
                "commit rejected".to_string(),
            )));
        }

        let InMemoryTransaction {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
