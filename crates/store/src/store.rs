use async_trait::async_trait;

use crate::{
    CartItem, CartLine, LineId, OrderId, OrderLine, OrderRecord, OrderStatus, Product, ProductId,
    Result, StockLevel, UserId,
};

/// Storage handle passed explicitly to every service.
///
/// Reads and writes outside the order workflow go straight through the
/// handle; anything that must be atomic runs inside a [`Transaction`]
/// obtained from [`Store::begin`].
#[async_trait]
pub trait Store: Send + Sync {
    /// Opens a new transaction.
    async fn begin(&self) -> Result<Box<dyn Transaction>>;

    /// Inserts a product with its stock record.
    async fn insert_product(&self, product: &Product) -> Result<()>;

    /// Retrieves a product with its current stock counters.
    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>>;

    /// Appends a row to a user's cart.
    async fn add_cart_item(&self, item: &CartItem) -> Result<()>;

    /// Retrieves a user's cart joined with product name and price.
    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>>;

    /// Retrieves an order row.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>>;

    /// Retrieves the lines of an order, ordered by product id.
    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>>;

    /// Retrieves all orders of a user, newest first.
    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<OrderRecord>>;
}

/// A unit of work against the store.
///
/// All statements issued through one transaction commit or roll back
/// together. Dropping a transaction without calling [`Transaction::commit`]
/// rolls it back.
#[async_trait]
pub trait Transaction: Send {
    /// Retrieves a user's cart joined with product name and price, ordered
    /// by product id, holding an exclusive lock on every cart row returned.
    ///
    /// A concurrent caller locking the same rows waits until this
    /// transaction ends, and does not see rows it deleted.
    async fn lock_cart(&mut self, user_id: UserId) -> Result<Vec<CartLine>>;

    /// Reads stock counters holding an exclusive row lock until the
    /// transaction ends. Returns None if the product does not exist.
    async fn lock_stock(&mut self, product_id: ProductId) -> Result<Option<StockLevel>>;

    /// Increments `reserved_stock` by `quantity`.
    async fn add_reserved_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<()>;

    /// Decrements `stock` and `reserved_stock` by `quantity`, only where both
    /// are at least `quantity`. Returns the number of rows updated.
    async fn deduct_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<u64>;

    /// Decrements `reserved_stock` by `quantity`, only where it is at least
    /// `quantity`. Returns the number of rows updated.
    async fn release_reserved_stock(&mut self, product_id: ProductId, quantity: u32)
    -> Result<u64>;

    /// Inserts an order row.
    async fn insert_order(&mut self, order: &OrderRecord) -> Result<()>;

    /// Inserts an order line.
    async fn insert_order_line(&mut self, line: &OrderLine) -> Result<()>;

    /// Retrieves the lines of an order, ordered by product id.
    async fn order_lines(&mut self, order_id: OrderId) -> Result<Vec<OrderLine>>;

    /// Reads an order row holding an exclusive row lock until the
    /// transaction ends.
    async fn lock_order(&mut self, order_id: OrderId) -> Result<Option<OrderRecord>>;

    /// Sets the status of an order. Returns the number of rows updated.
    async fn update_order_status(&mut self, order_id: OrderId, status: OrderStatus)
    -> Result<u64>;

    /// Deletes the given cart rows. Returns the number of rows deleted.
    async fn remove_cart_items(&mut self, item_ids: &[LineId]) -> Result<u64>;

    /// Makes every change of this transaction durable.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discards every change of this transaction.
    async fn rollback(self: Box<Self>) -> Result<()>;
}

#[async_trait]
impl<S: Store + ?Sized> Store for std::sync::Arc<S> {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        (**self).begin().await
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        (**self).insert_product(product).await
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        (**self).get_product(product_id).await
    }

    async fn add_cart_item(&self, item: &CartItem) -> Result<()> {
        (**self).add_cart_item(item).await
    }

    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        (**self).cart_lines(user_id).await
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        (**self).get_order(order_id).await
    }

    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        (**self).order_lines(order_id).await
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<OrderRecord>> {
        (**self).orders_for_user(user_id).await
    }
}
