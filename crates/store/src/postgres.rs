use async_trait::async_trait;
use sqlx::{PgExecutor, PgPool, Postgres, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    CartItem, CartLine, LineId, Money, OrderId, OrderLine, OrderRecord, OrderStatus, Product,
    ProductId, Result, StockLevel, StoreError, UserId,
    store::{Store, Transaction},
};

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
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
}

/// An open PostgreSQL transaction.
///
/// sqlx rolls the transaction back when it is dropped uncommitted.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

fn count(row: &PgRow, column: &'static str) -> Result<u32> {
    let value: i64 = row.try_get(column)?;
    u32::try_from(value).map_err(|_| StoreError::Decode {
        column,
        reason: format!("{value} is out of range"),
    })
}

fn status(row: &PgRow) -> Result<OrderStatus> {
    let value: String = row.try_get("status")?;
    value.parse::<OrderStatus>().map_err(|e| StoreError::Decode {
        column: "status",
        reason: e.to_string(),
    })
}

fn row_to_product(row: PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        stock: count(&row, "stock")?,
        reserved_stock: count(&row, "reserved_stock")?,
    })
}

fn row_to_cart_line(row: PgRow) -> Result<CartLine> {
    Ok(CartLine {
        item_id: LineId::from_uuid(row.try_get::<Uuid, _>("id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        name: row.try_get("name")?,
        unit_price: Money::from_cents(row.try_get("price_cents")?),
        quantity: count(&row, "quantity")?,
    })
}

fn row_to_order(row: PgRow) -> Result<OrderRecord> {
    Ok(OrderRecord {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        total_price: Money::from_cents(row.try_get("total_price_cents")?),
        status: status(&row)?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_order_line(row: PgRow) -> Result<OrderLine> {
    Ok(OrderLine {
        id: LineId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        quantity: count(&row, "quantity")?,
    })
}

const CART_LINES: &str = r#"
    SELECT c.id, c.product_id, c.quantity, p.name, p.price_cents
    FROM cart_items c
    INNER JOIN products p ON p.id = c.product_id
    WHERE c.user_id = $1
    ORDER BY c.product_id ASC, c.created_at ASC
"#;

async fn fetch_cart_lines<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: UserId,
    lock: bool,
) -> Result<Vec<CartLine>> {
    // Only the cart rows are locked; product rows are locked by the ledger.
    let sql = if lock {
        format!("{CART_LINES} FOR UPDATE OF c")
    } else {
        CART_LINES.to_string()
    };

    let rows = sqlx::query(&sql)
        .bind(user_id.as_uuid())
        .fetch_all(executor)
        .await?;

    rows.into_iter().map(row_to_cart_line).collect()
}

async fn fetch_order_lines<'e, E: PgExecutor<'e>>(
    executor: E,
    order_id: OrderId,
) -> Result<Vec<OrderLine>> {
    let rows = sqlx::query(
        r#"
        SELECT id, order_id, product_id, unit_price_cents, quantity
        FROM order_items
        WHERE order_id = $1
        ORDER BY product_id ASC
        "#,
    )
    .bind(order_id.as_uuid())
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(row_to_order_line).collect()
}

#[async_trait]
impl Store for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTransaction { tx }))
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, stock, reserved_stock)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(i64::from(product.stock))
        .bind(i64::from(product.reserved_stock))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, price_cents, stock, reserved_stock
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_product).transpose()
    }

    async fn add_cart_item(&self, item: &CartItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cart_items (id, user_id, product_id, quantity, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.user_id.as_uuid())
        .bind(item.product_id.as_uuid())
        .bind(i64::from(item.quantity))
        .bind(item.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        fetch_cart_lines(&self.pool, user_id, false).await
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, total_price_cents, status, created_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_order).transpose()
    }

    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        fetch_order_lines(&self.pool, order_id).await
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<OrderRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, total_price_cents, status, created_at
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_order).collect()
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn lock_cart(&mut self, user_id: UserId) -> Result<Vec<CartLine>> {
        fetch_cart_lines(&mut *self.tx, user_id, true).await
    }

    async fn lock_stock(&mut self, product_id: ProductId) -> Result<Option<StockLevel>> {
        let row = sqlx::query("SELECT stock, reserved_stock FROM products WHERE id = $1 FOR UPDATE")
            .bind(product_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        match row {
            Some(row) => Ok(Some(StockLevel {
                product_id,
                stock: count(&row, "stock")?,
                reserved_stock: count(&row, "reserved_stock")?,
            })),
            None => Ok(None),
        }
    }

    async fn add_reserved_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<()> {
        sqlx::query("UPDATE products SET reserved_stock = reserved_stock + $2 WHERE id = $1")
            .bind(product_id.as_uuid())
            .bind(i64::from(quantity))
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn deduct_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock - $2, reserved_stock = reserved_stock - $2
            WHERE id = $1 AND stock >= $2 AND reserved_stock >= $2
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(i64::from(quantity))
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn release_reserved_stock(
        &mut self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET reserved_stock = reserved_stock - $2
            WHERE id = $1 AND reserved_stock >= $2
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(i64::from(quantity))
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn insert_order(&mut self, order: &OrderRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, total_price_cents, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.total_price.cents())
        .bind(order.status.as_str())
        .bind(order.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_order_line(&mut self, line: &OrderLine) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_items (id, order_id, product_id, unit_price_cents, quantity)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(line.id.as_uuid())
        .bind(line.order_id.as_uuid())
        .bind(line.product_id.as_uuid())
        .bind(line.unit_price.cents())
        .bind(i64::from(line.quantity))
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn order_lines(&mut self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        fetch_order_lines(&mut *self.tx, order_id).await
    }

    async fn lock_order(&mut self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, total_price_cents, status, created_at
            FROM orders
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_order).transpose()
    }

    async fn update_order_status(
        &mut self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<u64> {
        let result = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(order_id.as_uuid())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn remove_cart_items(&mut self, item_ids: &[LineId]) -> Result<u64> {
        let ids: Vec<Uuid> = item_ids.iter().map(|id| id.as_uuid()).collect();
        let result = sqlx::query("DELETE FROM cart_items WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
