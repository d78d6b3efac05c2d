use std::collections::HashMap;

use async_trait::async_trait;
use common::{
    CartLine, CartLineId, DeliveryDetails, Favorite, FavoriteId, Money, NewOrder, NewOrderItem,
    NewProduct, Order, OrderId, OrderItem, OrderItemId, OrderNumber, OrderStatus, OwnerId, Product,
    ProductId, ProductStats, RatingSummary, Review, ReviewId,
};
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{Store, UnitOfWork},
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

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("Database migrations applied");
        Ok(())
    }
}

fn to_u32(value: i32, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Decode(format!("{column} is negative: {value}")))
}

fn to_i32(value: impl TryInto<i32> + Copy + std::fmt::Display, what: &str) -> Result<i32> {
    value
        .try_into()
        .map_err(|_| StoreError::Decode(format!("{what} out of range: {value}")))
}

/// Advisory lock key for an owner's cart. Collisions only over-serialize.
fn cart_lock_key(owner: OwnerId) -> i64 {
    let (high, low) = owner.as_uuid().as_u64_pair();
    (high ^ low) as i64
}

fn row_to_product(row: &PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        stock: to_u32(row.try_get("stock")?, "stock")?,
        sold: to_u32(row.try_get("sold")?, "sold")?,
        is_active: row.try_get("is_active")?,
        average_rating: row.try_get("average_rating")?,
        total_reviews: to_u32(row.try_get("total_reviews")?, "total_reviews")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_cart_line(row: &PgRow) -> Result<CartLine> {
    Ok(CartLine {
        id: CartLineId::new(row.try_get("id")?),
        owner_id: OwnerId::from_uuid(row.try_get::<Uuid, _>("owner_id")?),
        product_id: ProductId::new(row.try_get("product_id")?),
        product_name: row.try_get("product_name")?,
        unit_price: Money::from_cents(row.try_get("price_cents")?),
        quantity: to_u32(row.try_get("quantity")?, "quantity")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Maps an order header; items are attached separately.
fn row_to_order(row: &PgRow) -> Result<Order> {
    Ok(Order {
        id: OrderId::new(row.try_get("id")?),
        order_number: OrderNumber::new(row.try_get::<String, _>("order_number")?),
        owner_id: OwnerId::from_uuid(row.try_get::<Uuid, _>("owner_id")?),
        delivery: DeliveryDetails {
            full_name: row.try_get("full_name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            address: row.try_get("address")?,
            city: row.try_get("city")?,
            state: row.try_get("state")?,
            pincode: row.try_get("pincode")?,
        },
        total_amount: Money::from_cents(row.try_get("total_amount_cents")?),
        payment_method: row.try_get::<String, _>("payment_method")?.parse()?,
        payment_status: row.try_get::<String, _>("payment_status")?.parse()?,
        order_status: row.try_get::<String, _>("order_status")?.parse()?,
        transaction_id: row.try_get("transaction_id")?,
        items: Vec::new(),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_order_item(row: &PgRow) -> Result<OrderItem> {
    Ok(OrderItem {
        id: OrderItemId::new(row.try_get("id")?),
        order_id: OrderId::new(row.try_get("order_id")?),
        product_id: row.try_get::<Option<i64>, _>("product_id")?.map(ProductId::new),
        product_name: row.try_get("product_name")?,
        product_price: Money::from_cents(row.try_get("product_price_cents")?),
        quantity: to_u32(row.try_get("quantity")?, "quantity")?,
        subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
    })
}

fn row_to_review(row: &PgRow) -> Result<Review> {
    let rating: i16 = row.try_get("rating")?;
    Ok(Review {
        id: ReviewId::new(row.try_get("id")?),
        product_id: ProductId::new(row.try_get("product_id")?),
        owner_id: OwnerId::from_uuid(row.try_get::<Uuid, _>("owner_id")?),
        rating: u8::try_from(rating)
            .map_err(|_| StoreError::Decode(format!("rating out of range: {rating}")))?,
        comment: row.try_get("comment")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_favorite(row: &PgRow) -> Result<Favorite> {
    Ok(Favorite {
        id: FavoriteId::new(row.try_get("id")?),
        owner_id: OwnerId::from_uuid(row.try_get::<Uuid, _>("owner_id")?),
        product_id: ProductId::new(row.try_get("product_id")?),
        created_at: row.try_get("created_at")?,
    })
}

/// Queries shared by the pool-backed store and the transaction-backed unit
/// of work. Each runs on whatever connection it is handed.
mod queries {
    use super::*;

    const CART_SELECT: &str = r#"
        SELECT c.id, c.owner_id, c.product_id, p.name AS product_name, p.price_cents,
               c.quantity, c.created_at, c.updated_at
        FROM cart_lines c
        JOIN products p ON p.id = c.product_id
    "#;

    pub async fn product(conn: &mut PgConnection, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, description, price_cents, stock, sold, is_active,
                   average_rating, total_reviews, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&mut *conn)
        .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    pub async fn cart_lines(
        conn: &mut PgConnection,
        owner: OwnerId,
        for_update: bool,
    ) -> Result<Vec<CartLine>> {
        let sql = format!(
            "{CART_SELECT} WHERE c.owner_id = $1 ORDER BY c.created_at, c.id {}",
            if for_update { "FOR UPDATE OF c" } else { "" }
        );
        let rows = sqlx::query(&sql)
            .bind(owner.as_uuid())
            .fetch_all(&mut *conn)
            .await?;

        rows.iter().map(row_to_cart_line).collect()
    }

    pub async fn cart_line_by_id(
        conn: &mut PgConnection,
        line_id: CartLineId,
    ) -> Result<Option<CartLine>> {
        let sql = format!("{CART_SELECT} WHERE c.id = $1");
        let row = sqlx::query(&sql)
            .bind(line_id.as_i64())
            .fetch_optional(&mut *conn)
            .await?;

        row.as_ref().map(row_to_cart_line).transpose()
    }

    pub async fn delete_cart_line(
        conn: &mut PgConnection,
        owner: OwnerId,
        line_id: CartLineId,
    ) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_lines WHERE id = $1 AND owner_id = $2")
            .bind(line_id.as_i64())
            .bind(owner.as_uuid())
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn clear_cart(conn: &mut PgConnection, owner: OwnerId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cart_lines WHERE owner_id = $1")
            .bind(owner.as_uuid())
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    /// Attaches items to the given order headers in one round trip.
    pub async fn attach_items(conn: &mut PgConnection, orders: &mut [Order]) -> Result<()> {
        if orders.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = orders.iter().map(|o| o.id.as_i64()).collect();
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, product_name, product_price_cents,
                   quantity, subtotal_cents
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY id ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

        let mut by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in &rows {
            let item = row_to_order_item(row)?;
            by_order.entry(item.order_id).or_default().push(item);
        }
        for order in orders.iter_mut() {
            order.items = by_order.remove(&order.id).unwrap_or_default();
        }
        Ok(())
    }

    pub async fn order(
        conn: &mut PgConnection,
        id: OrderId,
        for_update: bool,
    ) -> Result<Option<Order>> {
        let sql = format!(
            "SELECT * FROM orders WHERE id = $1 {}",
            if for_update { "FOR UPDATE" } else { "" }
        );
        let row = sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_optional(&mut *conn)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut orders = [row_to_order(&row)?];
        attach_items(conn, &mut orders).await?;
        let [order] = orders;
        Ok(Some(order))
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresUnitOfWork;

    async fn begin(&self) -> Result<Self::Tx> {
        let tx = self.pool.begin().await?;
        Ok(PostgresUnitOfWork { tx })
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product> {
        let row = sqlx::query(
            r#"
            INSERT INTO products (name, description, price_cents, stock)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, description, price_cents, stock, sold, is_active,
                      average_rating, total_reviews, created_at, updated_at
            "#,
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(to_i32(product.stock, "stock")?)
        .fetch_one(&self.pool)
        .await?;

        row_to_product(&row)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        queries::product(&mut conn, id).await
    }

    async fn list_products(&self, include_inactive: bool) -> Result<Vec<Product>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, price_cents, stock, sold, is_active,
                   average_rating, total_reviews, created_at, updated_at
            FROM products
            WHERE $1 OR is_active
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_product).collect()
    }

    async fn set_product_active(&self, id: ProductId, active: bool) -> Result<bool> {
        let result =
            sqlx::query("UPDATE products SET is_active = $2, updated_at = NOW() WHERE id = $1")
                .bind(id.as_i64())
                .bind(active)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn product_stats(&self) -> Result<ProductStats> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*)::BIGINT AS total_products,
                   COALESCE(SUM(stock), 0)::BIGINT AS total_stock,
                   COALESCE(SUM(sold), 0)::BIGINT AS total_sold,
                   COUNT(*) FILTER (WHERE stock = 0)::BIGINT AS out_of_stock
            FROM products
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let count = |column: &str| -> Result<u64> {
            let value: i64 = row.try_get(column)?;
            u64::try_from(value)
                .map_err(|_| StoreError::Decode(format!("{column} is negative: {value}")))
        };
        Ok(ProductStats {
            total_products: count("total_products")?,
            total_stock: count("total_stock")?,
            total_sold: count("total_sold")?,
            out_of_stock: count("out_of_stock")?,
        })
    }

    async fn list_cart(&self, owner: OwnerId) -> Result<Vec<CartLine>> {
        let mut conn = self.pool.acquire().await?;
        queries::cart_lines(&mut conn, owner, false).await
    }

    async fn remove_cart_line(&self, owner: OwnerId, line_id: CartLineId) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        queries::delete_cart_line(&mut conn, owner, line_id).await
    }

    async fn clear_cart(&self, owner: OwnerId) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        queries::clear_cart(&mut conn, owner).await
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        queries::order(&mut conn, id, false).await
    }

    async fn list_orders(&self, owner: Option<OwnerId>) -> Result<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query(
            r#"
            SELECT * FROM orders
            WHERE $1::UUID IS NULL OR owner_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(owner.map(|o| o.as_uuid()))
        .fetch_all(&mut *conn)
        .await?;

        let mut orders = rows.iter().map(row_to_order).collect::<Result<Vec<_>>>()?;
        queries::attach_items(&mut conn, &mut orders).await?;
        Ok(orders)
    }

    async fn list_reviews(&self, product_id: ProductId) -> Result<Vec<Review>> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, owner_id, rating, comment, created_at, updated_at
            FROM reviews
            WHERE product_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(product_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_review).collect()
    }

    async fn list_favorites(&self, owner: OwnerId) -> Result<Vec<Favorite>> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner_id, product_id, created_at
            FROM favorites
            WHERE owner_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(owner.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_favorite).collect()
    }

    async fn insert_favorite(
        &self,
        owner: OwnerId,
        product_id: ProductId,
    ) -> Result<(Favorite, bool)> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO favorites (owner_id, product_id)
            VALUES ($1, $2)
            ON CONFLICT (owner_id, product_id) DO NOTHING
            RETURNING id, owner_id, product_id, created_at
            "#,
        )
        .bind(owner.as_uuid())
        .bind(product_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok((row_to_favorite(&row)?, true));
        }

        let row = sqlx::query(
            r#"
            SELECT id, owner_id, product_id, created_at
            FROM favorites
            WHERE owner_id = $1 AND product_id = $2
            "#,
        )
        .bind(owner.as_uuid())
        .bind(product_id.as_i64())
        .fetch_one(&self.pool)
        .await?;

        Ok((row_to_favorite(&row)?, false))
    }

    async fn delete_favorite(&self, owner: OwnerId, product_id: ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM favorites WHERE owner_id = $1 AND product_id = $2")
            .bind(owner.as_uuid())
            .bind(product_id.as_i64())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn is_favorite(&self, owner: OwnerId, product_id: ProductId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM favorites WHERE owner_id = $1 AND product_id = $2)",
        )
        .bind(owner.as_uuid())
        .bind(product_id.as_i64())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

/// Unit of work backed by a database transaction.
///
/// Dropping it without calling [`UnitOfWork::commit`] rolls the transaction
/// back.
pub struct PostgresUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    async fn lock_cart(&mut self, owner: OwnerId) -> Result<()> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(cart_lock_key(owner))
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, description, price_cents, stock, sold, is_active,
                   average_rating, total_reviews, created_at, updated_at
            FROM products
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn adjust_stock(
        &mut self,
        id: ProductId,
        delta_stock: i64,
        delta_sold: i64,
    ) -> Result<Option<Product>> {
        // The guard keeps the CHECK constraints from ever firing: a shortfall
        // matches no row instead of aborting the transaction.
        let row = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock + $2, sold = sold + $3, updated_at = NOW()
            WHERE id = $1 AND stock + $2 >= 0 AND sold + $3 >= 0
            RETURNING id, name, description, price_cents, stock, sold, is_active,
                      average_rating, total_reviews, created_at, updated_at
            "#,
        )
        .bind(id.as_i64())
        .bind(to_i32(delta_stock, "stock delta")?)
        .bind(to_i32(delta_sold, "sold delta")?)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn cart_lines(&mut self, owner: OwnerId) -> Result<Vec<CartLine>> {
        queries::cart_lines(&mut self.tx, owner, true).await
    }

    async fn cart_line(
        &mut self,
        owner: OwnerId,
        line_id: CartLineId,
    ) -> Result<Option<CartLine>> {
        let locked: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM cart_lines WHERE id = $1 AND owner_id = $2 FOR UPDATE",
        )
        .bind(line_id.as_i64())
        .bind(owner.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        match locked {
            Some(_) => queries::cart_line_by_id(&mut self.tx, line_id).await,
            None => Ok(None),
        }
    }

    async fn upsert_cart_line(
        &mut self,
        owner: OwnerId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(CartLine, bool)> {
        let row = sqlx::query(
            r#"
            INSERT INTO cart_lines (owner_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (owner_id, product_id) DO UPDATE
            SET quantity = cart_lines.quantity + EXCLUDED.quantity, updated_at = NOW()
            RETURNING id, (xmax = 0) AS created
            "#,
        )
        .bind(owner.as_uuid())
        .bind(product_id.as_i64())
        .bind(to_i32(quantity, "quantity")?)
        .fetch_one(&mut *self.tx)
        .await?;

        let line_id = CartLineId::new(row.try_get("id")?);
        let created: bool = row.try_get("created")?;
        let line = queries::cart_line_by_id(&mut self.tx, line_id)
            .await?
            .ok_or_else(|| StoreError::Decode(format!("cart line {line_id} vanished")))?;
        Ok((line, created))
    }

    async fn set_cart_quantity(
        &mut self,
        line_id: CartLineId,
        quantity: u32,
    ) -> Result<Option<CartLine>> {
        let result =
            sqlx::query("UPDATE cart_lines SET quantity = $2, updated_at = NOW() WHERE id = $1")
                .bind(line_id.as_i64())
                .bind(to_i32(quantity, "quantity")?)
                .execute(&mut *self.tx)
                .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        queries::cart_line_by_id(&mut self.tx, line_id).await
    }

    async fn delete_cart_line(&mut self, owner: OwnerId, line_id: CartLineId) -> Result<bool> {
        queries::delete_cart_line(&mut self.tx, owner, line_id).await
    }

    async fn clear_cart(&mut self, owner: OwnerId) -> Result<u64> {
        queries::clear_cart(&mut self.tx, owner).await
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            INSERT INTO orders (
                order_number, owner_id, full_name, email, phone, address, city, state,
                pincode, total_amount_cents, payment_method, payment_status, transaction_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (order_number) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(order.order_number.as_str())
        .bind(order.owner_id.as_uuid())
        .bind(&order.delivery.full_name)
        .bind(&order.delivery.email)
        .bind(&order.delivery.phone)
        .bind(&order.delivery.address)
        .bind(&order.delivery.city)
        .bind(&order.delivery.state)
        .bind(&order.delivery.pincode)
        .bind(order.total_amount.cents())
        .bind(order.payment_method.as_str())
        .bind(order.payment_status.as_str())
        .bind(&order.transaction_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(row_to_order).transpose()
    }

    async fn insert_order_item(&mut self, item: NewOrderItem) -> Result<OrderItem> {
        let subtotal = item.subtotal().ok_or_else(|| {
            StoreError::Decode(format!(
                "subtotal out of range: {} x {}",
                item.product_price, item.quantity
            ))
        })?;
        let row = sqlx::query(
            r#"
            INSERT INTO order_items (
                order_id, product_id, product_name, product_price_cents, quantity, subtotal_cents
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, order_id, product_id, product_name, product_price_cents,
                      quantity, subtotal_cents
            "#,
        )
        .bind(item.order_id.as_i64())
        .bind(item.product_id.as_i64())
        .bind(&item.product_name)
        .bind(item.product_price.cents())
        .bind(to_i32(item.quantity, "quantity")?)
        .bind(subtotal.cents())
        .fetch_one(&mut *self.tx)
        .await?;

        row_to_order_item(&row)
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        queries::order(&mut self.tx, id, true).await
    }

    async fn set_order_status(
        &mut self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>> {
        let result =
            sqlx::query("UPDATE orders SET order_status = $2, updated_at = NOW() WHERE id = $1")
                .bind(id.as_i64())
                .bind(status.as_str())
                .execute(&mut *self.tx)
                .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        queries::order(&mut self.tx, id, false).await
    }

    async fn upsert_review(
        &mut self,
        product_id: ProductId,
        owner: OwnerId,
        rating: u8,
        comment: String,
    ) -> Result<(Review, bool)> {
        let row = sqlx::query(
            r#"
            INSERT INTO reviews (product_id, owner_id, rating, comment)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (product_id, owner_id) DO UPDATE
            SET rating = EXCLUDED.rating, comment = EXCLUDED.comment, updated_at = NOW()
            RETURNING id, product_id, owner_id, rating, comment, created_at, updated_at,
                      (xmax = 0) AS created
            "#,
        )
        .bind(product_id.as_i64())
        .bind(owner.as_uuid())
        .bind(i16::from(rating))
        .bind(&comment)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok((row_to_review(&row)?, row.try_get("created")?))
    }

    async fn delete_review(&mut self, owner: OwnerId, id: ReviewId) -> Result<Option<Review>> {
        let row = sqlx::query(
            r#"
            DELETE FROM reviews
            WHERE id = $1 AND owner_id = $2
            RETURNING id, product_id, owner_id, rating, comment, created_at, updated_at
            "#,
        )
        .bind(id.as_i64())
        .bind(owner.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(row_to_review).transpose()
    }

    async fn product_ratings(&mut self, product_id: ProductId) -> Result<Vec<u8>> {
        let ratings: Vec<i16> =
            sqlx::query_scalar("SELECT rating FROM reviews WHERE product_id = $1")
                .bind(product_id.as_i64())
                .fetch_all(&mut *self.tx)
                .await?;

        ratings
            .into_iter()
            .map(|r| {
                u8::try_from(r).map_err(|_| StoreError::Decode(format!("rating out of range: {r}")))
            })
            .collect()
    }

    async fn set_product_rating(
        &mut self,
        product_id: ProductId,
        summary: RatingSummary,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET average_rating = $2, total_reviews = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(product_id.as_i64())
        .bind(summary.average_rating)
        .bind(to_i32(summary.total_reviews, "total_reviews")?)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
