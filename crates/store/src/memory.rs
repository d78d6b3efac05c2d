use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    CartLine, CartLineId, Favorite, FavoriteId, NewOrder, NewOrderItem, NewProduct, Order, OrderId,
    OrderItem, OrderItemId, OrderStatus, OwnerId, Product, ProductId, ProductStats, RatingSummary,
    Review, ReviewId,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Result, StoreError,
    store::{Store, UnitOfWork},
};

#[derive(Debug, Clone)]
struct CartRow {
    id: CartLineId,
    owner_id: OwnerId,
    product_id: ProductId,
    quantity: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Every table of the in-memory store. Cloned wholesale to stage a unit of work.
#[derive(Debug, Clone, Default)]
struct Tables {
    last_id: i64,
    products: BTreeMap<ProductId, Product>,
    cart: BTreeMap<CartLineId, CartRow>,
    /// Order headers; their `items` vectors stay empty.
    orders: BTreeMap<OrderId, Order>,
    order_items: BTreeMap<OrderItemId, OrderItem>,
    reviews: BTreeMap<ReviewId, Review>,
    favorites: BTreeMap<FavoriteId, Favorite>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn cart_line(&self, row: &CartRow) -> Result<CartLine> {
        let product = self.products.get(&row.product_id).ok_or_else(|| {
            StoreError::Decode(format!(
                "cart line {} references missing product {}",
                row.id, row.product_id
            ))
        })?;
        Ok(CartLine {
            id: row.id,
            owner_id: row.owner_id,
            product_id: row.product_id,
            product_name: product.name.clone(),
            unit_price: product.price,
            quantity: row.quantity,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn cart_lines(&self, owner: OwnerId) -> Result<Vec<CartLine>> {
        let mut rows: Vec<_> = self
            .cart
            .values()
            .filter(|row| row.owner_id == owner)
            .collect();
        rows.sort_by_key(|row| (row.created_at, row.id));
        rows.into_iter().map(|row| self.cart_line(row)).collect()
    }

    fn owned_cart_row(&self, owner: OwnerId, line_id: CartLineId) -> Option<&CartRow> {
        self.cart.get(&line_id).filter(|row| row.owner_id == owner)
    }

    fn remove_cart_line(&mut self, owner: OwnerId, line_id: CartLineId) -> bool {
        if self.owned_cart_row(owner, line_id).is_none() {
            return false;
        }
        self.cart.remove(&line_id).is_some()
    }

    fn clear_cart(&mut self, owner: OwnerId) -> u64 {
        let before = self.cart.len();
        self.cart.retain(|_, row| row.owner_id != owner);
        (before - self.cart.len()) as u64
    }

    fn materialize_order(&self, id: OrderId) -> Option<Order> {
        let mut order = self.orders.get(&id)?.clone();
        order.items = self
            .order_items
            .values()
            .filter(|item| item.order_id == id)
            .cloned()
            .collect();
        Some(order)
    }

    fn delete_product(&mut self, id: ProductId) -> bool {
        if self.products.remove(&id).is_none() {
            return false;
        }
        self.cart.retain(|_, row| row.product_id != id);
        self.favorites.retain(|_, fav| fav.product_id != id);
        self.reviews.retain(|_, review| review.product_id != id);
        for item in self.order_items.values_mut() {
            if item.product_id == Some(id) {
                item.product_id = None;
            }
        }
        true
    }
}

/// Newest first, ties broken by key.
fn newest_first<T, K: Ord + Copy>(items: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, K)) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

/// In-memory store implementation for testing and local runs.
///
/// A unit of work holds the store-wide lock for its whole lifetime and works
/// on a private copy of the tables, which replaces the shared tables on
/// commit. Units of work are therefore fully serialized.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    fail_on_order_item: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent order item insert fail with
    /// [`StoreError::Unavailable`], to exercise rollback paths.
    pub fn set_fail_on_order_item(&self, fail: bool) {
        self.fail_on_order_item.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.tables.lock().await.orders.len()
    }

    /// Returns the number of order items stored.
    pub async fn order_item_count(&self) -> usize {
        self.tables.lock().await.order_items.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryUnitOfWork;

    async fn begin(&self) -> Result<Self::Tx> {
        let guard = self.tables.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(InMemoryUnitOfWork {
            guard,
            staged,
            fail_on_order_item: self.fail_on_order_item.load(Ordering::SeqCst),
        })
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        let product = Product {
            id: ProductId::new(tables.next_id()),
            name: product.name,
            description: product.description,
            price: product.price,
            stock: product.stock,
            sold: 0,
            is_active: true,
            average_rating: 0.0,
            total_reviews: 0,
            created_at: now,
            updated_at: now,
        };
        tables.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.tables.lock().await.products.get(&id).cloned())
    }

    async fn list_products(&self, include_inactive: bool) -> Result<Vec<Product>> {
        let tables = self.tables.lock().await;
        let mut products: Vec<_> = tables
            .products
            .values()
            .filter(|p| include_inactive || p.is_active)
            .cloned()
            .collect();
        newest_first(&mut products, |p| (p.created_at, p.id));
        Ok(products)
    }

    async fn set_product_active(&self, id: ProductId, active: bool) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        match tables.products.get_mut(&id) {
            Some(product) => {
                product.is_active = active;
                product.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool> {
        Ok(self.tables.lock().await.delete_product(id))
    }

    async fn product_stats(&self) -> Result<ProductStats> {
        let tables = self.tables.lock().await;
        Ok(tables
            .products
            .values()
            .fold(ProductStats::default(), |mut stats, p| {
                stats.total_products += 1;
                stats.total_stock += u64::from(p.stock);
                stats.total_sold += u64::from(p.sold);
                if p.stock == 0 {
                    stats.out_of_stock += 1;
                }
                stats
            }))
    }

    async fn list_cart(&self, owner: OwnerId) -> Result<Vec<CartLine>> {
        self.tables.lock().await.cart_lines(owner)
    }

    async fn remove_cart_line(&self, owner: OwnerId, line_id: CartLineId) -> Result<bool> {
        Ok(self.tables.lock().await.remove_cart_line(owner, line_id))
    }

    async fn clear_cart(&self, owner: OwnerId) -> Result<u64> {
        Ok(self.tables.lock().await.clear_cart(owner))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.tables.lock().await.materialize_order(id))
    }

    async fn list_orders(&self, owner: Option<OwnerId>) -> Result<Vec<Order>> {
        let tables = self.tables.lock().await;
        let mut orders: Vec<_> = tables
            .orders
            .values()
            .filter(|o| owner.is_none_or(|owner| o.owner_id == owner))
            .filter_map(|o| tables.materialize_order(o.id))
            .collect();
        newest_first(&mut orders, |o| (o.created_at, o.id));
        Ok(orders)
    }

    async fn list_reviews(&self, product_id: ProductId) -> Result<Vec<Review>> {
        let tables = self.tables.lock().await;
        let mut reviews: Vec<_> = tables
            .reviews
            .values()
            .filter(|r| r.product_id == product_id)
            .cloned()
            .collect();
        newest_first(&mut reviews, |r| (r.created_at, r.id));
        Ok(reviews)
    }

    async fn list_favorites(&self, owner: OwnerId) -> Result<Vec<Favorite>> {
        let tables = self.tables.lock().await;
        let mut favorites: Vec<_> = tables
            .favorites
            .values()
            .filter(|f| f.owner_id == owner)
            .cloned()
            .collect();
        newest_first(&mut favorites, |f| (f.created_at, f.id));
        Ok(favorites)
    }

    async fn insert_favorite(
        &self,
        owner: OwnerId,
        product_id: ProductId,
    ) -> Result<(Favorite, bool)> {
        let mut tables = self.tables.lock().await;
        if let Some(existing) = tables
            .favorites
            .values()
            .find(|f| f.owner_id == owner && f.product_id == product_id)
        {
            return Ok((existing.clone(), false));
        }
        let favorite = Favorite {
            id: FavoriteId::new(tables.next_id()),
            owner_id: owner,
            product_id,
            created_at: Utc::now(),
        };
        tables.favorites.insert(favorite.id, favorite.clone());
        Ok((favorite, true))
    }

    async fn delete_favorite(&self, owner: OwnerId, product_id: ProductId) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.favorites.len();
        tables
            .favorites
            .retain(|_, f| !(f.owner_id == owner && f.product_id == product_id));
        Ok(tables.favorites.len() < before)
    }

    async fn is_favorite(&self, owner: OwnerId, product_id: ProductId) -> Result<bool> {
        Ok(self
            .tables
            .lock()
            .await
            .favorites
            .values()
            .any(|f| f.owner_id == owner && f.product_id == product_id))
    }
}

/// Unit of work over the in-memory store.
///
/// Holds the store lock; changes are staged on a copy and published by
/// [`UnitOfWork::commit`]. Dropping it releases the lock and discards them.
pub struct InMemoryUnitOfWork {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
    fail_on_order_item: bool,
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn lock_cart(&mut self, _owner: OwnerId) -> Result<()> {
        // The store-wide guard already serializes every unit of work.
        Ok(())
    }

    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.staged.products.get(&id).cloned())
    }

    async fn adjust_stock(
        &mut self,
        id: ProductId,
        delta_stock: i64,
        delta_sold: i64,
    ) -> Result<Option<Product>> {
        let Some(product) = self.staged.products.get_mut(&id) else {
            return Ok(None);
        };
        let stock = u32::try_from(i64::from(product.stock) + delta_stock);
        let sold = u32::try_from(i64::from(product.sold) + delta_sold);
        match (stock, sold) {
            (Ok(stock), Ok(sold)) => {
                product.stock = stock;
                product.sold = sold;
                product.updated_at = Utc::now();
                Ok(Some(product.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn cart_lines(&mut self, owner: OwnerId) -> Result<Vec<CartLine>> {
        self.staged.cart_lines(owner)
    }

    async fn cart_line(
        &mut self,
        owner: OwnerId,
        line_id: CartLineId,
    ) -> Result<Option<CartLine>> {
        self.staged
            .owned_cart_row(owner, line_id)
            .map(|row| self.staged.cart_line(row))
            .transpose()
    }

    async fn upsert_cart_line(
        &mut self,
        owner: OwnerId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(CartLine, bool)> {
        let now = Utc::now();
        let existing = self
            .staged
            .cart
            .values_mut()
            .find(|row| row.owner_id == owner && row.product_id == product_id);

        let (line_id, created) = match existing {
            Some(row) => {
                row.quantity += quantity;
                row.updated_at = now;
                (row.id, false)
            }
            None => {
                let id = CartLineId::new(self.staged.next_id());
                self.staged.cart.insert(
                    id,
                    CartRow {
                        id,
                        owner_id: owner,
                        product_id,
                        quantity,
                        created_at: now,
                        updated_at: now,
                    },
                );
                (id, true)
            }
        };

        let row = &self.staged.cart[&line_id];
        Ok((self.staged.cart_line(row)?, created))
    }

    async fn set_cart_quantity(
        &mut self,
        line_id: CartLineId,
        quantity: u32,
    ) -> Result<Option<CartLine>> {
        let Some(row) = self.staged.cart.get_mut(&line_id) else {
            return Ok(None);
        };
        row.quantity = quantity;
        row.updated_at = Utc::now();
        let row = &self.staged.cart[&line_id];
        self.staged.cart_line(row).map(Some)
    }

    async fn delete_cart_line(&mut self, owner: OwnerId, line_id: CartLineId) -> Result<bool> {
        Ok(self.staged.remove_cart_line(owner, line_id))
    }

    async fn clear_cart(&mut self, owner: OwnerId) -> Result<u64> {
        Ok(self.staged.clear_cart(owner))
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Option<Order>> {
        if self
            .staged
            .orders
            .values()
            .any(|o| o.order_number == order.order_number)
        {
            return Ok(None);
        }
        let now = Utc::now();
        let order = Order {
            id: OrderId::new(self.staged.next_id()),
            order_number: order.order_number,
            owner_id: order.owner_id,
            delivery: order.delivery,
            total_amount: order.total_amount,
            payment_method: order.payment_method,
            payment_status: order.payment_status,
            order_status: OrderStatus::Pending,
            transaction_id: order.transaction_id,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.staged.orders.insert(order.id, order.clone());
        Ok(Some(order))
    }

    async fn insert_order_item(&mut self, item: NewOrderItem) -> Result<OrderItem> {
        if self.fail_on_order_item {
            return Err(StoreError::Unavailable(
                "order item insert rejected".to_string(),
            ));
        }
        if !self.staged.orders.contains_key(&item.order_id) {
            return Err(StoreError::Decode(format!(
                "order item references missing order {}",
                item.order_id
            )));
        }
        let subtotal = item.subtotal().ok_or_else(|| {
            StoreError::Decode(format!(
                "subtotal out of range: {} x {}",
                item.product_price, item.quantity
            ))
        })?;
        let item = OrderItem {
            id: OrderItemId::new(self.staged.next_id()),
            order_id: item.order_id,
            product_id: Some(item.product_id),
            product_name: item.product_name,
            product_price: item.product_price,
            quantity: item.quantity,
            subtotal,
        };
        self.staged.order_items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.staged.materialize_order(id))
    }

    async fn set_order_status(
        &mut self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>> {
        let Some(order) = self.staged.orders.get_mut(&id) else {
            return Ok(None);
        };
        order.order_status = status;
        order.updated_at = Utc::now();
        Ok(self.staged.materialize_order(id))
    }

    async fn upsert_review(
        &mut self,
        product_id: ProductId,
        owner: OwnerId,
        rating: u8,
        comment: String,
    ) -> Result<(Review, bool)> {
        let now = Utc::now();
        if let Some(review) = self
            .staged
            .reviews
            .values_mut()
            .find(|r| r.product_id == product_id && r.owner_id == owner)
        {
            review.rating = rating;
            review.comment = comment;
            review.updated_at = now;
            return Ok((review.clone(), false));
        }
        let review = Review {
            id: ReviewId::new(self.staged.next_id()),
            product_id,
            owner_id: owner,
            rating,
            comment,
            created_at: now,
            updated_at: now,
        };
        self.staged.reviews.insert(review.id, review.clone());
        Ok((review, true))
    }

    async fn delete_review(&mut self, owner: OwnerId, id: ReviewId) -> Result<Option<Review>> {
        match self.staged.reviews.get(&id) {
            Some(review) if review.owner_id == owner => Ok(self.staged.reviews.remove(&id)),
            _ => Ok(None),
        }
    }

    async fn product_ratings(&mut self, product_id: ProductId) -> Result<Vec<u8>> {
        Ok(self
            .staged
            .reviews
            .values()
            .filter(|r| r.product_id == product_id)
            .map(|r| r.rating)
            .collect())
    }

    async fn set_product_rating(
        &mut self,
        product_id: ProductId,
        summary: RatingSummary,
    ) -> Result<bool> {
        let Some(product) = self.staged.products.get_mut(&product_id) else {
            return Ok(false);
        };
        product.average_rating = summary.average_rating;
        product.total_reviews = summary.total_reviews;
        product.updated_at = Utc::now();
        Ok(true)
    }

    async fn commit(self) -> Result<()> {
        let Self {
            mut guard, staged, ..
        } = self;
        *guard = staged;
        Ok(())
    }
}
