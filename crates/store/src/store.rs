use async_trait::async_trait;
use common::{
    CartLine, CartLineId, Favorite, NewOrder, NewOrderItem, NewProduct, Order, OrderId, OrderItem,
    OrderStatus, OwnerId, Product, ProductId, ProductStats, RatingSummary, Review, ReviewId,
};

use crate::Result;

/// Core trait for store implementations.
///
/// Methods on the store itself run outside any caller-visible transaction and
/// are limited to reads and single-row writes. Anything that must change
/// several rows together goes through a [`UnitOfWork`] obtained from
/// [`Store::begin`].
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Store: Send + Sync {
    /// The unit-of-work handle produced by [`Store::begin`].
    type Tx: UnitOfWork;

    /// Starts a unit of work.
    ///
    /// Changes made through the handle become visible to others only when
    /// [`UnitOfWork::commit`] succeeds. Dropping the handle without committing
    /// discards every change made through it.
    async fn begin(&self) -> Result<Self::Tx>;

    // -- Catalog --

    /// Inserts a new, active product.
    async fn insert_product(&self, product: NewProduct) -> Result<Product>;

    /// Gets a product regardless of its active flag.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Gets a product only if it is active.
    async fn get_active_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.get_product(id).await?.filter(|p| p.is_active))
    }

    /// Lists products, newest first.
    async fn list_products(&self, include_inactive: bool) -> Result<Vec<Product>>;

    /// Sets the active flag. Returns false if the product does not exist.
    async fn set_product_active(&self, id: ProductId, active: bool) -> Result<bool>;

    /// Removes a product for good.
    ///
    /// Cart lines, favorites and reviews of the product go with it; order item
    /// snapshots keep their fields but lose the product reference.
    /// Returns false if the product does not exist.
    async fn delete_product(&self, id: ProductId) -> Result<bool>;

    /// Computes catalog-wide stock counters over all products.
    async fn product_stats(&self) -> Result<ProductStats>;

    // -- Cart --

    /// Lists an owner's cart lines in the order they were added.
    async fn list_cart(&self, owner: OwnerId) -> Result<Vec<CartLine>>;

    /// Deletes one of the owner's cart lines. Returns false if there was none.
    async fn remove_cart_line(&self, owner: OwnerId, line_id: CartLineId) -> Result<bool>;

    /// Deletes all of the owner's cart lines, returning how many went.
    async fn clear_cart(&self, owner: OwnerId) -> Result<u64>;

    // -- Orders --

    /// Gets an order with its items.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Lists orders with their items, newest first. `None` lists every owner's.
    async fn list_orders(&self, owner: Option<OwnerId>) -> Result<Vec<Order>>;

    // -- Reviews --

    /// Lists a product's reviews, newest first.
    async fn list_reviews(&self, product_id: ProductId) -> Result<Vec<Review>>;

    // -- Favorites --

    /// Lists an owner's favorites, newest first.
    async fn list_favorites(&self, owner: OwnerId) -> Result<Vec<Favorite>>;

    /// Records a favorite if it is not already there.
    ///
    /// Returns the favorite and whether it was created by this call.
    async fn insert_favorite(
        &self,
        owner: OwnerId,
        product_id: ProductId,
    ) -> Result<(Favorite, bool)>;

    /// Removes a favorite. Returns false if there was none.
    async fn delete_favorite(&self, owner: OwnerId, product_id: ProductId) -> Result<bool>;

    async fn is_favorite(&self, owner: OwnerId, product_id: ProductId) -> Result<bool>;
}

/// A group of store mutations that succeed or fail together.
///
/// Rows read through the `lock_*` methods stay locked against concurrent
/// units of work until this one commits or is dropped.
///
/// Lock order: an owner's cart (`lock_cart`), then that owner's cart lines,
/// then products in ascending id order. Every unit of work that touches a
/// cart and a product must follow it.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Serializes units of work over one owner's cart.
    ///
    /// Held until the unit of work ends. Take it before any row lock.
    async fn lock_cart(&mut self, owner: OwnerId) -> Result<()>;

    /// Reads and locks a product row regardless of its active flag.
    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>>;

    /// Shifts a product's stock and sold counters by the given deltas.
    ///
    /// Returns the updated product, or `None` when the product is missing or
    /// either counter would become negative. In the latter case nothing is
    /// changed.
    async fn adjust_stock(
        &mut self,
        id: ProductId,
        delta_stock: i64,
        delta_sold: i64,
    ) -> Result<Option<Product>>;

    /// Reads and locks all of an owner's cart lines.
    async fn cart_lines(&mut self, owner: OwnerId) -> Result<Vec<CartLine>>;

    /// Reads and locks one of an owner's cart lines.
    async fn cart_line(&mut self, owner: OwnerId, line_id: CartLineId)
    -> Result<Option<CartLine>>;

    /// Adds `quantity` to the owner's line for the product, creating the line
    /// if there is none.
    ///
    /// Returns the resulting line and whether it was created by this call.
    async fn upsert_cart_line(
        &mut self,
        owner: OwnerId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(CartLine, bool)>;

    /// Replaces a cart line's quantity.
    async fn set_cart_quantity(
        &mut self,
        line_id: CartLineId,
        quantity: u32,
    ) -> Result<Option<CartLine>>;

    async fn delete_cart_line(&mut self, owner: OwnerId, line_id: CartLineId) -> Result<bool>;

    async fn clear_cart(&mut self, owner: OwnerId) -> Result<u64>;

    /// Inserts an order header.
    ///
    /// Returns `None` without changing anything if the order number is
    /// already taken, so the caller can retry with a fresh one.
    async fn insert_order(&mut self, order: NewOrder) -> Result<Option<Order>>;

    async fn insert_order_item(&mut self, item: NewOrderItem) -> Result<OrderItem>;

    /// Reads and locks an order with its items.
    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Overwrites an order's status, returning the updated order.
    async fn set_order_status(&mut self, id: OrderId, status: OrderStatus)
    -> Result<Option<Order>>;

    /// Creates or replaces the owner's review of a product.
    ///
    /// Returns the review and whether it was created by this call.
    async fn upsert_review(
        &mut self,
        product_id: ProductId,
        owner: OwnerId,
        rating: u8,
        comment: String,
    ) -> Result<(Review, bool)>;

    /// Deletes one of the owner's reviews, returning it.
    async fn delete_review(&mut self, owner: OwnerId, id: ReviewId) -> Result<Option<Review>>;

    /// All ratings currently given to a product.
    async fn product_ratings(&mut self, product_id: ProductId) -> Result<Vec<u8>>;

    /// Stores a product's derived rating fields.
    async fn set_product_rating(
        &mut self,
        product_id: ProductId,
        summary: RatingSummary,
    ) -> Result<bool>;

    /// Makes every change permanent.
    async fn commit(self) -> Result<()>;
}
