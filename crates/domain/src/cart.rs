//! Per-owner shopping cart.

use common::{CartLine, CartLineId, Money, OwnerId, Product, ProductId};
use serde::Serialize;
use store::{Store, UnitOfWork};

use crate::error::{DomainError, Result};

/// An owner's cart with derived totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartSummary {
    pub lines: Vec<CartLine>,
    pub total: Money,
    pub count: usize,
}

impl CartSummary {
    pub fn new(lines: Vec<CartLine>) -> Self {
        let total = lines
            .iter()
            .fold(Money::zero(), |acc, line| acc.saturating_add(line.subtotal()));
        let count = lines.len();
        Self {
            lines,
            total,
            count,
        }
    }
}

/// Result of adding a product to a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedLine {
    pub line: CartLine,
    /// False when an existing line was incremented.
    pub created: bool,
}

/// Result of changing a line's quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuantityUpdate {
    Updated(CartLine),
    Removed,
}

/// Service for managing carts.
#[derive(Clone)]
pub struct CartService<S: Store> {
    store: S,
}

impl<S: Store> CartService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Lists the owner's cart with its total.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self, owner: OwnerId) -> Result<CartSummary> {
        Ok(CartSummary::new(self.store.list_cart(owner).await?))
    }

    /// Adds `quantity` of a product, merging with an existing line.
    #[tracing::instrument(skip(self))]
    pub async fn add(
        &self,
        owner: OwnerId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<AddedLine> {
        let quantity = positive_quantity(quantity)?;

        let mut tx = self.store.begin().await?;
        tx.lock_cart(owner).await?;
        let existing = tx
            .cart_lines(owner)
            .await?
            .into_iter()
            .find(|line| line.product_id == product_id)
            .map_or(0, |line| line.quantity);
        let product = tx
            .lock_product(product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| DomainError::not_found("Product", product_id))?;

        let requested = existing.saturating_add(quantity);
        check_line(&product, requested)?;

        let (line, created) = tx.upsert_cart_line(owner, product_id, quantity).await?;
        tx.commit().await?;

        metrics::counter!("cart_lines_added_total").increment(1);
        tracing::debug!(line_id = %line.id, quantity = line.quantity, created, "Cart line saved");
        Ok(AddedLine { line, created })
    }

    /// Replaces a line's quantity. Zero or less removes the line.
    #[tracing::instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        owner: OwnerId,
        line_id: CartLineId,
        quantity: i64,
    ) -> Result<QuantityUpdate> {
        let mut tx = self.store.begin().await?;
        tx.lock_cart(owner).await?;
        let line = tx
            .cart_line(owner, line_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Cart line", line_id))?;

        if quantity <= 0 {
            tx.delete_cart_line(owner, line_id).await?;
            tx.commit().await?;
            return Ok(QuantityUpdate::Removed);
        }

        let quantity = u32::try_from(quantity)
            .map_err(|_| DomainError::invalid("quantity", "is too large"))?;
        let product = tx
            .lock_product(line.product_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Product", line.product_id))?;
        check_line(&product, quantity)?;

        let line = tx
            .set_cart_quantity(line_id, quantity)
            .await?
            .ok_or_else(|| DomainError::not_found("Cart line", line_id))?;
        tx.commit().await?;
        Ok(QuantityUpdate::Updated(line))
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, owner: OwnerId, line_id: CartLineId) -> Result<()> {
        if self.store.remove_cart_line(owner, line_id).await? {
            Ok(())
        } else {
            Err(DomainError::not_found("Cart line", line_id))
        }
    }

    /// Empties the cart. Succeeds when it is already empty.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, owner: OwnerId) -> Result<u64> {
        Ok(self.store.clear_cart(owner).await?)
    }
}

/// A line may hold at most the product's stock, and its subtotal must be
/// representable.
fn check_line(product: &Product, quantity: u32) -> Result<()> {
    if quantity > product.stock {
        return Err(DomainError::InsufficientStock {
            product_id: product.id,
            product_name: product.name.clone(),
            available: product.stock,
            requested: quantity,
        });
    }
    if product.price.checked_multiply(quantity).is_none() {
        return Err(DomainError::invalid("quantity", "line total is too large"));
    }
    Ok(())
}

fn positive_quantity(quantity: i64) -> Result<u32> {
    if quantity < 1 {
        return Err(DomainError::invalid("quantity", "must be at least 1"));
    }
    u32::try_from(quantity).map_err(|_| DomainError::invalid("quantity", "is too large"))
}
