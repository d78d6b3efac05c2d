//! Minimal product catalog.

use common::{Money, NewProduct, Product, ProductId, ProductStats};
use serde::Deserialize;
use store::Store;
use validator::Validate;

use crate::error::{DomainError, Result};
use crate::order::intake::validate_not_blank;

/// Highest accepted price, in cents. Any line of at most `u32::MAX` units
/// at this price still fits in [`Money`].
pub const MAX_PRICE_CENTS: i64 = 1_000_000_000;

/// An administrator's request to add a product.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProductDraft {
    #[validate(length(min = 1, max = 255), custom = "validate_not_blank")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Price in cents.
    #[validate(range(
        min = 0,
        max = "MAX_PRICE_CENTS",
        message = "must be between 0 and 1000000000 cents"
    ))]
    pub price: i64,
    #[serde(default)]
    pub stock: u32,
}

impl ProductDraft {
    pub fn into_validated(self) -> Result<NewProduct> {
        self.validate()?;
        Ok(NewProduct {
            name: self.name.trim().to_string(),
            description: self.description,
            price: Money::from_cents(self.price),
            stock: self.stock,
        })
    }
}

/// Service for browsing and administering products.
#[derive(Clone)]
pub struct CatalogService<S: Store> {
    store: S,
}

impl<S: Store> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Lists active products, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_active(&self) -> Result<Vec<Product>> {
        Ok(self.store.list_products(false).await?)
    }

    /// Gets a product that is visible to shoppers.
    #[tracing::instrument(skip(self))]
    pub async fn get_active(&self, id: ProductId) -> Result<Product> {
        self.store
            .get_active_product(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Product", id))
    }

    /// Lists every product including inactive ones (administrators).
    #[tracing::instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<Product>> {
        Ok(self.store.list_products(true).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn create(&self, draft: ProductDraft) -> Result<Product> {
        let product = draft.into_validated()?;
        let product = self.store.insert_product(product).await?;
        tracing::info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    /// Hides a product from shoppers. Existing carts and orders are untouched.
    #[tracing::instrument(skip(self))]
    pub async fn deactivate(&self, id: ProductId) -> Result<()> {
        if self.store.set_product_active(id, false).await? {
            Ok(())
        } else {
            Err(DomainError::not_found("Product", id))
        }
    }

    /// Deletes a product for good.
    ///
    /// Order items keep their snapshot but lose the product reference, so
    /// cancelling those orders can no longer restock it.
    #[tracing::instrument(skip(self))]
    pub async fn purge(&self, id: ProductId) -> Result<()> {
        if self.store.delete_product(id).await? {
            tracing::warn!(product_id = %id, "Product purged");
            Ok(())
        } else {
            Err(DomainError::not_found("Product", id))
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn stats(&self) -> Result<ProductStats> {
        Ok(self.store.product_stats().await?)
    }
}
