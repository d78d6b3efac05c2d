use common::{Favorite, OwnerId, ProductId};
use store::Store;

use crate::error::{DomainError, Result};

/// Service for an owner's favorite products.
#[derive(Clone)]
pub struct FavoriteService<S: Store> {
    store: S,
}

impl<S: Store> FavoriteService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self))]
    pub async fn list(&self, owner: OwnerId) -> Result<Vec<Favorite>> {
        Ok(self.store.list_favorites(owner).await?)
    }

    /// Marks a product as favorite. Returns whether it was newly added.
    #[tracing::instrument(skip(self))]
    pub async fn add(&self, owner: OwnerId, product_id: ProductId) -> Result<(Favorite, bool)> {
        if self.store.get_product(product_id).await?.is_none() {
            return Err(DomainError::not_found("Product", product_id));
        }
        Ok(self.store.insert_favorite(owner, product_id).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, owner: OwnerId, product_id: ProductId) -> Result<()> {
        if self.store.delete_favorite(owner, product_id).await? {
            Ok(())
        } else {
            Err(DomainError::not_found("Favorite", product_id))
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn check(&self, owner: OwnerId, product_id: ProductId) -> Result<bool> {
        Ok(self.store.is_favorite(owner, product_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use common::{Money, NewProduct};
    use store::InMemoryStore;

    use super::*;

    #[tokio::test]
    async fn add_is_idempotent_and_remove_reports_absence() {
        let store = InMemoryStore::new();
        let product = store
            .insert_product(NewProduct {
                name: "Jute Rug".to_string(),
                description: String::new(),
                price: Money::from_cents(9_900),
                stock: 1,
            })
            .await
            .unwrap();
        let favorites = FavoriteService::new(store);
        let owner = OwnerId::new();

        let (_, created) = favorites.add(owner, product.id).await.unwrap();
        assert!(created);
        let (_, created) = favorites.add(owner, product.id).await.unwrap();
        assert!(!created);
        assert_eq!(favorites.list(owner).await.unwrap().len(), 1);
        assert!(favorites.check(owner, product.id).await.unwrap());

        favorites.remove(owner, product.id).await.unwrap();
        assert!(!favorites.check(owner, product.id).await.unwrap());
        let err = favorites.remove(owner, product.id).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn unknown_product_cannot_be_favorited() {
        let favorites = FavoriteService::new(InMemoryStore::new());
        let err = favorites
            .add(OwnerId::new(), ProductId::new(5))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
