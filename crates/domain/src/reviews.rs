//! Product reviews and the rating fields derived from them.

use common::{OwnerId, ProductId, RatingSummary, Review, ReviewId};
use store::{Store, UnitOfWork};

use crate::error::{DomainError, Result};

/// Result of submitting a review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedReview {
    pub review: Review,
    pub created: bool,
}

/// Service for product reviews.
///
/// Every write recomputes the product's `average_rating` and `total_reviews`
/// before committing.
#[derive(Clone)]
pub struct ReviewService<S: Store> {
    store: S,
}

impl<S: Store> ReviewService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Lists a product's reviews, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self, product_id: ProductId) -> Result<Vec<Review>> {
        Ok(self.store.list_reviews(product_id).await?)
    }

    /// Creates the owner's review of a product, or replaces it.
    #[tracing::instrument(skip(self, comment))]
    pub async fn upsert(
        &self,
        owner: OwnerId,
        product_id: ProductId,
        rating: i64,
        comment: String,
    ) -> Result<SavedReview> {
        let rating = match u8::try_from(rating) {
            Ok(r @ 1..=5) => r,
            _ => return Err(DomainError::invalid("rating", "must be between 1 and 5")),
        };

        let mut tx = self.store.begin().await?;
        if tx.lock_product(product_id).await?.is_none() {
            return Err(DomainError::not_found("Product", product_id));
        }

        let (review, created) = tx.upsert_review(product_id, owner, rating, comment).await?;
        refresh_rating(&mut tx, product_id).await?;
        tx.commit().await?;

        Ok(SavedReview { review, created })
    }

    /// Deletes one of the owner's reviews.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, owner: OwnerId, review_id: ReviewId) -> Result<()> {
        let mut tx = self.store.begin().await?;
        let review = tx
            .delete_review(owner, review_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Review", review_id))?;
        refresh_rating(&mut tx, review.product_id).await?;
        tx.commit().await?;
        Ok(())
    }
}

async fn refresh_rating<T: UnitOfWork>(tx: &mut T, product_id: ProductId) -> Result<()> {
    let ratings = tx.product_ratings(product_id).await?;
    let summary = RatingSummary::from_ratings(&ratings);
    tx.set_product_rating(product_id, summary).await?;
    tracing::debug!(
        %product_id,
        average = summary.average_rating,
        total = summary.total_reviews,
        "Product rating refreshed"
    );
    Ok(())
}
