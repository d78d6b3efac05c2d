//! Business services for the storefront.
//!
//! This crate provides:
//! - Cart management with stock checks
//! - The order workflow: checkout, cancellation and admin status changes
//! - Order ledger reads
//! - A minimal catalog, product reviews and favorites

pub mod cart;
pub mod catalog;
pub mod error;
pub mod favorites;
pub mod order;
pub mod reviews;

pub use cart::{AddedLine, CartService, CartSummary, QuantityUpdate};
pub use catalog::{CatalogService, MAX_PRICE_CENTS, ProductDraft};
pub use error::{DomainError, FieldError, Result};
pub use favorites::FavoriteService;
pub use order::{OrderIntake, OrderService, ValidatedIntake};
pub use reviews::{ReviewService, SavedReview};
