//! HTTP handlers grouped by resource.

pub mod admin;
pub mod cart;
pub mod catalog;
pub mod favorites;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod reviews;
