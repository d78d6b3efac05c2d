//! Records shared between the store and the domain services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    CartLineId, FavoriteId, Money, OrderId, OrderItemId, OrderNumber, OrderStatus, OwnerId,
    PaymentMethod, PaymentStatus, ProductId, ReviewId,
};

/// A catalog product as seen by the order workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock: u32,
    pub sold: u32,
    pub is_active: bool,
    pub average_rating: f64,
    pub total_reviews: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Fields for a new catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    #[serde(default)]
    pub stock: u32,
}

/// One product in an owner's cart, joined with the product's current name
/// and price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: CartLineId,
    pub owner_id: OwnerId,
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartLine {
    /// Current price times quantity. Never stored.
    ///
    /// Saturates instead of overflowing; adding to a cart rejects lines whose
    /// subtotal does not fit.
    pub fn subtotal(&self) -> Money {
        self.unit_price.saturating_multiply(self.quantity)
    }
}

/// Delivery and contact details frozen onto an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryDetails {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
}

/// A placed order with its item snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: OrderNumber,
    pub owner_id: OwnerId,
    #[serde(flatten)]
    pub delivery: DeliveryDetails,
    pub total_amount: Money,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub transaction_id: Option<String>,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Immutable snapshot of a purchased product.
///
/// `product_id` becomes `None` once the catalog entry is deleted; the other
/// fields stay authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub product_price: Money,
    pub quantity: u32,
    pub subtotal: Money,
}

/// Order header fields supplied when inserting an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub order_number: OrderNumber,
    pub owner_id: OwnerId,
    pub delivery: DeliveryDetails,
    pub total_amount: Money,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub transaction_id: Option<String>,
}

/// Snapshot of one cart line captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_price: Money,
    pub quantity: u32,
}

impl NewOrderItem {
    /// Price times quantity, or `None` when it overflows.
    pub fn subtotal(&self) -> Option<Money> {
        self.product_price.checked_multiply(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub owner_id: OwnerId,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorite {
    pub id: FavoriteId,
    pub owner_id: OwnerId,
    pub product_id: ProductId,
    pub created_at: DateTime<Utc>,
}

/// Aggregate rating fields derived from a product's reviews.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub average_rating: f64,
    pub total_reviews: u32,
}

impl RatingSummary {
    /// Averages the ratings, rounded to two decimals. Zero when empty.
    pub fn from_ratings(ratings: &[u8]) -> Self {
        let total_reviews = u32::try_from(ratings.len()).unwrap_or(u32::MAX);
        if ratings.is_empty() {
            return Self {
                average_rating: 0.0,
                total_reviews: 0,
            };
        }
        let sum: u64 = ratings.iter().map(|r| u64::from(*r)).sum();
        let average = sum as f64 / ratings.len() as f64;
        Self {
            average_rating: (average * 100.0).round() / 100.0,
            total_reviews,
        }
    }
}

/// Catalog-wide inventory counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProductStats {
    pub total_products: u64,
    pub total_stock: u64,
    pub total_sold: u64,
    pub out_of_stock: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: u32, price_cents: i64) -> CartLine {
        let now = Utc::now();
        CartLine {
            id: CartLineId::new(1),
            owner_id: OwnerId::new(),
            product_id: ProductId::new(1),
            product_name: "Linen Shirt".to_string(),
            unit_price: Money::from_cents(price_cents),
            quantity,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn cart_line_subtotal_is_price_times_quantity() {
        assert_eq!(line(3, 10_000).subtotal().cents(), 30_000);
    }

    #[test]
    fn rating_summary_rounds_to_two_decimals() {
        let summary = RatingSummary::from_ratings(&[5, 4, 4]);
        assert_eq!(summary.total_reviews, 3);
        assert_eq!(summary.average_rating, 4.33);
    }

    #[test]
    fn rating_summary_of_no_reviews_is_zero() {
        let summary = RatingSummary::from_ratings(&[]);
        assert_eq!(summary.total_reviews, 0);
        assert_eq!(summary.average_rating, 0.0);
    }

    #[test]
    fn order_serializes_delivery_fields_flat() {
        let now = Utc::now();
        let order = Order {
            id: OrderId::new(9),
            order_number: OrderNumber::new("ORD-0000000001"),
            owner_id: OwnerId::new(),
            delivery: DeliveryDetails {
                full_name: "Asha Rao".to_string(),
                email: "asha@example.com".to_string(),
                phone: "9876543210".to_string(),
                address: "12 MG Road".to_string(),
                city: "Pune".to_string(),
                state: "MH".to_string(),
                pincode: "411001".to_string(),
            },
            total_amount: Money::from_cents(30_000),
            payment_method: PaymentMethod::Cod,
            payment_status: PaymentStatus::Pending,
            order_status: OrderStatus::Pending,
            transaction_id: None,
            items: vec![],
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["city"], "Pune");
        assert_eq!(json["total_amount"], 30_000);
        assert_eq!(json["payment_method"], "cod");
        assert_eq!(json["order_number"], "ORD-0000000001");
    }
}
