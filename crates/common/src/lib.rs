//! Shared types for the storefront backend.
//!
//! Identifiers, money, status enumerations and the entity records that the
//! store persists and the domain services hand out.

pub mod ids;
pub mod model;
pub mod money;
pub mod status;

pub use ids::{
    CartLineId, FavoriteId, OrderId, OrderItemId, OrderNumber, OwnerId, ProductId, ReviewId,
};
pub use model::{
    CartLine, DeliveryDetails, Favorite, NewOrder, NewOrderItem, NewProduct, Order, OrderItem,
    Product, ProductStats, RatingSummary, Review,
};
pub use money::Money;
pub use status::{OrderStatus, ParseEnumError, PaymentMethod, PaymentStatus};
