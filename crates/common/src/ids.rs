use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of an authenticated caller.
///
/// Issued by the external identity provider (the `sub` claim of the bearer
/// token). Wraps a UUID so it can't be confused with row identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(Uuid);

impl OwnerId {
    /// Creates a new random owner ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an owner ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for OwnerId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<OwnerId> for Uuid {
    fn from(id: OwnerId) -> Self {
        id.0
    }
}

/// Declares a database-assigned integer key.
macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw key.
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw key.
            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

row_id!(
    /// Key of a catalog product.
    ProductId
);
row_id!(
    /// Key of a cart line.
    CartLineId
);
row_id!(
    /// Key of a placed order.
    OrderId
);
row_id!(
    /// Key of an order item snapshot.
    OrderItemId
);
row_id!(
    /// Key of a product review.
    ReviewId
);
row_id!(FavoriteId);

/// Human-facing order reference, e.g. `ORD-3F9A0C17B2`.
///
/// Globally unique; assigned once when the order is created and never
/// reassigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub const PREFIX: &'static str = "ORD-";
    const SUFFIX_LEN: usize = 10;

    /// Generates a fresh order number with a random suffix.
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(format!(
            "{}{}",
            Self::PREFIX,
            hex[..Self::SUFFIX_LEN].to_ascii_uppercase()
        ))
    }

    /// Wraps a stored order number.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_id_new_creates_unique_ids() {
        let id1 = OwnerId::new();
        let id2 = OwnerId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn owner_id_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        let id = OwnerId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn row_ids_serialize_as_plain_integers() {
        let json = serde_json::to_string(&ProductId::new(42)).unwrap();
        assert_eq!(json, "42");
        let id: OrderId = serde_json::from_str("7").unwrap();
        assert_eq!(id.as_i64(), 7);
    }

    #[test]
    fn order_number_has_prefix_and_uppercase_hex_suffix() {
        let number = OrderNumber::generate();
        let suffix = number.as_str().strip_prefix(OrderNumber::PREFIX).unwrap();
        assert_eq!(suffix.len(), 10);
        assert!(
            suffix
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        );
    }

    #[test]
    fn order_numbers_do_not_repeat() {
        let a = OrderNumber::generate();
        let b = OrderNumber::generate();
        assert_ne!(a, b);
    }
}
