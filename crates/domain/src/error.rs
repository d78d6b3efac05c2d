//! Domain error types.

use common::{OrderStatus, ProductId};
use serde::Serialize;
use store::StoreError;
use thiserror::Error;

/// A single rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Caller-fixable input problems, reported per field.
    #[error("Validation failed: {}", summarize(.0))]
    Validation(Vec<FieldError>),

    /// The referenced entity does not exist or is not visible to the caller.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A requested quantity exceeds the product's stock.
    #[error("Insufficient stock for {product_name}: only {available} available, {requested} requested")]
    InsufficientStock {
        product_id: ProductId,
        product_name: String,
        available: u32,
        requested: u32,
    },

    /// Checkout was attempted with no cart lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// The order's current status does not allow the action.
    #[error("Cannot {action} an order that is {current}")]
    InvalidTransition {
        current: OrderStatus,
        action: &'static str,
    },

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

fn summarize(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Validation failure on a single field.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        DomainError::Validation(vec![FieldError::new(field, message)])
    }

    /// Machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "validation_error",
            DomainError::NotFound { .. } => "not_found",
            DomainError::InsufficientStock { .. } => "insufficient_stock",
            DomainError::EmptyCart => "empty_cart",
            DomainError::InvalidTransition { .. } => "invalid_transition",
            DomainError::Store(_) => "internal",
        }
    }
}

impl From<validator::ValidationErrors> for DomainError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| {
                    let message = match &error.message {
                        Some(message) => message.to_string(),
                        None => format!("failed {} check", error.code),
                    };
                    FieldError::new(field, message)
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        DomainError::Validation(fields)
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
