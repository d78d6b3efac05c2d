//! Order placement, cancellation and the order ledger.

pub(crate) mod intake;
mod service;

pub use intake::{OrderIntake, ValidatedIntake};
pub use service::OrderService;
