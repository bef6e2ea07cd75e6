//! The order workflow and its collaborators.

mod builder;
mod policy;
mod workflow;

pub use policy::{OrderAction, authorize};
pub use workflow::{
    CancellationReceipt, CreateOrderRequest, ItemView, MedicineDisplay, OrderLine, OrderView,
    OrderWorkflow,
};

use common::{MedicineId, OrderId, OrderStatus};
use thiserror::Error;

/// Errors that can occur during order operations.
///
/// Every variant is recoverable by the caller and carries enough
/// context to render a precise message. Any of these raised mid-workflow
/// rolls back the whole attempt; nothing partial is ever committed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    /// The referenced medicine does not exist.
    #[error("Medicine not found: {medicine_id}")]
    MedicineNotFound { medicine_id: MedicineId },

    /// The referenced order does not exist.
    #[error("Order not found: {order_id}")]
    OrderNotFound { order_id: OrderId },

    /// Quantity must be a positive integer.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// An order must contain at least one line item.
    #[error("Order must contain at least one item")]
    EmptyOrder,

    /// The medicine is inactive and cannot be ordered.
    #[error("Medicine \"{name}\" is not available")]
    MedicineUnavailable { name: String },

    /// Requested quantity exceeds available stock.
    #[error("Insufficient stock for \"{name}\". Available: {available}, Requested: {requested}")]
    InsufficientStock {
        name: String,
        available: i64,
        requested: u32,
    },

    /// The requested status change is not in the transition table.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Role or ownership violation.
    #[error("{reason}")]
    Forbidden { reason: &'static str },

    /// A customer tried to cancel an order that already shipped.
    #[error("Cannot cancel order after it has been shipped")]
    CannotCancelShipped { status: OrderStatus },
}
