//! Domain layer for the medicine marketplace order workflow.
//!
//! This crate owns the invariant-preserving core of the system:
//! - the inventory ledger (atomic stock reserve/release),
//! - the order aggregate builder (snapshots and totals),
//! - the authorization policy (pure function of principal, order, action),
//! - the order workflow service orchestrating the above as one
//!   transaction per mutation.

pub mod error;
pub mod inventory;
pub mod order;

pub use error::DomainError;
pub use inventory::InventoryLedger;
pub use order::{
    CancellationReceipt, CreateOrderRequest, ItemView, MedicineDisplay, OrderAction, OrderError,
    OrderLine, OrderView, OrderWorkflow, authorize,
};
