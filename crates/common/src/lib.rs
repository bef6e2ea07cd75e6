//! Shared kernel for the medicine marketplace.
//!
//! Typed identifiers, fixed-point money, the acting principal with its
//! role, and the order status state machine. Everything here is plain
//! data shared between the persistence layer and the domain.

pub mod ids;
pub mod money;
pub mod principal;
pub mod status;

pub use ids::{MedicineId, OrderId, UserId};
pub use money::Money;
pub use principal::{Principal, Role};
pub use status::OrderStatus;
