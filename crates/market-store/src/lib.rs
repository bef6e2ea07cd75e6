//! Persistence layer for the medicine marketplace.
//!
//! Exposes the [`MarketStore`] trait, a unit-of-work interface over the
//! rows the order workflow touches, together with a PostgreSQL
//! implementation and an in-memory implementation with real transaction
//! semantics for tests.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod records;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryMarketStore;
pub use postgres::PostgresMarketStore;
pub use records::{
    CartItemRecord, MedicineRecord, OrderItemRecord, OrderRecord, OrderScope, OrderWithItems,
    PAYMENT_METHOD_COD,
};
pub use store::MarketStore;
