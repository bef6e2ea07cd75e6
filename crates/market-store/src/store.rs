//! The `MarketStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{MedicineId, OrderId, OrderStatus, UserId};

use crate::Result;
use crate::records::{
    CartItemRecord, MedicineRecord, OrderItemRecord, OrderRecord, OrderScope, OrderWithItems,
};

/// Unit-of-work interface over the marketplace tables.
///
/// Mutations that must be atomic run against an open transaction
/// (`Self::Tx`): the caller obtains one with [`begin`], threads it
/// through the row operations, and finishes with [`commit`] or
/// [`rollback`]. Nothing staged inside a transaction is observable
/// until it commits.
///
/// Implementations must guarantee that a row returned by
/// `medicine_for_update` or `order_for_update` stays unchanged by
/// concurrent transactions until the current one ends, so
/// read-then-decrement on stock cannot lose updates.
///
/// [`begin`]: MarketStore::begin
/// [`commit`]: MarketStore::commit
/// [`rollback`]: MarketStore::rollback
#[async_trait]
pub trait MarketStore: Send + Sync {
    /// An open transaction.
    type Tx: Send;

    /// Begins a new transaction.
    async fn begin(&self) -> Result<Self::Tx>;

    /// Commits a transaction, making its writes visible atomically.
    async fn commit(&self, tx: Self::Tx) -> Result<()>;

    /// Discards every write staged in the transaction.
    async fn rollback(&self, tx: Self::Tx) -> Result<()>;

    // -- Medicines --

    /// Inserts a medicine listing.
    async fn insert_medicine(&self, medicine: &MedicineRecord) -> Result<()>;

    /// Loads a medicine listing.
    async fn get_medicine(&self, id: MedicineId) -> Result<Option<MedicineRecord>>;

    /// Overwrites a medicine listing.
    async fn update_medicine(&self, medicine: &MedicineRecord) -> Result<()>;

    /// Loads a medicine inside the transaction, locking the row against
    /// concurrent stock updates until the transaction ends.
    async fn medicine_for_update(
        &self,
        tx: &mut Self::Tx,
        id: MedicineId,
    ) -> Result<Option<MedicineRecord>>;

    /// Adds `delta` to the medicine's stock. Callers check bounds under
    /// the `medicine_for_update` lock first.
    async fn adjust_stock(&self, tx: &mut Self::Tx, id: MedicineId, delta: i64) -> Result<()>;

    // -- Carts --

    /// Inserts a cart row, replacing any existing row for the same
    /// (customer, medicine) pair.
    async fn upsert_cart_item(&self, item: &CartItemRecord) -> Result<()>;

    /// Returns the number of cart rows for a customer.
    async fn cart_item_count(&self, customer_id: UserId) -> Result<u64>;

    /// Deletes every cart row for a customer, returning how many were
    /// removed.
    async fn clear_cart(&self, tx: &mut Self::Tx, customer_id: UserId) -> Result<u64>;

    // -- Orders --

    /// Inserts an order and all of its items.
    async fn insert_order(
        &self,
        tx: &mut Self::Tx,
        order: &OrderRecord,
        items: &[OrderItemRecord],
    ) -> Result<()>;

    /// Loads an order inside the transaction, locking the row until the
    /// transaction ends.
    async fn order_for_update(&self, tx: &mut Self::Tx, id: OrderId)
    -> Result<Option<OrderRecord>>;

    /// Loads an order's items inside the transaction.
    async fn order_items(&self, tx: &mut Self::Tx, id: OrderId) -> Result<Vec<OrderItemRecord>>;

    /// Updates an order's status, and optionally its delivery timestamp
    /// and notes. `notes` of `None` leaves the stored notes untouched.
    async fn set_order_status(
        &self,
        tx: &mut Self::Tx,
        id: OrderId,
        status: OrderStatus,
        delivered_at: Option<DateTime<Utc>>,
        notes: Option<&str>,
    ) -> Result<()>;

    /// Loads an order with its items.
    async fn get_order(&self, id: OrderId) -> Result<Option<OrderWithItems>>;

    /// Lists orders visible in the given scope, newest first, with
    /// their items.
    async fn list_orders(&self, scope: OrderScope) -> Result<Vec<OrderWithItems>>;
}
