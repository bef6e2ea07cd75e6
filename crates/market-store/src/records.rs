//! Persisted row shapes.
//!
//! These are the columns the order workflow reads and writes. Users and
//! categories are owned by other modules; only their identifiers appear
//! here.

use chrono::{DateTime, Utc};
use common::{MedicineId, Money, OrderId, OrderStatus, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The only payment method the marketplace supports.
pub const PAYMENT_METHOD_COD: &str = "COD";

/// A medicine listing.
///
/// Invariant: `stock` never goes negative; the schema carries a
/// `CHECK (stock >= 0)` backstop in addition to the ledger's guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicineRecord {
    pub id: MedicineId,
    pub name: String,
    pub manufacturer: String,
    pub price: Money,
    pub stock: i64,
    pub is_active: bool,
    pub seller_id: UserId,
    pub category_id: Uuid,
    pub image_url: Option<String>,
}

/// An order row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub customer_id: UserId,
    /// Sum of item subtotals at creation time; never recomputed.
    pub total_amount: Money,
    pub status: OrderStatus,
    pub payment_method: String,
    pub shipping_name: String,
    pub shipping_phone: String,
    pub shipping_address: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// An order line, created once alongside its parent order and never
/// mutated afterwards.
///
/// The `medicine_name`, `manufacturer`, and `unit_price` fields are
/// snapshots taken at order time so historical orders stay stable even
/// if the medicine is later edited or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemRecord {
    pub id: Uuid,
    pub order_id: OrderId,
    pub medicine_id: MedicineId,
    pub seller_id: UserId,
    pub medicine_name: String,
    pub manufacturer: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub subtotal: Money,
}

/// A cart row, unique per (customer, medicine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItemRecord {
    pub id: Uuid,
    pub customer_id: UserId,
    pub medicine_id: MedicineId,
    pub quantity: u32,
}

/// An order together with its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderWithItems {
    pub order: OrderRecord,
    pub items: Vec<OrderItemRecord>,
}

/// Which orders a listing query should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderScope {
    /// Every order.
    All,
    /// Orders placed by this customer.
    Customer(UserId),
    /// Orders containing at least one item sold by this seller.
    Seller(UserId),
}
