//! Order aggregate builder.
//!
//! Turns a validated create-order request into the rows to persist:
//! walks the request lines, reserves stock for each through the
//! inventory ledger, captures the per-line snapshots and display
//! fields, and accumulates the running total. Runs entirely inside the
//! caller's transaction, so a failure on any line rolls back the
//! reservations already made for earlier lines.

use chrono::Utc;
use common::{Money, OrderId, OrderStatus, UserId};
use market_store::{MarketStore, OrderItemRecord, OrderRecord, PAYMENT_METHOD_COD};
use uuid::Uuid;

use crate::{DomainError, InventoryLedger};

use super::OrderError;
use super::workflow::{CreateOrderRequest, MedicineDisplay};

/// A fully materialized order, ready to persist, plus the display
/// fields captured from each medicine at reservation time.
pub(crate) struct BuiltOrder {
    pub order: OrderRecord,
    pub items: Vec<OrderItemRecord>,
    pub displays: Vec<MedicineDisplay>,
}

pub(crate) async fn build_order<S: MarketStore>(
    store: &S,
    tx: &mut S::Tx,
    customer_id: UserId,
    request: &CreateOrderRequest,
) -> Result<BuiltOrder, DomainError> {
    if request.items.is_empty() {
        return Err(OrderError::EmptyOrder.into());
    }

    let order_id = OrderId::new();
    let mut items = Vec::with_capacity(request.items.len());
    let mut displays = Vec::with_capacity(request.items.len());
    let mut total = Money::zero();

    for line in &request.items {
        let medicine =
            InventoryLedger::reserve(store, tx, line.medicine_id, line.quantity).await?;

        let subtotal = medicine.price.times(line.quantity);
        total += subtotal;

        items.push(OrderItemRecord {
            id: Uuid::new_v4(),
            order_id,
            medicine_id: medicine.id,
            seller_id: medicine.seller_id,
            medicine_name: medicine.name.clone(),
            manufacturer: medicine.manufacturer.clone(),
            unit_price: medicine.price,
            quantity: line.quantity,
            subtotal,
        });
        displays.push(MedicineDisplay {
            id: medicine.id,
            name: medicine.name,
            image_url: medicine.image_url,
        });
    }

    let order = OrderRecord {
        id: order_id,
        customer_id,
        total_amount: total,
        status: OrderStatus::Placed,
        payment_method: PAYMENT_METHOD_COD.to_string(),
        shipping_name: request.shipping_name.clone(),
        shipping_phone: request.shipping_phone.clone(),
        shipping_address: request.shipping_address.clone(),
        notes: request.notes.clone(),
        created_at: Utc::now(),
        delivered_at: None,
    };

    Ok(BuiltOrder {
        order,
        items,
        displays,
    })
}
