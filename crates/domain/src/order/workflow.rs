//! Order workflow service.
//!
//! Orchestrates order creation, cancellation, and status updates as
//! one all-or-nothing transaction each, and exposes the ownership-scoped
//! read projections. Callers hand in a resolved [`Principal`]; there is
//! no ambient current user.

use chrono::{DateTime, Utc};
use common::{MedicineId, Money, OrderId, OrderStatus, Principal, Role, UserId};
use market_store::{MarketStore, OrderItemRecord, OrderRecord, OrderScope, OrderWithItems};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{DomainError, InventoryLedger};

use super::builder::{BuiltOrder, build_order};
use super::policy::{OrderAction, authorize};
use super::OrderError;

/// One line of a create-order request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub medicine_id: MedicineId,
    pub quantity: u32,
}

/// A validated create-order payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub shipping_name: String,
    pub shipping_phone: String,
    pub shipping_address: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub items: Vec<OrderLine>,
}

/// Display fields of a medicine, resolved live (not from snapshots).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicineDisplay {
    pub id: MedicineId,
    pub name: String,
    pub image_url: Option<String>,
}

/// An order item as returned to callers: the immutable snapshot fields
/// plus, where resolved, the live medicine display fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemView {
    pub id: Uuid,
    pub medicine: Option<MedicineDisplay>,
    pub seller_id: UserId,
    pub medicine_name: String,
    pub manufacturer: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub subtotal: Money,
}

/// An order as returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderView {
    pub id: OrderId,
    pub customer_id: UserId,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub payment_method: String,
    pub shipping_name: String,
    pub shipping_phone: String,
    pub shipping_address: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub items: Vec<ItemView>,
}

/// Confirmation returned by a successful cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationReceipt {
    pub order_id: OrderId,
    pub message: String,
}

fn item_view(item: &OrderItemRecord, display: Option<MedicineDisplay>) -> ItemView {
    ItemView {
        id: item.id,
        medicine: display,
        seller_id: item.seller_id,
        medicine_name: item.medicine_name.clone(),
        manufacturer: item.manufacturer.clone(),
        unit_price: item.unit_price,
        quantity: item.quantity,
        subtotal: item.subtotal,
    }
}

fn order_view(order: &OrderRecord, items: Vec<ItemView>) -> OrderView {
    OrderView {
        id: order.id,
        customer_id: order.customer_id,
        total_amount: order.total_amount,
        status: order.status,
        payment_method: order.payment_method.clone(),
        shipping_name: order.shipping_name.clone(),
        shipping_phone: order.shipping_phone.clone(),
        shipping_address: order.shipping_address.clone(),
        notes: order.notes.clone(),
        created_at: order.created_at,
        delivered_at: order.delivered_at,
        items,
    }
}

/// Service for order mutations and scoped reads.
///
/// Each mutation runs as a single unit of work: begin, execute, and
/// commit on success or roll back on the first error, so concurrent
/// requests never observe a half-applied order.
pub struct OrderWorkflow<S: MarketStore> {
    store: S,
}

impl<S: MarketStore> OrderWorkflow<S> {
    /// Creates a new workflow over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Places an order for a customer.
    ///
    /// Atomically: validates every line against inventory, decrements
    /// stock, snapshots name/manufacturer/price per line, persists the
    /// order with its items, and clears the customer's cart. Any
    /// failure rolls the whole attempt back with no stock mutated and
    /// no order created.
    #[tracing::instrument(skip(self, request), fields(customer_id = %customer.id))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
        customer: &Principal,
    ) -> Result<OrderView, DomainError> {
        if customer.role != Role::Customer {
            return Err(OrderError::Forbidden {
                reason: "Only customers can place orders",
            }
            .into());
        }

        let mut tx = self.store.begin().await?;
        let result = self.place_order(&mut tx, &request, customer.id).await;

        match result {
            Ok(built) => {
                self.store.commit(tx).await?;
                metrics::counter!("orders_placed_total").increment(1);
                tracing::info!(order_id = %built.order.id, total = %built.order.total_amount, "order placed");

                let items = built
                    .items
                    .iter()
                    .zip(built.displays.into_iter())
                    .map(|(item, display)| item_view(item, Some(display)))
                    .collect();
                Ok(order_view(&built.order, items))
            }
            Err(err) => {
                self.store.rollback(tx).await?;
                Err(err)
            }
        }
    }

    async fn place_order(
        &self,
        tx: &mut S::Tx,
        request: &CreateOrderRequest,
        customer_id: UserId,
    ) -> Result<BuiltOrder, DomainError> {
        let built = build_order(&self.store, tx, customer_id, request).await?;
        self.store
            .insert_order(tx, &built.order, &built.items)
            .await?;
        self.store.clear_cart(tx, customer_id).await?;
        Ok(built)
    }

    /// Cancels an order, restoring stock for every item.
    ///
    /// Customers may cancel their own orders while still PLACED or
    /// PROCESSING; admins may cancel wherever the transition table
    /// allows; sellers never. A given `reason` is recorded on the order
    /// as `"Cancelled: <reason>"`, otherwise the notes stay unchanged.
    #[tracing::instrument(skip(self), fields(principal_id = %principal.id, role = %principal.role))]
    pub async fn cancel_order(
        &self,
        order_id: OrderId,
        reason: Option<&str>,
        principal: &Principal,
    ) -> Result<CancellationReceipt, DomainError> {
        let mut tx = self.store.begin().await?;
        let result = self.cancel_in_tx(&mut tx, order_id, reason, principal).await;

        match result {
            Ok(()) => {
                self.store.commit(tx).await?;
                metrics::counter!("orders_cancelled_total").increment(1);
                tracing::info!(%order_id, "order cancelled");
                Ok(CancellationReceipt {
                    order_id,
                    message: "Order cancelled successfully".to_string(),
                })
            }
            Err(err) => {
                self.store.rollback(tx).await?;
                Err(err)
            }
        }
    }

    async fn cancel_in_tx(
        &self,
        tx: &mut S::Tx,
        order_id: OrderId,
        reason: Option<&str>,
        principal: &Principal,
    ) -> Result<(), DomainError> {
        let order = self
            .store
            .order_for_update(tx, order_id)
            .await?
            .ok_or(OrderError::OrderNotFound { order_id })?;
        let items = self.store.order_items(tx, order_id).await?;

        authorize(principal, &order, &items, OrderAction::Cancel)?;

        if !order.status.can_transition_to(OrderStatus::Cancelled) {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to: OrderStatus::Cancelled,
            }
            .into());
        }

        for item in &items {
            InventoryLedger::release(&self.store, tx, item.medicine_id, item.quantity).await?;
        }

        let notes = reason.map(|r| format!("Cancelled: {r}"));
        self.store
            .set_order_status(tx, order_id, OrderStatus::Cancelled, None, notes.as_deref())
            .await?;

        Ok(())
    }

    /// Moves an order to a new status.
    ///
    /// Applies the role policy, validates the transition against the
    /// state machine, and persists the result. Transitioning to
    /// DELIVERED stamps the delivery timestamp.
    #[tracing::instrument(skip(self), fields(principal_id = %principal.id, role = %principal.role))]
    pub async fn update_order_status(
        &self,
        order_id: OrderId,
        new_status: OrderStatus,
        principal: &Principal,
    ) -> Result<OrderView, DomainError> {
        let mut tx = self.store.begin().await?;
        let result = self
            .update_status_in_tx(&mut tx, order_id, new_status, principal)
            .await;

        match result {
            Ok(view) => {
                self.store.commit(tx).await?;
                metrics::counter!("order_status_updates_total").increment(1);
                tracing::info!(%order_id, status = %new_status, "order status updated");
                Ok(view)
            }
            Err(err) => {
                self.store.rollback(tx).await?;
                Err(err)
            }
        }
    }

    async fn update_status_in_tx(
        &self,
        tx: &mut S::Tx,
        order_id: OrderId,
        new_status: OrderStatus,
        principal: &Principal,
    ) -> Result<OrderView, DomainError> {
        let mut order = self
            .store
            .order_for_update(tx, order_id)
            .await?
            .ok_or(OrderError::OrderNotFound { order_id })?;
        let items = self.store.order_items(tx, order_id).await?;

        authorize(principal, &order, &items, OrderAction::UpdateStatus(new_status))?;

        if !order.status.can_transition_to(new_status) {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to: new_status,
            }
            .into());
        }

        let delivered_at = (new_status == OrderStatus::Delivered).then(Utc::now);
        self.store
            .set_order_status(tx, order_id, new_status, delivered_at, None)
            .await?;

        order.status = new_status;
        if delivered_at.is_some() {
            order.delivered_at = delivered_at;
        }

        let items = items.iter().map(|item| item_view(item, None)).collect();
        Ok(order_view(&order, items))
    }

    /// Loads a single order, enforcing the visibility contract:
    /// customers see only their own orders, sellers see only orders
    /// containing their items with the items filtered to their own,
    /// admins see everything.
    #[tracing::instrument(skip(self), fields(principal_id = %principal.id, role = %principal.role))]
    pub async fn get_order(
        &self,
        order_id: OrderId,
        principal: &Principal,
    ) -> Result<OrderView, DomainError> {
        let OrderWithItems { order, items } = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound { order_id })?;

        authorize(principal, &order, &items, OrderAction::View)?;

        let visible = visible_items(items, principal);
        let mut views = Vec::with_capacity(visible.len());
        for item in &visible {
            let display = self
                .store
                .get_medicine(item.medicine_id)
                .await?
                .map(|m| MedicineDisplay {
                    id: m.id,
                    name: m.name,
                    image_url: m.image_url,
                });
            views.push(item_view(item, display));
        }

        Ok(order_view(&order, views))
    }

    /// Lists the orders visible to the principal, newest first, with
    /// sellers' item lists filtered to their own items.
    #[tracing::instrument(skip(self), fields(principal_id = %principal.id, role = %principal.role))]
    pub async fn list_orders(&self, principal: &Principal) -> Result<Vec<OrderView>, DomainError> {
        let scope = match principal.role {
            Role::Customer => OrderScope::Customer(principal.id),
            Role::Seller => OrderScope::Seller(principal.id),
            Role::Admin => OrderScope::All,
        };

        let orders = self.store.list_orders(scope).await?;

        Ok(orders
            .into_iter()
            .map(|OrderWithItems { order, items }| {
                let views = visible_items(items, principal)
                    .iter()
                    .map(|item| item_view(item, None))
                    .collect();
                order_view(&order, views)
            })
            .collect())
    }
}

fn visible_items(items: Vec<OrderItemRecord>, principal: &Principal) -> Vec<OrderItemRecord> {
    match principal.role {
        Role::Seller => items
            .into_iter()
            .filter(|item| item.seller_id == principal.id)
            .collect(),
        Role::Customer | Role::Admin => items,
    }
}
