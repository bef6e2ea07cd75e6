//! In-memory market store for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{MedicineId, OrderId, OrderStatus, UserId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    CartItemRecord, MarketStore, MedicineRecord, OrderItemRecord, OrderRecord, OrderScope,
    OrderWithItems, Result,
};

#[derive(Debug, Clone, Default)]
struct MarketState {
    medicines: HashMap<MedicineId, MedicineRecord>,
    orders: HashMap<OrderId, OrderRecord>,
    order_items: HashMap<OrderId, Vec<OrderItemRecord>>,
    cart_items: Vec<CartItemRecord>,
}

/// In-memory implementation of [`MarketStore`] with real transaction
/// semantics.
///
/// A transaction takes the store's single lock and stages its writes on
/// a copy of the state; commit swaps the copy in, rollback drops it.
/// Transactions are therefore fully serialized, coarser than the
/// row-level locking of the PostgreSQL store, but with the same
/// observable atomicity and isolation. Non-transactional calls block
/// while a transaction is open.
#[derive(Clone, Default)]
pub struct InMemoryMarketStore {
    state: Arc<Mutex<MarketState>>,
}

/// An open in-memory transaction: the store lock plus staged state.
pub struct MemoryTx {
    guard: OwnedMutexGuard<MarketState>,
    staged: MarketState,
}

impl InMemoryMarketStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }
}

fn scoped_orders(state: &MarketState, scope: OrderScope) -> Vec<OrderWithItems> {
    let mut orders: Vec<&OrderRecord> = state
        .orders
        .values()
        .filter(|order| match scope {
            OrderScope::All => true,
            OrderScope::Customer(customer_id) => order.customer_id == customer_id,
            OrderScope::Seller(seller_id) => state
                .order_items
                .get(&order.id)
                .is_some_and(|items| items.iter().any(|item| item.seller_id == seller_id)),
        })
        .collect();

    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    orders
        .into_iter()
        .map(|order| OrderWithItems {
            order: order.clone(),
            items: state.order_items.get(&order.id).cloned().unwrap_or_default(),
        })
        .collect()
}

#[async_trait]
impl MarketStore for InMemoryMarketStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<Self::Tx> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(MemoryTx { guard, staged })
    }

    async fn commit(&self, mut tx: Self::Tx) -> Result<()> {
        *tx.guard = tx.staged;
        Ok(())
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<()> {
        drop(tx);
        Ok(())
    }

    async fn insert_medicine(&self, medicine: &MedicineRecord) -> Result<()> {
        self.state
            .lock()
            .await
            .medicines
            .insert(medicine.id, medicine.clone());
        Ok(())
    }

    async fn get_medicine(&self, id: MedicineId) -> Result<Option<MedicineRecord>> {
        Ok(self.state.lock().await.medicines.get(&id).cloned())
    }

    async fn update_medicine(&self, medicine: &MedicineRecord) -> Result<()> {
        self.state
            .lock()
            .await
            .medicines
            .insert(medicine.id, medicine.clone());
        Ok(())
    }

    async fn medicine_for_update(
        &self,
        tx: &mut Self::Tx,
        id: MedicineId,
    ) -> Result<Option<MedicineRecord>> {
        Ok(tx.staged.medicines.get(&id).cloned())
    }

    async fn adjust_stock(&self, tx: &mut Self::Tx, id: MedicineId, delta: i64) -> Result<()> {
        if let Some(medicine) = tx.staged.medicines.get_mut(&id) {
            medicine.stock += delta;
        }
        Ok(())
    }

    async fn upsert_cart_item(&self, item: &CartItemRecord) -> Result<()> {
        let mut state = self.state.lock().await;
        state
            .cart_items
            .retain(|c| !(c.customer_id == item.customer_id && c.medicine_id == item.medicine_id));
        state.cart_items.push(item.clone());
        Ok(())
    }

    async fn cart_item_count(&self, customer_id: UserId) -> Result<u64> {
        let state = self.state.lock().await;
        Ok(state
            .cart_items
            .iter()
            .filter(|c| c.customer_id == customer_id)
            .count() as u64)
    }

    async fn clear_cart(&self, tx: &mut Self::Tx, customer_id: UserId) -> Result<u64> {
        let before = tx.staged.cart_items.len();
        tx.staged.cart_items.retain(|c| c.customer_id != customer_id);
        Ok((before - tx.staged.cart_items.len()) as u64)
    }

    async fn insert_order(
        &self,
        tx: &mut Self::Tx,
        order: &OrderRecord,
        items: &[OrderItemRecord],
    ) -> Result<()> {
        tx.staged.orders.insert(order.id, order.clone());
        tx.staged.order_items.insert(order.id, items.to_vec());
        Ok(())
    }

    async fn order_for_update(
        &self,
        tx: &mut Self::Tx,
        id: OrderId,
    ) -> Result<Option<OrderRecord>> {
        Ok(tx.staged.orders.get(&id).cloned())
    }

    async fn order_items(&self, tx: &mut Self::Tx, id: OrderId) -> Result<Vec<OrderItemRecord>> {
        Ok(tx.staged.order_items.get(&id).cloned().unwrap_or_default())
    }

    async fn set_order_status(
        &self,
        tx: &mut Self::Tx,
        id: OrderId,
        status: OrderStatus,
        delivered_at: Option<DateTime<Utc>>,
        notes: Option<&str>,
    ) -> Result<()> {
        if let Some(order) = tx.staged.orders.get_mut(&id) {
            order.status = status;
            if delivered_at.is_some() {
                order.delivered_at = delivered_at;
            }
            if let Some(notes) = notes {
                order.notes = Some(notes.to_string());
            }
        }
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<OrderWithItems>> {
        let state = self.state.lock().await;
        Ok(state.orders.get(&id).map(|order| OrderWithItems {
            order: order.clone(),
            items: state.order_items.get(&id).cloned().unwrap_or_default(),
        }))
    }

    async fn list_orders(&self, scope: OrderScope) -> Result<Vec<OrderWithItems>> {
        let state = self.state.lock().await;
        Ok(scoped_orders(&state, scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Money;
    use uuid::Uuid;

    fn medicine(stock: i64) -> MedicineRecord {
        MedicineRecord {
            id: MedicineId::new(),
            name: "Paracetamol 500mg".to_string(),
            manufacturer: "Acme Pharma".to_string(),
            price: Money::from_cents(1000),
            stock,
            is_active: true,
            seller_id: UserId::new(),
            category_id: Uuid::new_v4(),
            image_url: None,
        }
    }

    #[tokio::test]
    async fn rollback_discards_staged_writes() {
        let store = InMemoryMarketStore::new();
        let med = medicine(10);
        store.insert_medicine(&med).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        store.adjust_stock(&mut tx, med.id, -4).await.unwrap();
        store.rollback(tx).await.unwrap();

        let after = store.get_medicine(med.id).await.unwrap().unwrap();
        assert_eq!(after.stock, 10);
    }

    #[tokio::test]
    async fn commit_applies_staged_writes() {
        let store = InMemoryMarketStore::new();
        let med = medicine(10);
        store.insert_medicine(&med).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        store.adjust_stock(&mut tx, med.id, -4).await.unwrap();
        store.commit(tx).await.unwrap();

        let after = store.get_medicine(med.id).await.unwrap().unwrap();
        assert_eq!(after.stock, 6);
    }

    #[tokio::test]
    async fn reads_inside_transaction_see_staged_state() {
        let store = InMemoryMarketStore::new();
        let med = medicine(10);
        store.insert_medicine(&med).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        store.adjust_stock(&mut tx, med.id, -3).await.unwrap();
        let staged = store
            .medicine_for_update(&mut tx, med.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(staged.stock, 7);
        store.rollback(tx).await.unwrap();
    }

    #[tokio::test]
    async fn clear_cart_reports_removed_rows() {
        let store = InMemoryMarketStore::new();
        let customer = UserId::new();
        for _ in 0..3 {
            store
                .upsert_cart_item(&CartItemRecord {
                    id: Uuid::new_v4(),
                    customer_id: customer,
                    medicine_id: MedicineId::new(),
                    quantity: 1,
                })
                .await
                .unwrap();
        }

        let mut tx = store.begin().await.unwrap();
        let removed = store.clear_cart(&mut tx, customer).await.unwrap();
        store.commit(tx).await.unwrap();

        assert_eq!(removed, 3);
        assert_eq!(store.cart_item_count(customer).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn upsert_cart_item_replaces_same_medicine() {
        let store = InMemoryMarketStore::new();
        let customer = UserId::new();
        let med_id = MedicineId::new();

        for quantity in [1, 5] {
            store
                .upsert_cart_item(&CartItemRecord {
                    id: Uuid::new_v4(),
                    customer_id: customer,
                    medicine_id: med_id,
                    quantity,
                })
                .await
                .unwrap();
        }

        assert_eq!(store.cart_item_count(customer).await.unwrap(), 1);
    }
}
