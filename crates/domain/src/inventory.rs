//! Inventory ledger: atomic stock reservation and release.

use common::MedicineId;
use market_store::{MarketStore, MedicineRecord};

use crate::DomainError;
use crate::order::OrderError;

/// Owns medicine stock movements.
///
/// Both operations run against the caller's open transaction, so a
/// reservation is only durable once the surrounding unit of work
/// commits, and no negative stock is ever observable outside it. The
/// medicine row is locked first (`medicine_for_update`), which is what
/// makes check-then-decrement safe under concurrent orders for the
/// same medicine: of two orders racing for the last unit, the loser
/// observes the decremented stock and fails with `InsufficientStock`.
#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryLedger;

impl InventoryLedger {
    /// Reserves `quantity` units of a medicine.
    ///
    /// Checks that the medicine exists, is active, and has sufficient
    /// stock, then decrements. Returns the medicine row as read before
    /// the decrement, so callers can snapshot name, manufacturer, price,
    /// and display fields at this instant.
    pub async fn reserve<S: MarketStore>(
        store: &S,
        tx: &mut S::Tx,
        medicine_id: MedicineId,
        quantity: u32,
    ) -> Result<MedicineRecord, DomainError> {
        if quantity == 0 {
            return Err(OrderError::InvalidQuantity { quantity }.into());
        }

        let medicine = store
            .medicine_for_update(tx, medicine_id)
            .await?
            .ok_or(OrderError::MedicineNotFound { medicine_id })?;

        if !medicine.is_active {
            return Err(OrderError::MedicineUnavailable {
                name: medicine.name,
            }
            .into());
        }

        if medicine.stock < i64::from(quantity) {
            return Err(OrderError::InsufficientStock {
                name: medicine.name,
                available: medicine.stock,
                requested: quantity,
            }
            .into());
        }

        store
            .adjust_stock(tx, medicine_id, -i64::from(quantity))
            .await?;

        Ok(medicine)
    }

    /// Releases a prior reservation, re-adding `quantity` units.
    ///
    /// Used only to undo reservations on cancellation. Medicines are
    /// referenced by orders, not owned: if the row has been deleted
    /// since the order was placed there is no stock to restore, so the
    /// release degrades to a logged no-op and the cancellation proceeds.
    pub async fn release<S: MarketStore>(
        store: &S,
        tx: &mut S::Tx,
        medicine_id: MedicineId,
        quantity: u32,
    ) -> Result<(), DomainError> {
        if quantity == 0 {
            return Err(OrderError::InvalidQuantity { quantity }.into());
        }

        if store.medicine_for_update(tx, medicine_id).await?.is_none() {
            tracing::warn!(%medicine_id, "releasing stock for a deleted medicine, skipping");
            return Ok(());
        }

        store
            .adjust_stock(tx, medicine_id, i64::from(quantity))
            .await?;

        Ok(())
    }
}
