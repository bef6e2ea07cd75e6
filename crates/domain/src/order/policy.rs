//! Role-based authorization for order actions.
//!
//! A pure function of (principal, order, action): no persistence, no
//! ambient state, testable in isolation. The state machine's transition
//! table is enforced separately by the workflow; this module only
//! answers who may attempt what.

use common::{OrderStatus, Principal, Role};
use market_store::{OrderItemRecord, OrderRecord};

use super::OrderError;

/// An action a principal wants to perform on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
    /// Read the order.
    View,
    /// Cancel the order, restoring stock.
    Cancel,
    /// Move the order to a new status.
    UpdateStatus(OrderStatus),
}

fn seller_owns_item(seller: &Principal, items: &[OrderItemRecord]) -> bool {
    items.iter().any(|item| item.seller_id == seller.id)
}

/// Decides whether `principal` may perform `action` on `order`.
///
/// Role rules:
/// - customers may view and cancel only their own orders, and cancel
///   only while the order is still PLACED or PROCESSING;
/// - sellers may view and advance orders containing at least one of
///   their items, but never cancel;
/// - admins may attempt anything (the transition table still applies).
pub fn authorize(
    principal: &Principal,
    order: &OrderRecord,
    items: &[OrderItemRecord],
    action: OrderAction,
) -> Result<(), OrderError> {
    match (principal.role, action) {
        (Role::Admin, _) => Ok(()),

        (Role::Customer, OrderAction::View) => {
            if order.customer_id == principal.id {
                Ok(())
            } else {
                Err(OrderError::Forbidden {
                    reason: "You can only view your own orders",
                })
            }
        }
        (Role::Customer, OrderAction::Cancel) => {
            if order.customer_id != principal.id {
                return Err(OrderError::Forbidden {
                    reason: "You can only cancel your own orders",
                });
            }
            if !order.status.is_cancellable() {
                return Err(OrderError::CannotCancelShipped {
                    status: order.status,
                });
            }
            Ok(())
        }
        (Role::Customer, OrderAction::UpdateStatus(_)) => Err(OrderError::Forbidden {
            reason: "Customers cannot update order status",
        }),

        (Role::Seller, OrderAction::View) => {
            if seller_owns_item(principal, items) {
                Ok(())
            } else {
                Err(OrderError::Forbidden {
                    reason: "This order does not contain your items",
                })
            }
        }
        (Role::Seller, OrderAction::Cancel) => Err(OrderError::Forbidden {
            reason: "Sellers cannot cancel orders",
        }),
        (Role::Seller, OrderAction::UpdateStatus(next)) => {
            if !seller_owns_item(principal, items) {
                return Err(OrderError::Forbidden {
                    reason: "You are not part of this order",
                });
            }
            if next == OrderStatus::Cancelled {
                return Err(OrderError::Forbidden {
                    reason: "Sellers cannot cancel orders",
                });
            }
            Ok(())
        }
    }
}
