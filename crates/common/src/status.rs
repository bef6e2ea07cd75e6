//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// Legal transitions:
/// ```text
/// Placed ──► Processing ──► Shipped ──► Delivered
///    │            │
///    └────────────┴──► Cancelled
/// ```
///
/// `Delivered` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order has been placed; stock is already reserved.
    #[default]
    Placed,

    /// A seller has started fulfilling the order.
    Processing,

    /// Order has left the seller.
    Shipped,

    /// Order reached the customer (terminal).
    Delivered,

    /// Order was cancelled and its stock restored (terminal).
    Cancelled,
}

impl OrderStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Placed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    /// Returns the statuses reachable from this one.
    pub fn allowed_next(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Placed => &[OrderStatus::Processing, OrderStatus::Cancelled],
            OrderStatus::Processing => &[OrderStatus::Shipped, OrderStatus::Cancelled],
            OrderStatus::Shipped => &[OrderStatus::Delivered],
            OrderStatus::Delivered | OrderStatus::Cancelled => &[],
        }
    }

    /// Returns true if moving from this status to `next` is legal.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.allowed_next().contains(&next)
    }

    /// Returns true if a customer may still cancel at this status.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, OrderStatus::Placed | OrderStatus::Processing)
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Parses the wire form (`"PLACED"`, `"PROCESSING"`, ...).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PLACED" => Some(OrderStatus::Placed),
            "PROCESSING" => Some(OrderStatus::Processing),
            "SHIPPED" => Some(OrderStatus::Shipped),
            "DELIVERED" => Some(OrderStatus::Delivered),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Returns the wire form of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "PLACED",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
