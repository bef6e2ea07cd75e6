//! The acting principal and its role.
//!
//! Authentication and session resolution live outside this system; the
//! workflow only ever sees an already-resolved `Principal` threaded
//! explicitly into every call. There is no ambient current user.

use serde::{Deserialize, Serialize};

use crate::UserId;

/// Role of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Places orders and may cancel their own.
    Customer,
    /// Lists medicines and advances orders containing their items.
    Seller,
    /// Full access.
    Admin,
}

impl Role {
    /// Parses the wire form (`"CUSTOMER"`, `"SELLER"`, `"ADMIN"`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CUSTOMER" => Some(Role::Customer),
            "SELLER" => Some(Role::Seller),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Returns the wire form of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "CUSTOMER",
            Role::Seller => "SELLER",
            Role::Admin => "ADMIN",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An authenticated user acting on the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// The user's identity.
    pub id: UserId,
    /// The user's role.
    pub role: Role,
}

impl Principal {
    /// Creates a principal from an id and role.
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    /// Convenience constructor for a customer principal.
    pub fn customer(id: UserId) -> Self {
        Self::new(id, Role::Customer)
    }

    /// Convenience constructor for a seller principal.
    pub fn seller(id: UserId) -> Self {
        Self::new(id, Role::Seller)
    }

    /// Convenience constructor for an admin principal.
    pub fn admin(id: UserId) -> Self {
        Self::new(id, Role::Admin)
    }
}
