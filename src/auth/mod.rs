//! Authenticated principals and authorization policy
//!
//! Identity and session management live upstream; this crate consumes an
//! opaque [`Principal`] and decides what it may do via the explicit policy
//! table in [`policy`].

pub mod policy;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use policy::{is_allowed, requires_verified, Operation};

/// Role of an authenticated principal
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Role {
    /// Ordinary filer - may act on their own complaints only
    #[default]
    User = 0,
    /// Admin - status transitions and taxonomy writes
    Admin = 1,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// Authenticated principal supplied by the upstream auth layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    /// Opaque principal id
    pub id: String,
    /// Role used for admin-gated operations
    pub role: Role,
    /// Whether the account has completed verification
    pub is_verified: bool,
}

impl Principal {
    /// A verified ordinary user
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            is_verified: true,
        }
    }

    /// An admin principal
    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Admin,
            is_verified: true,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
