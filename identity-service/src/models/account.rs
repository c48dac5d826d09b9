//! Account records owned by the account subsystem; read-only to this service.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    IdentityProvider,
    ServiceProvider,
    User,
}

impl std::fmt::Display for AccountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountKind::IdentityProvider => write!(f, "identity_provider"),
            AccountKind::ServiceProvider => write!(f, "service_provider"),
            AccountKind::User => write!(f, "user"),
        }
    }
}

/// An account as published by the account subsystem. Public keys are kept in
/// their hex form; the spend key doubles as the issuer identifier everywhere
/// in the issuance protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub account_id: String,
    pub info: String,
    pub public_spend_key: String,
    pub public_view_key: String,
    pub kind: AccountKind,
    #[serde(default)]
    pub is_private: bool,
}

impl Account {
    pub fn is_identity_provider(&self) -> bool {
        self.kind == AccountKind::IdentityProvider
    }
}

/// Destination key pair for transferring a root asset to an external holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfidentialTarget {
    pub public_spend_key: Vec<u8>,
    pub public_view_key: Vec<u8>,
}
