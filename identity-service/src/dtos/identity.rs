//! Read-side and registration DTOs: providers, schemas, identities, and
//! document translation.

use crate::models::{Account, Identity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfoResponse {
    pub id: String,
    pub description: String,
    pub target: String,
}

impl From<&Account> for ProviderInfoResponse {
    fn from(account: &Account) -> Self {
        Self {
            id: account.account_id.clone(),
            description: account.info.clone(),
            target: account.public_spend_key.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeSchemaEntryResponse {
    pub attribute_name: String,
    pub alias: String,
}

/// Issuer schema as shown to holders: the root entry plus the associated
/// entries, with the protection attribute filtered out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_attribute: Option<AttributeSchemaEntryResponse>,
    pub associated_attributes: Vec<AttributeSchemaEntryResponse>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateIdentityRequest {
    #[validate(length(min = 1, message = "Description cannot be empty"))]
    pub description: String,
    #[validate(length(min = 1, message = "At least one attribute is required"))]
    pub attributes: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityAttributeResponse {
    pub attribute_name: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commitment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityResponse {
    pub id: String,
    pub description: String,
    pub attributes: Vec<IdentityAttributeResponse>,
}

impl From<&Identity> for IdentityResponse {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.identity_id.clone(),
            description: identity.description.clone(),
            attributes: identity
                .attributes
                .iter()
                .map(|a| IdentityAttributeResponse {
                    attribute_name: a.attribute_name.clone(),
                    content: a.content.clone(),
                    commitment: a.commitment.as_ref().map(hex::encode),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerActionDetailsResponse {
    pub issuer: String,
    pub issuer_alias: String,
    pub action_uri: String,
}

/// Outcome of validating and translating an external document payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResponse {
    pub issuer: String,
    pub action_uri: String,
    pub attributes: HashMap<String, String>,
}
