//! Request and response shapes of the attribute-issuance operation. All byte
//! fields cross the wire hex-encoded.

use crate::models::AttributeDefinition;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

/// One submitted attribute: the plaintext value plus the two blinding points
/// the holder supplies for the cryptographic binding step.
#[derive(Debug, Clone, Deserialize)]
pub struct AttributeValuePayload {
    pub value: String,
    #[serde(default)]
    pub blinding_point_value: Option<String>,
    #[serde(default)]
    pub blinding_point_root: Option<String>,
}

/// Ring-signature material presented to authorize re-issuance against an
/// already-committed root.
#[derive(Debug, Clone, Deserialize)]
pub struct ProtectionProofPayload {
    pub signature_e: String,
    pub signature_s: String,
    pub session_commitment: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct IssueAttributesRequest {
    #[validate(length(min = 1, message = "At least one attribute is required"))]
    pub attributes: HashMap<String, AttributeValuePayload>,
    #[serde(default)]
    pub protection: Option<ProtectionProofPayload>,
    /// Target holder keys; when both are present the root asset is
    /// transferred to the holder instead of staying issuer-side.
    #[serde(default)]
    pub public_spend_key: Option<String>,
    #[serde(default)]
    pub public_view_key: Option<String>,
    /// Optional captured face image for the biometric gate.
    #[serde(default)]
    pub face_image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeDefinitionDto {
    pub scheme_id: i64,
    pub attribute_name: String,
    pub scheme_name: String,
    pub alias: String,
    pub description: String,
    pub is_active: bool,
    pub is_root: bool,
}

impl From<&AttributeDefinition> for AttributeDefinitionDto {
    fn from(definition: &AttributeDefinition) -> Self {
        Self {
            scheme_id: definition.scheme_id,
            attribute_name: definition.attribute_name.clone(),
            scheme_name: definition.scheme_name.clone(),
            alias: definition.alias.clone(),
            description: definition.description.clone(),
            is_active: definition.is_active,
            is_root: definition.is_root,
        }
    }
}

/// Issued attribute value echoed back to the caller. The protection
/// attribute is never included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeValueResponse {
    pub value: String,
    pub definition: AttributeDefinitionDto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootIssuanceRecord {
    pub attribute_name: String,
    pub originating_commitment: String,
    pub asset_commitment: String,
    pub surjection_proof: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociatedIssuanceRecord {
    pub attribute_name: String,
    pub asset_commitment: String,
    pub binding_to_root_commitment: String,
}

/// Aggregate outcome of one issuance request, serialized to the notifier
/// channel and to subscribers of the issuing account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssuanceResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<RootIssuanceRecord>,
    #[serde(default)]
    pub associated: Vec<AssociatedIssuanceRecord>,
}
