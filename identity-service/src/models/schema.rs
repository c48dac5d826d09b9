//! Issuer attribute schemas: which attribute is root, which scheme backs
//! each attribute, and how re-issuance of an already-committed root is gated.

use serde::{Deserialize, Serialize};

pub const SCHEME_PASSPORT: &str = "Passport";
pub const SCHEME_DRIVING_LICENSE: &str = "DrivingLicense";
pub const SCHEME_FIRST_NAME: &str = "FirstName";
pub const SCHEME_LAST_NAME: &str = "LastName";
pub const SCHEME_DATE_OF_BIRTH: &str = "DateOfBirth";
pub const SCHEME_DATE_OF_EXPIRY: &str = "DateOfExpiry";
pub const SCHEME_PLACE_OF_BIRTH: &str = "PlaceOfBirth";
pub const SCHEME_NATIONALITY: &str = "Nationality";
pub const SCHEME_PASSWORD: &str = "Password";
pub const SCHEME_FACE_IMAGE: &str = "FaceImage";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeValueType {
    Text,
    Date,
    Image,
}

struct SchemeDescriptor {
    name: &'static str,
    value_type: AttributeValueType,
}

static ATTRIBUTE_SCHEMES: &[SchemeDescriptor] = &[
    SchemeDescriptor { name: SCHEME_PASSPORT, value_type: AttributeValueType::Text },
    SchemeDescriptor { name: SCHEME_DRIVING_LICENSE, value_type: AttributeValueType::Text },
    SchemeDescriptor { name: SCHEME_FIRST_NAME, value_type: AttributeValueType::Text },
    SchemeDescriptor { name: SCHEME_LAST_NAME, value_type: AttributeValueType::Text },
    SchemeDescriptor { name: SCHEME_DATE_OF_BIRTH, value_type: AttributeValueType::Date },
    SchemeDescriptor { name: SCHEME_DATE_OF_EXPIRY, value_type: AttributeValueType::Date },
    SchemeDescriptor { name: SCHEME_PLACE_OF_BIRTH, value_type: AttributeValueType::Text },
    SchemeDescriptor { name: SCHEME_NATIONALITY, value_type: AttributeValueType::Text },
    SchemeDescriptor { name: SCHEME_PASSWORD, value_type: AttributeValueType::Text },
    SchemeDescriptor { name: SCHEME_FACE_IMAGE, value_type: AttributeValueType::Image },
];

/// Value type of a scheme; unregistered schemes are treated as plain text.
pub fn value_type_of(scheme_name: &str) -> AttributeValueType {
    ATTRIBUTE_SCHEMES
        .iter()
        .find(|s| s.name == scheme_name)
        .map(|s| s.value_type)
        .unwrap_or(AttributeValueType::Text)
}

/// One issuer-scoped attribute definition. Created and edited by issuer
/// configuration; read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub scheme_id: i64,
    pub issuer: String,
    pub attribute_name: String,
    pub scheme_name: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub description: String,
    pub is_active: bool,
    pub is_root: bool,
}

/// How re-issuance against an already-committed root is authorized.
///
/// The permissive arm is deliberate schema-level policy, not an accident of
/// a missing null check: an issuer without a protection attribute accepts
/// unconditional re-issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReissuePolicy {
    RequireProtectionProof,
    AllowUnprotected,
}

/// Resolved schema for one issuer: active definitions, the single root
/// entry, the optional protection entry, and the resulting re-issue policy.
#[derive(Debug, Clone)]
pub struct IssuerSchema {
    pub definitions: Vec<AttributeDefinition>,
    pub root: AttributeDefinition,
    pub protection: Option<AttributeDefinition>,
    pub reissue_policy: ReissuePolicy,
}

impl IssuerSchema {
    pub fn definition(&self, attribute_name: &str) -> Option<&AttributeDefinition> {
        self.definitions
            .iter()
            .find(|d| d.attribute_name == attribute_name)
    }

    pub fn has_scheme(&self, scheme_name: &str) -> bool {
        self.definitions.iter().any(|d| d.scheme_name == scheme_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_schemes_are_registered_as_dates() {
        assert_eq!(value_type_of(SCHEME_DATE_OF_BIRTH), AttributeValueType::Date);
        assert_eq!(value_type_of(SCHEME_DATE_OF_EXPIRY), AttributeValueType::Date);
    }

    #[test]
    fn unknown_schemes_default_to_text() {
        assert_eq!(value_type_of("ShoeSize"), AttributeValueType::Text);
    }
}
