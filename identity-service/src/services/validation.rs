//! Issuance request validation: every requested attribute must be defined in
//! the issuer's schema, and the root attribute must carry a value. No side
//! effects; runs before any store or engine call.

use crate::dtos::AttributeValuePayload;
use crate::models::{AttributeDefinition, IssuerSchema};
use crate::services::error::ServiceError;
use std::collections::HashMap;

/// One validated attribute ready for issuance: its schema definition, the
/// submitted value, and the decoded blinding points.
#[derive(Debug, Clone)]
pub struct AttributeIssuance {
    pub definition: AttributeDefinition,
    pub value: String,
    pub blinding_point_value: Vec<u8>,
    pub blinding_point_root: Vec<u8>,
}

pub fn validate_issuance_request(
    attributes: &HashMap<String, AttributeValuePayload>,
    schema: &IssuerSchema,
) -> Result<Vec<AttributeIssuance>, ServiceError> {
    let mut unsupported: Vec<_> = attributes
        .keys()
        .filter(|name| schema.definition(name).is_none())
        .cloned()
        .collect();

    if !unsupported.is_empty() {
        unsupported.sort();
        return Err(ServiceError::UnknownAttributes(unsupported.join(",")));
    }

    let mut issuances = attributes
        .iter()
        .map(|(name, payload)| {
            let definition = schema.definition(name).cloned().ok_or_else(|| {
                ServiceError::UnknownAttributes(name.clone())
            })?;
            Ok(AttributeIssuance {
                definition,
                value: payload.value.clone(),
                blinding_point_value: decode_point(name, "blinding_point_value", &payload.blinding_point_value)?,
                blinding_point_root: decode_point(name, "blinding_point_root", &payload.blinding_point_root)?,
            })
        })
        .collect::<Result<Vec<_>, ServiceError>>()?;

    if !issuances.iter().any(|a| a.definition.is_root) {
        return Err(ServiceError::MissingRootValue(
            schema.root.attribute_name.clone(),
        ));
    }

    // Root first, then associated entries in name order; downstream issuance
    // and responses become order-stable.
    issuances.sort_by(|a, b| {
        b.definition
            .is_root
            .cmp(&a.definition.is_root)
            .then_with(|| a.definition.attribute_name.cmp(&b.definition.attribute_name))
    });

    Ok(issuances)
}

fn decode_point(
    attribute: &str,
    field: &str,
    value: &Option<String>,
) -> Result<Vec<u8>, ServiceError> {
    match value {
        Some(v) => hex::decode(v)
            .map_err(|_| ServiceError::InvalidEncoding(format!("{}.{}", attribute, field))),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReissuePolicy, SCHEME_DATE_OF_BIRTH};

    fn schema() -> IssuerSchema {
        let root = AttributeDefinition {
            scheme_id: 1,
            issuer: "issuer-key".to_string(),
            attribute_name: "NationalId".to_string(),
            scheme_name: "Passport".to_string(),
            alias: "National ID".to_string(),
            description: String::new(),
            is_active: true,
            is_root: true,
        };
        let dob = AttributeDefinition {
            scheme_id: 2,
            issuer: "issuer-key".to_string(),
            attribute_name: "DateOfBirth".to_string(),
            scheme_name: SCHEME_DATE_OF_BIRTH.to_string(),
            alias: "Date of birth".to_string(),
            description: String::new(),
            is_active: true,
            is_root: false,
        };
        IssuerSchema {
            definitions: vec![root.clone(), dob],
            root,
            protection: None,
            reissue_policy: ReissuePolicy::AllowUnprotected,
        }
    }

    fn payload(value: &str) -> AttributeValuePayload {
        AttributeValuePayload {
            value: value.to_string(),
            blinding_point_value: Some("aa".to_string()),
            blinding_point_root: Some("bb".to_string()),
        }
    }

    #[test]
    fn accepts_known_attributes_with_root_value() {
        let mut attributes = HashMap::new();
        attributes.insert("NationalId".to_string(), payload("AB123"));
        attributes.insert("DateOfBirth".to_string(), payload("1990-01-01"));

        let issuances = validate_issuance_request(&attributes, &schema()).unwrap();
        assert_eq!(issuances.len(), 2);
        // Root is sorted first.
        assert!(issuances[0].definition.is_root);
        assert_eq!(issuances[0].value, "AB123");
        assert_eq!(issuances[0].blinding_point_value, vec![0xaa]);
        assert_eq!(issuances[1].blinding_point_root, vec![0xbb]);
    }

    #[test]
    fn rejects_unknown_attribute_names() {
        let mut attributes = HashMap::new();
        attributes.insert("NationalId".to_string(), payload("AB123"));
        attributes.insert("FavoriteColor".to_string(), payload("blue"));

        let err = validate_issuance_request(&attributes, &schema()).unwrap_err();
        match err {
            ServiceError::UnknownAttributes(names) => assert_eq!(names, "FavoriteColor"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn rejects_missing_root_value() {
        let mut attributes = HashMap::new();
        attributes.insert("DateOfBirth".to_string(), payload("1990-01-01"));

        let err = validate_issuance_request(&attributes, &schema()).unwrap_err();
        assert!(matches!(err, ServiceError::MissingRootValue(name) if name == "NationalId"));
    }

    #[test]
    fn rejects_malformed_blinding_points() {
        let mut attributes = HashMap::new();
        attributes.insert(
            "NationalId".to_string(),
            AttributeValuePayload {
                value: "AB123".to_string(),
                blinding_point_value: Some("not-hex".to_string()),
                blinding_point_root: None,
            },
        );

        let err = validate_issuance_request(&attributes, &schema()).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidEncoding(field) if field == "NationalId.blinding_point_value"));
    }

    #[test]
    fn missing_blinding_points_decode_to_empty() {
        let mut attributes = HashMap::new();
        attributes.insert(
            "NationalId".to_string(),
            AttributeValuePayload {
                value: "AB123".to_string(),
                blinding_point_value: None,
                blinding_point_root: None,
            },
        );

        let issuances = validate_issuance_request(&attributes, &schema()).unwrap();
        assert!(issuances[0].blinding_point_value.is_empty());
        assert!(issuances[0].blinding_point_root.is_empty());
    }
}
