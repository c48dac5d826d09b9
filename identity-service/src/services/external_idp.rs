//! External document-provider adapters: validate a raw scanned-document
//! payload and translate it into an attribute map. Adapters are selected at
//! request time by the issuer-declared provider name.

use crate::models::schema::{
    SCHEME_DATE_OF_BIRTH, SCHEME_DATE_OF_EXPIRY, SCHEME_FIRST_NAME, SCHEME_LAST_NAME,
    SCHEME_NATIONALITY, SCHEME_PLACE_OF_BIRTH,
};
use crate::services::error::ServiceError;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub const ADAPTER_DOCSCAN_PASSPORT: &str = "DocScan-Passport";
pub const ADAPTER_DOCSCAN_DRIVING_LICENSE: &str = "DocScan-DrivingLicense";

pub trait DocumentAdapter: Send + Sync {
    /// Reject structurally invalid payloads before translation.
    fn validate(&self, payload: &Value) -> Result<(), ServiceError>;

    /// Translate the payload into attribute-name -> content pairs.
    fn translate(&self, payload: &Value) -> Result<HashMap<String, String>, ServiceError>;
}

/// Capability set of known adapters, resolved by name.
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn DocumentAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            ADAPTER_DOCSCAN_PASSPORT,
            Arc::new(DocScanAdapter::passport()),
        );
        registry.register(
            ADAPTER_DOCSCAN_DRIVING_LICENSE,
            Arc::new(DocScanAdapter::driving_license()),
        );
        registry
    }

    pub fn register(&mut self, name: &str, adapter: Arc<dyn DocumentAdapter>) {
        self.adapters.insert(name.to_string(), adapter);
    }

    pub fn get(&self, name: &str) -> Result<&Arc<dyn DocumentAdapter>, ServiceError> {
        self.adapters
            .get(name)
            .ok_or_else(|| ServiceError::UnknownAdapter(name.to_string()))
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[derive(Debug, Clone, Copy)]
enum DocumentKind {
    Passport,
    DrivingLicense,
}

/// Adapter for scanned machine-readable identity documents.
pub struct DocScanAdapter {
    kind: DocumentKind,
}

impl DocScanAdapter {
    pub fn passport() -> Self {
        Self {
            kind: DocumentKind::Passport,
        }
    }

    pub fn driving_license() -> Self {
        Self {
            kind: DocumentKind::DrivingLicense,
        }
    }

    fn number_attribute(&self) -> &'static str {
        match self.kind {
            DocumentKind::Passport => "PassportNumber",
            DocumentKind::DrivingLicense => "LicenseNumber",
        }
    }

    fn required_field<'a>(payload: &'a Value, field: &str) -> Result<&'a str, ServiceError> {
        payload
            .get("document")
            .and_then(|d| d.get(field))
            .and_then(|v| v.as_str())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ServiceError::DocumentRejected(format!("missing document field '{}'", field))
            })
    }

    fn optional_field<'a>(payload: &'a Value, field: &str) -> Option<&'a str> {
        payload
            .get("document")
            .and_then(|d| d.get(field))
            .and_then(|v| v.as_str())
            .filter(|v| !v.is_empty())
    }

    fn check_date(field: &str, value: &str) -> Result<(), ServiceError> {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
            ServiceError::DocumentRejected(format!(
                "field '{}' is not a yyyy-mm-dd date: {}",
                field, value
            ))
        })?;
        Ok(())
    }
}

impl DocumentAdapter for DocScanAdapter {
    fn validate(&self, payload: &Value) -> Result<(), ServiceError> {
        Self::required_field(payload, "document_number")?;
        Self::required_field(payload, "first_name")?;
        Self::required_field(payload, "last_name")?;

        let date_of_birth = Self::required_field(payload, "date_of_birth")?;
        Self::check_date("date_of_birth", date_of_birth)?;

        if let Some(expiry) = Self::optional_field(payload, "expiry_date") {
            Self::check_date("expiry_date", expiry)?;
        }

        Ok(())
    }

    fn translate(&self, payload: &Value) -> Result<HashMap<String, String>, ServiceError> {
        self.validate(payload)?;

        let mut attributes = HashMap::new();
        attributes.insert(
            self.number_attribute().to_string(),
            Self::required_field(payload, "document_number")?.to_string(),
        );
        attributes.insert(
            SCHEME_FIRST_NAME.to_string(),
            Self::required_field(payload, "first_name")?.to_string(),
        );
        attributes.insert(
            SCHEME_LAST_NAME.to_string(),
            Self::required_field(payload, "last_name")?.to_string(),
        );
        attributes.insert(
            SCHEME_DATE_OF_BIRTH.to_string(),
            Self::required_field(payload, "date_of_birth")?.to_string(),
        );

        if let Some(expiry) = Self::optional_field(payload, "expiry_date") {
            attributes.insert(SCHEME_DATE_OF_EXPIRY.to_string(), expiry.to_string());
        }
        if let Some(place) = Self::optional_field(payload, "place_of_birth") {
            attributes.insert(SCHEME_PLACE_OF_BIRTH.to_string(), place.to_string());
        }
        if let Some(nationality) = Self::optional_field(payload, "nationality") {
            attributes.insert(SCHEME_NATIONALITY.to_string(), nationality.to_string());
        }

        Ok(attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn passport_payload() -> Value {
        json!({
            "document": {
                "document_number": "P1234567",
                "first_name": "Ada",
                "last_name": "Lovelace",
                "date_of_birth": "1990-01-01",
                "place_of_birth": "London",
            }
        })
    }

    #[test]
    fn registry_resolves_known_adapters() {
        let registry = AdapterRegistry::with_defaults();
        assert!(registry.get(ADAPTER_DOCSCAN_PASSPORT).is_ok());
        assert!(registry.get(ADAPTER_DOCSCAN_DRIVING_LICENSE).is_ok());
    }

    #[test]
    fn unknown_adapter_is_a_caller_error() {
        let registry = AdapterRegistry::with_defaults();
        let err = registry.get("Unknown-Provider").unwrap_err();
        assert!(matches!(err, ServiceError::UnknownAdapter(name) if name == "Unknown-Provider"));
    }

    #[test]
    fn passport_payload_translates_to_attribute_map() {
        let adapter = DocScanAdapter::passport();
        let attributes = adapter.translate(&passport_payload()).unwrap();

        assert_eq!(attributes["PassportNumber"], "P1234567");
        assert_eq!(attributes[SCHEME_FIRST_NAME], "Ada");
        assert_eq!(attributes[SCHEME_DATE_OF_BIRTH], "1990-01-01");
        assert_eq!(attributes[SCHEME_PLACE_OF_BIRTH], "London");
    }

    #[test]
    fn missing_document_number_is_rejected() {
        let adapter = DocScanAdapter::passport();
        let payload = json!({
            "document": {
                "first_name": "Ada",
                "last_name": "Lovelace",
                "date_of_birth": "1990-01-01",
            }
        });

        let err = adapter.validate(&payload).unwrap_err();
        assert!(matches!(err, ServiceError::DocumentRejected(_)));
    }

    #[test]
    fn malformed_date_of_birth_is_rejected() {
        let adapter = DocScanAdapter::passport();
        let payload = json!({
            "document": {
                "document_number": "P1234567",
                "first_name": "Ada",
                "last_name": "Lovelace",
                "date_of_birth": "01/01/1990",
            }
        });

        let err = adapter.validate(&payload).unwrap_err();
        assert!(matches!(err, ServiceError::DocumentRejected(_)));
    }
}
