//! Schema resolution: turns the issuer's raw attribute definitions into the
//! resolved view the issuance protocol runs against.

use crate::models::{IssuerSchema, ReissuePolicy, SCHEME_PASSWORD};
use crate::services::database::IdentityStore;
use crate::services::error::ServiceError;
use std::sync::Arc;

#[derive(Clone)]
pub struct SchemaResolver {
    store: Arc<dyn IdentityStore>,
}

impl SchemaResolver {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    /// Resolve the active schema of an issuer. Fails when the issuer defines
    /// no active root attribute, which makes issuance impossible.
    pub async fn resolve(&self, issuer: &str) -> Result<IssuerSchema, ServiceError> {
        let definitions: Vec<_> = self
            .store
            .attribute_schema(issuer)
            .await?
            .into_iter()
            .filter(|d| d.is_active)
            .collect();

        let root = definitions
            .iter()
            .find(|d| d.is_root)
            .cloned()
            .ok_or_else(|| ServiceError::NoRootScheme(issuer.to_string()))?;

        let protection = definitions
            .iter()
            .find(|d| !d.is_root && d.scheme_name == SCHEME_PASSWORD)
            .cloned();

        // Absence of a protection attribute is an explicit schema-level
        // choice to permit unconditional re-issuance.
        let reissue_policy = if protection.is_some() {
            ReissuePolicy::RequireProtectionProof
        } else {
            ReissuePolicy::AllowUnprotected
        };

        Ok(IssuerSchema {
            definitions,
            root,
            protection,
            reissue_policy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttributeDefinition;
    use crate::services::database::InMemoryIdentityStore;

    fn definition(name: &str, scheme: &str, is_root: bool, is_active: bool) -> AttributeDefinition {
        AttributeDefinition {
            scheme_id: 1,
            issuer: "issuer-key".to_string(),
            attribute_name: name.to_string(),
            scheme_name: scheme.to_string(),
            alias: name.to_string(),
            description: String::new(),
            is_active,
            is_root,
        }
    }

    fn resolver_with(definitions: Vec<AttributeDefinition>) -> SchemaResolver {
        let store = Arc::new(InMemoryIdentityStore::new());
        store.seed_schema(definitions);
        SchemaResolver::new(store)
    }

    #[tokio::test]
    async fn resolves_root_and_protection() {
        let resolver = resolver_with(vec![
            definition("NationalId", "Passport", true, true),
            definition("DateOfBirth", "DateOfBirth", false, true),
            definition("Secret", SCHEME_PASSWORD, false, true),
        ]);

        let schema = resolver.resolve("issuer-key").await.unwrap();
        assert_eq!(schema.root.attribute_name, "NationalId");
        assert_eq!(
            schema.protection.as_ref().unwrap().attribute_name,
            "Secret"
        );
        assert_eq!(schema.reissue_policy, ReissuePolicy::RequireProtectionProof);
    }

    #[tokio::test]
    async fn missing_protection_allows_unprotected_reissue() {
        let resolver = resolver_with(vec![
            definition("NationalId", "Passport", true, true),
            definition("DateOfBirth", "DateOfBirth", false, true),
        ]);

        let schema = resolver.resolve("issuer-key").await.unwrap();
        assert!(schema.protection.is_none());
        assert_eq!(schema.reissue_policy, ReissuePolicy::AllowUnprotected);
    }

    #[tokio::test]
    async fn inactive_root_is_not_resolved() {
        let resolver = resolver_with(vec![
            definition("NationalId", "Passport", true, false),
            definition("DateOfBirth", "DateOfBirth", false, true),
        ]);

        let err = resolver.resolve("issuer-key").await.unwrap_err();
        assert!(matches!(err, ServiceError::NoRootScheme(_)));
    }

    #[tokio::test]
    async fn no_definitions_means_no_root_scheme() {
        let resolver = resolver_with(vec![]);
        let err = resolver.resolve("issuer-key").await.unwrap_err();
        assert!(matches!(err, ServiceError::NoRootScheme(_)));
    }
}
