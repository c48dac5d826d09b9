//! Identity store adapter: find-or-create identities, persist attribute
//! commitments, and read issuer schemas. Backed by MongoDB in production and
//! by an in-memory store in tests and standalone runs.

use crate::models::{AttributeDefinition, ExternalProviderBinding, Identity};
use crate::services::error::ServiceError;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Bson},
    options::IndexOptions,
    Client as MongoClient, Collection, Database, IndexModel,
};

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Issuer-scoped attribute schema, active and inactive entries alike.
    async fn attribute_schema(
        &self,
        issuer: &str,
    ) -> Result<Vec<AttributeDefinition>, ServiceError>;

    /// Find an identity under the account by one of its attribute values.
    async fn find_identity_by_attribute(
        &self,
        account_id: &str,
        attribute_name: &str,
        content: &str,
    ) -> Result<Option<Identity>, ServiceError>;

    /// Create an identity with all submitted attributes uncommitted.
    async fn create_identity(
        &self,
        account_id: &str,
        description: &str,
        attributes: &[(String, String)],
    ) -> Result<Identity, ServiceError>;

    async fn get_identity(&self, identity_id: &str) -> Result<Option<Identity>, ServiceError>;

    async fn list_identities(&self, account_id: &str) -> Result<Vec<Identity>, ServiceError>;

    /// Persist a commitment on an attribute. Writes only when the attribute
    /// is still uncommitted; returns whether the write happened, so the
    /// null-to-non-null transition occurs exactly once per attribute.
    async fn set_attribute_commitment(
        &self,
        identity_id: &str,
        attribute_id: &str,
        commitment: &[u8],
    ) -> Result<bool, ServiceError>;

    /// Record the holder keys the root asset was transferred to.
    async fn set_identity_target(
        &self,
        identity_id: &str,
        public_spend_key: &str,
        public_view_key: &str,
    ) -> Result<(), ServiceError>;

    async fn find_external_provider(
        &self,
        provider_name: &str,
    ) -> Result<Option<ExternalProviderBinding>, ServiceError>;

    async fn health_check(&self) -> Result<(), ServiceError>;
}

// ============================================================================
// MongoDB store
// ============================================================================

#[derive(Clone)]
pub struct IdentityDb {
    client: MongoClient,
    db: Database,
}

impl IdentityDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, ServiceError> {
        tracing::info!(uri = %uri, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB at {}: {}", uri, e);
            ServiceError::Database(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), ServiceError> {
        tracing::info!("Creating MongoDB indexes for identity-service");

        let identity_id_index = IndexModel::builder()
            .keys(doc! { "identity_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("identity_id_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        self.identities()
            .create_index(identity_id_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create identity_id index: {}", e);
                ServiceError::Database(e)
            })?;

        // Lookups during find-or-create go through (account, attribute name,
        // attribute content).
        let attribute_index = IndexModel::builder()
            .keys(doc! {
                "account_id": 1,
                "attributes.attribute_name": 1,
                "attributes.content": 1,
            })
            .options(
                IndexOptions::builder()
                    .name("account_attribute_idx".to_string())
                    .build(),
            )
            .build();

        self.identities()
            .create_index(attribute_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create account_attribute index: {}", e);
                ServiceError::Database(e)
            })?;

        let schema_issuer_index = IndexModel::builder()
            .keys(doc! { "issuer": 1, "attribute_name": 1 })
            .options(
                IndexOptions::builder()
                    .name("schema_issuer_idx".to_string())
                    .build(),
            )
            .build();

        self.attribute_schemas()
            .create_index(schema_issuer_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create schema_issuer index: {}", e);
                ServiceError::Database(e)
            })?;

        let provider_name_index = IndexModel::builder()
            .keys(doc! { "provider_name": 1 })
            .options(
                IndexOptions::builder()
                    .name("provider_name_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        self.external_providers()
            .create_index(provider_name_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create provider_name index: {}", e);
                ServiceError::Database(e)
            })?;

        tracing::info!("Successfully created all MongoDB indexes");
        Ok(())
    }

    pub fn client(&self) -> &MongoClient {
        &self.client
    }

    pub fn identities(&self) -> Collection<Identity> {
        self.db.collection("identities")
    }

    pub fn attribute_schemas(&self) -> Collection<AttributeDefinition> {
        self.db.collection("attribute_schemas")
    }

    pub fn external_providers(&self) -> Collection<ExternalProviderBinding> {
        self.db.collection("external_identity_providers")
    }
}

#[async_trait]
impl IdentityStore for IdentityDb {
    async fn attribute_schema(
        &self,
        issuer: &str,
    ) -> Result<Vec<AttributeDefinition>, ServiceError> {
        let cursor = self
            .attribute_schemas()
            .find(doc! { "issuer": issuer }, None)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_identity_by_attribute(
        &self,
        account_id: &str,
        attribute_name: &str,
        content: &str,
    ) -> Result<Option<Identity>, ServiceError> {
        Ok(self
            .identities()
            .find_one(
                doc! {
                    "account_id": account_id,
                    "attributes": {
                        "$elemMatch": {
                            "attribute_name": attribute_name,
                            "content": content,
                        }
                    }
                },
                None,
            )
            .await?)
    }

    async fn create_identity(
        &self,
        account_id: &str,
        description: &str,
        attributes: &[(String, String)],
    ) -> Result<Identity, ServiceError> {
        let identity = Identity::new(account_id, description, attributes);
        self.identities().insert_one(&identity, None).await?;

        tracing::info!(
            identity_id = %identity.identity_id,
            account_id = %account_id,
            "Identity created"
        );
        Ok(identity)
    }

    async fn get_identity(&self, identity_id: &str) -> Result<Option<Identity>, ServiceError> {
        Ok(self
            .identities()
            .find_one(doc! { "identity_id": identity_id }, None)
            .await?)
    }

    async fn list_identities(&self, account_id: &str) -> Result<Vec<Identity>, ServiceError> {
        let cursor = self
            .identities()
            .find(doc! { "account_id": account_id }, None)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn set_attribute_commitment(
        &self,
        identity_id: &str,
        attribute_id: &str,
        commitment: &[u8],
    ) -> Result<bool, ServiceError> {
        let result = self
            .identities()
            .update_one(
                doc! {
                    "identity_id": identity_id,
                    "attributes": {
                        "$elemMatch": {
                            "attribute_id": attribute_id,
                            "commitment": Bson::Null,
                        }
                    }
                },
                doc! { "$set": { "attributes.$.commitment": hex::encode(commitment) } },
                None,
            )
            .await?;

        Ok(result.modified_count > 0)
    }

    async fn set_identity_target(
        &self,
        identity_id: &str,
        public_spend_key: &str,
        public_view_key: &str,
    ) -> Result<(), ServiceError> {
        self.identities()
            .update_one(
                doc! { "identity_id": identity_id },
                doc! { "$set": {
                    "target_spend_key": public_spend_key,
                    "target_view_key": public_view_key,
                } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn find_external_provider(
        &self,
        provider_name: &str,
    ) -> Result<Option<ExternalProviderBinding>, ServiceError> {
        Ok(self
            .external_providers()
            .find_one(doc! { "provider_name": provider_name }, None)
            .await?)
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await?;
        Ok(())
    }
}

// ============================================================================
// In-memory store
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct InMemoryIdentityStore {
    identities: Mutex<Vec<Identity>>,
    schemas: Mutex<Vec<AttributeDefinition>>,
    providers: Mutex<HashMap<String, ExternalProviderBinding>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_schema(&self, definitions: Vec<AttributeDefinition>) {
        self.schemas
            .lock()
            .expect("schema mutex poisoned")
            .extend(definitions);
    }

    pub fn seed_external_provider(&self, binding: ExternalProviderBinding) {
        self.providers
            .lock()
            .expect("provider mutex poisoned")
            .insert(binding.provider_name.clone(), binding);
    }

    fn lock_identities(&self) -> Result<std::sync::MutexGuard<'_, Vec<Identity>>, ServiceError> {
        self.identities
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("identity mutex poisoned: {}", e)))
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn attribute_schema(
        &self,
        issuer: &str,
    ) -> Result<Vec<AttributeDefinition>, ServiceError> {
        let schemas = self
            .schemas
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("schema mutex poisoned: {}", e)))?;
        Ok(schemas.iter().filter(|d| d.issuer == issuer).cloned().collect())
    }

    async fn find_identity_by_attribute(
        &self,
        account_id: &str,
        attribute_name: &str,
        content: &str,
    ) -> Result<Option<Identity>, ServiceError> {
        let identities = self.lock_identities()?;
        Ok(identities
            .iter()
            .find(|i| {
                i.account_id == account_id
                    && i.attributes
                        .iter()
                        .any(|a| a.attribute_name == attribute_name && a.content == content)
            })
            .cloned())
    }

    async fn create_identity(
        &self,
        account_id: &str,
        description: &str,
        attributes: &[(String, String)],
    ) -> Result<Identity, ServiceError> {
        let identity = Identity::new(account_id, description, attributes);
        self.lock_identities()?.push(identity.clone());
        Ok(identity)
    }

    async fn get_identity(&self, identity_id: &str) -> Result<Option<Identity>, ServiceError> {
        let identities = self.lock_identities()?;
        Ok(identities.iter().find(|i| i.identity_id == identity_id).cloned())
    }

    async fn list_identities(&self, account_id: &str) -> Result<Vec<Identity>, ServiceError> {
        let identities = self.lock_identities()?;
        Ok(identities
            .iter()
            .filter(|i| i.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn set_attribute_commitment(
        &self,
        identity_id: &str,
        attribute_id: &str,
        commitment: &[u8],
    ) -> Result<bool, ServiceError> {
        let mut identities = self.lock_identities()?;
        let Some(identity) = identities.iter_mut().find(|i| i.identity_id == identity_id) else {
            return Ok(false);
        };
        let Some(attribute) = identity
            .attributes
            .iter_mut()
            .find(|a| a.attribute_id == attribute_id)
        else {
            return Ok(false);
        };

        if attribute.commitment.is_some() {
            return Ok(false);
        }

        attribute.commitment = Some(commitment.to_vec());
        Ok(true)
    }

    async fn set_identity_target(
        &self,
        identity_id: &str,
        public_spend_key: &str,
        public_view_key: &str,
    ) -> Result<(), ServiceError> {
        let mut identities = self.lock_identities()?;
        if let Some(identity) = identities.iter_mut().find(|i| i.identity_id == identity_id) {
            identity.target_spend_key = Some(public_spend_key.to_string());
            identity.target_view_key = Some(public_view_key.to_string());
        }
        Ok(())
    }

    async fn find_external_provider(
        &self,
        provider_name: &str,
    ) -> Result<Option<ExternalProviderBinding>, ServiceError> {
        let providers = self
            .providers
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("provider mutex poisoned: {}", e)))?;
        Ok(providers.get(provider_name).cloned())
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn commitment_is_set_exactly_once() {
        let store = InMemoryIdentityStore::new();
        let identity = store
            .create_identity(
                "acc-1",
                "AB123",
                &[("NationalId".to_string(), "AB123".to_string())],
            )
            .await
            .unwrap();
        let attribute_id = identity.attributes[0].attribute_id.clone();

        let first = store
            .set_attribute_commitment(&identity.identity_id, &attribute_id, b"commitment-1")
            .await
            .unwrap();
        let second = store
            .set_attribute_commitment(&identity.identity_id, &attribute_id, b"commitment-2")
            .await
            .unwrap();

        assert!(first);
        assert!(!second);

        let stored = store.get_identity(&identity.identity_id).await.unwrap().unwrap();
        assert_eq!(stored.attributes[0].commitment.as_deref(), Some(&b"commitment-1"[..]));
    }

    #[tokio::test]
    async fn identity_is_found_by_attribute_value() {
        let store = InMemoryIdentityStore::new();
        store
            .create_identity(
                "acc-1",
                "AB123",
                &[("NationalId".to_string(), "AB123".to_string())],
            )
            .await
            .unwrap();

        let found = store
            .find_identity_by_attribute("acc-1", "NationalId", "AB123")
            .await
            .unwrap();
        assert!(found.is_some());

        let other_account = store
            .find_identity_by_attribute("acc-2", "NationalId", "AB123")
            .await
            .unwrap();
        assert!(other_account.is_none());
    }
}
