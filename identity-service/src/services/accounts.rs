//! Read-only view of the account subsystem. Accounts are created and managed
//! elsewhere; this service only resolves issuers and lists providers.

use crate::models::{Account, AccountKind};
use crate::services::error::ServiceError;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{bson::doc, Client as MongoClient, Collection};

#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn get_by_id(&self, account_id: &str) -> Result<Option<Account>, ServiceError>;

    /// Resolve an account by its public spend key (the issuer identifier).
    async fn get_by_public_key(
        &self,
        public_spend_key: &str,
    ) -> Result<Option<Account>, ServiceError>;

    /// Public identity-provider accounts.
    async fn list_providers(&self) -> Result<Vec<Account>, ServiceError>;
}

#[derive(Clone)]
pub struct AccountDb {
    accounts: Collection<Account>,
}

impl AccountDb {
    pub fn new(client: &MongoClient, database: &str) -> Self {
        Self {
            accounts: client.database(database).collection("accounts"),
        }
    }
}

#[async_trait]
impl AccountDirectory for AccountDb {
    async fn get_by_id(&self, account_id: &str) -> Result<Option<Account>, ServiceError> {
        Ok(self
            .accounts
            .find_one(doc! { "account_id": account_id }, None)
            .await?)
    }

    async fn get_by_public_key(
        &self,
        public_spend_key: &str,
    ) -> Result<Option<Account>, ServiceError> {
        Ok(self
            .accounts
            .find_one(doc! { "public_spend_key": public_spend_key }, None)
            .await?)
    }

    async fn list_providers(&self) -> Result<Vec<Account>, ServiceError> {
        let cursor = self
            .accounts
            .find(doc! { "kind": "identityprovider", "is_private": false }, None)
            .await?;
        Ok(cursor.try_collect().await?)
    }
}

/// In-memory directory for tests and standalone runs.
#[derive(Default)]
pub struct MockAccountDirectory {
    accounts: std::sync::Mutex<Vec<Account>>,
}

impl MockAccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, account: Account) {
        self.accounts
            .lock()
            .expect("account mutex poisoned")
            .push(account);
    }
}

#[async_trait]
impl AccountDirectory for MockAccountDirectory {
    async fn get_by_id(&self, account_id: &str) -> Result<Option<Account>, ServiceError> {
        let accounts = self
            .accounts
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("account mutex poisoned: {}", e)))?;
        Ok(accounts.iter().find(|a| a.account_id == account_id).cloned())
    }

    async fn get_by_public_key(
        &self,
        public_spend_key: &str,
    ) -> Result<Option<Account>, ServiceError> {
        let accounts = self
            .accounts
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("account mutex poisoned: {}", e)))?;
        Ok(accounts
            .iter()
            .find(|a| a.public_spend_key == public_spend_key)
            .cloned())
    }

    async fn list_providers(&self) -> Result<Vec<Account>, ServiceError> {
        let accounts = self
            .accounts
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("account mutex poisoned: {}", e)))?;
        Ok(accounts
            .iter()
            .filter(|a| a.kind == AccountKind::IdentityProvider && !a.is_private)
            .cloned()
            .collect())
    }
}
