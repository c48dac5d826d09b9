//! The attribute-issuance protocol. Decides between first issuance of a root
//! attribute and the proof-gated re-issuance path, binds associated
//! attributes to the root asset identifier, optionally transfers the root
//! asset to an external holder, and announces the outcome.

use crate::dtos::{
    AssociatedIssuanceRecord, AttributeValueResponse, IssuanceResult, IssueAttributesRequest,
    ProtectionProofPayload, RootIssuanceRecord,
};
use crate::models::{
    value_type_of, Account, AttributeValueType, ConfidentialTarget, Identity, IssuerSchema,
    ReissuePolicy, SCHEME_FACE_IMAGE, SCHEME_PASSWORD, SCHEME_PLACE_OF_BIRTH,
};
use crate::services::biometric::FaceVerifier;
use crate::services::database::IdentityStore;
use crate::services::engine::{AssociatedAssetPacket, CommitmentEngine};
use crate::services::error::ServiceError;
use crate::services::metrics::record_issuance;
use crate::services::notifier::IssuanceNotifier;
use crate::services::schema::SchemaResolver;
use crate::services::validation::{validate_issuance_request, AttributeIssuance};
use chrono::NaiveDate;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-subject serialization of the find-or-create / check-and-commit
/// critical section. Two concurrent requests for the same root value must
/// never both observe an uncommitted root.
#[derive(Default)]
struct IssuanceLocks {
    inner: DashMap<(String, String, String), Arc<Mutex<()>>>,
}

impl IssuanceLocks {
    async fn acquire(
        &self,
        account_id: &str,
        attribute_name: &str,
        content: &str,
    ) -> OwnedMutexGuard<()> {
        let key = (
            account_id.to_string(),
            attribute_name.to_string(),
            content.to_string(),
        );
        let lock = self
            .inner
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        lock.lock_owned().await
    }
}

/// Result of one issuance request: the commitment records announced to
/// subscribers plus the attribute values echoed back to the caller.
#[derive(Debug)]
pub struct IssuanceOutcome {
    pub result: IssuanceResult,
    pub values: Vec<AttributeValueResponse>,
}

#[derive(Clone)]
pub struct IssuanceService {
    store: Arc<dyn IdentityStore>,
    engine: Arc<dyn CommitmentEngine>,
    notifier: Arc<dyn IssuanceNotifier>,
    face_verifier: Arc<dyn FaceVerifier>,
    schemas: SchemaResolver,
    locks: Arc<IssuanceLocks>,
}

impl IssuanceService {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        engine: Arc<dyn CommitmentEngine>,
        notifier: Arc<dyn IssuanceNotifier>,
        face_verifier: Arc<dyn FaceVerifier>,
    ) -> Self {
        Self {
            schemas: SchemaResolver::new(store.clone()),
            store,
            engine,
            notifier,
            face_verifier,
            locks: Arc::new(IssuanceLocks::default()),
        }
    }

    /// Issue the requested attributes under the given issuer account. With
    /// target holder keys present the root asset is transferred to the
    /// holder; without them everything is issued issuer-side as associated
    /// assets.
    #[tracing::instrument(skip(self, account, request), fields(account_id = %account.account_id))]
    pub async fn issue_attributes(
        &self,
        account: &Account,
        request: &IssueAttributesRequest,
    ) -> Result<IssuanceOutcome, ServiceError> {
        let issuer = account.public_spend_key.as_str();
        let schema = self.schemas.resolve(issuer).await?;
        let issuances = validate_issuance_request(&request.attributes, &schema)?;
        let target = decode_target(request)?;
        let path = if target.is_some() { "root" } else { "associated" };

        let root_issuance = issuances
            .iter()
            .find(|a| a.definition.is_root)
            .cloned()
            .ok_or_else(|| ServiceError::MissingRootValue(schema.root.attribute_name.clone()))?;

        // Biometric gate runs before any state is touched.
        if schema.has_scheme(SCHEME_FACE_IMAGE) {
            if let Some(image) = request.face_image.as_deref().filter(|i| !i.is_empty()) {
                if !self
                    .face_verifier
                    .verify(issuer, &root_issuance.value, image)
                    .await
                {
                    record_issuance(&account.account_id, path, "rejected");
                    return Err(ServiceError::FaceVerificationFailed);
                }
            }
        }

        let _guard = self
            .locks
            .acquire(
                &account.account_id,
                &schema.root.attribute_name,
                &root_issuance.value,
            )
            .await;

        let identity = self
            .resolve_or_create(account, &schema, &issuances, &root_issuance)
            .await?;

        let outcome = match &target {
            Some(target) => {
                self.issue_as_root(
                    account,
                    &schema,
                    &identity,
                    &issuances,
                    &root_issuance,
                    request.protection.as_ref(),
                    target,
                )
                .await
            }
            None => {
                self.issue_as_associated(account, &schema, &identity, &issuances, &root_issuance)
                    .await
            }
        };

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                record_issuance(&account.account_id, path, "failed");
                return Err(e);
            }
        };
        record_issuance(&account.account_id, path, "issued");

        // Best-effort broadcast; delivery failure never fails the request.
        if let Err(e) = self.notifier.publish(&account.account_id, &result).await {
            tracing::warn!(
                account_id = %account.account_id,
                error = %e,
                "Failed to publish issuance event"
            );
        }

        Ok(IssuanceOutcome {
            values: attribute_values(&issuances, &schema),
            result,
        })
    }

    /// Register an identity ahead of issuance, all attributes uncommitted.
    /// When the issuer has a root scheme, the protection attribute's content
    /// is pinned to the hex of the root asset identifier, appended if the
    /// caller did not supply one.
    pub async fn register_identity(
        &self,
        account: &Account,
        description: &str,
        attributes: &HashMap<String, String>,
    ) -> Result<Identity, ServiceError> {
        let issuer = account.public_spend_key.as_str();
        let mut entries: Vec<(String, String)> = attributes
            .iter()
            .map(|(name, content)| (name.clone(), content.clone()))
            .collect();
        entries.sort();

        match self.schemas.resolve(issuer).await {
            Ok(schema) => {
                let root_value = attributes.get(&schema.root.attribute_name).ok_or_else(|| {
                    ServiceError::MissingRootValue(schema.root.attribute_name.clone())
                })?;
                let root_asset_id = self
                    .engine
                    .derive_asset_id(&schema.root.scheme_name, root_value, issuer)
                    .await?;
                let pinned = hex::encode(root_asset_id);

                let protection_name = schema
                    .protection
                    .as_ref()
                    .map(|d| d.attribute_name.clone())
                    .unwrap_or_else(|| SCHEME_PASSWORD.to_string());
                if let Some(entry) = entries.iter_mut().find(|(name, _)| *name == protection_name)
                {
                    entry.1 = pinned;
                } else {
                    entries.push((protection_name, pinned));
                }
            }
            Err(ServiceError::NoRootScheme(_)) => {}
            Err(e) => return Err(e),
        }

        self.store
            .create_identity(&account.account_id, description, &entries)
            .await
    }

    async fn resolve_or_create(
        &self,
        account: &Account,
        schema: &IssuerSchema,
        issuances: &[AttributeIssuance],
        root: &AttributeIssuance,
    ) -> Result<Identity, ServiceError> {
        let existing = self
            .store
            .find_identity_by_attribute(&account.account_id, &schema.root.attribute_name, &root.value)
            .await?;
        if let Some(identity) = existing {
            return Ok(identity);
        }

        let attributes: Vec<(String, String)> = issuances
            .iter()
            .map(|a| (a.definition.attribute_name.clone(), a.value.clone()))
            .collect();
        self.store
            .create_identity(&account.account_id, &root.value, &attributes)
            .await?;

        // Re-read so the rest of the request works against the persisted
        // attribute ids.
        self.store
            .find_identity_by_attribute(&account.account_id, &schema.root.attribute_name, &root.value)
            .await?
            .ok_or_else(|| {
                ServiceError::Internal(anyhow::anyhow!("identity vanished after creation"))
            })
    }

    #[allow(clippy::too_many_arguments)]
    async fn issue_as_root(
        &self,
        account: &Account,
        schema: &IssuerSchema,
        identity: &Identity,
        issuances: &[AttributeIssuance],
        root: &AttributeIssuance,
        protection_proof: Option<&ProtectionProofPayload>,
        target: &ConfidentialTarget,
    ) -> Result<IssuanceResult, ServiceError> {
        let issuer = account.public_spend_key.as_str();
        let root_asset_id = self
            .engine
            .derive_asset_id(&schema.root.scheme_name, &root.value, issuer)
            .await?;

        let root_attribute = identity.attribute(&schema.root.attribute_name).ok_or_else(|| {
            ServiceError::Internal(anyhow::anyhow!("identity is missing its root attribute"))
        })?;

        let fresh = if !root_attribute.is_committed() {
            let originating = self.engine.issue_blinded(&root_asset_id, 0).await?;
            self.store
                .set_attribute_commitment(
                    &identity.identity_id,
                    &root_attribute.attribute_id,
                    &originating,
                )
                .await?
        } else {
            false
        };

        let mut associated = Vec::new();
        if fresh {
            let non_root: Vec<_> = issuances
                .iter()
                .filter(|a| !a.definition.is_root)
                .cloned()
                .collect();
            associated = self
                .issue_associated_batch(issuer, identity, &non_root, Some(root_asset_id.clone()))
                .await?;
        } else {
            self.enforce_reissue_guard(account, schema, identity, protection_proof)
                .await?;
        }

        let packet = self
            .engine
            .transfer_to_holder(&root_asset_id, target)
            .await?
            .ok_or_else(|| {
                tracing::error!(
                    account_id = %account.account_id,
                    "Failed to transfer root attribute asset"
                );
                ServiceError::RootTransferFailed
            })?;

        self.store
            .set_identity_target(
                &identity.identity_id,
                &hex::encode(&target.public_spend_key),
                &hex::encode(&target.public_view_key),
            )
            .await?;

        let originating_commitment = packet.surjection_commitments.first().ok_or_else(|| {
            ServiceError::Internal(anyhow::anyhow!(
                "transfer packet carries no surjection commitments"
            ))
        })?;
        let signature_s = packet.ring_signature.s.first().ok_or_else(|| {
            ServiceError::Internal(anyhow::anyhow!(
                "transfer packet carries no ring signature scalars"
            ))
        })?;

        Ok(IssuanceResult {
            root: Some(RootIssuanceRecord {
                attribute_name: root_attribute.attribute_name.clone(),
                originating_commitment: hex::encode(originating_commitment),
                asset_commitment: hex::encode(&packet.asset_commitment),
                surjection_proof: format!(
                    "{}{}",
                    hex::encode(&packet.ring_signature.e),
                    hex::encode(signature_s)
                ),
            }),
            associated,
        })
    }

    /// Re-issuance of an already-committed root. With a protection attribute
    /// configured the caller must present a valid proof over its stored
    /// commitment; without one the schema permits re-issuance outright.
    async fn enforce_reissue_guard(
        &self,
        account: &Account,
        schema: &IssuerSchema,
        identity: &Identity,
        proof: Option<&ProtectionProofPayload>,
    ) -> Result<(), ServiceError> {
        match schema.reissue_policy {
            ReissuePolicy::AllowUnprotected => {
                tracing::debug!(
                    account_id = %account.account_id,
                    "No protection attribute configured; re-issuance permitted"
                );
                Ok(())
            }
            ReissuePolicy::RequireProtectionProof => {
                let protection = schema.protection.as_ref().ok_or_else(|| {
                    ServiceError::Internal(anyhow::anyhow!(
                        "protection policy without a protection definition"
                    ))
                })?;

                let Some(stored) = identity
                    .attribute(&protection.attribute_name)
                    .and_then(|a| a.commitment.as_deref())
                else {
                    // Identity predates the protection attribute; there is
                    // no commitment to verify against.
                    tracing::warn!(
                        account_id = %account.account_id,
                        identity_id = %identity.identity_id,
                        "Protection attribute has no stored commitment; re-issuance permitted"
                    );
                    return Ok(());
                };

                let proof = proof.ok_or(ServiceError::MissingProtectionProof)?;
                let signature_e = decode_hex("protection.signature_e", &proof.signature_e)?;
                let signature_s = decode_hex("protection.signature_s", &proof.signature_s)?;
                let session_commitment =
                    decode_hex("protection.session_commitment", &proof.session_commitment)?;

                let valid = self
                    .engine
                    .verify_proof(stored, &signature_e, &signature_s, &session_commitment)
                    .await?;
                if !valid {
                    tracing::warn!(
                        account_id = %account.account_id,
                        "Failed to verify protection attribute proof"
                    );
                    return Err(ServiceError::ProtectionVerificationFailed);
                }

                Ok(())
            }
        }
    }

    async fn issue_as_associated(
        &self,
        account: &Account,
        schema: &IssuerSchema,
        identity: &Identity,
        issuances: &[AttributeIssuance],
        root: &AttributeIssuance,
    ) -> Result<IssuanceResult, ServiceError> {
        let issuer = account.public_spend_key.as_str();

        // The root is committed first as an associated asset of its own,
        // carrying its own blinding points.
        let packet = self
            .issue_single_associated(
                issuer,
                &schema.root.scheme_name,
                &root.value,
                &root.blinding_point_value,
                &root.blinding_point_root,
            )
            .await?;

        let root_attribute = identity.attribute(&schema.root.attribute_name).ok_or_else(|| {
            ServiceError::Internal(anyhow::anyhow!("identity is missing its root attribute"))
        })?;
        self.persist_commitment(identity, &root_attribute.attribute_id, &packet.asset_commitment)
            .await?;

        let mut records = vec![AssociatedIssuanceRecord {
            attribute_name: root_attribute.attribute_name.clone(),
            asset_commitment: hex::encode(&packet.asset_commitment),
            binding_to_root_commitment: hex::encode(&packet.root_binding_commitment),
        }];

        let root_asset_id = self
            .engine
            .derive_asset_id_by_scheme_id(schema.root.scheme_id, &root.value)
            .await?;
        let batch = self
            .issue_associated_batch(issuer, identity, issuances, Some(root_asset_id))
            .await?;
        records.extend(batch);

        Ok(IssuanceResult {
            root: None,
            associated: records,
        })
    }

    /// Issue a batch of attributes as associated assets bound to a root. A
    /// root entry in the batch is always issued first, and its freshly
    /// derived asset identifier supersedes the caller-provided one.
    async fn issue_associated_batch(
        &self,
        issuer: &str,
        identity: &Identity,
        issuances: &[AttributeIssuance],
        root_asset_id: Option<Vec<u8>>,
    ) -> Result<Vec<AssociatedIssuanceRecord>, ServiceError> {
        let mut records = Vec::new();
        let mut root_asset_id = root_asset_id;

        if let Some(root) = issuances.iter().find(|a| a.definition.is_root) {
            let packet = self
                .issue_single_associated(
                    issuer,
                    &root.definition.scheme_name,
                    &root.value,
                    &root.blinding_point_value,
                    &root.blinding_point_root,
                )
                .await?;

            let attribute = identity
                .attribute(&root.definition.attribute_name)
                .ok_or_else(|| {
                    ServiceError::Internal(anyhow::anyhow!("identity is missing a batch attribute"))
                })?;
            self.persist_commitment(identity, &attribute.attribute_id, &packet.asset_commitment)
                .await?;

            records.push(AssociatedIssuanceRecord {
                attribute_name: root.definition.attribute_name.clone(),
                asset_commitment: hex::encode(&packet.asset_commitment),
                binding_to_root_commitment: hex::encode(&packet.root_binding_commitment),
            });

            root_asset_id = Some(
                self.engine
                    .derive_asset_id_by_scheme_id(root.definition.scheme_id, &root.value)
                    .await?,
            );
        }

        let root_asset_id = root_asset_id.ok_or_else(|| {
            ServiceError::Internal(anyhow::anyhow!(
                "an associated batch needs a root asset identifier or a root entry"
            ))
        })?;

        for issuance in issuances.iter().filter(|a| !a.definition.is_root) {
            let folded_root = self
                .engine
                .blind_asset(&root_asset_id, &issuance.blinding_point_root)
                .await?;
            let packet = self
                .issue_single_associated(
                    issuer,
                    &issuance.definition.scheme_name,
                    &issuance.value,
                    &issuance.blinding_point_value,
                    &folded_root,
                )
                .await?;

            let attribute = identity
                .attribute(&issuance.definition.attribute_name)
                .ok_or_else(|| {
                    ServiceError::Internal(anyhow::anyhow!("identity is missing a batch attribute"))
                })?;
            self.persist_commitment(identity, &attribute.attribute_id, &packet.asset_commitment)
                .await?;

            records.push(AssociatedIssuanceRecord {
                attribute_name: issuance.definition.attribute_name.clone(),
                asset_commitment: hex::encode(&packet.asset_commitment),
                binding_to_root_commitment: hex::encode(&packet.root_binding_commitment),
            });
        }

        Ok(records)
    }

    async fn issue_single_associated(
        &self,
        issuer: &str,
        scheme_name: &str,
        content: &str,
        blinding_point_value: &[u8],
        blinding_point_root: &[u8],
    ) -> Result<AssociatedAssetPacket, ServiceError> {
        let asset_id = self
            .engine
            .derive_asset_id(scheme_name, content, issuer)
            .await?;
        let qualifier = group_qualifier(scheme_name, content)?;
        let group_id = self
            .engine
            .derive_group_id(scheme_name, qualifier.as_deref(), issuer)
            .await?;

        Ok(self
            .engine
            .issue_associated(&asset_id, &group_id, blinding_point_value, blinding_point_root)
            .await?)
    }

    async fn persist_commitment(
        &self,
        identity: &Identity,
        attribute_id: &str,
        commitment: &[u8],
    ) -> Result<(), ServiceError> {
        let written = self
            .store
            .set_attribute_commitment(&identity.identity_id, attribute_id, commitment)
            .await?;
        if !written {
            tracing::debug!(
                identity_id = %identity.identity_id,
                attribute_id = %attribute_id,
                "Attribute already carries a commitment; keeping the original"
            );
        }
        Ok(())
    }
}

fn decode_target(
    request: &IssueAttributesRequest,
) -> Result<Option<ConfidentialTarget>, ServiceError> {
    let spend = request.public_spend_key.as_deref().filter(|k| !k.is_empty());
    let view = request.public_view_key.as_deref().filter(|k| !k.is_empty());

    match (spend, view) {
        (Some(spend), Some(view)) => Ok(Some(ConfidentialTarget {
            public_spend_key: decode_hex("public_spend_key", spend)?,
            public_view_key: decode_hex("public_view_key", view)?,
        })),
        (None, None) => Ok(None),
        _ => Err(ServiceError::IncompleteTargetKeys),
    }
}

fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>, ServiceError> {
    hex::decode(value).map_err(|_| ServiceError::InvalidEncoding(field.to_string()))
}

/// Anonymity-set qualifier for an attribute: date schemes group by calendar
/// date, place of birth by its content, everything else by scheme alone.
fn group_qualifier(scheme_name: &str, content: &str) -> Result<Option<String>, ServiceError> {
    match value_type_of(scheme_name) {
        AttributeValueType::Date => {
            let date = NaiveDate::parse_from_str(content, "%Y-%m-%d").map_err(|_| {
                ServiceError::InvalidAttributeValue {
                    name: scheme_name.to_string(),
                    reason: format!("'{}' is not a yyyy-mm-dd date", content),
                }
            })?;
            Ok(Some(date.format("%Y-%m-%d").to_string()))
        }
        _ => {
            if scheme_name == SCHEME_PLACE_OF_BIRTH {
                Ok(Some(content.to_string()))
            } else {
                Ok(None)
            }
        }
    }
}

/// Attribute values echoed to the caller; the protection attribute never
/// leaves the service.
fn attribute_values(
    issuances: &[AttributeIssuance],
    schema: &IssuerSchema,
) -> Vec<AttributeValueResponse> {
    let protection_name = schema.protection.as_ref().map(|d| d.attribute_name.as_str());

    issuances
        .iter()
        .filter(|a| Some(a.definition.attribute_name.as_str()) != protection_name)
        .map(|a| AttributeValueResponse {
            value: a.value.clone(),
            definition: (&a.definition).into(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::schema::{SCHEME_DATE_OF_BIRTH, SCHEME_NATIONALITY};

    #[test]
    fn date_schemes_group_by_calendar_date() {
        let qualifier = group_qualifier(SCHEME_DATE_OF_BIRTH, "1990-01-01").unwrap();
        assert_eq!(qualifier.as_deref(), Some("1990-01-01"));
    }

    #[test]
    fn malformed_dates_are_rejected() {
        let err = group_qualifier(SCHEME_DATE_OF_BIRTH, "01/01/1990").unwrap_err();
        assert!(matches!(err, ServiceError::InvalidAttributeValue { .. }));
    }

    #[test]
    fn place_of_birth_groups_by_content() {
        let qualifier = group_qualifier(SCHEME_PLACE_OF_BIRTH, "London").unwrap();
        assert_eq!(qualifier.as_deref(), Some("London"));
    }

    #[test]
    fn other_schemes_group_by_scheme_alone() {
        let qualifier = group_qualifier(SCHEME_NATIONALITY, "GB").unwrap();
        assert!(qualifier.is_none());
    }
}
