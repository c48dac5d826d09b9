//! Commitment engine capability: asset-id derivation, blinded issuance,
//! root binding, holder transfer, and proof verification. The real engine is
//! a remote service; a deterministic mock lives beside it for tests and
//! disabled deployments.

use crate::models::ConfidentialTarget;
use crate::services::metrics::record_engine_call;
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Engine rejected request: {0}")]
    Rejected(String),

    #[error("Invalid engine response: {0}")]
    InvalidResponse(String),
}

/// Commitment pair produced for an associated attribute: the blinded asset
/// commitment itself plus the commitment proving binding to the root asset.
#[derive(Debug, Clone)]
pub struct AssociatedAssetPacket {
    pub asset_commitment: Vec<u8>,
    pub root_binding_commitment: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct RingSignature {
    pub e: Vec<u8>,
    pub s: Vec<Vec<u8>>,
}

/// Result of transferring a root asset to an external holder.
#[derive(Debug, Clone)]
pub struct TransferPacket {
    pub asset_commitment: Vec<u8>,
    pub surjection_commitments: Vec<Vec<u8>>,
    pub ring_signature: RingSignature,
}

#[async_trait]
pub trait CommitmentEngine: Send + Sync {
    /// Deterministic asset identifier for (scheme, content, issuer).
    async fn derive_asset_id(
        &self,
        scheme_name: &str,
        content: &str,
        issuer: &str,
    ) -> Result<Vec<u8>, EngineError>;

    /// Same derivation keyed by the numeric scheme id. Must agree with
    /// [`CommitmentEngine::derive_asset_id`] for the same logical scheme.
    async fn derive_asset_id_by_scheme_id(
        &self,
        scheme_id: i64,
        content: &str,
    ) -> Result<Vec<u8>, EngineError>;

    /// Anonymity-set grouping identifier. The qualifier narrows the group
    /// (calendar date, place-of-birth content); `None` groups by scheme.
    async fn derive_group_id(
        &self,
        scheme_name: &str,
        qualifier: Option<&str>,
        issuer: &str,
    ) -> Result<Vec<u8>, EngineError>;

    /// Issue a blinded commitment of the given amount for an asset,
    /// returning the originating commitment.
    async fn issue_blinded(&self, asset_id: &[u8], amount: u64) -> Result<Vec<u8>, EngineError>;

    /// Issue an associated blinded asset bound to a root via the two
    /// blinding points.
    async fn issue_associated(
        &self,
        asset_id: &[u8],
        group_id: &[u8],
        blinding_point_value: &[u8],
        blinding_point_root: &[u8],
    ) -> Result<AssociatedAssetPacket, EngineError>;

    /// Fold a caller-supplied blinding point into an asset identifier.
    async fn blind_asset(
        &self,
        asset_id: &[u8],
        blinding_point: &[u8],
    ) -> Result<Vec<u8>, EngineError>;

    /// Transfer the asset to the holder's key pair. `None` means the engine
    /// could not produce a transfer packet.
    async fn transfer_to_holder(
        &self,
        asset_id: &[u8],
        target: &ConfidentialTarget,
    ) -> Result<Option<TransferPacket>, EngineError>;

    /// Verify a ring-style surjection proof over a stored commitment and a
    /// caller-presented session commitment.
    async fn verify_proof(
        &self,
        commitment: &[u8],
        signature_e: &[u8],
        signature_s: &[u8],
        session_commitment: &[u8],
    ) -> Result<bool, EngineError>;

    async fn health_check(&self) -> Result<(), EngineError>;
}

// ============================================================================
// Remote engine
// ============================================================================

pub struct RemoteCommitmentEngine {
    base_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct AssetIdRequest<'a> {
    scheme_name: &'a str,
    content: &'a str,
    issuer: &'a str,
}

#[derive(Debug, Serialize)]
struct AssetIdBySchemeRequest<'a> {
    scheme_id: i64,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct GroupIdRequest<'a> {
    scheme_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    qualifier: Option<&'a str>,
    issuer: &'a str,
}

#[derive(Debug, Deserialize)]
struct DerivedIdResponse {
    id: String,
}

#[derive(Debug, Serialize)]
struct BlindedAssetRequest<'a> {
    asset_id: &'a str,
    amount: u64,
}

#[derive(Debug, Deserialize)]
struct CommitmentResponse {
    commitment: String,
}

#[derive(Debug, Serialize)]
struct AssociatedAssetRequest<'a> {
    asset_id: &'a str,
    group_id: &'a str,
    blinding_point_value: &'a str,
    blinding_point_root: &'a str,
}

#[derive(Debug, Deserialize)]
struct AssociatedAssetResponse {
    asset_commitment: String,
    root_binding_commitment: String,
}

#[derive(Debug, Serialize)]
struct BlindAssetRequest<'a> {
    asset_id: &'a str,
    blinding_point: &'a str,
}

#[derive(Debug, Serialize)]
struct TransferRequest<'a> {
    asset_id: &'a str,
    public_spend_key: &'a str,
    public_view_key: &'a str,
}

#[derive(Debug, Deserialize)]
struct TransferResponse {
    packet: Option<TransferPacketResponse>,
}

#[derive(Debug, Deserialize)]
struct TransferPacketResponse {
    asset_commitment: String,
    surjection_commitments: Vec<String>,
    signature_e: String,
    signature_s: Vec<String>,
}

#[derive(Debug, Serialize)]
struct VerifyProofRequest<'a> {
    commitment: &'a str,
    signature_e: &'a str,
    signature_s: &'a str,
    session_commitment: &'a str,
}

#[derive(Debug, Deserialize)]
struct VerifyProofResponse {
    valid: bool,
}

impl RemoteCommitmentEngine {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    async fn post<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        operation: &str,
        request: &Req,
    ) -> Result<Resp, EngineError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                record_engine_call(operation, "connection_error");
                EngineError::Connection(format!("Failed to reach commitment engine: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            record_engine_call(operation, "rejected");
            return Err(EngineError::Rejected(format!(
                "{} returned status {}: {}",
                operation, status, body
            )));
        }

        let parsed = response.json::<Resp>().await.map_err(|e| {
            record_engine_call(operation, "invalid_response");
            EngineError::InvalidResponse(format!("Failed to parse {} response: {}", operation, e))
        })?;

        record_engine_call(operation, "ok");
        Ok(parsed)
    }
}

fn decode_hex_field(field: &str, value: &str) -> Result<Vec<u8>, EngineError> {
    hex::decode(value)
        .map_err(|e| EngineError::InvalidResponse(format!("field '{}' is not hex: {}", field, e)))
}

#[async_trait]
impl CommitmentEngine for RemoteCommitmentEngine {
    async fn derive_asset_id(
        &self,
        scheme_name: &str,
        content: &str,
        issuer: &str,
    ) -> Result<Vec<u8>, EngineError> {
        let response: DerivedIdResponse = self
            .post(
                "/v1/asset-id",
                "derive_asset_id",
                &AssetIdRequest { scheme_name, content, issuer },
            )
            .await?;
        decode_hex_field("id", &response.id)
    }

    async fn derive_asset_id_by_scheme_id(
        &self,
        scheme_id: i64,
        content: &str,
    ) -> Result<Vec<u8>, EngineError> {
        let response: DerivedIdResponse = self
            .post(
                "/v1/asset-id-by-scheme",
                "derive_asset_id_by_scheme_id",
                &AssetIdBySchemeRequest { scheme_id, content },
            )
            .await?;
        decode_hex_field("id", &response.id)
    }

    async fn derive_group_id(
        &self,
        scheme_name: &str,
        qualifier: Option<&str>,
        issuer: &str,
    ) -> Result<Vec<u8>, EngineError> {
        let response: DerivedIdResponse = self
            .post(
                "/v1/group-id",
                "derive_group_id",
                &GroupIdRequest { scheme_name, qualifier, issuer },
            )
            .await?;
        decode_hex_field("id", &response.id)
    }

    async fn issue_blinded(&self, asset_id: &[u8], amount: u64) -> Result<Vec<u8>, EngineError> {
        let response: CommitmentResponse = self
            .post(
                "/v1/blinded-asset",
                "issue_blinded",
                &BlindedAssetRequest { asset_id: &hex::encode(asset_id), amount },
            )
            .await?;
        decode_hex_field("commitment", &response.commitment)
    }

    async fn issue_associated(
        &self,
        asset_id: &[u8],
        group_id: &[u8],
        blinding_point_value: &[u8],
        blinding_point_root: &[u8],
    ) -> Result<AssociatedAssetPacket, EngineError> {
        let response: AssociatedAssetResponse = self
            .post(
                "/v1/associated-asset",
                "issue_associated",
                &AssociatedAssetRequest {
                    asset_id: &hex::encode(asset_id),
                    group_id: &hex::encode(group_id),
                    blinding_point_value: &hex::encode(blinding_point_value),
                    blinding_point_root: &hex::encode(blinding_point_root),
                },
            )
            .await?;

        Ok(AssociatedAssetPacket {
            asset_commitment: decode_hex_field("asset_commitment", &response.asset_commitment)?,
            root_binding_commitment: decode_hex_field(
                "root_binding_commitment",
                &response.root_binding_commitment,
            )?,
        })
    }

    async fn blind_asset(
        &self,
        asset_id: &[u8],
        blinding_point: &[u8],
    ) -> Result<Vec<u8>, EngineError> {
        let response: CommitmentResponse = self
            .post(
                "/v1/blind-commitment",
                "blind_asset",
                &BlindAssetRequest {
                    asset_id: &hex::encode(asset_id),
                    blinding_point: &hex::encode(blinding_point),
                },
            )
            .await?;
        decode_hex_field("commitment", &response.commitment)
    }

    async fn transfer_to_holder(
        &self,
        asset_id: &[u8],
        target: &ConfidentialTarget,
    ) -> Result<Option<TransferPacket>, EngineError> {
        let response: TransferResponse = self
            .post(
                "/v1/transfer",
                "transfer_to_holder",
                &TransferRequest {
                    asset_id: &hex::encode(asset_id),
                    public_spend_key: &hex::encode(&target.public_spend_key),
                    public_view_key: &hex::encode(&target.public_view_key),
                },
            )
            .await?;

        let Some(packet) = response.packet else {
            return Ok(None);
        };

        Ok(Some(TransferPacket {
            asset_commitment: decode_hex_field("asset_commitment", &packet.asset_commitment)?,
            surjection_commitments: packet
                .surjection_commitments
                .iter()
                .map(|c| decode_hex_field("surjection_commitments", c))
                .collect::<Result<_, _>>()?,
            ring_signature: RingSignature {
                e: decode_hex_field("signature_e", &packet.signature_e)?,
                s: packet
                    .signature_s
                    .iter()
                    .map(|s| decode_hex_field("signature_s", s))
                    .collect::<Result<_, _>>()?,
            },
        }))
    }

    async fn verify_proof(
        &self,
        commitment: &[u8],
        signature_e: &[u8],
        signature_s: &[u8],
        session_commitment: &[u8],
    ) -> Result<bool, EngineError> {
        let response: VerifyProofResponse = self
            .post(
                "/v1/verify-proof",
                "verify_proof",
                &VerifyProofRequest {
                    commitment: &hex::encode(commitment),
                    signature_e: &hex::encode(signature_e),
                    signature_s: &hex::encode(signature_s),
                    session_commitment: &hex::encode(session_commitment),
                },
            )
            .await?;
        Ok(response.valid)
    }

    async fn health_check(&self) -> Result<(), EngineError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EngineError::Connection(format!("Engine health check failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(EngineError::Rejected(format!(
                "Engine health check returned status {}",
                response.status()
            )));
        }

        Ok(())
    }
}

// ============================================================================
// Mock engine
// ============================================================================

/// Deterministic in-process engine used by tests and deployments without a
/// configured engine endpoint. Derivations are SHA-256 over domain-tagged
/// inputs, so every identifier and commitment is reproducible.
pub struct MockCommitmentEngine {
    schemes: DashMap<i64, (String, String)>,
    fail_transfer: AtomicBool,
    blinded_issued: AtomicU64,
    associated_issued: AtomicU64,
    transfers: AtomicU64,
}

impl Default for MockCommitmentEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCommitmentEngine {
    pub fn new() -> Self {
        Self {
            schemes: DashMap::new(),
            fail_transfer: AtomicBool::new(false),
            blinded_issued: AtomicU64::new(0),
            associated_issued: AtomicU64::new(0),
            transfers: AtomicU64::new(0),
        }
    }

    /// Register a scheme so the id-keyed derivation can agree with the
    /// name-keyed one.
    pub fn register_scheme(&self, scheme_id: i64, scheme_name: &str, issuer: &str) {
        self.schemes
            .insert(scheme_id, (scheme_name.to_string(), issuer.to_string()));
    }

    pub fn fail_transfers(&self, fail: bool) {
        self.fail_transfer.store(fail, Ordering::SeqCst);
    }

    pub fn blinded_issued(&self) -> u64 {
        self.blinded_issued.load(Ordering::SeqCst)
    }

    pub fn associated_issued(&self) -> u64 {
        self.associated_issued.load(Ordering::SeqCst)
    }

    pub fn transfers(&self) -> u64 {
        self.transfers.load(Ordering::SeqCst)
    }

    fn digest(parts: &[&[u8]]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
            hasher.update([0u8]);
        }
        hasher.finalize().to_vec()
    }

    /// The signature_e the mock accepts for a protection commitment and
    /// session commitment pair.
    pub fn protection_signature(commitment: &[u8], session_commitment: &[u8]) -> Vec<u8> {
        Self::digest(&[b"protect", commitment, session_commitment])
    }

    /// The binding commitment the mock produces for a folded root
    /// commitment; lets tests verify bindings independently.
    pub fn expected_binding(folded_root: &[u8]) -> Vec<u8> {
        Self::digest(&[b"bind", folded_root])
    }

    pub fn expected_blind(asset_id: &[u8], blinding_point: &[u8]) -> Vec<u8> {
        Self::digest(&[b"blindpt", asset_id, blinding_point])
    }
}

#[async_trait]
impl CommitmentEngine for MockCommitmentEngine {
    async fn derive_asset_id(
        &self,
        scheme_name: &str,
        content: &str,
        issuer: &str,
    ) -> Result<Vec<u8>, EngineError> {
        Ok(Self::digest(&[
            b"asset",
            scheme_name.as_bytes(),
            content.as_bytes(),
            issuer.as_bytes(),
        ]))
    }

    async fn derive_asset_id_by_scheme_id(
        &self,
        scheme_id: i64,
        content: &str,
    ) -> Result<Vec<u8>, EngineError> {
        let entry = self
            .schemes
            .get(&scheme_id)
            .ok_or_else(|| EngineError::Rejected(format!("unknown scheme id {}", scheme_id)))?;
        let (scheme_name, issuer) = entry.value().clone();
        self.derive_asset_id(&scheme_name, content, &issuer).await
    }

    async fn derive_group_id(
        &self,
        scheme_name: &str,
        qualifier: Option<&str>,
        issuer: &str,
    ) -> Result<Vec<u8>, EngineError> {
        Ok(Self::digest(&[
            b"group",
            scheme_name.as_bytes(),
            qualifier.unwrap_or("").as_bytes(),
            issuer.as_bytes(),
        ]))
    }

    async fn issue_blinded(&self, asset_id: &[u8], amount: u64) -> Result<Vec<u8>, EngineError> {
        self.blinded_issued.fetch_add(1, Ordering::SeqCst);
        Ok(Self::digest(&[b"blinded", asset_id, &amount.to_le_bytes()]))
    }

    async fn issue_associated(
        &self,
        asset_id: &[u8],
        group_id: &[u8],
        blinding_point_value: &[u8],
        blinding_point_root: &[u8],
    ) -> Result<AssociatedAssetPacket, EngineError> {
        self.associated_issued.fetch_add(1, Ordering::SeqCst);
        Ok(AssociatedAssetPacket {
            asset_commitment: Self::digest(&[b"assoc", asset_id, group_id, blinding_point_value]),
            root_binding_commitment: Self::digest(&[b"bind", blinding_point_root]),
        })
    }

    async fn blind_asset(
        &self,
        asset_id: &[u8],
        blinding_point: &[u8],
    ) -> Result<Vec<u8>, EngineError> {
        Ok(Self::expected_blind(asset_id, blinding_point))
    }

    async fn transfer_to_holder(
        &self,
        asset_id: &[u8],
        target: &ConfidentialTarget,
    ) -> Result<Option<TransferPacket>, EngineError> {
        if self.fail_transfer.load(Ordering::SeqCst) {
            return Ok(None);
        }

        self.transfers.fetch_add(1, Ordering::SeqCst);
        Ok(Some(TransferPacket {
            asset_commitment: Self::digest(&[b"transfer", asset_id, &target.public_spend_key]),
            surjection_commitments: vec![Self::digest(&[b"orig", asset_id])],
            ring_signature: RingSignature {
                e: Self::digest(&[b"sig-e", asset_id]),
                s: vec![Self::digest(&[b"sig-s", asset_id])],
            },
        }))
    }

    async fn verify_proof(
        &self,
        commitment: &[u8],
        signature_e: &[u8],
        _signature_s: &[u8],
        session_commitment: &[u8],
    ) -> Result<bool, EngineError> {
        Ok(signature_e == Self::protection_signature(commitment, session_commitment))
    }

    async fn health_check(&self) -> Result<(), EngineError> {
        Ok(())
    }
}
