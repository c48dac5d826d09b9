pub mod accounts;
pub mod biometric;
pub mod database;
pub mod engine;
pub mod error;
pub mod external_idp;
pub mod issuance;
pub mod metrics;
pub mod notifier;
pub mod schema;
pub mod validation;

pub use accounts::{AccountDb, AccountDirectory, MockAccountDirectory};
pub use biometric::{FaceVerifier, HttpFaceVerifier, MockFaceVerifier};
pub use database::{IdentityDb, IdentityStore, InMemoryIdentityStore};
pub use engine::{
    AssociatedAssetPacket, CommitmentEngine, EngineError, MockCommitmentEngine,
    RemoteCommitmentEngine, RingSignature, TransferPacket,
};
pub use error::ServiceError;
pub use external_idp::{
    AdapterRegistry, DocScanAdapter, DocumentAdapter, ADAPTER_DOCSCAN_DRIVING_LICENSE,
    ADAPTER_DOCSCAN_PASSPORT,
};
pub use issuance::{IssuanceOutcome, IssuanceService};
pub use metrics::{get_metrics, init_metrics, record_engine_call, record_issuance};
pub use notifier::{IssuanceNotifier, MockNotifier, NotifierError, WebhookNotifier};
pub use schema::SchemaResolver;
pub use validation::{validate_issuance_request, AttributeIssuance};
