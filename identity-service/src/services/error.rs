use crate::services::engine::EngineError;
use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Account {0} not found")]
    AccountNotFound(String),

    #[error("Account {0} is not an identity provider")]
    UnexpectedAccountType(String),

    #[error("Identity {0} not found")]
    IdentityNotFound(String),

    #[error("No root attribute scheme is defined for issuer {0}")]
    NoRootScheme(String),

    #[error("Attribute names are not supported: {0}")]
    UnknownAttributes(String),

    #[error("A value for the root attribute '{0}' is required")]
    MissingRootValue(String),

    #[error("Field '{0}' is not valid hex")]
    InvalidEncoding(String),

    #[error("Invalid value for attribute '{name}': {reason}")]
    InvalidAttributeValue { name: String, reason: String },

    #[error("Both public_spend_key and public_view_key are required to transfer the root asset")]
    IncompleteTargetKeys,

    #[error("Unknown document adapter '{0}'")]
    UnknownAdapter(String),

    #[error("Document payload rejected: {0}")]
    DocumentRejected(String),

    #[error("Protection proof material is required to re-issue this root attribute")]
    MissingProtectionProof,

    #[error("Failed to verify the protection attribute proof")]
    ProtectionVerificationFailed,

    #[error("Captured face does not match the registered one")]
    FaceVerificationFailed,

    #[error("Failed to transfer the root attribute asset")]
    RootTransferFailed,

    #[error("Commitment engine error: {0}")]
    Engine(#[from] EngineError),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::AccountNotFound(id) => {
                AppError::NotFound(anyhow::anyhow!("Account {} not found", id))
            }
            ServiceError::UnexpectedAccountType(id) => {
                AppError::BadRequest(anyhow::anyhow!("Account {} is not an identity provider", id))
            }
            ServiceError::IdentityNotFound(id) => {
                AppError::NotFound(anyhow::anyhow!("Identity {} not found", id))
            }
            ServiceError::NoRootScheme(issuer) => AppError::ConfigError(anyhow::anyhow!(
                "No root attribute scheme is defined for issuer {}",
                issuer
            )),
            e @ (ServiceError::UnknownAttributes(_)
            | ServiceError::MissingRootValue(_)
            | ServiceError::InvalidEncoding(_)
            | ServiceError::InvalidAttributeValue { .. }
            | ServiceError::IncompleteTargetKeys
            | ServiceError::UnknownAdapter(_)
            | ServiceError::DocumentRejected(_)
            | ServiceError::MissingProtectionProof) => {
                AppError::BadRequest(anyhow::anyhow!(e.to_string()))
            }
            e @ (ServiceError::ProtectionVerificationFailed
            | ServiceError::FaceVerificationFailed) => {
                AppError::Unauthorized(anyhow::anyhow!(e.to_string()))
            }
            ServiceError::RootTransferFailed => {
                AppError::BadGateway("failed to transfer the root attribute asset".to_string())
            }
            ServiceError::Engine(e) => AppError::BadGateway(e.to_string()),
        }
    }
}
