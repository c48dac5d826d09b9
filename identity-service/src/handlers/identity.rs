//! Identity registration and inspection endpoints.

use crate::dtos::{CreateIdentityRequest, IdentityResponse};
use crate::services::ServiceError;
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

pub async fn create_identity(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
    Json(request): Json<CreateIdentityRequest>,
) -> Result<(StatusCode, Json<IdentityResponse>), AppError> {
    request.validate()?;

    let account = state
        .accounts
        .get_by_id(&account_id)
        .await?
        .ok_or_else(|| ServiceError::AccountNotFound(account_id.clone()))?;

    if !account.is_identity_provider() {
        return Err(ServiceError::UnexpectedAccountType(account_id).into());
    }

    let identity = state
        .issuance
        .register_identity(&account, &request.description, &request.attributes)
        .await?;

    tracing::info!(
        identity_id = %identity.identity_id,
        account_id = %account.account_id,
        "Identity registered"
    );

    Ok((StatusCode::CREATED, Json(IdentityResponse::from(&identity))))
}

pub async fn get_identity(
    State(state): State<AppState>,
    Path(identity_id): Path<String>,
) -> Result<Json<IdentityResponse>, AppError> {
    let identity = state
        .store
        .get_identity(&identity_id)
        .await?
        .ok_or(ServiceError::IdentityNotFound(identity_id))?;

    Ok(Json(IdentityResponse::from(&identity)))
}

pub async fn list_identities(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Result<Json<Vec<IdentityResponse>>, AppError> {
    let identities = state.store.list_identities(&account_id).await?;
    Ok(Json(identities.iter().map(IdentityResponse::from).collect()))
}
