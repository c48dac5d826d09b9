//! The issuance endpoint: accepts an attribute map with blinding points,
//! optional protection proof material, and optional target holder keys.

use crate::dtos::{AttributeValueResponse, IssueAttributesRequest};
use crate::services::ServiceError;
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;
use validator::Validate;

#[tracing::instrument(skip(state, request), fields(issuer = %issuer))]
pub async fn issue_attributes(
    State(state): State<AppState>,
    Path(issuer): Path<String>,
    Json(request): Json<IssueAttributesRequest>,
) -> Result<Json<Vec<AttributeValueResponse>>, AppError> {
    request.validate()?;

    let account = state
        .accounts
        .get_by_public_key(&issuer)
        .await?
        .ok_or_else(|| ServiceError::AccountNotFound(issuer.clone()))?;

    if !account.is_identity_provider() {
        return Err(ServiceError::UnexpectedAccountType(account.account_id).into());
    }

    let outcome = state.issuance.issue_attributes(&account, &request).await?;

    Ok(Json(outcome.values))
}
