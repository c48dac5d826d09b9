//! Document translation endpoint: validates a raw external-document payload
//! with the provider's adapter and translates it into an attribute map ready
//! for issuance.

use crate::dtos::TranslationResponse;
use crate::services::ServiceError;
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;

pub async fn translate_document(
    State(state): State<AppState>,
    Path(provider_name): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<TranslationResponse>, AppError> {
    let binding = state
        .store
        .find_external_provider(&provider_name)
        .await?
        .ok_or_else(|| ServiceError::UnknownAdapter(provider_name.clone()))?;

    let account = state
        .accounts
        .get_by_id(&binding.account_id)
        .await?
        .ok_or_else(|| ServiceError::AccountNotFound(binding.account_id.clone()))?;

    let adapter = state.adapters.get(&provider_name)?;
    adapter.validate(&payload)?;
    let attributes = adapter.translate(&payload)?;

    let action_uri = format!(
        "{}/api/issuers/{}/attributes",
        state.config.public_base_url, account.public_spend_key
    );

    Ok(Json(TranslationResponse {
        issuer: account.public_spend_key.clone(),
        action_uri,
        attributes,
    }))
}
