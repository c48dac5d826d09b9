//! Identity-provider discovery: provider listing, attribute schemas, and
//! issuance action details.

use crate::dtos::{
    AttributeSchemaEntryResponse, IssuerActionDetailsResponse, ProviderInfoResponse,
    SchemaResponse,
};
use crate::models::SCHEME_PASSWORD;
use crate::services::ServiceError;
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use service_core::error::AppError;

pub async fn list_providers(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProviderInfoResponse>>, AppError> {
    let providers = state.accounts.list_providers().await?;
    Ok(Json(providers.iter().map(ProviderInfoResponse::from).collect()))
}

pub async fn get_provider(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Result<Json<ProviderInfoResponse>, AppError> {
    let account = state
        .accounts
        .get_by_id(&account_id)
        .await?
        .ok_or(ServiceError::AccountNotFound(account_id))?;

    Ok(Json(ProviderInfoResponse::from(&account)))
}

/// Issuer schema as shown to holders. The root entry may be absent for a
/// misconfigured issuer; the protection attribute is never listed.
pub async fn get_schema(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Result<Json<SchemaResponse>, AppError> {
    let account = state
        .accounts
        .get_by_id(&account_id)
        .await?
        .ok_or_else(|| ServiceError::AccountNotFound(account_id.clone()))?;

    if !account.is_identity_provider() {
        return Err(ServiceError::UnexpectedAccountType(account_id).into());
    }

    let definitions = state
        .store
        .attribute_schema(&account.public_spend_key)
        .await
        .map_err(AppError::from)?;

    let active: Vec<_> = definitions.into_iter().filter(|d| d.is_active).collect();

    let root_attribute = active
        .iter()
        .find(|d| d.is_root)
        .map(|d| AttributeSchemaEntryResponse {
            attribute_name: d.attribute_name.clone(),
            alias: d.alias.clone(),
        });

    let associated_attributes = active
        .iter()
        .filter(|d| !d.is_root && d.scheme_name != SCHEME_PASSWORD)
        .map(|d| AttributeSchemaEntryResponse {
            attribute_name: d.attribute_name.clone(),
            alias: d.alias.clone(),
        })
        .collect();

    Ok(Json(SchemaResponse {
        root_attribute,
        associated_attributes,
    }))
}

#[derive(Debug, Deserialize)]
pub struct IssuanceDetailsQuery {
    pub issuer: String,
}

pub async fn issuance_details(
    State(state): State<AppState>,
    Query(query): Query<IssuanceDetailsQuery>,
) -> Result<Json<IssuerActionDetailsResponse>, AppError> {
    let account = state
        .accounts
        .get_by_public_key(&query.issuer)
        .await?
        .ok_or(ServiceError::AccountNotFound(query.issuer))?;

    let action_uri = format!(
        "{}/api/issuers/{}/attributes",
        state.config.public_base_url, account.public_spend_key
    );

    Ok(Json(IssuerActionDetailsResponse {
        issuer: account.public_spend_key.clone(),
        issuer_alias: account.info.clone(),
        action_uri,
    }))
}
