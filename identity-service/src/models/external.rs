use serde::{Deserialize, Serialize};

/// Binding of an external document-provider name to the issuing account that
/// accepts its translated attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalProviderBinding {
    pub provider_name: String,
    pub account_id: String,
}
