//! Identity records: one subject under one issuing account, with its
//! attribute contents and their blinded commitments.

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub identity_id: String,
    pub account_id: String,
    pub description: String,
    pub attributes: Vec<IdentityAttribute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_spend_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_view_key: Option<String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityAttribute {
    pub attribute_id: String,
    pub attribute_name: String,
    pub content: String,
    /// Blinded commitment, hex-encoded at rest. Set exactly once: the
    /// transition from `None` to `Some` marks the attribute as issued.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "hex_bytes_opt")]
    pub commitment: Option<Vec<u8>>,
}

impl Identity {
    pub fn new(account_id: &str, description: &str, attributes: &[(String, String)]) -> Self {
        Self {
            id: None,
            identity_id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            description: description.to_string(),
            attributes: attributes
                .iter()
                .map(|(name, content)| IdentityAttribute::new(name, content))
                .collect(),
            target_spend_key: None,
            target_view_key: None,
            created_utc: Utc::now(),
        }
    }

    pub fn attribute(&self, attribute_name: &str) -> Option<&IdentityAttribute> {
        self.attributes
            .iter()
            .find(|a| a.attribute_name == attribute_name)
    }
}

impl IdentityAttribute {
    pub fn new(attribute_name: &str, content: &str) -> Self {
        Self {
            attribute_id: Uuid::new_v4().to_string(),
            attribute_name: attribute_name.to_string(),
            content: content.to_string(),
            commitment: None,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.commitment.is_some()
    }
}

// Helper module for optional byte fields stored as hex strings
mod hex_bytes_opt {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(b) => serializer.serialize_str(&hex::encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        opt.map(|s| hex::decode(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
