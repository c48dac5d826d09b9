pub mod identity;
pub mod issuance;

pub use identity::{
    AttributeSchemaEntryResponse, CreateIdentityRequest, IdentityAttributeResponse,
    IdentityResponse, IssuerActionDetailsResponse, ProviderInfoResponse, SchemaResponse,
    TranslationResponse,
};
pub use issuance::{
    AssociatedIssuanceRecord, AttributeDefinitionDto, AttributeValuePayload,
    AttributeValueResponse, IssuanceResult, IssueAttributesRequest, ProtectionProofPayload,
    RootIssuanceRecord,
};
