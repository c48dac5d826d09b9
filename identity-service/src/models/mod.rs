pub mod account;
pub mod external;
pub mod identity;
pub mod schema;

pub use account::{Account, AccountKind, ConfidentialTarget};
pub use external::ExternalProviderBinding;
pub use identity::{Identity, IdentityAttribute};
pub use schema::{
    AttributeDefinition, AttributeValueType, IssuerSchema, ReissuePolicy, value_type_of,
    SCHEME_DATE_OF_BIRTH, SCHEME_FACE_IMAGE, SCHEME_PASSWORD, SCHEME_PLACE_OF_BIRTH,
};
