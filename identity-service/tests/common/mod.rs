use identity_service::dtos::{AttributeValuePayload, IssueAttributesRequest};
use identity_service::models::{
    Account, AccountKind, AttributeDefinition, SCHEME_DATE_OF_BIRTH, SCHEME_FACE_IMAGE,
    SCHEME_PASSWORD,
};
use identity_service::services::{
    InMemoryIdentityStore, IssuanceService, MockAccountDirectory, MockCommitmentEngine,
    MockFaceVerifier, MockNotifier,
};
use std::collections::HashMap;
use std::sync::Arc;

pub const ISSUER_KEY: &str = "a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f90";
pub const ISSUER_VIEW_KEY: &str =
    "90f8e7d6c5b4a3920718f6e5d4c3b2a190f8e7d6c5b4a3920718f6e5d4c3b2a1";
pub const ACCOUNT_ID: &str = "idp-1";

pub const ROOT_ATTRIBUTE: &str = "NationalId";
pub const ROOT_SCHEME: &str = "Passport";
pub const ROOT_SCHEME_ID: i64 = 1;
pub const DOB_ATTRIBUTE: &str = "DateOfBirth";
pub const PROTECTION_ATTRIBUTE: &str = "Secret";

#[derive(Default)]
pub struct HarnessOptions {
    pub with_protection: bool,
    pub with_face_scheme: bool,
    pub face_mismatch: bool,
}

pub struct TestHarness {
    pub store: Arc<InMemoryIdentityStore>,
    pub engine: Arc<MockCommitmentEngine>,
    pub notifier: Arc<MockNotifier>,
    pub face_verifier: Arc<MockFaceVerifier>,
    pub accounts: Arc<MockAccountDirectory>,
    pub service: IssuanceService,
    pub account: Account,
}

pub fn definition(
    scheme_id: i64,
    attribute_name: &str,
    scheme_name: &str,
    is_root: bool,
) -> AttributeDefinition {
    AttributeDefinition {
        scheme_id,
        issuer: ISSUER_KEY.to_string(),
        attribute_name: attribute_name.to_string(),
        scheme_name: scheme_name.to_string(),
        alias: attribute_name.to_string(),
        description: String::new(),
        is_active: true,
        is_root,
    }
}

impl TestHarness {
    pub fn new(options: HarnessOptions) -> Self {
        let store = Arc::new(InMemoryIdentityStore::new());

        let mut definitions = vec![
            definition(ROOT_SCHEME_ID, ROOT_ATTRIBUTE, ROOT_SCHEME, true),
            definition(2, DOB_ATTRIBUTE, SCHEME_DATE_OF_BIRTH, false),
        ];
        if options.with_protection {
            definitions.push(definition(3, PROTECTION_ATTRIBUTE, SCHEME_PASSWORD, false));
        }
        if options.with_face_scheme {
            definitions.push(definition(4, "Photo", SCHEME_FACE_IMAGE, false));
        }
        store.seed_schema(definitions);

        let engine = Arc::new(MockCommitmentEngine::new());
        engine.register_scheme(ROOT_SCHEME_ID, ROOT_SCHEME, ISSUER_KEY);

        let notifier = Arc::new(MockNotifier::new());
        let face_verifier = Arc::new(MockFaceVerifier::new(!options.face_mismatch));

        let account = Account {
            account_id: ACCOUNT_ID.to_string(),
            info: "Test Identity Provider".to_string(),
            public_spend_key: ISSUER_KEY.to_string(),
            public_view_key: ISSUER_VIEW_KEY.to_string(),
            kind: AccountKind::IdentityProvider,
            is_private: false,
        };

        let accounts = Arc::new(MockAccountDirectory::new());
        accounts.register(account.clone());

        let service = IssuanceService::new(
            store.clone(),
            engine.clone(),
            notifier.clone(),
            face_verifier.clone(),
        );

        Self {
            store,
            engine,
            notifier,
            face_verifier,
            accounts,
            service,
            account,
        }
    }
}

pub fn attribute(value: &str, point_value: &str, point_root: &str) -> AttributeValuePayload {
    AttributeValuePayload {
        value: value.to_string(),
        blinding_point_value: Some(point_value.to_string()),
        blinding_point_root: Some(point_root.to_string()),
    }
}

pub fn target_spend_key() -> String {
    "11".repeat(32)
}

pub fn target_view_key() -> String {
    "22".repeat(32)
}

/// A request for NationalId + DateOfBirth, optionally carrying the
/// protection attribute and target holder keys.
pub fn issue_request(with_protection: bool, with_target: bool) -> IssueAttributesRequest {
    let mut attributes = HashMap::new();
    attributes.insert(ROOT_ATTRIBUTE.to_string(), attribute("AB123", "aa", "bb"));
    attributes.insert(
        DOB_ATTRIBUTE.to_string(),
        attribute("1990-01-01", "cc", "dd"),
    );
    if with_protection {
        attributes.insert(
            PROTECTION_ATTRIBUTE.to_string(),
            attribute("0badc0de", "ee", "ff"),
        );
    }

    IssueAttributesRequest {
        attributes,
        protection: None,
        public_spend_key: with_target.then(target_spend_key),
        public_view_key: with_target.then(target_view_key),
        face_image: None,
    }
}
