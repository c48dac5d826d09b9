mod common;

use common::*;
use identity_service::dtos::ProtectionProofPayload;
use identity_service::services::{MockCommitmentEngine, ServiceError};

// =============================================================================
// Root path: first issuance
// =============================================================================

#[tokio::test]
async fn first_root_issuance_creates_identity_and_transfers() {
    let harness = TestHarness::new(HarnessOptions::default());
    let request = issue_request(false, true);

    let outcome = harness
        .service
        .issue_attributes(&harness.account, &request)
        .await
        .expect("issuance failed");

    let root = outcome.result.root.expect("root record missing");
    assert_eq!(root.attribute_name, ROOT_ATTRIBUTE);
    assert!(!root.originating_commitment.is_empty());
    assert!(!root.asset_commitment.is_empty());
    assert!(!root.surjection_proof.is_empty());

    // One associated record, for the date-of-birth attribute.
    assert_eq!(outcome.result.associated.len(), 1);
    assert_eq!(outcome.result.associated[0].attribute_name, DOB_ATTRIBUTE);

    // Exactly one blinded root issuance and one transfer.
    assert_eq!(harness.engine.blinded_issued(), 1);
    assert_eq!(harness.engine.transfers(), 1);

    // The identity exists, its root is committed, and the holder keys stick.
    let identities = harness.store.list_identities(ACCOUNT_ID).await.unwrap();
    assert_eq!(identities.len(), 1);
    let identity = &identities[0];
    assert!(identity.attribute(ROOT_ATTRIBUTE).unwrap().is_committed());
    assert_eq!(identity.target_spend_key.as_deref(), Some(target_spend_key().as_str()));
    assert_eq!(identity.target_view_key.as_deref(), Some(target_view_key().as_str()));

    // The outcome was announced to the issuer's channel.
    let published = harness.notifier.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, ACCOUNT_ID);

    // Returned values are root-first and carry their definitions.
    assert_eq!(outcome.values.len(), 2);
    assert_eq!(outcome.values[0].value, "AB123");
    assert!(outcome.values[0].definition.is_root);
}

#[tokio::test]
async fn repeated_issuance_reuses_identity_and_takes_reissue_path() {
    let harness = TestHarness::new(HarnessOptions::default());
    let request = issue_request(false, true);

    harness
        .service
        .issue_attributes(&harness.account, &request)
        .await
        .expect("first issuance failed");
    let outcome = harness
        .service
        .issue_attributes(&harness.account, &request)
        .await
        .expect("re-issuance failed");

    // No second identity and no second blinded root; without a protection
    // attribute the schema permits re-issuance, so the transfer runs again.
    let identities = harness.store.list_identities(ACCOUNT_ID).await.unwrap();
    assert_eq!(identities.len(), 1);
    assert_eq!(harness.engine.blinded_issued(), 1);
    assert_eq!(harness.engine.transfers(), 2);
    assert!(outcome.result.root.is_some());

    // The re-issuance path binds no new associated attributes.
    assert!(outcome.result.associated.is_empty());
}

#[tokio::test]
async fn concurrent_requests_issue_the_root_exactly_once() {
    let harness = TestHarness::new(HarnessOptions::default());

    let service_a = harness.service.clone();
    let service_b = harness.service.clone();
    let account_a = harness.account.clone();
    let account_b = harness.account.clone();

    let task_a = tokio::spawn(async move {
        service_a
            .issue_attributes(&account_a, &issue_request(false, true))
            .await
    });
    let task_b = tokio::spawn(async move {
        service_b
            .issue_attributes(&account_b, &issue_request(false, true))
            .await
    });

    task_a.await.unwrap().expect("request A failed");
    task_b.await.unwrap().expect("request B failed");

    // The per-subject lock serializes the check-and-commit section: one
    // request sees the uncommitted root, the other takes the re-issue path.
    let identities = harness.store.list_identities(ACCOUNT_ID).await.unwrap();
    assert_eq!(identities.len(), 1);
    assert_eq!(harness.engine.blinded_issued(), 1);
    assert_eq!(harness.engine.transfers(), 2);
}

// =============================================================================
// Protection gate
// =============================================================================

#[tokio::test]
async fn reissue_without_proof_is_rejected_when_protection_is_configured() {
    let harness = TestHarness::new(HarnessOptions {
        with_protection: true,
        ..Default::default()
    });

    harness
        .service
        .issue_attributes(&harness.account, &issue_request(true, true))
        .await
        .expect("first issuance failed");

    let err = harness
        .service
        .issue_attributes(&harness.account, &issue_request(true, true))
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::MissingProtectionProof));
}

#[tokio::test]
async fn reissue_with_bad_proof_creates_no_commitments() {
    let harness = TestHarness::new(HarnessOptions {
        with_protection: true,
        ..Default::default()
    });

    harness
        .service
        .issue_attributes(&harness.account, &issue_request(true, true))
        .await
        .expect("first issuance failed");
    let associated_before = harness.engine.associated_issued();
    let transfers_before = harness.engine.transfers();

    let mut request = issue_request(true, true);
    request.protection = Some(ProtectionProofPayload {
        signature_e: "deadbeef".to_string(),
        signature_s: "ff".to_string(),
        session_commitment: hex::encode(b"session-context"),
    });

    let err = harness
        .service
        .issue_attributes(&harness.account, &request)
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::ProtectionVerificationFailed));
    assert_eq!(harness.engine.associated_issued(), associated_before);
    assert_eq!(harness.engine.transfers(), transfers_before);
}

#[tokio::test]
async fn reissue_with_valid_proof_transfers_again() {
    let harness = TestHarness::new(HarnessOptions {
        with_protection: true,
        ..Default::default()
    });

    harness
        .service
        .issue_attributes(&harness.account, &issue_request(true, true))
        .await
        .expect("first issuance failed");

    let identity = harness
        .store
        .find_identity_by_attribute(ACCOUNT_ID, ROOT_ATTRIBUTE, "AB123")
        .await
        .unwrap()
        .expect("identity missing");
    let stored = identity
        .attribute(PROTECTION_ATTRIBUTE)
        .and_then(|a| a.commitment.clone())
        .expect("protection attribute uncommitted");

    let session = b"session-context".to_vec();
    let signature = MockCommitmentEngine::protection_signature(&stored, &session);

    let mut request = issue_request(true, true);
    request.protection = Some(ProtectionProofPayload {
        signature_e: hex::encode(signature),
        signature_s: "ff".to_string(),
        session_commitment: hex::encode(&session),
    });

    let outcome = harness
        .service
        .issue_attributes(&harness.account, &request)
        .await
        .expect("re-issuance with valid proof failed");

    assert!(outcome.result.root.is_some());
    assert_eq!(harness.engine.transfers(), 2);
}

// =============================================================================
// Transfer failure
// =============================================================================

#[tokio::test]
async fn transfer_failure_fails_the_request_but_keeps_commitments() {
    let harness = TestHarness::new(HarnessOptions::default());
    harness.engine.fail_transfers(true);

    let err = harness
        .service
        .issue_attributes(&harness.account, &issue_request(false, true))
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::RootTransferFailed));

    // Commitments persisted before the transfer step stay persisted.
    let identity = harness
        .store
        .find_identity_by_attribute(ACCOUNT_ID, ROOT_ATTRIBUTE, "AB123")
        .await
        .unwrap()
        .expect("identity missing");
    assert!(identity.attribute(ROOT_ATTRIBUTE).unwrap().is_committed());
    assert!(identity.attribute(DOB_ATTRIBUTE).unwrap().is_committed());

    // Nothing is announced for a failed request.
    assert!(harness.notifier.published().is_empty());
}

// =============================================================================
// Associated-only path
// =============================================================================

#[tokio::test]
async fn associated_only_path_commits_root_as_associated_asset() {
    let harness = TestHarness::new(HarnessOptions::default());

    let outcome = harness
        .service
        .issue_attributes(&harness.account, &issue_request(false, false))
        .await
        .expect("associated issuance failed");

    assert!(outcome.result.root.is_none());
    assert_eq!(harness.engine.transfers(), 0);
    assert_eq!(harness.engine.blinded_issued(), 0);

    // The root is committed as an associated asset of its own, then the
    // whole batch (root included) is bound to the scheme-id-derived root.
    let names: Vec<_> = outcome
        .result
        .associated
        .iter()
        .map(|r| r.attribute_name.as_str())
        .collect();
    assert_eq!(names, vec![ROOT_ATTRIBUTE, ROOT_ATTRIBUTE, DOB_ATTRIBUTE]);

    let identity = harness
        .store
        .find_identity_by_attribute(ACCOUNT_ID, ROOT_ATTRIBUTE, "AB123")
        .await
        .unwrap()
        .expect("identity missing");
    assert!(identity.attribute(ROOT_ATTRIBUTE).unwrap().is_committed());
    assert!(identity.attribute(DOB_ATTRIBUTE).unwrap().is_committed());
}

#[tokio::test]
async fn associated_bindings_derive_from_this_issuers_root_asset() {
    let harness = TestHarness::new(HarnessOptions::default());

    let outcome = harness
        .service
        .issue_attributes(&harness.account, &issue_request(false, false))
        .await
        .expect("associated issuance failed");

    let dob_record = outcome
        .result
        .associated
        .iter()
        .find(|r| r.attribute_name == DOB_ATTRIBUTE)
        .expect("date-of-birth record missing");

    // Recompute the binding from the root asset identifier used in this
    // request: fold the caller's root blinding point into it and derive the
    // binding commitment.
    let root_asset_id = harness
        .engine
        .derive_asset_id(ROOT_SCHEME, "AB123", ISSUER_KEY)
        .await
        .unwrap();
    let folded = MockCommitmentEngine::expected_blind(&root_asset_id, &[0xdd]);
    let expected = MockCommitmentEngine::expected_binding(&folded);
    assert_eq!(dob_record.binding_to_root_commitment, hex::encode(expected));

    // A root asset of a different issuer yields a different binding.
    let foreign_root = harness
        .engine
        .derive_asset_id(ROOT_SCHEME, "AB123", "other-issuer-key")
        .await
        .unwrap();
    let foreign_folded = MockCommitmentEngine::expected_blind(&foreign_root, &[0xdd]);
    let foreign_binding = MockCommitmentEngine::expected_binding(&foreign_folded);
    assert_ne!(
        dob_record.binding_to_root_commitment,
        hex::encode(foreign_binding)
    );
}

// =============================================================================
// Validation and gates
// =============================================================================

#[tokio::test]
async fn unknown_attribute_is_rejected_before_any_side_effect() {
    let harness = TestHarness::new(HarnessOptions::default());

    let mut request = issue_request(false, true);
    request
        .attributes
        .insert("FavoriteColor".to_string(), attribute("blue", "aa", "bb"));

    let err = harness
        .service
        .issue_attributes(&harness.account, &request)
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::UnknownAttributes(_)));
    assert!(harness.store.list_identities(ACCOUNT_ID).await.unwrap().is_empty());
    assert_eq!(harness.engine.blinded_issued(), 0);
    assert_eq!(harness.engine.associated_issued(), 0);
}

#[tokio::test]
async fn face_mismatch_rejects_the_request_before_any_state_change() {
    let harness = TestHarness::new(HarnessOptions {
        with_face_scheme: true,
        face_mismatch: true,
        ..Default::default()
    });

    let mut request = issue_request(false, true);
    request.face_image = Some("base64-face-image".to_string());

    let err = harness
        .service
        .issue_attributes(&harness.account, &request)
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::FaceVerificationFailed));
    assert!(harness.store.list_identities(ACCOUNT_ID).await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_face_image_skips_the_biometric_check() {
    let harness = TestHarness::new(HarnessOptions {
        with_face_scheme: true,
        face_mismatch: true,
        ..Default::default()
    });

    // No image content: the check is skipped and issuance proceeds.
    let outcome = harness
        .service
        .issue_attributes(&harness.account, &issue_request(false, true))
        .await
        .expect("issuance failed");

    assert!(outcome.result.root.is_some());
}

#[tokio::test]
async fn protection_attribute_is_excluded_from_returned_values() {
    let harness = TestHarness::new(HarnessOptions {
        with_protection: true,
        ..Default::default()
    });

    let outcome = harness
        .service
        .issue_attributes(&harness.account, &issue_request(true, true))
        .await
        .expect("issuance failed");

    let names: Vec<_> = outcome
        .values
        .iter()
        .map(|v| v.definition.attribute_name.as_str())
        .collect();
    assert!(names.contains(&ROOT_ATTRIBUTE));
    assert!(names.contains(&DOB_ATTRIBUTE));
    assert!(!names.contains(&PROTECTION_ATTRIBUTE));
}
