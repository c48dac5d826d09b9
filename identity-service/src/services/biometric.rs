//! Optional biometric face-match capability. A missing image means the check
//! is skipped; transport failures count as a mismatch.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use uuid::Uuid;

#[async_trait]
pub trait FaceVerifier: Send + Sync {
    /// Returns whether the captured face matches the one registered under
    /// the given key with the issuer.
    async fn verify(&self, issuer: &str, registration_key: &str, image_content: &str) -> bool;
}

#[derive(Debug, Serialize)]
struct FaceVerificationRequest<'a> {
    key_image: String,
    issuer: &'a str,
    registration_key: &'a str,
    image_string: &'a str,
}

pub struct HttpFaceVerifier {
    endpoint: String,
    client: Client,
}

impl HttpFaceVerifier {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl FaceVerifier for HttpFaceVerifier {
    async fn verify(&self, issuer: &str, registration_key: &str, image_content: &str) -> bool {
        let url = format!("{}/verify-person-face", self.endpoint);

        let response = self
            .client
            .post(&url)
            .json(&FaceVerificationRequest {
                key_image: Uuid::new_v4().simple().to_string(),
                issuer,
                registration_key,
                image_string: image_content,
            })
            .send()
            .await;

        match response {
            Ok(r) if r.status().is_success() => true,
            Ok(r) => {
                tracing::warn!(status = %r.status(), "Biometric verifier rejected face match");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "Biometric verifier unreachable");
                false
            }
        }
    }
}

/// Fixed-outcome verifier for tests and deployments without a biometric
/// endpoint.
pub struct MockFaceVerifier {
    matches: std::sync::atomic::AtomicBool,
}

impl MockFaceVerifier {
    pub fn new(matches: bool) -> Self {
        Self {
            matches: std::sync::atomic::AtomicBool::new(matches),
        }
    }

    pub fn set_matches(&self, matches: bool) {
        self.matches
            .store(matches, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl FaceVerifier for MockFaceVerifier {
    async fn verify(&self, _issuer: &str, _registration_key: &str, _image_content: &str) -> bool {
        self.matches.load(std::sync::atomic::Ordering::SeqCst)
    }
}
