//! Application startup and lifecycle management.
//!
//! Wires the identity store, account directory, commitment engine, notifier,
//! and biometric verifier into the issuance service and serves the HTTP API.

use crate::config::IdentityConfig;
use crate::handlers::{health, identity, issuance, providers, translate};
use crate::services::{
    AccountDb, AccountDirectory, AdapterRegistry, CommitmentEngine, FaceVerifier, HttpFaceVerifier,
    IdentityDb, IdentityStore, IssuanceNotifier, IssuanceService, MockCommitmentEngine,
    MockFaceVerifier, MockNotifier, RemoteCommitmentEngine, WebhookNotifier,
};
use axum::{
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: IdentityConfig,
    pub store: Arc<dyn IdentityStore>,
    pub accounts: Arc<dyn AccountDirectory>,
    pub issuance: IssuanceService,
    pub adapters: Arc<AdapterRegistry>,
}

/// Build the API router over the given state.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics_endpoint))
        .route("/api/identity-providers", get(providers::list_providers))
        .route(
            "/api/identity-providers/:account_id",
            get(providers::get_provider),
        )
        .route(
            "/api/identity-providers/:account_id/schema",
            get(providers::get_schema),
        )
        .route(
            "/api/identity-providers/:account_id/identities",
            get(identity::list_identities).post(identity::create_identity),
        )
        .route("/api/identities/:identity_id", get(identity::get_identity))
        .route("/api/issuance-details", get(providers::issuance_details))
        .route(
            "/api/issuers/:issuer/attributes",
            post(issuance::issue_attributes),
        )
        .route(
            "/api/translate/:provider_name",
            post(translate::translate_document),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: IdentityConfig) -> Result<Self, AppError> {
        let db = IdentityDb::connect(&config.mongodb.uri, &config.mongodb.database)
            .await
            .map_err(|e| {
                tracing::error!("Failed to connect to MongoDB: {}", e);
                AppError::from(e)
            })?;

        db.initialize_indexes().await.map_err(|e| {
            tracing::error!("Failed to initialize database indexes: {}", e);
            AppError::from(e)
        })?;

        let accounts: Arc<dyn AccountDirectory> =
            Arc::new(AccountDb::new(db.client(), &config.mongodb.database));
        let store: Arc<dyn IdentityStore> = Arc::new(db);

        let engine: Arc<dyn CommitmentEngine> = if config.engine.enabled {
            tracing::info!(endpoint = %config.engine.endpoint, "Remote commitment engine configured");
            Arc::new(RemoteCommitmentEngine::new(&config.engine.endpoint))
        } else {
            tracing::info!("Commitment engine disabled, using deterministic in-process engine");
            Arc::new(MockCommitmentEngine::new())
        };

        let notifier: Arc<dyn IssuanceNotifier> = if config.hub.enabled {
            tracing::info!(endpoint = %config.hub.endpoint, "Issuance hub notifier configured");
            Arc::new(WebhookNotifier::new(&config.hub.endpoint))
        } else {
            tracing::info!("Hub notifier disabled, issuance events are recorded only");
            Arc::new(MockNotifier::new())
        };

        let face_verifier: Arc<dyn FaceVerifier> = if config.biometric.enabled {
            tracing::info!(endpoint = %config.biometric.endpoint, "Biometric verifier configured");
            Arc::new(HttpFaceVerifier::new(&config.biometric.endpoint))
        } else {
            tracing::info!("Biometric verifier disabled, face checks pass");
            Arc::new(MockFaceVerifier::new(true))
        };

        let issuance = IssuanceService::new(
            store.clone(),
            engine,
            notifier,
            face_verifier,
        );

        let state = AppState {
            config: config.clone(),
            store,
            accounts,
            issuance,
            adapters: Arc::new(AdapterRegistry::with_defaults()),
        };

        // Port 0 binds a random port for testing.
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Identity service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until the shutdown future resolves.
    pub async fn run_until_stopped<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = api_router(self.state);
        axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}
