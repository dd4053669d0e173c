use crate::config::{DesignConfig, StoreBackend};
use crate::handlers;
use crate::services::{
    AzureOpenAiProvider, CompletionProvider, DesignStore, EnvSecretStore, InMemoryDesignStore,
    KeyVaultSecretStore, ManagedIdentity, MockCompletionProvider, MongoDb, MongoDesignStore,
    SecretStore,
};
use axum::{
    middleware::from_fn,
    routing::{delete, get, post, put},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics_middleware, request_id_middleware, security_headers_middleware,
};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: DesignConfig,
    pub store: Arc<dyn DesignStore>,
    pub secrets: Arc<dyn SecretStore>,
    pub completions: Arc<dyn CompletionProvider>,
}

impl AppState {
    /// Wire up the collaborators named by `config`.
    pub async fn from_config(config: DesignConfig) -> Result<Self, AppError> {
        let store: Arc<dyn DesignStore> = match (&config.store.backend, &config.store.mongodb) {
            (StoreBackend::Mongo, Some(mongo)) => {
                let db = MongoDb::connect(&mongo.uri, &mongo.database).await?;
                db.initialize_indexes().await.map_err(|e| {
                    tracing::error!("Failed to initialize database indexes: {}", e);
                    e
                })?;
                Arc::new(MongoDesignStore::new(db))
            }
            (StoreBackend::Mongo, None) => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "MongoDB backend selected without connection settings"
                )))
            }
            (StoreBackend::Memory, _) => {
                tracing::warn!("Using in-memory design store; data is lost on restart");
                Arc::new(InMemoryDesignStore::new())
            }
        };

        let completion = &config.completion;
        let secrets: Arc<dyn SecretStore> = if completion.development {
            Arc::new(EnvSecretStore)
        } else {
            let vault_url = completion.key_vault_url.as_deref().ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!(
                    "KEY_VAULT_URL is required outside development"
                ))
            })?;
            Arc::new(
                KeyVaultSecretStore::new(
                    vault_url,
                    ManagedIdentity::from_parts(
                        completion.identity_endpoint.as_deref(),
                        completion.identity_header.as_ref(),
                    ),
                )
                    .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?,
            )
        };

        let completions: Arc<dyn CompletionProvider> = match &completion.endpoint {
            Some(endpoint) => Arc::new(
                AzureOpenAiProvider::new(endpoint, &completion.deployment, &completion.api_version)
                    .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?,
            ),
            None => {
                tracing::warn!("AZURE_OPENAI_ENDPOINT not set, using mock completion provider");
                Arc::new(MockCompletionProvider)
            }
        };

        Ok(Self {
            config,
            store,
            secrets,
            completions,
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route(
            "/items",
            get(handlers::get_items)
                .post(handlers::create_item)
                .put(handlers::update_item)
                .delete(handlers::delete_item),
        )
        // One route per function, kept for existing clients
        .route("/createItem", post(handlers::create_item))
        .route("/readItem", get(handlers::read_item))
        .route("/readUserItems", get(handlers::read_user_items))
        .route("/updateItem", put(handlers::update_item))
        .route("/deleteItem", delete(handlers::delete_item))
        .route("/completions", post(handlers::generate_completion))
        .route("/generateCompletion", post(handlers::generate_completion))
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                    user_id = tracing::field::Empty,
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
}

impl Application {
    pub async fn build(config: DesignConfig) -> Result<Self, AppError> {
        let state = AppState::from_config(config).await?;
        Self::build_with_state(state).await
    }

    pub async fn build_with_state(state: AppState) -> Result<Self, AppError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], state.config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(listener, router(state))
            .with_graceful_shutdown(shutdown_signal());

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
