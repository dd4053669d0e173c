#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use design_service::auth::CLIENT_PRINCIPAL_HEADER;
use design_service::config::DesignConfig;
use design_service::services::{
    DesignStore, InMemoryDesignStore, MockCompletionProvider, SecretStore,
};
use design_service::startup::{router, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

pub const USER_ONE: &str = "u1";
pub const USER_TWO: &str = "u2";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryDesignStore>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_secrets(Arc::new(StaticSecret("test-api-key")))
    }

    pub fn with_secrets(secrets: Arc<dyn SecretStore>) -> Self {
        Self::build(|store| store as Arc<dyn DesignStore>, secrets)
    }

    /// Serve through a store wrapping the in-memory one; `store` on the
    /// returned app still points at the inner store.
    pub fn wrapping_store<F>(wrap: F) -> Self
    where
        F: FnOnce(Arc<InMemoryDesignStore>) -> Arc<dyn DesignStore>,
    {
        Self::build(wrap, Arc::new(StaticSecret("test-api-key")))
    }

    fn build<F>(wrap: F, secrets: Arc<dyn SecretStore>) -> Self
    where
        F: FnOnce(Arc<InMemoryDesignStore>) -> Arc<dyn DesignStore>,
    {
        let store = Arc::new(InMemoryDesignStore::new());
        let state = AppState {
            config: DesignConfig::for_tests(),
            store: wrap(store.clone()),
            secrets,
            completions: Arc::new(MockCompletionProvider),
        };

        TestApp {
            router: router(state),
            store,
        }
    }

    /// Send a request as `user` (no principal header when `None`).
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(CLIENT_PRINCIPAL_HEADER, principal(json!({ "userId": user })));
        }
        self.send_request(builder, body).await
    }

    pub async fn send_request(
        &self,
        mut builder: axum::http::request::Builder,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("Failed to build request"))
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("Response is not JSON")
        };

        (status, value)
    }

    /// Create a design owned by `user` and return its id.
    pub async fn create_design(&self, user: &str, body: Value) -> String {
        let (status, created) = self.send(Method::POST, "/items", Some(user), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {}", created);
        created["id"]
            .as_str()
            .expect("created design has no id")
            .to_string()
    }
}

/// Base64-encode a client principal the way the hosting platform does.
pub fn principal(claims: Value) -> String {
    STANDARD.encode(claims.to_string())
}

pub fn sample_design() -> Value {
    json!({
        "version": 20241229,
        "generator": "pcbnew",
        "generatorVersion": "8.0",
        "layers": [
            { "index": 0, "type": "fCu", "purpose": "signal" },
            { "index": 2, "type": "bCu", "purpose": "signal" }
        ],
        "components": [
            {
                "name": "WS2812B",
                "layer": "fCu",
                "position": { "x": 148.5011, "y": 107.1372 },
                "reference": "U1",
                "value": "WS2812B"
            }
        ]
    })
}

pub struct StaticSecret(pub &'static str);

#[async_trait::async_trait]
impl SecretStore for StaticSecret {
    async fn get_secret(
        &self,
        _name: &str,
    ) -> Result<secrecy::Secret<String>, design_service::services::SecretError> {
        Ok(secrecy::Secret::new(self.0.to_string()))
    }
}
