#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use bento_api::config::AppConfig;
use bento_api::database::{MemoryStore, Store};
use bento_api::services::MemoryMailer;
use bento_api::{app, AppState};

pub const PASSWORD: &str = "correct-horse-battery";

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// The full router over an in-memory store and outbox
pub struct TestApp {
    pub router: Router,
    pub store: Arc<dyn Store>,
    pub mailer: Arc<MemoryMailer>,
    pub config: AppConfig,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_mailer(MemoryMailer::new())
    }

    pub fn with_mailer(mailer: MemoryMailer) -> Self {
        let config = AppConfig::development();
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let mailer = Arc::new(mailer);
        let state = AppState::new(config.clone(), store.clone(), mailer.clone());
        Self {
            router: app(state),
            store,
            mailer,
            config,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Result<TestResponse> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).context("response body is not JSON")?
        };
        Ok(TestResponse { status, headers, body })
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<TestResponse> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Result<TestResponse> {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> Result<TestResponse> {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> Result<TestResponse> {
        self.request(Method::DELETE, uri, token, None).await
    }

    /// Register `email` and return its session token
    pub async fn register(&self, email: &str) -> Result<String> {
        let res = self
            .post("/auth/register", None, json!({ "email": email, "password": PASSWORD }))
            .await?;
        anyhow::ensure!(res.status == StatusCode::CREATED, "register failed: {}", res.body);
        let token = res.body["data"]["token"].as_str().context("missing token")?;
        Ok(token.to_string())
    }

    /// Create an organization and return its id
    pub async fn create_organization(&self, token: &str, name: &str) -> Result<String> {
        let res = self
            .post("/api/organizations", Some(token), json!({ "name": name }))
            .await?;
        anyhow::ensure!(res.status == StatusCode::CREATED, "create failed: {}", res.body);
        let id = res.body["data"]["id"].as_str().context("missing id")?;
        Ok(id.to_string())
    }

    pub async fn invite(&self, token: &str, organization_id: &str, email: &str, role: &str) -> Result<TestResponse> {
        self.post(
            "/api/team/invitations",
            Some(token),
            json!({ "organization_id": organization_id, "email": email, "role": role }),
        )
        .await
    }

    /// Acceptance token from the last invitation mailed to `email`
    pub async fn invitation_token(&self, email: &str) -> Result<String> {
        let mail = self.mailer.last_to(email).await.context("no mail sent")?;
        let token = mail
            .body
            .split("token=")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .context("no token in mail")?;
        Ok(token.to_string())
    }
}
