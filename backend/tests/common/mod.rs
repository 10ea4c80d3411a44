//! Common test utilities for API tests
//!
//! Builds the full router over the in-memory store so requests run through
//! the real middleware stack without a database or a listening socket.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use tech_check_backend::{
    api::{routes::create_router, AppState},
    config::{Config, StoreBackend},
    models::{Category, Role, User},
    services::{
        summarizer::PlaceholderSummarizer, user_service::NewUser, worker_pool::WorkerPool,
        Services,
    },
    store::Stores,
};

pub const PASSWORD: &str = "password";

pub fn test_config() -> Config {
    Config {
        database_url: None,
        store_backend: StoreBackend::Memory,
        bind_address: "127.0.0.1:0".into(),
        is_debug: false,
        log_format: "text".into(),
        jwt_secret: "api-test-secret".into(),
        access_token_ttl_hours: 2,
        refresh_token_ttl_hours: 24,
        refresh_token_length: 50,
        bcrypt_cost: 4,
        session_question_count: 10,
        list_max_count: 200,
        worker_pool_count: 2,
        google_client_id: None,
        google_tokeninfo_url: "http://127.0.0.1:9/tokeninfo".into(),
    }
}

/// Test context holding the router and the services behind it
pub struct TestApp {
    pub router: Router,
    pub services: Services,
}

/// A decoded response
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestResponse {
    /// Machine-readable code of an error body
    pub fn code(&self) -> &str {
        self.body["code"].as_str().unwrap_or_default()
    }
}

impl TestApp {
    pub fn new() -> Self {
        let config = Arc::new(test_config());
        let stores = Stores::memory();
        let worker_pool = Arc::new(WorkerPool::new(config.worker_pool_count));
        let services = Services::new(
            config.clone(),
            &stores,
            worker_pool,
            None,
            Arc::new(PlaceholderSummarizer),
        );
        let state = Arc::new(AppState::new(config, services.clone()));
        Self {
            router: create_router(state),
            services,
        }
    }

    /// Send a request, optionally with a bearer token and a JSON body.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request should build");

        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("body should be JSON")
        };
        TestResponse { status, body }
    }

    pub async fn get(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn create_user(&self, email: &str) -> User {
        self.services
            .users
            .create(NewUser {
                email: email.into(),
                name: email.split('@').next().unwrap_or(email).into(),
                password: PASSWORD.into(),
            })
            .await
            .expect("user should be created")
    }

    /// Role carrying every listed permission, created through the services.
    pub async fn create_role(&self, name: &str, permission_slugs: &[&str]) -> Role {
        let role = self.services.roles.create(name).await.expect("role");
        for slug in permission_slugs {
            let permission = self
                .services
                .permissions
                .create(slug, Some(slug))
                .await
                .expect("permission");
            self.services
                .roles
                .add_permission(role.id, permission.id)
                .await
                .expect("grant");
        }
        self.services.roles.get_by_id(role.id).await.expect("role")
    }

    pub async fn grant(&self, user: &User, role: &Role) {
        self.services
            .users
            .add_role(user.id, role.id)
            .await
            .expect("role grant");
    }

    /// Log in over HTTP and return the access token.
    pub async fn login(&self, email: &str) -> String {
        let response = self
            .request(
                Method::POST,
                "/api/v1/auth",
                None,
                Some(serde_json::json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "login failed: {}", response.body);
        response.body["data"]["access_token"]
            .as_str()
            .expect("access token")
            .to_string()
    }

    /// Category with `count` questions for `grade`.
    pub async fn category_with_questions(&self, name: &str, grade: &str, count: usize) -> Category {
        let category = self
            .services
            .categories
            .create(name, "")
            .await
            .expect("category");
        for i in 0..count {
            self.services
                .questions
                .create(category.id, grade, &format!("{name} {grade} question {i}"))
                .await
                .expect("question");
        }
        category
    }
}

pub fn id_of(value: &Value) -> Uuid {
    value["id"]
        .as_str()
        .and_then(|s| s.parse().ok())
        .expect("body should carry an id")
}
