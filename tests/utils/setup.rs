use axum::{
    http::{Method, StatusCode},
    Router,
};
use chrono::Duration;
use serde_json::{json, Value};
use std::sync::Arc;

use authpost::{
    build_router,
    post::repository::InMemoryPostRepository,
    session::{
        password::{PasswordHasher, MIN_COST},
        revocation::InMemoryRevocationList,
        token::TokenService,
    },
    user::repository::InMemoryUserRepository,
    AppState,
};

use super::requests::{bearer, send, TestResponse};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub const TEST_SECRET: &str = "integration-test-secret";

pub struct TestApp {
    pub router: Router,
    pub revocation_list: Arc<InMemoryRevocationList>,
}

/// A registered user together with a fresh token
pub struct LoggedInUser {
    pub id: String,
    pub phone: String,
    pub token: String,
}

impl LoggedInUser {
    pub fn auth(&self) -> String {
        bearer(&self.token)
    }
}

pub struct TestAppBuilder {
    token_ttl: Duration,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self {
            token_ttl: Duration::hours(24),
        }
    }

    #[allow(dead_code)] // unused by some test binaries
    pub fn with_token_ttl(mut self, token_ttl: Duration) -> Self {
        self.token_ttl = token_ttl;
        self
    }

    pub fn build(self) -> TestApp {
        let token_service = TokenService::new(TEST_SECRET, self.token_ttl);
        let revocation_list = Arc::new(InMemoryRevocationList::new());

        let state = AppState::new(
            Arc::new(InMemoryUserRepository::new()),
            Arc::new(InMemoryPostRepository::new()),
            token_service,
            revocation_list.clone(),
            PasswordHasher::new(MIN_COST),
        );

        TestApp {
            router: build_router(state),
            revocation_list,
        }
    }
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        authorization: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        send(&self.router, method, uri, authorization, body).await
    }

    pub async fn register(&self, name: &str, phone: &str, password: &str) -> TestResponse {
        self.request(
            Method::POST,
            "/register",
            None,
            Some(json!({ "name": name, "phone": phone, "password": password })),
        )
        .await
    }

    pub async fn login(&self, phone: &str, password: &str) -> TestResponse {
        self.request(
            Method::POST,
            "/login",
            None,
            Some(json!({ "phone": phone, "password": password })),
        )
        .await
    }

    /// Registers and logs in, panicking if either step fails
    pub async fn register_and_login(&self, name: &str, phone: &str, password: &str) -> LoggedInUser {
        let registered = self.register(name, phone, password).await;
        assert_eq!(registered.status, StatusCode::OK, "register: {}", registered.body);

        let logged_in = self.login(phone, password).await;
        assert_eq!(logged_in.status, StatusCode::OK, "login: {}", logged_in.body);

        LoggedInUser {
            id: registered.body["user"]["id"].as_str().unwrap().to_string(),
            phone: phone.to_string(),
            token: logged_in.str_field("token").to_string(),
        }
    }
}
