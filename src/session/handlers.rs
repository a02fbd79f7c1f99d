use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap},
    response::{AppendHeaders, IntoResponse},
    Extension, Json,
};
use serde_json::{json, Value};
use tracing::{info, instrument};

use super::{
    middleware::{bearer_token, BearerHeader},
    types::{AuthenticatedUser, LoginRequest, LoginResponse},
};
use crate::shared::{AppError, AppState, JsonBody};

/// Expires the legacy `jwt_token` cookie browsers may still hold
const CLEAR_TOKEN_COOKIE: &str = "jwt_token=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax";

/// HTTP handler for logging in
///
/// POST /login
/// Returns a bearer token valid for 24 hours
#[instrument(name = "login", skip(state, request))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    info!("Login requested");

    let response = state.session_service.login(request).await?;

    info!(user_id = %response.user.id, "Token issued");
    Ok(Json(response))
}

/// HTTP handler for logging out
///
/// POST /logout
/// Revokes the presented bearer token, if any, and clears the token cookie.
/// Always succeeds.
#[instrument(name = "logout", skip(state, headers))]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let token = match bearer_token(&headers) {
        BearerHeader::Token(token) => Some(token.to_owned()),
        _ => None,
    };

    let revoked = state.session_service.logout(token.as_deref()).await?;
    info!(revoked, "Logout handled");

    Ok((
        AppendHeaders([(SET_COOKIE, CLEAR_TOKEN_COOKIE)]),
        Json(json!({ "message": "Logged out successfully" })),
    ))
}

/// HTTP handler for the protected welcome route
///
/// GET /protected
#[instrument(name = "protected", skip(auth))]
pub async fn protected(Extension(auth): Extension<AuthenticatedUser>) -> Json<Value> {
    Json(json!({
        "message": "Welcome to the protected route!",
        "user_id": auth.user_id,
        "phone": auth.phone,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_utils::AppStateBuilder;
    use crate::user::models::UserModel;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use tower::ServiceExt; // for `oneshot`

    async fn app_with_user() -> Router {
        let state = AppStateBuilder::new().build();
        let user = UserModel::new(
            "Al".to_string(),
            "+1000".to_string(),
            state.password_hasher.hash("pw").unwrap(),
        );
        state.user_repository.create_user(&user).await.unwrap();

        Router::new()
            .route("/login", axum::routing::post(login))
            .route("/logout", axum::routing::post(logout))
            .with_state(state)
    }

    fn login_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/login")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_login_handler() {
        let app = app_with_user().await;

        let response = app
            .oneshot(login_request(r#"{"phone": "+1000", "password": "pw"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let login_response: LoginResponse = serde_json::from_slice(&body).unwrap();
        assert!(!login_response.token.is_empty());
        assert_eq!(login_response.user.phone, "+1000");
    }

    #[tokio::test]
    async fn test_login_handler_wrong_password() {
        let app = app_with_user().await;

        let response = app
            .oneshot(login_request(r#"{"phone": "+1000", "password": "wrong"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_handler_bad_body() {
        let app = app_with_user().await;

        let response = app
            .oneshot(login_request(r#"{"phone": "+1000"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_logout_without_token_clears_cookie() {
        let app = app_with_user().await;

        let request = Request::builder()
            .method("POST")
            .uri("/logout")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("jwt_token=;"));
        assert!(cookie.contains("Max-Age=0"));
    }
}
