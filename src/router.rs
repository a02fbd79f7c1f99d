use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::warn;

use crate::shared::AppState;
use crate::{post, session, user};

/// Builds the full route table
///
/// Public: /register, /login, /logout.
/// Everything else runs behind `session::require_auth`.
pub fn build_router(state: AppState) -> Router {
    let auth = middleware::from_fn_with_state(state.clone(), session::require_auth);

    let protected = Router::new()
        .route("/", get(session::protected))
        .route("/posts", get(post::list_posts).post(post::create_post))
        .route(
            "/posts/:id",
            get(post::get_post)
                .put(post::update_post)
                .delete(post::delete_post),
        )
        .route_layer(auth.clone());

    let users = Router::new()
        .route("/users/:id", get(user::get_user).put(user::update_user))
        .route("/update/:id", post(user::update_user))
        .route_layer(auth);

    Router::new()
        .route("/register", post(user::register))
        .route("/login", post(session::login))
        .route("/logout", post(session::logout))
        .nest("/protected", protected)
        .merge(users)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Request deadline layer; timed-out requests get 408
pub fn timeout_layer(request_timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::new(request_timeout)
}

/// CORS for the configured origins, or any origin when none are configured
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer
            .allow_origin(AllowOrigin::list(origins))
            .allow_credentials(true)
    }
}
