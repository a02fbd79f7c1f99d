use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::{info, instrument, warn};

use crate::shared::{AppError, AppState};

const BEARER_PREFIX: &str = "Bearer ";

/// Outcome of reading the Authorization header
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum BearerHeader<'a> {
    Missing,
    NotBearer,
    Token(&'a str),
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> BearerHeader<'_> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return BearerHeader::Missing;
    };

    match value
        .to_str()
        .ok()
        .and_then(|header| header.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
    {
        Some(token) if !token.is_empty() => BearerHeader::Token(token),
        _ => BearerHeader::NotBearer,
    }
}

/// JWT authentication middleware - validates the Authorization Bearer header
/// and adds the resolved `AuthenticatedUser` to the request.
/// Usage: .layer(middleware::from_fn_with_state(app_state.clone(), session::require_auth))
/// Handlers can then extract `Extension(auth): Extension<AuthenticatedUser>`.
#[instrument(skip(state, req, next), fields(uri = %req.uri()))]
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = match bearer_token(req.headers()) {
        BearerHeader::Token(token) => token.to_owned(),
        BearerHeader::Missing => {
            warn!("Missing Authorization header in request");
            return Err(AppError::Unauthorized(
                "Authorization header required".to_string(),
            ));
        }
        BearerHeader::NotBearer => {
            warn!("Invalid Authorization header format (expected Bearer token)");
            return Err(AppError::Unauthorized(
                "Invalid authorization header format".to_string(),
            ));
        }
    };

    let identity = match state.session_service.authenticate(&token).await {
        Ok(identity) => identity,
        Err(e) => {
            warn!("JWT authentication failed: {}", e);
            return Err(e);
        }
    };

    info!(user_id = %identity.user_id, "Authentication successful");

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}
