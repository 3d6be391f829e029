// Auth gate: resolves the bearer token on a request to the acting user.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::{
    app_state::AppState,
    error::AppError,
    graph::{NodeFilter, NodeLabel},
    models::User,
};

/// Authenticated user extractor. Handlers that take a `CurrentUser` only run
/// for requests carrying a valid `Authorization: Bearer` token whose subject
/// still resolves to a user node.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

        let claims = state.security.verify_token(token)?;

        let node = state
            .store
            .find_one(NodeLabel::User, &NodeFilter::new().eq("username", claims.sub))
            .await?
            .ok_or_else(|| AppError::Unauthorized("Could not validate credentials".to_string()))?;

        Ok(CurrentUser(User::from_node(&node)?))
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}
