use axum::http::HeaderMap;

use crate::errors::AppError;
use crate::models::Identity;
use crate::state::AppState;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Identity, AppError> {
    let token = bearer_token(headers).ok_or(AppError::Unauthorized)?;
    state.identity.verify(token).await
}

pub async fn authenticate_admin(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Identity, AppError> {
    let identity = authenticate(state, headers).await?;
    if !identity.is_admin() {
        return Err(AppError::Forbidden);
    }
    Ok(identity)
}
