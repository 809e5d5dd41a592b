use crate::config::init::AppState;
use crate::constants;
use crate::model::user::{AccessLevel, Caller};
use axum::{http::Request, response::IntoResponse};
use axum_extra::middleware::Next;
use std::sync::Arc;

fn bearer<B>(req: &Request<B>) -> Option<String> {
    let value = req.headers().get(constants::AUTHORIZATION)?.to_str().ok()?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    match token {
        "" => None,
        t => Some(t.to_string()),
    }
}

/// Puts a `Caller` into the request when the bearer token resolves to a user. Users whose
/// level cannot be read are treated as students.
pub async fn token_decode<B: Send>(mut req: Request<B>, next: Next<B>) -> impl IntoResponse {
    let state = req.extensions().get::<Arc<AppState>>().cloned();
    if let (Some(state), Some(token)) = (state, bearer(&req)) {
        if let Some(user_id) = state.auth.resolve_user_id(token.as_str()).await {
            let access = state
                .auth
                .access_level(user_id)
                .await
                .unwrap_or(AccessLevel::Student);
            req.extensions_mut().insert(Caller::new(user_id, access));
        }
    }
    next.run(req).await
}
