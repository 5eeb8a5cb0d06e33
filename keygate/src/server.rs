//! HTTP routes served by the gateway.

use axum::extract::State;
use axum::routing::get;
use axum::{Extension, Json, Router, middleware};
use serde_json::{Value, json};

use crate::auth::{AuthState, AuthenticatedClaims, require_bearer};

/// Build the gateway router.
///
/// `/healthz` is open; every other route requires a bearer token.
pub fn router(state: AuthState) -> Router {
    let protected = Router::new()
        .route("/whoami", get(whoami))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/healthz", get(healthz))
        .merge(protected)
        .with_state(state)
}

async fn healthz(State(state): State<AuthState>) -> Json<Value> {
    let keyset = state.keys().snapshot();
    Json(json!({ "status": "ok", "keys": keyset.len() }))
}

async fn whoami(
    Extension(AuthenticatedClaims(claims)): Extension<AuthenticatedClaims>,
) -> Json<Value> {
    Json(json!({ "claims": claims }))
}
