//! Bearer authentication middleware for axum routers.
//!
//! Every request behind the middleware must carry an `Authorization` header
//! whose token verifies against the published keyset. Rejections are logged
//! with their reason and answered with one uniform `401` body, so a client
//! cannot learn which check failed.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use super::jwt::{Claims, RejectReason, TokenVerifier, VerificationVerdict};
use crate::jwks::{KeysetHandle, KeysetRefresher};

/// Body returned for every rejected token.
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid token";

/// Body returned when the `Authorization` header is absent.
pub const MISSING_HEADER_MESSAGE: &str = "Authorization header is required";

/// Default minimum time between refreshes triggered by unknown key ids.
pub const DEFAULT_LAZY_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Claims of the authenticated caller, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedClaims(pub Claims);

/// State shared by the middleware.
#[derive(Debug, Clone)]
pub struct AuthState {
    verifier: Arc<TokenVerifier>,
    keys: Arc<KeysetHandle>,
    refresher: Option<Arc<KeysetRefresher>>,
    lazy_refresh_interval: Duration,
}

impl AuthState {
    /// Create middleware state reading keys from `keys`.
    #[must_use]
    pub fn new(verifier: TokenVerifier, keys: Arc<KeysetHandle>) -> Self {
        Self {
            verifier: Arc::new(verifier),
            keys,
            refresher: None,
            lazy_refresh_interval: DEFAULT_LAZY_REFRESH_INTERVAL,
        }
    }

    /// Refresh through `refresher` when a token names an unknown key id,
    /// at most once per `min_interval`.
    #[must_use]
    pub fn with_lazy_refresh(
        mut self,
        refresher: Arc<KeysetRefresher>,
        min_interval: Duration,
    ) -> Self {
        self.refresher = Some(refresher);
        self.lazy_refresh_interval = min_interval;
        self
    }

    /// The keyset handle tokens are verified against.
    #[must_use]
    pub const fn keys(&self) -> &Arc<KeysetHandle> {
        &self.keys
    }

    /// Verify `credential` against the current keyset, refreshing once on an
    /// unknown key id if lazy refresh is enabled.
    pub async fn authenticate(&self, credential: &str) -> VerificationVerdict {
        let verdict = self.verifier.verify(credential, &self.keys.snapshot());
        if verdict.reject_reason() != Some(RejectReason::UnknownKeyId) {
            return verdict;
        }
        let Some(refresher) = &self.refresher else {
            return verdict;
        };

        match refresher.refresh_if_stale(self.lazy_refresh_interval).await {
            Ok(Some(keyset)) => self.verifier.verify(credential, &keyset),
            // Another request may have refreshed since the first snapshot.
            Ok(None) => self.verifier.verify(credential, &self.keys.snapshot()),
            Err(e) => {
                tracing::warn!("keyset refresh for unknown kid failed: {e}");
                verdict
            }
        }
    }
}

/// Middleware rejecting requests without a valid bearer token.
///
/// Use with `axum::middleware::from_fn_with_state`.
pub async fn require_bearer(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(header) = request.headers().get(AUTHORIZATION) else {
        return unauthorized(MISSING_HEADER_MESSAGE);
    };
    let Ok(credential) = header.to_str() else {
        tracing::debug!("rejected request: authorization header is not visible ASCII");
        return unauthorized(INVALID_TOKEN_MESSAGE);
    };
    let credential = credential.to_string();

    match state.authenticate(&credential).await.into_result() {
        Ok(claims) => {
            request.extensions_mut().insert(AuthenticatedClaims(claims));
            next.run(request).await
        }
        Err(reason) => {
            tracing::debug!("rejected request: {reason}");
            unauthorized(INVALID_TOKEN_MESSAGE)
        }
    }
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
}
