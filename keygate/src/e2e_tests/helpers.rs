//! Common helpers for end-to-end tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use serde_json::{Value, json};

use crate::auth::{AuthState, TokenVerifier};
use crate::jwks::{KeysetHandle, KeysetRefresher};
use crate::server::router;
use crate::testing::{JwksServer, KEY_A_PRIVATE_PEM, KEY_B_PRIVATE_PEM, sign_token};

pub use crate::testing::{KEY_A_N, KEY_B_N, jwks_document};

/// Fetch timeout used by every test refresher.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(2);

/// Claims carried by tokens minted in tests.
#[must_use]
pub fn claims_for(subject: &str) -> Value {
    json!({ "sub": subject, "name": subject.to_uppercase() })
}

/// An RS256 token for `subject` signed with test key A.
#[must_use]
pub fn token_signed_by_a(kid: &str, subject: &str) -> String {
    sign_token(Algorithm::RS256, Some(kid), &claims_for(subject), KEY_A_PRIVATE_PEM)
}

/// An RS256 token for `subject` signed with test key B.
#[must_use]
pub fn token_signed_by_b(kid: &str, subject: &str) -> String {
    sign_token(Algorithm::RS256, Some(kid), &claims_for(subject), KEY_B_PRIVATE_PEM)
}

/// A gateway in front of an in-process authority.
///
/// Dropping it stops both servers.
pub struct Gateway {
    pub authority: JwksServer,
    pub handle: Arc<KeysetHandle>,
    pub refresher: Arc<KeysetRefresher>,
    addr: SocketAddr,
    client: reqwest::Client,
    task: tokio::task::JoinHandle<()>,
}

impl Gateway {
    /// Start an authority serving `document` and a gateway that refreshes on
    /// every unknown kid and checks no claims.
    pub async fn start(document: String) -> Self {
        Self::start_with(document, TokenVerifier::default(), Duration::ZERO).await
    }

    /// Start with a specific verifier and lazy-refresh interval.
    pub async fn start_with(
        document: String,
        verifier: TokenVerifier,
        lazy_refresh_interval: Duration,
    ) -> Self {
        let authority = JwksServer::start(document).await;
        let handle = Arc::new(KeysetHandle::default());
        let refresher = Arc::new(
            KeysetRefresher::new(authority.url(), FETCH_TIMEOUT, Arc::clone(&handle))
                .expect("client builds"),
        );
        refresher.refresh().await.expect("initial keyset fetch");

        let state = AuthState::new(verifier, Arc::clone(&handle))
            .with_lazy_refresh(Arc::clone(&refresher), lazy_refresh_interval);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind gateway");
        let addr = listener.local_addr().expect("local addr");
        let app = router(state);
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            authority,
            handle,
            refresher,
            addr,
            client: reqwest::Client::new(),
            task,
        }
    }

    /// `GET path` with an optional `Authorization` header value.
    ///
    /// Returns the status code and the JSON body.
    pub async fn get(&self, path: &str, authorization: Option<&str>) -> (u16, Value) {
        let mut request = self.client.get(format!("http://{}{path}", self.addr));
        if let Some(authorization) = authorization {
            request = request.header(reqwest::header::AUTHORIZATION, authorization);
        }
        let response = request.send().await.expect("gateway answers");
        let status = response.status().as_u16();
        let body = response.bytes().await.expect("body reads");
        let body = serde_json::from_slice(&body).expect("body is JSON");
        (status, body)
    }

    /// `GET /whoami` with `Bearer <token>`.
    pub async fn whoami(&self, token: &str) -> (u16, Value) {
        let authorization = format!("Bearer {token}");
        self.get("/whoami", Some(authorization.as_str())).await
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.task.abort();
    }
}
