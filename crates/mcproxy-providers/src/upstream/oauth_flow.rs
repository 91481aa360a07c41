//! Loopback OAuth authorization-code + PKCE flow for servers that
//! declare an `oauth` block in their [`ServerConfig`].
//!
//! The browser-facing part (driving the user through consent screens)
//! is out of scope here — the daemon only needs to mint an
//! authorization URL, catch the redirect on a local port, and exchange
//! the code for tokens.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::Query;
use axum::response::Html;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use mcproxy_domain::entities::OAuthConfig;
use mcproxy_domain::error::{Error, Result};
use mcproxy_domain::ports::SecretResolver;

#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// A started authorization flow: the loopback listener is already
/// bound and the authorize URL already minted. [`Self::complete`]
/// blocks until the redirect arrives and the token exchange finishes.
pub struct LoopbackOAuthFlow {
    server_name: String,
    authorize_url: String,
    redirect_uri: String,
    code_verifier: String,
    token_url: String,
    client_id: String,
    client_secret_ref: Option<String>,
    code_rx: oneshot::Receiver<String>,
    shutdown_tx: oneshot::Sender<()>,
    server_task: tokio::task::JoinHandle<()>,
}

impl LoopbackOAuthFlow {
    /// Binds a loopback listener, mints the PKCE challenge, and builds
    /// the authorize URL the caller should return to the user.
    pub async fn start(server_name: &str, oauth: &OAuthConfig) -> Result<Self> {
        let client_id = oauth.client_id.clone().ok_or_else(|| Error::Config {
            message: format!("server '{server_name}' oauth.client_id is required"),
        })?;
        let auth_url = oauth.auth_url.clone().ok_or_else(|| Error::Config {
            message: format!("server '{server_name}' oauth.auth_url is required"),
        })?;
        let token_url = oauth.token_url.clone().ok_or_else(|| Error::Config {
            message: format!("server '{server_name}' oauth.token_url is required"),
        })?;

        let listener = TcpListener::bind("127.0.0.1:0").await.map_err(Error::from)?;
        let port = listener.local_addr().map_err(Error::from)?.port();
        let redirect_uri = format!("http://127.0.0.1:{port}/callback");

        let code_verifier = generate_code_verifier();
        let code_challenge = code_challenge_s256(&code_verifier);
        let state = uuid::Uuid::new_v4().to_string();

        let mut url = reqwest::Url::parse(&auth_url)
            .map_err(|e| Error::config(format!("invalid oauth.auth_url for '{server_name}': {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &client_id);
            query.append_pair("redirect_uri", &redirect_uri);
            query.append_pair("response_type", "code");
            query.append_pair("state", &state);
            query.append_pair("code_challenge", &code_challenge);
            query.append_pair("code_challenge_method", "S256");
            if !oauth.scopes.is_empty() {
                query.append_pair("scope", &oauth.scopes.join(" "));
            }
        }

        let (code_tx, code_rx) = oneshot::channel::<String>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let code_tx = Arc::new(Mutex::new(Some(code_tx)));
        let expected_state = state.clone();

        let app = axum::Router::new().route(
            "/callback",
            axum::routing::get(move |Query(params): Query<HashMap<String, String>>| {
                let code_tx = Arc::clone(&code_tx);
                let expected_state = expected_state.clone();
                async move {
                    let matches_state = params.get("state").map(String::as_str) == Some(expected_state.as_str());
                    if matches_state {
                        if let Some(code) = params.get("code") {
                            if let Ok(mut guard) = code_tx.lock() {
                                if let Some(tx) = guard.take() {
                                    let _ = tx.send(code.clone());
                                }
                            }
                        }
                    }
                    Html("<html><body>Authorization received. You may close this window.</body></html>")
                }
            }),
        );

        let server_task = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Ok(Self {
            server_name: server_name.to_owned(),
            authorize_url: url.to_string(),
            redirect_uri,
            code_verifier,
            token_url,
            client_id,
            client_secret_ref: oauth.client_secret.clone(),
            code_rx,
            shutdown_tx,
            server_task,
        })
    }

    #[must_use]
    pub fn authorize_url(&self) -> &str {
        &self.authorize_url
    }

    /// Waits up to `timeout` for the redirect, then exchanges the code
    /// for tokens and tears down the loopback listener.
    pub async fn complete(self, timeout: Duration, secrets: &dyn SecretResolver) -> Result<mcproxy_domain::entities::OAuthState> {
        let code = tokio::time::timeout(timeout, self.code_rx)
            .await
            .map_err(|_| Error::Timeout(timeout))?
            .map_err(|_| Error::internal("oauth callback channel closed before a code arrived"))?;

        let _ = self.shutdown_tx.send(());
        let _ = self.server_task.await;

        let client_secret = match &self.client_secret_ref {
            Some(raw) => Some(
                secrets
                    .resolve(raw, &format!("{}.oauth.client_secret", self.server_name))
                    .await?,
            ),
            None => None,
        };

        let mut form = vec![
            ("grant_type", "authorization_code".to_owned()),
            ("code", code),
            ("redirect_uri", self.redirect_uri),
            ("client_id", self.client_id),
            ("code_verifier", self.code_verifier),
        ];
        if let Some(secret) = client_secret {
            form.push(("client_secret", secret));
        }

        let response = reqwest::Client::new()
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::UpstreamError {
                server: self.server_name.clone(),
                message: format!("oauth token exchange: {e}"),
            })?;
        let payload: TokenResponse = response.json().await.map_err(|e| Error::UpstreamError {
            server: self.server_name.clone(),
            message: format!("oauth token response: {e}"),
        })?;

        Ok(mcproxy_domain::entities::OAuthState {
            access_token: Some(payload.access_token),
            refresh_token: payload.refresh_token,
            expires_at: payload
                .expires_in
                .map(|secs| chrono::Utc::now() + chrono::Duration::seconds(secs as i64)),
            last_error: None,
            auth_url: None,
            pending_code_verifier: None,
        })
    }
}

fn generate_code_verifier() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn code_challenge_s256(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_challenge_is_stable_for_a_given_verifier() {
        let verifier = "fixed-test-verifier";
        assert_eq!(code_challenge_s256(verifier), code_challenge_s256(verifier));
    }

    #[test]
    fn code_verifiers_are_not_reused() {
        assert_ne!(generate_code_verifier(), generate_code_verifier());
    }
}
