//! The Control Surface (§4.11): a single HTTP mux serving REST,
//! MCP-over-HTTP and the SSE activity stream over a Unix-domain socket
//! and, optionally, TCP.

pub mod auth;
pub mod error;
pub mod mcp;
pub mod routes;
pub mod sse;
pub mod state;

use std::io;
use std::path::Path;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use state::AppState;

use auth::require_api_key;

/// Assembles the full router: `/api/v1/...`, `/mcp`, `/events`.
///
/// `require_api_key` is layered over the whole router, not just
/// `/api/v1`, so the MCP-over-HTTP endpoint and the SSE stream are
/// authenticated the same as every REST call (§6 "every request...
/// requires `X-API-Key`", with `/events` additionally accepting
/// `?apikey=` since `EventSource` cannot set custom headers).
/// `tower_http::trace::TraceLayer` emits the per-request spans the
/// rest of the daemon already logs through; `CorsLayer::permissive`
/// matches the teacher's posture for a local control-plane surface
/// that is not meant to be reachable cross-origin from a browser
/// except via the documented SSE/`apikey` path.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let mcp_service = mcp::streamable_http_service(state.clone());

    Router::new()
        .nest("/api/v1", routes::api_v1())
        .route("/events", get(sse::events))
        .nest_service("/mcp", mcp_service)
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds a Unix-domain socket at `path`, replacing a stale socket file
/// left behind by an unclean shutdown, and sets mode `0600` (§6).
///
/// # Errors
/// Returns the underlying I/O error from removing the stale file or
/// binding the socket.
pub fn bind_unix_socket(path: &Path) -> io::Result<tokio::net::UnixListener> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    let listener = tokio::net::UnixListener::bind(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(listener)
}

/// Serves `router` on a pre-bound Unix-domain socket until the process
/// is shut down.
///
/// # Errors
/// Returns the underlying I/O error if the listener fails.
pub async fn serve_unix(listener: tokio::net::UnixListener, router: Router) -> io::Result<()> {
    axum::serve(listener, router).await
}

/// Serves `router` on a pre-bound TCP listener until the process is
/// shut down.
///
/// # Errors
/// Returns the underlying I/O error if the listener fails.
pub async fn serve_tcp(listener: tokio::net::TcpListener, router: Router) -> io::Result<()> {
    axum::serve(listener, router).await
}
