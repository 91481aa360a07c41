//! Resolves a [`ServerConfig`] into a concrete [`TransportSpec`].
//!
//! Secret references in `env`/`headers` must already be resolved by
//! the caller (the Upstream Client actor, right before spawning/
//! connecting) — this module never sees a `${type:name}` reference.

use std::collections::HashMap;

use mcproxy_domain::entities::{Protocol, ServerConfig};

use super::RmcpUpstreamTransport;

/// A fully-resolved description of how to reach one upstream server.
#[derive(Debug, Clone)]
pub enum TransportSpec {
    /// JSON-RPC over a spawned subprocess's stdio.
    Stdio {
        /// Program to execute.
        command: String,
        /// Arguments passed to the program.
        args: Vec<String>,
        /// Resolved environment variables.
        env: HashMap<String, String>,
        /// Working directory, if set.
        working_dir: Option<String>,
    },
    /// Server-sent events transport.
    Sse {
        /// SSE endpoint URL.
        url: String,
        /// Resolved HTTP headers.
        headers: HashMap<String, String>,
    },
    /// The streamable-HTTP MCP transport. Also used for `Protocol::Http`:
    /// `rmcp` does not expose a distinct plain JSON-RPC-over-HTTP client
    /// transport, and the MCP spec's own HTTP transport has effectively
    /// been superseded by streamable-http, so the two protocols share
    /// one implementation here.
    StreamableHttp {
        /// Server endpoint URL.
        url: String,
        /// Resolved HTTP headers.
        headers: HashMap<String, String>,
    },
    /// Try streamable-http first, falling back to SSE if the initial
    /// `initialize` handshake fails — the "probe the endpoint" behavior
    /// `Protocol::Auto` calls for when a URL is configured.
    AutoHttp {
        /// Server endpoint URL.
        url: String,
        /// Resolved HTTP headers.
        headers: HashMap<String, String>,
    },
}

/// Builds the transport for `config`, given already-secret-resolved
/// `env` and `headers` maps.
///
/// # Panics
/// Panics if `config` has neither `command` nor `url` set; callers
/// must call [`ServerConfig::validate`] first, which rejects that
/// combination.
#[must_use]
pub fn build_transport(
    config: &ServerConfig,
    env: HashMap<String, String>,
    headers: HashMap<String, String>,
) -> RmcpUpstreamTransport {
    let spec = match (config.protocol, &config.command, &config.url) {
        (Protocol::Stdio, Some(command), _) | (Protocol::Auto, Some(command), None) => {
            TransportSpec::Stdio {
                command: command.clone(),
                args: config.args.clone(),
                env,
                working_dir: config.working_dir.clone(),
            }
        }
        (Protocol::Sse, _, Some(url)) => TransportSpec::Sse {
            url: url.clone(),
            headers,
        },
        (Protocol::Http | Protocol::StreamableHttp, _, Some(url)) => TransportSpec::StreamableHttp {
            url: url.clone(),
            headers,
        },
        (Protocol::Auto, None, Some(url)) => TransportSpec::AutoHttp {
            url: url.clone(),
            headers,
        },
        _ => unreachable!("ServerConfig::validate guarantees exactly one of command/url is set"),
    };
    RmcpUpstreamTransport::new(config.name.clone(), spec)
}
