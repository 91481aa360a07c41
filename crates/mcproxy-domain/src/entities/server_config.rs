//! The declarative unit: [`ServerConfig`] (§3).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How the upstream client should talk to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Protocol {
    /// JSON-RPC over a stdio subprocess.
    Stdio,
    /// Plain HTTP JSON-RPC.
    Http,
    /// Server-sent events transport.
    Sse,
    /// The newer streamable-HTTP MCP transport.
    StreamableHttp,
    /// Probe the endpoint and pick a protocol automatically.
    #[default]
    Auto,
}

/// OAuth client configuration for a server that requires it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// OAuth client id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// OAuth client secret reference (e.g. `${keyring:gh_oauth_secret}`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Authorization endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,
    /// Token endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
    /// Requested OAuth scopes.
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// Container/sandbox isolation settings for a stdio server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IsolationConfig {
    /// Whether the server should be launched inside a container.
    #[serde(default)]
    pub enabled: bool,
    /// Container image to use, when `enabled`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// The declarative configuration for one upstream server (§3 `ServerConfig`).
///
/// `name` and `created_at` are immutable after creation; every other
/// field may be changed through [`crate::ports::config::merge`]
/// semantics (§4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Unique name, `[A-Za-z0-9_-]`, 1-64 chars. Immutable.
    pub name: String,
    /// Creation timestamp (RFC3339). Immutable.
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Remote endpoint URL. Mutually exclusive with `command`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Subprocess command to launch. Mutually exclusive with `url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Transport discriminator.
    #[serde(default)]
    pub protocol: Protocol,
    /// Subprocess arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment variables, values may reference secrets.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// HTTP headers, values may reference secrets.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Working directory for the subprocess.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    /// OAuth configuration, if this server requires it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth: Option<OAuthConfig>,
    /// Isolation/sandboxing configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isolation: Option<IsolationConfig>,
    /// Whether the server is allowed to run at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Administrative quarantine; overrides `enabled`.
    #[serde(default)]
    pub quarantined: bool,
}

fn default_true() -> bool {
    true
}

impl ServerConfig {
    /// Validates the structural invariants of §3: name format, exactly
    /// one transport discriminator present.
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] if the name is malformed or
    /// the transport discriminator is ambiguous.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.len() > 64 {
            return Err(Error::InvalidArgument {
                message: format!("server name '{}' must be 1-64 characters", self.name),
            });
        }
        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(Error::InvalidArgument {
                message: format!(
                    "server name '{}' must match [A-Za-z0-9_-]",
                    self.name
                ),
            });
        }
        match (&self.url, &self.command) {
            (Some(_), Some(_)) => {
                return Err(Error::InvalidArgument {
                    message: "exactly one of 'url' or 'command' must be set, not both"
                        .to_owned(),
                });
            }
            (None, None) => {
                return Err(Error::InvalidArgument {
                    message: "exactly one of 'url' or 'command' must be set".to_owned(),
                });
            }
            _ => {}
        }
        Ok(())
    }

    /// New servers default to quarantined (§3 lifecycle).
    #[must_use]
    pub fn new_default_quarantined(name: String) -> Self {
        Self {
            name,
            created_at: chrono::Utc::now(),
            url: None,
            command: None,
            protocol: Protocol::Auto,
            args: Vec::new(),
            env: HashMap::new(),
            headers: HashMap::new(),
            working_dir: None,
            oauth: None,
            isolation: None,
            enabled: true,
            quarantined: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ServerConfig {
        let mut c = ServerConfig::new_default_quarantined("gh".to_owned());
        c.command = Some("gh-mcp".to_owned());
        c
    }

    #[test]
    fn rejects_both_transports() {
        let mut c = base();
        c.url = Some("http://localhost".to_owned());
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_neither_transport() {
        let mut c = base();
        c.command = None;
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_bad_name() {
        let mut c = base();
        c.name = "bad name!".to_owned();
        assert!(c.validate().is_err());
    }

    #[test]
    fn new_server_is_quarantined() {
        let c = ServerConfig::new_default_quarantined("x".to_owned());
        assert!(c.quarantined);
    }
}
