//! Diagnostics (§4.12): a read-only aggregation of upstream errors,
//! auth-required servers, unresolved secrets and runtime warnings into
//! a single health report. Never mutates state.

use std::sync::Arc;

use mcproxy_domain::entities::UpstreamState;
use mcproxy_domain::ports::{SecretResolver, UpstreamManager};

/// One server currently reporting a connection error.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ServerErrorEntry {
    /// Server name.
    pub server_name: String,
    /// The last error observed by its Upstream Client.
    pub message: String,
}

/// One secret reference that failed to resolve.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MissingSecretEntry {
    /// The unresolved secret name.
    pub name: String,
    /// Servers/fields referencing it.
    pub used_by: Vec<String>,
}

/// Best-effort version check result.
#[derive(Debug, Clone, serde::Serialize)]
pub struct VersionCheck {
    /// The version this daemon is running.
    pub current: String,
    /// The latest known version, if the check succeeded.
    pub latest: Option<String>,
    /// Whether `latest` is newer than `current`.
    pub update_available: bool,
}

/// The full diagnostics snapshot (§4.12).
#[derive(Debug, Clone, serde::Serialize)]
pub struct DiagnosticsReport {
    /// Servers whose Upstream Client is in `Failed`.
    pub server_errors: Vec<ServerErrorEntry>,
    /// Servers whose Upstream Client is in `AuthRequired`.
    pub auth_required: Vec<String>,
    /// Secret references that could not be resolved, deduplicated by name.
    pub missing_secrets: Vec<MissingSecretEntry>,
    /// Free-text runtime warnings collected from other components
    /// (e.g. "container runtime unavailable").
    pub warnings: Vec<String>,
    /// Best-effort latest-version check, `None` if it could not run.
    pub version_check: Option<VersionCheck>,
}

/// Aggregates diagnostics across the Upstream Manager and Secret Resolver.
pub struct DiagnosticsService {
    upstream: Arc<dyn UpstreamManager>,
    secrets: Arc<dyn SecretResolver>,
    current_version: String,
}

impl DiagnosticsService {
    /// Builds a diagnostics aggregator over its collaborators.
    #[must_use]
    pub fn new(upstream: Arc<dyn UpstreamManager>, secrets: Arc<dyn SecretResolver>, current_version: String) -> Self {
        Self {
            upstream,
            secrets,
            current_version,
        }
    }

    /// Builds the current report. `runtime_warnings` are appended
    /// verbatim; they originate from components (transports, config
    /// watcher) that have no other diagnostic surface.
    ///
    /// The version check is best-effort: `latest_version` is supplied
    /// by the caller (who owns the network fetch) and absent if it
    /// failed or was not attempted.
    pub async fn report(&self, runtime_warnings: Vec<String>, latest_version: Option<String>) -> DiagnosticsReport {
        let statuses = self.upstream.list().await;

        let mut server_errors = Vec::new();
        let mut auth_required = Vec::new();
        let mut secret_refs: Vec<(String, String)> = Vec::new();

        for status in &statuses {
            match &status.state {
                UpstreamState::Failed { last_error } => server_errors.push(ServerErrorEntry {
                    server_name: status.config.name.clone(),
                    message: last_error.clone(),
                }),
                UpstreamState::AuthRequired { .. } => auth_required.push(status.config.name.clone()),
                _ => {}
            }

            for (key, value) in &status.config.env {
                secret_refs.push((value.clone(), format!("{}.env.{key}", status.config.name)));
            }
            for (key, value) in &status.config.headers {
                secret_refs.push((value.clone(), format!("{}.headers.{key}", status.config.name)));
            }
            if let Some(oauth) = &status.config.oauth {
                if let Some(secret) = &oauth.client_secret {
                    secret_refs.push((secret.clone(), format!("{}.oauth.client_secret", status.config.name)));
                }
            }
        }

        let mut missing: std::collections::BTreeMap<String, Vec<String>> = std::collections::BTreeMap::new();
        for (raw, used_by) in secret_refs {
            if let Err(err) = self.secrets.resolve(&raw, &used_by).await {
                if let mcproxy_domain::error::Error::MissingSecret { name, .. } = err {
                    missing.entry(name).or_default().push(used_by);
                }
            }
        }
        let missing_secrets = missing
            .into_iter()
            .map(|(name, used_by)| MissingSecretEntry { name, used_by })
            .collect();

        let version_check = Some(VersionCheck {
            update_available: latest_version
                .as_deref()
                .is_some_and(|latest| latest != self.current_version),
            current: self.current_version.clone(),
            latest: latest_version,
        });

        DiagnosticsReport {
            server_errors,
            auth_required,
            missing_secrets,
            warnings: runtime_warnings,
            version_check,
        }
    }
}
