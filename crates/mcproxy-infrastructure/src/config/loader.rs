//! Loads [`DaemonConfig`] from `mcp_config.json`, layered with
//! environment overrides (§6 "Configuration file").

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Json};
use figment::Figment;
use mcproxy_domain::error::{Error, Result};

use crate::config::model::DaemonConfig;

/// Reads and writes `mcp_config.json`.
///
/// The Configuration Reconciler (`mcproxy-application`) is the only
/// component that should call [`ConfigLoader::save`]; every other
/// reader goes through a snapshot handed out by
/// [`crate::config::ConfigWatcher`].
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    path: PathBuf,
}

impl ConfigLoader {
    /// Points the loader at a specific `mcp_config.json` path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The config file path this loader reads and writes.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the configuration, layering `MCPROXY_*` environment
    /// variables over the file (environment wins).
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the file is missing or malformed.
    pub fn load(&self) -> Result<DaemonConfig> {
        Figment::new()
            .merge(Json::file(&self.path))
            .merge(Env::prefixed("MCPROXY_").split("__"))
            .extract()
            .map_err(|err| Error::config(format!("failed to load '{}': {err}", self.path.display())))
    }

    /// Loads the configuration if the file exists, otherwise returns a
    /// fresh default rooted at `data_dir` (first-run bootstrap).
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the file exists but is malformed.
    pub fn load_or_default(&self, data_dir: PathBuf) -> Result<DaemonConfig> {
        if self.path.exists() {
            self.load()
        } else {
            Ok(DaemonConfig::new_default(data_dir))
        }
    }

    /// Writes `config` back to disk as pretty-printed JSON.
    ///
    /// This is the only write path for `mcp_config.json`; callers must
    /// route mutations through the Configuration Reconciler first.
    ///
    /// # Errors
    /// Returns [`Error::Io`] or [`Error::Json`] on failure.
    pub fn save(&self, config: &DaemonConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(config)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_minimal_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mcp_config.json");
        std::fs::write(&path, r#"{"data_dir": "/var/lib/mcproxy"}"#).unwrap();

        let loader = ConfigLoader::new(&path);
        let config = loader.load().unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/mcproxy"));
        assert_eq!(config.tool_response_limit, 50_000);
        assert!(config.mcp_servers.is_empty());
    }

    #[test]
    fn ignores_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mcp_config.json");
        std::fs::write(
            &path,
            r#"{"data_dir": "/var/lib/mcproxy", "some_future_field": 42}"#,
        )
        .unwrap();

        let loader = ConfigLoader::new(&path);
        assert!(loader.load().is_ok());
    }

    #[test]
    fn round_trips_through_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mcp_config.json");
        let loader = ConfigLoader::new(&path);

        let config = DaemonConfig::new_default(dir.path().to_path_buf());
        loader.save(&config).unwrap();

        let reloaded = loader.load().unwrap();
        assert_eq!(reloaded.data_dir, config.data_dir);
    }

    #[test]
    fn missing_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does_not_exist.json");
        let loader = ConfigLoader::new(&path);
        let config = loader.load_or_default(dir.path().to_path_buf()).unwrap();
        assert!(config.mcp_servers.is_empty());
    }
}
