//! `${env:VAR}` resolution against the daemon's own process environment.

use async_trait::async_trait;
use mcproxy_domain::error::{Error, Result};
use mcproxy_domain::ports::SecretResolver;

/// Resolves `${env:VAR}` by reading the daemon's process environment
/// at the moment of resolution — never cached, never persisted (§4.2).
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecretResolver;

impl EnvSecretResolver {
    /// Looks up `var` directly, bypassing the `${env:...}` reference syntax.
    ///
    /// # Errors
    /// Returns [`Error::MissingSecret`] if the variable is unset.
    pub fn lookup(&self, var: &str, used_by: &str) -> Result<String> {
        std::env::var(var).map_err(|_| Error::MissingSecret {
            name: format!("env:{var}"),
            used_by: vec![used_by.to_owned()],
        })
    }
}

#[async_trait]
impl SecretResolver for EnvSecretResolver {
    async fn resolve(&self, raw: &str, used_by: &str) -> Result<String> {
        match raw.strip_prefix("env:") {
            Some(var) => self.lookup(var, used_by),
            None => Ok(raw.to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_set_variable() {
        std::env::set_var("MCPROXY_TEST_VAR_ENV", "secret-value");
        let resolver = EnvSecretResolver;
        let value = resolver.resolve("env:MCPROXY_TEST_VAR_ENV", "gh.env.TOKEN").await.unwrap();
        assert_eq!(value, "secret-value");
        std::env::remove_var("MCPROXY_TEST_VAR_ENV");
    }

    #[tokio::test]
    async fn missing_variable_surfaces_missing_secret() {
        let resolver = EnvSecretResolver;
        let err = resolver
            .resolve("env:MCPROXY_DOES_NOT_EXIST_XYZ", "gh.env.TOKEN")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingSecret { .. }));
    }

    #[tokio::test]
    async fn plain_string_passes_through() {
        let resolver = EnvSecretResolver;
        let value = resolver.resolve("plain-value", "gh.env.TOKEN").await.unwrap();
        assert_eq!(value, "plain-value");
    }
}
