//! Dispatches `${type:name}` references to the resolver for `type`.

use std::sync::OnceLock;

use async_trait::async_trait;
use mcproxy_domain::error::{Error, Result};
use mcproxy_domain::ports::SecretResolver;
use regex::Regex;

use crate::secrets::{EnvSecretResolver, KeyringSecretResolver};

fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\$\{([a-zA-Z_][a-zA-Z0-9_]*):(.+)\}$").expect("static pattern is valid"))
}

/// The `${type:name}` reference syntax, parsed once so every caller
/// shares one regex compilation (§4.2).
fn parse_reference(raw: &str) -> Option<(&str, &str)> {
    let captures = reference_pattern().captures(raw)?;
    Some((captures.get(1)?.as_str(), captures.get(2)?.as_str()))
}

/// The daemon's single [`SecretResolver`]: recognizes `${env:VAR}` and
/// `${keyring:NAME}`, passing through anything else (including plain
/// strings and malformed `${...}` that don't match either form)
/// unchanged, per §4.2 "plain strings pass through".
#[derive(Debug, Default, Clone, Copy)]
pub struct CompositeSecretResolver {
    env: EnvSecretResolver,
    keyring: KeyringSecretResolver,
}

impl CompositeSecretResolver {
    /// Builds the composite resolver over its two built-in backends.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretResolver for CompositeSecretResolver {
    async fn resolve(&self, raw: &str, used_by: &str) -> Result<String> {
        let Some((kind, name)) = parse_reference(raw) else {
            return Ok(raw.to_owned());
        };
        match kind {
            "env" => self.env.resolve(&format!("env:{name}"), used_by).await,
            "keyring" => self.keyring.resolve(&format!("keyring:{name}"), used_by).await,
            other => Err(Error::MissingSecret {
                name: format!("{other}:{name}"),
                used_by: vec![format!("{used_by} (unknown secret type '{other}')")],
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_reference() {
        assert_eq!(parse_reference("${env:TOKEN}"), Some(("env", "TOKEN")));
        assert_eq!(parse_reference("${keyring:gh_oauth}"), Some(("keyring", "gh_oauth")));
    }

    #[test]
    fn non_reference_strings_are_not_parsed() {
        assert_eq!(parse_reference("plain-string"), None);
        assert_eq!(parse_reference("${incomplete"), None);
    }

    #[tokio::test]
    async fn plain_string_passes_through() {
        let resolver = CompositeSecretResolver::new();
        let value = resolver.resolve("plain-value", "gh.headers.Authorization").await.unwrap();
        assert_eq!(value, "plain-value");
    }

    #[tokio::test]
    async fn env_reference_resolves() {
        std::env::set_var("MCPROXY_TEST_COMPOSITE", "abc123");
        let resolver = CompositeSecretResolver::new();
        let value = resolver
            .resolve("${env:MCPROXY_TEST_COMPOSITE}", "gh.env.TOKEN")
            .await
            .unwrap();
        assert_eq!(value, "abc123");
        std::env::remove_var("MCPROXY_TEST_COMPOSITE");
    }

    #[tokio::test]
    async fn unknown_type_is_missing_secret() {
        let resolver = CompositeSecretResolver::new();
        let err = resolver.resolve("${vault:foo}", "gh.env.TOKEN").await.unwrap_err();
        assert!(matches!(err, Error::MissingSecret { .. }));
    }
}
