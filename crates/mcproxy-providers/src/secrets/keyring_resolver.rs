//! `${keyring:NAME}` resolution against the platform credential store.

use async_trait::async_trait;
use mcproxy_domain::error::{Error, Result};
use mcproxy_domain::ports::SecretResolver;

/// Service name entries are stored under in the OS keyring.
const SERVICE: &str = "mcproxy";

/// Resolves `${keyring:NAME}` via the platform credential store
/// (Keychain on macOS, Secret Service on Linux, Credential Manager on
/// Windows), through the `keyring` crate. Never falls back to a
/// plaintext file (§4.2: "never persist plaintext").
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyringSecretResolver;

impl KeyringSecretResolver {
    /// Looks up `name` directly, bypassing the `${keyring:...}` reference syntax.
    ///
    /// # Errors
    /// Returns [`Error::MissingSecret`] if no entry exists or the
    /// platform keyring is unavailable.
    pub fn lookup(&self, name: &str, used_by: &str) -> Result<String> {
        let entry = keyring::Entry::new(SERVICE, name).map_err(|err| Error::MissingSecret {
            name: format!("keyring:{name}"),
            used_by: vec![format!("{used_by} ({err})")],
        })?;
        entry.get_password().map_err(|err| Error::MissingSecret {
            name: format!("keyring:{name}"),
            used_by: vec![format!("{used_by} ({err})")],
        })
    }

    /// Stores `value` under `name`, for `POST /oauth/{name}/login` and
    /// other flows that obtain a secret at runtime rather than reading
    /// one set up out-of-band.
    ///
    /// # Errors
    /// Returns an error if the platform keyring rejects the write.
    pub fn store(&self, name: &str, value: &str) -> std::result::Result<(), keyring::Error> {
        keyring::Entry::new(SERVICE, name)?.set_password(value)
    }
}

#[async_trait]
impl SecretResolver for KeyringSecretResolver {
    async fn resolve(&self, raw: &str, used_by: &str) -> Result<String> {
        match raw.strip_prefix("keyring:") {
            Some(name) => {
                let name = name.to_owned();
                let used_by = used_by.to_owned();
                let resolver = *self;
                tokio::task::spawn_blocking(move || resolver.lookup(&name, &used_by))
                    .await
                    .map_err(Error::internal)?
            }
            None => Ok(raw.to_owned()),
        }
    }
}
