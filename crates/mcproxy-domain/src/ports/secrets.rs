//! Secret Resolver port (§4.2).

use async_trait::async_trait;

use crate::error::Result;

/// Resolves `${type:name}` references lazily, at the moment a value is
/// about to be used (command spawn, header emission) — never cached
/// or persisted (§4.2).
#[async_trait]
pub trait SecretResolver: Send + Sync {
    /// Resolves `raw` if it is a `${type:name}` reference, otherwise
    /// returns it unchanged (plain strings pass through).
    ///
    /// `used_by` identifies the caller for `ErrMissingSecret` reporting.
    async fn resolve(&self, raw: &str, used_by: &str) -> Result<String>;
}
