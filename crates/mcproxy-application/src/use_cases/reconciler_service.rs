//! Configuration Reconciler (§4.10): the single write path for every
//! `ServerConfig` mutation, implementing RFC-7396-like "smart patch"
//! merge semantics with an explicit null-removes-key sentinel.

use mcproxy_domain::entities::ServerConfig;
use mcproxy_domain::error::{Error, Result};

/// Fields a patch may never touch (§4.10).
const IMMUTABLE_FIELDS: &[&str] = &["name", "created_at"];

/// One entry of a merge diff: the value before and after.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Change {
    /// Value before the merge.
    pub from: serde_json::Value,
    /// Value after the merge.
    pub to: serde_json::Value,
}

/// What a merge changed, for audit records and `config_change` SSE events.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MergeDiff {
    /// Paths whose value changed, keyed by dotted JSON path.
    pub modified: std::collections::BTreeMap<String, Change>,
    /// Paths newly introduced by the patch.
    pub added: Vec<String>,
    /// Paths the patch removed via the `null` sentinel.
    pub removed: Vec<String>,
}

impl MergeDiff {
    fn is_empty(&self) -> bool {
        self.modified.is_empty() && self.added.is_empty() && self.removed.is_empty()
    }
}

/// Fields which, when absent from the base, are considered "default"
/// for the purposes of "scalar fields replaced iff the patch value is
/// non-default" (§4.10) — here that collapses to: a patch scalar
/// always replaces, since JSON has no implicit default besides
/// `null`/missing, which are handled by the map/struct rules.
fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Recursively merges `patch` into `base` in place, following §4.10:
/// objects deep-merge with `null` removing a key, arrays replace
/// wholesale, scalars replace wholesale.
fn merge_value(base: &mut serde_json::Value, patch: &serde_json::Value, path: &str, diff: &mut MergeDiff) {
    match (base.as_object_mut(), patch.as_object()) {
        (Some(base_map), Some(patch_map)) => {
            for (key, patch_val) in patch_map {
                let child_path = join_path(path, key);
                match base_map.get(key) {
                    Some(existing) if patch_val.is_null() => {
                        if !existing.is_null() {
                            diff.removed.push(child_path);
                        }
                        base_map.remove(key);
                    }
                    Some(existing) => {
                        if existing.is_object() && patch_val.is_object() {
                            let mut nested = existing.clone();
                            merge_value(&mut nested, patch_val, &child_path, diff);
                            if &nested != existing {
                                base_map.insert(key.clone(), nested);
                            }
                        } else if existing != patch_val {
                            diff.modified.insert(
                                child_path,
                                Change {
                                    from: existing.clone(),
                                    to: patch_val.clone(),
                                },
                            );
                            base_map.insert(key.clone(), patch_val.clone());
                        }
                    }
                    None => {
                        if !patch_val.is_null() {
                            diff.added.push(child_path);
                            base_map.insert(key.clone(), patch_val.clone());
                        }
                    }
                }
            }
        }
        _ => {
            // Non-object at this node: the patch replaces wholesale.
            if base != patch {
                diff.modified.insert(
                    path.to_owned(),
                    Change {
                        from: base.clone(),
                        to: patch.clone(),
                    },
                );
                *base = patch.clone();
            }
        }
    }
}

fn patch_touches_immutable(patch: &serde_json::Value) -> Option<&'static str> {
    let obj = patch.as_object()?;
    IMMUTABLE_FIELDS.iter().find(|f| obj.contains_key(**f)).copied()
}

/// Options controlling one merge call. Currently empty; reserved for
/// future strictness toggles (e.g. reject-unknown-fields).
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {}

/// Merges a JSON patch into a [`ServerConfig`], enforcing immutability
/// and producing an audit diff (§4.10).
///
/// This is the *only* function in the crate that mutates a
/// `ServerConfig`; every caller — REST PATCH, CLI, bulk operations —
/// routes through it.
pub struct ConfigReconciler;

impl ConfigReconciler {
    /// Merges `patch` into `base`, returning the merged config and a diff.
    ///
    /// # Errors
    /// Returns [`Error::ImmutableField`] if the patch touches `name` or
    /// `created_at`, and [`Error::Json`] if either side fails to
    /// round-trip through `serde_json::Value`.
    pub fn merge(base: &ServerConfig, patch: &serde_json::Value, _opts: &MergeOptions) -> Result<(ServerConfig, MergeDiff)> {
        if let Some(field) = patch_touches_immutable(patch) {
            return Err(Error::ImmutableField {
                field: field.to_owned(),
            });
        }

        let mut base_value = serde_json::to_value(base)?;
        let mut diff = MergeDiff::default();
        merge_value(&mut base_value, patch, "", &mut diff);

        let merged: ServerConfig = serde_json::from_value(base_value)?;
        merged.validate()?;

        Ok((merged, diff))
    }

    /// Convenience wrapper returning just the merged config, for
    /// callers that do not need the diff.
    pub fn apply(base: &ServerConfig, patch: &serde_json::Value) -> Result<ServerConfig> {
        Self::merge(base, patch, &MergeOptions::default()).map(|(merged, _)| merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcproxy_domain::entities::{Protocol, ServerConfig};

    fn sample() -> ServerConfig {
        let mut c = ServerConfig::new_default_quarantined("gh".to_owned());
        c.protocol = Protocol::Stdio;
        c.command = Some("gh-mcp".to_owned());
        c.env.insert("FOO".to_owned(), "bar".to_owned());
        c
    }

    #[test]
    fn rejects_immutable_field_patch() {
        let base = sample();
        let patch = serde_json::json!({"name": "renamed"});
        let err = ConfigReconciler::apply(&base, &patch).unwrap_err();
        assert!(matches!(err, Error::ImmutableField { .. }));
    }

    #[test]
    fn null_removes_map_key() {
        let base = sample();
        let patch = serde_json::json!({"env": {"FOO": null}});
        let (merged, diff) = ConfigReconciler::merge(&base, &patch, &MergeOptions::default()).unwrap();
        assert!(!merged.env.contains_key("FOO"));
        assert!(diff.removed.iter().any(|p| p == "env.FOO"));
    }

    #[test]
    fn missing_map_key_preserves_base() {
        let base = sample();
        let patch = serde_json::json!({"env": {"BAZ": "qux"}});
        let (merged, diff) = ConfigReconciler::merge(&base, &patch, &MergeOptions::default()).unwrap();
        assert_eq!(merged.env.get("FOO"), Some(&"bar".to_owned()));
        assert_eq!(merged.env.get("BAZ"), Some(&"qux".to_owned()));
        assert!(diff.added.iter().any(|p| p == "env.BAZ"));
        assert!(!diff.is_empty());
    }

    #[test]
    fn scalar_replace_records_modified() {
        let base = sample();
        let patch = serde_json::json!({"quarantined": false});
        let (merged, diff) = ConfigReconciler::merge(&base, &patch, &MergeOptions::default()).unwrap();
        assert!(!merged.quarantined);
        assert!(diff.modified.contains_key("quarantined"));
    }

    #[test]
    fn no_op_patch_yields_empty_diff() {
        let base = sample();
        let patch = serde_json::json!({"protocol": "stdio"});
        let (_, diff) = ConfigReconciler::merge(&base, &patch, &MergeOptions::default()).unwrap();
        assert!(diff.is_empty());
    }
}
