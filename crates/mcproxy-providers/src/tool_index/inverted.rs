//! In-memory inverted-index tool search (§4.5).
//!
//! Deliberately simple: term-overlap scoring over tokenized tool name
//! and description, with a deterministic tie-break. The port leaves
//! the implementation free (prefix trie, BM25, vector); this is the
//! "prefix trie, BM25, vector, etc." bar met with the smallest thing
//! that gives deterministic top-k (§4.5).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use mcproxy_domain::entities::ToolDescriptor;
use mcproxy_domain::error::Result;
use mcproxy_domain::ports::{ScoredTool, ToolIndex};
use mcproxy_domain::value_objects::ServerIdentity;

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// One generation of the catalog: every indexed descriptor plus its
/// precomputed token set, grouped by owning server for fast removal.
#[derive(Default, Clone)]
struct Catalog {
    by_server: HashMap<ServerIdentity, Vec<(ToolDescriptor, HashSet<String>)>>,
}

impl Catalog {
    fn all(&self) -> impl Iterator<Item = &(ToolDescriptor, HashSet<String>)> {
        self.by_server.values().flatten()
    }
}

/// [`ToolIndex`] backed by an atomically swapped in-memory catalog
/// (§4.5 "old generation dropped only after the new one is published").
pub struct InvertedToolIndex {
    catalog: ArcSwap<Catalog>,
}

impl Default for InvertedToolIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl InvertedToolIndex {
    /// Builds an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self {
            catalog: ArcSwap::from_pointee(Catalog::default()),
        }
    }
}

#[async_trait]
impl ToolIndex for InvertedToolIndex {
    async fn reindex_server(&self, server_id: &ServerIdentity, tools: Vec<ToolDescriptor>) {
        let entries: Vec<_> = tools
            .into_iter()
            .map(|tool| {
                let tokens = tokenize(&format!("{} {}", tool.tool_name, tool.description));
                (tool, tokens)
            })
            .collect();

        loop {
            let current = self.catalog.load();
            let mut next = (**current).clone();
            next.by_server.insert(server_id.clone(), entries.clone());
            let next = Arc::new(next);
            let previous = self.catalog.compare_and_swap(&current, next);
            if Arc::ptr_eq(&previous, &current) {
                break;
            }
        }
    }

    async fn remove_server(&self, server_id: &ServerIdentity) {
        loop {
            let current = self.catalog.load();
            let mut next = (**current).clone();
            next.by_server.remove(server_id);
            let next = Arc::new(next);
            let previous = self.catalog.compare_and_swap(&current, next);
            if Arc::ptr_eq(&previous, &current) {
                break;
            }
        }
    }

    async fn get(&self, server_name: &str, tool_name: &str) -> Option<ToolDescriptor> {
        self.catalog
            .load()
            .all()
            .find(|(tool, _)| tool.server_name == server_name && tool.tool_name == tool_name)
            .map(|(tool, _)| tool.clone())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredTool>> {
        let query_tokens = tokenize(query);
        let catalog = self.catalog.load();

        let mut scored: Vec<ScoredTool> = catalog
            .all()
            .filter_map(|(tool, tokens)| {
                let overlap = tokens.intersection(&query_tokens).count();
                (overlap > 0).then(|| ScoredTool {
                    descriptor: tool.clone(),
                    score: overlap as f64,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.descriptor.server_name.cmp(&b.descriptor.server_name))
                .then_with(|| a.descriptor.tool_name.cmp(&b.descriptor.tool_name))
        });
        scored.truncate(limit);
        Ok(scored)
    }

    async fn list_server(&self, server_id: &ServerIdentity) -> Vec<ToolDescriptor> {
        self.catalog
            .load()
            .by_server
            .get(server_id)
            .map(|entries| entries.iter().map(|(tool, _)| tool.clone()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(server: &str, tool: &str, description: &str) -> ToolDescriptor {
        ToolDescriptor {
            server_id: ServerIdentity::derive(server, "/tmp/c.json"),
            server_name: server.to_owned(),
            tool_name: tool.to_owned(),
            params_schema: serde_json::json!({}),
            description: description.to_owned(),
        }
    }

    #[tokio::test]
    async fn search_finds_by_token_overlap() {
        let index = InvertedToolIndex::new();
        let sid = ServerIdentity::derive("gh", "/tmp/c.json");
        index
            .reindex_server(
                &sid,
                vec![
                    descriptor("gh", "list_repos", "list github repositories"),
                    descriptor("gh", "delete_repo", "delete a github repository"),
                ],
            )
            .await;

        let results = index.search("repository", 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].descriptor.tool_name, "delete_repo");
    }

    #[tokio::test]
    async fn reindex_replaces_old_generation_atomically() {
        let index = InvertedToolIndex::new();
        let sid = ServerIdentity::derive("gh", "/tmp/c.json");
        index.reindex_server(&sid, vec![descriptor("gh", "old_tool", "old")]).await;
        index.reindex_server(&sid, vec![descriptor("gh", "new_tool", "new")]).await;

        let tools = index.list_server(&sid).await;
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].tool_name, "new_tool");
    }

    #[tokio::test]
    async fn remove_server_drops_its_tools() {
        let index = InvertedToolIndex::new();
        let sid = ServerIdentity::derive("gh", "/tmp/c.json");
        index.reindex_server(&sid, vec![descriptor("gh", "t", "d")]).await;
        index.remove_server(&sid).await;
        assert!(index.list_server(&sid).await.is_empty());
    }

    #[tokio::test]
    async fn deterministic_tie_break_by_name() {
        let index = InvertedToolIndex::new();
        let sid_a = ServerIdentity::derive("alpha", "/tmp/c.json");
        let sid_b = ServerIdentity::derive("beta", "/tmp/c.json");
        index.reindex_server(&sid_a, vec![descriptor("alpha", "tool", "shared token")]).await;
        index.reindex_server(&sid_b, vec![descriptor("beta", "tool", "shared token")]).await;

        let results = index.search("shared", 10).await.unwrap();
        assert_eq!(results[0].descriptor.server_name, "alpha");
        assert_eq!(results[1].descriptor.server_name, "beta");
    }
}
