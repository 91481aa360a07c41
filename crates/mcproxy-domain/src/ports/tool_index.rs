//! Tool Index port (§4.5).

use async_trait::async_trait;

use crate::entities::ToolDescriptor;
use crate::error::Result;
use crate::value_objects::ServerIdentity;

/// A single search hit.
#[derive(Debug, Clone)]
pub struct ScoredTool {
    /// The matched descriptor.
    pub descriptor: ToolDescriptor,
    /// Relevance score; higher is better. Deterministic for a given
    /// corpus and query (§4.5).
    pub score: f64,
}

/// Maintains a searchable catalog of `(server, tool, schema)` triples.
#[async_trait]
pub trait ToolIndex: Send + Sync {
    /// Atomically replaces the set of tools indexed for one server
    /// (old generation dropped only after the new one is published).
    async fn reindex_server(&self, server_id: &ServerIdentity, tools: Vec<ToolDescriptor>);

    /// Removes every tool belonging to `server_id` from the catalog.
    async fn remove_server(&self, server_id: &ServerIdentity);

    /// Finds the single descriptor for `(server, tool)`, if indexed.
    async fn get(&self, server_name: &str, tool_name: &str) -> Option<ToolDescriptor>;

    /// Returns the top `limit` matches for `query`.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredTool>>;

    /// Lists every tool currently indexed for a server.
    async fn list_server(&self, server_id: &ServerIdentity) -> Vec<ToolDescriptor>;
}
