//! The MCP-over-HTTP surface (§4.11, §6): the daemon presents itself
//! as a single aggregate MCP server whose tools are the union of every
//! upstream's tools, qualified `server:tool`.
//!
//! Every call is routed through the same [`DispatchEngine`] the REST
//! `/tools/call` endpoint uses (§4.8), so policy, truncation and
//! activity recording behave identically regardless of which surface
//! a client came in through.

use std::sync::Arc;

use mcproxy_application::use_cases::dispatch_service::DispatchRequest;
use mcproxy_domain::entities::ActivitySource;
use rmcp::model as mcp;
use rmcp::service::{NotificationContext, RequestContext};
use rmcp::{RoleServer, Service as McpService};
use tokio_util::sync::CancellationToken;

use crate::state::AppState;

/// One `rmcp` service instance per HTTP session, sharing the daemon's
/// [`AppState`].
#[derive(Clone)]
pub struct McpSurface {
    state: AppState,
}

impl McpSurface {
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    fn server_info() -> mcp::ServerInfo {
        mcp::ServerInfo {
            protocol_version: mcp::ProtocolVersion::V_2025_03_26,
            capabilities: mcp::ServerCapabilities::builder()
                .enable_tools()
                .enable_tool_list_changed()
                .build(),
            server_info: mcp::Implementation {
                name: "mcproxy".into(),
                title: Some("mcproxy smart proxy".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Tools are named '<server>:<tool>'. Call 'tools/list' to see the current aggregate catalog.".into(),
            ),
        }
    }

    async fn list_tools(&self) -> Vec<mcp::Tool> {
        let statuses = self.state.upstream.list().await;
        let mut tools = Vec::new();
        for status in statuses {
            for descriptor in self.state.tool_index.list_server(&status.server_id).await {
                let schema = descriptor
                    .params_schema
                    .as_object()
                    .cloned()
                    .unwrap_or_default();
                tools.push(mcp::Tool::new(descriptor.qualified_name(), descriptor.description.clone(), schema));
            }
        }
        tools
    }

    async fn call_tool(&self, params: mcp::CallToolRequestParam) -> mcp::CallToolResult {
        let request = DispatchRequest {
            name: params.name.to_string(),
            args: params
                .arguments
                .map(serde_json::Value::Object)
                .unwrap_or(serde_json::Value::Null),
            intent: None,
            source: ActivitySource::Mcp,
            session_id: None,
            parent_id: None,
            deadline: None,
        };
        match self.state.dispatch.call(request, CancellationToken::new()).await {
            Ok(response) => mcp::CallToolResult {
                content: vec![mcp::Content::text(response.result.to_string())],
                structured_content: Some(response.result),
                is_error: Some(response.is_error),
                meta: None,
            },
            Err(err) => mcp::CallToolResult {
                content: vec![mcp::Content::text(err.to_string())],
                structured_content: None,
                is_error: Some(true),
                meta: None,
            },
        }
    }
}

impl McpService<RoleServer> for McpSurface {
    async fn handle_request(
        &self,
        request: mcp::ClientRequest,
        _context: RequestContext<RoleServer>,
    ) -> Result<mcp::ServerResult, mcp::ErrorData> {
        match request {
            mcp::ClientRequest::InitializeRequest(_) => {
                let info = Self::server_info();
                Ok(mcp::ServerResult::InitializeResult(mcp::InitializeResult {
                    protocol_version: info.protocol_version,
                    capabilities: info.capabilities,
                    server_info: info.server_info,
                    instructions: info.instructions,
                }))
            }
            mcp::ClientRequest::ListToolsRequest(_) => Ok(mcp::ServerResult::ListToolsResult(mcp::ListToolsResult {
                tools: self.list_tools().await,
                next_cursor: None,
            })),
            mcp::ClientRequest::CallToolRequest(req) => {
                Ok(mcp::ServerResult::CallToolResult(self.call_tool(req.params).await))
            }
            other => {
                let _ = other;
                Ok(mcp::ServerResult::empty(()))
            }
        }
    }

    async fn handle_notification(
        &self,
        _notification: mcp::ClientNotification,
        _context: NotificationContext<RoleServer>,
    ) -> Result<(), mcp::ErrorData> {
        Ok(())
    }

    fn get_info(&self) -> mcp::ServerInfo {
        Self::server_info()
    }
}

/// Builds the `axum` service to be nested at `/mcp`, one session per
/// connecting client (§4.11).
#[must_use]
pub fn streamable_http_service(
    state: AppState,
) -> rmcp::transport::streamable_http_server::StreamableHttpService<
    McpSurface,
    rmcp::transport::streamable_http_server::session::local::LocalSessionManager,
> {
    use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
    use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService};

    StreamableHttpService::new(
        move || Ok(McpSurface::new(state.clone())),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig {
            stateful_mode: true,
            sse_keep_alive: Some(std::time::Duration::from_secs(15)),
        },
    )
}
