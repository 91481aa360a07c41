//! [`RmcpUpstreamTransport`]: [`UpstreamTransport`] over the `rmcp` client.

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use rmcp::model::CallToolRequestParam;
use rmcp::service::RunningService;
use rmcp::transport::sse_client::SseClientConfig;
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::transport::{ConfigureCommandExt, SseClientTransport, StreamableHttpClientTransport, TokioChildProcess};
use rmcp::{RoleClient, ServiceExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use mcproxy_domain::entities::ToolDescriptor;
use mcproxy_domain::error::{Error, Result};
use mcproxy_domain::ports::{ToolCallOutcome, UpstreamTransport};
use mcproxy_domain::value_objects::{Intent, ServerIdentity};

use super::spec::TransportSpec;

type Client = RunningService<RoleClient, ()>;

fn http_client(headers: &std::collections::HashMap<String, String>) -> Result<reqwest::Client> {
    let mut map = reqwest::header::HeaderMap::new();
    for (name, value) in headers {
        let header_name = reqwest::header::HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::config(format!("invalid header name '{name}': {e}")))?;
        let header_value = reqwest::header::HeaderValue::from_str(value)
            .map_err(|e| Error::config(format!("invalid header value for '{name}': {e}")))?;
        map.insert(header_name, header_value);
    }
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .default_headers(map)
        .build()
        .map_err(Error::internal)
}

async fn connect_stdio(
    command: &str,
    args: &[String],
    env: &std::collections::HashMap<String, String>,
    working_dir: &Option<String>,
) -> Result<Client> {
    let mut cmd = tokio::process::Command::new(command);
    let env = env.clone();
    let working_dir = working_dir.clone();
    let args = args.to_vec();
    let transport = TokioChildProcess::new(cmd.configure(move |c| {
        c.args(&args).envs(env.iter()).stderr(std::process::Stdio::inherit());
        if let Some(dir) = &working_dir {
            c.current_dir(dir);
        }
    }))
    .map_err(|e| Error::UpstreamError {
        server: command.to_owned(),
        message: format!("spawn stdio transport: {e}"),
    })?;
    ().serve(transport)
        .await
        .map_err(|e| Error::UpstreamError {
            server: command.to_owned(),
            message: format!("initialize stdio client: {e}"),
        })
}

async fn connect_sse(url: &str, headers: &std::collections::HashMap<String, String>) -> Result<Client> {
    let client = http_client(headers)?;
    let cfg = SseClientConfig {
        sse_endpoint: url.to_owned().into(),
        ..Default::default()
    };
    let transport = SseClientTransport::start_with_client(client, cfg)
        .await
        .map_err(|e| Error::UpstreamError {
            server: url.to_owned(),
            message: format!("create SSE transport: {e}"),
        })?;
    ().serve(transport)
        .await
        .map_err(|e| Error::UpstreamError {
            server: url.to_owned(),
            message: format!("initialize SSE client: {e}"),
        })
}

async fn connect_streamable_http(url: &str, headers: &std::collections::HashMap<String, String>) -> Result<Client> {
    let transport = if headers.is_empty() {
        StreamableHttpClientTransport::from_uri(url)
    } else {
        let client = http_client(headers)?;
        let cfg = StreamableHttpClientTransportConfig::with_uri(url.to_owned());
        StreamableHttpClientTransport::with_client(client, cfg)
    };
    ().serve(transport)
        .await
        .map_err(|e| Error::UpstreamError {
            server: url.to_owned(),
            message: format!("initialize streamable-http client: {e}"),
        })
}

/// [`UpstreamTransport`] implementation backed by `rmcp`'s client.
///
/// Holds at most one live [`Client`] behind a [`Mutex`]; `connect` is
/// idempotent because a connected transport returns immediately
/// without reacquiring anything, and concurrent callers serialize on
/// the same lock and observe the first caller's result (§4.3
/// "concurrent callers coalesce to a single attempt").
pub struct RmcpUpstreamTransport {
    server_name: String,
    spec: TransportSpec,
    client: Mutex<Option<Client>>,
}

impl RmcpUpstreamTransport {
    /// Builds a transport for `server_name` described by `spec`. Not
    /// yet connected.
    #[must_use]
    pub fn new(server_name: String, spec: TransportSpec) -> Self {
        Self {
            server_name,
            spec,
            client: Mutex::new(None),
        }
    }

    async fn dial(&self) -> Result<Client> {
        match &self.spec {
            TransportSpec::Stdio { command, args, env, working_dir } => {
                connect_stdio(command, args, env, working_dir).await
            }
            TransportSpec::Sse { url, headers } => connect_sse(url, headers).await,
            TransportSpec::StreamableHttp { url, headers } => connect_streamable_http(url, headers).await,
            TransportSpec::AutoHttp { url, headers } => match connect_streamable_http(url, headers).await {
                Ok(client) => Ok(client),
                Err(_) => connect_sse(url, headers).await,
            },
        }
    }
}

#[async_trait]
impl UpstreamTransport for RmcpUpstreamTransport {
    async fn connect(&self, cancel: CancellationToken) -> Result<()> {
        let mut guard = self.client.lock().await;
        if guard.is_some() {
            return Ok(());
        }
        let client = tokio::select! {
            result = self.dial() => result?,
            () = cancel.cancelled() => return Err(Error::Canceled),
        };
        *guard = Some(client);
        Ok(())
    }

    async fn list_tools(&self, server_id: &ServerIdentity) -> Result<Vec<ToolDescriptor>> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or_else(|| Error::UpstreamUnavailable {
            server: self.server_name.clone(),
            reason: "not connected".to_owned(),
        })?;
        let result = client.list_tools(Default::default()).await.map_err(|e| Error::UpstreamError {
            server: self.server_name.clone(),
            message: format!("list_tools: {e}"),
        })?;
        Ok(result
            .tools
            .into_iter()
            .map(|tool| ToolDescriptor {
                server_id: server_id.clone(),
                server_name: self.server_name.clone(),
                tool_name: tool.name.to_string(),
                params_schema: serde_json::Value::Object((*tool.input_schema).clone()),
                description: tool.description.map(|d| d.to_string()).unwrap_or_default(),
            })
            .collect())
    }

    async fn call_tool(
        &self,
        tool_name: &str,
        args: serde_json::Value,
        _intent: Option<&Intent>,
        cancel: CancellationToken,
    ) -> Result<ToolCallOutcome> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or_else(|| Error::UpstreamUnavailable {
            server: self.server_name.clone(),
            reason: "not connected".to_owned(),
        })?;
        let arguments = match args {
            serde_json::Value::Object(map) => Some(map),
            serde_json::Value::Null => None,
            other => {
                return Err(Error::InvalidArgument {
                    message: format!("tool arguments must be a JSON object, got {other}"),
                })
            }
        };
        let request = CallToolRequestParam {
            name: Cow::Owned(tool_name.to_owned()),
            arguments,
        };
        let result = tokio::select! {
            result = client.call_tool(request) => result.map_err(|e| Error::UpstreamError {
                server: self.server_name.clone(),
                message: format!("call_tool '{tool_name}': {e}"),
            })?,
            () = cancel.cancelled() => return Err(Error::Canceled),
        };
        let is_error = result.is_error.unwrap_or(false);
        let value = serde_json::to_value(&result.content).map_err(Error::from)?;
        Ok(ToolCallOutcome {
            result: value,
            is_error,
        })
    }

    async fn close(&self, grace: Duration) {
        let client = {
            let mut guard = self.client.lock().await;
            guard.take()
        };
        if let Some(client) = client {
            let _ = tokio::time::timeout(grace, client.cancel()).await;
        }
    }
}
