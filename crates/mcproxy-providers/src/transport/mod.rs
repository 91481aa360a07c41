//! Upstream transport implementations (§4.3).
//!
//! One [`RmcpUpstreamTransport`] wraps whichever concrete `rmcp`
//! client transport a [`ServerConfig`](mcproxy_domain::entities::ServerConfig)
//! resolves to; the Upstream Client actor only ever talks to the
//! `UpstreamTransport` trait object.

mod rmcp_transport;
mod spec;

pub use rmcp_transport::RmcpUpstreamTransport;
pub use spec::{build_transport, TransportSpec};
