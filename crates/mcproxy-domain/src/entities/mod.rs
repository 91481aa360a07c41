//! Core business entities with identity.

mod activity;
mod oauth;
mod server_config;
mod tool_descriptor;
mod upstream_state;

pub use activity::{ActivityRecord, ActivitySource, ActivityStatus, ActivityType};
pub use oauth::OAuthState;
pub use server_config::{IsolationConfig, OAuthConfig, Protocol, ServerConfig};
pub use tool_descriptor::ToolDescriptor;
pub use upstream_state::UpstreamState;
