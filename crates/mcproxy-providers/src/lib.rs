//! Concrete adapters for every external-collaborator port the domain
//! layer defines: upstream transports and the client/manager actors
//! that drive them, secret resolution, policy evaluation, and the
//! in-memory tool index.

pub mod policy;
pub mod secrets;
pub mod tool_index;
pub mod transport;
pub mod upstream;

pub use policy::RulePolicyEngine;
pub use secrets::CompositeSecretResolver;
pub use tool_index::InvertedToolIndex;
pub use transport::{build_transport, RmcpUpstreamTransport, TransportSpec};
pub use upstream::{ActorUpstreamManager, ClientCommand, ClientHandle};
