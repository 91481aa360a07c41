//! Upstream Client actor and Upstream Manager registry (§4.3, §4.4).
//!
//! One [`client::ClientActor`] per configured server, modeled exactly
//! as the "actor with inbox" shape §5 calls for: a `tokio` task owning
//! its transport and state machine exclusively, driven by a bounded
//! `mpsc` mailbox. [`manager::ActorUpstreamManager`] is the
//! `server_id -> ClientHandle` registry the Dispatch Engine and
//! Control Surface talk to.

mod client;
mod manager;
mod oauth_flow;

pub use client::{ClientCommand, ClientHandle};
pub use manager::ActorUpstreamManager;
