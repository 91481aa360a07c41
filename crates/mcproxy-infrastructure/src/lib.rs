//! # Infrastructure Layer
//!
//! Concrete adapters for the ports `mcproxy-domain` declares and
//! `mcproxy-application` consumes: the embedded [`PersistentStore`],
//! the [`ActivityBus`] broadcaster, configuration loading/hot-reload,
//! and the logging setup every binary in the workspace shares.
//!
//! [`PersistentStore`]: mcproxy_domain::ports::PersistentStore
//! [`ActivityBus`]: mcproxy_domain::ports::ActivityBus
#![allow(missing_docs)]

/// Configuration file loading, hot-reload watching, and the on-disk
/// `DaemonConfig` shape (§4.10, §6).
pub mod config;
/// [`events::BroadcastActivityBus`], the Activity Bus implementation (§4.6).
pub mod events;
/// Structured logging setup shared by every binary (§4.3 per-server logs).
pub mod logging;
/// [`store::SledStore`], the embedded Persistent Store (§4.1).
pub mod store;
