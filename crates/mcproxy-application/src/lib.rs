//! # Application Layer
//!
//! Use cases that orchestrate domain ports into the proxy's behavior:
//! the Dispatch Engine, the Configuration Reconciler, Diagnostics, and
//! the Orchestration Sandbox Adapter (§4.8-§4.12).
//!
//! This crate depends only on `mcproxy-domain` and pure-Rust async
//! libraries; it has no knowledge of `sled`, `axum`, or any concrete
//! transport. Collaborators are always received as `Arc<dyn Trait>`.
#![allow(missing_docs)]

pub mod use_cases;

pub use use_cases::*;
