//! Use cases: the application-layer services that orchestrate domain
//! ports into the operations of §4.
//!
//! - [`dispatch_service`]: the Dispatch Engine, the hot path every
//!   tool call flows through (§4.8).
//! - [`reconciler_service`]: the Configuration Reconciler / "Smart
//!   Patch" merge (§4.10), the single write path for `ServerConfig`.
//! - [`diagnostics_service`]: read-only health aggregation (§4.12).
//! - [`orchestration_service`]: the sandboxed `call_tool` primitive
//!   exposed to the JavaScript orchestrator (§4.9).

pub mod diagnostics_service;
pub mod dispatch_service;
pub mod orchestration_service;
pub mod reconciler_service;

pub use diagnostics_service::{DiagnosticsReport, DiagnosticsService, MissingSecretEntry, ServerErrorEntry, VersionCheck};
pub use dispatch_service::{truncate_response, DispatchEngine, DispatchRequest, DispatchResponse};
pub use orchestration_service::{OrchestrationLimits, OrchestrationSession, SandboxResult};
pub use reconciler_service::{Change, ConfigReconciler, MergeDiff, MergeOptions};
