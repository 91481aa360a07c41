//! Configuration loading and hot-reload (§4.10, §6).

pub mod loader;
pub mod model;
pub mod watcher;

pub use loader::ConfigLoader;
pub use model::{DaemonConfig, LoggingConfig};
pub use watcher::ConfigWatcher;
