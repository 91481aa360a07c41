//! Structured logging setup, the ambient stack for every other
//! component in the workspace.

mod rotation;
mod setup;

pub use rotation::SizeRotatingWriter;
pub use setup::{init_logging, parse_log_level};
