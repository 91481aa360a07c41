//! Activity Bus implementation (§4.6).

pub mod activity_bus;

pub use activity_bus::BroadcastActivityBus;
