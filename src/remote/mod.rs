//! Remote layer: HTTP API client, WebSocket channel, and the in-process event bus.

pub mod dto;
pub mod event_bus;
pub mod realtime;
pub mod rest;

/// Returns the remote module name for smoke checks.
pub fn module_name() -> &'static str {
    "remote"
}
