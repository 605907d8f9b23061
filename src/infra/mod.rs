//! Infrastructure layer: config, logging, local storage, and process hooks.

pub mod config;
pub mod contracts;
pub mod error;
pub mod kv_store;
pub mod logging;
pub mod secrets;
pub mod storage_layout;
#[cfg(test)]
pub mod stubs;

/// Returns the infra module name for smoke checks.
pub fn module_name() -> &'static str {
    "infra"
}
