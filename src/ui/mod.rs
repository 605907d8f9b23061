//! UI layer: line-oriented shell over stdin/stdout.

pub mod event_source;
pub mod render;
pub mod screen;
pub mod shell;

/// Returns the UI module name for smoke checks.
pub fn module_name() -> &'static str {
    "ui"
}
