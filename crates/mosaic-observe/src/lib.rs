//! Logging and trace export for Mosaic.

pub mod attrs;
pub mod tracing_setup;
