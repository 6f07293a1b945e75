//! Span names and the tracer identity used across the CLI.
//!
//! Span names are `&'static str` constants so they can be passed to
//! `tracing::info_span!` and stay consistent in exported traces.

/// Instrumentation scope reported to OpenTelemetry.
pub const TRACER_NAME: &str = "mosaic";

// --- Command spans ---

pub const SPAN_INDEX: &str = "mosaic.index";
pub const SPAN_SEARCH: &str = "mosaic.search";
pub const SPAN_SEARCH_IMAGE: &str = "mosaic.search_image";
pub const SPAN_KEYWORD: &str = "mosaic.keyword";
pub const SPAN_MAINTENANCE: &str = "mosaic.maintenance";

// --- Startup ---

/// Span wrapping composition-root construction and backend initialization.
pub const SPAN_INIT: &str = "mosaic.init";
