/// Loading configuration structs and primitives from environment variables.
pub mod from_env;

/// OTLP trace export, enabled by `OTEL_EXPORTER_OTLP_ENDPOINT`.
pub mod otlp;

/// Global subscriber installation.
pub mod tracing;
