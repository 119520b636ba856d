use crate::utils::from_env::{FromEnv, FromEnvErr};
use opentelemetry::{trace::TracerProvider, KeyValue};
use opentelemetry_otlp::ExporterBuildError;
use opentelemetry_sdk::{trace::SdkTracerProvider, Resource};
use opentelemetry_semantic_conventions::{
    attribute::{DEPLOYMENT_ENVIRONMENT_NAME, SERVICE_NAME, SERVICE_VERSION},
    SCHEMA_URL,
};
use tracing_subscriber::{registry::LookupSpan, EnvFilter, Layer};
use url::Url;

/// Flushes and shuts down the OTLP exporter when dropped. Hold it in `main`
/// until the run has finished, or the spans of the last run are lost.
#[derive(Debug)]
pub struct OtelGuard {
    provider: SdkTracerProvider,
    filter: EnvFilter,
}

impl OtelGuard {
    /// A tracing layer that exports spans passing the configured filter.
    pub fn layer<S>(&self) -> impl Layer<S>
    where
        S: tracing::Subscriber + for<'span> LookupSpan<'span>,
    {
        tracing_opentelemetry::layer()
            .with_tracer(self.provider.tracer(env!("CARGO_PKG_NAME")))
            .with_filter(self.filter.clone())
    }
}

impl Drop for OtelGuard {
    fn drop(&mut self) {
        if let Err(err) = self.provider.shutdown() {
            eprintln!("failed to shut down OTLP exporter: {err}");
        }
    }
}

/// OTLP export settings.
///
/// Export is on only when `OTEL_EXPORTER_OTLP_ENDPOINT` holds a valid URL.
/// The exporter itself reads the standard `OTEL_EXPORTER_OTLP_*` variables.
#[derive(Debug, Clone, PartialEq, Eq, FromEnv)]
#[from_env(crate)]
#[non_exhaustive]
pub struct OtelConfig {
    /// Where spans are sent.
    #[from_env(
        var = "OTEL_EXPORTER_OTLP_ENDPOINT",
        desc = "OTLP endpoint to send traces to. Export is disabled when unset"
    )]
    pub endpoint: Url,

    /// Filter directives for exported spans, in `RUST_LOG` syntax.
    #[from_env(
        var = "OTEL_LEVEL",
        desc = "Filter for exported spans, e.g. `warn,graph_devflow=debug`. Defaults to RUST_LOG",
        optional
    )]
    pub level: Option<String>,

    /// Value of the `deployment.environment.name` resource attribute.
    #[from_env(
        var = "OTEL_ENVIRONMENT_NAME",
        desc = "Deployment environment name attached to exported spans",
        optional
    )]
    pub environment: Option<String>,
}

impl OtelConfig {
    /// Load from the environment, or [`None`] if export is disabled.
    pub fn load() -> Option<Self> {
        Self::from_env()
            .inspect_err(|err: &FromEnvErr| {
                if !err.is_missing() {
                    eprintln!("OTLP export disabled: {err}");
                }
            })
            .ok()
    }

    fn filter(&self) -> EnvFilter {
        match self.level.as_deref().filter(|level| !level.is_empty()) {
            Some(level) => EnvFilter::new(level),
            None => EnvFilter::from_default_env(),
        }
    }

    fn resource(&self) -> Resource {
        let environment = self.environment.as_deref().unwrap_or("unknown").to_owned();
        Resource::builder()
            .with_schema_url(
                [
                    KeyValue::new(SERVICE_NAME, env!("CARGO_PKG_NAME")),
                    KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
                    KeyValue::new(DEPLOYMENT_ENVIRONMENT_NAME, environment),
                ],
                SCHEMA_URL,
            )
            .build()
    }

    /// Build the HTTP exporter and its batch provider.
    pub fn provider(&self) -> Result<OtelGuard, ExporterBuildError> {
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .build()?;

        let provider = SdkTracerProvider::builder()
            .with_resource(self.resource())
            .with_batch_exporter(exporter)
            .build();

        Ok(OtelGuard {
            provider,
            filter: self.filter(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const ENDPOINT: &str = "http://localhost:4318";
    const VARS: [&str; 3] = [
        "OTEL_EXPORTER_OTLP_ENDPOINT",
        "OTEL_LEVEL",
        "OTEL_ENVIRONMENT_NAME",
    ];

    fn clear_env() {
        VARS.iter().for_each(|var| std::env::remove_var(var));
    }

    #[test]
    #[serial_test::serial]
    fn reads_endpoint_and_level() {
        clear_env();
        std::env::set_var("OTEL_EXPORTER_OTLP_ENDPOINT", ENDPOINT);
        std::env::set_var("OTEL_LEVEL", "debug");

        let cfg = OtelConfig::load().unwrap();
        assert_eq!(cfg.endpoint, ENDPOINT.parse().unwrap());
        assert_eq!(
            cfg.filter().max_level_hint(),
            Some(tracing::Level::DEBUG.into())
        );
        assert_eq!(cfg.environment, None);
        clear_env();
    }

    #[test]
    #[serial_test::serial]
    fn reads_environment() {
        clear_env();
        std::env::set_var("OTEL_EXPORTER_OTLP_ENDPOINT", ENDPOINT);
        std::env::set_var("OTEL_ENVIRONMENT_NAME", "staging");

        let cfg = OtelConfig::load().unwrap();
        assert_eq!(cfg.environment.as_deref(), Some("staging"));
        clear_env();
    }

    #[test]
    #[serial_test::serial]
    fn disabled_without_endpoint() {
        clear_env();
        assert!(OtelConfig::load().is_none());
        assert!(OtelConfig::check_inventory().is_err());
    }

    #[test]
    #[serial_test::serial]
    fn disabled_with_invalid_endpoint() {
        clear_env();
        std::env::set_var("OTEL_EXPORTER_OTLP_ENDPOINT", "not a url");
        assert!(OtelConfig::load().is_none());
        clear_env();
    }
}
