use crate::utils::{
    from_env::FromEnvVar,
    otlp::{OtelConfig, OtelGuard},
};
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    Layer,
};

const TRACING_LOG_JSON: &str = "TRACING_LOG_JSON";

/// Add a stderr format layer to `$registry` and install it as the global
/// default. The layer emits JSON when `TRACING_LOG_JSON` is set.
macro_rules! install_fmt {
    ($registry:expr, $filter:expr) => {{
        let fmt = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
        if bool::from_env_var(TRACING_LOG_JSON).unwrap_or(false) {
            $registry.with(fmt.json().with_filter($filter)).init();
        } else {
            $registry.with(fmt.with_filter($filter)).init();
        }
    }};
}

/// Install the global tracing subscriber.
///
/// Logs go to stderr so that stdout only carries the sign-in instructions and
/// the API result. When OTLP export is configured, spans are exported as well
/// and the returned guard must be held until the program exits.
///
/// ## Env Reads
///
/// - `RUST_LOG` - the [`EnvFilter`] for logs. Defaults to `warn`.
/// - `TRACING_LOG_JSON` - if set, logs are JSON lines.
/// - See [`OtelConfig`] for the OTLP variables.
///
/// ## Panics
///
/// If a global subscriber has already been set.
pub fn init_tracing() -> Option<OtelGuard> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    let guard = OtelConfig::load().and_then(|cfg| {
        cfg.provider()
            .inspect_err(|err| eprintln!("failed to build OTLP exporter: {err}"))
            .ok()
    });

    match &guard {
        Some(guard) => install_fmt!(tracing_subscriber::registry().with(guard.layer()), filter),
        None => install_fmt!(tracing_subscriber::registry(), filter),
    }
    tracing::debug!(otlp = guard.is_some(), "tracing installed");

    guard
}
