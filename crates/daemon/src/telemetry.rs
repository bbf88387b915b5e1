//! Logging and optional OpenTelemetry export
//!
//! - `RUST_LOG`: filter (default `provisio=info`)
//! - `PROVISIO_LOG_FORMAT`: `pretty` (default) or `json`
//! - `PROVISIO_LOG_DIR`: also write daily-rolling JSON files there
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (needs the `telemetry` feature)
//! - `OTEL_SERVICE_NAME`: service name (default: provisiod)

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

const DEFAULT_FILTER: &str = "provisio=info";
const LOG_FILE_PREFIX: &str = "provisiod.log";

/// Keeps the non-blocking file writer flushing until dropped
pub struct TelemetryGuard {
    _file: Option<WorkerGuard>,
}

pub fn init() -> Result<TelemetryGuard> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))?;

    let mut layers: Vec<BoxedLayer> = Vec::new();

    let format = std::env::var("PROVISIO_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    match format.as_str() {
        "json" => layers.push(fmt::layer().json().boxed()),
        _ => layers.push(fmt::layer().pretty().boxed()),
    }

    let file_guard = match std::env::var("PROVISIO_LOG_DIR") {
        Ok(dir) => {
            let dir = shellexpand::tilde(&dir).into_owned();
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(fmt::layer().json().with_ansi(false).with_writer(writer).boxed());
            Some(guard)
        }
        Err(_) => None,
    };

    let otel = otel_layer();
    let otel_failed = otel.as_ref().err().map(ToString::to_string);
    if let Ok(Some(layer)) = otel {
        layers.push(layer);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()?;

    if let Some(error) = otel_failed {
        tracing::warn!(error = %error, "Failed to initialize OpenTelemetry (continuing without it)");
    }

    Ok(TelemetryGuard { _file: file_guard })
}

fn otel_layer() -> Result<Option<BoxedLayer>> {
    let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") else {
        return Ok(None);
    };

    #[cfg(feature = "telemetry")]
    {
        otel_layer_impl(&endpoint).map(Some)
    }

    #[cfg(not(feature = "telemetry"))]
    {
        anyhow::bail!(
            "OTEL_EXPORTER_OTLP_ENDPOINT={} set but feature 'telemetry' not enabled",
            endpoint
        )
    }
}

#[cfg(feature = "telemetry")]
fn otel_layer_impl(endpoint: &str) -> Result<BoxedLayer> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_otlp::WithExportConfig;

    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "provisiod".to_string());

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let provider = opentelemetry_sdk::trace::TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .build();
    let tracer = provider.tracer(service_name);
    opentelemetry::global::set_tracer_provider(provider);

    Ok(tracing_opentelemetry::layer().with_tracer(tracer).boxed())
}
