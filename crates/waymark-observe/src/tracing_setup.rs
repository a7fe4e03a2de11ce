//! Tracing subscriber initialization for processes embedding the Waymark
//! kernel, with structured (text or JSON) logging and optional OpenTelemetry
//! trace export.
//!
//! # Usage
//!
//! ```no_run
//! use waymark_observe::tracing_setup::{init_tracing, TracingOptions};
//!
//! // Human-readable logs at info level unless RUST_LOG says otherwise
//! init_tracing(&TracingOptions::default()).unwrap();
//! ```
//!
//! ```no_run
//! use waymark_observe::tracing_setup::{init_tracing, TracingOptions};
//!
//! // JSON lines plus OpenTelemetry spans on stdout
//! init_tracing(&TracingOptions { json: true, enable_otel: true, ..Default::default() }).unwrap();
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use std::sync::OnceLock;

/// Stores the OTel tracer provider so it can be shut down cleanly on exit.
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Filter applied when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "waymark_core=info,waymark_types=info";

/// How the global subscriber is assembled.
#[derive(Debug, Clone)]
pub struct TracingOptions {
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
    /// Bridge spans to OpenTelemetry with a stdout exporter.
    pub enable_otel: bool,
    /// Directive used when `RUST_LOG` is unset or invalid.
    pub default_filter: String,
}

impl Default for TracingOptions {
    fn default() -> Self {
        Self {
            json: false,
            enable_otel: false,
            default_filter: DEFAULT_FILTER.to_string(),
        }
    }
}

/// Build the level filter: `RUST_LOG` if set and valid, otherwise `fallback`.
pub fn build_filter(fallback: &str) -> EnvFilter {
    let from_env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    filter_from(from_env.as_deref(), fallback)
}

fn filter_from(directives: Option<&str>, fallback: &str) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(fallback))
}

/// Initialize the global tracing subscriber.
///
/// - Always installs a `fmt` layer with target visibility and span close
///   timing, as text or JSON.
/// - When `enable_otel` is set, additionally bridges tracing spans to
///   OpenTelemetry using a stdout exporter.
///
/// # Errors
///
/// Returns an error if the global subscriber has already been set.
pub fn init_tracing(options: &TracingOptions) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = build_filter(&options.default_filter);

    let fmt_layer = if options.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .boxed()
    };

    let otel_layer = if options.enable_otel {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let tracer = provider.tracer("waymark");

        // Store the provider for shutdown and register it globally.
        let _ = TRACER_PROVIDER.set(provider.clone());
        opentelemetry::global::set_tracer_provider(provider);

        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()?;

    Ok(())
}

/// Flush pending traces and shut down the OpenTelemetry tracer provider.
///
/// Safe to call even when OTel was not enabled (no-op in that case).
pub fn shutdown_tracing() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            eprintln!("Warning: OTel tracer provider shutdown error: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = TracingOptions::default();
        assert!(!options.json);
        assert!(!options.enable_otel);
        assert_eq!(options.default_filter, DEFAULT_FILTER);
    }

    #[test]
    fn test_filter_prefers_valid_directives() {
        let filter = filter_from(Some("waymark_core=trace"), DEFAULT_FILTER);
        assert!(filter.to_string().contains("waymark_core=trace"));
    }

    #[test]
    fn test_filter_falls_back() {
        let filter = filter_from(None, "waymark_core=debug");
        assert!(filter.to_string().contains("waymark_core=debug"));

        let filter = filter_from(Some("waymark_core=loudest"), "waymark_core=warn");
        assert!(filter.to_string().contains("waymark_core=warn"));
    }

    #[test]
    fn test_init_twice_fails_second_time() {
        let options = TracingOptions::default();
        assert!(init_tracing(&options).is_ok());
        assert!(init_tracing(&options).is_err());
        shutdown_tracing();
    }
}
