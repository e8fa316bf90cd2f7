//! Logging setup for the Rubric service.
//!
//! # Noise Filtering
//!
//! By default, noisy library modules (hyper, reqwest, h2, rustls, tokio_util)
//! are set to `warn` level to reduce log clutter while keeping business logs
//! at the specified level.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Default noisy modules that should be filtered to warn level.
pub const NOISY_MODULES: &[&str] = &[
    "hyper",
    "hyper_util",
    "reqwest",
    "h2",
    "rustls",
    "tokio_util",
    "tower_http",
    "multer",
    "redis",
];

/// Build the filter directives for a base level plus exclusions.
fn build_directives(log_level: &str, excluded_targets: &[String]) -> String {
    let mut directives = String::from(log_level);

    for module in NOISY_MODULES {
        directives.push_str(&format!(",{}=warn", module));
    }

    for target in excluded_targets {
        directives.push_str(&format!(",{}=warn", target));
    }

    directives
}

/// Initialize logging with the given configuration.
///
/// # Arguments
///
/// * `log_level` - Base log level (trace, debug, info, warn, error)
/// * `log_format` - Output format: "json" for structured JSON, "pretty" for human-readable
/// * `excluded_targets` - Extra modules clamped to `warn`
///
/// `RUST_LOG` overrides the computed filter when set.
pub fn init_logging(log_level: &str, log_format: &str, excluded_targets: &[String]) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(build_directives(log_level, excluded_targets)));

    let subscriber = tracing_subscriber::registry().with(filter);

    if log_format == "json" {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true);
        let _ = subscriber.with(fmt_layer).try_init();
    } else {
        // Default to pretty format
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(true)
            .with_file(false)
            .with_line_number(false);
        let _ = subscriber.with(fmt_layer).try_init();
    }

    tracing::info!(
        log_level = %log_level,
        log_format = %log_format,
        noise_filtered = NOISY_MODULES.len() + excluded_targets.len(),
        "Logging initialized"
    );
}
