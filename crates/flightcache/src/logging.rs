use std::env;

use sentry::integrations::tracing::EventFilter;
use tracing::Subscriber;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{Config, LogFormat};

fn get_rust_log(level: LevelFilter) -> &'static str {
    match level {
        LevelFilter::OFF => "",
        LevelFilter::ERROR => "ERROR",
        LevelFilter::WARN => "WARN",
        LevelFilter::INFO => "INFO",
        LevelFilter::DEBUG => {
            "INFO,\
             flightcache=DEBUG"
        }
        LevelFilter::TRACE => {
            "INFO,\
             flightcache=TRACE"
        }
    }
}

/// Picks a concrete format for [`LogFormat::Auto`], depending on whether a user watches the output.
fn resolve_format(format: LogFormat, attended: bool) -> LogFormat {
    match (format, attended) {
        (LogFormat::Auto, true) => LogFormat::Pretty,
        (LogFormat::Auto, false) => LogFormat::Simplified,
        (format, _) => format,
    }
}

/// Builds a subscriber that writes events matching `env_filter` to `make_writer` and forwards
/// them to Sentry.
///
/// [`LogFormat::Auto`] is treated as [`LogFormat::Simplified`], resolve it first.
fn build_subscriber<W>(
    format: LogFormat,
    env_filter: &str,
    make_writer: W,
) -> Box<dyn Subscriber + Send + Sync>
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .with_target(true)
        .with_writer(make_writer);

    let fmt_layer = match format {
        LogFormat::Json => layer
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Auto | LogFormat::Simplified => layer.compact().with_ansi(false).boxed(),
    }
    .with_filter(EnvFilter::new(env_filter));

    // Same as the default filter, except it sends everything at or above INFO as logs instead of breadcrumbs.
    let sentry_layer =
        sentry::integrations::tracing::layer().event_filter(|md| match *md.level() {
            tracing::Level::ERROR => EventFilter::Event | EventFilter::Log,
            tracing::Level::WARN | tracing::Level::INFO => EventFilter::Log,
            tracing::Level::DEBUG | tracing::Level::TRACE => EventFilter::Ignore,
        });

    Box::new(
        tracing_subscriber::registry()
            .with(fmt_layer)
            .with(sentry_layer),
    )
}

/// Initializes logging for the process embedding the cache.
///
/// This considers the `RUST_LOG` environment variable and defaults it to the level specified in the
/// configuration. Additionally, this toggles `RUST_BACKTRACE` based on the
/// [`enable_backtraces`](crate::config::Logging::enable_backtraces)
/// config value.
///
/// # Safety
/// This function uses [`std::env::set_var`] to modify the environment. That function is only safe
/// to call in single-threaded contexts to prevent unsynchronized concurrent access to the environment.
pub unsafe fn init_logging(config: &Config) {
    if config.logging.enable_backtraces {
        // SAFETY: As documented, this function may only be called in a single-threaded context.
        unsafe { env::set_var("RUST_BACKTRACE", "1") };
    }

    let rust_log =
        env::var("RUST_LOG").unwrap_or_else(|_| get_rust_log(config.logging.level).to_string());
    let format = resolve_format(config.logging.format, console::user_attended());

    build_subscriber(format, &rust_log, std::io::stdout).init();
}

#[cfg(test)]
mod tests {
    use flightcache_test::LogBuffer;

    use crate::{GetOptions, NamespaceCache};

    use super::*;

    /// Runs a single computation for namespace `foo` while `subscriber` is the default.
    async fn compute_with(subscriber: Box<dyn Subscriber + Send + Sync>) {
        let _guard = tracing::subscriber::set_default(subscriber);

        let cache = NamespaceCache::<u32>::new("logging");
        let value = cache
            .get("foo", GetOptions::default(), || async { Ok::<u32, anyhow::Error>(1) })
            .unwrap()
            .await
            .unwrap();
        assert_eq!(value, 1);
    }

    #[test]
    fn test_rust_log_defaults() {
        assert_eq!(get_rust_log(LevelFilter::OFF), "");
        assert_eq!(get_rust_log(LevelFilter::WARN), "WARN");
        assert_eq!(get_rust_log(LevelFilter::TRACE), "INFO,flightcache=TRACE");
    }

    #[test]
    fn test_resolve_format() {
        assert_eq!(resolve_format(LogFormat::Auto, true), LogFormat::Pretty);
        assert_eq!(resolve_format(LogFormat::Auto, false), LogFormat::Simplified);
        assert_eq!(resolve_format(LogFormat::Json, true), LogFormat::Json);
        assert_eq!(resolve_format(LogFormat::Simplified, true), LogFormat::Simplified);
    }

    #[tokio::test]
    async fn test_json_format() {
        let buffer = LogBuffer::default();
        let rust_log = get_rust_log(LevelFilter::DEBUG);
        compute_with(build_subscriber(LogFormat::Json, rust_log, buffer.clone())).await;

        let output = buffer.contents();
        let lines: Vec<serde_json::Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        let started = lines
            .iter()
            .find(|line| line["message"] == "Starting computation")
            .unwrap();
        assert_eq!(started["level"], "DEBUG");
        assert_eq!(started["target"], "flightcache::cache");
        assert_eq!(started["cache"], "logging");
        assert_eq!(started["namespace"], "foo");
        assert!(started["filename"].as_str().unwrap().ends_with("cache.rs"));
    }

    #[tokio::test]
    async fn test_simplified_format() {
        let buffer = LogBuffer::default();
        let rust_log = get_rust_log(LevelFilter::DEBUG);
        compute_with(build_subscriber(LogFormat::Simplified, rust_log, buffer.clone())).await;

        let output = buffer.contents();
        let started = output
            .lines()
            .find(|line| line.contains("Starting computation"))
            .unwrap();
        assert!(started.contains("flightcache::cache"));
        assert!(started.contains("namespace=foo"));
        assert!(!output.contains('\u{1b}'));
    }

    #[tokio::test]
    async fn test_pretty_format() {
        let buffer = LogBuffer::default();
        let rust_log = get_rust_log(LevelFilter::DEBUG);
        compute_with(build_subscriber(LogFormat::Pretty, rust_log, buffer.clone())).await;

        assert!(buffer.contents().contains("Starting computation"));
    }

    #[tokio::test]
    async fn test_level_filter() {
        let buffer = LogBuffer::default();
        let rust_log = get_rust_log(LevelFilter::WARN);
        compute_with(build_subscriber(LogFormat::Json, rust_log, buffer.clone())).await;

        // a successful computation only logs at debug level
        assert_eq!(buffer.contents(), "");
    }
}
