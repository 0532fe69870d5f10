//! tracing-subscriber setup: stderr plus an appending log file

use std::fs::OpenOptions;
use std::sync::Arc;
use tracing_subscriber::{
    fmt, fmt::MakeWriter, layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter, Layer,
    Registry,
};
use wpcraft_agent::config::LoggingSettings;
use wpcraft_agent::LogFormat;
use wpcraft_error::{Error, ErrorKind, Result};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Map a configured level name (WARNING and CRITICAL included) to a filter directive
pub fn level_directive(level: &str) -> &'static str {
    match level.trim().to_ascii_uppercase().as_str() {
        "TRACE" => "trace",
        "DEBUG" => "debug",
        "WARNING" | "WARN" => "warn",
        "ERROR" | "CRITICAL" => "error",
        _ => "info",
    }
}

/// Default filter: our crates at the configured level, everything else at warn
pub fn default_filter(level: &str) -> String {
    let level = level_directive(level);
    format!(
        "warn,wpcraft={level},wpcraft_agent={level},wpcraft_llm={level}",
        level = level
    )
}

fn layer<W>(format: LogFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let base = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true)
        .with_level(true);

    match format {
        LogFormat::Full => base.boxed(),
        LogFormat::Compact => base.compact().boxed(),
        LogFormat::Json => base.json().boxed(),
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
pub fn init(settings: &LoggingSettings) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&settings.file)
        .map_err(|e| {
            Error::from(e)
                .with_operation("logging::init")
                .with_context("path", settings.file.display().to_string())
        })?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(&settings.level)));

    Registry::default()
        .with(vec![
            layer(settings.format, std::io::stderr, true),
            layer(settings.format, Arc::new(file), false),
        ])
        .with(filter)
        .try_init()
        .map_err(|e| {
            Error::new(ErrorKind::Unexpected, "failed to install log subscriber")
                .with_operation("logging::init")
                .set_source(e)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_names() {
        assert_eq!(level_directive("WARNING"), "warn");
        assert_eq!(level_directive("critical"), "error");
        assert_eq!(level_directive("DEBUG"), "debug");
        assert_eq!(level_directive("bogus"), "info");
    }

    #[test]
    fn test_default_filter() {
        assert_eq!(
            default_filter("INFO"),
            "warn,wpcraft=info,wpcraft_agent=info,wpcraft_llm=info"
        );
        assert!(EnvFilter::try_new(default_filter("TRACE")).is_ok());
    }

    #[test]
    fn test_unwritable_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = LoggingSettings {
            file: dir.path().join("missing").join("wordpress_manager.log"),
            ..Default::default()
        };
        let err = init(&settings).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
    }
}
