//! Logging utilities for Trellis.
//!
//! Sets up `tracing-subscriber` from a [`LoggingConfig`] or by hand. Every
//! dispatch runs inside a `resolver_fn` span carrying the key, class and
//! method, so turning on [`SpanEvents::LIFECYCLE`] prints one line when an
//! invocation starts and one when it ends.
//!
//! # Configuration-Based Initialization
//!
//! ```rust,ignore
//! use trellis_runtime::{config::load_config, logging};
//!
//! let config = load_config()?;
//! logging::init_from_config(&config.logging);
//! ```
//!
//! # Manual Initialization
//!
//! ```rust,ignore
//! use trellis_runtime::logging::{LoggingBuilder, SpanEvents};
//!
//! LoggingBuilder::new()
//!     .directive("trellis_framework=debug")
//!     .span_events(SpanEvents::LIFECYCLE)
//!     .init();
//! ```

use std::ops::BitOr;
use std::path::PathBuf;

use tracing::warn;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LogOutput, LoggingConfig, SpanEventConfig};

const DEFAULT_LOG_FILE: &str = "trellis.log";

// =============================================================================
// SpanEvents
// =============================================================================

/// Which span lifecycle events are written as log lines.
///
/// Flags combine with `|`:
///
/// ```rust,ignore
/// let events = SpanEvents::NEW | SpanEvents::CLOSE;
/// assert_eq!(events, SpanEvents::LIFECYCLE);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanEvents(u8);

impl SpanEvents {
    /// No span events.
    pub const NONE: Self = Self(0);
    /// A span was created.
    pub const NEW: Self = Self(1);
    /// A span was entered.
    pub const ENTER: Self = Self(1 << 1);
    /// A span was exited.
    pub const EXIT: Self = Self(1 << 2);
    /// A span was closed.
    pub const CLOSE: Self = Self(1 << 3);

    /// Creation and close: one pair of lines per invocation.
    pub const LIFECYCLE: Self = Self(Self::NEW.0 | Self::CLOSE.0);
    /// Enter and exit, once per poll of the invocation future.
    pub const ACTIVE: Self = Self(Self::ENTER.0 | Self::EXIT.0);
    /// Every span event.
    pub const FULL: Self = Self(Self::LIFECYCLE.0 | Self::ACTIVE.0);

    /// Returns `true` if every flag of `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    fn to_fmt_span(self) -> FmtSpan {
        [
            (Self::NEW, FmtSpan::NEW),
            (Self::ENTER, FmtSpan::ENTER),
            (Self::EXIT, FmtSpan::EXIT),
            (Self::CLOSE, FmtSpan::CLOSE),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .fold(FmtSpan::NONE, |acc, (_, span)| acc | span)
    }
}

impl BitOr for SpanEvents {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl From<&SpanEventConfig> for SpanEvents {
    fn from(config: &SpanEventConfig) -> Self {
        [
            (config.new, Self::NEW),
            (config.enter, Self::ENTER),
            (config.exit, Self::EXIT),
            (config.close, Self::CLOSE),
        ]
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .fold(Self::NONE, |acc, (_, flag)| acc | flag)
    }
}

/// Initialize logging from a `LoggingConfig`.
///
/// Does nothing if a global subscriber is already installed.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

// =============================================================================
// LoggingBuilder
// =============================================================================

/// A builder for configuring logging.
///
/// ```rust,ignore
/// LoggingBuilder::new()
///     .with_level(Level::DEBUG)
///     .span_events(SpanEvents::LIFECYCLE)
///     .with_thread_ids(true)
///     .init();
/// ```
#[derive(Debug, Default)]
pub struct LoggingBuilder {
    level: Option<tracing::Level>,
    directives: Vec<String>,
    span_events: SpanEvents,
    format: LogFormat,
    output: LogOutput,
    file_path: Option<PathBuf>,
    with_target: bool,
    with_thread_ids: bool,
    with_source_location: bool,
}

impl LoggingBuilder {
    /// Create a new logging builder.
    pub fn new() -> Self {
        Self {
            with_target: true,
            ..Default::default()
        }
    }

    /// Create a builder mirroring `config`.
    pub fn from_config(config: &LoggingConfig) -> Self {
        Self {
            level: Some(config.level.to_tracing_level()),
            directives: config
                .filters
                .iter()
                .map(|(target, level)| format!("{target}={level}"))
                .collect(),
            span_events: SpanEvents::from(&config.span_events),
            format: config.format,
            output: config.output,
            file_path: config.file_path.clone(),
            with_target: true,
            with_thread_ids: config.thread_ids,
            with_source_location: config.file_location,
        }
    }

    /// Set the base log level, used when `RUST_LOG` is not set.
    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = Some(level);
        self
    }

    /// Add a filter directive, e.g. `trellis_framework=debug`.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// Configure span events.
    pub fn span_events(mut self, events: SpanEvents) -> Self {
        self.span_events = events;
        self
    }

    /// Set the output format.
    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the output destination.
    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    /// Set the file written to by [`LogOutput::File`].
    pub fn file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Include the target (module path) in log output.
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    /// Include thread IDs in log output.
    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.with_thread_ids = enabled;
        self
    }

    /// Include source file and line in log output.
    pub fn with_source_location(mut self, enabled: bool) -> Self {
        self.with_source_location = enabled;
        self
    }

    /// Initialize the logging system, ignoring an already installed subscriber.
    pub fn init(self) {
        let _ = self.try_init();
    }

    /// Try to initialize the logging system.
    ///
    /// Invalid directives are skipped and reported once the subscriber is in
    /// place.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let (filter, rejected) = self.build_filter();
        let (writer, missing_file) = self.make_writer();

        tracing_subscriber::registry()
            .with(self.fmt_layer(writer))
            .with(filter)
            .try_init()?;

        for (directive, error) in rejected {
            warn!(directive = %directive, error = %error, "Ignoring invalid log filter directive");
        }
        if missing_file {
            warn!("File output requested but no file path configured, logging to stdout");
        }
        Ok(())
    }

    /// `RUST_LOG` if set, otherwise the base level; then the directives.
    fn build_filter(&self) -> (EnvFilter, Vec<(String, String)>) {
        let base = self.level.unwrap_or(tracing::Level::INFO);
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(base.as_str().to_ascii_lowercase()));

        let mut rejected = Vec::new();
        for directive in &self.directives {
            match directive.parse() {
                Ok(parsed) => filter = filter.add_directive(parsed),
                Err(e) => rejected.push((directive.clone(), e.to_string())),
            }
        }
        (filter, rejected)
    }

    /// Returns the writer and whether a file was requested without a path.
    fn make_writer(&self) -> (BoxMakeWriter, bool) {
        match (self.output, &self.file_path) {
            (LogOutput::Stdout, _) => (BoxMakeWriter::new(std::io::stdout), false),
            (LogOutput::Stderr, _) => (BoxMakeWriter::new(std::io::stderr), false),
            (LogOutput::File, Some(path)) => {
                let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
                let name = path.file_name().map_or_else(
                    || DEFAULT_LOG_FILE.into(),
                    |n| n.to_string_lossy().into_owned(),
                );
                let appender =
                    tracing_appender::rolling::never(dir.unwrap_or_else(|| ".".as_ref()), name);
                (BoxMakeWriter::new(appender), false)
            }
            (LogOutput::File, None) => (BoxMakeWriter::new(std::io::stdout), true),
        }
    }

    fn fmt_layer(&self, writer: BoxMakeWriter) -> Box<dyn Layer<Registry> + Send + Sync> {
        let layer = fmt::layer()
            .with_writer(writer)
            .with_span_events(self.span_events.to_fmt_span())
            .with_target(self.with_target)
            .with_thread_ids(self.with_thread_ids)
            .with_file(self.with_source_location)
            .with_line_number(self.with_source_location);

        match self.format {
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Full => layer.boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            #[cfg(feature = "json-log")]
            LogFormat::Json => layer.json().boxed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_span_event_flags() {
        assert_eq!(SpanEvents::NEW | SpanEvents::CLOSE, SpanEvents::LIFECYCLE);
        assert!(SpanEvents::FULL.contains(SpanEvents::ACTIVE));
        assert!(!SpanEvents::LIFECYCLE.contains(SpanEvents::ENTER));

        assert_eq!(SpanEvents::NONE.to_fmt_span(), FmtSpan::NONE);
        assert_eq!(SpanEvents::LIFECYCLE.to_fmt_span(), FmtSpan::NEW | FmtSpan::CLOSE);
        assert_eq!(SpanEvents::FULL.to_fmt_span(), FmtSpan::FULL);
    }

    #[test]
    fn test_span_events_from_config() {
        let config = SpanEventConfig {
            new: true,
            close: true,
            ..Default::default()
        };
        assert_eq!(SpanEvents::from(&config), SpanEvents::LIFECYCLE);
    }

    #[test]
    fn test_from_config() {
        let mut config = LoggingConfig {
            level: LogLevel::Warn,
            thread_ids: true,
            file_location: true,
            ..Default::default()
        };
        config.filters.insert("trellis_framework".into(), LogLevel::Debug);
        config.span_events.new = true;

        let builder = LoggingBuilder::from_config(&config);
        assert_eq!(builder.level, Some(tracing::Level::WARN));
        assert_eq!(builder.directives, ["trellis_framework=debug"]);
        assert_eq!(builder.span_events, SpanEvents::NEW);
        assert!(builder.with_target);
        assert!(builder.with_thread_ids);
        assert!(builder.with_source_location);
    }

    #[test]
    fn test_builder_defaults() {
        let builder = LoggingBuilder::new();
        assert!(builder.with_target);
        assert_eq!(builder.format, LogFormat::Compact);
        assert_eq!(builder.output, LogOutput::Stdout);
        assert!(builder.directives.is_empty());
    }

    #[test]
    fn test_invalid_directives_are_collected() {
        let builder = LoggingBuilder::new()
            .directive("trellis_core=debug")
            .directive("trellis_core=verbose");
        let (_filter, rejected) = builder.build_filter();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].0, "trellis_core=verbose");
    }

    #[test]
    fn test_file_output_without_path_falls_back() {
        let builder = LoggingBuilder::new().output(LogOutput::File);
        let (_writer, missing_file) = builder.make_writer();
        assert!(missing_file);
    }
}
