//! Structured logging for the station agent
//!
//! Output format and verbosity come from the environment so the same binary
//! can log JSON under systemd and readable text on a bench.
//!
//! - `LOG_LEVEL`: ERROR, WARN, INFO, DEBUG or TRACE (default INFO)
//! - `LOG_FORMAT`: json, pretty or compact (default json)
//! - `LOG_SPANS`: `true` to log span open/close events
//! - `RUST_LOG`: replaces the computed filter entirely
//!
//! ```bash
//! LOG_FORMAT=compact LOG_LEVEL=DEBUG freyr-agent run
//! ```

use std::env;
use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Dependencies that are too chatty at the agent's level
const QUIET_TARGETS: &[&str] = &["rumqttc=warn", "tokio=warn"];

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    /// Multi-line, coloured
    Pretty,
    /// Single line, coloured, no targets
    Compact,
}

impl LogFormat {
    /// Unknown values fall back to JSON
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Json,
        }
    }
}

/// Logging settings resolved from the environment
#[derive(Debug, Clone, PartialEq)]
pub struct LogSettings {
    pub level: Level,
    pub format: LogFormat,
    pub include_spans: bool,
    /// Raw `RUST_LOG` value, which wins over `level`
    pub filter_override: Option<String>,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self {
            level: parse_level(&env::var("LOG_LEVEL").unwrap_or_default()),
            format: LogFormat::parse(&env::var("LOG_FORMAT").unwrap_or_default()),
            include_spans: parse_flag(&env::var("LOG_SPANS").unwrap_or_default()),
            filter_override: env::var("RUST_LOG").ok().filter(|v| !v.trim().is_empty()),
        }
    }

    pub fn filter(&self) -> EnvFilter {
        if let Some(directives) = &self.filter_override {
            return EnvFilter::new(directives);
        }

        QUIET_TARGETS
            .iter()
            .filter_map(|target| target.parse::<Directive>().ok())
            .fold(EnvFilter::new(self.level.to_string()), EnvFilter::add_directive)
    }
}

/// Unknown or empty values give INFO
pub fn parse_level(s: &str) -> Level {
    match s.trim().to_uppercase().as_str() {
        "ERROR" => Level::ERROR,
        "WARN" => Level::WARN,
        "DEBUG" => Level::DEBUG,
        "TRACE" => Level::TRACE,
        _ => Level::INFO,
    }
}

fn parse_flag(s: &str) -> bool {
    s.trim().eq_ignore_ascii_case("true")
}

fn span_events(include_spans: bool) -> FmtSpan {
    if include_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

/// Install the global subscriber. Fails if one is already set.
pub fn init_logging(settings: &LogSettings) -> Result<(), TryInitError> {
    let subscriber = tracing_subscriber::registry().with(settings.filter());
    let spans = span_events(settings.include_spans);

    match settings.format {
        LogFormat::Json => subscriber
            .with(fmt::layer().json().with_span_events(spans))
            .try_init(),
        LogFormat::Pretty => subscriber
            .with(fmt::layer().pretty().with_ansi(true).with_span_events(spans))
            .try_init(),
        LogFormat::Compact => subscriber
            .with(
                fmt::layer()
                    .compact()
                    .with_ansi(true)
                    .with_target(false)
                    .with_span_events(spans),
            )
            .try_init(),
    }
}

/// Initialize logging from environment variables
pub fn init_default_logging() -> Result<(), TryInitError> {
    init_logging(&LogSettings::from_env())
}

/// Span wrapping the MQTT network task
#[macro_export]
macro_rules! mqtt_span {
    ($($field:tt)*) => {
        tracing::info_span!("mqtt_connection", $($field)*)
    };
}

/// Span wrapping one sampling tick
#[macro_export]
macro_rules! sample_span {
    ($($field:tt)*) => {
        tracing::info_span!("sample", $($field)*)
    };
}

pub use {mqtt_span, sample_span};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("Pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("compact"), LogFormat::Compact);
    }

    #[test]
    fn test_log_format_unknown_defaults_to_json() {
        assert_eq!(LogFormat::parse(""), LogFormat::Json);
        assert_eq!(LogFormat::parse("xml"), LogFormat::Json);
    }

    #[test]
    fn test_parse_level() {
        let cases = [
            ("error", Level::ERROR),
            ("WARN", Level::WARN),
            ("Info", Level::INFO),
            ("debug", Level::DEBUG),
            ("TRACE", Level::TRACE),
            ("verbose", Level::INFO),
            ("", Level::INFO),
        ];
        for (input, expected) in cases {
            assert_eq!(parse_level(input), expected, "input: {input:?}");
        }
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" TRUE "));
        assert!(!parse_flag("1"));
        assert!(!parse_flag("yes"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn test_filter_quiets_dependencies() {
        let settings = LogSettings {
            level: Level::DEBUG,
            format: LogFormat::Json,
            include_spans: false,
            filter_override: None,
        };
        let rendered = settings.filter().to_string();
        assert!(rendered.contains("rumqttc=warn"), "{rendered}");
        assert!(rendered.to_lowercase().contains("debug"), "{rendered}");
    }

    #[test]
    fn test_filter_override_wins() {
        let settings = LogSettings {
            level: Level::ERROR,
            format: LogFormat::Compact,
            include_spans: true,
            filter_override: Some("freyr_agent=trace".to_string()),
        };
        let rendered = settings.filter().to_string();
        assert!(rendered.contains("freyr_agent=trace"), "{rendered}");
        assert!(!rendered.contains("rumqttc"), "{rendered}");
    }

    #[test]
    fn test_span_events() {
        assert_eq!(span_events(false), FmtSpan::NONE);
        assert_eq!(span_events(true), FmtSpan::NEW | FmtSpan::CLOSE);
    }
}
