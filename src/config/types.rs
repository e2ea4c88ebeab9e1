//! Configuration types and CLI options.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::constants::{
    DB_PATH, DEFAULT_USER_AGENT, MAX_ATTEMPTS_PER_AD, POLL_QUEUE_INTERVAL, VISIT_TIMEOUT,
};

/// Logging level for the application.
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Application configuration.
///
/// Doubles as the clap CLI definition for the binary and as the
/// programmatic configuration for library callers (construct with
/// `Config { ..Default::default() }`).
#[derive(Debug, Clone, Parser)]
#[command(
    name = "ad_visitor",
    about = "Records ads discovered on visited pages and visits their targets in the background"
)]
pub struct Config {
    /// File of ad candidates to register, one JSON object per line.
    /// Use '-' to read from stdin. Omit to start with the persisted store only.
    pub candidates: Option<PathBuf>,

    /// SQLite database path for the durable store
    #[arg(long, default_value = DB_PATH)]
    pub db_path: PathBuf,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Log format
    #[arg(long, value_enum, default_value = "plain")]
    pub log_format: LogFormat,

    /// Scheduler poll interval in seconds
    #[arg(long, default_value_t = POLL_QUEUE_INTERVAL.as_secs())]
    pub poll_interval_secs: u64,

    /// Per-visit timeout in seconds
    #[arg(long, default_value_t = VISIT_TIMEOUT.as_secs())]
    pub visit_timeout_secs: u64,

    /// Maximum visit attempts per ad before it is marked terminally failed
    #[arg(long, default_value_t = MAX_ATTEMPTS_PER_AD)]
    pub max_attempts: u32,

    /// Minimum user inactivity in milliseconds before visits are scheduled.
    /// 0 disables idle gating.
    #[arg(long, default_value_t = 0)]
    pub idle_threshold_ms: u64,

    /// Probability (0.0-1.0) that a newly registered ad is ever visited
    #[arg(long, default_value_t = 1.0)]
    pub click_probability: f64,

    /// Re-allow registration of an identical ad after this many milliseconds.
    /// Unset keeps duplicate suppression permanent for the process lifetime.
    #[arg(long)]
    pub repeat_visit_after_ms: Option<i64>,

    /// Do-not-track domains; ads targeting them are never visited
    #[arg(long, value_delimiter = ',')]
    pub dnt_domains: Vec<String>,

    /// Domains whose same-domain image ads are still registered
    /// (overrides the built-in allow-list)
    #[arg(long, value_delimiter = ',')]
    pub internal_link_domains: Vec<String>,

    /// HTTP User-Agent header value for visit requests
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Disable background visiting (record ads only)
    #[arg(long)]
    pub no_visits: bool,

    /// Automated/test mode: run the pipeline without scheduling any visits
    #[arg(long, hide = true)]
    pub automated: bool,

    /// Keep running after all pending visits resolve (until Ctrl-C)
    #[arg(long)]
    pub watch: bool,

    /// Import a previously exported ad file before processing candidates
    #[arg(long)]
    pub import: Option<PathBuf>,

    /// Export the store to this file after candidates are registered
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Redact page URLs and titles in the export
    #[arg(long)]
    pub sanitize: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            candidates: None,
            db_path: PathBuf::from(DB_PATH),
            log_level: LogLevel::Info,
            log_format: LogFormat::Plain,
            poll_interval_secs: POLL_QUEUE_INTERVAL.as_secs(),
            visit_timeout_secs: VISIT_TIMEOUT.as_secs(),
            max_attempts: MAX_ATTEMPTS_PER_AD,
            idle_threshold_ms: 0,
            click_probability: 1.0,
            repeat_visit_after_ms: None,
            dnt_domains: Vec::new(),
            internal_link_domains: Vec::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            no_visits: false,
            automated: false,
            watch: false,
            import: None,
            export: None,
            sanitize: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(
            log::LevelFilter::from(LogLevel::Error),
            log::LevelFilter::Error
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Warn),
            log::LevelFilter::Warn
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Info),
            log::LevelFilter::Info
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Debug),
            log::LevelFilter::Debug
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Trace),
            log::LevelFilter::Trace
        );
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.visit_timeout_secs, 20);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.idle_threshold_ms, 0);
        assert_eq!(config.click_probability, 1.0);
        assert!(config.repeat_visit_after_ms.is_none());
        assert!(!config.no_visits);
        assert_eq!(config.db_path, PathBuf::from(DB_PATH));
    }

    #[test]
    fn test_config_parses_minimal_cli() {
        let config = Config::parse_from(["ad_visitor"]);
        assert!(config.candidates.is_none());
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn test_config_parses_dnt_domains() {
        let config =
            Config::parse_from(["ad_visitor", "--dnt-domains", "tracker.com,example.org"]);
        assert_eq!(config.dnt_domains, vec!["tracker.com", "example.org"]);
    }
}
