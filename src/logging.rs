//! Tracing subscriber setup shared by both binaries

use anyhow::{Context, Result};
use tracing::Level as TraceLevel;
use tracing_subscriber::FmtSubscriber;

/// Environment variable selecting the log level
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// Unknown or missing values fall back to `info`
pub fn parse_level(value: Option<&str>) -> TraceLevel {
    match value.unwrap_or("info").to_lowercase().as_str() {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    }
}

/// Installs the global subscriber. Logs go to stderr; stdout is for command output.
pub fn init() -> Result<()> {
    let level = parse_level(std::env::var(LOG_LEVEL_ENV).ok().as_deref());

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("Failed to install log subscriber")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level(None), TraceLevel::INFO);
        assert_eq!(parse_level(Some("DEBUG")), TraceLevel::DEBUG);
        assert_eq!(parse_level(Some("warn")), TraceLevel::WARN);
        assert_eq!(parse_level(Some("verbose")), TraceLevel::INFO);
    }
}
