//! Global subscriber installation with a host sink.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use core_runtime::logging::{init_logging, redact_if_sensitive, LogFormat, LoggingConfig};
use core_runtime::Error;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct HostLog {
    entries: Mutex<Vec<LogEntry>>,
}

#[async_trait]
impl LoggerSink for HostLog {
    async fn log(&self, entry: LogEntry) -> BridgeResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Debug
    }
}

// Only one global subscriber per process: everything that needs it is here.
#[test]
fn test_global_subscriber_forwards_filtered_redacted_events() {
    let host = Arc::new(HostLog::default());
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_logger_sink(host.clone());

    init_logging(config.clone()).unwrap();

    tracing::info!(
        target: "core_directory::orchestrator",
        geocoded = 2,
        total = 3,
        api_key = "k-secret",
        "2/3 providers geocoded"
    );
    tracing::debug!(target: "sqlx::query", "SELECT value FROM kv_entries");
    tracing::debug!(target: "core_directory::geocoding", key = "rue 1|cotonou", "Coordinate cache hit");

    {
        let entries = host.entries.lock().unwrap();
        let messages: Vec<&str> = entries.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["2/3 providers geocoded", "Coordinate cache hit"]);
        assert_eq!(entries[0].field("geocoded"), Some("2"));
        assert_eq!(entries[0].field("api_key"), Some("[REDACTED]"));
        assert_eq!(entries[1].level, LogLevel::Debug);
    }

    assert!(matches!(init_logging(config), Err(Error::Logging(_))));
}

#[test]
fn test_provider_contact_details_are_masked() {
    assert_eq!(redact_if_sensitive("phones", "+229 90 00 00 07"), "***07");
    assert!(!redact_if_sensitive("emails", "accueil@clinique.bj").contains("clinique"));
    assert_eq!(redact_if_sensitive("address", "12 Rue A"), "12 Rue A");
}

#[test]
fn test_default_format_depends_on_build() {
    let expected = if cfg!(debug_assertions) {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    };
    assert_eq!(LoggingConfig::default().format, expected);
}

#[test]
fn test_format_names_parse() {
    assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
    assert!(matches!("yaml".parse::<LogFormat>(), Err(Error::Config(_))));
}
