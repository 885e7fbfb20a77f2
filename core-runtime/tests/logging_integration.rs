//! Integration tests for logging system

use core_runtime::logging::{
    init_logging, redact_if_sensitive, redact_url, LogFormat, LogLevel, LoggingConfig,
};

#[test]
fn test_logging_initialization_once() {
    // Only one global subscriber can be installed per process
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug);

    assert!(init_logging(config.clone()).is_ok());
    assert!(init_logging(config).is_err());

    tracing::debug!(target: "core_fs", path = "/movies", "listing folder");
}

#[test]
fn test_invalid_filter_is_rejected() {
    let config = LoggingConfig::default().with_filter("core_auth=loudest");
    assert!(init_logging(config).is_err());
}

#[test]
fn test_redaction_of_session_secrets() {
    for field in ["access_token", "refresh_token", "password", "Authorization"] {
        assert_eq!(redact_if_sensitive(field, "value"), "[REDACTED]");
    }
}

#[test]
fn test_redaction_of_usernames() {
    let redacted = redact_if_sensitive("username", "alice@example.com");

    assert!(redacted.starts_with('a'));
    assert!(redacted.contains("[REDACTED]"));
    assert!(!redacted.contains("example.com"));
}

#[test]
fn test_presigned_links_lose_their_signature() {
    let link = "https://vod0001.mypikpak.com/download/?fid=abc&verno=1&g=xyz";
    let redacted = redact_url(link);

    assert!(redacted.starts_with("https://vod0001.mypikpak.com/download/"));
    assert!(!redacted.contains("fid=abc"));
}
