//! Failure classification heuristics.
//!
//! Severity is a keyword/category heuristic over the error message and
//! kind; it feeds the exception ledger and summaries but never changes
//! retry or breaker behavior.

use navops_core::ExceptionSeverity;

/// Infrastructure failure keywords → critical.
const CRITICAL_KEYWORDS: [&str; 5] = ["database", "connection", "timeout", "memory", "disk"];

/// Access-control and lookup keywords → high.
const HIGH_KEYWORDS: [&str; 4] = ["permission", "authentication", "authorization", "not found"];

/// Classify a failed attempt by its kind and message.
pub fn classify_severity(kind: &str, message: &str) -> ExceptionSeverity {
    let msg = message.to_lowercase();

    if CRITICAL_KEYWORDS.iter().any(|k| msg.contains(k)) {
        ExceptionSeverity::Critical
    } else if HIGH_KEYWORDS.iter().any(|k| msg.contains(k)) {
        ExceptionSeverity::High
    } else if matches!(kind, "parse" | "json") || msg.contains("invalid") {
        ExceptionSeverity::Medium
    } else {
        ExceptionSeverity::Low
    }
}

/// Derive a coarse error kind from the error chain.
///
/// Used as the bulk-resolve key in the exception ledger.
pub fn classify_kind(err: &anyhow::Error) -> String {
    for cause in err.chain() {
        if cause.downcast_ref::<reqwest::Error>().is_some() {
            return "http".to_string();
        }
        if cause.downcast_ref::<std::io::Error>().is_some() {
            return "io".to_string();
        }
        if cause.downcast_ref::<serde_json::Error>().is_some() {
            return "json".to_string();
        }
        if cause.downcast_ref::<std::num::ParseIntError>().is_some()
            || cause.downcast_ref::<std::num::ParseFloatError>().is_some()
        {
            return "parse".to_string();
        }
    }
    "other".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infrastructure_keywords_are_critical() {
        assert_eq!(
            classify_severity("other", "database connection refused"),
            ExceptionSeverity::Critical
        );
        assert_eq!(
            classify_severity("other", "request Timeout after 30s"),
            ExceptionSeverity::Critical
        );
    }

    #[test]
    fn access_keywords_are_high() {
        assert_eq!(
            classify_severity("other", "permission denied"),
            ExceptionSeverity::High
        );
        assert_eq!(
            classify_severity("other", "resource not found"),
            ExceptionSeverity::High
        );
    }

    #[test]
    fn validation_failures_are_medium() {
        assert_eq!(
            classify_severity("parse", "cannot parse replica count"),
            ExceptionSeverity::Medium
        );
        assert_eq!(
            classify_severity("other", "invalid argument"),
            ExceptionSeverity::Medium
        );
    }

    #[test]
    fn everything_else_is_low() {
        assert_eq!(
            classify_severity("other", "something odd happened"),
            ExceptionSeverity::Low
        );
    }

    #[test]
    fn kind_from_io_error() {
        let err = anyhow::Error::from(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "pipe closed",
        ));
        assert_eq!(classify_kind(&err), "io");
    }

    #[test]
    fn kind_from_parse_error() {
        let err = anyhow::Error::from("x".parse::<u32>().unwrap_err());
        assert_eq!(classify_kind(&err), "parse");
    }

    #[test]
    fn kind_from_http_error() {
        let err = reqwest::Client::new()
            .get("not a url")
            .build()
            .unwrap_err();
        assert_eq!(classify_kind(&anyhow::Error::from(err)), "http");
    }

    #[test]
    fn kind_falls_back_to_other() {
        let err = anyhow::anyhow!("opaque failure");
        assert_eq!(classify_kind(&err), "other");
    }
}
