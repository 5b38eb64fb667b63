//! # error.rs - Error kinds for the matching core
//!
//! The core distinguishes a small set of failure modes. Everything the user
//! can trigger (bad regex, producer I/O failure) is recoverable; `Bug` is
//! reserved for internal invariant violations and is the only kind that may
//! surface as a panic.

use thiserror::Error;

/// Failure modes of the matching pipeline.
///
/// - `ProducerRead`: the input stream failed mid-read. The reader reports it
///   through `ReadFin` and the coordinator enters drain mode.
/// - `RegexCompile`: a regex term failed to compile. The search is skipped
///   and an empty merger is published.
/// - `Cancelled`: a search was superseded before completion. Discarded
///   silently by the coordinator.
/// - `Bug`: an internal invariant was violated (e.g. merger index out of
///   bounds). Treated as fatal.
///
/// ANSI parse anomalies are never errors; malformed escape sequences are
/// consumed byte-by-byte by the extractor.
#[derive(Debug, Error)]
pub enum SiftError {
    /// I/O failure on the producer stream
    #[error("producer read failed: {0}")]
    ProducerRead(#[from] std::io::Error),

    /// Malformed regex in a query term
    #[error("invalid regex: {0}")]
    RegexCompile(#[from] regex::Error),

    /// A superseded search; normal outcome, discarded silently
    #[error("search cancelled")]
    Cancelled,

    /// Internal invariant violation
    #[error("internal error: {0}")]
    Bug(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regex_error_conversion() {
        let err = regex::Regex::new("(unclosed").unwrap_err();
        let sift: SiftError = err.into();
        assert!(
            matches!(sift, SiftError::RegexCompile(_)),
            "regex errors should map to RegexCompile"
        );
        assert!(
            sift.to_string().starts_with("invalid regex"),
            "display should name the failing kind"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let sift: SiftError = err.into();
        assert!(matches!(sift, SiftError::ProducerRead(_)));
    }
}
