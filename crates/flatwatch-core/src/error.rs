use thiserror::Error;

/// Infrastructure errors raised by flatwatch collaborators.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed for a reason other than connect/timeout.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// The server answered with a non-success status code.
    #[error("HTTP status {status} ({reason})")]
    HttpStatus { status: u16, reason: String },

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// HTML-to-text conversion failed.
    #[error("Cleaner error: {0}")]
    CleanerError(String),

    /// A site descriptor carries a regex that does not compile.
    #[error("Invalid pattern for {field}: {message}")]
    InvalidPattern { field: String, message: String },

    /// Reading or appending the known-offer ledger failed.
    #[error("Ledger error: {0}")]
    LedgerError(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The notifier could not deliver the digest.
    #[error("Notification error: {0}")]
    NotifyError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Coarse classification of a [`CrawlError`], useful for tests and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlErrorKind {
    Connection,
    NotFound,
    PatternMismatch,
    UnrecognizedContent,
    Misconfigured,
    Ledger,
}

/// Outcome of a failed crawl attempt for one site.
///
/// Every variant carries the site name so a digest line can be rendered
/// without looking the descriptor up again.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CrawlError {
    /// The origin could not be reached (connection refused, DNS, timeout).
    #[error("site {site} ({url}) is unreachable: {detail}")]
    Connection {
        site: String,
        url: String,
        detail: String,
    },

    /// The listing page answered with a non-success status.
    #[error("listing page of {site} returned {status} ({reason}): {url}")]
    NotFound {
        site: String,
        status: u16,
        reason: String,
        url: String,
    },

    /// The success marker matched but the link pattern found nothing.
    #[error("success marker found on {site} but the link pattern matched nothing")]
    PatternMismatch { site: String },

    /// The page loaded but matched neither the success nor the empty marker.
    #[error("page of {site} ({url}) matched none of the expected markers")]
    UnrecognizedContent { site: String, url: String },

    /// The descriptor carries a pattern that cannot be compiled.
    #[error("site {site} is misconfigured: {detail}")]
    Misconfigured { site: String, detail: String },

    /// The known-offer ledger could not be read or appended.
    #[error("known-offer ledger failed while crawling {site}: {detail}")]
    Ledger { site: String, detail: String },
}

impl CrawlError {
    pub fn kind(&self) -> CrawlErrorKind {
        match self {
            CrawlError::Connection { .. } => CrawlErrorKind::Connection,
            CrawlError::NotFound { .. } => CrawlErrorKind::NotFound,
            CrawlError::PatternMismatch { .. } => CrawlErrorKind::PatternMismatch,
            CrawlError::UnrecognizedContent { .. } => CrawlErrorKind::UnrecognizedContent,
            CrawlError::Misconfigured { .. } => CrawlErrorKind::Misconfigured,
            CrawlError::Ledger { .. } => CrawlErrorKind::Ledger,
        }
    }

    /// Returns true if another attempt might succeed.
    ///
    /// Markup drift is retried too: a half-rendered page occasionally
    /// trips the markers.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            CrawlError::Misconfigured { .. } | CrawlError::Ledger { .. }
        )
    }

    /// Returns true if the error most likely means the site markup changed
    /// and the descriptor needs updating.
    pub fn is_markup_drift(&self) -> bool {
        matches!(
            self,
            CrawlError::PatternMismatch { .. } | CrawlError::UnrecognizedContent { .. }
        )
    }
}

/// Why an offer's detail page could not be read. The offer itself is kept.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetailError {
    #[error("detail page {url} is unreachable: {detail}")]
    Connection { url: String, detail: String },

    #[error("detail page {url} returned {status} ({reason})")]
    NotFound {
        url: String,
        status: u16,
        reason: String,
    },
}

impl DetailError {
    /// Classify a failed detail fetch the same way listing fetches are.
    pub fn from_fetch(url: &str, error: AppError) -> Self {
        match error {
            AppError::HttpStatus { status, reason } => DetailError::NotFound {
                url: url.to_string(),
                status,
                reason,
            },
            other => DetailError::Connection {
                url: url.to_string(),
                detail: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(
            CrawlError::Connection {
                site: "a".into(),
                url: "https://a.example".into(),
                detail: "refused".into(),
            }
            .is_retryable()
        );
        assert!(
            CrawlError::NotFound {
                site: "a".into(),
                status: 503,
                reason: "Service Unavailable".into(),
                url: "https://a.example".into(),
            }
            .is_retryable()
        );
        assert!(CrawlError::PatternMismatch { site: "a".into() }.is_retryable());
        assert!(
            !CrawlError::Misconfigured {
                site: "a".into(),
                detail: "bad regex".into(),
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_markup_drift_is_shared_by_both_marker_failures() {
        let mismatch = CrawlError::PatternMismatch { site: "a".into() };
        let unrecognized = CrawlError::UnrecognizedContent {
            site: "a".into(),
            url: "https://a.example".into(),
        };
        assert!(mismatch.is_markup_drift());
        assert!(unrecognized.is_markup_drift());
        assert_ne!(mismatch.kind(), unrecognized.kind());
    }

    #[test]
    fn test_detail_error_from_fetch() {
        let not_found = DetailError::from_fetch(
            "https://a.example/o/1",
            AppError::HttpStatus {
                status: 404,
                reason: "Not Found".into(),
            },
        );
        assert_eq!(
            not_found,
            DetailError::NotFound {
                url: "https://a.example/o/1".into(),
                status: 404,
                reason: "Not Found".into(),
            }
        );

        let down = DetailError::from_fetch("https://a.example/o/1", AppError::Timeout(30));
        assert!(matches!(down, DetailError::Connection { ref detail, .. } if detail.contains("30 seconds")));
    }
}
