use std::future::Future;

use crate::error::AppError;

/// Fetches raw HTML content from a URL.
///
/// Implementations map transport failures to [`AppError::NetworkError`],
/// [`AppError::Timeout`] or [`AppError::HttpError`], and non-success
/// responses to [`AppError::HttpStatus`].
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Converts raw HTML into plain text, used for content fingerprints.
pub trait Cleaner: Send + Sync + Clone {
    fn clean(&self, html: &str) -> Result<String, AppError>;
}

/// An outgoing digest message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub to: String,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Delivers a digest to its recipients.
pub trait Notifier: Send + Sync {
    fn notify(&self, mail: &Mail) -> impl Future<Output = Result<(), AppError>> + Send;
}
