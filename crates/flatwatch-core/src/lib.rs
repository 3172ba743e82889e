pub mod catalog;
pub mod crawler;
pub mod details;
pub mod digest;
pub mod error;
pub mod ledger;
pub mod messages;
pub mod models;
pub mod run;
pub mod traits;
pub mod util;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use catalog::Catalog;
pub use crawler::{CrawlConfig, RetryPolicy, SiteCrawler, TracingCrawlReporter};
pub use digest::{Digest, format_digest};
pub use error::{AppError, CrawlError, CrawlErrorKind, DetailError};
pub use ledger::Ledger;
pub use messages::Language;
pub use models::{CrawlResult, Offer, OfferDetails, SiteDescriptor, compute_hash};
pub use run::{Delivery, RunOptions, RunReport, RunService};
pub use traits::{Cleaner, Fetcher, Mail, Notifier};
