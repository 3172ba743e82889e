//! Per-site crawl-and-diff state machine.
//!
//! Each attempt fetches the listing page and classifies it:
//!
//! ```text
//! fetch failed ------------------------------> Connection
//! non-success status ------------------------> NotFound
//! no success marker configured --------------> page is the offer (URL|hash)
//! success marker in body --+-- no pattern ---> visit-manually pseudo-offer
//!                          +-- links found --> new links via ledger
//!                          +-- no links -----> PatternMismatch
//! empty marker in body ----------------------> nothing new
//! otherwise ---------------------------------> UnrecognizedContent
//! ```
//!
//! Errors are retried with a backoff of `(previous + 2) * 1.5` seconds.

use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use url::Url;

use crate::details::DetailPatterns;
use crate::error::{AppError, CrawlError, DetailError};
use crate::ledger::{Ledger, page_identifier};
use crate::models::{CrawlResult, Offer, SiteDescriptor};
use crate::traits::{Cleaner, Fetcher};

/// Retry schedule for one site.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub retries: u32,
    /// Wait before the first retry.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(retries: u32, initial_backoff: Duration) -> Self {
        Self {
            retries,
            initial_backoff,
        }
    }

    /// Backoff following `previous`: 1s -> 4.5s -> 9.75s -> ...
    fn next_backoff(previous: Duration) -> Duration {
        Duration::from_secs_f64((previous.as_secs_f64() + 2.0) * 1.5)
    }

    /// Waits between attempts, one per retry.
    pub fn schedule(&self) -> Vec<Duration> {
        let mut waits = Vec::with_capacity(self.retries as usize);
        let mut backoff = self.initial_backoff;
        for _ in 0..self.retries {
            waits.push(backoff);
            backoff = Self::next_backoff(backoff);
        }
        waits
    }
}

/// Crawler settings shared by every site of a run.
#[derive(Debug, Clone, Default)]
pub struct CrawlConfig {
    pub retry: RetryPolicy,
    /// Directory receiving the raw HTML of listings whose success marker matched.
    pub dump_dir: Option<PathBuf>,
}

impl CrawlConfig {
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = Some(dir.into());
        self
    }
}

/// Events emitted while crawling, for logging and tests.
#[derive(Debug, Clone)]
pub enum CrawlEvent<'a> {
    Crawling {
        site: &'a str,
        url: &'a str,
    },
    NoOffers {
        site: &'a str,
    },
    NewOffer {
        site: &'a str,
        url: &'a str,
    },
    DetailsFailed {
        site: &'a str,
        url: &'a str,
        error: &'a DetailError,
    },
    Retrying {
        site: &'a str,
        error: &'a CrawlError,
        retries_left: u32,
        delay: Duration,
    },
    GaveUp {
        site: &'a str,
        error: &'a CrawlError,
    },
}

/// Receives crawl events. Verbosity is decided by the implementation.
pub trait CrawlReporter: Send + Sync {
    fn report(&self, event: CrawlEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCrawlReporter;

impl CrawlReporter for TracingCrawlReporter {
    fn report(&self, event: CrawlEvent<'_>) {
        match event {
            CrawlEvent::Crawling { site, url } => {
                tracing::info!(%site, %url, "Crawling");
            }
            CrawlEvent::NoOffers { site } => {
                tracing::info!(%site, "No flats found");
            }
            CrawlEvent::NewOffer { site, url } => {
                tracing::debug!(%site, %url, "New offer");
            }
            CrawlEvent::DetailsFailed { site, url, error } => {
                tracing::warn!(%site, %url, %error, "Could not fetch offer details");
            }
            CrawlEvent::Retrying {
                site,
                error,
                retries_left,
                delay,
            } => {
                tracing::warn!(
                    %site,
                    %error,
                    retries_left,
                    delay_secs = delay.as_secs_f64(),
                    "Crawl failed, retrying"
                );
            }
            CrawlEvent::GaveUp { site, error } => {
                if error.is_markup_drift() {
                    tracing::error!(%site, %error, "Crawl failed, site markup probably changed");
                } else {
                    tracing::error!(%site, %error, "Crawl failed");
                }
            }
        }
    }
}

/// Crawls one site at a time against a shared ledger.
///
/// Generic over the fetcher and the HTML-to-text cleaner so tests can run
/// without network access.
pub struct SiteCrawler<F, C>
where
    F: Fetcher,
    C: Cleaner,
{
    fetcher: F,
    cleaner: C,
    config: CrawlConfig,
}

impl<F, C> SiteCrawler<F, C>
where
    F: Fetcher,
    C: Cleaner,
{
    pub fn new(fetcher: F, cleaner: C, config: CrawlConfig) -> Self {
        Self {
            fetcher,
            cleaner,
            config,
        }
    }

    /// Crawl `site` with the configured retry policy.
    ///
    /// Never fails: the last classified error ends up in the result.
    /// Include-known mode is a property of the ledger.
    pub async fn check<R: CrawlReporter>(
        &self,
        site: &SiteDescriptor,
        ledger: &mut Ledger,
        reporter: &R,
    ) -> CrawlResult {
        self.check_with(site, &self.config.retry, ledger, reporter)
            .await
    }

    /// Crawl `site` with an explicit retry policy.
    pub async fn check_with<R: CrawlReporter>(
        &self,
        site: &SiteDescriptor,
        retry: &RetryPolicy,
        ledger: &mut Ledger,
        reporter: &R,
    ) -> CrawlResult {
        let mut result = CrawlResult::new(&site.name);
        let mut delays = retry.schedule().into_iter();

        loop {
            reporter.report(CrawlEvent::Crawling {
                site: &site.name,
                url: &site.url,
            });
            result.error = None;

            match self.attempt(site, ledger, reporter).await {
                Ok(offers) => {
                    for offer in offers {
                        result.add_offer(offer);
                    }
                    return result;
                }
                Err(error) => {
                    let retries_left = delays.len() as u32;
                    if error.is_retryable()
                        && let Some(delay) = delays.next()
                    {
                        reporter.report(CrawlEvent::Retrying {
                            site: &site.name,
                            error: &error,
                            retries_left,
                            delay,
                        });
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    reporter.report(CrawlEvent::GaveUp {
                        site: &site.name,
                        error: &error,
                    });
                    result.error = Some(error);
                    return result;
                }
            }
        }
    }

    /// One fetch-and-classify pass.
    async fn attempt<R: CrawlReporter>(
        &self,
        site: &SiteDescriptor,
        ledger: &mut Ledger,
        reporter: &R,
    ) -> Result<Vec<Offer>, CrawlError> {
        let details = if site.wants_details() {
            Some(
                DetailPatterns::compile(&site.detail_patterns)
                    .map_err(|e| misconfigured(site, e))?,
            )
        } else {
            None
        };

        let body = self
            .fetcher
            .fetch(&site.url)
            .await
            .map_err(|e| classify_fetch_error(site, e))?;

        let Some(success_marker) = site.success_marker.as_deref() else {
            // The whole page is the offer.
            if !self.page_is_new(site, &body, ledger).await? {
                return Ok(Vec::new());
            }
            reporter.report(CrawlEvent::NewOffer {
                site: &site.name,
                url: &site.url,
            });
            let mut offer = Offer::new(&site.url);
            offer.details = details.map(|d| d.extract(&body));
            return Ok(vec![offer]);
        };

        if body.contains(success_marker) {
            self.dump_listing(site, &body).await;

            let Some(pattern) = site.link_pattern.as_deref() else {
                if !self.page_is_new(site, &body, ledger).await? {
                    return Ok(Vec::new());
                }
                reporter.report(CrawlEvent::NewOffer {
                    site: &site.name,
                    url: &site.url,
                });
                return Ok(vec![Offer::visit_manually(&site.url)]);
            };

            let re = Regex::new(pattern).map_err(|e| {
                misconfigured(
                    site,
                    AppError::InvalidPattern {
                        field: "expose-url-pattern".into(),
                        message: e.to_string(),
                    },
                )
            })?;
            let links = extract_links(&re, &body);
            if links.is_empty() {
                return Err(CrawlError::PatternMismatch {
                    site: site.name.clone(),
                });
            }

            let listing = Url::parse(&site.url).map_err(|e| CrawlError::Misconfigured {
                site: site.name.clone(),
                detail: format!("invalid url: {e}"),
            })?;

            let mut offers = Vec::new();
            for link in links {
                let url = resolve_link(&listing, link);
                if !ledger
                    .is_new(&url)
                    .await
                    .map_err(|e| ledger_error(site, e))?
                {
                    continue;
                }
                reporter.report(CrawlEvent::NewOffer {
                    site: &site.name,
                    url: &url,
                });
                let offer = self.build_offer(site, url, details.as_ref(), reporter).await;
                offers.push(offer);
            }
            return Ok(offers);
        }

        match site.empty_marker.as_deref() {
            Some(marker) if body.contains(marker) => {
                reporter.report(CrawlEvent::NoOffers { site: &site.name });
                Ok(Vec::new())
            }
            _ => Err(CrawlError::UnrecognizedContent {
                site: site.name.clone(),
                url: site.url.clone(),
            }),
        }
    }

    /// Ledger check for a page identified by its URL and text fingerprint.
    async fn page_is_new(
        &self,
        site: &SiteDescriptor,
        body: &str,
        ledger: &mut Ledger,
    ) -> Result<bool, CrawlError> {
        let text = match self.cleaner.clean(body) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(site = %site.name, error = %e, "Text extraction failed, hashing raw HTML");
                body.to_string()
            }
        };
        ledger
            .is_new(&page_identifier(&site.url, &text))
            .await
            .map_err(|e| ledger_error(site, e))
    }

    /// Build an offer, enriching it from its detail page when patterns exist.
    async fn build_offer<R: CrawlReporter>(
        &self,
        site: &SiteDescriptor,
        url: String,
        details: Option<&DetailPatterns>,
        reporter: &R,
    ) -> Offer {
        let mut offer = Offer::new(url);
        let Some(patterns) = details else {
            return offer;
        };

        match self.fetcher.fetch(&offer.url).await {
            Ok(body) => offer.details = Some(patterns.extract(&body)),
            Err(e) => {
                let error = DetailError::from_fetch(&offer.url, e);
                reporter.report(CrawlEvent::DetailsFailed {
                    site: &site.name,
                    url: &offer.url,
                    error: &error,
                });
                offer.detail_error = Some(error);
            }
        }
        offer
    }

    async fn dump_listing(&self, site: &SiteDescriptor, html: &str) {
        let Some(dir) = &self.config.dump_dir else {
            return;
        };
        let path = dir.join(format!("site-{}.html", site.name.replace(['/', '\\'], "_")));
        if let Err(e) = write_listing(dir, &path, html).await {
            tracing::warn!(path = %path.display(), error = %e, "Failed to dump listing HTML");
        }
    }
}

async fn write_listing(dir: &Path, path: &Path, html: &str) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(path, html).await
}

fn classify_fetch_error(site: &SiteDescriptor, error: AppError) -> CrawlError {
    match error {
        AppError::HttpStatus { status, reason } => CrawlError::NotFound {
            site: site.name.clone(),
            status,
            reason,
            url: site.url.clone(),
        },
        other => CrawlError::Connection {
            site: site.name.clone(),
            url: site.url.clone(),
            detail: other.to_string(),
        },
    }
}

fn misconfigured(site: &SiteDescriptor, error: AppError) -> CrawlError {
    CrawlError::Misconfigured {
        site: site.name.clone(),
        detail: error.to_string(),
    }
}

fn ledger_error(site: &SiteDescriptor, error: AppError) -> CrawlError {
    CrawlError::Ledger {
        site: site.name.clone(),
        detail: error.to_string(),
    }
}

/// All link captures in document order. Uses the first participating group,
/// or the whole match when the pattern has no groups.
pub fn extract_links<'h>(re: &Regex, html: &'h str) -> Vec<&'h str> {
    re.captures_iter(html)
        .filter_map(|caps| caps.iter().skip(1).flatten().next().or_else(|| caps.get(0)))
        .map(|m| m.as_str())
        .collect()
}

/// Resolve an offer link against the listing URL.
///
/// Absolute links are kept verbatim. Anything else is treated as a path
/// from the document root of the listing's origin.
pub fn resolve_link(listing: &Url, link: &str) -> String {
    if Url::parse(link).is_ok() {
        return link.to_string();
    }
    format!(
        "{}/{}",
        listing.origin().ascii_serialization(),
        link.trim_start_matches('/')
    )
}
