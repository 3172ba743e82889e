use crate::catalog::Catalog;
use crate::crawler::{CrawlReporter, SiteCrawler};
use crate::digest::{Digest, format_digest};
use crate::ledger::Ledger;
use crate::messages::Language;
use crate::models::CrawlResult;
use crate::traits::{Cleaner, Fetcher, Mail, Notifier};

/// Per-run settings passed in from the command line.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Render the digest but do not hand it to the notifier.
    pub no_email: bool,
    pub language: Language,
    pub recipient: String,
    pub bcc: Vec<String>,
}

/// What happened to the digest of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Nothing to report.
    NotNeeded,
    /// Notification disabled for this run.
    Skipped,
    Sent,
    Failed(String),
}

/// Results of one pass over the catalog.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Sites that produced offers or an error, in catalog order.
    pub results: Vec<CrawlResult>,
    pub digest: Option<Digest>,
    pub delivery: Delivery,
}

impl RunReport {
    pub fn has_errors(&self) -> bool {
        self.results.iter().any(|r| !r.is_ok())
    }

    /// `0` when every site finished without an error, `1` otherwise.
    ///
    /// Notification failures do not affect the exit code.
    pub fn exit_code(&self) -> u8 {
        if self.has_errors() { 1 } else { 0 }
    }
}

/// Crawls every site of a catalog in order and delivers one digest.
pub struct RunService<F, C, N>
where
    F: Fetcher,
    C: Cleaner,
    N: Notifier,
{
    crawler: SiteCrawler<F, C>,
    notifier: N,
    options: RunOptions,
}

impl<F, C, N> RunService<F, C, N>
where
    F: Fetcher,
    C: Cleaner,
    N: Notifier,
{
    pub fn new(crawler: SiteCrawler<F, C>, notifier: N, options: RunOptions) -> Self {
        Self {
            crawler,
            notifier,
            options,
        }
    }

    pub async fn run<R: CrawlReporter>(
        &self,
        catalog: &Catalog,
        ledger: &mut Ledger,
        reporter: &R,
    ) -> RunReport {
        let mut results = Vec::new();
        for site in catalog.sites() {
            let result = self.crawler.check(site, ledger, reporter).await;
            if result.is_reportable() {
                results.push(result);
            }
        }

        if results.is_empty() {
            tracing::info!("No new results");
            return RunReport {
                results,
                digest: None,
                delivery: Delivery::NotNeeded,
            };
        }

        tracing::info!(sites = results.len(), "New results found");
        let digest = format_digest(&results, self.options.language);

        let delivery = if self.options.no_email {
            Delivery::Skipped
        } else {
            self.deliver(&digest).await
        };

        RunReport {
            results,
            digest: Some(digest),
            delivery,
        }
    }

    async fn deliver(&self, digest: &Digest) -> Delivery {
        let mail = Mail {
            to: self.options.recipient.clone(),
            bcc: self.options.bcc.clone(),
            subject: digest.subject.clone(),
            body: digest.body.clone(),
        };
        match self.notifier.notify(&mail).await {
            Ok(()) => {
                tracing::info!("Email sent");
                Delivery::Sent
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to send email");
                Delivery::Failed(e.to_string())
            }
        }
    }
}
