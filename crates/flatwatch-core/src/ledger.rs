//! Known-offer ledger.
//!
//! A newline-delimited, append-only text file holding one identifier per
//! line: either a bare offer URL, or `URL|sha1hex` for single-page sites
//! whose content is fingerprinted. Membership is a *substring* test against
//! every stored line, not line equality. Existing `known.txt` files rely on
//! this, so a URL that is a prefix of a stored URL counts as known.
//!
//! The ledger is not safe for concurrent writers. A run owns it through
//! `&mut`, and crawling several sites in parallel would need a mutex or a
//! single writer task in front of it.

use std::io;
use std::path::PathBuf;

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::error::AppError;
use crate::models::compute_hash;

#[derive(Debug)]
pub struct Ledger {
    path: Option<PathBuf>,
    entries: Vec<String>,
    include_known: bool,
    needs_newline: bool,
}

impl Ledger {
    /// Open a ledger file. A missing file is treated as empty and created on
    /// the first append.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let path = path.into();
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Ledger file missing, starting empty");
                String::new()
            }
            Err(e) => {
                return Err(AppError::LedgerError(format!(
                    "failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        let entries: Vec<String> = content
            .lines()
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        tracing::debug!(path = %path.display(), entries = entries.len(), "Ledger loaded");

        Ok(Self {
            path: Some(path),
            entries,
            include_known: false,
            needs_newline: !content.is_empty() && !content.ends_with('\n'),
        })
    }

    /// A ledger that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Vec::new(),
            include_known: false,
            needs_newline: false,
        }
    }

    /// Report every identifier as new while still recording unknown ones.
    pub fn with_include_known(mut self, include_known: bool) -> Self {
        self.include_known = include_known;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if any stored line contains `identifier`.
    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.iter().any(|known| known.contains(identifier))
    }

    /// Check `identifier` against the ledger and record it if unknown.
    ///
    /// Returns `true` if it was already known. In include-known mode this
    /// always returns `false`, but unknown identifiers are still recorded so
    /// a later normal run stays consistent.
    pub async fn seen(&mut self, identifier: &str) -> Result<bool, AppError> {
        if self.contains(identifier) {
            return Ok(!self.include_known);
        }
        self.append(identifier).await?;
        Ok(false)
    }

    /// Inverse of [`seen`](Self::seen): true if the identifier should be reported.
    pub async fn is_new(&mut self, identifier: &str) -> Result<bool, AppError> {
        self.seen(identifier).await.map(|seen| !seen)
    }

    async fn append(&mut self, identifier: &str) -> Result<(), AppError> {
        if let Some(path) = &self.path {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await
                .map_err(|e| {
                    AppError::LedgerError(format!("failed to open {}: {e}", path.display()))
                })?;
            let line = if self.needs_newline {
                format!("\n{identifier}\n")
            } else {
                format!("{identifier}\n")
            };
            file.write_all(line.as_bytes()).await.map_err(|e| {
                AppError::LedgerError(format!("failed to append to {}: {e}", path.display()))
            })?;
            file.flush().await.map_err(|e| {
                AppError::LedgerError(format!("failed to flush {}: {e}", path.display()))
            })?;
            self.needs_newline = false;
        }
        self.entries.push(identifier.to_string());
        Ok(())
    }
}

/// Ledger identifier for a page that is itself the offer.
pub fn page_identifier(url: &str, plain_text: &str) -> String {
    format!("{url}|{}", compute_hash(plain_text))
}
