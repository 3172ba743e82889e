use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::error::{CrawlError, DetailError};

/// Static description of one listing site.
///
/// Key names follow the catalog file format (`none-str`, `success-str`,
/// `expose-url-pattern`, `expose-details`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteDescriptor {
    /// Unique human-readable name, used as the key in logs and the digest.
    pub name: String,
    /// Listing page where offers appear.
    pub url: String,
    /// Substring present when the listing has no results.
    #[serde(default, rename = "none-str", skip_serializing_if = "Option::is_none")]
    pub empty_marker: Option<String>,
    /// Substring present when the listing has results.
    #[serde(default, rename = "success-str", skip_serializing_if = "Option::is_none")]
    pub success_marker: Option<String>,
    /// Regex capturing offer links in the raw listing HTML.
    #[serde(
        default,
        rename = "expose-url-pattern",
        skip_serializing_if = "Option::is_none"
    )]
    pub link_pattern: Option<String>,
    /// Field name to regex, applied to each offer page.
    #[serde(
        default,
        rename = "expose-details",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub detail_patterns: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl SiteDescriptor {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            empty_marker: None,
            success_marker: None,
            link_pattern: None,
            detail_patterns: BTreeMap::new(),
            notes: None,
        }
    }

    pub fn with_empty_marker(mut self, marker: impl Into<String>) -> Self {
        self.empty_marker = Some(marker.into());
        self
    }

    pub fn with_success_marker(mut self, marker: impl Into<String>) -> Self {
        self.success_marker = Some(marker.into());
        self
    }

    pub fn with_link_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.link_pattern = Some(pattern.into());
        self
    }

    pub fn with_detail(mut self, field: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.detail_patterns.insert(field.into(), pattern.into());
        self
    }

    /// A markerless site is a single static page that *is* the offer.
    pub fn is_markerless(&self) -> bool {
        self.success_marker.is_none()
    }

    pub fn wants_details(&self) -> bool {
        !self.detail_patterns.is_empty()
    }
}

/// Attributes extracted from an offer page.
///
/// Fields absent from the page are missing from `fields`, never empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfferDetails {
    pub title: Option<String>,
    pub fields: BTreeMap<String, String>,
}

impl OfferDetails {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }
}

/// How an offer was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferKind {
    /// A link extracted from a listing, or a markerless page.
    Listing,
    /// The listing has results but its links cannot be enumerated.
    VisitManually,
}

/// A single offer discovered during one crawl. Identity is the URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offer {
    pub url: String,
    pub kind: OfferKind,
    pub details: Option<OfferDetails>,
    /// Set when the detail page could not be fetched; the offer is kept.
    pub detail_error: Option<DetailError>,
}

impl Offer {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: OfferKind::Listing,
            details: None,
            detail_error: None,
        }
    }

    pub fn visit_manually(url: impl Into<String>) -> Self {
        Self {
            kind: OfferKind::VisitManually,
            ..Self::new(url)
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.details.as_ref().and_then(|d| d.title.as_deref())
    }
}

/// Outcome of crawling one site in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlResult {
    pub site: String,
    pub offers: Vec<Offer>,
    pub error: Option<CrawlError>,
}

impl CrawlResult {
    pub fn new(site: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            offers: Vec::new(),
            error: None,
        }
    }

    /// Add an offer unless one with the same URL is already present.
    pub fn add_offer(&mut self, offer: Offer) -> bool {
        if self.offers.iter().any(|o| o.url == offer.url) {
            return false;
        }
        self.offers.push(offer);
        true
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Sites with neither offers nor an error produce no output.
    pub fn is_reportable(&self) -> bool {
        !self.offers.is_empty() || self.error.is_some()
    }
}

/// Compute a SHA-1 hash of a string, returned as 40-char hex.
///
/// SHA-1 keeps ledger entries compatible with existing `known.txt` files.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_hash_consistency() {
        let h1 = compute_hash("hello world");
        let h2 = compute_hash("hello world");
        assert_eq!(h1, h2);
        assert_eq!(h1, "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed");
    }

    #[test]
    fn test_compute_hash_different_inputs() {
        assert_ne!(compute_hash("hello"), compute_hash("world"));
    }

    #[test]
    fn test_descriptor_from_catalog_keys() {
        let json = r#"{
            "name": "Example",
            "url": "https://example.com/list",
            "none-str": "nothing here",
            "success-str": "FOUND",
            "expose-url-pattern": "href=\"(/offer/\\d+)\"",
            "expose-details": {"price": "Price: (\\d+)"}
        }"#;
        let site: SiteDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(site.empty_marker.as_deref(), Some("nothing here"));
        assert_eq!(site.success_marker.as_deref(), Some("FOUND"));
        assert_eq!(site.link_pattern.as_deref(), Some(r#"href="(/offer/\d+)""#));
        assert!(site.wants_details());
        assert!(!site.is_markerless());
    }

    #[test]
    fn test_markerless_descriptor_defaults() {
        let site: SiteDescriptor =
            serde_json::from_str(r#"{"name": "Static", "url": "https://example.com"}"#).unwrap();
        assert!(site.is_markerless());
        assert!(!site.wants_details());
        assert!(site.notes.is_none());
    }

    #[test]
    fn test_add_offer_is_unique_by_url() {
        let mut result = CrawlResult::new("site");
        assert!(result.add_offer(Offer::new("https://example.com/1")));
        assert!(!result.add_offer(Offer::new("https://example.com/1")));
        assert!(result.add_offer(Offer::new("https://example.com/2")));
        assert_eq!(result.offers.len(), 2);
        assert!(result.is_reportable());
    }

    #[test]
    fn test_empty_errorless_result_is_not_reportable() {
        let result = CrawlResult::new("site");
        assert!(result.is_ok());
        assert!(!result.is_reportable());
    }
}
