//! Digest message templates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CrawlError, DetailError};
use crate::util::{URL_PRINT_LENGTH, truncate};

/// Language of the digest text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    German,
    English,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::German => "de",
            Language::English => "en",
        }
    }

    pub fn subject(&self, offer_count: usize) -> String {
        match self {
            Language::German => format!("[Wohnung] {offer_count} neue Wohnungsangebote"),
            Language::English => format!("[Flat] {offer_count} new flat offers"),
        }
    }

    pub fn greeting(&self) -> &'static str {
        "Hey,"
    }

    pub fn offers_header(&self, site: &str) -> String {
        match self {
            Language::German => format!("es gibt neue Wohnungen bei {site}:"),
            Language::English => format!("there are new flats at {site}:"),
        }
    }

    pub fn errors_header(&self, site: &str) -> String {
        match self {
            Language::German => format!("Es sind Fehler aufgetreten bei {site}:"),
            Language::English => format!("Errors occurred at {site}:"),
        }
    }

    pub fn visit_manually(&self, url: &str) -> String {
        match self {
            Language::German => {
                format!("{url}\n    (Angebote können nicht einzeln ermittelt werden, bitte selbst nachsehen)")
            }
            Language::English => {
                format!("{url}\n    (offers cannot be listed individually, please visit the page)")
            }
        }
    }

    /// Note rendered under an offer whose detail page failed.
    pub fn describe_detail_error(&self, error: &DetailError) -> String {
        match (self, error) {
            (Language::German, DetailError::Connection { url, .. }) => format!(
                "Die Seite {} scheint nicht zu funktionieren. Konnte keine Details ermitteln.",
                truncate(url, URL_PRINT_LENGTH)
            ),
            (Language::English, DetailError::Connection { url, .. }) => format!(
                "The page {} seems to be down. Could not retrieve details.",
                truncate(url, URL_PRINT_LENGTH)
            ),
            (Language::German, DetailError::NotFound { status, reason, .. }) => format!(
                "Exposé konnte nicht gefunden werden. Status war {}.",
                format_status(*status, reason)
            ),
            (Language::English, DetailError::NotFound { status, reason, .. }) => format!(
                "Offer page could not be found. Status was {}.",
                format_status(*status, reason)
            ),
        }
    }

    /// Human-readable description of a per-site error.
    pub fn describe_error(&self, error: &CrawlError) -> String {
        match (self, error) {
            (Language::German, CrawlError::Connection { site, url, .. }) => format!(
                "Die Seite {site} ( {} ) scheint nicht zu funktionieren. Konnte keine Angebote prüfen.",
                truncate(url, URL_PRINT_LENGTH)
            ),
            (Language::English, CrawlError::Connection { site, url, .. }) => format!(
                "The site {site} ( {} ) seems to be down. Could not check for offers.",
                truncate(url, URL_PRINT_LENGTH)
            ),
            (
                Language::German,
                CrawlError::NotFound {
                    site,
                    status,
                    reason,
                    url,
                },
            ) => format!(
                "Angebotsseite {site} konnte nicht gefunden werden. Status war {}.\n{url}",
                format_status(*status, reason)
            ),
            (
                Language::English,
                CrawlError::NotFound {
                    site,
                    status,
                    reason,
                    url,
                },
            ) => format!(
                "Offer page {site} could not be found. Status was {}.\n{url}",
                format_status(*status, reason)
            ),
            (Language::German, CrawlError::PatternMismatch { site }) => format!(
                "success-str bei {site} gefunden, aber keine Matches. expose-url-pattern überprüfen."
            ),
            (Language::English, CrawlError::PatternMismatch { site }) => format!(
                "success-str found at {site}, but no matches. Check expose-url-pattern."
            ),
            (Language::German, CrawlError::UnrecognizedContent { site, url }) => format!(
                "Die Seite {site} ( {} ) enthält keinen der erwarteten Texte. none-str und success-str überprüfen.",
                truncate(url, URL_PRINT_LENGTH)
            ),
            (Language::English, CrawlError::UnrecognizedContent { site, url }) => format!(
                "The site {site} ( {} ) contains none of the expected texts. Check none-str and success-str.",
                truncate(url, URL_PRINT_LENGTH)
            ),
            (Language::German, CrawlError::Misconfigured { site, detail }) => {
                format!("Die Konfiguration von {site} ist fehlerhaft: {detail}")
            }
            (Language::English, CrawlError::Misconfigured { site, detail }) => {
                format!("The configuration of {site} is invalid: {detail}")
            }
            (Language::German, CrawlError::Ledger { site, detail }) => {
                format!("Bekannte Angebote von {site} konnten nicht gespeichert werden: {detail}")
            }
            (Language::English, CrawlError::Ledger { site, detail }) => {
                format!("Known offers of {site} could not be recorded: {detail}")
            }
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "de" | "german" | "deutsch" => Ok(Language::German),
            "en" | "english" => Ok(Language::English),
            _ => Err(format!("Unknown language: {s}")),
        }
    }
}

/// Format a status code like `404 ("Not Found")`.
pub fn format_status(status: u16, reason: &str) -> String {
    format!("{status} (\"{reason}\")")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_roundtrip() {
        for lang in [Language::German, Language::English] {
            let parsed: Language = lang.as_str().parse().unwrap();
            assert_eq!(parsed, lang);
        }
        assert!("fr".parse::<Language>().is_err());
    }

    #[test]
    fn test_subject_carries_count() {
        assert_eq!(Language::German.subject(3), "[Wohnung] 3 neue Wohnungsangebote");
        assert_eq!(Language::English.subject(0), "[Flat] 0 new flat offers");
    }

    #[test]
    fn test_not_found_description() {
        let err = CrawlError::NotFound {
            site: "Gesobau".into(),
            status: 404,
            reason: "Not Found".into(),
            url: "https://example.com/list".into(),
        };
        assert_eq!(
            Language::German.describe_error(&err),
            "Angebotsseite Gesobau konnte nicht gefunden werden. Status war 404 (\"Not Found\").\nhttps://example.com/list"
        );
    }

    #[test]
    fn test_detail_error_descriptions_are_localized() {
        let not_found = DetailError::NotFound {
            url: "https://ads.example/s-anzeige/2".into(),
            status: 404,
            reason: "Not Found".into(),
        };
        assert_eq!(
            Language::German.describe_detail_error(&not_found),
            "Exposé konnte nicht gefunden werden. Status war 404 (\"Not Found\")."
        );
        assert_eq!(
            Language::English.describe_detail_error(&not_found),
            "Offer page could not be found. Status was 404 (\"Not Found\")."
        );

        let down = DetailError::Connection {
            url: "https://ads.example/s-anzeige/3".into(),
            detail: "Network error: Connection failed".into(),
        };
        let german = Language::German.describe_detail_error(&down);
        assert_eq!(
            german,
            "Die Seite https://ads.example/s-anzeige/3 scheint nicht zu funktionieren. Konnte keine Details ermitteln."
        );
        assert!(!german.contains("Network error"));
    }

    #[test]
    fn test_connection_description_truncates_url() {
        let url = format!("https://example.com/{}", "a".repeat(400));
        let err = CrawlError::Connection {
            site: "Slow".into(),
            url,
            detail: "timeout".into(),
        };
        let text = Language::English.describe_error(&err);
        assert!(text.contains("..."));
        assert!(text.len() < 400);
    }
}
