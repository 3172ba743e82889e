use std::collections::BTreeMap;

use regex::{Captures, Regex};

use crate::error::AppError;
use crate::models::OfferDetails;

/// Field name stored as the offer title instead of a generic field.
pub const TITLE_FIELD: &str = "title";

/// Compiled field-to-regex mapping for offer detail pages.
#[derive(Debug, Clone)]
pub struct DetailPatterns {
    patterns: Vec<(String, Regex)>,
}

impl DetailPatterns {
    pub fn compile(patterns: &BTreeMap<String, String>) -> Result<Self, AppError> {
        let patterns = patterns
            .iter()
            .map(|(field, pattern)| {
                Regex::new(pattern)
                    .map(|re| (field.clone(), re))
                    .map_err(|e| AppError::InvalidPattern {
                        field: field.clone(),
                        message: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Apply every pattern to `body`. Fields without a match are omitted.
    pub fn extract(&self, body: &str) -> OfferDetails {
        let mut details = OfferDetails::default();
        for (field, re) in &self.patterns {
            let Some(caps) = re.captures(body) else {
                continue;
            };
            let value = joined_groups(&caps);
            if field == TITLE_FIELD {
                details.title = Some(value);
            } else {
                details.fields.insert(field.clone(), value);
            }
        }
        details
    }
}

/// Space-joined capture groups, trimmed. Non-participating groups count as
/// empty strings; a pattern without groups yields the whole match.
fn joined_groups(caps: &Captures<'_>) -> String {
    if caps.len() == 1 {
        return caps[0].trim().to_string();
    }
    caps.iter()
        .skip(1)
        .map(|m| m.map_or("", |m| m.as_str()))
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Compile `patterns` and apply them to `body` in one step.
pub fn extract_details(
    body: &str,
    patterns: &BTreeMap<String, String>,
) -> Result<OfferDetails, AppError> {
    Ok(DetailPatterns::compile(patterns)?.extract(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_single_group_extraction() {
        let details = extract_details("Price: 900", &patterns(&[("price", r"Price: (\d+)")])).unwrap();
        assert_eq!(details.get("price"), Some("900"));
        assert_eq!(details.fields.len(), 1);
        assert!(details.title.is_none());
    }

    #[test]
    fn test_missing_field_is_omitted() {
        let details =
            extract_details("no pricing here", &patterns(&[("price", r"Price: (\d+)")])).unwrap();
        assert!(details.fields.is_empty());
    }

    #[test]
    fn test_title_is_stored_separately() {
        let details = extract_details(
            "<h1> Sunny flat </h1><dd>3</dd>",
            &patterns(&[("title", r"<h1>(.+?)</h1>"), ("rooms", r"<dd>(\d)</dd>")]),
        )
        .unwrap();
        assert_eq!(details.title.as_deref(), Some("Sunny flat"));
        assert_eq!(details.get("rooms"), Some("3"));
        assert!(details.get("title").is_none());
    }

    #[test]
    fn test_multiple_groups_are_space_joined_and_trimmed() {
        let pattern = r#"(?:<span class="street">\s*(.+?)</span>,\s*)?<span class="city">\s*(.+?)</span>"#;
        let with_street = extract_details(
            r#"<span class="street"> Main St 1</span>, <span class="city">Berlin </span>"#,
            &patterns(&[("location", pattern)]),
        )
        .unwrap();
        assert_eq!(with_street.get("location"), Some("Main St 1 Berlin"));

        let without_street = extract_details(
            r#"<span class="city">Berlin</span>"#,
            &patterns(&[("location", pattern)]),
        )
        .unwrap();
        assert_eq!(without_street.get("location"), Some("Berlin"));
    }

    #[test]
    fn test_pattern_without_groups_uses_whole_match() {
        let details =
            extract_details("balcony: yes", &patterns(&[("balcony", r"balcony: \w+")])).unwrap();
        assert_eq!(details.get("balcony"), Some("balcony: yes"));
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let err = extract_details("x", &patterns(&[("price", r"Price: (\d+")])).unwrap_err();
        assert!(matches!(err, AppError::InvalidPattern { ref field, .. } if field == "price"));
    }
}
