//! Rendering of a run's results into a mail subject and body.

use crate::messages::Language;
use crate::models::{CrawlResult, Offer, OfferKind};
use crate::util::{field_label, indent};

/// A rendered digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub subject: String,
    pub body: String,
}

/// Number of offers from sites that finished without an error.
pub fn offer_count(results: &[CrawlResult]) -> usize {
    results
        .iter()
        .filter(|r| r.is_ok())
        .map(|r| r.offers.len())
        .sum()
}

/// Render `results` in `language`.
///
/// Sites with offers come first, sites with errors after them.
pub fn format_digest(results: &[CrawlResult], language: Language) -> Digest {
    let mut offer_sections = Vec::new();
    let mut error_sections = Vec::new();

    for result in results {
        match &result.error {
            Some(error) => error_sections.push(format!(
                "\n{}\n{}\n",
                language.errors_header(&result.site),
                indent(&language.describe_error(error), "  ✖ ")
            )),
            None => offer_sections.push(format!(
                "\n{}\n{}\n",
                language.offers_header(&result.site),
                result
                    .offers
                    .iter()
                    .map(|o| format_offer(o, language))
                    .collect::<Vec<_>>()
                    .join("\n")
            )),
        }
    }

    Digest {
        subject: language.subject(offer_count(results)),
        body: format!(
            "{}\n{}\n{}\n",
            language.greeting(),
            offer_sections.join("\n"),
            error_sections.join("\n")
        ),
    }
}

fn format_offer(offer: &Offer, language: Language) -> String {
    if offer.kind == OfferKind::VisitManually {
        return format!("  ✔ {}", language.visit_manually(&offer.url));
    }

    if offer.details.is_none() && offer.detail_error.is_none() {
        return format!("  ✔ {}", offer.url);
    }

    let mut lines = vec![
        format!("  ✔ {}", offer.title().unwrap_or(&offer.url)),
        format!("    {}", offer.url),
    ];
    if let Some(details) = &offer.details {
        lines.extend(
            details
                .fields
                .iter()
                .map(|(field, value)| format!("        {:<10} {value}", field_label(field))),
        );
    }
    if let Some(error) = &offer.detail_error {
        lines.push(format!("        ({})", language.describe_detail_error(error)));
    }
    lines.join("\n")
}
