use flatwatch_core::error::AppError;
use flatwatch_core::traits::Cleaner;
use scraper::{Html, Node};

/// Elements whose text never counts as page content.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// HTML-to-text cleaner using scraper.
///
/// Concatenates the document's text nodes, leaving out scripts and styles
/// whose content (nonces, cache busters) changes on every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlTextCleaner;

impl HtmlTextCleaner {
    pub fn new() -> Self {
        Self
    }
}

impl Cleaner for HtmlTextCleaner {
    fn clean(&self, html: &str) -> Result<String, AppError> {
        let document = Html::parse_document(html);
        let mut text = String::new();
        for node in document.tree.nodes() {
            let Node::Text(t) = node.value() else {
                continue;
            };
            let skipped = node.ancestors().any(|a| {
                matches!(a.value(), Node::Element(e) if SKIPPED_ELEMENTS.contains(&e.name()))
            });
            if !skipped {
                text.push_str(t);
            }
        }
        Ok(text)
    }
}
