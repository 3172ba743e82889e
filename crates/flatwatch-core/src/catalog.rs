use std::collections::HashSet;
use std::path::Path;

use regex::Regex;
use url::Url;

use crate::details::DetailPatterns;
use crate::error::AppError;
use crate::models::SiteDescriptor;

/// Ordered list of sites to crawl, as loaded from the catalog file.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    sites: Vec<SiteDescriptor>,
}

impl Catalog {
    /// Build a catalog, rejecting invalid descriptors.
    pub fn new(sites: Vec<SiteDescriptor>) -> Result<Self, AppError> {
        let catalog = Self { sites };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parse a JSON array of site descriptors.
    pub fn from_json_str(json: &str) -> Result<Self, AppError> {
        let sites: Vec<SiteDescriptor> = serde_json::from_str(json)?;
        Self::new(sites)
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!(
                "Failed to read site catalog {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json_str(&json)
    }

    pub fn sites(&self) -> &[SiteDescriptor] {
        &self.sites
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    fn validate(&self) -> Result<(), AppError> {
        let mut names = HashSet::new();
        for site in &self.sites {
            if !names.insert(site.name.as_str()) {
                return Err(AppError::ConfigError(format!(
                    "Duplicate site name '{}'",
                    site.name
                )));
            }

            let url = Url::parse(&site.url).map_err(|e| {
                AppError::ConfigError(format!("Site '{}' has an invalid url: {e}", site.name))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(AppError::ConfigError(format!(
                    "Site '{}' url scheme '{}' is not allowed (only http/https)",
                    site.name,
                    url.scheme()
                )));
            }

            if let Some(pattern) = &site.link_pattern {
                Regex::new(pattern).map_err(|e| {
                    AppError::ConfigError(format!(
                        "Site '{}' has an invalid expose-url-pattern: {e}",
                        site.name
                    ))
                })?;
                if site.success_marker.is_none() {
                    tracing::warn!(site = %site.name, "expose-url-pattern is ignored without success-str");
                }
            }

            DetailPatterns::compile(&site.detail_patterns).map_err(|e| {
                AppError::ConfigError(format!("Site '{}': {e}", site.name))
            })?;
        }
        Ok(())
    }
}
