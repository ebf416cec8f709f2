//! Slide catalog read from slides.toml
//!
//! ```toml
//! [[slide]]
//! name = "sre-next-2025"
//! title = "SRE NEXT 2025 - NoC staff report"
//! date = "2025-07-17"
//! category = "tech-talk"
//! ```

use crate::error::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

lazy_static! {
    static ref SLIDE_NAME: Regex = Regex::new(r"^[a-z0-9-]+$").expect("valid slide name regex");
}

/// Metadata for one presentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideMeta {
    /// Directory name and URL path segment; also the slide id for tagging
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// ISO date (YYYY-MM-DD)
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub language: String,
}

impl SlideMeta {
    pub fn new(name: &str, title: &str) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            description: String::new(),
            date: String::new(),
            author: String::new(),
            category: String::new(),
            duration: String::new(),
            level: String::new(),
            language: String::new(),
        }
    }

    /// Lowercased text the search box matches against
    pub fn searchable_text(&self) -> String {
        [
            self.name.as_str(),
            self.title.as_str(),
            self.description.as_str(),
            self.date.as_str(),
            self.author.as_str(),
            self.category.as_str(),
        ]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
    }
}

/// Whether `name` is usable as a slide directory and URL segment
pub fn is_valid_slide_name(name: &str) -> bool {
    SLIDE_NAME.is_match(name)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideCatalog {
    #[serde(default, rename = "slide")]
    pub slides: Vec<SlideMeta>,
}

impl SlideCatalog {
    pub fn from_toml(content: &str) -> Result<Self> {
        let catalog: SlideCatalog =
            toml::from_str(content).map_err(|e| Error::Catalog(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Read the catalog; a missing file is an empty catalog
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "slide catalog not found, using an empty one");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for slide in &self.slides {
            if !is_valid_slide_name(&slide.name) {
                return Err(Error::Catalog(format!(
                    "slide name '{}' must contain only lowercase letters, numbers, and hyphens",
                    slide.name
                )));
            }
            if !seen.insert(slide.name.as_str()) {
                return Err(Error::Catalog(format!("duplicate slide name '{}'", slide.name)));
            }
        }
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<&SlideMeta> {
        self.slides.iter().find(|s| s.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }
}
