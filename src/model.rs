//! Tag definitions, slide assignments and the persisted store
//!
//! The JSON shape matches what the browser widget has always written:
//!
//! ```json
//! {
//!   "tags": { "sre": { "id": "sre", "name": "SRE", "color": "blue", "createdAt": "..." } },
//!   "assignments": { "sre-next-2025": ["sre"] },
//!   "lastUpdated": "2025-07-20T09:00:00.000Z",
//!   "version": "2.0.0"
//! }
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Format version written into every saved store
pub const STORE_VERSION: &str = "2.0.0";

lazy_static! {
    static ref NON_SLUG_RUN: Regex = Regex::new(r"[^a-z0-9]+").expect("valid slug regex");
}

/// Current time as an RFC 3339 UTC timestamp with millisecond precision
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Derive a URL/CSS-safe tag id from a display name
///
/// "SRE 2.0!" -> "sre-2-0"
pub fn derive_id(name: &str) -> String {
    let lower = name.to_lowercase();
    NON_SLUG_RUN
        .replace_all(&lower, "-")
        .trim_matches('-')
        .to_string()
}

/// The eight tag colors offered by the tag editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TagColor {
    Blue,
    Green,
    Red,
    Yellow,
    Purple,
    Pink,
    Indigo,
    Gray,
}

impl TagColor {
    pub const ALL: [TagColor; 8] = [
        TagColor::Blue,
        TagColor::Green,
        TagColor::Red,
        TagColor::Yellow,
        TagColor::Purple,
        TagColor::Pink,
        TagColor::Indigo,
        TagColor::Gray,
    ];

    /// Pick a color at random for a freshly created tag
    pub fn random() -> Self {
        let byte = uuid::Uuid::new_v4().as_bytes()[0];
        Self::ALL[byte as usize % Self::ALL.len()]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TagColor::Blue => "blue",
            TagColor::Green => "green",
            TagColor::Red => "red",
            TagColor::Yellow => "yellow",
            TagColor::Purple => "purple",
            TagColor::Pink => "pink",
            TagColor::Indigo => "indigo",
            TagColor::Gray => "gray",
        }
    }

    /// Unknown names fall back to blue
    pub fn parse(s: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s.trim().to_lowercase())
            .unwrap_or(TagColor::Blue)
    }

    /// Utility classes used by the generated page
    pub fn css_class(&self) -> &'static str {
        match self {
            TagColor::Blue => "bg-blue-100 text-blue-800 border-blue-200",
            TagColor::Green => "bg-green-100 text-green-800 border-green-200",
            TagColor::Red => "bg-red-100 text-red-800 border-red-200",
            TagColor::Yellow => "bg-yellow-100 text-yellow-800 border-yellow-200",
            TagColor::Purple => "bg-purple-100 text-purple-800 border-purple-200",
            TagColor::Pink => "bg-pink-100 text-pink-800 border-pink-200",
            TagColor::Indigo => "bg-indigo-100 text-indigo-800 border-indigo-200",
            TagColor::Gray => "bg-gray-100 text-gray-800 border-gray-200",
        }
    }
}

impl From<String> for TagColor {
    fn from(s: String) -> Self {
        TagColor::parse(&s)
    }
}

impl From<TagColor> for String {
    fn from(c: TagColor) -> Self {
        c.as_str().to_string()
    }
}

impl std::fmt::Display for TagColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-created label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    /// Older stores keyed tags by id without repeating it; filled in by `Store::normalize`
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default = "default_color")]
    pub color: TagColor,
    #[serde(default)]
    pub created_at: String,
}

fn default_color() -> TagColor {
    TagColor::Blue
}

impl Tag {
    /// Build a tag for `name` with a random color, stamped now
    pub fn new(name: &str) -> Self {
        let name = name.trim();
        Self {
            id: derive_id(name),
            name: name.to_string(),
            color: TagColor::random(),
            created_at: now_timestamp(),
        }
    }
}

/// Everything that is persisted and synced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: BTreeMap<String, Tag>,
    /// slide id -> tag ids in insertion order
    #[serde(default, deserialize_with = "null_as_default")]
    pub assignments: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default = "default_version", deserialize_with = "null_as_version")]
    pub version: String,
}

fn default_version() -> String {
    STORE_VERSION.to_string()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_version<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_version))
}

impl Default for Store {
    fn default() -> Self {
        Self {
            tags: BTreeMap::new(),
            assignments: BTreeMap::new(),
            last_updated: None,
            version: default_version(),
        }
    }
}

impl Store {
    /// Parse a serialized store and normalize it
    pub fn from_json(content: &str) -> crate::Result<Self> {
        let mut store: Store = serde_json::from_str(content)?;
        store.normalize();
        Ok(store)
    }

    pub fn to_json_pretty(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Fill missing tag ids from their keys and drop empty assignment lists
    pub fn normalize(&mut self) {
        for (key, tag) in self.tags.iter_mut() {
            if tag.id.is_empty() {
                tag.id = key.clone();
            }
        }
        self.assignments.retain(|_, ids| !ids.is_empty());
    }

    pub fn touch(&mut self) {
        self.last_updated = Some(now_timestamp());
    }

    /// A copy stamped with the current time
    pub fn stamped(&self) -> Store {
        let mut copy = self.clone();
        copy.touch();
        copy
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.assignments.is_empty()
    }

    /// Tag definitions for the ids assigned to a slide, skipping dangling ids
    pub fn resolved_tags(&self, slide_id: &str) -> Vec<&Tag> {
        self.assignments
            .get(slide_id)
            .map(|ids| ids.iter().filter_map(|id| self.tags.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn last_updated_at(&self) -> Option<DateTime<Utc>> {
        self.last_updated
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}
