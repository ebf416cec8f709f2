//! Filter View: which slides are visible for a search query and tag filters
//!
//! A slide is visible when the query is empty or appears in its searchable
//! text, and when no tag filters are active or it carries at least one of them.

use crate::model::Store;
use crate::slides::SlideMeta;
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlideFilter {
    query: String,
    active_tags: BTreeSet<String>,
}

/// Lowercased text a query is matched against: slide metadata plus assigned tag names
pub fn search_text(slide: &SlideMeta, store: &Store) -> String {
    let mut text = slide.searchable_text();
    for tag in store.resolved_tags(&slide.name) {
        text.push(' ');
        text.push_str(&tag.name.to_lowercase());
    }
    text
}

impl SlideFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query: &str) -> Self {
        self.set_query(query);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.active_tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn set_query(&mut self, query: &str) {
        self.query = query.trim().to_lowercase();
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn active_tags(&self) -> &BTreeSet<String> {
        &self.active_tags
    }

    /// Returns whether the tag filter is now active
    pub fn toggle_tag(&mut self, tag_id: &str) -> bool {
        if self.active_tags.remove(tag_id) {
            false
        } else {
            self.active_tags.insert(tag_id.to_string());
            true
        }
    }

    /// Turn a tag filter on (clicking a tag chip never turns it off)
    pub fn activate_tag(&mut self, tag_id: &str) {
        self.active_tags.insert(tag_id.to_string());
    }

    pub fn clear(&mut self) {
        self.query.clear();
        self.active_tags.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.query.is_empty() && self.active_tags.is_empty()
    }

    pub fn matches(&self, slide: &SlideMeta, store: &Store) -> bool {
        let assigned = store
            .assignments
            .get(&slide.name)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let query_ok = self.query.is_empty() || search_text(slide, store).contains(&self.query);

        let tags_ok =
            self.active_tags.is_empty() || assigned.iter().any(|id| self.active_tags.contains(id));

        query_ok && tags_ok
    }

    /// Partition the catalog into visible and hidden slides, keeping catalog order
    pub fn apply<'a>(&self, slides: &'a [SlideMeta], store: &Store) -> FilterResult<'a> {
        let (visible, hidden) = slides.iter().partition(|slide| self.matches(slide, store));
        FilterResult { visible, hidden }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterResult<'a> {
    pub visible: Vec<&'a SlideMeta>,
    pub hidden: Vec<&'a SlideMeta>,
}

impl FilterResult<'_> {
    pub fn total(&self) -> usize {
        self.visible.len() + self.hidden.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "Showing {} of {} presentations",
            self.visible.len(),
            self.total()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Tag;

    fn slides() -> Vec<SlideMeta> {
        let mut a = SlideMeta::new("sre-next-2025", "SRE NEXT 2025");
        a.description = "NoC staff report".to_string();
        let mut b = SlideMeta::new("slidev-system", "Managing many Slidev decks");
        b.category = "system-design".to_string();
        let c = SlideMeta::new("smart-tag-system", "Smart Tag System");
        vec![a, b, c]
    }

    fn store() -> Store {
        let mut store = Store::default();
        for name in ["SRE", "Vercel"] {
            let tag = Tag::new(name);
            store.tags.insert(tag.id.clone(), tag);
        }
        store
            .assignments
            .insert("sre-next-2025".to_string(), vec!["sre".to_string()]);
        store.assignments.insert(
            "slidev-system".to_string(),
            vec!["vercel".to_string(), "ghost".to_string()],
        );
        store
    }

    #[test]
    fn test_empty_filter_shows_everything() {
        let slides = slides();
        let result = SlideFilter::new().apply(&slides, &store());
        assert_eq!(result.visible.len(), 3);
        assert!(result.hidden.is_empty());
        assert_eq!(result.summary(), "Showing 3 of 3 presentations");
    }

    #[test]
    fn test_query_is_case_insensitive_substring() {
        let slides = slides();
        let store = store();
        let filter = SlideFilter::new().with_query("  noc STAFF ");
        assert!(filter.matches(&slides[0], &store));
        assert!(!filter.matches(&slides[1], &store));
    }

    #[test]
    fn test_query_matches_tag_names() {
        let slides = slides();
        let filter = SlideFilter::new().with_query("vercel");
        let result = filter.apply(&slides, &store());
        assert_eq!(result.visible.len(), 1);
        assert_eq!(result.visible[0].name, "slidev-system");
    }

    #[test]
    fn test_non_matching_query_hides() {
        let slides = slides();
        let filter = SlideFilter::new().with_query("zzz-no-such-text");
        assert!(filter.apply(&slides, &store()).visible.is_empty());
    }

    #[test]
    fn test_tags_are_or_within_and_with_query() {
        let slides = slides();
        let store = store();

        let either = SlideFilter::new().with_tags(["sre", "vercel"]);
        assert_eq!(either.apply(&slides, &store).visible.len(), 2);

        let both = SlideFilter::new().with_tags(["sre", "vercel"]).with_query("slidev");
        let result = both.apply(&slides, &store);
        assert_eq!(result.visible.len(), 1);
        assert_eq!(result.visible[0].name, "slidev-system");
    }

    #[test]
    fn test_dangling_filter_tag_matches_assignment() {
        // Filtering works on assigned ids even when the definition is gone
        let slides = slides();
        let filter = SlideFilter::new().with_tags(["ghost"]);
        let result = filter.apply(&slides, &store());
        assert_eq!(result.visible.len(), 1);
    }

    #[test]
    fn test_toggle_activate_clear() {
        let mut filter = SlideFilter::new();
        assert!(filter.toggle_tag("sre"));
        filter.activate_tag("sre");
        assert_eq!(filter.active_tags().len(), 1);
        assert!(!filter.toggle_tag("sre"));
        filter.set_query("x");
        filter.activate_tag("k8s");
        filter.clear();
        assert!(filter.is_empty());
    }
}
