//! Tag Store: the in-memory source of truth for one session
//!
//! Every mutation marks the store dirty and (re)arms the debouncer. When the
//! quiet period ends the owner's loop calls `poll()`, which writes the Local
//! Cache and then, if a token is configured, the gist. `flush_now()` skips the
//! wait and is what the owner calls when the session ends.

use crate::config::Config;
use crate::debounce::Debouncer;
use crate::error::{Result, ValidationError};
use crate::gist::{GistClient, GistOptions};
use crate::local::LocalCache;
use crate::merge::merge;
use crate::model::{derive_id, Store, Tag};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// Nothing waiting to be written
    Clean,
    /// Edits pending, debounce timer running
    Dirty,
    /// A flush is writing right now
    Flushing,
}

/// What happened to the remote copy during a flush
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "lowercase")]
pub enum RemoteOutcome {
    /// No token configured, or running offline
    Skipped,
    Synced,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    pub remote: RemoteOutcome,
}

/// Which sources contributed to a load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    pub remote: bool,
    pub local: bool,
}

pub struct TagStore {
    store: Store,
    cache: LocalCache,
    remote: Option<GistClient>,
    debouncer: Debouncer,
    dirty: bool,
    flushing: bool,
    remote_unsaved: bool,
}

impl TagStore {
    pub fn new(cache: LocalCache, remote: Option<GistClient>, debounce: Duration) -> Self {
        Self {
            store: Store::default(),
            cache,
            remote,
            debouncer: Debouncer::new(debounce),
            dirty: false,
            flushing: false,
            remote_unsaved: false,
        }
    }

    /// Build from configuration; `offline` leaves the gist out entirely
    pub fn open(config: &Config, offline: bool) -> Result<Self> {
        let cache = LocalCache::new(config.local_dir());
        let remote = if offline {
            None
        } else {
            Some(GistClient::new(GistOptions::from(&config.sync), cache.clone())?)
        };
        Ok(Self::new(cache, remote, config.sync.debounce()))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    pub fn remote(&self) -> Option<&GistClient> {
        self.remote.as_ref()
    }

    pub fn remote_mut(&mut self) -> Option<&mut GistClient> {
        self.remote.as_mut()
    }

    pub fn remote_configured(&self) -> bool {
        self.remote.as_ref().is_some_and(GistClient::is_configured)
    }

    pub fn sync_state(&self) -> SyncState {
        if self.flushing {
            SyncState::Flushing
        } else if self.dirty {
            SyncState::Dirty
        } else {
            SyncState::Clean
        }
    }

    /// The last flush wrote locally but could not reach the gist
    pub fn has_unsaved_remote(&self) -> bool {
        self.remote_unsaved
    }

    /// Merge remote, local and in-memory state (in that order of precedence)
    pub fn load(&mut self) -> LoadReport {
        let mut report = LoadReport::default();
        let mut merged = self.store.clone();

        if let Some(local) = self.cache.load() {
            merged = merge(&local, &merged);
            report.local = true;
        }

        if let Some(remote) = self.remote.as_mut().filter(|r| r.is_configured()) {
            // Only a gist that actually answered counts as loaded
            match remote.try_load() {
                Ok(store) => {
                    tracing::info!(tags = store.tags.len(), "loaded tag data from gist");
                    merged = merge(&store, &merged);
                    report.remote = true;
                }
                Err(e) => tracing::error!(error = %e, "failed to load tag data from gist"),
            }
        }

        self.store = merged;
        tracing::debug!(?report, tags = self.store.tags.len(), "tag store loaded");
        report
    }

    fn schedule_flush(&mut self) {
        self.dirty = true;
        self.debouncer.schedule();
    }

    /// Create a tag from a display name
    pub fn add_tag(&mut self, name: &str) -> Result<&Tag> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        let id = derive_id(name);
        if id.is_empty() {
            return Err(ValidationError::UnusableName(name.to_string()).into());
        }
        if self.store.tags.contains_key(&id) {
            return Err(ValidationError::DuplicateTag(id).into());
        }

        let tag = Tag::new(name);
        tracing::info!(tag = %id, color = %tag.color, "added tag");
        self.store.tags.insert(id.clone(), tag);
        self.schedule_flush();
        Ok(&self.store.tags[&id])
    }

    /// Delete a tag and strip it from every slide
    ///
    /// Callers are expected to have confirmed with the user first.
    pub fn remove_tag(&mut self, tag_id: &str) -> Option<Tag> {
        for ids in self.store.assignments.values_mut() {
            ids.retain(|id| id != tag_id);
        }
        self.store.assignments.retain(|_, ids| !ids.is_empty());
        let removed = self.store.tags.remove(tag_id);
        if removed.is_some() {
            tracing::info!(tag = tag_id, "removed tag");
        }
        self.schedule_flush();
        removed
    }

    /// Attach a tag to a slide; returns false if it was already there
    pub fn assign_tag(&mut self, slide_id: &str, tag_id: &str) -> bool {
        let ids = self.store.assignments.entry(slide_id.to_string()).or_default();
        let added = !ids.iter().any(|id| id == tag_id);
        if added {
            ids.push(tag_id.to_string());
        }
        self.schedule_flush();
        added
    }

    /// Detach a tag from a slide; returns false if it was not there
    pub fn unassign_tag(&mut self, slide_id: &str, tag_id: &str) -> bool {
        let mut removed = false;
        if let Some(ids) = self.store.assignments.get_mut(slide_id) {
            let before = ids.len();
            ids.retain(|id| id != tag_id);
            removed = ids.len() != before;
            if ids.is_empty() {
                self.store.assignments.remove(slide_id);
            }
        }
        self.schedule_flush();
        removed
    }

    /// Flip membership; returns whether the tag is now assigned
    pub fn toggle_tag(&mut self, slide_id: &str, tag_id: &str) -> bool {
        if self.tags_by_slide(slide_id).iter().any(|id| id == tag_id) {
            self.unassign_tag(slide_id, tag_id);
            false
        } else {
            self.assign_tag(slide_id, tag_id);
            true
        }
    }

    pub fn tag(&self, tag_id: &str) -> Option<&Tag> {
        self.store.tags.get(tag_id)
    }

    /// Tag ids on a slide, in assignment order
    pub fn tags_by_slide(&self, slide_id: &str) -> &[String] {
        self.store
            .assignments
            .get(slide_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn slides_by_tag(&self, tag_id: &str) -> Vec<&str> {
        self.store
            .assignments
            .iter()
            .filter(|(_, ids)| ids.iter().any(|id| id == tag_id))
            .map(|(slide, _)| slide.as_str())
            .collect()
    }

    /// Swap in a whole store (backup restore)
    pub fn replace_store(&mut self, mut store: Store) {
        store.normalize();
        self.store = store;
        self.schedule_flush();
    }

    /// Fold another store in, letting it win tag collisions
    pub fn merge_store(&mut self, store: &Store) {
        self.store = merge(store, &self.store);
        self.schedule_flush();
    }

    /// Pull every source, then push the merged result back out
    pub fn sync(&mut self) -> (LoadReport, Option<FlushReport>) {
        let loaded = self.load();
        self.dirty = true;
        (loaded, self.flush_now())
    }

    /// Time the owner may wait before the next `poll()` matters
    pub fn next_flush_in(&self) -> Option<Duration> {
        self.debouncer.time_remaining()
    }

    /// Run the flush if the debounce window has closed
    pub fn poll(&mut self) -> Option<FlushReport> {
        if self.debouncer.poll() {
            self.flush()
        } else {
            None
        }
    }

    /// Flush immediately, bypassing the debouncer
    ///
    /// Used when the session is ending. Does nothing when there is nothing to
    /// write and the remote copy is current.
    pub fn flush_now(&mut self) -> Option<FlushReport> {
        self.debouncer.cancel();
        if !self.dirty && !self.remote_unsaved {
            return None;
        }
        self.flush()
    }

    fn flush(&mut self) -> Option<FlushReport> {
        if self.flushing {
            return None;
        }
        self.flushing = true;
        self.dirty = false;

        self.store.touch();
        self.cache.save(&self.store);

        let remote = match self.remote.as_mut().filter(|r| r.is_configured()) {
            None => RemoteOutcome::Skipped,
            Some(client) => match client.save(&self.store) {
                Ok(()) => RemoteOutcome::Synced,
                Err(e) => {
                    tracing::error!(error = %e, "failed to sync to gist (saved locally)");
                    RemoteOutcome::Failed(e.to_string())
                }
            },
        };
        self.remote_unsaved = matches!(remote, RemoteOutcome::Failed(_));

        self.flushing = false;
        Some(FlushReport { remote })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn offline_store(dir: &std::path::Path) -> TagStore {
        TagStore::new(LocalCache::new(dir), None, Duration::from_millis(1500))
    }

    #[test]
    fn test_add_tag_derives_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut tags = offline_store(dir.path());

        assert_eq!(tags.add_tag("SRE").unwrap().id, "sre");
        assert_eq!(tags.add_tag("SRE 2.0!").unwrap().id, "sre-2-0");
        assert_eq!(tags.store().tags["sre-2-0"].name, "SRE 2.0!");
    }

    #[test]
    fn test_add_tag_rejects_empty_and_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let mut tags = offline_store(dir.path());
        tags.add_tag("SRE").unwrap();

        assert!(matches!(
            tags.add_tag("   "),
            Err(Error::Validation(ValidationError::EmptyName))
        ));
        assert!(matches!(
            tags.add_tag("sre"),
            Err(Error::Validation(ValidationError::DuplicateTag(id))) if id == "sre"
        ));
        assert!(matches!(
            tags.add_tag("???"),
            Err(Error::Validation(ValidationError::UnusableName(_)))
        ));
        assert_eq!(tags.store().tags.len(), 1);
    }

    #[test]
    fn test_assign_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut tags = offline_store(dir.path());
        tags.add_tag("SRE").unwrap();

        assert!(tags.assign_tag("sre-next-2025", "sre"));
        assert!(!tags.assign_tag("sre-next-2025", "sre"));
        assert_eq!(tags.tags_by_slide("sre-next-2025"), ["sre".to_string()]);
    }

    #[test]
    fn test_unassign_absent_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut tags = offline_store(dir.path());
        assert!(!tags.unassign_tag("deck", "sre"));
        assert!(tags.store().assignments.is_empty());
    }

    #[test]
    fn test_toggle_flips_membership() {
        let dir = tempfile::tempdir().unwrap();
        let mut tags = offline_store(dir.path());

        assert!(tags.toggle_tag("deck", "sre"));
        assert!(tags.toggle_tag("deck", "k8s"));
        assert!(!tags.toggle_tag("deck", "sre"));
        assert_eq!(tags.tags_by_slide("deck"), ["k8s".to_string()]);
    }

    #[test]
    fn test_assignment_order_is_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut tags = offline_store(dir.path());
        for id in ["zeta", "alpha", "mid"] {
            tags.assign_tag("deck", id);
        }
        assert_eq!(tags.tags_by_slide("deck"), ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_remove_tag_strips_assignments() {
        let dir = tempfile::tempdir().unwrap();
        let mut tags = offline_store(dir.path());
        tags.add_tag("SRE").unwrap();
        tags.add_tag("Vercel").unwrap();
        tags.assign_tag("a", "sre");
        tags.assign_tag("b", "sre");
        tags.assign_tag("b", "vercel");

        let removed = tags.remove_tag("sre").unwrap();
        assert_eq!(removed.name, "SRE");
        assert!(tags.slides_by_tag("sre").is_empty());
        assert!(tags.tag("sre").is_none());
        assert_eq!(tags.tags_by_slide("b"), ["vercel".to_string()]);
        assert!(!tags.store().assignments.contains_key("a"));
    }

    #[test]
    fn test_slides_by_tag() {
        let dir = tempfile::tempdir().unwrap();
        let mut tags = offline_store(dir.path());
        tags.assign_tag("a", "sre");
        tags.assign_tag("b", "k8s");
        tags.assign_tag("c", "sre");
        assert_eq!(tags.slides_by_tag("sre"), vec!["a", "c"]);
        assert!(tags.tags_by_slide("missing").is_empty());
    }

    #[test]
    fn test_state_machine() {
        let dir = tempfile::tempdir().unwrap();
        let mut tags = offline_store(dir.path());
        assert_eq!(tags.sync_state(), SyncState::Clean);

        tags.add_tag("SRE").unwrap();
        assert_eq!(tags.sync_state(), SyncState::Dirty);
        assert!(tags.next_flush_in().is_some());
        // Debounce window is still open
        assert!(tags.poll().is_none());

        let report = tags.flush_now().unwrap();
        assert_eq!(report.remote, RemoteOutcome::Skipped);
        assert_eq!(tags.sync_state(), SyncState::Clean);
        assert!(tags.next_flush_in().is_none());
        assert!(tags.flush_now().is_none());
    }

    #[test]
    fn test_poll_flushes_after_quiet_period() {
        let dir = tempfile::tempdir().unwrap();
        let mut tags = TagStore::new(LocalCache::new(dir.path()), None, Duration::ZERO);
        tags.add_tag("SRE").unwrap();

        assert!(tags.poll().is_some());
        assert_eq!(tags.sync_state(), SyncState::Clean);
        assert!(tags.cache().load().unwrap().tags.contains_key("sre"));
    }

    #[test]
    fn test_flush_writes_local_and_load_reads_it_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = offline_store(dir.path());
        first.add_tag("SRE").unwrap();
        first.assign_tag("sre-next-2025", "sre");
        first.flush_now();
        assert!(first.store().last_updated.is_some());

        let mut second = offline_store(dir.path());
        let report = second.load();
        assert!(report.local);
        assert!(!report.remote);
        assert_eq!(second.store(), first.store());
    }

    #[test]
    fn test_load_keeps_in_memory_edits() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = offline_store(dir.path());
        first.add_tag("Local").unwrap();
        first.flush_now();

        let mut second = offline_store(dir.path());
        second.add_tag("Memory").unwrap();
        second.load();
        assert!(second.tag("local").is_some());
        assert!(second.tag("memory").is_some());
    }

    #[test]
    fn test_sync_always_writes() {
        let dir = tempfile::tempdir().unwrap();
        let mut tags = offline_store(dir.path());
        assert!(tags.flush_now().is_none());

        let (loaded, flushed) = tags.sync();
        assert!(!loaded.local);
        assert_eq!(flushed.unwrap().remote, RemoteOutcome::Skipped);
        assert!(tags.cache().load().is_some());
    }

    #[test]
    fn test_replace_and_merge_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut tags = offline_store(dir.path());
        tags.add_tag("Old").unwrap();

        let mut incoming = Store::default();
        let tag = Tag::new("New");
        incoming.tags.insert(tag.id.clone(), tag);

        tags.merge_store(&incoming);
        assert!(tags.tag("old").is_some());
        assert!(tags.tag("new").is_some());

        tags.replace_store(incoming);
        assert!(tags.tag("old").is_none());
        assert_eq!(tags.sync_state(), SyncState::Dirty);
    }
}
