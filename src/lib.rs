//! slidetags - index page and tag store for a slide-deck collection
//!
//! Generates one `index.html` for a directory of presentations and keeps
//! user-defined tags on them, cached locally and synced to a GitHub Gist.
//!
//! # Overview
//!
//! | Piece | Role |
//! |-------|------|
//! | [`SlideCatalog`] | Slide metadata read from `slides.toml` |
//! | [`TagStore`] | In-memory tags and assignments with debounced flushing |
//! | [`LocalCache`] | Per-machine JSON cache (`tag-data`, `gist-settings`) |
//! | [`GistClient`] | Remote copy in a single gist file |
//! | [`merge()`] | Union of two stores, one side authoritative |
//! | [`SlideFilter`] | Search and tag filtering over the catalog |
//!
//! # Quick Start
//!
//! ```no_run
//! use slidetags::{LocalCache, TagStore};
//! use std::time::Duration;
//!
//! let mut tags = TagStore::new(LocalCache::new(".slidetags/local"), None, Duration::from_millis(1500));
//! tags.load();
//!
//! tags.add_tag("SRE").unwrap();
//! tags.assign_tag("sre-next-2025", "sre");
//!
//! // Session is ending: write now instead of waiting for the debouncer
//! tags.flush_now();
//! ```

pub mod backup;
pub mod config;
pub mod debounce;
pub mod error;
pub mod filter;
pub mod gist;
pub mod init;
pub mod local;
pub mod merge;
pub mod model;
pub mod page;
pub mod serve;
pub mod slides;
pub mod tags;

pub use config::Config;
pub use error::{Error, Result, ValidationError};
pub use filter::{FilterResult, SlideFilter};
pub use gist::{GistClient, GistOptions, GistSettings, GistStatus};
pub use local::LocalCache;
pub use merge::merge;
pub use model::{derive_id, Store, Tag, TagColor, STORE_VERSION};
pub use slides::{SlideCatalog, SlideMeta};
pub use tags::{FlushReport, LoadReport, RemoteOutcome, SyncState, TagStore};
