//! Backup files: a dated JSON snapshot of the whole store
//!
//! The wrapper carries the export time and format version next to the data so
//! a backup can be told apart from a raw cache file.

use crate::error::{Error, Result};
use crate::model::{now_timestamp, Store, STORE_VERSION};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupFile {
    pub export_date: String,
    pub version: String,
    pub data: Store,
}

impl BackupFile {
    pub fn new(store: &Store) -> Self {
        Self {
            export_date: now_timestamp(),
            version: STORE_VERSION.to_string(),
            data: store.clone(),
        }
    }

    /// Parse and validate a backup
    ///
    /// A bare store (no wrapper) is accepted too, since the cache and gist
    /// files have that shape.
    pub fn from_json(content: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        let Some(object) = value.as_object() else {
            return Err(Error::Parse("backup must be a JSON object".to_string()));
        };

        let mut backup = if object.contains_key("data") {
            serde_json::from_value::<BackupFile>(value)?
        } else if object.contains_key("tags") || object.contains_key("assignments") {
            BackupFile {
                export_date: String::new(),
                version: STORE_VERSION.to_string(),
                data: serde_json::from_value(value)?,
            }
        } else {
            return Err(Error::Parse(
                "not a slidetags backup (no data, tags or assignments)".to_string(),
            ));
        };

        backup.data.normalize();
        Ok(backup)
    }
}

/// `slidetags-backup-YYYY-MM-DD.json` for today
pub fn default_backup_name() -> String {
    format!("slidetags-backup-{}.json", Local::now().format("%Y-%m-%d"))
}

/// Write a backup of `store` to `path`
pub fn export(store: &Store, path: &Path) -> Result<BackupFile> {
    let backup = BackupFile::new(store);
    let json = serde_json::to_string_pretty(&backup)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, json)?;
    tracing::info!(path = %path.display(), tags = store.tags.len(), "exported backup");
    Ok(backup)
}

/// Read and validate a backup file
pub fn import(path: &Path) -> Result<BackupFile> {
    let content = fs::read_to_string(path)?;
    let backup = BackupFile::from_json(&content)?;
    tracing::info!(
        path = %path.display(),
        tags = backup.data.tags.len(),
        "read backup"
    );
    Ok(backup)
}
