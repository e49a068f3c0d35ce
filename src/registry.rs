//! Per-kind record registries.
//!
//! A [`Registry`] maps fingerprint tags to [`EntityRecord`] snapshots for a
//! single entity kind, backed by a collection directory on disk. Directory
//! ingestion fans out over rayon; a file that fails to parse is logged and
//! skipped, never aborting the batch. All map access goes through a single
//! `RwLock`, and reads hand out clones, so published records are immutable
//! snapshots and every update is an atomic whole-record replacement.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use rayon::prelude::*;
use serde_json::Value;

use crate::error::{CollectError, Result};
use crate::format::Format;
use crate::kind::EntityKind;
use crate::record::EntityRecord;

pub struct Registry {
    kind: EntityKind,
    path: PathBuf,
    records: RwLock<HashMap<String, EntityRecord>>,
}

impl Registry {
    /// Opens the collection directory for `kind`, creating it when missing,
    /// and ingests every file with a matching extension.
    pub fn new(kind: EntityKind, path: impl Into<PathBuf>) -> Result<Self> {
        let registry = Self {
            kind,
            path: path.into(),
            records: RwLock::new(HashMap::new()),
        };
        registry.reinitialize()?;
        Ok(registry)
    }

    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Collection directory backing this registry.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drops all records and re-ingests the collection directory.
    pub fn reinitialize(&self) -> Result<()> {
        fs_err::create_dir_all(&self.path).map_err(|source| CollectError::Io {
            source,
            path: Some(self.path.clone()),
        })?;

        let mut files = Vec::new();
        let entries = fs_err::read_dir(&self.path).map_err(|source| CollectError::Io {
            source,
            path: Some(self.path.clone()),
        })?;
        for entry in entries {
            let path = entry
                .map_err(|source| CollectError::Io {
                    source,
                    path: Some(self.path.clone()),
                })?
                .path();
            let matches = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| {
                    self.kind
                        .collection_extensions()
                        .iter()
                        .any(|known| known.eq_ignore_ascii_case(e))
                });
            if matches {
                files.push(path);
            }
        }
        debug!("ingesting {} {} file(s) from {}", files.len(), self.kind, self.path.display());

        let ingested: Vec<EntityRecord> = files
            .par_iter()
            .filter_map(|path| match read_record(self.kind, path) {
                Ok(record) => Some(record),
                Err(error @ CollectError::Io { .. }) => {
                    warn!("skipping {}: {error}", path.display());
                    None
                }
                Err(error) => {
                    debug!("skipping {}: {error}", path.display());
                    None
                }
            })
            .collect();

        let mut records = self.write_lock();
        records.clear();
        for record in ingested {
            records.insert(record.tag(), record);
        }
        Ok(())
    }

    /// Parses a single file and publishes the result, replacing any record
    /// with the same tag.
    pub fn add_or_update_file(&self, path: &Path) -> Result<EntityRecord> {
        let record = read_record(self.kind, path)?;
        Ok(self.upsert(record))
    }

    /// Extracts a save document slot and publishes the result. `None` when
    /// the slot does not hold this kind of entity.
    pub fn add_or_update(&self, document: &Value, index: i64) -> Option<EntityRecord> {
        let record = EntityRecord::from_document(self.kind, document, index)?;
        Some(self.upsert(record))
    }

    /// Parses serialized text in the given encoding and publishes the result.
    pub fn add_or_update_text(&self, text: &str, format: Format) -> Result<EntityRecord> {
        let record = self.kind.decode(format, text.as_bytes())?;
        Ok(self.upsert(record))
    }

    /// Returns the record matching a save document slot, linking it to that
    /// slot; extracts and publishes a new record when none matches.
    pub fn get_or_add(&self, document: &Value, index: i64) -> Option<EntityRecord> {
        let tag = self.kind.tag_at(document, index)?;
        let mut records = self.write_lock();
        if let Some(existing) = records.get_mut(&tag) {
            existing.source_index = Some(index);
            return Some(existing.clone());
        }
        let record = EntityRecord::from_document(self.kind, document, index)?;
        records.insert(tag, record.clone());
        Some(record)
    }

    /// Record with the given fingerprint, if present.
    #[must_use]
    pub fn get(&self, tag: &str) -> Option<EntityRecord> {
        self.read_lock().get(tag).cloned()
    }

    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.read_lock().contains_key(tag)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read_lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read_lock().is_empty()
    }

    /// Snapshot of all published records.
    #[must_use]
    pub fn records(&self) -> Vec<EntityRecord> {
        self.read_lock().values().cloned().collect()
    }

    /// Deletes the record's backing file. The map entry is dropped only when
    /// the record is not linked to a save slot; a linked record stays
    /// resident so the occurrence remains addressable.
    pub fn remove(&self, record: &EntityRecord) -> Result<()> {
        if let Some(location) = &record.location {
            fs_err::remove_file(location).map_err(|source| CollectError::Io {
                source,
                path: Some(location.clone()),
            })?;
        }
        if !record.is_linked() {
            self.write_lock().remove(&record.tag());
        }
        Ok(())
    }

    fn upsert(&self, record: EntityRecord) -> EntityRecord {
        self.write_lock().insert(record.tag(), record.clone());
        record
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, EntityRecord>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, EntityRecord>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("records", &self.len())
            .finish()
    }
}

/// Parses a collection file: container-family extensions go straight to the
/// container decoder, everything else is read as text and sniffed.
fn read_record(kind: EntityKind, path: &Path) -> Result<EntityRecord> {
    let bytes = fs_err::read(path).map_err(|source| CollectError::Io {
        source,
        path: Some(path.to_path_buf()),
    })?;
    let format = Format::of_path(path)
        .or_else(|| std::str::from_utf8(&bytes).ok().and_then(Format::sniff_text))
        .ok_or(CollectError::UnrecognizedDocument)?;

    let mut record = kind.decode(format, &bytes)?;
    record.location = Some(path.to_path_buf());
    record.created_at = file_creation_time(path).unwrap_or_else(Utc::now);
    if kind == EntityKind::Base && format == Format::Container {
        // The encrypted frame carries no name; the filename is the only one.
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            record.set_name(stem);
        }
    }
    Ok(record)
}

fn file_creation_time(path: &Path) -> Option<DateTime<Utc>> {
    let metadata = fs_err::metadata(path).ok()?;
    metadata
        .created()
        .or_else(|_| metadata.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}
