//! Collected entity records.
//!
//! An [`EntityRecord`] is a value snapshot: the extracted sub-trees, the
//! bookkeeping that travels with them (previews, description, star flag) and
//! the provenance of the snapshot (source file, source save slot). Records
//! are cheap to clone and never alias live registry state.

use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use log::debug;
use serde_json::{Map, Value};

use crate::error::{CollectError, Result};
use crate::format::Format;
use crate::kind::EntityKind;

pub const PREVIEW_SLOTS: usize = 6;

/// Envelope field names of the v2 JSON encoding, in serialization order.
const PREVIEW_KEYS: [&str; PREVIEW_SLOTS] = [
    "Preview", "Preview2", "Preview3", "Preview4", "Preview5", "Preview6",
];

#[derive(Debug, Clone)]
pub struct EntityRecord {
    pub kind: EntityKind,
    /// Extracted sub-trees, keyed by their role (kind-specific).
    pub data: Map<String, Value>,
    pub description: String,
    pub previews: [Option<Vec<u8>>; PREVIEW_SLOTS],
    pub starred: bool,
    pub created_at: DateTime<Utc>,
    /// Encoding this record was read in, used by re-exports.
    pub format: Option<Format>,
    /// File this record was read from, if any.
    pub location: Option<PathBuf>,
    name: Option<String>,
    /// Save-slot index the record is linked to; rewritten only by the
    /// registry.
    pub(crate) source_index: Option<i64>,
}

impl EntityRecord {
    #[must_use]
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            data: Map::new(),
            description: String::new(),
            previews: Default::default(),
            starred: false,
            created_at: Utc::now(),
            format: None,
            location: None,
            name: None,
            source_index: None,
        }
    }

    /// Extracts a record from a save document slot. `None` if the slot does
    /// not hold this kind of entity.
    #[must_use]
    pub fn from_document(kind: EntityKind, document: &Value, index: i64) -> Option<Self> {
        let data = kind.extract(document, index)?;
        let mut record = Self::new(kind);
        record.data = data;
        record.source_index = Some(index);
        Some(record)
    }

    /// Deterministic identity of the underlying entity.
    #[must_use]
    pub fn tag(&self) -> String {
        self.kind.tag(&self.data)
    }

    /// Display name. A name stored inside the entity data wins; kinds without
    /// one use the description, the rest fall back to an explicitly set name.
    #[must_use]
    pub fn name(&self) -> String {
        if let Some(from_data) = self.kind.entity_name(&self.data) {
            if !from_data.trim().is_empty() {
                return from_data;
            }
        }
        if self.kind.names_by_description() {
            return self.description.clone();
        }
        self.name.clone().unwrap_or_default()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        if self.kind.names_by_description() {
            self.description = name.into();
        } else {
            self.name = Some(name.into());
        }
    }

    /// Whether the record is associated with a save slot.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.source_index.is_some()
    }

    /// Whether the record is backed by a file on disk.
    #[must_use]
    pub fn is_collected(&self) -> bool {
        self.location.is_some()
    }

    #[must_use]
    pub fn source_index(&self) -> Option<i64> {
        self.source_index
    }

    /// Filename stem used on export: the name when one exists, otherwise a
    /// kind-specific composition, with filesystem-hostile characters
    /// replaced.
    #[must_use]
    pub fn filename(&self) -> String {
        let name = self.name();
        let stem = if name.is_empty() {
            self.kind.default_filename(&self.data)
        } else {
            name
        };
        coerce_valid_file_name(&stem)
    }

    /// Serializes the record in the given encoding.
    pub fn encode(&self, format: Format) -> Result<Vec<u8>> {
        self.kind.encode(self, format)
    }

    /// Writes this record back into a save document slot.
    pub fn import(&self, document: &mut Value, index: i64) -> Result<()> {
        self.kind.reinsert(self, document, index)
    }

    /// Re-exports the record to the file it was read from, in the encoding it
    /// was read in. Serialization happens on the calling thread; the file
    /// write runs on a spawned thread whose handle is returned, so callers
    /// that care about completion can join it. `None` when the record has no
    /// backing file or no known encoding.
    pub fn export(&self) -> Result<Option<JoinHandle<Result<()>>>> {
        let (Some(format), Some(location)) = (self.format, self.location.clone()) else {
            return Ok(None);
        };
        let content = self.encode(format)?;
        Ok(Some(spawn_write(location, content)))
    }

    /// Exports the record into `directory` in the given encoding, deriving
    /// the filename from the record. Returns the target path and the writer
    /// thread handle.
    pub fn export_into(
        &self,
        directory: &Path,
        format: Format,
    ) -> Result<(PathBuf, JoinHandle<Result<()>>)> {
        let extension =
            self.kind
                .extension(self, format)
                .ok_or(CollectError::UnsupportedFormatForKind {
                    kind: self.kind,
                    format,
                })?;
        let content = self.encode(format)?;

        fs_err::create_dir_all(directory).map_err(|source| CollectError::Io {
            source,
            path: Some(directory.to_path_buf()),
        })?;
        let path = directory.join(format!("{}{extension}", self.filename()));
        let handle = spawn_write(path.clone(), content);
        Ok((path, handle))
    }
}

fn spawn_write(path: PathBuf, content: Vec<u8>) -> JoinHandle<Result<()>> {
    debug!("writing {} bytes to {}", content.len(), path.display());
    std::thread::spawn(move || {
        fs_err::write(&path, content).map_err(|source| CollectError::Io {
            source,
            path: Some(path),
        })
    })
}

/// Replaces characters that are invalid in filenames on common filesystems.
/// A run of consecutive invalid characters collapses to a single `_`.
fn coerce_valid_file_name(stem: &str) -> String {
    let mut out = String::with_capacity(stem.len());
    let mut in_run = false;
    for c in stem.chars() {
        let invalid = matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
            || c.is_control();
        if invalid {
            if !in_run {
                out.push('_');
            }
        } else {
            out.push(c);
        }
        in_run = invalid;
    }
    out
}

pub(crate) fn malformed(reason: impl Into<String>) -> CollectError {
    CollectError::MalformedPayload {
        reason: reason.into(),
    }
}

/// Builds the v2 JSON envelope shared by all kinds.
pub(crate) fn encode_v2(record: &EntityRecord) -> Result<Vec<u8>> {
    let mut envelope = Map::new();
    envelope.insert("Data".into(), Value::Object(record.data.clone()));
    envelope.insert(
        "DateCreated".into(),
        Value::String(record.created_at.to_rfc3339()),
    );
    envelope.insert("Description".into(), Value::String(record.description.clone()));
    envelope.insert("FileVersion".into(), Value::from(2));
    for (key, preview) in PREVIEW_KEYS.iter().zip(&record.previews) {
        let encoded = match preview {
            Some(bytes) => Value::String(BASE64.encode(bytes)),
            None => Value::Null,
        };
        envelope.insert((*key).into(), encoded);
    }
    envelope.insert("Starred".into(), Value::Bool(record.starred));
    Ok(serde_json::to_vec(&envelope)?)
}

/// Parses the v2 JSON envelope shared by all kinds.
pub(crate) fn decode_v2(kind: EntityKind, text: &str) -> Result<EntityRecord> {
    let envelope: Value = serde_json::from_str(text)?;
    let object = envelope
        .as_object()
        .ok_or_else(|| malformed("v2 envelope is not an object"))?;
    if object.get("FileVersion").and_then(Value::as_i64) != Some(2) {
        return Err(malformed("v2 envelope without FileVersion 2"));
    }
    let data = object
        .get("Data")
        .and_then(Value::as_object)
        .cloned()
        .ok_or_else(|| malformed("v2 envelope without a Data object"))?;

    let mut record = EntityRecord::new(kind);
    record.data = data;
    record.format = Some(Format::JsonV2);
    if let Some(created) = object
        .get("DateCreated")
        .and_then(Value::as_str)
        .and_then(|text| DateTime::parse_from_rfc3339(text).ok())
    {
        record.created_at = created.with_timezone(&Utc);
    }
    if let Some(description) = object.get("Description").and_then(Value::as_str) {
        record.description = description.to_string();
    }
    for (key, slot) in PREVIEW_KEYS.iter().zip(&mut record.previews) {
        *slot = object
            .get(*key)
            .and_then(Value::as_str)
            .and_then(|text| BASE64.decode(text).ok());
    }
    record.starred = object
        .get("Starred")
        .and_then(Value::as_bool)
        .unwrap_or_default();
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_record() -> EntityRecord {
        let mut record = EntityRecord::new(EntityKind::Weapon);
        record.data.insert("Weapon".into(), json!({"NameWithArticle": "The Judge"}));
        record.description = "Royal multitool".into();
        record.previews[0] = Some(vec![0xDE, 0xAD]);
        record.starred = true;
        record
    }

    #[test]
    fn v2_envelope_round_trips_bookkeeping() {
        let record = sample_record();
        let bytes = encode_v2(&record).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\"FileVersion\":2"));

        let decoded = decode_v2(EntityKind::Weapon, &text).unwrap();
        assert_eq!(decoded.description, "Royal multitool");
        assert_eq!(decoded.previews[0].as_deref(), Some(&[0xDE, 0xAD][..]));
        assert!(decoded.previews[1].is_none());
        assert!(decoded.starred);
        assert_eq!(decoded.data, record.data);
        assert_eq!(decoded.format, Some(Format::JsonV2));
    }

    #[test]
    fn v2_decode_rejects_foreign_documents() {
        assert!(decode_v2(EntityKind::Weapon, r#"{"FileVersion":1}"#).is_err());
        assert!(decode_v2(EntityKind::Weapon, r#"{"FileVersion":2}"#).is_err());
        assert!(decode_v2(EntityKind::Weapon, "[]").is_err());
    }

    #[test]
    fn name_prefers_entity_data_over_set_name() {
        let mut record = sample_record();
        assert_eq!(record.name(), "");
        record.set_name("Mine");
        assert_eq!(record.name(), "Mine");

        record
            .data
            .insert("Multitool".into(), json!({"NKm": "The Judge"}));
        assert_eq!(record.name(), "The Judge");
    }

    #[test]
    fn unnamed_kinds_use_the_description() {
        let mut record = EntityRecord::new(EntityKind::SquadronPilot);
        record.set_name("Wingmate");
        assert_eq!(record.description, "Wingmate");
        assert_eq!(record.name(), "Wingmate");
    }

    #[test]
    fn filenames_are_coerced() {
        let mut record = sample_record();
        record.set_name("a/b:c?d");
        assert_eq!(record.filename(), "a_b_c_d");

        record.set_name("a//b: <c>");
        assert_eq!(record.filename(), "a_b_ _c_");
    }
}
