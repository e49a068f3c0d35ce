//! Entity kinds and their capability contract.
//!
//! Each kind of collectible entity lives in its own submodule: where its
//! sub-trees sit in a save document, how its fingerprint is composed, and how
//! it serializes in each encoding. [`EntityKind`] is a closed enum; every
//! operation dispatches statically into the submodules, so adding a kind
//! means adding a module and a match arm, and an unhandled kind is a compile
//! error rather than a runtime surprise.

mod base;
mod bytebeat;
mod companion;
mod freighter;
mod frigate;
pub mod outfit;
mod place;
mod settlement;
mod squadron;
mod starship;
mod vehicle;
mod weapon;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CollectError, Result};
use crate::format::Format;
use crate::record::{EntityRecord, PREVIEW_SLOTS, malformed};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Base,
    ByteBeat,
    Companion,
    Freighter,
    Frigate,
    Outfit,
    Place,
    Settlement,
    SquadronPilot,
    Starship,
    Vehicle,
    Weapon,
}

impl EntityKind {
    pub const ALL: [EntityKind; 12] = [
        EntityKind::Base,
        EntityKind::ByteBeat,
        EntityKind::Companion,
        EntityKind::Freighter,
        EntityKind::Frigate,
        EntityKind::Outfit,
        EntityKind::Place,
        EntityKind::Settlement,
        EntityKind::SquadronPilot,
        EntityKind::Starship,
        EntityKind::Vehicle,
        EntityKind::Weapon,
    ];

    /// Encodings this kind can be read from and written to.
    #[must_use]
    pub fn supported_formats(self) -> &'static [Format] {
        use Format::*;
        match self {
            EntityKind::Base | EntityKind::Companion | EntityKind::Starship | EntityKind::Weapon => {
                &[Container, JsonV1, JsonV2]
            }
            EntityKind::ByteBeat
            | EntityKind::Freighter
            | EntityKind::Frigate
            | EntityKind::Place
            | EntityKind::Settlement
            | EntityKind::SquadronPilot
            | EntityKind::Vehicle => &[JsonV1, JsonV2],
            EntityKind::Outfit => &[JsonV2],
        }
    }

    /// File extensions scanned when a directory is ingested for this kind.
    #[must_use]
    pub fn collection_extensions(self) -> &'static [&'static str] {
        match self {
            EntityKind::Base => &["fb3", "pb3", "bse"],
            EntityKind::ByteBeat => &["bbt"],
            EntityKind::Companion => &["pet", "cmp"],
            EntityKind::Freighter => &["frt"],
            EntityKind::Frigate => &["flt"],
            EntityKind::Outfit => &["ott"],
            EntityKind::Place => &["plc"],
            EntityKind::Settlement => &["stl"],
            EntityKind::SquadronPilot => &["sqd"],
            EntityKind::Starship => &["sh0", "shp"],
            EntityKind::Vehicle => &["exo"],
            EntityKind::Weapon => &["wp0", "mlt"],
        }
    }

    /// Pulls this kind's sub-trees out of a save document slot. `None` when
    /// the slot is absent.
    #[must_use]
    pub fn extract(self, document: &Value, index: i64) -> Option<Map<String, Value>> {
        match self {
            EntityKind::Base => base::extract(document, index),
            EntityKind::ByteBeat => bytebeat::extract(document, index),
            EntityKind::Companion => companion::extract(document, index),
            EntityKind::Freighter => freighter::extract(document, index),
            EntityKind::Frigate => frigate::extract(document, index),
            EntityKind::Outfit => outfit::extract(document, index),
            EntityKind::Place => place::extract(document, index),
            EntityKind::Settlement => settlement::extract(document, index),
            EntityKind::SquadronPilot => squadron::extract(document, index),
            EntityKind::Starship => starship::extract(document, index),
            EntityKind::Vehicle => vehicle::extract(document, index),
            EntityKind::Weapon => weapon::extract(document, index),
        }
    }

    /// Writes a record's sub-trees back into a save document slot.
    pub fn reinsert(self, record: &EntityRecord, document: &mut Value, index: i64) -> Result<()> {
        match self {
            EntityKind::Base => base::reinsert(record, document, index),
            EntityKind::ByteBeat => bytebeat::reinsert(record, document, index),
            EntityKind::Companion => companion::reinsert(record, document, index),
            EntityKind::Freighter => freighter::reinsert(record, document, index),
            EntityKind::Frigate => frigate::reinsert(record, document, index),
            EntityKind::Outfit => outfit::reinsert(record, document, index),
            EntityKind::Place => place::reinsert(record, document, index),
            EntityKind::Settlement => settlement::reinsert(record, document, index),
            EntityKind::SquadronPilot => squadron::reinsert(record, document, index),
            EntityKind::Starship => starship::reinsert(record, document, index),
            EntityKind::Vehicle => vehicle::reinsert(record, document, index),
            EntityKind::Weapon => weapon::reinsert(record, document, index),
        }
    }

    /// Fingerprint of extracted sub-trees.
    #[must_use]
    pub fn tag(self, data: &Map<String, Value>) -> String {
        match self {
            EntityKind::Base => base::tag(data),
            EntityKind::ByteBeat => bytebeat::tag(data),
            EntityKind::Companion => companion::tag(data),
            EntityKind::Freighter => freighter::tag(data),
            EntityKind::Frigate => frigate::tag(data),
            EntityKind::Outfit => outfit::tag(data),
            EntityKind::Place => place::tag(data),
            EntityKind::Settlement => settlement::tag(data),
            EntityKind::SquadronPilot => squadron::tag(data),
            EntityKind::Starship => starship::tag(data),
            EntityKind::Vehicle => vehicle::tag(data),
            EntityKind::Weapon => weapon::tag(data),
        }
    }

    /// Fingerprint of a slot still inside a save document, without building a
    /// record first.
    #[must_use]
    pub fn tag_at(self, document: &Value, index: i64) -> Option<String> {
        match self {
            // The outfit kind redirects preset slots before fingerprinting.
            EntityKind::Outfit => outfit::tag_at(document, index),
            _ => self.extract(document, index).map(|data| self.tag(&data)),
        }
    }

    /// Parses a serialized entity of this kind.
    pub fn decode(self, format: Format, bytes: &[u8]) -> Result<EntityRecord> {
        if !self.supported_formats().contains(&format) {
            return Err(CollectError::UnsupportedFormatForKind { kind: self, format });
        }
        let mut record = match (self, format) {
            (EntityKind::Base, Format::Container) => base::decode_container(bytes),
            (EntityKind::Companion, Format::Container) => companion::decode_container(bytes),
            (EntityKind::Starship, Format::Container) => starship::decode_container(bytes),
            (EntityKind::Weapon, Format::Container) => weapon::decode_container(bytes),
            (EntityKind::Base, Format::JsonV1) => base::decode_v1(as_text(bytes)?),
            (EntityKind::ByteBeat, Format::JsonV1) => bytebeat::decode_v1(as_text(bytes)?),
            (EntityKind::Companion, Format::JsonV1) => companion::decode_v1(as_text(bytes)?),
            (EntityKind::Freighter, Format::JsonV1) => freighter::decode_v1(as_text(bytes)?),
            (EntityKind::Frigate, Format::JsonV1) => frigate::decode_v1(as_text(bytes)?),
            (EntityKind::Place, Format::JsonV1) => place::decode_v1(as_text(bytes)?),
            (EntityKind::Settlement, Format::JsonV1) => settlement::decode_v1(as_text(bytes)?),
            (EntityKind::SquadronPilot, Format::JsonV1) => squadron::decode_v1(as_text(bytes)?),
            (EntityKind::Starship, Format::JsonV1) => starship::decode_v1(as_text(bytes)?),
            (EntityKind::Vehicle, Format::JsonV1) => vehicle::decode_v1(as_text(bytes)?),
            (EntityKind::Weapon, Format::JsonV1) => weapon::decode_v1(as_text(bytes)?),
            (_, Format::JsonV2) => crate::record::decode_v2(self, as_text(bytes)?),
            (kind, format) => Err(CollectError::UnsupportedFormatForKind { kind, format }),
        }?;
        record.format = Some(format);
        Ok(record)
    }

    /// Serializes a record in the given encoding.
    pub fn encode(self, record: &EntityRecord, format: Format) -> Result<Vec<u8>> {
        if !self.supported_formats().contains(&format) {
            return Err(CollectError::UnsupportedFormatForKind { kind: self, format });
        }
        match (self, format) {
            (EntityKind::Base, Format::Container) => base::encode_container(record),
            (EntityKind::Companion, Format::Container) => companion::encode_container(record),
            (EntityKind::Starship, Format::Container) => starship::encode_container(record),
            (EntityKind::Weapon, Format::Container) => weapon::encode_container(record),
            (EntityKind::Base, Format::JsonV1) => base::encode_v1(record),
            (EntityKind::ByteBeat, Format::JsonV1) => bytebeat::encode_v1(record),
            (EntityKind::Companion, Format::JsonV1) => companion::encode_v1(record),
            (EntityKind::Freighter, Format::JsonV1) => freighter::encode_v1(record),
            (EntityKind::Frigate, Format::JsonV1) => frigate::encode_v1(record),
            (EntityKind::Place, Format::JsonV1) => place::encode_v1(record),
            (EntityKind::Settlement, Format::JsonV1) => settlement::encode_v1(record),
            (EntityKind::SquadronPilot, Format::JsonV1) => squadron::encode_v1(record),
            (EntityKind::Starship, Format::JsonV1) => starship::encode_v1(record),
            (EntityKind::Vehicle, Format::JsonV1) => vehicle::encode_v1(record),
            (EntityKind::Weapon, Format::JsonV1) => weapon::encode_v1(record),
            (_, Format::JsonV2) => crate::record::encode_v2(record),
            (kind, format) => Err(CollectError::UnsupportedFormatForKind { kind, format }),
        }
    }

    /// Export extension (with dot) for a record of this kind in the given
    /// encoding; `None` when the encoding is unsupported.
    #[must_use]
    pub fn extension(self, record: &EntityRecord, format: Format) -> Option<&'static str> {
        if !self.supported_formats().contains(&format) {
            return None;
        }
        Some(match self {
            EntityKind::Base => base::extension(record, format),
            EntityKind::ByteBeat => ".bbt",
            EntityKind::Companion => match format {
                Format::Container => ".pet",
                _ => ".cmp",
            },
            EntityKind::Freighter => ".frt",
            EntityKind::Frigate => ".flt",
            EntityKind::Outfit => ".ott",
            EntityKind::Place => ".plc",
            EntityKind::Settlement => ".stl",
            EntityKind::SquadronPilot => ".sqd",
            EntityKind::Starship => match format {
                Format::Container => ".sh0",
                _ => ".shp",
            },
            EntityKind::Vehicle => ".exo",
            EntityKind::Weapon => match format {
                Format::Container => ".wp0",
                _ => ".mlt",
            },
        })
    }

    /// Name stored inside this kind's data, if the kind carries one.
    #[must_use]
    pub(crate) fn entity_name(self, data: &Map<String, Value>) -> Option<String> {
        let (role, obfuscated, mapped) = match self {
            EntityKind::Base => ("PersistentBase", "NKm", "Name"),
            EntityKind::ByteBeat => ("Song", "NKm", "Name"),
            EntityKind::Companion => ("Pet", "fH8", "CustomName"),
            // The freighter name is its own extracted sub-tree, not a field
            // inside one.
            EntityKind::Freighter => {
                return data.get("Name").and_then(Value::as_str).map(str::to_string);
            }
            EntityKind::Frigate => ("Frigate", "fH8", "CustomName"),
            EntityKind::Settlement => ("Settlement", "NKm", "Name"),
            EntityKind::Starship => ("Ship", "NKm", "Name"),
            EntityKind::Vehicle => ("Vehicle", "NKm", "Name"),
            EntityKind::Weapon => ("Multitool", "NKm", "Name"),
            EntityKind::Outfit | EntityKind::Place | EntityKind::SquadronPilot => return None,
        };
        crate::document::resolve_str(data.get(role)?, obfuscated, mapped).map(str::to_string)
    }

    /// Kinds without a stored name use the free-form description as one.
    #[must_use]
    pub(crate) fn names_by_description(self) -> bool {
        matches!(
            self,
            EntityKind::Outfit | EntityKind::Place | EntityKind::SquadronPilot
        )
    }

    /// Filename stem used on export when the record carries no name.
    #[must_use]
    pub(crate) fn default_filename(self, data: &Map<String, Value>) -> String {
        match self {
            EntityKind::Base => base::default_filename(data),
            EntityKind::ByteBeat => bytebeat::default_filename(data),
            EntityKind::Companion => companion::default_filename(data),
            EntityKind::Freighter => freighter::default_filename(data),
            EntityKind::Frigate => frigate::default_filename(data),
            EntityKind::Outfit => outfit::default_filename(data),
            EntityKind::Place => place::default_filename(data),
            EntityKind::Settlement => settlement::default_filename(data),
            EntityKind::SquadronPilot => squadron::default_filename(data),
            EntityKind::Starship => starship::default_filename(data),
            EntityKind::Vehicle => vehicle::default_filename(data),
            EntityKind::Weapon => weapon::default_filename(data),
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Base => "base",
            EntityKind::ByteBeat => "byte-beat",
            EntityKind::Companion => "companion",
            EntityKind::Freighter => "freighter",
            EntityKind::Frigate => "frigate",
            EntityKind::Outfit => "outfit",
            EntityKind::Place => "place",
            EntityKind::Settlement => "settlement",
            EntityKind::SquadronPilot => "squadron-pilot",
            EntityKind::Starship => "starship",
            EntityKind::Vehicle => "vehicle",
            EntityKind::Weapon => "weapon",
        };
        f.write_str(name)
    }
}

fn as_text(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|_| malformed("document is not valid UTF-8"))
}

/// Parses a v1 envelope and applies its shared bookkeeping fields to the
/// record: description, created date, star flag and thumbnails.
pub(crate) fn v1_envelope(kind: EntityKind, text: &str) -> Result<(Map<String, Value>, EntityRecord)> {
    let envelope: Value = serde_json::from_str(text)?;
    let object = envelope
        .as_object()
        .ok_or_else(|| malformed("v1 envelope is not an object"))?;
    if object.get("FileVersion").and_then(Value::as_i64) != Some(1) {
        return Err(malformed("v1 envelope without FileVersion 1"));
    }

    let mut record = EntityRecord::new(kind);
    if let Some(description) = object.get("Description").and_then(Value::as_str) {
        record.description = description.to_string();
    }
    if let Some(created) = object
        .get("DateCreated")
        .and_then(Value::as_str)
        .and_then(|text| DateTime::parse_from_rfc3339(text).ok())
    {
        record.created_at = created.with_timezone(&Utc);
    }
    record.starred = object
        .get("Starred")
        .and_then(Value::as_bool)
        .unwrap_or_default();
    for (slot, key) in THUMBNAIL_KEYS.iter().enumerate() {
        record.previews[slot] = object
            .get(*key)
            .and_then(Value::as_str)
            .and_then(|text| BASE64.decode(text).ok());
    }
    Ok((object.clone(), record))
}

const THUMBNAIL_KEYS: [&str; PREVIEW_SLOTS] = [
    "Thumbnail",
    "Thumbnail2",
    "Thumbnail3",
    "Thumbnail4",
    "Thumbnail5",
    "Thumbnail6",
];

/// Inserts the first thumbnail into a v1 envelope.
pub(crate) fn insert_thumbnail(envelope: &mut Map<String, Value>, record: &EntityRecord) {
    envelope.insert("Thumbnail".into(), preview_value(&record.previews[0]));
}

/// Inserts all six thumbnail slots into a v1 envelope.
pub(crate) fn insert_thumbnails(envelope: &mut Map<String, Value>, record: &EntityRecord) {
    for (key, preview) in THUMBNAIL_KEYS.iter().zip(&record.previews) {
        envelope.insert((*key).into(), preview_value(preview));
    }
}

fn preview_value(preview: &Option<Vec<u8>>) -> Value {
    match preview {
        Some(bytes) => Value::String(BASE64.encode(bytes)),
        None => Value::Null,
    }
}

/// Fetches a sub-tree from record data, as decode/encode helpers expect it.
pub(crate) fn data_entry<'a>(data: &'a Map<String, Value>, role: &str) -> Result<&'a Value> {
    match data.get(role) {
        Some(value) if !value.is_null() => Ok(value),
        _ => Err(malformed(format!("record has no {role} data"))),
    }
}
