//! Planetary and freighter bases.
//!
//! The only kind whose container encoding is the encrypted frame. A base read
//! from a container carries the raw `Objects` construct list instead of a
//! full `PersistentBase` sub-tree; both shapes re-export and reinsert.

use serde_json::{Map, Value};

use crate::container;
use crate::document::{
    self, SchemaMode, clone_at, resolve, resolve_array, resolve_str, resolve_stringy,
    value_as_hex_string,
};
use crate::error::Result;
use crate::format::Format;
use crate::kind::{EntityKind, data_entry, insert_thumbnail, v1_envelope};
use crate::record::{EntityRecord, malformed};
use crate::tag::{TagBuilder, alphanumeric, concat_signed, galaxy_number, glyphs_string};

fn slot_path(mode: SchemaMode, index: i64) -> String {
    match mode {
        SchemaMode::Mapped => format!("PlayerStateData.PersistentPlayerBases[{index}]"),
        SchemaMode::Obfuscated => format!("6f=.F?0[{index}]"),
    }
}

pub(super) fn extract(document: &Value, index: i64) -> Option<Map<String, Value>> {
    let path = slot_path(SchemaMode::of(document), index);
    let persistent = clone_at(document, &path)?;
    let mut data = Map::new();
    data.insert("PersistentBase".into(), persistent);
    Some(data)
}

/// Galactic address and rounded position. Bases without either (a container
/// read holds only `Objects`) fall back to the base name.
pub(super) fn tag(data: &Map<String, Value>) -> String {
    let mut builder = TagBuilder::new();
    if let Some(base) = data.get("PersistentBase") {
        builder.push_owned(resolve_stringy(base, "r:j", "GalacticAddress"));
        builder.push_owned(resolve_array(base, "wMC", "Position").map(|p| concat_signed(p)));
    }
    let tag = builder.finish();
    if tag.is_empty() {
        let name = data
            .get("PersistentBase")
            .and_then(|base| resolve_str(base, "NKm", "Name"))
            .unwrap_or_default();
        return alphanumeric(name);
    }
    tag
}

/// Positional and ownership fields of the target slot survive the write, so
/// an imported base lands where the replaced one stood.
const PRESERVED: [(&str, &str); 4] = [
    ("oZw", "GalacticAddress"),
    ("wMC", "Position"),
    ("oHw", "Forward"),
    ("3?K", "Owner"),
];

pub(super) fn reinsert(record: &EntityRecord, document: &mut Value, index: i64) -> Result<()> {
    let mode = SchemaMode::of(document);
    let slot = slot_path(mode, index);

    if let Some(persistent) = record.data.get("PersistentBase").filter(|v| !v.is_null()) {
        let saved: Vec<(&str, Option<Value>)> = PRESERVED
            .iter()
            .map(|(obfuscated, mapped)| {
                let key = mode.pick(obfuscated, mapped);
                (key, clone_at(document, &format!("{slot}.{key}")))
            })
            .collect();
        if !document::set(document, &slot, persistent.clone()) {
            return Err(malformed(format!("no base slot at index {index}")));
        }
        for (key, value) in saved {
            if let Some(value) = value {
                document::set(document, &format!("{slot}.{key}"), value);
            }
        }
    }
    if let Some(objects) = record.data.get("Objects").filter(|v| !v.is_null()) {
        let key = mode.pick("@ZJ", "Objects");
        if !document::set(document, &format!("{slot}.{key}"), objects.clone()) {
            return Err(malformed(format!("no base slot at index {index}")));
        }
    }
    Ok(())
}

pub(super) fn decode_container(bytes: &[u8]) -> Result<EntityRecord> {
    let frame = container::decode(bytes)?;
    let mut record = EntityRecord::new(EntityKind::Base);
    record.data.insert("Objects".into(), frame.document);
    Ok(record)
}

pub(super) fn encode_container(record: &EntityRecord) -> Result<Vec<u8>> {
    let objects = data_entry(&record.data, "Objects")?;
    let user_data = record
        .data
        .get("PersistentBase")
        .and_then(|base| resolve(base, "4U6", "UserData"))
        .and_then(Value::as_u64)
        .unwrap_or_default() as u32;
    container::encode(objects, user_data)
}

pub(super) fn decode_v1(text: &str) -> Result<EntityRecord> {
    let (envelope, mut record) = v1_envelope(EntityKind::Base, text)?;
    let persistent = envelope
        .get("Data")
        .filter(|v| !v.is_null())
        .cloned()
        .ok_or_else(|| malformed("v1 base without Data"))?;
    record.data.insert("PersistentBase".into(), persistent);
    Ok(record)
}

pub(super) fn encode_v1(record: &EntityRecord) -> Result<Vec<u8>> {
    let persistent = data_entry(&record.data, "PersistentBase")?;
    let address = resolve(persistent, "r:j", "GalacticAddress")
        .and_then(value_as_hex_string)
        .unwrap_or_default();

    let mut envelope = Map::new();
    envelope.insert("Data".into(), persistent.clone());
    envelope.insert(
        "DateCreated".into(),
        Value::String(record.created_at.to_rfc3339()),
    );
    envelope.insert("Description".into(), Value::String(record.description.clone()));
    envelope.insert("FileVersion".into(), Value::from(1));
    envelope.insert("GalacticAddress".into(), Value::String(address.clone()));
    envelope.insert(
        "Galaxy".into(),
        galaxy_number(&address).map_or(Value::Null, Value::from),
    );
    envelope.insert("GlyphsString".into(), Value::String(glyphs_string(&address)));
    envelope.insert("Starred".into(), Value::Bool(record.starred));
    insert_thumbnail(&mut envelope, record);
    Ok(serde_json::to_vec(&envelope)?)
}

/// Freighter bases keep their own container extension; the base type is read
/// from the data, falling back to the extension the record came in with.
pub(super) fn extension(record: &EntityRecord, format: Format) -> &'static str {
    if format != Format::Container {
        return ".bse";
    }
    let base_type = record
        .data
        .get("PersistentBase")
        .and_then(|base| resolve_str(base, "peI.DPp", "BaseType.PersistentBaseTypes"));
    match base_type {
        Some("FreighterBase") => ".fb3",
        Some(_) => ".pb3",
        None => {
            let from_location = record
                .location
                .as_deref()
                .and_then(|path| path.extension())
                .and_then(|extension| extension.to_str());
            match from_location {
                Some(extension) if extension.eq_ignore_ascii_case("fb3") => ".fb3",
                _ => ".pb3",
            }
        }
    }
}

pub(super) fn default_filename(data: &Map<String, Value>) -> String {
    let Some(base) = data.get("PersistentBase") else {
        return String::new();
    };
    let address = resolve_stringy(base, "r:j", "GalacticAddress").unwrap_or_default();
    let position = resolve_array(base, "wMC", "Position")
        .map(|p| concat_signed(p))
        .unwrap_or_default();
    format!("{address}{position}")
}
