//! Byte-beat songs from the save's music library. The fingerprint is the raw
//! sample array itself, and the v1 envelope keeps the audio preview under
//! `Track` with the original-author fields alongside.

use serde_json::{Map, Value};

use crate::document::{self, SchemaMode, clone_at, lookup, resolve_array};
use crate::error::Result;
use crate::kind::{EntityKind, data_entry, v1_envelope};
use crate::record::{EntityRecord, malformed};
use crate::tag::concat_values;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

fn slot_path(mode: SchemaMode, index: i64) -> String {
    match mode {
        SchemaMode::Mapped => format!("CommonStateData.ByteBeatLibrary.MySongs[{index}]"),
        SchemaMode::Obfuscated => format!("<h0.8iI.ON4[{index}]"),
    }
}

pub(super) fn extract(document: &Value, index: i64) -> Option<Map<String, Value>> {
    let song = clone_at(document, &slot_path(SchemaMode::of(document), index))?;
    let mut data = Map::new();
    data.insert("Song".into(), song);
    Some(data)
}

/// The song data array, concatenated as-is. Two songs are the same exactly
/// when their samples are.
pub(super) fn tag(data: &Map<String, Value>) -> String {
    data.get("Song")
        .and_then(|song| resolve_array(song, "8?J", "Data"))
        .map(|values| concat_values(values))
        .unwrap_or_default()
}

pub(super) fn reinsert(record: &EntityRecord, document: &mut Value, index: i64) -> Result<()> {
    let mode = SchemaMode::of(document);
    if let Some(song) = record.data.get("Song").filter(|v| !v.is_null()) {
        if !document::set(document, &slot_path(mode, index), song.clone()) {
            return Err(malformed(format!("no song slot at index {index}")));
        }
    }
    Ok(())
}

pub(super) fn decode_v1(text: &str) -> Result<EntityRecord> {
    let (envelope, mut record) = v1_envelope(EntityKind::ByteBeat, text)?;
    let song = envelope
        .get("Data")
        .filter(|v| !v.is_null())
        .cloned()
        .ok_or_else(|| malformed("v1 song without Data"))?;
    record.data.insert("Song".into(), song);
    // The audio preview sits under its own key instead of a thumbnail slot.
    record.previews[0] = envelope
        .get("Track")
        .and_then(Value::as_str)
        .and_then(|text| BASE64.decode(text).ok());
    Ok(record)
}

pub(super) fn encode_v1(record: &EntityRecord) -> Result<Vec<u8>> {
    let song = data_entry(&record.data, "Song")?;

    let mut envelope = Map::new();
    envelope.insert("Data".into(), song.clone());
    envelope.insert(
        "DateCreated".into(),
        Value::String(record.created_at.to_rfc3339()),
    );
    envelope.insert("Description".into(), Value::String(record.description.clone()));
    envelope.insert("FileVersion".into(), Value::from(1));
    for (field, key) in [
        ("OriginalAuthor", "4ha"),
        ("OriginalAuthorID", "m7b"),
        ("OriginalAuthorPlatform", "d2f"),
        ("OriginalName", "NKm"),
    ] {
        envelope.insert(
            field.into(),
            lookup(song, key).cloned().unwrap_or(Value::Null),
        );
    }
    envelope.insert("Starred".into(), Value::Bool(record.starred));
    let track = match &record.previews[0] {
        Some(bytes) => Value::String(BASE64.encode(bytes)),
        None => Value::Null,
    };
    envelope.insert("Track".into(), track);
    Ok(serde_json::to_vec(&envelope)?)
}

pub(super) fn default_filename(data: &Map<String, Value>) -> String {
    let samples = tag(data);
    if samples.is_empty() {
        "ByteBeat".to_string()
    } else {
        samples
    }
}
