//! Fleet frigates, a single sub-tree per slot.

use serde_json::{Map, Value};

use crate::document::{self, SchemaMode, clone_at, resolve_array, resolve_str};
use crate::error::Result;
use crate::kind::{EntityKind, data_entry, insert_thumbnails, v1_envelope};
use crate::record::{EntityRecord, malformed};
use crate::tag::{TagBuilder, concat_ordered};

fn slot_path(mode: SchemaMode, index: i64) -> String {
    match mode {
        SchemaMode::Mapped => format!("PlayerStateData.FleetFrigates[{index}]"),
        SchemaMode::Obfuscated => format!("6f=.;Du[{index}]"),
    }
}

pub(super) fn extract(document: &Value, index: i64) -> Option<Map<String, Value>> {
    let frigate = clone_at(document, &slot_path(SchemaMode::of(document), index))?;
    let mut data = Map::new();
    data.insert("Frigate".into(), frigate);
    Some(data)
}

/// Class, the two seed halves, race and sorted trait identifiers.
pub(super) fn tag(data: &Map<String, Value>) -> String {
    let mut builder = TagBuilder::new();
    if let Some(frigate) = data.get("Frigate") {
        builder.push_opt(resolve_str(frigate, "uw7.uw7", "FrigateClass.FrigateClass"));
        builder.push_opt(resolve_str(frigate, "SLc[1]", "ResourceSeed[1]"));
        builder.push_opt(resolve_str(frigate, "@ui[1]", "HomeSystemSeed[1]"));
        builder.push_opt(resolve_str(frigate, "SS2.0Hi", "Race.AlienRace"));
        builder.push_owned(resolve_array(frigate, "Mjm", "TraitIDs").map(|t| concat_ordered(t)));
    }
    builder.finish()
}

pub(super) fn reinsert(record: &EntityRecord, document: &mut Value, index: i64) -> Result<()> {
    let mode = SchemaMode::of(document);
    if let Some(frigate) = record.data.get("Frigate").filter(|v| !v.is_null()) {
        if !document::set(document, &slot_path(mode, index), frigate.clone()) {
            return Err(malformed(format!("no frigate slot at index {index}")));
        }
    }
    Ok(())
}

pub(super) fn decode_v1(text: &str) -> Result<EntityRecord> {
    let (envelope, mut record) = v1_envelope(EntityKind::Frigate, text)?;
    let frigate = envelope
        .get("Frigate")
        .filter(|v| !v.is_null())
        .cloned()
        .ok_or_else(|| malformed("v1 frigate without Frigate"))?;
    record.data.insert("Frigate".into(), frigate);
    Ok(record)
}

pub(super) fn encode_v1(record: &EntityRecord) -> Result<Vec<u8>> {
    let frigate = data_entry(&record.data, "Frigate")?;
    let mut envelope = Map::new();
    envelope.insert("Frigate".into(), frigate.clone());
    envelope.insert("Description".into(), Value::String(record.description.clone()));
    envelope.insert("FileVersion".into(), Value::from(1));
    insert_thumbnails(&mut envelope, record);
    Ok(serde_json::to_vec(&envelope)?)
}

pub(super) fn default_filename(data: &Map<String, Value>) -> String {
    let Some(frigate) = data.get("Frigate") else {
        return String::new();
    };
    let class = resolve_str(frigate, "uw7.uw7", "FrigateClass.FrigateClass").unwrap_or_default();
    let seed = resolve_str(frigate, "SLc[1]", "ResourceSeed[1]").unwrap_or_default();
    let home = resolve_str(frigate, "@ui[1]", "HomeSystemSeed[1]").unwrap_or_default();
    format!("{class}-{seed}-{home}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn save_document() -> Value {
        json!({
            "6f=": {
                ";Du": [{
                    "fH8": "Dawnbreaker",
                    "uw7": {"uw7": "Combat"},
                    "SLc": [true, "0xAB12"],
                    "@ui": [true, "0xCD34"],
                    "SS2": {"0Hi": "Warriors"},
                    "Mjm": ["TRAIT_B", "TRAIT_A"]
                }]
            }
        })
    }

    #[test]
    fn tag_sorts_trait_identifiers() {
        let data = extract(&save_document(), 0).unwrap();
        assert_eq!(tag(&data), "COMBAT0XAB120XCD34WARRIORSTRAITATRAITB");
    }

    #[test]
    fn v1_round_trip_preserves_the_fingerprint() {
        let mut record = EntityRecord::new(EntityKind::Frigate);
        record.data = extract(&save_document(), 0).unwrap();
        record.previews[2] = Some(vec![1, 2, 3]);

        let bytes = encode_v1(&record).unwrap();
        let decoded = decode_v1(std::str::from_utf8(&bytes).unwrap()).unwrap();
        assert_eq!(tag(&decoded.data), tag(&record.data));
        assert_eq!(decoded.previews[2].as_deref(), Some(&[1, 2, 3][..]));
    }

    #[test]
    fn reinsert_replaces_the_slot() {
        let mut document = save_document();
        let mut record = EntityRecord::new(EntityKind::Frigate);
        record.data = extract(&save_document(), 0).unwrap();
        record.data["Frigate"]["fH8"] = json!("Imported");

        reinsert(&record, &mut document, 0).unwrap();
        assert_eq!(document["6f="][";Du"][0]["fH8"], json!("Imported"));
    }
}
