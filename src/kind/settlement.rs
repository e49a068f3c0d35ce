//! Settlements. Like bases, reinsertion keeps the target slot's location and
//! ownership so an imported settlement stays on its planet.

use serde_json::{Map, Value};

use crate::document::{self, SchemaMode, clone_at, resolve_stringy};
use crate::error::Result;
use crate::kind::{EntityKind, insert_thumbnails, v1_envelope};
use crate::record::{EntityRecord, malformed};
use crate::tag::TagBuilder;

fn slot_path(mode: SchemaMode, index: i64) -> String {
    match mode {
        SchemaMode::Mapped => format!("BaseContext.PlayerStateData.SettlementStatesV2[{index}]"),
        SchemaMode::Obfuscated => format!("vLc.6f=.GQA[{index}]"),
    }
}

pub(super) fn extract(document: &Value, index: i64) -> Option<Map<String, Value>> {
    let settlement = clone_at(document, &slot_path(SchemaMode::of(document), index))?;
    let mut data = Map::new();
    data.insert("Settlement".into(), settlement);
    Some(data)
}

/// Universe address plus generation seed.
pub(super) fn tag(data: &Map<String, Value>) -> String {
    let mut builder = TagBuilder::new();
    if let Some(settlement) = data.get("Settlement") {
        builder.push_owned(resolve_stringy(settlement, "yhJ", "UniverseAddress"));
        builder.push_owned(resolve_stringy(settlement, "qK9", "SeedValue"));
    }
    builder.finish()
}

const PRESERVED: [(&str, &str); 3] = [
    ("yhJ", "UniverseAddress"),
    ("wMC", "Position"),
    ("3?K", "Owner"),
];

pub(super) fn reinsert(record: &EntityRecord, document: &mut Value, index: i64) -> Result<()> {
    let mode = SchemaMode::of(document);
    let slot = slot_path(mode, index);
    if let Some(settlement) = record.data.get("Settlement").filter(|v| !v.is_null()) {
        let saved: Vec<(&str, Option<Value>)> = PRESERVED
            .iter()
            .map(|(obfuscated, mapped)| {
                let key = mode.pick(obfuscated, mapped);
                (key, clone_at(document, &format!("{slot}.{key}")))
            })
            .collect();
        if !document::set(document, &slot, settlement.clone()) {
            return Err(malformed(format!("no settlement slot at index {index}")));
        }
        for (key, value) in saved {
            if let Some(value) = value {
                document::set(document, &format!("{slot}.{key}"), value);
            }
        }
    }
    Ok(())
}

pub(super) fn decode_v1(text: &str) -> Result<EntityRecord> {
    let (envelope, mut record) = v1_envelope(EntityKind::Settlement, text)?;
    let settlement = envelope
        .get("Settlement")
        .and_then(|wrapper| wrapper.get("Settlement"))
        .filter(|v| !v.is_null())
        .cloned()
        .ok_or_else(|| malformed("v1 settlement without Settlement.Settlement"))?;
    record.data.insert("Settlement".into(), settlement);
    Ok(record)
}

pub(super) fn encode_v1(record: &EntityRecord) -> Result<Vec<u8>> {
    let settlement = crate::kind::data_entry(&record.data, "Settlement")?;
    let mut wrapper = Map::new();
    wrapper.insert("Settlement".into(), settlement.clone());
    wrapper.insert(
        "Index".into(),
        record.source_index().map_or(Value::Null, Value::from),
    );

    let mut envelope = Map::new();
    envelope.insert("Settlement".into(), Value::Object(wrapper));
    envelope.insert("Description".into(), Value::String(record.description.clone()));
    envelope.insert("FileVersion".into(), Value::from(1));
    insert_thumbnails(&mut envelope, record);
    Ok(serde_json::to_vec(&envelope)?)
}

pub(super) fn default_filename(data: &Map<String, Value>) -> String {
    let Some(settlement) = data.get("Settlement") else {
        return String::new();
    };
    let address = resolve_stringy(settlement, "yhJ", "UniverseAddress").unwrap_or_default();
    let seed = resolve_stringy(settlement, "qK9", "SeedValue").unwrap_or_default();
    format!("{address}-{seed}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn save_document() -> Value {
        json!({
            "vLc": {
                "6f=": {
                    "GQA": [{
                        "NKm": "New Haven",
                        "yhJ": "0x7E2A010899BA2",
                        "qK9": "0x51C3",
                        "wMC": [12.0, 0.0, -3.0],
                        "3?K": {"UID": "MAYOR-1"}
                    }]
                }
            }
        })
    }

    #[test]
    fn tag_is_address_plus_seed() {
        let data = extract(&save_document(), 0).unwrap();
        assert_eq!(tag(&data), "0X7E2A010899BA20X51C3");
    }

    #[test]
    fn reinsert_keeps_location_and_owner() {
        let mut document = save_document();
        let mut record = EntityRecord::new(EntityKind::Settlement);
        record.data = extract(&save_document(), 0).unwrap();
        record.data["Settlement"]["NKm"] = json!("Imported");
        record.data["Settlement"]["yhJ"] = json!("0x0");
        record.data["Settlement"]["3?K"] = json!({"UID": "SOMEONE-ELSE"});

        reinsert(&record, &mut document, 0).unwrap();
        let slot = &document["vLc"]["6f="]["GQA"][0];
        assert_eq!(slot["NKm"], json!("Imported"));
        assert_eq!(slot["yhJ"], json!("0x7E2A010899BA2"));
        assert_eq!(slot["3?K"]["UID"], json!("MAYOR-1"));
    }

    #[test]
    fn v1_round_trip_preserves_the_fingerprint() {
        let mut record = EntityRecord::new(EntityKind::Settlement);
        record.data = extract(&save_document(), 0).unwrap();
        let bytes = encode_v1(&record).unwrap();
        let decoded = decode_v1(std::str::from_utf8(&bytes).unwrap()).unwrap();
        assert_eq!(tag(&decoded.data), tag(&record.data));
    }
}
