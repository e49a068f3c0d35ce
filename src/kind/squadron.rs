//! Squadron pilots. These carry no player-chosen name, only the pairing of
//! pilot and ship seeds.

use serde_json::{Map, Value};

use crate::document::{self, SchemaMode, clone_at, resolve_str};
use crate::error::Result;
use crate::kind::{EntityKind, data_entry, insert_thumbnails, starship, v1_envelope};
use crate::record::{EntityRecord, malformed};
use crate::tag::{TagBuilder, resource_name};

fn slot_path(mode: SchemaMode, index: i64) -> String {
    match mode {
        SchemaMode::Mapped => format!("BaseContext.PlayerStateData.SquadronPilots[{index}]"),
        SchemaMode::Obfuscated => format!("vLc.6f=.S5O[{index}]"),
    }
}

pub(super) fn extract(document: &Value, index: i64) -> Option<Map<String, Value>> {
    let pilot = clone_at(document, &slot_path(SchemaMode::of(document), index))?;
    let mut data = Map::new();
    data.insert("Pilot".into(), pilot);
    Some(data)
}

/// Pilot resource and seed plus ship resource and seed.
pub(super) fn tag(data: &Map<String, Value>) -> String {
    let mut builder = TagBuilder::new();
    if let Some(pilot) = data.get("Pilot") {
        builder.push_owned(
            resolve_str(pilot, ">r:.93M", "NPCResource.Filename").map(resource_name),
        );
        builder.push_opt(resolve_str(pilot, ">r:.@EL[1]", "NPCResource.Seed[1]"));
        builder.push_owned(
            resolve_str(pilot, ":dY.93M", "ShipResource.Filename").map(resource_name),
        );
        builder.push_opt(resolve_str(pilot, ":dY.@EL[1]", "ShipResource.Seed[1]"));
    }
    builder.finish()
}

pub(super) fn reinsert(record: &EntityRecord, document: &mut Value, index: i64) -> Result<()> {
    let mode = SchemaMode::of(document);
    if let Some(pilot) = record.data.get("Pilot").filter(|v| !v.is_null()) {
        if !document::set(document, &slot_path(mode, index), pilot.clone()) {
            return Err(malformed(format!("no squadron slot at index {index}")));
        }
    }
    Ok(())
}

pub(super) fn decode_v1(text: &str) -> Result<EntityRecord> {
    let (envelope, mut record) = v1_envelope(EntityKind::SquadronPilot, text)?;
    let pilot = envelope
        .get("Squadron")
        .filter(|v| !v.is_null())
        .cloned()
        .ok_or_else(|| malformed("v1 squadron pilot without Squadron"))?;
    record.data.insert("Pilot".into(), pilot);
    Ok(record)
}

pub(super) fn encode_v1(record: &EntityRecord) -> Result<Vec<u8>> {
    let pilot = data_entry(&record.data, "Pilot")?;
    let mut envelope = Map::new();
    envelope.insert("Squadron".into(), pilot.clone());
    envelope.insert("Description".into(), Value::String(record.description.clone()));
    envelope.insert("FileVersion".into(), Value::from(1));
    insert_thumbnails(&mut envelope, record);
    Ok(serde_json::to_vec(&envelope)?)
}

fn race_label(resource: &str) -> Option<&'static str> {
    let upper = resource.to_uppercase();
    Some(if upper.contains("NPCGEK") {
        "Traders"
    } else if upper.contains("NPCVYKEEN") {
        "Warriors"
    } else if upper.contains("NPCKORVAX") {
        "Explorers"
    } else if upper.contains("NPCFOURTH") {
        "Diplomats"
    } else if upper.contains("NPCFIFTH") {
        "Exotics"
    } else {
        return None;
    })
}

pub(super) fn default_filename(data: &Map<String, Value>) -> String {
    let Some(pilot) = data.get("Pilot") else {
        return String::new();
    };
    let race = resolve_str(pilot, ">r:.93M", "NPCResource.Filename")
        .and_then(race_label)
        .unwrap_or("Pilot");
    let pilot_seed = resolve_str(pilot, ">r:.@EL[1]", "NPCResource.Seed[1]").unwrap_or_default();
    let ship_class = resolve_str(pilot, ":dY.93M", "ShipResource.Filename")
        .and_then(starship::ship_class_label)
        .unwrap_or("Ship");
    let ship_seed = resolve_str(pilot, ":dY.@EL[1]", "ShipResource.Seed[1]").unwrap_or_default();
    format!("{race}-{pilot_seed}-{ship_class}-{ship_seed}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn save_document() -> Value {
        json!({
            "vLc": {
                "6f=": {
                    "S5O": [{
                        ">r:": {
                            "93M": "MODELS/COMMON/CHARACTERS/NPCGEK/NPCGEK.SCENE.MBIN",
                            "@EL": [true, "0x11"]
                        },
                        ":dY": {
                            "93M": "MODELS/COMMON/SPACECRAFT/FIGHTERS/FIGHTER_PROC.SCENE.MBIN",
                            "@EL": [true, "0x22"]
                        }
                    }]
                }
            }
        })
    }

    #[test]
    fn tag_pairs_pilot_and_ship() {
        let data = extract(&save_document(), 0).unwrap();
        assert_eq!(tag(&data), "NPCGEK0X11FIGHTERPROC0X22");
    }

    #[test]
    fn v1_round_trip_preserves_the_fingerprint() {
        let mut record = EntityRecord::new(EntityKind::SquadronPilot);
        record.data = extract(&save_document(), 0).unwrap();
        let bytes = encode_v1(&record).unwrap();
        let decoded = decode_v1(std::str::from_utf8(&bytes).unwrap()).unwrap();
        assert_eq!(tag(&decoded.data), tag(&record.data));
    }

    #[test]
    fn default_filename_resolves_race_and_ship_class() {
        let data = extract(&save_document(), 0).unwrap();
        assert_eq!(default_filename(&data), "Traders-0x11-Fighter-0x22");
    }

    #[test]
    fn reinsert_needs_an_existing_slot() {
        let mut document = save_document();
        let mut record = EntityRecord::new(EntityKind::SquadronPilot);
        record.data = extract(&save_document(), 0).unwrap();
        assert!(reinsert(&record, &mut document, 0).is_ok());
        assert!(reinsert(&record, &mut document, 3).is_err());
    }
}
