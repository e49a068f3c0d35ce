//! The capital freighter. One per save, so the slot index is ignored: the
//! sub-trees are spread over several sibling fields instead of an array, and
//! the colour customisation sits at a fixed entry of the shared table.

use serde_json::{Map, Value};

use crate::document::{self, SchemaMode, clone_at, lookup, resolve_array, resolve_str};
use crate::error::Result;
use crate::kind::{EntityKind, data_entry, insert_thumbnail, v1_envelope};
use crate::record::{EntityRecord, malformed};
use crate::tag::{TagBuilder, concat_colours, concat_stats, count3, resource_name};

const CUSTOMISATION_INDEX: i64 = 15;

/// Data role and its document path, per schema.
const PARTS: [(&str, &str, &str); 6] = [
    ("HomeSystem", "6f=.kYq", "PlayerStateData.CurrentFreighterHomeSystemSeed"),
    ("Freighter", "6f=.bIR", "PlayerStateData.CurrentFreighter"),
    ("Inventory", "6f=.8ZP", "PlayerStateData.FreighterInventory"),
    (
        "Inventory_TechOnly",
        "6f=.0wS",
        "PlayerStateData.FreighterInventory_TechOnly",
    ),
    (
        "Inventory_Cargo",
        "6f=.FdP",
        "PlayerStateData.FreighterInventory_Cargo",
    ),
    ("Name", "6f=.vxi", "PlayerStateData.PlayerFreighterName"),
];

fn colours_path(mode: SchemaMode) -> String {
    match mode {
        SchemaMode::Mapped => format!(
            "PlayerStateData.CharacterCustomisationData[{CUSTOMISATION_INDEX}].CustomData.Colours"
        ),
        SchemaMode::Obfuscated => format!("6f=.l:j[{CUSTOMISATION_INDEX}].wnR.Aak"),
    }
}

pub(super) fn extract(document: &Value, _index: i64) -> Option<Map<String, Value>> {
    let mode = SchemaMode::of(document);
    let freighter = clone_at(document, mode.pick("6f=.bIR", "PlayerStateData.CurrentFreighter"))?;
    let mut data = Map::new();
    for (role, obfuscated, mapped) in PARTS {
        if role == "Freighter" {
            continue;
        }
        data.insert(
            role.into(),
            clone_at(document, mode.pick(obfuscated, mapped)).unwrap_or(Value::Null),
        );
    }
    data.insert("Freighter".into(), freighter);
    data.insert(
        "Colours".into(),
        clone_at(document, &colours_path(mode)).unwrap_or(Value::Null),
    );
    Some(data)
}

/// Hull resource and seed, home system seed, the three inventory sizes,
/// base stats and the colour customisation.
pub(super) fn tag(data: &Map<String, Value>) -> String {
    let mut builder = TagBuilder::new();
    if let Some(freighter) = data.get("Freighter") {
        builder.push_owned(resolve_str(freighter, "93M", "Filename").map(resource_name));
        builder.push_opt(resolve_str(freighter, "@EL[1]", "Seed[1]"));
    }
    builder.push_opt(
        data.get("HomeSystem")
            .and_then(|home| lookup(home, "[1]"))
            .and_then(Value::as_str),
    );
    builder.push_owned(
        data.get("Inventory")
            .and_then(|i| resolve_array(i, "hl?", "ValidSlotIndices"))
            .map(|v| count3(v)),
    );
    builder.push_owned(
        data.get("Inventory_TechOnly")
            .and_then(|i| resolve_array(i, "hl?", "ValidSlotIndices"))
            .map(|v| count3(v)),
    );
    builder.push(
        &data
            .get("Inventory_Cargo")
            .and_then(|i| resolve_array(i, "hl?", "ValidSlotIndices"))
            .map_or_else(|| "000".to_string(), |v| count3(v)),
    );
    builder.push_owned(
        data.get("Inventory")
            .and_then(|i| resolve_array(i, "@bB", "BaseStatValues"))
            .map(|v| concat_stats(v)),
    );
    if let Some(colours) = data.get("Colours").and_then(Value::as_array) {
        builder.push(&concat_colours(colours));
    }
    builder.finish()
}

pub(super) fn reinsert(record: &EntityRecord, document: &mut Value, _index: i64) -> Result<()> {
    let mode = SchemaMode::of(document);
    for (role, obfuscated, mapped) in PARTS {
        if let Some(value) = record.data.get(role).filter(|v| !v.is_null()) {
            if !document::set(document, mode.pick(obfuscated, mapped), value.clone()) {
                return Err(malformed(format!("no {role} target in document")));
            }
        }
    }
    if let Some(colours) = record.data.get("Colours").filter(|v| !v.is_null()) {
        if !document::set(document, &colours_path(mode), colours.clone()) {
            return Err(malformed("no freighter customisation entry in document"));
        }
    }
    Ok(())
}

/// The v1 layout carries no cargo inventory and no colours.
pub(super) fn decode_v1(text: &str) -> Result<EntityRecord> {
    let (envelope, mut record) = v1_envelope(EntityKind::Freighter, text)?;
    let wrapper = envelope
        .get("Freighter")
        .and_then(Value::as_object)
        .ok_or_else(|| malformed("v1 freighter without Freighter"))?;
    let freighter = wrapper
        .get("bIR")
        .filter(|v| !v.is_null())
        .cloned()
        .ok_or_else(|| malformed("v1 freighter without Freighter.bIR"))?;
    record.data.insert("HomeSystem".into(), wrapper.get("kYq").cloned().unwrap_or(Value::Null));
    record.data.insert("Freighter".into(), freighter);
    record.data.insert("Inventory".into(), wrapper.get("8ZP").cloned().unwrap_or(Value::Null));
    record.data.insert(
        "Inventory_TechOnly".into(),
        wrapper.get("0wS").cloned().unwrap_or(Value::Null),
    );
    record.data.insert("Inventory_Cargo".into(), Value::Null);
    record.data.insert("Name".into(), wrapper.get("vxi").cloned().unwrap_or(Value::Null));
    record.data.insert("Colours".into(), Value::Null);
    Ok(record)
}

pub(super) fn encode_v1(record: &EntityRecord) -> Result<Vec<u8>> {
    let freighter = data_entry(&record.data, "Freighter")?;
    let mut wrapper = Map::new();
    wrapper.insert("kYq".into(), record.data.get("HomeSystem").cloned().unwrap_or(Value::Null));
    wrapper.insert("bIR".into(), freighter.clone());
    wrapper.insert("8ZP".into(), record.data.get("Inventory").cloned().unwrap_or(Value::Null));
    wrapper.insert(
        "0wS".into(),
        record.data.get("Inventory_TechOnly").cloned().unwrap_or(Value::Null),
    );
    wrapper.insert("vxi".into(), record.data.get("Name").cloned().unwrap_or(Value::Null));

    let mut envelope = Map::new();
    envelope.insert("Freighter".into(), Value::Object(wrapper));
    envelope.insert("Description".into(), Value::String(record.description.clone()));
    envelope.insert("FileVersion".into(), Value::from(1));
    insert_thumbnail(&mut envelope, record);
    Ok(serde_json::to_vec(&envelope)?)
}

fn freighter_class_label(resource: &str) -> Option<&'static str> {
    Some(match resource {
        "MODELS/COMMON/SPACECRAFT/INDUSTRIAL/FREIGHTER_PROC.SCENE.MBIN" => "Normal",
        "MODELS/COMMON/SPACECRAFT/INDUSTRIAL/CAPITALFREIGHTER_PROC.SCENE.MBIN" => "Capital",
        "MODELS/COMMON/SPACECRAFT/INDUSTRIAL/PIRATEFREIGHTER.SCENE.MBIN" => "Dreadnought",
        _ => return None,
    })
}

pub(super) fn default_filename(data: &Map<String, Value>) -> String {
    let Some(freighter) = data.get("Freighter") else {
        return String::new();
    };
    let class = resolve_str(freighter, "93M", "Filename")
        .and_then(freighter_class_label)
        .unwrap_or("Freighter");
    let seed = resolve_str(freighter, "@EL[1]", "Seed[1]").unwrap_or_default();
    let home = data
        .get("HomeSystem")
        .and_then(|home| lookup(home, "[1]"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let general = data
        .get("Inventory")
        .and_then(|i| resolve_array(i, "hl?", "ValidSlotIndices"))
        .map(|v| count3(v))
        .unwrap_or_default();
    let tech = data
        .get("Inventory_TechOnly")
        .and_then(|i| resolve_array(i, "hl?", "ValidSlotIndices"))
        .map(|v| count3(v))
        .unwrap_or_default();
    let cargo = data
        .get("Inventory_Cargo")
        .and_then(|i| resolve_array(i, "hl?", "ValidSlotIndices"))
        .map_or_else(|| "000".to_string(), |v| count3(v));
    format!("{class}-{seed}-{home}-{general}-{tech}-{cargo}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn save_document() -> Value {
        let mut customisation = vec![json!({}); 15];
        customisation.push(json!({"wnR": {"Aak": [{
            "RVl": {"Ty=": "Primary", "RVl": "Paint_Gold"},
            "xEg": [1.0, 1.0, 0.0]
        }]}}));
        json!({
            "6f=": {
                "kYq": [true, "0xC0FFEE"],
                "bIR": {
                    "93M": "MODELS/COMMON/SPACECRAFT/INDUSTRIAL/CAPITALFREIGHTER_PROC.SCENE.MBIN",
                    "@EL": [true, "0xBEEF"]
                },
                "8ZP": {"hl?": [{}, {}], "@bB": [{">MX": 3.0}]},
                "0wS": {"hl?": [{}]},
                "vxi": "Leviathan",
                "l:j": customisation
            }
        })
    }

    #[test]
    fn tag_covers_hull_home_system_and_colours() {
        let data = extract(&save_document(), 0).unwrap();
        assert_eq!(
            tag(&data),
            "CAPITALFREIGHTERPROC0XBEEF0XC0FFEE0020010003GOLDFFFF00"
        );
    }

    #[test]
    fn missing_cargo_contributes_a_fixed_width_zero() {
        let data = extract(&save_document(), 0).unwrap();
        assert!(tag(&data).contains("002001000"));
    }

    #[test]
    fn v1_round_trip_preserves_the_fingerprint_without_colours() {
        let mut record = EntityRecord::new(EntityKind::Freighter);
        record.data = extract(&save_document(), 0).unwrap();
        let bytes = encode_v1(&record).unwrap();
        let decoded = decode_v1(std::str::from_utf8(&bytes).unwrap()).unwrap();

        // The v1 layout drops the colour customisation, so the tag loses
        // exactly that suffix.
        assert!(decoded.data["Colours"].is_null());
        assert_eq!(tag(&decoded.data), "CAPITALFREIGHTERPROC0XBEEF0XC0FFEE0020010003");
        assert_eq!(decoded.data["Name"], json!("Leviathan"));
    }

    #[test]
    fn reinsert_writes_all_parts_back() {
        let mut document = save_document();
        let mut record = EntityRecord::new(EntityKind::Freighter);
        record.data = extract(&save_document(), 0).unwrap();
        record.data["Name"] = json!("Imported");
        record.data["Freighter"]["@EL"][1] = json!("0xDEAD");

        reinsert(&record, &mut document, 0).unwrap();
        assert_eq!(document["6f="]["vxi"], json!("Imported"));
        assert_eq!(document["6f="]["bIR"]["@EL"][1], json!("0xDEAD"));
    }

    #[test]
    fn default_filename_composes_class_and_sizes() {
        let data = extract(&save_document(), 0).unwrap();
        assert_eq!(
            default_filename(&data),
            "Capital-0xBEEF-0xC0FFEE-002-001-000"
        );
    }
}
