//! Exocraft vehicles. The slot index doubles as the vehicle type, and the
//! colour customisation lives in the shared character table at an offset
//! derived from that index.

use serde_json::{Map, Value};

use crate::document::{self, SchemaMode, clone_at, resolve_array, resolve_str};
use crate::error::Result;
use crate::kind::{EntityKind, data_entry, insert_thumbnail, v1_envelope};
use crate::record::{EntityRecord, malformed};
use crate::tag::{TagBuilder, concat_colours, concat_ordered};

/// Labels by slot index.
const TYPE_LABELS: [&str; 7] = [
    "Roamer",
    "Nomad",
    "Colossus",
    "Pilgrim",
    "Dragonfly",
    "Nautilon",
    "Minotaur",
];

/// The customisation table interleaves vehicles with other wearables; slot 0
/// maps to entry 1, every later slot to `index + 8`.
fn customisation_index(index: i64) -> i64 {
    if index == 0 { 1 } else { index + 8 }
}

fn slot_path(mode: SchemaMode, index: i64) -> String {
    match mode {
        SchemaMode::Mapped => format!("PlayerStateData.VehicleOwnership[{index}]"),
        SchemaMode::Obfuscated => format!("6f=.P;m[{index}]"),
    }
}

fn customisation_path(mode: SchemaMode, index: i64) -> String {
    let entry = customisation_index(index);
    match mode {
        SchemaMode::Mapped => format!("PlayerStateData.CharacterCustomisationData[{entry}]"),
        SchemaMode::Obfuscated => format!("6f=.l:j[{entry}]"),
    }
}

pub(super) fn extract(document: &Value, index: i64) -> Option<Map<String, Value>> {
    let mode = SchemaMode::of(document);
    let vehicle = clone_at(document, &slot_path(mode, index))?;
    let mut data = Map::new();
    data.insert("Vehicle".into(), vehicle);
    data.insert(
        "CustomisationData".into(),
        clone_at(document, &customisation_path(mode, index)).unwrap_or(Value::Null),
    );
    data.insert("Type".into(), Value::from(index));
    Some(data)
}

/// Vehicle type, then the customisation: sorted descriptor groups and colours
/// when the preset is the custom marker `^`, the preset name otherwise, and a
/// fixed default when no customisation came along at all.
pub(super) fn tag(data: &Map<String, Value>) -> String {
    let mut builder = TagBuilder::new();
    builder.push_owned(data.get("Type").and_then(Value::as_i64).map(|t| t.to_string()));
    match data.get("CustomisationData").filter(|v| !v.is_null()) {
        Some(customisation) => {
            match resolve_str(customisation, "VFd", "SelectedPreset") {
                Some("^") => {
                    builder.push_owned(
                        resolve_array(customisation, "wnR.SMP", "CustomData.DescriptorGroups")
                            .map(|groups| concat_ordered(groups)),
                    );
                    builder.push_owned(
                        resolve_array(customisation, "wnR.Aak", "CustomData.Colours")
                            .map(|colours| concat_colours(colours)),
                    );
                }
                preset => {
                    builder.push_opt(preset);
                }
            }
        }
        None => {
            builder.push("^DEFAULT_VEHICLE");
        }
    }
    builder.finish()
}

/// The slot's location, position and direction survive the write, so an
/// imported vehicle stays parked where the replaced one stood.
const PRESERVED: [(&str, &str); 3] = [
    ("YTa", "Location"),
    ("wMC", "Position"),
    ("l?l", "Direction"),
];

pub(super) fn reinsert(record: &EntityRecord, document: &mut Value, index: i64) -> Result<()> {
    let mode = SchemaMode::of(document);
    let slot = slot_path(mode, index);

    if let Some(vehicle) = record.data.get("Vehicle").filter(|v| !v.is_null()) {
        let saved: Vec<(&str, Option<Value>)> = PRESERVED
            .iter()
            .map(|(obfuscated, mapped)| {
                let key = mode.pick(obfuscated, mapped);
                (key, clone_at(document, &format!("{slot}.{key}")))
            })
            .collect();
        if !document::set(document, &slot, vehicle.clone()) {
            return Err(malformed(format!("no vehicle slot at index {index}")));
        }
        for (key, value) in saved {
            if let Some(value) = value {
                document::set(document, &format!("{slot}.{key}"), value);
            }
        }
    }
    if let Some(customisation) = record.data.get("CustomisationData").filter(|v| !v.is_null()) {
        if !document::set(document, &customisation_path(mode, index), customisation.clone()) {
            return Err(malformed("no vehicle customisation entry in document"));
        }
    }
    Ok(())
}

/// The v1 layout carries the vehicle and its type; customisation does not
/// survive that encoding.
pub(super) fn decode_v1(text: &str) -> Result<EntityRecord> {
    let (envelope, mut record) = v1_envelope(EntityKind::Vehicle, text)?;
    let vehicle = envelope
        .get("Data")
        .filter(|v| !v.is_null())
        .cloned()
        .ok_or_else(|| malformed("v1 vehicle without Data"))?;
    let vehicle_type = envelope
        .get("Type")
        .and_then(Value::as_i64)
        .ok_or_else(|| malformed("v1 vehicle without Type"))?;
    record.data.insert("Vehicle".into(), vehicle);
    record.data.insert("CustomisationData".into(), Value::Null);
    record.data.insert("Type".into(), Value::from(vehicle_type));
    Ok(record)
}

pub(super) fn encode_v1(record: &EntityRecord) -> Result<Vec<u8>> {
    let vehicle = data_entry(&record.data, "Vehicle")?;

    let mut envelope = Map::new();
    envelope.insert("Data".into(), vehicle.clone());
    envelope.insert(
        "DateCreated".into(),
        Value::String(record.created_at.to_rfc3339()),
    );
    envelope.insert("Description".into(), Value::String(record.description.clone()));
    envelope.insert("FileVersion".into(), Value::from(1));
    envelope.insert("Starred".into(), Value::Bool(record.starred));
    insert_thumbnail(&mut envelope, record);
    envelope.insert(
        "Type".into(),
        record.data.get("Type").cloned().unwrap_or(Value::Null),
    );
    Ok(serde_json::to_vec(&envelope)?)
}

pub(super) fn default_filename(data: &Map<String, Value>) -> String {
    data.get("Type")
        .and_then(Value::as_i64)
        .and_then(|index| usize::try_from(index).ok())
        .and_then(|index| TYPE_LABELS.get(index))
        .unwrap_or(&"Vehicle")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn save_document() -> Value {
        let mut customisation = vec![json!({}); 9];
        customisation.push(json!({
            "VFd": "^",
            "wnR": {
                "SMP": ["^WHEELS_B", "^BODY_A"],
                "Aak": [{
                    "RVl": {"Ty=": "Primary", "RVl": "Paint_Red"},
                    "xEg": [1.0, 0.0, 0.0]
                }]
            }
        }));
        json!({
            "6f=": {
                "P;m": [
                    {},
                    {
                        "NKm": "",
                        "YTa": {"dZj": 7},
                        "wMC": [12.0, 0.0, -3.0],
                        "l?l": [0.0, 0.0, 1.0],
                        "@EL": [true, "0xCAB"]
                    }
                ],
                "l:j": customisation
            }
        })
    }

    #[test]
    fn slot_index_selects_the_shifted_customisation_entry() {
        assert_eq!(customisation_index(0), 1);
        assert_eq!(customisation_index(1), 9);
        assert_eq!(customisation_index(6), 14);
    }

    #[test]
    fn tag_covers_type_descriptors_and_colours() {
        let data = extract(&save_document(), 1).unwrap();
        assert_eq!(tag(&data), "1BODYAWHEELSBREDFF0000");
    }

    #[test]
    fn tag_uses_the_preset_name_when_not_customised() {
        let mut data = extract(&save_document(), 1).unwrap();
        data["CustomisationData"]["VFd"] = json!("^SPEEDY");
        assert_eq!(tag(&data), "1SPEEDY");

        data["CustomisationData"] = Value::Null;
        assert_eq!(tag(&data), "1DEFAULTVEHICLE");
    }

    #[test]
    fn v1_round_trip_keeps_the_type_and_drops_customisation() {
        let mut record = EntityRecord::new(EntityKind::Vehicle);
        record.data = extract(&save_document(), 1).unwrap();
        let bytes = encode_v1(&record).unwrap();
        let decoded = decode_v1(std::str::from_utf8(&bytes).unwrap()).unwrap();

        assert_eq!(decoded.data["Type"], json!(1));
        assert!(decoded.data["CustomisationData"].is_null());
        assert_eq!(tag(&decoded.data), "1DEFAULTVEHICLE");
    }

    #[test]
    fn reinsert_preserves_location_position_and_direction() {
        let mut document = save_document();
        let mut incoming = extract(&save_document(), 1).unwrap();
        incoming["Vehicle"]["wMC"] = json!([0.0, 0.0, 0.0]);
        incoming["Vehicle"]["@EL"][1] = json!("0xFE1");
        let mut record = EntityRecord::new(EntityKind::Vehicle);
        record.data = incoming;

        reinsert(&record, &mut document, 1).unwrap();
        let slot = &document["6f="]["P;m"][1];
        assert_eq!(slot["@EL"][1], json!("0xFE1"));
        assert_eq!(slot["wMC"], json!([12.0, 0.0, -3.0]));
        assert_eq!(slot["YTa"], json!({"dZj": 7}));
    }

    #[test]
    fn default_filename_is_the_type_label() {
        let data = extract(&save_document(), 1).unwrap();
        assert_eq!(default_filename(&data), "Nomad");
        assert_eq!(default_filename(&Map::new()), "Vehicle");
    }
}
