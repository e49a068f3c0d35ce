//! Tamed creature companions, two sub-trees per slot: the pet itself and its
//! accessory customisation.

use serde_json::{Map, Value};

use crate::document::{self, SchemaMode, clone_at, resolve, resolve_array, resolve_str, value_as_hex_string};
use crate::error::Result;
use crate::kind::{EntityKind, data_entry, insert_thumbnail, v1_envelope};
use crate::record::{EntityRecord, malformed};
use crate::tag::{TagBuilder, concat_ordered, concat_signed, galaxy_number, glyphs_string};

fn pet_path(mode: SchemaMode, index: i64) -> String {
    match mode {
        SchemaMode::Mapped => format!("PlayerStateData.Pets[{index}]"),
        SchemaMode::Obfuscated => format!("6f=.Mcl[{index}]"),
    }
}

fn accessory_path(mode: SchemaMode, index: i64) -> String {
    match mode {
        SchemaMode::Mapped => format!("PlayerStateData.PetAccessoryCustomisation[{index}]"),
        SchemaMode::Obfuscated => format!("6f=.j30[{index}]"),
    }
}

pub(super) fn extract(document: &Value, index: i64) -> Option<Map<String, Value>> {
    let mode = SchemaMode::of(document);
    let pet = clone_at(document, &pet_path(mode, index))?;
    let mut data = Map::new();
    data.insert("Pet".into(), pet);
    data.insert(
        "AccessoryCustomisation".into(),
        clone_at(document, &accessory_path(mode, index)).unwrap_or(Value::Null),
    );
    Some(data)
}

/// Species identity, sorted descriptors, the relevant seed halves and the
/// rounded trait vector.
pub(super) fn tag(data: &Map<String, Value>) -> String {
    let mut builder = TagBuilder::new();
    if let Some(pet) = data.get("Pet") {
        builder.push_opt(resolve_str(pet, "XID", "CreatureID"));
        builder.push_owned(resolve_array(pet, "osl", "Descriptors").map(|d| concat_ordered(d)));
        builder.push_opt(resolve_str(pet, "WTp[1]", "CreatureSeed[1]"));
        builder.push_opt(resolve_str(pet, "1p=[1]", "CreatureSecondarySeed[1]"));
        builder.push_opt(resolve_str(pet, "m9o[1]", "SpeciesSeed[1]"));
        builder.push_opt(resolve_str(pet, "JrL[1]", "GenusSeed[1]"));
        builder.push_owned(resolve_array(pet, "JAy", "Traits").map(|t| concat_signed(t)));
    }
    builder.finish()
}

pub(super) fn reinsert(record: &EntityRecord, document: &mut Value, index: i64) -> Result<()> {
    let mode = SchemaMode::of(document);
    if let Some(pet) = record.data.get("Pet").filter(|v| !v.is_null()) {
        if !document::set(document, &pet_path(mode, index), pet.clone()) {
            return Err(malformed(format!("no companion slot at index {index}")));
        }
    }
    if let Some(accessories) = record
        .data
        .get("AccessoryCustomisation")
        .filter(|v| !v.is_null())
    {
        if !document::set(document, &accessory_path(mode, index), accessories.clone()) {
            return Err(malformed(format!("no accessory slot at index {index}")));
        }
    }
    Ok(())
}

/// The bare container form is the pet sub-tree alone; accessories do not
/// survive that encoding.
pub(super) fn decode_container(bytes: &[u8]) -> Result<EntityRecord> {
    let pet: Value = serde_json::from_slice(bytes)?;
    let mut record = EntityRecord::new(EntityKind::Companion);
    record.data.insert("Pet".into(), pet);
    record.data.insert("AccessoryCustomisation".into(), Value::Null);
    Ok(record)
}

pub(super) fn encode_container(record: &EntityRecord) -> Result<Vec<u8>> {
    let pet = data_entry(&record.data, "Pet")?;
    Ok(serde_json::to_vec(pet)?)
}

pub(super) fn decode_v1(text: &str) -> Result<EntityRecord> {
    let (envelope, mut record) = v1_envelope(EntityKind::Companion, text)?;
    let pet = envelope
        .get("Companion")
        .filter(|v| !v.is_null())
        .cloned()
        .ok_or_else(|| malformed("v1 companion without Companion"))?;
    record.data.insert("Pet".into(), pet);
    record.data.insert(
        "AccessoryCustomisation".into(),
        envelope.get("Accessories").cloned().unwrap_or(Value::Null),
    );
    Ok(record)
}

pub(super) fn encode_v1(record: &EntityRecord) -> Result<Vec<u8>> {
    let pet = data_entry(&record.data, "Pet")?;
    let address = resolve(pet, "5L6", "UniverseAddress")
        .and_then(value_as_hex_string)
        .unwrap_or_default();

    let mut envelope = Map::new();
    envelope.insert("Companion".into(), pet.clone());
    envelope.insert(
        "Accessories".into(),
        record
            .data
            .get("AccessoryCustomisation")
            .cloned()
            .unwrap_or(Value::Null),
    );
    envelope.insert("Description".into(), Value::String(record.description.clone()));
    envelope.insert("FileVersion".into(), Value::from(1));
    envelope.insert("GalacticAddress".into(), Value::String(address.clone()));
    envelope.insert(
        "Galaxy".into(),
        galaxy_number(&address).map_or(Value::Null, Value::from),
    );
    envelope.insert("GlyphsString".into(), Value::String(glyphs_string(&address)));
    insert_thumbnail(&mut envelope, record);
    Ok(serde_json::to_vec(&envelope)?)
}

pub(super) fn default_filename(data: &Map<String, Value>) -> String {
    let Some(pet) = data.get("Pet") else {
        return String::new();
    };
    let id = resolve_str(pet, "4In", "CreatureID").unwrap_or_default();
    let descriptors = resolve_array(pet, "osl", "Descriptors")
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join("_")
        })
        .unwrap_or_default();
    let seed = resolve_str(pet, "WTp[1]", "CreatureSeed[1]").unwrap_or_default();
    format!("{id}_{descriptors}-{seed}").replace('^', "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn save_document() -> Value {
        json!({
            "6f=": {
                "Mcl": [{
                    "XID": "^COWFLOATER",
                    "4In": "^COWFLOATER",
                    "fH8": "Moo",
                    "5L6": "0x7E2A010899BA1",
                    "osl": ["^FLOATER", "^COW"],
                    "WTp": [true, "0x89EA6A13E9BD3FAA"],
                    "1p=": [true, "0x1"],
                    "m9o": [true, "0x2"],
                    "JrL": [true, "0x3"],
                    "JAy": [0.4, -0.9, 0.0]
                }],
                "j30": [{"SsO": []}]
            }
        })
    }

    #[test]
    fn extract_carries_both_sub_trees() {
        let data = extract(&save_document(), 0).unwrap();
        assert_eq!(data["Pet"]["XID"], json!("^COWFLOATER"));
        assert!(!data["AccessoryCustomisation"].is_null());
    }

    #[test]
    fn tag_sorts_descriptors_and_rounds_traits() {
        let data = extract(&save_document(), 0).unwrap();
        let fingerprint = tag(&data);
        assert!(fingerprint.starts_with("COWFLOATERCOWFLOATER"));
        assert!(fingerprint.ends_with("-0--1-0"));

        let mut swapped = data.clone();
        swapped["Pet"]["osl"] = json!(["^COW", "^FLOATER"]);
        assert_eq!(tag(&swapped), fingerprint);
    }

    #[test]
    fn v1_round_trip_keeps_accessories() {
        let mut record = EntityRecord::new(EntityKind::Companion);
        record.data = extract(&save_document(), 0).unwrap();
        let bytes = encode_v1(&record).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        let decoded = decode_v1(&text).unwrap();
        assert_eq!(tag(&decoded.data), tag(&record.data));
        assert!(!decoded.data["AccessoryCustomisation"].is_null());
    }

    #[test]
    fn container_form_drops_accessories() {
        let mut record = EntityRecord::new(EntityKind::Companion);
        record.data = extract(&save_document(), 0).unwrap();
        let bytes = encode_container(&record).unwrap();

        let decoded = decode_container(&bytes).unwrap();
        assert_eq!(tag(&decoded.data), tag(&record.data));
        assert!(decoded.data["AccessoryCustomisation"].is_null());
    }

    #[test]
    fn default_filename_strips_carets() {
        let data = extract(&save_document(), 0).unwrap();
        assert_eq!(
            default_filename(&data),
            "COWFLOATER_FLOATER_COW-0x89EA6A13E9BD3FAA"
        );
    }
}
