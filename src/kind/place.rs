//! Saved locations. One per save: the current universe address plus the
//! spawn-state vectors, so the slot index is ignored. The address also packs
//! into the hex form shared with bases and companions.

use serde_json::{Map, Value};

use crate::document::{self, SchemaMode, clone_at, resolve_i64};
use crate::error::Result;
use crate::kind::{EntityKind, data_entry, insert_thumbnails, v1_envelope};
use crate::record::{EntityRecord, malformed};
use crate::tag::{TagBuilder, concat_signed, galaxy_number, glyphs_string};

/// Data role and its document path, per schema.
const PARTS: [(&str, &str, &str); 6] = [
    (
        "UniverseAddress",
        "vLc.6f=.yhJ",
        "BaseContext.PlayerStateData.UniverseAddress",
    ),
    ("PlayerPosition", "rnc.mEH", "SpawnStateData.PlayerPositionInSystem"),
    ("PlayerTransform", "rnc.l2U", "SpawnStateData.PlayerTransformAt"),
    ("ShipPosition", "rnc.tnP", "SpawnStateData.ShipPositionInSystem"),
    ("ShipTransform", "rnc.l4H", "SpawnStateData.ShipTransformAt"),
    ("LastKnownPlayerState", "rnc.jk4", "SpawnStateData.LastKnownPlayerState"),
];

pub(super) fn extract(document: &Value, _index: i64) -> Option<Map<String, Value>> {
    let mode = SchemaMode::of(document);
    let address = clone_at(
        document,
        mode.pick("vLc.6f=.yhJ", "BaseContext.PlayerStateData.UniverseAddress"),
    )?;
    let mut data = Map::new();
    data.insert("UniverseAddress".into(), address);
    for (role, obfuscated, mapped) in &PARTS[1..] {
        data.insert(
            (*role).into(),
            clone_at(document, mode.pick(obfuscated, mapped)).unwrap_or(Value::Null),
        );
    }
    data.insert("Type".into(), Value::from(0));
    Some(data)
}

/// Address components lettered for readability, then the rounded player
/// position and transform vectors.
pub(super) fn tag(data: &Map<String, Value>) -> String {
    let mut builder = TagBuilder::new();
    if let Some(address) = data.get("UniverseAddress") {
        for (letter, obfuscated, mapped) in [
            ("R", "Iis", "RealityIndex"),
            ("X", "oZw.dZj", "GalacticAddress.VoxelX"),
            ("Y", "oZw.IyE", "GalacticAddress.VoxelY"),
            ("Z", "oZw.uXE", "GalacticAddress.VoxelZ"),
            ("S", "oZw.vby", "GalacticAddress.SolarSystemIndex"),
            ("P", "oZw.jsv", "GalacticAddress.PlanetIndex"),
        ] {
            builder.push(letter);
            builder.push_owned(resolve_i64(address, obfuscated, mapped).map(|v| v.to_string()));
        }
    }
    builder.push_owned(
        data.get("PlayerPosition")
            .and_then(Value::as_array)
            .map(|p| concat_signed(p)),
    );
    builder.push_owned(
        data.get("PlayerTransform")
            .and_then(Value::as_array)
            .map(|t| concat_signed(t)),
    );
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
    Ok(())
}

/// Voxel components are stored signed; the packed address wants them wrapped
/// into their unsigned field width.
fn wrap_voxel(value: i64, hex_digits: u32) -> i64 {
    let span = 16_i64.pow(hex_digits);
    ((value % span) + span) % span
}

/// Packs a universe address sub-tree into the hex string form, planet first.
/// Empty when the components are missing.
pub(super) fn address_hex(address: &Value) -> String {
    let (Some(reality), Some(x), Some(y), Some(z), Some(system), Some(planet)) = (
        resolve_i64(address, "Iis", "RealityIndex"),
        resolve_i64(address, "oZw.dZj", "GalacticAddress.VoxelX"),
        resolve_i64(address, "oZw.IyE", "GalacticAddress.VoxelY"),
        resolve_i64(address, "oZw.uXE", "GalacticAddress.VoxelZ"),
        resolve_i64(address, "oZw.vby", "GalacticAddress.SolarSystemIndex"),
        resolve_i64(address, "oZw.jsv", "GalacticAddress.PlanetIndex"),
    ) else {
        return String::new();
    };
    format!(
        "0x{planet:X}{system:03X}{reality:02X}{y:02X}{z:03X}{x:03X}",
        x = wrap_voxel(x, 3),
        y = wrap_voxel(y, 2),
        z = wrap_voxel(z, 3),
    )
}

pub(super) fn decode_v1(text: &str) -> Result<EntityRecord> {
    let (envelope, mut record) = v1_envelope(EntityKind::Place, text)?;
    let wrapper = envelope
        .get("Data")
        .and_then(Value::as_object)
        .ok_or_else(|| malformed("v1 place without Data"))?;
    let address = wrapper
        .get("yhJ")
        .filter(|v| !v.is_null())
        .cloned()
        .ok_or_else(|| malformed("v1 place without Data.yhJ"))?;
    record.data.insert("UniverseAddress".into(), address);
    for (role, key) in [
        ("PlayerPosition", "mEH"),
        ("PlayerTransform", "l2U"),
        ("ShipPosition", "tnP"),
        ("ShipTransform", "l4H"),
        ("LastKnownPlayerState", "jk4"),
    ] {
        record
            .data
            .insert(role.into(), wrapper.get(key).cloned().unwrap_or(Value::Null));
    }
    record.data.insert(
        "Type".into(),
        envelope.get("Type").cloned().unwrap_or(Value::from(0)),
    );
    Ok(record)
}

pub(super) fn encode_v1(record: &EntityRecord) -> Result<Vec<u8>> {
    let address = data_entry(&record.data, "UniverseAddress")?;
    let hex = address_hex(address);

    let mut wrapper = Map::new();
    wrapper.insert("yhJ".into(), address.clone());
    for (role, key) in [
        ("PlayerPosition", "mEH"),
        ("PlayerTransform", "l2U"),
        ("ShipPosition", "tnP"),
        ("ShipTransform", "l4H"),
        ("LastKnownPlayerState", "jk4"),
    ] {
        wrapper.insert(key.into(), record.data.get(role).cloned().unwrap_or(Value::Null));
    }

    let mut envelope = Map::new();
    envelope.insert("Data".into(), Value::Object(wrapper));
    envelope.insert(
        "DateCreated".into(),
        Value::String(record.created_at.to_rfc3339()),
    );
    envelope.insert("Description".into(), Value::String(record.description.clone()));
    envelope.insert("FileVersion".into(), Value::from(1));
    envelope.insert("GalacticAddress".into(), Value::String(hex.clone()));
    envelope.insert(
        "Galaxy".into(),
        galaxy_number(&hex).map_or(Value::Null, Value::from),
    );
    envelope.insert("GlyphsString".into(), Value::String(glyphs_string(&hex)));
    envelope.insert("Starred".into(), Value::Bool(record.starred));
    insert_thumbnails(&mut envelope, record);
    envelope.insert(
        "Type".into(),
        record.data.get("Type").cloned().unwrap_or(Value::from(0)),
    );
    Ok(serde_json::to_vec(&envelope)?)
}

pub(super) fn default_filename(data: &Map<String, Value>) -> String {
    let hex = data.get("UniverseAddress").map(address_hex).unwrap_or_default();
    let position = data
        .get("PlayerPosition")
        .and_then(Value::as_array)
        .map(|p| concat_signed(p))
        .unwrap_or_default();
    format!("{hex}{position}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn save_document() -> Value {
        json!({
            "vLc": {"6f=": {"yhJ": {
                "Iis": 2,
                "oZw": {"dZj": -100, "IyE": 3, "uXE": 50, "vby": 601, "jsv": 4}
            }}},
            "rnc": {
                "mEH": [1000.4, -200.0, 0.0],
                "l2U": [0.0, 1.0, 0.0],
                "tnP": [1.0, 2.0, 3.0],
                "l4H": [0.0, 0.0, 1.0],
                "jk4": "InShip"
            }
        })
    }

    #[test]
    fn tag_letters_the_address_and_rounds_the_vectors() {
        let data = extract(&save_document(), 0).unwrap();
        assert_eq!(tag(&data), "R2X-100Y3Z50S601P4-1000--200-0-0-1-0");
    }

    #[test]
    fn address_hex_wraps_negative_voxels() {
        let data = extract(&save_document(), 0).unwrap();
        assert_eq!(address_hex(&data["UniverseAddress"]), "0x42590203032F9C");
        assert_eq!(address_hex(&json!({})), "");
    }

    #[test]
    fn v1_round_trip_preserves_the_fingerprint() {
        let mut record = EntityRecord::new(EntityKind::Place);
        record.data = extract(&save_document(), 0).unwrap();
        record.description = "Paradise ridge".into();

        let bytes = encode_v1(&record).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\"GalacticAddress\":\"0x42590203032F9C\""));
        assert!(text.contains("\"Galaxy\":2"));

        let decoded = decode_v1(&text).unwrap();
        assert_eq!(decoded.description, "Paradise ridge");
        assert_eq!(tag(&decoded.data), tag(&record.data));
        assert_eq!(decoded.data["LastKnownPlayerState"], json!("InShip"));
    }

    #[test]
    fn reinsert_writes_every_part_back() {
        let mut document = save_document();
        let mut record = EntityRecord::new(EntityKind::Place);
        record.data = extract(&save_document(), 0).unwrap();
        record.data["UniverseAddress"]["oZw"]["jsv"] = json!(5);
        record.data["PlayerPosition"] = json!([0.0, 0.0, 0.0]);

        reinsert(&record, &mut document, 0).unwrap();
        assert_eq!(document["vLc"]["6f="]["yhJ"]["oZw"]["jsv"], json!(5));
        assert_eq!(document["rnc"]["mEH"], json!([0.0, 0.0, 0.0]));
    }

    #[test]
    fn default_filename_packs_address_and_position() {
        let data = extract(&save_document(), 0).unwrap();
        assert_eq!(default_filename(&data), "0x42590203032F9C-1000--200-0");
    }
}
