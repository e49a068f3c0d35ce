//! Starships. Three sub-trees per slot: the ship, its legacy-colour flag and
//! the colour customisation entry, which lives at an offset index in the
//! shared customisation table.

use serde_json::{Map, Value};

use crate::document::{
    self, SchemaMode, clone_at, resolve_array, resolve_str,
};
use crate::error::Result;
use crate::kind::{EntityKind, data_entry, insert_thumbnails, v1_envelope};
use crate::record::{EntityRecord, malformed};
use crate::tag::{TagBuilder, concat_colours, concat_stats, count3, resource_name};

/// Ship slots map to customisation entries at an offset; the table grew by
/// eight entries when the slot count was raised from six to twelve.
#[must_use]
pub(super) fn customisation_index(index: i64) -> i64 {
    if index < 6 { index + 3 } else { index + 11 }
}

fn ship_path(mode: SchemaMode, index: i64) -> String {
    match mode {
        SchemaMode::Mapped => format!("BaseContext.PlayerStateData.ShipOwnership[{index}]"),
        SchemaMode::Obfuscated => format!("vLc.6f=.@Cs[{index}]"),
    }
}

fn legacy_colours_path(mode: SchemaMode, index: i64) -> String {
    match mode {
        SchemaMode::Mapped => format!("BaseContext.PlayerStateData.ShipUsesLegacyColours[{index}]"),
        SchemaMode::Obfuscated => format!("vLc.6f=.4hl[{index}]"),
    }
}

fn colours_path(mode: SchemaMode, index: i64) -> String {
    let at = customisation_index(index);
    match mode {
        SchemaMode::Mapped => format!(
            "BaseContext.PlayerStateData.CharacterCustomisationData[{at}].CustomData.Colours"
        ),
        SchemaMode::Obfuscated => format!("vLc.6f=.l:j[{at}].wnR.Aak"),
    }
}

pub(super) fn extract(document: &Value, index: i64) -> Option<Map<String, Value>> {
    let mode = SchemaMode::of(document);
    let ship = clone_at(document, &ship_path(mode, index))?;
    let mut data = Map::new();
    data.insert("Ship".into(), ship);
    data.insert(
        "UseLegacyColours".into(),
        clone_at(document, &legacy_colours_path(mode, index)).unwrap_or(Value::Bool(false)),
    );
    data.insert(
        "Colours".into(),
        clone_at(document, &colours_path(mode, index)).unwrap_or(Value::Null),
    );
    Some(data)
}

/// Legacy-colour flag, hull resource and seed, the three inventory sizes,
/// base stats and the colour customisation.
pub(super) fn tag(data: &Map<String, Value>) -> String {
    let mut builder = TagBuilder::new();
    let legacy = data
        .get("UseLegacyColours")
        .and_then(Value::as_bool)
        .unwrap_or_default();
    builder.push(if legacy { "1" } else { "0" });
    if let Some(ship) = data.get("Ship") {
        builder.push_owned(
            resolve_str(ship, "NTx.93M", "Resource.Filename").map(resource_name),
        );
        builder.push_opt(resolve_str(ship, "NTx.@EL[1]", "Resource.Seed[1]"));
        builder.push_owned(
            resolve_array(ship, ";l5.hl?", "Inventory.ValidSlotIndices").map(|v| count3(v)),
        );
        builder.push_owned(
            resolve_array(ship, "PMT.hl?", "Inventory_TechOnly.ValidSlotIndices").map(|v| count3(v)),
        );
        builder.push(
            &resolve_array(ship, "gan.hl?", "Inventory_Cargo.ValidSlotIndices")
                .map_or_else(|| "000".to_string(), |v| count3(v)),
        );
        builder.push_owned(
            resolve_array(ship, ";l5.@bB", "Inventory.BaseStatValues").map(|v| concat_stats(v)),
        );
    }
    if let Some(colours) = data.get("Colours").and_then(Value::as_array) {
        builder.push(&concat_colours(colours));
    }
    builder.finish()
}

pub(super) fn reinsert(record: &EntityRecord, document: &mut Value, index: i64) -> Result<()> {
    let mode = SchemaMode::of(document);
    if let Some(ship) = record.data.get("Ship").filter(|v| !v.is_null()) {
        if !document::set(document, &ship_path(mode, index), ship.clone()) {
            return Err(malformed(format!("no ship slot at index {index}")));
        }
    }
    if let Some(legacy) = record.data.get("UseLegacyColours").filter(|v| !v.is_null()) {
        if !document::set(document, &legacy_colours_path(mode, index), legacy.clone()) {
            return Err(malformed(format!("no legacy-colour slot at index {index}")));
        }
    }
    if let Some(colours) = record.data.get("Colours").filter(|v| !v.is_null()) {
        if !document::set(document, &colours_path(mode, index), colours.clone()) {
            return Err(malformed(format!(
                "no customisation entry for ship index {index}"
            )));
        }
    }
    Ok(())
}

pub(super) fn decode_container(bytes: &[u8]) -> Result<EntityRecord> {
    let ship: Value = serde_json::from_slice(bytes)?;
    let mut record = EntityRecord::new(EntityKind::Starship);
    record.data.insert("Ship".into(), ship);
    record.data.insert("UseLegacyColours".into(), Value::Bool(false));
    record.data.insert("Colours".into(), Value::Null);
    Ok(record)
}

pub(super) fn encode_container(record: &EntityRecord) -> Result<Vec<u8>> {
    let ship = data_entry(&record.data, "Ship")?;
    Ok(serde_json::to_vec(ship)?)
}

pub(super) fn decode_v1(text: &str) -> Result<EntityRecord> {
    let (envelope, mut record) = v1_envelope(EntityKind::Starship, text)?;
    let ship = envelope
        .get("Ship")
        .and_then(|wrapper| wrapper.get("@Cs"))
        .filter(|v| !v.is_null())
        .cloned()
        .ok_or_else(|| malformed("v1 starship without Ship.@Cs"))?;
    record.data.insert("Ship".into(), ship);
    record.data.insert(
        "UseLegacyColours".into(),
        envelope
            .get("Ship")
            .and_then(|wrapper| wrapper.get("4hl"))
            .cloned()
            .unwrap_or(Value::Bool(false)),
    );
    record.data.insert(
        "Colours".into(),
        envelope
            .get("Colours")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new())),
    );
    Ok(record)
}

pub(super) fn encode_v1(record: &EntityRecord) -> Result<Vec<u8>> {
    let ship = data_entry(&record.data, "Ship")?;
    let mut wrapper = Map::new();
    wrapper.insert("@Cs".into(), ship.clone());
    wrapper.insert(
        "4hl".into(),
        record
            .data
            .get("UseLegacyColours")
            .cloned()
            .unwrap_or(Value::Bool(false)),
    );

    let mut envelope = Map::new();
    envelope.insert("Ship".into(), Value::Object(wrapper));
    envelope.insert(
        "Colours".into(),
        record.data.get("Colours").cloned().unwrap_or(Value::Null),
    );
    envelope.insert("Description".into(), Value::String(record.description.clone()));
    envelope.insert("FileVersion".into(), Value::from(1));
    insert_thumbnails(&mut envelope, record);
    Ok(serde_json::to_vec(&envelope)?)
}

/// Well-known hull models, used only for default filenames.
pub(super) fn ship_class_label(resource: &str) -> Option<&'static str> {
    Some(match resource {
        "MODELS/COMMON/SPACECRAFT/DROPSHIPS/DROPSHIP_PROC.SCENE.MBIN" => "Dropship",
        "MODELS/COMMON/SPACECRAFT/FIGHTERS/FIGHTER_PROC.SCENE.MBIN" => "Fighter",
        "MODELS/COMMON/SPACECRAFT/SCIENTIFIC/SCIENTIFIC_PROC.SCENE.MBIN" => "Scientific",
        "MODELS/COMMON/SPACECRAFT/SHUTTLE/SHUTTLE_PROC.SCENE.MBIN" => "Shuttle",
        "MODELS/COMMON/SPACECRAFT/S-CLASS/S-CLASS_PROC.SCENE.MBIN" => "Royal",
        "MODELS/COMMON/SPACECRAFT/S-CLASS/BIOPARTS/BIOSHIP_PROC.SCENE.MBIN" => "Alien",
        "MODELS/COMMON/SPACECRAFT/SAILSHIP/SAILSHIP_PROC.SCENE.MBIN" => "Sail",
        "MODELS/COMMON/SPACECRAFT/SENTINELSHIP/SENTINELSHIP_PROC.SCENE.MBIN" => "Robot",
        _ => return None,
    })
}

pub(super) fn default_filename(data: &Map<String, Value>) -> String {
    let Some(ship) = data.get("Ship") else {
        return String::new();
    };
    let class = resolve_str(ship, "NTx.93M", "Resource.Filename")
        .and_then(ship_class_label)
        .unwrap_or("Starship");
    let inventory_class =
        resolve_str(ship, ";l5.B@N.1o6", "Inventory.Class.InventoryClass").unwrap_or_default();
    let seed = resolve_str(ship, "NTx.@EL[1]", "Resource.Seed[1]").unwrap_or_default();
    let general = resolve_array(ship, ";l5.hl?", "Inventory.ValidSlotIndices")
        .map(|v| count3(v))
        .unwrap_or_default();
    let tech = resolve_array(ship, "PMT.hl?", "Inventory_TechOnly.ValidSlotIndices")
        .map(|v| count3(v))
        .unwrap_or_default();
    let cargo = resolve_array(ship, "gan.hl?", "Inventory_Cargo.ValidSlotIndices")
        .map_or_else(|| "000".to_string(), |v| count3(v));
    format!("{class}-{inventory_class}-{seed}-{general}-{tech}-{cargo}")
}
