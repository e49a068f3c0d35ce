//! Multitool weapons, a single sub-tree per slot.

use serde_json::{Map, Value};

use crate::document::{self, SchemaMode, clone_at, resolve_array, resolve_str};
use crate::error::Result;
use crate::kind::{EntityKind, data_entry, insert_thumbnail, v1_envelope};
use crate::record::{EntityRecord, malformed};
use crate::tag::{TagBuilder, concat_stats, count3, resource_name};

fn slot_path(mode: SchemaMode, index: i64) -> String {
    match mode {
        SchemaMode::Mapped => format!("PlayerStateData.Multitools[{index}]"),
        SchemaMode::Obfuscated => format!("6f=.SuJ[{index}]"),
    }
}

pub(super) fn extract(document: &Value, index: i64) -> Option<Map<String, Value>> {
    let multitool = clone_at(document, &slot_path(SchemaMode::of(document), index))?;
    let mut data = Map::new();
    data.insert("Multitool".into(), multitool);
    // Model-class override, settable by callers; saves never carry one.
    data.insert("Type".into(), Value::Null);
    Some(data)
}

/// Model resource (with a fixed fallback for the unmodified starter tool),
/// seed, store size and base stats.
pub(super) fn tag(data: &Map<String, Value>) -> String {
    let mut builder = TagBuilder::new();
    if let Some(multitool) = data.get("Multitool") {
        builder.push(
            &resolve_str(multitool, "NTx.93M", "Resource.Filename")
                .map_or_else(|| "MULTITOOL".to_string(), resource_name),
        );
        builder.push_opt(resolve_str(multitool, "@EL[1]", "Seed[1]"));
        builder.push_owned(
            resolve_array(multitool, "OsQ.hl?", "Store.ValidSlotIndices").map(|v| count3(v)),
        );
        builder.push_owned(
            resolve_array(multitool, "OsQ.@bB", "Store.BaseStatValues").map(|v| concat_stats(v)),
        );
    }
    builder.finish()
}

pub(super) fn reinsert(record: &EntityRecord, document: &mut Value, index: i64) -> Result<()> {
    let mode = SchemaMode::of(document);
    if let Some(multitool) = record.data.get("Multitool").filter(|v| !v.is_null()) {
        if !document::set(document, &slot_path(mode, index), multitool.clone()) {
            return Err(malformed(format!("no multitool slot at index {index}")));
        }
    }
    Ok(())
}

pub(super) fn decode_container(bytes: &[u8]) -> Result<EntityRecord> {
    let multitool: Value = serde_json::from_slice(bytes)?;
    let mut record = EntityRecord::new(EntityKind::Weapon);
    record.data.insert("Multitool".into(), multitool);
    record.data.insert("Type".into(), Value::Null);
    Ok(record)
}

pub(super) fn encode_container(record: &EntityRecord) -> Result<Vec<u8>> {
    let multitool = data_entry(&record.data, "Multitool")?;
    Ok(serde_json::to_vec(multitool)?)
}

pub(super) fn decode_v1(text: &str) -> Result<EntityRecord> {
    let (envelope, mut record) = v1_envelope(EntityKind::Weapon, text)?;
    let multitool = envelope
        .get("MultiTool")
        .filter(|v| !v.is_null())
        .cloned()
        .ok_or_else(|| malformed("v1 weapon without MultiTool"))?;
    record.data.insert("Multitool".into(), multitool);
    record.data.insert(
        "Type".into(),
        envelope.get("Type").cloned().unwrap_or(Value::Null),
    );
    Ok(record)
}

pub(super) fn encode_v1(record: &EntityRecord) -> Result<Vec<u8>> {
    let multitool = data_entry(&record.data, "Multitool")?;
    let mut envelope = Map::new();
    envelope.insert("MultiTool".into(), multitool.clone());
    envelope.insert("Description".into(), Value::String(record.description.clone()));
    envelope.insert("FileVersion".into(), Value::from(1));
    envelope.insert(
        "Type".into(),
        record.data.get("Type").cloned().unwrap_or(Value::Null),
    );
    insert_thumbnail(&mut envelope, record);
    Ok(serde_json::to_vec(&envelope)?)
}

/// Model-class labels, indexable by the numeric `Type` override.
const TYPE_LABELS: [&str; 12] = [
    "Pistol",
    "Rifle",
    "RifleSwitch",
    "Pristine",
    "Alien",
    "Royal",
    "Robot",
    "Atlas",
    "Staff",
    "StaffAtlas",
    "StaffRuin",
    "StaffBone",
];

fn type_label(value: &Value) -> Option<&'static str> {
    let index = usize::try_from(value.as_i64()?).ok()?;
    TYPE_LABELS.get(index).copied()
}

fn weapon_class_label(resource: &str) -> Option<&'static str> {
    Some(match resource {
        "MODELS/COMMON/WEAPONS/MULTITOOL/ATLASMULTITOOL.SCENE.MBIN" => "Atlas",
        "MODELS/COMMON/WEAPONS/MULTITOOL/SWITCHMULTITOOL.SCENE.MBIN" => "RifleSwitch",
        "MODELS/COMMON/WEAPONS/MULTITOOL/ROYALMULTITOOL.SCENE.MBIN" => "Royal",
        "MODELS/COMMON/WEAPONS/MULTITOOL/SENTINELMULTITOOL.SCENE.MBIN" => "Robot",
        "MODELS/COMMON/WEAPONS/MULTITOOL/STAFFMULTITOOL.SCENE.MBIN" => "Staff",
        "MODELS/COMMON/WEAPONS/MULTITOOL/STAFFMULTITOOLATLAS.SCENE.MBIN" => "StaffAtlas",
        "MODELS/COMMON/WEAPONS/MULTITOOL/STAFFMULTITOOLRUIN.SCENE.MBIN" => "StaffRuin",
        "MODELS/COMMON/WEAPONS/MULTITOOL/STAFFMULTITOOLBONE.SCENE.MBIN" => "StaffBone",
        _ => return None,
    })
}

pub(super) fn default_filename(data: &Map<String, Value>) -> String {
    let Some(multitool) = data.get("Multitool") else {
        return String::new();
    };
    let class = data
        .get("Type")
        .and_then(type_label)
        .or_else(|| {
            resolve_str(multitool, "NTx.93M", "Resource.Filename").and_then(weapon_class_label)
        })
        .unwrap_or("Weapon");
    let inventory_class =
        resolve_str(multitool, "OsQ.B@N.1o6", "Store.Class.InventoryClass").unwrap_or_default();
    let seed = resolve_str(multitool, "@EL[1]", "Seed[1]").unwrap_or_default();
    let slots = resolve_array(multitool, "OsQ.hl?", "Store.ValidSlotIndices")
        .map(|v| count3(v))
        .unwrap_or_default();
    format!("{class}-{inventory_class}-{seed}-{slots}")
}
