//! Appearance outfits. The active character customisation lives in a fixed
//! slot addressed with a negative index; stored outfits sit in their own
//! array. Well-known presets fingerprint to a stable label instead of the
//! raw composed tag.

use std::sync::{PoisonError, RwLock};

use serde_json::{Map, Value};

use crate::document::{
    self, SchemaMode, clone_at, resolve, resolve_array, resolve_f64, resolve_str,
};
use crate::error::Result;
use crate::record::{EntityRecord, malformed};
use crate::tag::{TagBuilder, concat_colours, concat_ordered, fmt_scale};

fn slot_path(mode: SchemaMode, index: i64) -> String {
    match mode {
        SchemaMode::Mapped if index < 0 => {
            "PlayerStateData.CharacterCustomisationData[0].CustomData".to_string()
        }
        SchemaMode::Mapped => format!("PlayerStateData.Outfits[{index}]"),
        SchemaMode::Obfuscated if index < 0 => "6f=.l:j[0].wnR".to_string(),
        SchemaMode::Obfuscated => format!("6f=.cf5[{index}]"),
    }
}

const SELECTED_PRESET: (&str, &str) = (
    "6f=.l:j[0].VFd",
    "PlayerStateData.CharacterCustomisationData[0].SelectedPreset",
);

pub(super) fn extract(document: &Value, index: i64) -> Option<Map<String, Value>> {
    let outfit = clone_at(document, &slot_path(SchemaMode::of(document), index))?;
    let mut data = Map::new();
    data.insert("Outfit".into(), outfit);
    Some(data)
}

/// Sorted descriptor groups, colours, texture options ordered by group name,
/// per-bone scales and the overall scale, then the preset label when the
/// composed string matches a known preset.
pub(super) fn tag(data: &Map<String, Value>) -> String {
    let mut builder = TagBuilder::new();
    if let Some(outfit) = data.get("Outfit") {
        builder.push_owned(
            resolve_array(outfit, "SMP", "DescriptorGroups").map(|d| concat_ordered(d)),
        );
        builder.push_owned(resolve_array(outfit, "Aak", "Colours").map(|c| concat_colours(c)));
        if let Some(textures) = resolve_array(outfit, "T>1", "TextureOptions") {
            let mut textures: Vec<&Value> = textures.iter().collect();
            textures.sort_by(|a, b| {
                resolve_str(a, "@6c", "TextureOptionGroupName")
                    .cmp(&resolve_str(b, "@6c", "TextureOptionGroupName"))
            });
            for texture in textures {
                builder.push_opt(resolve_str(texture, "@6c", "TextureOptionGroupName"));
                builder.push_opt(resolve_str(texture, "=Cv", "TextureOptionName"));
            }
        }
        if let Some(bones) = resolve_array(outfit, "gsg", "BoneScales") {
            for bone in bones {
                builder.push_owned(resolve_f64(bone, "unY", "Scale").map(fmt_scale));
            }
        }
        builder.push_owned(resolve_f64(outfit, "unY", "Scale").map(fmt_scale));
    }
    let raw = builder.finish();
    preset_label(&raw).unwrap_or(raw)
}

/// Fingerprints a slot still inside a save document. A negative index reads
/// the selected preset first: a named preset is its own fingerprint, and an
/// `OUTFITn` value redirects to the corresponding stored outfit slot.
pub(super) fn tag_at(document: &Value, mut index: i64) -> Option<String> {
    if index < 0 {
        let preset = resolve(document, SELECTED_PRESET.0, SELECTED_PRESET.1)
            .and_then(Value::as_str)
            .filter(|preset| *preset != "^")
            .map(|preset| preset.replace('^', ""));
        if let Some(preset) = preset {
            if !preset.starts_with("OUTFIT") {
                return Some(preset);
            }
            let digit = preset.chars().last().and_then(|c| c.to_digit(10))?;
            index = i64::from(digit) - 1;
        }
    }
    extract(document, index).map(|data| tag(&data))
}

/// Writing into the active slot also clears the selected preset, so the game
/// picks up the custom data.
pub(super) fn reinsert(record: &EntityRecord, document: &mut Value, index: i64) -> Result<()> {
    let mode = SchemaMode::of(document);
    if let Some(outfit) = record.data.get("Outfit").filter(|v| !v.is_null()) {
        if !document::set(document, &slot_path(mode, index), outfit.clone()) {
            return Err(malformed(format!("no outfit slot at index {index}")));
        }
        if index < 0 {
            let preset_path = mode.pick(SELECTED_PRESET.0, SELECTED_PRESET.1);
            document::set(document, preset_path, Value::String("^".into()));
        }
    }
    Ok(())
}

pub(super) fn default_filename(data: &Map<String, Value>) -> String {
    let Some(outfit) = data.get("Outfit") else {
        return String::new();
    };
    resolve_array(outfit, "SMP", "DescriptorGroups")
        .map(|groups| {
            groups
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join("_")
        })
        .unwrap_or_default()
        .replace('^', "")
}

// Composed tags of the four starting-appearance presets.
const PRESET_START_01: &str = "ARMOURASTROASTRONAUTBASEBACKPACKVANILLBOOTSASTROCAPENULLGLOVESASTROLEGSASTROTORSOASTROHEADFF8400A1FFFFFFA2FFFFFFTORSOFF8400A13C90DDA23C90DDARMOUR3C90DDA1000000A2000000BACKPACKFF8400A1000000A2FFFFFFHANDSFF8400A1000000A2000000LEGSFF8400A1DD6767A2000000FEETFF8400A1000000A2000000ARMOURASTROCHESTARMOUR0BACKPACKBACKPACK0BOOTSASTROBOOTS0GLOVESASTROGLOVES0HEADASTROHELMET0LEGSASTROLEGS0TORSOASTROTORSO000000010";
const PRESET_START_02: &str = "ARMOURASTROASTRONAUTBASEASTROHEAD9BACKPACKVANILLBOOTSASTROCAPENULLGLOVESASTROLEGSASTROTORSOASTROHEAD3B4A66A1C09D70A2000000TORSO3B4A66A13C90DDA2C09D70ARMOURC09D70A1000000A2000000BACKPACK3B4A66A1C09D70A2C09D70HANDS3B4A66A1C09D70A2C09D70LEGS3B4A66A13B4A66A2C09D70FEET3B4A66A1C09D70A2C09D70ARMOURASTROCHESTARMOUR2BACKPACKBACKPACK1BOOTSASTROBOOTS0GLOVESASTROGLOVES3HEADASTROHELMET3LEGSASTROLEGS0TORSOASTROTORSO000000010";
const PRESET_START_03: &str = "ARMOURASTROASTRONAUTBASEASTROHEAD9BACKPACKVANILLBOOTSASTROCAPENULLGLOVESASTROLEGSASTROTORSOASTROHEADAAAAAAA1895D47A2803939TORSOFFFFFFA1AAAAAAA23B4A66ARMOUR895D47A14B4B4BA2000000BACKPACKAAAAAAA1895D47A23C90DDHANDSFFFFFFA13B4A66A23B4A66LEGSFFFFFFA14B4B4BA2000000FEETFFFFFFA1895D47A2895D47ARMOURASTROCHESTARMOUR0BACKPACKBACKPACK2BOOTSASTROBOOTS1GLOVESASTROGLOVES0HEADASTROHELMET0LEGSASTROLEGS1TORSOASTROTORSO300000010";
const PRESET_START_04: &str = "ARMOURASTROASTRONAUTBASEASTROHEAD6BACKPACKVANILLBOOTSASTROCAPENULLGLOVESASTROLEGSASTROTORSOASTROHEADDD6767A1000000A2FFFFFFTORSODD6767A1000000A2000000ARMOUR000000A1000000A2000000BACKPACKDD6767A1000000A2C09D70HANDSDD6767A13D7A57A2000000LEGSDD6767A1C09D70A2000000FEETDD6767A1C09D70A2C09D70ARMOURASTROCHESTARMOUR0BACKPACKBACKPACK0BOOTSASTROBOOTS0GLOVESASTROGLOVES0HEADASTROHELMET0LEGSASTROLEGS0TORSOASTROTORSO000000010";

const BUILTIN_PRESETS: [(&str, &str); 4] = [
    (PRESET_START_01, "START_01"),
    (PRESET_START_02, "START_02"),
    (PRESET_START_03, "START_03"),
    (PRESET_START_04, "START_04"),
];

static EXTRA_PRESETS: RwLock<Vec<(String, String)>> = RwLock::new(Vec::new());

/// Registers an additional composed-tag to preset-label mapping. Later
/// registrations win over earlier ones for the same tag.
pub fn register_preset_label(tag: impl Into<String>, label: impl Into<String>) {
    EXTRA_PRESETS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .push((tag.into(), label.into()));
}

fn preset_label(raw: &str) -> Option<String> {
    let extra = EXTRA_PRESETS.read().unwrap_or_else(PoisonError::into_inner);
    if let Some((_, label)) = extra.iter().rev().find(|(tag, _)| tag == raw) {
        return Some(label.clone());
    }
    drop(extra);
    BUILTIN_PRESETS
        .iter()
        .find(|(tag, _)| *tag == raw)
        .map(|(_, label)| (*label).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outfit_value() -> Value {
        json!({
            "SMP": ["^BULKY", "^ARMOUR"],
            "Aak": [],
            "T>1": [
                {"@6c": "HEAD", "=Cv": "HEAD_A"},
                {"@6c": "ARMOUR", "=Cv": "ARM_1"}
            ],
            "gsg": [{"unY": 1.0}, {"unY": 0.5}],
            "unY": 1.2
        })
    }

    fn save_document() -> Value {
        json!({
            "6f=": {
                "l:j": [{"VFd": "^", "wnR": outfit_value()}],
                "cf5": [outfit_value()]
            }
        })
    }

    #[test]
    fn tag_orders_groups_and_textures() {
        let data = extract(&save_document(), -1).unwrap();
        assert_eq!(tag(&data), "ARMOURBULKYARMOURARM1HEADHEADA100512");
    }

    #[test]
    fn negative_index_reads_the_active_customisation() {
        let document = save_document();
        assert_eq!(tag_at(&document, -1), tag_at(&document, 0));
    }

    #[test]
    fn named_preset_is_its_own_fingerprint() {
        let mut document = save_document();
        document["6f="]["l:j"][0]["VFd"] = json!("^SOME_PRESET");
        assert_eq!(tag_at(&document, -1).as_deref(), Some("SOME_PRESET"));
    }

    #[test]
    fn outfit_preset_redirects_to_the_stored_slot() {
        let mut document = save_document();
        document["6f="]["l:j"][0]["VFd"] = json!("^OUTFIT1");
        assert_eq!(tag_at(&document, -1), tag_at(&document, 0));
    }

    #[test]
    fn registered_labels_replace_the_raw_tag() {
        let mut document = save_document();
        document["6f="]["cf5"][0]["unY"] = json!(2.0);
        let data = extract(&document, 0).unwrap();

        assert_eq!(tag(&data), "ARMOURBULKYARMOURARM1HEADHEADA100520");
        register_preset_label("ARMOURBULKYARMOURARM1HEADHEADA100520", "TEST_LOOK");
        assert_eq!(tag(&data), "TEST_LOOK");
    }

    #[test]
    fn reinsert_into_the_active_slot_clears_the_preset() {
        let mut document = save_document();
        document["6f="]["l:j"][0]["VFd"] = json!("^SOME_PRESET");

        let mut record = EntityRecord::new(crate::kind::EntityKind::Outfit);
        record.data = extract(&save_document(), 0).unwrap();
        reinsert(&record, &mut document, -1).unwrap();

        assert_eq!(document["6f="]["l:j"][0]["VFd"], json!("^"));
        assert!(!document["6f="]["l:j"][0]["wnR"].is_null());
    }

    #[test]
    fn default_filename_joins_descriptor_groups() {
        let data = extract(&save_document(), -1).unwrap();
        assert_eq!(default_filename(&data), "BULKY_ARMOUR");
    }
}
