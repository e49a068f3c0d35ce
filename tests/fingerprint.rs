//! Fingerprint determinism across key schemas and input orderings.

use relicvault::{EntityKind, register_preset_label};
use serde_json::{Value, json};

fn obfuscated_save() -> Value {
    json!({
        "6f=": {
            "F?0": [{
                "r:j": "0x1A2B",
                "wMC": [107.5, -12.2, 0.0],
                "NKm": "Outpost",
                "3?K": {"UID": "OWNER-1"}
            }],
            "Mcl": [{
                "XID": "^COWFLOATER",
                "osl": ["^FLOATER", "^COW"],
                "WTp": [true, "0x89EA"],
                "1p=": [true, "0x1"],
                "m9o": [true, "0x2"],
                "JrL": [true, "0x3"],
                "JAy": [0.4, -0.9, 0.0]
            }]
        }
    })
}

fn mapped_save() -> Value {
    // Same entities under the human-readable schema; the root `Version` field
    // is what marks a document as mapped.
    json!({
        "Version": 4155,
        "PlayerStateData": {
            "PersistentPlayerBases": [{
                "GalacticAddress": "0x1A2B",
                "Position": [107.5, -12.2, 0.0],
                "Name": "Outpost",
                "Owner": {"UID": "OWNER-1"}
            }],
            "Pets": [{
                "CreatureID": "^COWFLOATER",
                "Descriptors": ["^FLOATER", "^COW"],
                "CreatureSeed": [true, "0x89EA"],
                "CreatureSecondarySeed": [true, "0x1"],
                "SpeciesSeed": [true, "0x2"],
                "GenusSeed": [true, "0x3"],
                "Traits": [0.4, -0.9, 0.0]
            }]
        }
    })
}

#[test]
fn tags_agree_across_key_schemas() {
    for kind in [EntityKind::Base, EntityKind::Companion] {
        let obfuscated = kind.tag_at(&obfuscated_save(), 0).expect("obfuscated tag");
        let mapped = kind.tag_at(&mapped_save(), 0).expect("mapped tag");
        assert_eq!(obfuscated, mapped, "{kind} tag diverged between schemas");
        assert!(!obfuscated.is_empty());
    }
}

#[test]
fn base_tag_has_the_address_position_shape() {
    let tag = EntityKind::Base.tag_at(&obfuscated_save(), 0).expect("tag");
    assert_eq!(tag, "0X1A2B-108--12-0");
}

#[test]
fn descriptor_order_does_not_change_the_tag() {
    let document = obfuscated_save();
    let mut permuted = document.clone();
    permuted["6f="]["Mcl"][0]["osl"] = json!(["^COW", "^FLOATER"]);

    assert_eq!(
        EntityKind::Companion.tag_at(&document, 0),
        EntityKind::Companion.tag_at(&permuted, 0)
    );
}

#[test]
fn position_changes_change_the_tag() {
    let document = obfuscated_save();
    let mut moved = document.clone();
    moved["6f="]["F?0"][0]["wMC"] = json!([200.0, -12.2, 0.0]);

    assert_ne!(
        EntityKind::Base.tag_at(&document, 0),
        EntityKind::Base.tag_at(&moved, 0)
    );
}

#[test]
fn missing_slots_have_no_tag() {
    assert!(EntityKind::Base.tag_at(&obfuscated_save(), 9).is_none());
    assert!(EntityKind::Starship.tag_at(&obfuscated_save(), 0).is_none());
}

#[test]
fn outfit_presets_label_known_fingerprints() {
    let document = json!({
        "6f=": {
            "l:j": [{"VFd": "^", "wnR": {
                "SMP": ["^SLIM"],
                "Aak": [],
                "T>1": [],
                "gsg": [],
                "unY": 1.0
            }}]
        }
    });

    let raw = EntityKind::Outfit.tag_at(&document, -1).expect("raw tag");
    assert_eq!(raw, "SLIM10");

    // Runtime-registered labels take over from the raw composition.
    register_preset_label("SLIM10", "SLIM_DEFAULT");
    assert_eq!(
        EntityKind::Outfit.tag_at(&document, -1).as_deref(),
        Some("SLIM_DEFAULT")
    );
}
