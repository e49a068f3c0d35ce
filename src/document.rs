//! Save-document addressing.
//!
//! Documents are order-preserving `serde_json::Value` trees owned by the
//! caller. Every field access in the crate goes through [`resolve`] with a
//! matched pair of path strings: the obfuscated (short-code) path is tried
//! first because it is the common case for the primary save format, then the
//! mapped (human-readable) path. Both paths must address logically equivalent
//! data.

use serde_json::Value;

/// Key-naming schema of a save document.
///
/// Determined once per document and threaded through subsequent writes; reads
/// do not need it because they always try both key sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaMode {
    /// Long, human-readable keys. Identified by a root `Version` field.
    Mapped,
    /// Short, game-version-specific key codes.
    Obfuscated,
}

impl SchemaMode {
    /// Detects the schema of a root document.
    #[must_use]
    pub fn of(document: &Value) -> Self {
        match document.as_object() {
            Some(map) if map.contains_key("Version") => SchemaMode::Mapped,
            _ => SchemaMode::Obfuscated,
        }
    }

    #[must_use]
    pub fn is_mapped(self) -> bool {
        self == SchemaMode::Mapped
    }

    /// Picks the path string matching this schema.
    #[must_use]
    pub fn pick<'a>(self, obfuscated: &'a str, mapped: &'a str) -> &'a str {
        match self {
            SchemaMode::Mapped => mapped,
            SchemaMode::Obfuscated => obfuscated,
        }
    }
}

/// One step of a parsed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Accessor<'a> {
    Key(&'a str),
    Index(usize),
}

/// Parses a dotted/indexed path such as `6f=.F?0[3].wMC` or `WTp[1]`.
///
/// Dots separate object keys; keys may contain any other character (the
/// obfuscated schema uses codes like `r:j` and `hl?`). A segment may carry
/// any number of trailing `[n]` indices, and a bare `[n]` segment indexes the
/// current node directly. Returns `None` on malformed bracket syntax.
fn parse(path: &str) -> Option<Vec<Accessor<'_>>> {
    let mut accessors = Vec::new();
    for segment in path.split('.') {
        let (key, mut rest) = match segment.find('[') {
            Some(at) => (&segment[..at], &segment[at..]),
            None => (segment, ""),
        };
        if !key.is_empty() {
            accessors.push(Accessor::Key(key));
        }
        while !rest.is_empty() {
            if !rest.starts_with('[') {
                return None;
            }
            let close = rest.find(']')?;
            let index = rest[1..close].parse::<usize>().ok()?;
            accessors.push(Accessor::Index(index));
            rest = &rest[close + 1..];
        }
    }
    Some(accessors)
}

/// Looks up a node by path. Absence (missing key, index out of bounds,
/// wrong node type, malformed path) is `None`, never an error.
#[must_use]
pub fn lookup<'a>(node: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = node;
    for accessor in parse(path)? {
        current = match accessor {
            Accessor::Key(key) => current.as_object()?.get(key)?,
            Accessor::Index(index) => current.as_array()?.get(index)?,
        };
    }
    Some(current)
}

/// Mutable variant of [`lookup`].
pub fn lookup_mut<'a>(node: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut current = node;
    for accessor in parse(path)? {
        current = match accessor {
            Accessor::Key(key) => current.as_object_mut()?.get_mut(key)?,
            Accessor::Index(index) => current.as_array_mut()?.get_mut(index)?,
        };
    }
    Some(current)
}

/// Writes `value` at `path`, creating the final object key if necessary.
///
/// Intermediate nodes must already exist; a final array index must be in
/// bounds or point one past the end (append). Returns whether the write
/// happened.
pub fn set(node: &mut Value, path: &str, value: Value) -> bool {
    let Some(accessors) = parse(path) else {
        return false;
    };
    let Some((last, walk)) = accessors.split_last() else {
        return false;
    };

    let mut current = node;
    for accessor in walk {
        current = match accessor {
            Accessor::Key(key) => match current.as_object_mut().and_then(|map| map.get_mut(*key)) {
                Some(next) => next,
                None => return false,
            },
            Accessor::Index(index) => {
                match current.as_array_mut().and_then(|array| array.get_mut(*index)) {
                    Some(next) => next,
                    None => return false,
                }
            }
        };
    }

    match last {
        Accessor::Key(key) => match current.as_object_mut() {
            Some(map) => {
                map.insert((*key).to_string(), value);
                true
            }
            None => false,
        },
        Accessor::Index(index) => match current.as_array_mut() {
            Some(array) if *index < array.len() => {
                array[*index] = value;
                true
            }
            Some(array) if *index == array.len() => {
                array.push(value);
                true
            }
            _ => false,
        },
    }
}

/// Resolves a field through the dual key schema: obfuscated path first,
/// mapped path second.
#[must_use]
pub fn resolve<'a>(node: &'a Value, obfuscated: &str, mapped: &str) -> Option<&'a Value> {
    lookup(node, obfuscated).or_else(|| lookup(node, mapped))
}

/// Deep-clones the node at `path`, if present.
#[must_use]
pub fn clone_at(node: &Value, path: &str) -> Option<Value> {
    lookup(node, path).cloned()
}

pub fn resolve_str<'a>(node: &'a Value, obfuscated: &str, mapped: &str) -> Option<&'a str> {
    resolve(node, obfuscated, mapped).and_then(Value::as_str)
}

pub fn resolve_f64(node: &Value, obfuscated: &str, mapped: &str) -> Option<f64> {
    resolve(node, obfuscated, mapped).and_then(Value::as_f64)
}

pub fn resolve_i64(node: &Value, obfuscated: &str, mapped: &str) -> Option<i64> {
    resolve(node, obfuscated, mapped).and_then(Value::as_i64)
}

pub fn resolve_bool(node: &Value, obfuscated: &str, mapped: &str) -> Option<bool> {
    resolve(node, obfuscated, mapped).and_then(Value::as_bool)
}

pub fn resolve_array<'a>(node: &'a Value, obfuscated: &str, mapped: &str) -> Option<&'a Vec<Value>> {
    resolve(node, obfuscated, mapped).and_then(Value::as_array)
}

/// String-or-number fields rendered as text, numbers in decimal. Used by
/// fingerprints, where only stability matters.
pub fn resolve_stringy(node: &Value, obfuscated: &str, mapped: &str) -> Option<String> {
    match resolve(node, obfuscated, mapped)? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Some identity fields are stored either as a hex string or as a raw
/// integer depending on save age; this normalizes both to the hex form.
#[must_use]
pub fn value_as_hex_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => number.as_i64().map(|raw| format!("{raw:X}")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_schema_mode_from_version_key() {
        assert_eq!(
            SchemaMode::of(&json!({"Version": 4155, "6f=": {}})),
            SchemaMode::Mapped
        );
        assert_eq!(SchemaMode::of(&json!({"6f=": {}})), SchemaMode::Obfuscated);
        assert_eq!(SchemaMode::of(&json!([1, 2])), SchemaMode::Obfuscated);
    }

    #[test]
    fn looks_up_obfuscated_keys_and_indices() {
        let doc = json!({"6f=": {"F?0": [{"wMC": [1.0, -2.0, 3.0]}]}});
        assert_eq!(
            lookup(&doc, "6f=.F?0[0].wMC[2]").and_then(Value::as_f64),
            Some(3.0)
        );
        assert!(lookup(&doc, "6f=.F?0[1]").is_none());
        assert!(lookup(&doc, "6f=.F?0[0].missing").is_none());
    }

    #[test]
    fn bare_index_segment_addresses_arrays() {
        let doc = json!({"kYq": ["0x0", "0xCAFE"]});
        let seed = lookup(&doc, "kYq").unwrap();
        assert_eq!(lookup(seed, "[1]").and_then(Value::as_str), Some("0xCAFE"));
    }

    #[test]
    fn malformed_paths_are_absent_not_errors() {
        let doc = json!({"a": [1]});
        assert!(lookup(&doc, "a[x]").is_none());
        assert!(lookup(&doc, "a[0").is_none());
    }

    #[test]
    fn resolve_prefers_the_obfuscated_path() {
        let doc = json!({"r:j": "obfuscated", "GalacticAddress": "mapped"});
        assert_eq!(
            resolve_str(&doc, "r:j", "GalacticAddress"),
            Some("obfuscated")
        );
        let mapped_only = json!({"GalacticAddress": "mapped"});
        assert_eq!(
            resolve_str(&mapped_only, "r:j", "GalacticAddress"),
            Some("mapped")
        );
    }

    #[test]
    fn set_replaces_array_slots_and_inserts_keys() {
        let mut doc = json!({"6f=": {"Mcl": [{"XID": "old"}]}});
        assert!(set(&mut doc, "6f=.Mcl[0]", json!({"XID": "new"})));
        assert_eq!(
            lookup(&doc, "6f=.Mcl[0].XID").and_then(Value::as_str),
            Some("new")
        );
        assert!(set(&mut doc, "6f=.Mcl[1]", json!({"XID": "appended"})));
        assert_eq!(doc["6f="]["Mcl"].as_array().unwrap().len(), 2);
        assert!(!set(&mut doc, "6f=.Mcl[9]", json!(null)));
        assert!(set(&mut doc, "6f=.fresh", json!(1)));
    }
}
