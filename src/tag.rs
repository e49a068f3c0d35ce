//! Fingerprint (tag) primitives.
//!
//! A tag is built by concatenating, in a fixed per-kind field order, values
//! chosen to be stable across re-saves yet volatile across distinct objects,
//! then filtering the result down to letters, digits, `+` and `-` and
//! upper-casing it. Unordered collections are sorted before concatenation so
//! array-ordering differences between save writers do not change the tag, and
//! floating point values are formatted at fixed precision so representation
//! noise does not either.

use serde_json::Value;

use crate::document::{resolve_f64, resolve_str};

/// Accumulates tag fragments; [`TagBuilder::finish`] applies the
/// alphanumeric filter.
#[derive(Debug, Default)]
pub struct TagBuilder {
    buf: String,
}

impl TagBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: &str) -> &mut Self {
        self.buf.push_str(fragment);
        self
    }

    /// Absent optional inputs contribute nothing (they are not an error).
    pub fn push_opt(&mut self, fragment: Option<&str>) -> &mut Self {
        if let Some(fragment) = fragment {
            self.buf.push_str(fragment);
        }
        self
    }

    pub fn push_owned(&mut self, fragment: Option<String>) -> &mut Self {
        if let Some(fragment) = fragment {
            self.buf.push_str(&fragment);
        }
        self
    }

    #[must_use]
    pub fn finish(self) -> String {
        alphanumeric(&self.buf)
    }
}

/// Retains letters, digits, `+` and `-`, upper-cased.
#[must_use]
pub fn alphanumeric(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '+' || *c == '-')
        .flat_map(char::to_uppercase)
        .collect()
}

/// Formats a JSON number the way display strings elsewhere expect: integers
/// without a fractional part, everything else in shortest decimal form.
fn fmt_number(value: &Value) -> Option<String> {
    if let Some(int) = value.as_i64() {
        return Some(int.to_string());
    }
    value.as_f64().map(|float| float.to_string())
}

fn fmt_scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => fmt_number(other).unwrap_or_default(),
    }
}

/// Signed integer-rounded concatenation: every element is rounded to the
/// nearest integer and prefixed with `-`, so negatives read `--n`. Used for
/// position/trait vectors.
#[must_use]
pub fn concat_signed(values: &[Value]) -> String {
    values
        .iter()
        .filter_map(Value::as_f64)
        .map(|v| format!("-{}", v.round() as i64))
        .collect()
}

/// Concatenation of elements in sorted order; makes the contribution
/// invariant to the array order the save writer happened to emit.
#[must_use]
pub fn concat_ordered(values: &[Value]) -> String {
    let mut parts: Vec<String> = values.iter().map(fmt_scalar).collect();
    parts.sort();
    parts.concat()
}

/// Raw scalar concatenation, without the alphanumeric filter. Used where a
/// tag is the data itself (a song's sample array) rather than derived fields.
#[must_use]
pub fn concat_values(values: &[Value]) -> String {
    values.iter().map(fmt_scalar).collect()
}

/// Concatenation of the `Value` field of each stat entry.
#[must_use]
pub fn concat_stats(values: &[Value]) -> String {
    values
        .iter()
        .filter_map(|entry| resolve_f64(entry, ">MX", "Value"))
        .map(|v| Value::from(v))
        .filter_map(|v| fmt_number(&v))
        .collect()
}

/// Colour-palette encoding: per colour entry, a palette discriminator
/// followed by the RGB triple scaled to bytes and rendered as upper-case hex.
#[must_use]
pub fn concat_colours(values: &[Value]) -> String {
    let mut out = String::new();
    for colour in values {
        match resolve_str(colour, "RVl.Ty=", "Palette.ColourAlt") {
            Some("Primary") => {
                if let Some(palette) = resolve_str(colour, "RVl.RVl", "Palette.Palette") {
                    out.push_str(palette.rsplit('_').next().unwrap_or(palette));
                }
            }
            Some(alt) => {
                let mut chars = alt.chars();
                if let (Some(first), Some(last)) = (chars.next(), alt.chars().next_back()) {
                    out.push(first);
                    out.push(last);
                }
            }
            None => {}
        }
        for channel in 0..3 {
            let obfuscated = format!("xEg[{channel}]");
            let mapped = format!("Colour[{channel}]");
            let scaled = resolve_f64(colour, &obfuscated, &mapped)
                .map(|v| (255.0 * v) as i64)
                .unwrap_or(0);
            out.push_str(&format!("{scaled:02X}"));
        }
    }
    out
}

/// Fixed three-digit element count, the inventory-size contribution.
#[must_use]
pub fn count3(values: &[Value]) -> String {
    format!("{:03}", values.len())
}

/// Fixed one-decimal formatting for scale values.
#[must_use]
pub fn fmt_scale(value: f64) -> String {
    format!("{value:.1}")
}

/// Short resource name from a scene path, e.g.
/// `MODELS/.../FIGHTER_PROC.SCENE.MBIN` becomes `FIGHTER_PROC`.
#[must_use]
pub fn resource_name(filename: &str) -> String {
    let last = filename.rsplit('/').next().unwrap_or(filename);
    last.split('.').next().unwrap_or(last).to_string()
}

/// Galaxy number encoded in characters 6..8 of a hex universe address.
#[must_use]
pub fn galaxy_number(address: &str) -> Option<i64> {
    let slice = address.get(6..8)?;
    i64::from_str_radix(slice, 16).ok()
}

/// Portal-glyph rendering of a hex universe address: the galaxy byte is
/// dropped and the leading `0x` stripped. Addresses too short, or not
/// sliceable at those byte offsets, render empty; they come from files and
/// are not trusted to be ASCII.
#[must_use]
pub fn glyphs_string(address: &str) -> String {
    let (Some(head), Some(tail)) = (address.get(..6), address.get(8..)) else {
        return String::new();
    };
    let mut without_galaxy = String::with_capacity(address.len() - 2);
    without_galaxy.push_str(head);
    without_galaxy.push_str(tail);
    without_galaxy.chars().skip(2).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn alphanumeric_filters_and_uppercases() {
        assert_eq!(alphanumeric("0x1A2b^_ -+3"), "0X1A2B-+3");
    }

    #[test]
    fn signed_concat_rounds_and_prefixes() {
        let values = vec![json!(1.0), json!(-2.4), json!(3.5)];
        assert_eq!(concat_signed(&values), "-1--2-4");
    }

    #[test]
    fn ordered_concat_is_permutation_invariant() {
        let a = vec![json!("TAIL"), json!("HEAD"), json!("WING")];
        let b = vec![json!("WING"), json!("TAIL"), json!("HEAD")];
        assert_eq!(concat_ordered(&a), concat_ordered(&b));
        assert_eq!(concat_ordered(&a), "HEADTAILWING");
    }

    #[test]
    fn value_concat_keeps_order_and_skips_the_filter() {
        let values = vec![json!(16), json!(22), json!(3), json!(7)];
        assert_eq!(concat_values(&values), "162237");
    }

    #[test]
    fn stat_concat_drops_trailing_integer_zeros() {
        let values = vec![json!({">MX": 1.0}), json!({"Value": 0.5})];
        assert_eq!(concat_stats(&values), "10.5");
    }

    #[test]
    fn colour_concat_encodes_palette_and_rgb() {
        let values = vec![json!({
            "RVl": {"Ty=": "Primary", "RVl": "Paint_Main"},
            "xEg": [1.0, 0.0, 0.501]
        })];
        assert_eq!(concat_colours(&values), "MainFF007F");

        let alt = vec![json!({
            "Palette": {"ColourAlt": "Alternative1"},
            "Colour": [0.0, 0.0, 0.0]
        })];
        assert_eq!(concat_colours(&alt), "A1000000");
    }

    #[test]
    fn resource_name_strips_path_and_suffixes() {
        assert_eq!(
            resource_name("MODELS/COMMON/SPACECRAFT/FIGHTERS/FIGHTER_PROC.SCENE.MBIN"),
            "FIGHTER_PROC"
        );
    }

    #[test]
    fn galaxy_helpers_slice_hex_addresses() {
        assert_eq!(galaxy_number("0x7E2A010899BA1"), Some(1));
        assert_eq!(glyphs_string("0x7E2A010899BA1"), "7E2A0899BA1");
        assert_eq!(galaxy_number("0x1"), None);
    }

    #[test]
    fn galaxy_helpers_survive_non_ascii_addresses() {
        // Addresses come from files; a multi-byte char straddling the slice
        // offsets must render empty, not panic.
        assert_eq!(glyphs_string("a€€€xy"), "");
        assert_eq!(glyphs_string("€"), "");
        assert_eq!(galaxy_number("abc€€xyz"), None);
    }
}
