//! File encodings and their detection.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// The three interchangeable on-disk encodings of a collected entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    /// Extension-routed legacy family: an encrypted frame for bases, a bare
    /// JSON sub-tree for the other kinds that have one.
    Container,
    /// Flat JSON with `"FileVersion":1` and kind-specific top-level fields.
    JsonV1,
    /// Enveloped JSON with `"FileVersion":2`, sub-trees under `Data`,
    /// previews and bookkeeping alongside.
    JsonV2,
}

/// Extensions that route straight to the container decoder, bypassing text
/// sniffing. Everything else is read as text first.
pub const CONTAINER_EXTENSIONS: [&str; 5] = ["fb3", "pb3", "pet", "sh0", "wp0"];

impl Format {
    /// Detects the encoding of a file by its path alone; `None` means the
    /// content has to be sniffed.
    #[must_use]
    pub fn of_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?;
        CONTAINER_EXTENSIONS
            .iter()
            .any(|known| extension.eq_ignore_ascii_case(known))
            .then_some(Format::Container)
    }

    /// Detects a JSON encoding by its version marker. Deliberately a substring
    /// probe, not a parse: the marker sits in compact serializer output and a
    /// probe keeps unreadable files from costing a full parse.
    #[must_use]
    pub fn sniff_text(text: &str) -> Option<Self> {
        if text.contains("\"FileVersion\":1") {
            Some(Format::JsonV1)
        } else if text.contains("\"FileVersion\":2") {
            Some(Format::JsonV2)
        } else {
            None
        }
    }

    /// Detects the encoding of raw bytes: container magic first, then the
    /// text markers.
    #[must_use]
    pub fn sniff_bytes(bytes: &[u8]) -> Option<Self> {
        if crate::container::is_container(bytes) {
            return Some(Format::Container);
        }
        Format::sniff_text(std::str::from_utf8(bytes).ok()?)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Container => "container",
            Format::JsonV1 => "json-v1",
            Format::JsonV2 => "json-v2",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_extensions_route_by_path() {
        assert_eq!(
            Format::of_path(Path::new("dir/FIGHTER.sh0")),
            Some(Format::Container)
        );
        assert_eq!(
            Format::of_path(Path::new("BASE.PB3")),
            Some(Format::Container)
        );
        assert_eq!(Format::of_path(Path::new("dir/SHIP.shp")), None);
        assert_eq!(Format::of_path(Path::new("noext")), None);
    }

    #[test]
    fn version_markers_pick_the_json_encoding() {
        assert_eq!(
            Format::sniff_text(r#"{"FileVersion":1,"Thumbnail":null}"#),
            Some(Format::JsonV1)
        );
        assert_eq!(
            Format::sniff_text(r#"{"Data":{},"FileVersion":2}"#),
            Some(Format::JsonV2)
        );
        assert_eq!(Format::sniff_text(r#"{"FileVersion":3}"#), None);
    }

    #[test]
    fn byte_sniffing_prefers_the_magic() {
        assert_eq!(Format::sniff_bytes(b"NMSB\x00\x04rest"), Some(Format::Container));
        assert_eq!(
            Format::sniff_bytes(br#"{"FileVersion":2}"#),
            Some(Format::JsonV2)
        );
        assert_eq!(Format::sniff_bytes(&[0xFF, 0xFE, 0x00]), None);
    }
}
