//! Extraction, deduplication and format translation for collectible entities
//! embedded in game save documents.
//!
//! A save document is one large JSON tree (in either its obfuscated or its
//! mapped key schema); an entity is a small sub-tree inside it: a base, a
//! starship, a companion. This crate pulls those sub-trees out as
//! [`EntityRecord`] snapshots, identifies duplicates through a deterministic
//! fingerprint tag, keeps per-kind collections on disk through [`Registry`],
//! and translates between the three on-disk encodings described by
//! [`Format`]: the encrypted/bare legacy container family, flat v1 JSON and
//! the enveloped v2 JSON.
//!
//! ```no_run
//! use relicvault::{EntityKind, Registry};
//!
//! # fn main() -> relicvault::Result<()> {
//! let ships = Registry::new(EntityKind::Starship, "collection/starships")?;
//! for record in ships.records() {
//!     println!("{} -> {}", record.name(), record.tag());
//! }
//! # Ok(())
//! # }
//! ```

pub mod container;
pub mod document;
mod error;
mod format;
mod kind;
mod record;
mod registry;
pub mod tag;

pub use error::{CollectError, Result};
pub use format::{CONTAINER_EXTENSIONS, Format};
pub use kind::{EntityKind, outfit::register_preset_label};
pub use record::{EntityRecord, PREVIEW_SLOTS};
pub use registry::Registry;
