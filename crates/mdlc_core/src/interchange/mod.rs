//! Versioned JSON envelopes for moving items, images and blocks between
//! workspaces (`*.mdlc` files).
//!
//! # Responsibility
//! - Export one or many entities as a pretty-printed envelope plus a safe
//!   download file name.
//! - Parse envelopes back into drafts for the stores' upsert operations.
//!
//! # Invariants
//! - Exactly one schema version exists; anything else is a `FormatError`.
//! - A malformed envelope yields no drafts at all.
//! - Exported entities carry their ids, so re-importing upserts in place.

mod error;
pub mod file_name;

pub use error::{FormatError, ImportError};
pub use file_name::sanitize_file_name;

use crate::model::block::{Block, BlockDraft};
use crate::model::image::{Image, ImageDraft};
use crate::model::item::{Item, ItemDraft};
use crate::model::validation::require_extension;
use chrono::Utc;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Schema version written into every envelope.
pub const ENVELOPE_VERSION: u32 = 1;
/// Extension shared by every interchange file.
pub const INTERCHANGE_EXTENSION: &str = ".mdlc";

const SINGLE_TAG: &str = "single";
const BATCH_TAG: &str = "multiple";
const GENERIC_BATCH_FIELD: &str = "payload";

/// Entity family carried by an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Item,
    Image,
    Block,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Item, EntityKind::Image, EntityKind::Block];

    /// Field holding the entity of a single envelope.
    pub fn single_field(self) -> &'static str {
        match self {
            Self::Item => "item",
            Self::Image => "image",
            Self::Block => "block",
        }
    }

    /// Field holding the array of a batch envelope; also accepted as `type`.
    pub fn batch_field(self) -> &'static str {
        match self {
            Self::Item => "items",
            Self::Image => "images",
            Self::Block => "blocks",
        }
    }

    /// File suffix for single exports, without the leading dot.
    pub fn single_extension(self) -> &'static str {
        match self {
            Self::Item => "item.mdlc",
            Self::Image => "img.mdlc",
            Self::Block => "part.mdlc",
        }
    }

    pub fn batch_extension(self) -> &'static str {
        match self {
            Self::Item => "items.mdlc",
            Self::Image => "imgs.mdlc",
            Self::Block => "parts.mdlc",
        }
    }

    fn single_aliases(self) -> &'static [&'static str] {
        match self {
            Self::Item => &["item", "file"],
            Self::Image => &["image"],
            Self::Block => &["block"],
        }
    }

    fn from_batch_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.batch_field() == tag)
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.single_field())
    }
}

/// Entity that can travel inside an envelope.
pub trait Interchange: Serialize {
    const KIND: EntityKind;
    /// What an import of this entity produces.
    type Draft: DeserializeOwned;

    /// Human name used to derive the download file name.
    fn display_name(&self) -> &str;
}

impl Interchange for Item {
    const KIND: EntityKind = EntityKind::Item;
    type Draft = ItemDraft;

    fn display_name(&self) -> &str {
        &self.name
    }
}

impl Interchange for Image {
    const KIND: EntityKind = EntityKind::Image;
    type Draft = ImageDraft;

    fn display_name(&self) -> &str {
        &self.name
    }
}

impl Interchange for Block {
    const KIND: EntityKind = EntityKind::Block;
    type Draft = BlockDraft;

    fn display_name(&self) -> &str {
        &self.name
    }
}

/// Serialized envelope ready to be offered as a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDocument {
    pub file_name: String,
    pub contents: String,
    pub mime_type: &'static str,
}

impl ExportDocument {
    /// Writes the document into `dir` under its file name.
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> io::Result<PathBuf> {
        let path = dir.as_ref().join(&self.file_name);
        fs::write(&path, &self.contents)?;
        debug!(
            "event=export_write module=interchange status=ok bytes={}",
            self.contents.len()
        );
        Ok(path)
    }
}

/// Wraps one entity in a `single` envelope.
pub fn export_one<E: Interchange>(entity: &E) -> serde_json::Result<ExportDocument> {
    let kind = E::KIND;
    let mut envelope = Map::new();
    envelope.insert("version".to_string(), Value::from(ENVELOPE_VERSION));
    envelope.insert("type".to_string(), Value::from(SINGLE_TAG));
    envelope.insert(kind.single_field().to_string(), serde_json::to_value(entity)?);

    let contents = serde_json::to_string_pretty(&Value::Object(envelope))?;
    let stem = sanitize_file_name(entity.display_name(), kind.single_field());
    debug!("event=export module=interchange status=ok kind={kind} count=1");
    Ok(ExportDocument {
        file_name: format!("{stem}.{}", kind.single_extension()),
        contents,
        mime_type: "application/json",
    })
}

/// Wraps entities in a `multiple` envelope named after `label`.
pub fn export_many<'a, E, I>(entities: I, label: &str) -> serde_json::Result<ExportDocument>
where
    E: Interchange + 'a,
    I: IntoIterator<Item = &'a E>,
{
    let kind = E::KIND;
    let payload = entities
        .into_iter()
        .map(serde_json::to_value)
        .collect::<serde_json::Result<Vec<Value>>>()?;
    let count = payload.len();

    let mut envelope = Map::new();
    envelope.insert("version".to_string(), Value::from(ENVELOPE_VERSION));
    envelope.insert("type".to_string(), Value::from(BATCH_TAG));
    envelope.insert("exportedAt".to_string(), Value::from(Utc::now().to_rfc3339()));
    envelope.insert("count".to_string(), Value::from(count));
    envelope.insert(kind.batch_field().to_string(), Value::Array(payload));

    let contents = serde_json::to_string_pretty(&Value::Object(envelope))?;
    let stem = sanitize_file_name(label, kind.batch_field());
    debug!("event=export module=interchange status=ok kind={kind} count={count}");
    Ok(ExportDocument {
        file_name: format!("{stem}.{}", kind.batch_extension()),
        contents,
        mime_type: "application/json",
    })
}

/// Parses an envelope of `E` entities into drafts.
///
/// Accepts `single` and batch (`multiple` or the plural kind name) shapes.
/// A `kind` field is read when `type` is absent, and a batch may carry its
/// array under `payload`.
pub fn import_document<E: Interchange>(raw: &str) -> Result<Vec<E::Draft>, FormatError> {
    let expected = E::KIND;
    let mut envelope = parse_envelope(raw)?;
    let shape = envelope_shape(&envelope)?;

    let drafts = match shape {
        Shape::Single => {
            let payload = take_single(&mut envelope, expected)?;
            let draft = serde_json::from_value(payload)
                .map_err(|source| FormatError::InvalidPayload { index: None, source })?;
            vec![draft]
        }
        Shape::Batch(Some(found)) if found != expected => {
            return Err(FormatError::KindMismatch { expected, found });
        }
        Shape::Batch(_) => take_batch(&mut envelope, expected)?
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                serde_json::from_value(entry).map_err(|source| FormatError::InvalidPayload {
                    index: Some(index),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
    };

    if let Some(count) = envelope.get("count").and_then(Value::as_u64) {
        if count != drafts.len() as u64 {
            warn!(
                "event=import module=interchange status=count_mismatch kind={expected} declared={count} actual={}",
                drafts.len()
            );
        }
    }
    debug!(
        "event=import module=interchange status=ok kind={expected} count={}",
        drafts.len()
    );
    Ok(drafts)
}

/// Reports which entity kind an envelope carries without decoding it.
pub fn sniff_kind(raw: &str) -> Result<EntityKind, FormatError> {
    let envelope = parse_envelope(raw)?;
    match envelope_shape(&envelope)? {
        Shape::Batch(Some(kind)) => Ok(kind),
        Shape::Single => EntityKind::ALL
            .into_iter()
            .find(|kind| {
                kind.single_aliases()
                    .iter()
                    .any(|field| envelope.get(*field).is_some_and(Value::is_object))
            })
            .ok_or(FormatError::MissingPayload { field: "item" }),
        Shape::Batch(None) => EntityKind::ALL
            .into_iter()
            .find(|kind| envelope.get(kind.batch_field()).is_some_and(Value::is_array))
            .ok_or(FormatError::MissingPayload { field: "items" }),
    }
}

/// Reads an `.mdlc` file and parses it as an envelope of `E` entities.
pub fn import_file<E: Interchange>(path: impl AsRef<Path>) -> Result<Vec<E::Draft>, ImportError> {
    let path = path.as_ref();
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    require_extension(&file_name, INTERCHANGE_EXTENSION)?;

    let raw = fs::read_to_string(path).map_err(|source| ImportError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(import_document::<E>(&raw)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Single,
    /// Batch, with the kind when the tag names one.
    Batch(Option<EntityKind>),
}

fn parse_envelope(raw: &str) -> Result<Map<String, Value>, FormatError> {
    let value: Value = serde_json::from_str(raw).map_err(FormatError::Json)?;
    let Value::Object(envelope) = value else {
        return Err(FormatError::NotAnObject);
    };
    check_version(&envelope)?;
    Ok(envelope)
}

fn check_version(envelope: &Map<String, Value>) -> Result<(), FormatError> {
    let version = envelope.get("version").ok_or(FormatError::MissingVersion)?;
    let supported = match version {
        Value::Number(number) => {
            number.as_u64() == Some(u64::from(ENVELOPE_VERSION))
                || number.as_f64() == Some(f64::from(ENVELOPE_VERSION))
        }
        Value::String(text) => matches!(text.trim(), "1" | "1.0"),
        _ => false,
    };
    if supported {
        Ok(())
    } else {
        Err(FormatError::UnsupportedVersion(version.to_string()))
    }
}

fn envelope_shape(envelope: &Map<String, Value>) -> Result<Shape, FormatError> {
    let tag = envelope
        .get("type")
        .or_else(|| envelope.get("kind"))
        .ok_or(FormatError::MissingType)?;
    let Some(tag) = tag.as_str() else {
        return Err(FormatError::UnknownType(tag.to_string()));
    };

    match tag {
        SINGLE_TAG => Ok(Shape::Single),
        BATCH_TAG => Ok(Shape::Batch(None)),
        other => EntityKind::from_batch_tag(other)
            .map(|kind| Shape::Batch(Some(kind)))
            .ok_or_else(|| FormatError::UnknownType(other.to_string())),
    }
}

fn take_single(
    envelope: &mut Map<String, Value>,
    expected: EntityKind,
) -> Result<Value, FormatError> {
    for field in expected.single_aliases() {
        if let Some(payload) = envelope.remove(*field) {
            if payload.is_object() {
                return Ok(payload);
            }
            return Err(FormatError::MissingPayload {
                field: expected.single_field(),
            });
        }
    }

    if let Some(found) = other_kinds(expected).find(|kind| {
        kind.single_aliases()
            .iter()
            .any(|field| envelope.contains_key(*field))
    }) {
        return Err(FormatError::KindMismatch { expected, found });
    }
    Err(FormatError::MissingPayload {
        field: expected.single_field(),
    })
}

fn take_batch(
    envelope: &mut Map<String, Value>,
    expected: EntityKind,
) -> Result<Vec<Value>, FormatError> {
    let payload = envelope
        .remove(expected.batch_field())
        .or_else(|| envelope.remove(GENERIC_BATCH_FIELD));

    match payload {
        Some(Value::Array(entries)) => Ok(entries),
        Some(_) => Err(FormatError::MissingPayload {
            field: expected.batch_field(),
        }),
        None => {
            if let Some(found) =
                other_kinds(expected).find(|kind| envelope.contains_key(kind.batch_field()))
            {
                return Err(FormatError::KindMismatch { expected, found });
            }
            Err(FormatError::MissingPayload {
                field: expected.batch_field(),
            })
        }
    }
}

fn other_kinds(expected: EntityKind) -> impl Iterator<Item = EntityKind> {
    EntityKind::ALL
        .into_iter()
        .filter(move |kind| *kind != expected)
}
