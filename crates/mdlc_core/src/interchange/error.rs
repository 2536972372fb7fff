use super::EntityKind;
use crate::model::validation::ValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;

/// Envelope could not be turned into drafts; the whole import is aborted.
#[derive(Debug)]
pub enum FormatError {
    /// Document is not valid JSON.
    Json(serde_json::Error),
    /// Top-level JSON value is not an object.
    NotAnObject,
    MissingVersion,
    /// `version` is present but is not schema version 1.
    UnsupportedVersion(String),
    MissingType,
    /// `type` names no known envelope shape.
    UnknownType(String),
    /// Envelope holds a different entity kind than the caller asked for.
    KindMismatch {
        expected: EntityKind,
        found: EntityKind,
    },
    /// Expected object/array field is absent or has the wrong JSON type.
    MissingPayload { field: &'static str },
    /// Payload entry does not match the entity schema.
    InvalidPayload {
        index: Option<usize>,
        source: serde_json::Error,
    },
}

impl Display for FormatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "invalid JSON: {err}"),
            Self::NotAnObject => write!(f, "envelope must be a JSON object"),
            Self::MissingVersion => write!(f, "envelope has no `version` field"),
            Self::UnsupportedVersion(version) => {
                write!(f, "unsupported envelope version {version}")
            }
            Self::MissingType => write!(f, "envelope has no `type` field"),
            Self::UnknownType(tag) => write!(f, "unknown envelope type `{tag}`"),
            Self::KindMismatch { expected, found } => {
                write!(f, "expected {expected} data but the file contains {found} data")
            }
            Self::MissingPayload { field } => {
                write!(f, "envelope is missing the `{field}` field")
            }
            Self::InvalidPayload {
                index: Some(index),
                source,
            } => write!(f, "entry {index} is malformed: {source}"),
            Self::InvalidPayload {
                index: None,
                source,
            } => write!(f, "entry is malformed: {source}"),
        }
    }
}

impl Error for FormatError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) | Self::InvalidPayload { source: err, .. } => Some(err),
            _ => None,
        }
    }
}

/// Failure to import an interchange file from disk.
#[derive(Debug)]
pub enum ImportError {
    /// File could not be read.
    Read { path: PathBuf, source: io::Error },
    /// File was read but its contents are not a valid envelope.
    Format(FormatError),
    /// File name was rejected before reading.
    Validation(ValidationError),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read `{}`: {source}", path.display())
            }
            Self::Format(err) => write!(f, "invalid interchange file: {err}"),
            Self::Validation(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Format(err) => Some(err),
            Self::Validation(err) => Some(err),
        }
    }
}

impl From<FormatError> for ImportError {
    fn from(value: FormatError) -> Self {
        Self::Format(value)
    }
}

impl From<ValidationError> for ImportError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}
