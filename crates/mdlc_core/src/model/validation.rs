//! Input validation errors for uploads and file imports.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Content rejected before it reaches a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// File name does not carry the required extension.
    WrongExtension {
        file_name: String,
        expected: &'static str,
    },
    /// Upload MIME type is not on the allow-list.
    UnsupportedMimeType { file_name: String, mime_type: String },
    /// Upload exceeds the configured size ceiling.
    TooLarge {
        file_name: String,
        size: u64,
        max_bytes: u64,
    },
}

impl ValidationError {
    /// Name of the rejected file, for per-file skip reports.
    pub fn file_name(&self) -> &str {
        match self {
            Self::WrongExtension { file_name, .. }
            | Self::UnsupportedMimeType { file_name, .. }
            | Self::TooLarge { file_name, .. } => file_name,
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WrongExtension {
                file_name,
                expected,
            } => write!(f, "`{file_name}` must have a `{expected}` extension"),
            Self::UnsupportedMimeType {
                file_name,
                mime_type,
            } => write!(f, "`{file_name}` has unsupported image type `{mime_type}`"),
            Self::TooLarge {
                file_name,
                size,
                max_bytes,
            } => write!(
                f,
                "`{file_name}` is {size} bytes, larger than the {max_bytes} byte limit"
            ),
        }
    }
}

impl Error for ValidationError {}

/// Checks that `file_name` ends with `extension` (ASCII case-insensitive).
pub fn require_extension(file_name: &str, extension: &'static str) -> Result<(), ValidationError> {
    let lowered = file_name.to_ascii_lowercase();
    if lowered.len() > extension.len() && lowered.ends_with(extension) {
        return Ok(());
    }
    Err(ValidationError::WrongExtension {
        file_name: file_name.to_string(),
        expected: extension,
    })
}

#[cfg(test)]
mod tests {
    use super::{require_extension, ValidationError};

    #[test]
    fn extension_check_is_case_insensitive_and_needs_a_stem() {
        assert!(require_extension("notes.MD", ".md").is_ok());
        assert!(matches!(
            require_extension(".md", ".md"),
            Err(ValidationError::WrongExtension { .. })
        ));
        assert!(matches!(
            require_extension("notes.txt", ".md"),
            Err(ValidationError::WrongExtension { expected: ".md", .. })
        ));
    }
}
