//! Image upload validation and encoding.
//!
//! # Responsibility
//! - Check each candidate against the MIME allow-list and size ceiling.
//! - Encode accepted bytes as base64 data URIs ready for the image library.
//!
//! # Invariants
//! - One rejected candidate never aborts the batch.
//! - Accepted drafts keep input order.

use crate::config::ImageUploadLimits;
use crate::model::image::ImageDraft;
use crate::model::validation::ValidationError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::{debug, warn};

/// Raw upload as handed over by the host (file picker, drop zone, CLI).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCandidate {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Outcome of one upload batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadBatch {
    pub accepted: Vec<ImageDraft>,
    /// One entry per rejected candidate, in input order.
    pub skipped: Vec<ValidationError>,
}

/// Checks one candidate without encoding it.
pub fn validate_upload(
    candidate: &UploadCandidate,
    limits: &ImageUploadLimits,
) -> Result<(), ValidationError> {
    if !limits.allows(&candidate.mime_type) {
        return Err(ValidationError::UnsupportedMimeType {
            file_name: candidate.file_name.clone(),
            mime_type: candidate.mime_type.clone(),
        });
    }
    let size = candidate.bytes.len() as u64;
    if size > limits.max_bytes {
        return Err(ValidationError::TooLarge {
            file_name: candidate.file_name.clone(),
            size,
            max_bytes: limits.max_bytes,
        });
    }
    Ok(())
}

/// Validates and encodes a batch, collecting rejections instead of failing.
pub fn prepare_uploads(
    candidates: impl IntoIterator<Item = UploadCandidate>,
    limits: &ImageUploadLimits,
) -> UploadBatch {
    let mut batch = UploadBatch::default();
    for candidate in candidates {
        if let Err(err) = validate_upload(&candidate, limits) {
            warn!("event=image_upload module=upload status=skipped reason=\"{err}\"");
            batch.skipped.push(err);
            continue;
        }

        let mime_type = candidate.mime_type.trim().to_ascii_lowercase();
        batch.accepted.push(ImageDraft {
            data: encode_data_uri(&mime_type, &candidate.bytes),
            size: candidate.bytes.len() as u64,
            name: candidate.file_name,
            mime_type,
            ..ImageDraft::default()
        });
    }

    debug!(
        "event=image_upload module=upload status=ok accepted={} skipped={}",
        batch.accepted.len(),
        batch.skipped.len()
    );
    batch
}

/// `data:<mime>;base64,<payload>`
pub fn encode_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
}

/// Splits a base64 data URI into its MIME type and decoded bytes.
pub fn decode_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime_type = header.strip_suffix(";base64")?;
    let bytes = STANDARD.decode(payload.trim()).ok()?;
    Some((mime_type.to_string(), bytes))
}

/// Human-readable size with binary units, e.g. `1.5 KB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::{decode_data_uri, encode_data_uri, format_file_size};

    #[test]
    fn data_uri_carries_mime_and_base64_payload() {
        let uri = encode_data_uri("image/png", b"png!");
        assert_eq!(uri, "data:image/png;base64,cG5nIQ==");

        let (mime, bytes) = decode_data_uri(&uri).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, b"png!");
        assert!(decode_data_uri("https://example.com/a.png").is_none());
    }

    #[test]
    fn sizes_use_binary_units_and_drop_trailing_zeros() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(500), "500 B");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5 MB");
    }
}
