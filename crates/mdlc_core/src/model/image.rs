//! Image library model.
//!
//! # Invariants
//! - `size` and `mime_type` describe the upload; they are not re-checked
//!   against `data` after creation.
//! - `tags` holds no duplicates and keeps insertion order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for library images.
pub type ImageId = Uuid;

/// One image stored as a self-describing data URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: ImageId,
    pub name: String,
    /// `data:<mime>;base64,<payload>`
    pub data: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "type", alias = "mimeType", default)]
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Image {
    /// Adds tags that are not already present.
    pub fn merge_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            let tag = tag.into();
            if !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
    }
}

/// Image payload as produced by an upload or read from an interchange file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDraft {
    #[serde(default)]
    pub id: Option<ImageId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "type", alias = "mimeType", default)]
    pub mime_type: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ImageDraft {
    /// Builds the stored record under `id`, stamping `updated_at = now`.
    ///
    /// `created_at` comes from the draft, then from `existing_created_at`,
    /// then falls back to `now`.
    pub fn into_image(
        self,
        id: ImageId,
        existing_created_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Image {
        let mut image = Image {
            id,
            name: self.name,
            data: self.data,
            size: self.size,
            mime_type: self.mime_type,
            created_at: self.created_at.or(existing_created_at).unwrap_or(now),
            updated_at: now,
            tags: Vec::new(),
        };
        image.merge_tags(self.tags);
        image
    }
}

impl From<Image> for ImageDraft {
    fn from(image: Image) -> Self {
        Self {
            id: Some(image.id),
            name: image.name,
            data: image.data,
            size: image.size,
            mime_type: image.mime_type,
            created_at: Some(image.created_at),
            tags: image.tags,
        }
    }
}
