//! File tree item model.
//!
//! # Responsibility
//! - Define the file/folder tagged union stored by the file tree.
//! - Provide constructors for freshly created and imported items.
//!
//! # Invariants
//! - `id` and `created_at` never change after creation.
//! - `parent_id == None` means the item lives at the workspace root.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for files and folders.
pub type ItemId = Uuid;

/// Kind-specific payload of one tree item.
///
/// Serialized inline with the owning [`Item`] under a `type` tag, so a file
/// reads `{"type": "file", "content": "..."}` and a folder `{"type": "folder"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemKind {
    /// Markdown document.
    File {
        #[serde(default)]
        content: String,
    },
    /// Container for other items.
    Folder,
}

/// One node of the workspace file tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    /// Containing folder, `None` for root-level items.
    #[serde(default)]
    pub parent_id: Option<ItemId>,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: ItemKind,
}

impl Item {
    /// Creates a file item with a generated id.
    pub fn new_file(
        name: impl Into<String>,
        content: impl Into<String>,
        parent_id: Option<ItemId>,
    ) -> Self {
        Self {
            id: super::new_id(),
            name: name.into(),
            parent_id,
            created_at: Utc::now(),
            kind: ItemKind::File {
                content: content.into(),
            },
        }
    }

    /// Creates a folder item with a generated id.
    pub fn new_folder(name: impl Into<String>, parent_id: Option<ItemId>) -> Self {
        Self {
            id: super::new_id(),
            name: name.into(),
            parent_id,
            created_at: Utc::now(),
            kind: ItemKind::Folder,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, ItemKind::File { .. })
    }

    pub fn is_folder(&self) -> bool {
        matches!(self.kind, ItemKind::Folder)
    }

    /// Returns the markdown body for files, `None` for folders.
    pub fn content(&self) -> Option<&str> {
        match &self.kind {
            ItemKind::File { content } => Some(content.as_str()),
            ItemKind::Folder => None,
        }
    }
}

/// Item as read from an interchange document.
///
/// `id` and `created_at` are optional: missing ids are minted on import and a
/// missing creation time falls back to the import time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDraft {
    #[serde(default)]
    pub id: Option<ItemId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<ItemId>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub kind: ItemKind,
}

impl ItemDraft {
    /// Materializes the draft, keeping `id` when present.
    pub fn into_item(self) -> Item {
        Item {
            id: self.id.unwrap_or_else(super::new_id),
            name: self.name,
            parent_id: self.parent_id,
            created_at: self.created_at.unwrap_or_else(Utc::now),
            kind: self.kind,
        }
    }
}

impl From<Item> for ItemDraft {
    fn from(item: Item) -> Self {
        Self {
            id: Some(item.id),
            name: item.name,
            parent_id: item.parent_id,
            created_at: Some(item.created_at),
            kind: item.kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Item, ItemDraft, ItemKind};

    #[test]
    fn file_serializes_with_type_tag_and_content() {
        let file = Item::new_file("todo.md", "- [ ] ship", None);
        let value = serde_json::to_value(&file).unwrap();

        assert_eq!(value["type"], "file");
        assert_eq!(value["content"], "- [ ] ship");
        assert!(value["parentId"].is_null());
        assert!(value.get("createdAt").is_some());
    }

    #[test]
    fn folder_has_no_content_field() {
        let folder = Item::new_folder("Docs", None);
        let value = serde_json::to_value(&folder).unwrap();

        assert_eq!(value["type"], "folder");
        assert!(value.get("content").is_none());
        assert_eq!(folder.content(), None);
    }

    #[test]
    fn draft_without_id_mints_one() {
        let draft: ItemDraft =
            serde_json::from_str(r#"{"type":"file","name":"a.md","content":"x"}"#).unwrap();
        assert!(draft.id.is_none());

        let item = draft.into_item();
        assert_eq!(item.name, "a.md");
        assert_eq!(
            item.kind,
            ItemKind::File {
                content: "x".to_string()
            }
        );
    }
}
