//! Reusable content block model and shortcut chords.
//!
//! # Invariants
//! - A block with an empty shortcut is stored with `shortcut == None`.
//! - Shortcut uniqueness is not enforced; lookups take the first match.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Stable identifier for library blocks.
pub type BlockId = Uuid;

/// How block content is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    #[default]
    Markdown,
    Html,
}

/// Named snippet, optionally bound to a keyboard chord.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: BlockType,
    #[serde(default)]
    pub content: String,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub shortcut: Option<String>,
}

/// Block payload as entered by the user or read from an interchange file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockDraft {
    #[serde(default)]
    pub id: Option<BlockId>,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: BlockType,
    #[serde(default)]
    pub content: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub shortcut: Option<String>,
}

impl BlockDraft {
    pub fn into_block(self, id: BlockId) -> Block {
        Block {
            id,
            name: self.name,
            kind: self.kind,
            content: self.content,
            shortcut: clean_shortcut(self.shortcut),
        }
    }
}

impl From<Block> for BlockDraft {
    fn from(block: Block) -> Self {
        Self {
            id: Some(block.id),
            name: block.name,
            kind: block.kind,
            content: block.content,
            shortcut: block.shortcut,
        }
    }
}

/// Trims a user-entered chord, mapping blank input to `None`.
pub fn clean_shortcut(shortcut: Option<String>) -> Option<String> {
    shortcut
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Canonical form of a chord: `Ctrl+Alt+Cmd+Shift+KEY`.
///
/// Modifier names are matched case-insensitively (`control`, `option`,
/// `meta` and `command` are accepted) and spaces around `+` are ignored.
/// Returns `None` when the chord has no key or more than one key.
pub fn normalize_shortcut(chord: &str) -> Option<String> {
    let mut ctrl = false;
    let mut alt = false;
    let mut cmd = false;
    let mut shift = false;
    let mut key: Option<String> = None;

    for part in chord.split('+').map(str::trim).filter(|part| !part.is_empty()) {
        match part.to_ascii_lowercase().as_str() {
            "ctrl" | "control" => ctrl = true,
            "alt" | "option" => alt = true,
            "cmd" | "meta" | "command" => cmd = true,
            "shift" => shift = true,
            _ => {
                if key.is_some() {
                    return None;
                }
                key = Some(part.to_uppercase());
            }
        }
    }

    let key = key?;
    let mut parts = Vec::with_capacity(5);
    if ctrl {
        parts.push("Ctrl".to_string());
    }
    if alt {
        parts.push("Alt".to_string());
    }
    if cmd {
        parts.push("Cmd".to_string());
    }
    if shift {
        parts.push("Shift".to_string());
    }
    parts.push(key);
    Some(parts.join("+"))
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(clean_shortcut(value))
}
