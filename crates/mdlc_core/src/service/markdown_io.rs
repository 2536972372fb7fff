//! Plain markdown file import and export.

use crate::interchange::{ExportDocument, ImportError};
use crate::model::item::Item;
use crate::model::validation::require_extension;
use crate::store::file_tree::DEFAULT_FILE_NAME;
use log::debug;
use std::fs;
use std::path::Path;

pub const MARKDOWN_EXTENSION: &str = ".md";
pub const MARKDOWN_MIME_TYPE: &str = "text/markdown";

/// Markdown file read from disk, ready for `FileTreeStore::add_file`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownFile {
    pub name: String,
    pub content: String,
}

/// Reads a `.md` file as UTF-8.
///
/// The extension is checked before any read happens.
pub fn import_markdown(path: impl AsRef<Path>) -> Result<MarkdownFile, ImportError> {
    let path = path.as_ref();
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    require_extension(&name, MARKDOWN_EXTENSION)?;

    let content = fs::read_to_string(path).map_err(|source| ImportError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        "event=markdown_import module=markdown_io status=ok bytes={}",
        content.len()
    );
    Ok(MarkdownFile { name, content })
}

/// Download document for a file item; `None` for folders.
pub fn export_markdown(item: &Item) -> Option<ExportDocument> {
    let content = item.content()?;
    Some(ExportDocument {
        file_name: markdown_file_name(&item.name),
        contents: content.to_string(),
        mime_type: MARKDOWN_MIME_TYPE,
    })
}

/// Safe file name ending in `.md`.
///
/// Path separators, reserved punctuation and control characters are
/// replaced with `-`; a blank name becomes the default file name.
pub fn markdown_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            ch if ch.is_control() => '-',
            ch => ch,
        })
        .collect();
    let cleaned = cleaned.trim_matches(|ch: char| ch == '.' || ch.is_whitespace());

    if cleaned.is_empty() {
        return DEFAULT_FILE_NAME.to_string();
    }
    if cleaned.to_ascii_lowercase().ends_with(MARKDOWN_EXTENSION) {
        cleaned.to_string()
    } else {
        format!("{cleaned}{MARKDOWN_EXTENSION}")
    }
}

#[cfg(test)]
mod tests {
    use super::markdown_file_name;

    #[test]
    fn appends_extension_only_when_missing() {
        assert_eq!(markdown_file_name("notes"), "notes.md");
        assert_eq!(markdown_file_name("notes.MD"), "notes.MD");
        assert_eq!(markdown_file_name("notes.txt"), "notes.txt.md");
    }

    #[test]
    fn replaces_path_and_reserved_characters() {
        assert_eq!(markdown_file_name("a/b:c?.md"), "a-b-c-.md");
        assert_eq!(markdown_file_name("   "), "new-file.md");
    }
}
