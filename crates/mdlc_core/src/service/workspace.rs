//! Workspace facade over one key-value backend.
//!
//! # Responsibility
//! - Open the file tree, image and block stores from their persisted
//!   documents.
//! - Orchestrate cross-store use cases: rendering with library images,
//!   upload batches, envelope and markdown import/export, image usage checks.
//!
//! # Invariants
//! - Every store writes back to the key configured in `WorkspaceConfig`.
//! - A malformed envelope imports nothing.

use super::image_upload::{prepare_uploads, UploadCandidate};
use super::markdown_io::{export_markdown, import_markdown};
use crate::config::WorkspaceConfig;
use crate::interchange::{
    export_many, export_one, import_document, sniff_kind, EntityKind, ExportDocument,
    FormatError, ImportError, INTERCHANGE_EXTENSION,
};
use crate::model::block::{Block, BlockId};
use crate::model::image::{Image, ImageId};
use crate::model::item::{Item, ItemId};
use crate::model::validation::{require_extension, ValidationError};
use crate::render::{files_using_image, MarkdownRenderer};
use crate::storage::{KeyValueStore, Persistence};
use crate::store::block_library::{BlockLibraryState, BlockLibraryStore};
use crate::store::file_tree::{FileTreeState, FileTreeStore};
use crate::store::image_library::{ImageLibraryState, ImageLibraryStore};
use crate::store::StoreError;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::Path;
use uuid::Uuid;

/// Failure of a workspace use case.
#[derive(Debug)]
pub enum WorkspaceError {
    Import(ImportError),
    Store(StoreError),
    /// Entity could not be encoded for export.
    Export(serde_json::Error),
}

impl Display for WorkspaceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Import(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Export(err) => write!(f, "export failed: {err}"),
        }
    }
}

impl Error for WorkspaceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Import(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Export(err) => Some(err),
        }
    }
}

impl From<ImportError> for WorkspaceError {
    fn from(value: ImportError) -> Self {
        Self::Import(value)
    }
}

impl From<FormatError> for WorkspaceError {
    fn from(value: FormatError) -> Self {
        Self::Import(ImportError::Format(value))
    }
}

impl From<ValidationError> for WorkspaceError {
    fn from(value: ValidationError) -> Self {
        Self::Import(ImportError::Validation(value))
    }
}

impl From<StoreError> for WorkspaceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<serde_json::Error> for WorkspaceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Export(value)
    }
}

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// Result of an upload batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub stored: Vec<ImageId>,
    pub skipped: Vec<ValidationError>,
}

/// What an envelope import stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub kind: EntityKind,
    pub ids: Vec<Uuid>,
}

/// All workspace stores persisted through one shared backend.
pub struct Workspace<K> {
    config: WorkspaceConfig,
    files: FileTreeStore<Persistence<K>>,
    images: ImageLibraryStore<Persistence<K>>,
    blocks: BlockLibraryStore<Persistence<K>>,
    renderer: MarkdownRenderer,
}

impl<K: KeyValueStore + Clone> Workspace<K> {
    /// Loads every store document from `backend`, tolerating bad data.
    pub fn open(backend: K, config: WorkspaceConfig) -> Self {
        let files_sink = Persistence::new(backend.clone(), config.storage.files.clone());
        let images_sink = Persistence::new(backend.clone(), config.storage.images.clone());
        let blocks_sink = Persistence::new(backend, config.storage.blocks.clone());

        let files = FileTreeStore::new(files_sink.load::<FileTreeState>(), files_sink);
        let images = ImageLibraryStore::new(images_sink.load::<ImageLibraryState>(), images_sink);
        let blocks = BlockLibraryStore::new(blocks_sink.load::<BlockLibraryState>(), blocks_sink);

        info!(
            "event=workspace_open module=workspace status=ok items={} images={} blocks={}",
            files.len(),
            images.image_count(),
            blocks.blocks().len()
        );

        Self {
            renderer: MarkdownRenderer::new(config.render),
            config,
            files,
            images,
            blocks,
        }
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn files(&self) -> &FileTreeStore<Persistence<K>> {
        &self.files
    }

    pub fn files_mut(&mut self) -> &mut FileTreeStore<Persistence<K>> {
        &mut self.files
    }

    pub fn images(&self) -> &ImageLibraryStore<Persistence<K>> {
        &self.images
    }

    pub fn images_mut(&mut self) -> &mut ImageLibraryStore<Persistence<K>> {
        &mut self.images
    }

    pub fn blocks(&self) -> &BlockLibraryStore<Persistence<K>> {
        &self.blocks
    }

    pub fn blocks_mut(&mut self) -> &mut BlockLibraryStore<Persistence<K>> {
        &mut self.blocks
    }

    pub fn renderer(&self) -> &MarkdownRenderer {
        &self.renderer
    }

    /// Renders markdown against this workspace's image library.
    pub fn render_markdown(&self, markdown: &str) -> String {
        self.renderer.render(markdown, &self.images)
    }

    /// Rendered body of a file; `None` for folders and unknown ids.
    pub fn render_file(&self, id: ItemId) -> Option<String> {
        let content = self.files.get(id)?.content()?;
        Some(self.render_markdown(content))
    }

    pub fn render_current_file(&self) -> Option<String> {
        let content = self.files.current_file()?.content()?;
        Some(self.render_markdown(content))
    }

    pub fn render_block(&self, id: BlockId) -> Option<String> {
        let block = self.blocks.get(id)?;
        Some(self.renderer.render_block(block, &self.images))
    }

    /// Validates, encodes and stores an upload batch.
    ///
    /// Rejected candidates are reported, the rest are stored.
    pub fn upload_images(
        &mut self,
        candidates: impl IntoIterator<Item = UploadCandidate>,
    ) -> WorkspaceResult<UploadReport> {
        let batch = prepare_uploads(candidates, &self.config.images);
        let stored = self.images.add_images(batch.accepted)?;
        Ok(UploadReport {
            stored,
            skipped: batch.skipped,
        })
    }

    /// Files whose markdown references image `id`.
    pub fn image_usage(&self, id: ImageId) -> Vec<&Item> {
        files_using_image(self.files.items(), id)
    }

    /// Imports an envelope of any kind into the matching store.
    ///
    /// Imported items whose parent is unusable land under `fallback_parent`.
    pub fn import_envelope(
        &mut self,
        raw: &str,
        fallback_parent: Option<ItemId>,
    ) -> WorkspaceResult<ImportSummary> {
        let kind = sniff_kind(raw)?;
        let ids = match kind {
            EntityKind::Item => {
                let drafts = import_document::<Item>(raw)?;
                self.files.import_items(drafts, fallback_parent)?
            }
            EntityKind::Image => {
                let drafts = import_document::<Image>(raw)?;
                self.images.import_images(drafts)?
            }
            EntityKind::Block => {
                let drafts = import_document::<Block>(raw)?;
                self.blocks.import_blocks(drafts)?
            }
        };
        info!(
            "event=envelope_import module=workspace status=ok kind={kind} count={}",
            ids.len()
        );
        Ok(ImportSummary { kind, ids })
    }

    /// Reads an `.mdlc` file and imports it with
    /// [`import_envelope`](Self::import_envelope).
    pub fn import_envelope_file(
        &mut self,
        path: impl AsRef<Path>,
        fallback_parent: Option<ItemId>,
    ) -> WorkspaceResult<ImportSummary> {
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
        self.import_envelope(&raw, fallback_parent)
    }

    /// Adds a `.md` file from disk as a new file item.
    pub fn import_markdown_file(
        &mut self,
        path: impl AsRef<Path>,
        parent_id: Option<ItemId>,
    ) -> WorkspaceResult<Item> {
        let file = import_markdown(path)?;
        Ok(self.files.add_file(file.name, file.content, parent_id)?)
    }

    /// Markdown download of a file item.
    pub fn export_file_markdown(&self, id: ItemId) -> Option<ExportDocument> {
        export_markdown(self.files.get(id)?)
    }

    /// Envelope of an item and its descendants; `None` for unknown ids.
    ///
    /// A lone file exports as a single envelope, anything else as a batch
    /// named after the root item.
    pub fn export_subtree(&self, id: ItemId) -> WorkspaceResult<Option<ExportDocument>> {
        let subtree = self.files.subtree(id);
        let document = match subtree.as_slice() {
            [] => None,
            [only] => Some(export_one(only)?),
            [root, ..] => Some(export_many(&subtree, &root.name)?),
        };
        Ok(document)
    }

    /// Envelope of the listed images; unknown ids are left out.
    pub fn export_images(&self, ids: &[ImageId], label: &str) -> WorkspaceResult<ExportDocument> {
        let images: Vec<&Image> = ids.iter().filter_map(|id| self.images.get(*id)).collect();
        match images.as_slice() {
            [only] => Ok(export_one(*only)?),
            _ => Ok(export_many(images.iter().copied(), label)?),
        }
    }

    /// Envelope of the listed blocks; unknown ids are left out.
    pub fn export_blocks(&self, ids: &[BlockId], label: &str) -> WorkspaceResult<ExportDocument> {
        let blocks: Vec<&Block> = ids.iter().filter_map(|id| self.blocks.get(*id)).collect();
        match blocks.as_slice() {
            [only] => Ok(export_one(*only)?),
            _ => Ok(export_many(blocks.iter().copied(), label)?),
        }
    }
}
