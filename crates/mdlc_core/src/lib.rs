//! Core of the mdlc markdown workspace.
//! This crate is the single source of truth for document and asset invariants.

pub mod config;
pub mod interchange;
pub mod logging;
pub mod model;
pub mod render;
pub mod service;
pub mod storage;
pub mod store;

pub use config::{ConfigError, ImageUploadLimits, StorageKeys, WorkspaceConfig};
pub use interchange::{
    export_many, export_one, import_document, import_file, sniff_kind, EntityKind,
    ExportDocument, FormatError, ImportError, Interchange,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::block::{normalize_shortcut, Block, BlockDraft, BlockId, BlockType};
pub use model::image::{Image, ImageDraft, ImageId};
pub use model::item::{Item, ItemDraft, ItemId, ItemKind};
pub use model::validation::ValidationError;
pub use render::{
    files_using_image, referenced_image_ids, render, render_block, ImageSource,
    MarkdownRenderer, RenderOptions,
};
pub use service::image_upload::{prepare_uploads, UploadBatch, UploadCandidate};
pub use service::workspace::{ImportSummary, UploadReport, Workspace, WorkspaceError};
pub use storage::{
    KeyValueStore, MemoryKeyValueStore, NoopPersist, Persist, Persistence, SqliteKeyValueStore,
    StorageError, StorageResult,
};
pub use store::block_library::{BlockLibraryState, BlockLibraryStore, ShortcutConflict};
pub use store::file_tree::{BrokenChain, FileTreeState, FileTreeStore};
pub use store::image_library::{ImageLibraryState, ImageLibraryStore};
pub use store::{Change, SkipReason, StoreError, StoreResult};

/// Minimal health-check API for host integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
