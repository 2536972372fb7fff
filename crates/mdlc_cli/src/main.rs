//! Command-line front end for `mdlc_core`.
//!
//! # Responsibility
//! - Verify core linkage (`version`).
//! - Render markdown files and inspect interchange envelopes without a UI.
//! - Import into and list a SQLite-backed workspace.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use mdlc_core::service::image_upload::{decode_data_uri, format_file_size};
use mdlc_core::service::markdown_io::import_markdown;
use mdlc_core::{
    import_document, import_file, init_logging, sniff_kind, Block, EntityKind, FileTreeState,
    FileTreeStore, Image, ImageLibraryStore, Item, ItemId, MarkdownRenderer, Persist,
    SqliteKeyValueStore, Workspace, WorkspaceConfig,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Parser)]
#[command(name = "mdlc", about = "Markdown workspace core tools", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Absolute directory for rotated log files; logging is off without it.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[arg(long, global = true, default_value = mdlc_core::default_log_level())]
    log_level: String,

    /// JSON workspace config; missing fields use defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Print core ping and version
    Version,
    /// Render a markdown file to sanitized HTML
    Render {
        file: PathBuf,
        /// Image envelope (`.img.mdlc`/`.imgs.mdlc`) used to resolve image ids
        #[arg(long)]
        images: Option<PathBuf>,
    },
    /// Describe an interchange envelope
    Inspect { file: PathBuf },
    /// Import a `.md` or `.mdlc` file into a SQLite workspace
    Import {
        #[arg(long)]
        db: PathBuf,
        file: PathBuf,
    },
    /// Print the file tree of a SQLite workspace
    Tree {
        #[arg(long)]
        db: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Some(log_dir) = &cli.log_dir {
        init_logging(&cli.log_level, log_dir).context("failed to start logging")?;
    }
    let config = match &cli.config {
        Some(path) => WorkspaceConfig::load(path).context("failed to load config")?,
        None => WorkspaceConfig::default(),
    };

    match cli.command {
        Command::Version => {
            println!("mdlc_core ping={}", mdlc_core::ping());
            println!("mdlc_core version={}", mdlc_core::core_version());
        }
        Command::Render { file, images } => render(&file, images.as_deref(), &config)?,
        Command::Inspect { file } => inspect(&file)?,
        Command::Import { db, file } => import(&db, &file, config)?,
        Command::Tree { db } => {
            let workspace = open_workspace(&db, config)?;
            print_tree(workspace.files(), None, 0);
        }
    }
    Ok(())
}

fn render(file: &Path, images: Option<&Path>, config: &WorkspaceConfig) -> Result<()> {
    let markdown = import_markdown(file)
        .with_context(|| format!("cannot render `{}`", file.display()))?;

    let mut library = ImageLibraryStore::in_memory();
    if let Some(path) = images {
        let drafts = import_file::<Image>(path)
            .with_context(|| format!("cannot load images from `{}`", path.display()))?;
        library.import_images(drafts)?;
    }

    let renderer = MarkdownRenderer::new(config.render);
    println!("{}", renderer.render(&markdown.content, &library));
    Ok(())
}

fn inspect(file: &Path) -> Result<()> {
    let raw = fs::read_to_string(file)
        .with_context(|| format!("failed to read `{}`", file.display()))?;
    let kind = sniff_kind(&raw)?;
    let entries: Vec<String> = match kind {
        EntityKind::Item => import_document::<Item>(&raw)?
            .into_iter()
            .map(|draft| draft.name)
            .collect(),
        EntityKind::Image => import_document::<Image>(&raw)?
            .into_iter()
            .map(|draft| match decode_data_uri(&draft.data) {
                Some((mime_type, bytes)) => format!(
                    "{} ({mime_type}, {})",
                    draft.name,
                    format_file_size(bytes.len() as u64)
                ),
                None => format!("{} (unreadable data)", draft.name),
            })
            .collect(),
        EntityKind::Block => import_document::<Block>(&raw)?
            .into_iter()
            .map(|draft| draft.name)
            .collect(),
    };

    println!("kind={kind}");
    println!("count={}", entries.len());
    for entry in entries {
        println!("- {entry}");
    }
    Ok(())
}

fn import(db: &Path, file: &Path, config: WorkspaceConfig) -> Result<()> {
    let mut workspace = open_workspace(db, config)?;
    let is_markdown = file
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md"));

    if is_markdown {
        let item = workspace.import_markdown_file(file, None)?;
        println!("imported file {} ({})", item.name, item.id);
        return Ok(());
    }

    let summary = workspace.import_envelope_file(file, None)?;
    if summary.ids.is_empty() {
        bail!("`{}` contains no entities", file.display());
    }
    println!("imported {} {}(s)", summary.ids.len(), summary.kind);
    info!(
        "event=cli_import module=cli status=ok kind={} count={}",
        summary.kind,
        summary.ids.len()
    );
    Ok(())
}

fn open_workspace(
    db: &Path,
    config: WorkspaceConfig,
) -> Result<Workspace<Rc<SqliteKeyValueStore>>> {
    let backend = SqliteKeyValueStore::open(db)
        .with_context(|| format!("failed to open workspace `{}`", db.display()))?;
    Ok(Workspace::open(Rc::new(backend), config))
}

fn print_tree<P: Persist<FileTreeState>>(
    tree: &FileTreeStore<P>,
    parent: Option<ItemId>,
    depth: usize,
) {
    for item in tree.items_by_parent(parent) {
        let marker = if item.is_folder() { "/" } else { "" };
        println!("{}{}{marker}", "  ".repeat(depth), item.name);
        if item.is_folder() && depth < tree.len() {
            print_tree(tree, Some(item.id), depth + 1);
        }
    }
}
