//! Use-case services above the stores.
//!
//! # Responsibility
//! - Validate and encode uploads before they reach the image library.
//! - Move plain markdown files in and out of the file tree.
//! - Tie the three stores, the renderer and the interchange codec together
//!   behind `Workspace`.

pub mod image_upload;
pub mod markdown_io;
pub mod workspace;
