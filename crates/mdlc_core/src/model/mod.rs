//! Workspace domain model.
//!
//! # Responsibility
//! - Define the records owned by the file tree, image and block stores.
//! - Provide the identifier generator shared by every store.
//!
//! # Invariants
//! - Every entity is identified by a stable UUID that is never reused.
//! - `content` exists only on file items; folders cannot carry a body.

pub mod block;
pub mod image;
pub mod item;
pub mod validation;

use uuid::Uuid;

/// Mints a fresh identifier for a new entity.
pub fn new_id() -> Uuid {
    Uuid::new_v4()
}
