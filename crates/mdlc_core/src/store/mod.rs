//! In-memory workspace stores with write-through persistence.
//!
//! # Responsibility
//! - Own normalized state for the file tree, image library and block library.
//! - Enforce structural invariants before mutating state.
//! - Hand a full snapshot to the injected `Persist` sink after each applied
//!   mutation.
//!
//! # Invariants
//! - Rejected mutations (`Change::Skipped`) leave state untouched and do not
//!   persist.
//! - A persistence failure is reported after the in-memory mutation has been
//!   applied; the state stays valid for the rest of the session.

use crate::storage::StorageError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod block_library;
pub mod file_tree;
pub mod image_library;

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of a mutation that may be rejected without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Applied,
    Skipped(SkipReason),
}

impl Change {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            Self::Applied => None,
            Self::Skipped(reason) => Some(*reason),
        }
    }
}

/// Why a mutation was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Referenced identifier does not exist.
    NotFound(Uuid),
    /// Identifier exists but names the wrong kind of entity.
    KindMismatch(Uuid),
    /// Requested parent is a file.
    ParentNotFolder(Uuid),
    /// Moving `id` under `parent` would make `id` its own ancestor.
    WouldCycle { id: Uuid, parent: Uuid },
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "not found: {id}"),
            Self::KindMismatch(id) => write!(f, "wrong entity kind: {id}"),
            Self::ParentNotFolder(id) => write!(f, "parent is not a folder: {id}"),
            Self::WouldCycle { id, parent } => {
                write!(f, "moving {id} under {parent} would create a cycle")
            }
        }
    }
}

/// Store-level failure.
#[derive(Debug)]
pub enum StoreError {
    /// Snapshot was not persisted; in-memory state already reflects the change.
    Storage(StorageError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(err) => write!(f, "change kept in memory but not saved: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
        }
    }
}

impl From<StorageError> for StoreError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}
