//! Block library store.
//!
//! # Responsibility
//! - Own reusable markdown/html snippets in insertion order.
//! - Resolve keyboard chords to blocks.
//!
//! # Invariants
//! - Block ids are unique; `add_block` with a known id replaces in place.
//! - Shortcuts are not required to be unique; the first block wins.

use super::{Change, SkipReason, StoreError, StoreResult};
use crate::model::block::{clean_shortcut, normalize_shortcut, Block, BlockDraft, BlockId};
use crate::model::new_id;
use crate::storage::{skip_invalid_entries, NoopPersist, Persist};
use log::{debug, error};
use serde::{Deserialize, Serialize};

/// Persisted block library document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockLibraryState {
    #[serde(deserialize_with = "skip_invalid_entries")]
    pub items: Vec<Block>,
}

/// A chord bound to more than one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutConflict {
    /// Normalized chord.
    pub shortcut: String,
    /// Bound blocks in insertion order; the first one wins lookups.
    pub block_ids: Vec<BlockId>,
}

pub struct BlockLibraryStore<P = NoopPersist> {
    state: BlockLibraryState,
    persist: P,
}

impl BlockLibraryStore<NoopPersist> {
    pub fn in_memory() -> Self {
        Self::new(BlockLibraryState::default(), NoopPersist)
    }
}

impl<P: Persist<BlockLibraryState>> BlockLibraryStore<P> {
    pub fn new(state: BlockLibraryState, persist: P) -> Self {
        Self { state, persist }
    }

    pub fn state(&self) -> &BlockLibraryState {
        &self.state
    }

    pub fn blocks(&self) -> &[Block] {
        &self.state.items
    }

    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.state.items.iter().find(|block| block.id == id)
    }

    /// Stores a block, minting an id when the draft has none.
    ///
    /// A draft carrying a known id replaces that block in place.
    pub fn add_block(&mut self, draft: BlockDraft) -> StoreResult<Block> {
        let block = self.upsert_one(draft);
        debug!(
            "event=block_add module=block_library status=ok block={}",
            block.id
        );
        self.commit("block_add")?;
        Ok(block)
    }

    /// Stores several drafts with [`add_block`](Self::add_block) semantics
    /// and one persist.
    pub fn import_blocks(
        &mut self,
        drafts: impl IntoIterator<Item = BlockDraft>,
    ) -> StoreResult<Vec<BlockId>> {
        let stored: Vec<BlockId> = drafts
            .into_iter()
            .map(|draft| self.upsert_one(draft).id)
            .collect();
        if stored.is_empty() {
            return Ok(stored);
        }
        debug!(
            "event=block_import module=block_library status=ok count={}",
            stored.len()
        );
        self.commit("block_import")?;
        Ok(stored)
    }

    pub fn remove_block(&mut self, id: BlockId) -> StoreResult<Change> {
        let Some(index) = self.state.items.iter().position(|block| block.id == id) else {
            return Ok(skipped("block_remove", SkipReason::NotFound(id)));
        };
        self.state.items.remove(index);
        self.commit("block_remove")?;
        Ok(Change::Applied)
    }

    /// Overwrites name, content and shortcut; the block type is kept.
    ///
    /// A blank shortcut unbinds the block.
    pub fn update_block(
        &mut self,
        id: BlockId,
        name: impl Into<String>,
        content: impl Into<String>,
        shortcut: Option<String>,
    ) -> StoreResult<Change> {
        let Some(block) = self.state.items.iter_mut().find(|block| block.id == id) else {
            return Ok(skipped("block_update", SkipReason::NotFound(id)));
        };
        block.name = name.into();
        block.content = content.into();
        block.shortcut = clean_shortcut(shortcut);
        self.commit("block_update")?;
        Ok(Change::Applied)
    }

    /// First block, in insertion order, bound to `chord`.
    pub fn block_for_shortcut(&self, chord: &str) -> Option<&Block> {
        let wanted = normalize_shortcut(chord)?;
        self.state.items.iter().find(|block| {
            block
                .shortcut
                .as_deref()
                .and_then(normalize_shortcut)
                .is_some_and(|bound| bound == wanted)
        })
    }

    /// Chords bound to more than one block, in order of first binding.
    pub fn shortcut_conflicts(&self) -> Vec<ShortcutConflict> {
        let mut bindings: Vec<ShortcutConflict> = Vec::new();
        for block in &self.state.items {
            let Some(shortcut) = block.shortcut.as_deref().and_then(normalize_shortcut) else {
                continue;
            };
            match bindings.iter_mut().find(|entry| entry.shortcut == shortcut) {
                Some(entry) => entry.block_ids.push(block.id),
                None => bindings.push(ShortcutConflict {
                    shortcut,
                    block_ids: vec![block.id],
                }),
            }
        }
        bindings.retain(|entry| entry.block_ids.len() > 1);
        bindings
    }

    /// Replaces the block with the draft's id in place, or appends.
    fn upsert_one(&mut self, draft: BlockDraft) -> Block {
        let id = draft.id.unwrap_or_else(new_id);
        let block = draft.into_block(id);
        match self.state.items.iter().position(|existing| existing.id == id) {
            Some(index) => self.state.items[index] = block.clone(),
            None => self.state.items.push(block.clone()),
        }
        block
    }

    fn commit(&mut self, event: &'static str) -> StoreResult<()> {
        self.persist.persist(&self.state).map_err(|err| {
            error!("event={event} module=block_library status=error stage=persist error={err}");
            StoreError::Storage(err)
        })
    }
}

fn skipped(event: &'static str, reason: SkipReason) -> Change {
    debug!("event={event} module=block_library status=skipped reason=\"{reason}\"");
    Change::Skipped(reason)
}

#[cfg(test)]
mod tests {
    use super::BlockLibraryStore;
    use crate::model::block::BlockDraft;

    fn draft(name: &str, shortcut: Option<&str>) -> BlockDraft {
        BlockDraft {
            name: name.to_string(),
            shortcut: shortcut.map(str::to_string),
            ..BlockDraft::default()
        }
    }

    #[test]
    fn shortcut_lookup_ignores_modifier_order_and_case() {
        let mut store = BlockLibraryStore::in_memory();
        let block = store.add_block(draft("sig", Some("Ctrl+Shift+S"))).unwrap();

        let found = store.block_for_shortcut("shift+ctrl+s").unwrap();
        assert_eq!(found.id, block.id);
        assert!(store.block_for_shortcut("Ctrl+S").is_none());
    }

    #[test]
    fn conflicts_list_blocks_in_insertion_order() {
        let mut store = BlockLibraryStore::in_memory();
        let first = store.add_block(draft("a", Some("Ctrl+K"))).unwrap();
        let second = store.add_block(draft("b", Some("ctrl+k"))).unwrap();
        store.add_block(draft("c", Some("Alt+K"))).unwrap();

        let conflicts = store.shortcut_conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].shortcut, "Ctrl+K");
        assert_eq!(conflicts[0].block_ids, vec![first.id, second.id]);
        assert_eq!(store.block_for_shortcut("Ctrl+K").unwrap().id, first.id);
    }
}
