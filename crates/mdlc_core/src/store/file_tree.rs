//! File tree store.
//!
//! # Responsibility
//! - Own the file/folder hierarchy and the current file/folder selection.
//! - Provide create, rename, content update, move, delete and import
//!   operations plus sorted/derived read views.
//!
//! # Invariants
//! - The parent graph is a forest rooted at `None`; moves never create cycles.
//! - A parent, when set, is an existing folder.
//! - Deleting a folder deletes its whole subtree.
//! - `current_file_id`/`current_folder_id` only ever name an existing item of
//!   the matching kind.
//! - Every walk over parent pointers is bounded by the item count, so
//!   corrupted data cannot make a read or a move loop forever.

use super::{Change, SkipReason, StoreError, StoreResult};
use crate::model::item::{Item, ItemDraft, ItemId, ItemKind};
use crate::storage::{skip_invalid_entries, NoopPersist, Persist};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Name given to files created with a blank name.
pub const DEFAULT_FILE_NAME: &str = "new-file.md";
/// Name given to folders created with a blank name.
pub const DEFAULT_FOLDER_NAME: &str = "new-folder";

/// Persisted file tree document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileTreeState {
    #[serde(deserialize_with = "skip_invalid_entries")]
    pub items: Vec<Item>,
    pub current_file_id: Option<ItemId>,
    pub current_folder_id: Option<ItemId>,
}

/// Parent chain of an item cannot be followed back to the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokenChain {
    /// An ancestor pointer names an item that does not exist.
    MissingParent { item: ItemId, parent: ItemId },
    /// The walk exceeded the item count, so the chain loops.
    Circular { item: ItemId },
}

impl Display for BrokenChain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingParent { item, parent } => {
                write!(f, "path of {item} references missing parent {parent}")
            }
            Self::Circular { item } => write!(f, "path of {item} loops back on itself"),
        }
    }
}

impl Error for BrokenChain {}

/// File/folder hierarchy with write-through persistence.
pub struct FileTreeStore<P = NoopPersist> {
    state: FileTreeState,
    persist: P,
}

impl FileTreeStore<NoopPersist> {
    /// Empty tree that is never persisted.
    pub fn in_memory() -> Self {
        Self::new(FileTreeState::default(), NoopPersist)
    }
}

impl<P: Persist<FileTreeState>> FileTreeStore<P> {
    /// Wraps loaded state; selections naming missing items are dropped.
    pub fn new(state: FileTreeState, persist: P) -> Self {
        let mut store = Self { state, persist };
        store.prune_selection();
        store
    }

    pub fn state(&self) -> &FileTreeState {
        &self.state
    }

    pub fn items(&self) -> &[Item] {
        &self.state.items
    }

    pub fn len(&self) -> usize {
        self.state.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.items.is_empty()
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.state.items.iter().find(|item| item.id == id)
    }

    /// Creates a file; a blank name becomes [`DEFAULT_FILE_NAME`].
    ///
    /// Never rejected. A parent that is not an existing folder is replaced by
    /// the root.
    pub fn add_file(
        &mut self,
        name: impl Into<String>,
        content: impl Into<String>,
        parent_id: Option<ItemId>,
    ) -> StoreResult<Item> {
        let name = non_blank_or(name.into(), DEFAULT_FILE_NAME);
        let parent_id = self.resolve_new_parent(parent_id);
        let item = Item::new_file(name, content, parent_id);
        self.state.items.push(item.clone());
        debug!(
            "event=item_add module=file_tree status=ok kind=file item={} parent={}",
            item.id,
            describe_parent(parent_id)
        );
        self.commit("item_add")?;
        Ok(item)
    }

    /// Creates a folder; a blank name becomes [`DEFAULT_FOLDER_NAME`].
    pub fn add_folder(
        &mut self,
        name: impl Into<String>,
        parent_id: Option<ItemId>,
    ) -> StoreResult<Item> {
        let name = non_blank_or(name.into(), DEFAULT_FOLDER_NAME);
        let parent_id = self.resolve_new_parent(parent_id);
        let item = Item::new_folder(name, parent_id);
        self.state.items.push(item.clone());
        debug!(
            "event=item_add module=file_tree status=ok kind=folder item={} parent={}",
            item.id,
            describe_parent(parent_id)
        );
        self.commit("item_add")?;
        Ok(item)
    }

    /// Renames any item. The name is stored verbatim.
    pub fn rename_item(&mut self, id: ItemId, name: impl Into<String>) -> StoreResult<Change> {
        let Some(index) = self.index_of(id) else {
            return Ok(skipped("item_rename", SkipReason::NotFound(id)));
        };
        self.state.items[index].name = name.into();
        self.commit("item_rename")?;
        Ok(Change::Applied)
    }

    /// Replaces the markdown body of a file.
    pub fn update_file_content(
        &mut self,
        id: ItemId,
        content: impl Into<String>,
    ) -> StoreResult<Change> {
        let Some(index) = self.index_of(id) else {
            return Ok(skipped("file_update", SkipReason::NotFound(id)));
        };
        match &mut self.state.items[index].kind {
            ItemKind::File { content: body } => *body = content.into(),
            ItemKind::Folder => return Ok(skipped("file_update", SkipReason::KindMismatch(id))),
        }
        self.commit("file_update")?;
        Ok(Change::Applied)
    }

    /// Re-parents `id` under `new_parent_id` (`None` = root).
    ///
    /// Skipped when `id` or the parent is missing, when the parent is a file,
    /// and when the parent is `id` itself or one of its descendants.
    pub fn move_item(&mut self, id: ItemId, new_parent_id: Option<ItemId>) -> StoreResult<Change> {
        let Some(index) = self.index_of(id) else {
            return Ok(skipped("item_move", SkipReason::NotFound(id)));
        };

        if let Some(parent) = new_parent_id {
            if parent == id {
                return Ok(skipped("item_move", SkipReason::WouldCycle { id, parent }));
            }
            match self.get(parent) {
                None => return Ok(skipped("item_move", SkipReason::NotFound(parent))),
                Some(candidate) if !candidate.is_folder() => {
                    return Ok(skipped("item_move", SkipReason::ParentNotFolder(parent)));
                }
                Some(_) => {}
            }
            if self.would_create_cycle(id, parent) {
                return Ok(skipped("item_move", SkipReason::WouldCycle { id, parent }));
            }
        }

        self.state.items[index].parent_id = new_parent_id;
        debug!(
            "event=item_move module=file_tree status=ok item={id} parent={}",
            describe_parent(new_parent_id)
        );
        self.commit("item_move")?;
        Ok(Change::Applied)
    }

    /// Deletes `id` and, for folders, every descendant.
    ///
    /// Returns removed ids in pre-order (the item first). An unknown id
    /// removes nothing and returns an empty list.
    pub fn remove_item(&mut self, id: ItemId) -> StoreResult<Vec<ItemId>> {
        if self.index_of(id).is_none() {
            skipped("item_remove", SkipReason::NotFound(id));
            return Ok(Vec::new());
        }

        let removed = self.collect_subtree(id);
        let doomed: HashSet<ItemId> = removed.iter().copied().collect();
        self.state.items.retain(|item| !doomed.contains(&item.id));

        if self
            .state
            .current_file_id
            .is_some_and(|current| doomed.contains(&current))
        {
            self.state.current_file_id = None;
        }
        if self
            .state
            .current_folder_id
            .is_some_and(|current| doomed.contains(&current))
        {
            self.state.current_folder_id = None;
        }

        debug!(
            "event=item_remove module=file_tree status=ok item={id} removed_count={}",
            removed.len()
        );
        self.commit("item_remove")?;
        Ok(removed)
    }

    /// Selects the current file; skipped unless `id` is an existing file.
    pub fn set_current_file(&mut self, id: ItemId) -> StoreResult<Change> {
        match self.get(id) {
            None => return Ok(skipped("select_file", SkipReason::NotFound(id))),
            Some(item) if !item.is_file() => {
                return Ok(skipped("select_file", SkipReason::KindMismatch(id)));
            }
            Some(_) => {}
        }
        self.state.current_file_id = Some(id);
        self.commit("select_file")?;
        Ok(Change::Applied)
    }

    /// Selects the current folder; `None` selects the root.
    pub fn set_current_folder(&mut self, id: Option<ItemId>) -> StoreResult<Change> {
        if let Some(id) = id {
            match self.get(id) {
                None => return Ok(skipped("select_folder", SkipReason::NotFound(id))),
                Some(item) if !item.is_folder() => {
                    return Ok(skipped("select_folder", SkipReason::KindMismatch(id)));
                }
                Some(_) => {}
            }
        }
        self.state.current_folder_id = id;
        self.commit("select_folder")?;
        Ok(Change::Applied)
    }

    /// Upserts imported items by id.
    ///
    /// An item whose parent is missing, is a file, or would close a cycle is
    /// re-attached to `fallback_parent` (or the root when that is not a
    /// usable folder). An upsert keeps the existing `created_at` when the
    /// draft carries none. Returns ids in input order.
    pub fn import_items(
        &mut self,
        drafts: impl IntoIterator<Item = ItemDraft>,
        fallback_parent: Option<ItemId>,
    ) -> StoreResult<Vec<ItemId>> {
        let mut imported = Vec::new();
        for draft in drafts {
            let had_created_at = draft.created_at.is_some();
            let mut incoming = draft.into_item();
            match self.index_of(incoming.id) {
                Some(index) => {
                    if !had_created_at {
                        incoming.created_at = self.state.items[index].created_at;
                    }
                    self.state.items[index] = incoming;
                    imported.push(self.state.items[index].id);
                }
                None => {
                    imported.push(incoming.id);
                    self.state.items.push(incoming);
                }
            }
        }
        if imported.is_empty() {
            return Ok(imported);
        }

        let fallback = fallback_parent.filter(|candidate| self.is_folder(*candidate));
        let repaired = self.repair_parents(fallback);
        self.prune_selection();
        debug!(
            "event=item_import module=file_tree status=ok count={} reattached={repaired}",
            imported.len()
        );
        self.commit("item_import")?;
        Ok(imported)
    }

    /// Children of `parent_id`: folders first, then case-insensitive by name.
    pub fn items_by_parent(&self, parent_id: Option<ItemId>) -> Vec<&Item> {
        let mut children: Vec<&Item> = self
            .state
            .items
            .iter()
            .filter(|item| item.parent_id == parent_id)
            .collect();
        children.sort_by(|a, b| compare_for_listing(a, b));
        children
    }

    pub fn current_file(&self) -> Option<&Item> {
        self.state
            .current_file_id
            .and_then(|id| self.get(id))
            .filter(|item| item.is_file())
    }

    pub fn current_folder(&self) -> Option<&Item> {
        self.state
            .current_folder_id
            .and_then(|id| self.get(id))
            .filter(|item| item.is_folder())
    }

    pub fn files(&self) -> impl Iterator<Item = &Item> {
        self.state.items.iter().filter(|item| item.is_file())
    }

    pub fn folders(&self) -> impl Iterator<Item = &Item> {
        self.state.items.iter().filter(|item| item.is_folder())
    }

    /// Slash-joined names from the root down to `item`.
    pub fn file_path(&self, item: &Item) -> Result<String, BrokenChain> {
        let limit = self.state.items.len();
        let mut names = vec![item.name.as_str()];
        let mut cursor = item.parent_id;
        let mut steps = 0usize;

        while let Some(parent_id) = cursor {
            steps += 1;
            if steps > limit {
                return Err(BrokenChain::Circular { item: item.id });
            }
            let parent = self.get(parent_id).ok_or(BrokenChain::MissingParent {
                item: item.id,
                parent: parent_id,
            })?;
            names.push(parent.name.as_str());
            cursor = parent.parent_id;
        }

        names.reverse();
        Ok(names.join("/"))
    }

    /// Every item below `id`, in pre-order.
    pub fn descendants(&self, id: ItemId) -> Vec<&Item> {
        self.collect_subtree(id)
            .into_iter()
            .skip(1)
            .filter_map(|descendant| self.get(descendant))
            .collect()
    }

    /// `id` followed by its descendants, cloned for export.
    pub fn subtree(&self, id: ItemId) -> Vec<Item> {
        if self.index_of(id).is_none() {
            return Vec::new();
        }
        self.collect_subtree(id)
            .into_iter()
            .filter_map(|member| self.get(member).cloned())
            .collect()
    }

    fn index_of(&self, id: ItemId) -> Option<usize> {
        self.state.items.iter().position(|item| item.id == id)
    }

    fn is_folder(&self, id: ItemId) -> bool {
        self.get(id).is_some_and(Item::is_folder)
    }

    fn resolve_new_parent(&self, parent_id: Option<ItemId>) -> Option<ItemId> {
        match parent_id {
            Some(parent) if !self.is_folder(parent) => {
                warn!(
                    "event=item_add module=file_tree status=fallback reason=invalid_parent parent={parent}"
                );
                None
            }
            other => other,
        }
    }

    /// Whether `candidate_parent`'s ancestor chain reaches `id`.
    ///
    /// A chain longer than the item count is treated as a cycle.
    fn would_create_cycle(&self, id: ItemId, candidate_parent: ItemId) -> bool {
        let limit = self.state.items.len();
        let mut cursor = Some(candidate_parent);
        let mut steps = 0usize;
        while let Some(current) = cursor {
            if current == id {
                return true;
            }
            steps += 1;
            if steps > limit {
                return true;
            }
            cursor = self.get(current).and_then(|item| item.parent_id);
        }
        false
    }

    fn children_index(&self) -> HashMap<ItemId, Vec<ItemId>> {
        let mut index: HashMap<ItemId, Vec<ItemId>> = HashMap::new();
        for item in &self.state.items {
            if let Some(parent) = item.parent_id {
                index.entry(parent).or_default().push(item.id);
            }
        }
        index
    }

    /// Pre-order ids of `root` and everything below it.
    ///
    /// Children are gathered from a snapshot index before anything is
    /// removed; the visited set stops corrupted cycles.
    fn collect_subtree(&self, root: ItemId) -> Vec<ItemId> {
        let index = self.children_index();
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![root];

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            order.push(current);
            if let Some(children) = index.get(&current) {
                stack.extend(children.iter().rev().copied());
            }
        }
        order
    }

    fn repair_parents(&mut self, fallback: Option<ItemId>) -> usize {
        let mut repaired = 0;
        for index in 0..self.state.items.len() {
            let id = self.state.items[index].id;
            let Some(parent) = self.state.items[index].parent_id else {
                continue;
            };
            if parent != id && self.is_folder(parent) && !self.would_create_cycle(id, parent) {
                continue;
            }

            let target = fallback
                .filter(|candidate| *candidate != id && !self.would_create_cycle(id, *candidate));
            self.state.items[index].parent_id = target;
            repaired += 1;
        }
        repaired
    }

    fn prune_selection(&mut self) {
        if let Some(id) = self.state.current_file_id {
            if !self.get(id).is_some_and(Item::is_file) {
                self.state.current_file_id = None;
            }
        }
        if let Some(id) = self.state.current_folder_id {
            if !self.is_folder(id) {
                self.state.current_folder_id = None;
            }
        }
    }

    fn commit(&mut self, event: &'static str) -> StoreResult<()> {
        self.persist.persist(&self.state).map_err(|err| {
            error!("event={event} module=file_tree status=error stage=persist error={err}");
            StoreError::Storage(err)
        })
    }
}

/// Listing order: folders before files, then case-insensitive names.
pub fn compare_for_listing(a: &Item, b: &Item) -> Ordering {
    match (a.is_folder(), b.is_folder()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => compare_names(&a.name, &b.name),
    }
}

/// Base-letter name comparison: case and accents are ignored, so `école`
/// sorts between `Eagle` and `zeta`.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    base_letters(a).cmp(base_letters(b))
}

fn base_letters(name: &str) -> impl Iterator<Item = char> + '_ {
    name.nfd()
        .filter(|ch| !is_combining_mark(*ch))
        .flat_map(char::to_lowercase)
}

fn non_blank_or(name: String, fallback: &str) -> String {
    if name.trim().is_empty() {
        fallback.to_string()
    } else {
        name
    }
}

fn describe_parent(parent_id: Option<ItemId>) -> String {
    parent_id.map_or_else(|| "root".to_string(), |id| id.to_string())
}

fn skipped(event: &'static str, reason: SkipReason) -> Change {
    debug!("event={event} module=file_tree status=skipped reason=\"{reason}\"");
    Change::Skipped(reason)
}

#[cfg(test)]
mod tests {
    use super::{compare_names, FileTreeStore};
    use std::cmp::Ordering;

    #[test]
    fn compare_names_ignores_case() {
        assert_eq!(compare_names("Beta", "beta"), Ordering::Equal);
        assert_eq!(compare_names("alpha", "Beta"), Ordering::Less);
        assert_eq!(compare_names("Zeta", "beta"), Ordering::Greater);
    }

    #[test]
    fn compare_names_ignores_accents() {
        assert_eq!(compare_names("école", "Ecole"), Ordering::Equal);
        assert_eq!(compare_names("Eagle", "école"), Ordering::Less);
        assert_eq!(compare_names("école", "zeta"), Ordering::Less);
        assert_eq!(compare_names("Ångström", "azure"), Ordering::Less);
    }

    #[test]
    fn blank_names_fall_back_to_defaults() {
        let mut store = FileTreeStore::in_memory();
        let file = store.add_file("  ", "", None).unwrap();
        let folder = store.add_folder("", None).unwrap();

        assert_eq!(file.name, super::DEFAULT_FILE_NAME);
        assert_eq!(folder.name, super::DEFAULT_FOLDER_NAME);
    }

    #[test]
    fn add_under_a_file_lands_at_root() {
        let mut store = FileTreeStore::in_memory();
        let file = store.add_file("a.md", "", None).unwrap();
        let nested = store.add_file("b.md", "", Some(file.id)).unwrap();

        assert_eq!(nested.parent_id, None);
    }
}
