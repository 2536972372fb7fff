//! Image library store.
//!
//! # Responsibility
//! - Own image records keyed by id and the multi-selection used by bulk
//!   actions.
//! - Provide upsert, rename, delete, tagging and selection operations plus
//!   sorted/filtered read views.
//!
//! # Invariants
//! - `selected_image_ids` only contains ids present in `library`, without
//!   duplicates.
//! - `updated_at` is bumped on every write to a record; `created_at` is kept.

use super::{Change, SkipReason, StoreError, StoreResult};
use crate::model::image::{Image, ImageDraft, ImageId};
use crate::model::new_id;
use crate::storage::{skip_invalid_values, NoopPersist, Persist};
use chrono::Utc;
use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Persisted image library document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageLibraryState {
    #[serde(deserialize_with = "skip_invalid_values")]
    pub library: BTreeMap<ImageId, Image>,
    pub selected_image_ids: Vec<ImageId>,
}

/// Image records with write-through persistence.
pub struct ImageLibraryStore<P = NoopPersist> {
    state: ImageLibraryState,
    persist: P,
}

impl ImageLibraryStore<NoopPersist> {
    pub fn in_memory() -> Self {
        Self::new(ImageLibraryState::default(), NoopPersist)
    }
}

impl<P: Persist<ImageLibraryState>> ImageLibraryStore<P> {
    /// Wraps loaded state, dropping stale or repeated selection entries.
    pub fn new(state: ImageLibraryState, persist: P) -> Self {
        let mut store = Self { state, persist };
        store.prune_selection();
        store
    }

    pub fn state(&self) -> &ImageLibraryState {
        &self.state
    }

    pub fn library(&self) -> &BTreeMap<ImageId, Image> {
        &self.state.library
    }

    pub fn get(&self, id: ImageId) -> Option<&Image> {
        self.state.library.get(&id)
    }

    /// Upserts freshly uploaded images. Returns the stored ids in input order.
    pub fn add_images(
        &mut self,
        drafts: impl IntoIterator<Item = ImageDraft>,
    ) -> StoreResult<Vec<ImageId>> {
        self.upsert("image_add", drafts)
    }

    /// Upserts images read from an interchange document.
    pub fn import_images(
        &mut self,
        drafts: impl IntoIterator<Item = ImageDraft>,
    ) -> StoreResult<Vec<ImageId>> {
        self.upsert("image_import", drafts)
    }

    pub fn rename_image(&mut self, id: ImageId, name: impl Into<String>) -> StoreResult<Change> {
        let Some(image) = self.state.library.get_mut(&id) else {
            return Ok(skipped("image_rename", SkipReason::NotFound(id)));
        };
        image.name = name.into();
        image.updated_at = Utc::now();
        self.commit("image_rename")?;
        Ok(Change::Applied)
    }

    /// Removes every listed image that exists and prunes the selection.
    ///
    /// Returns the ids actually removed. Nothing is persisted when none were.
    pub fn delete_images(&mut self, ids: &[ImageId]) -> StoreResult<Vec<ImageId>> {
        let removed: Vec<ImageId> = ids
            .iter()
            .copied()
            .filter(|id| self.state.library.remove(id).is_some())
            .collect();
        if removed.is_empty() {
            debug!("event=image_delete module=image_library status=skipped reason=none_found");
            return Ok(removed);
        }

        self.prune_selection();
        debug!(
            "event=image_delete module=image_library status=ok removed_count={}",
            removed.len()
        );
        self.commit("image_delete")?;
        Ok(removed)
    }

    /// Adds `id` to the selection, or removes it when already selected.
    pub fn toggle_selection(&mut self, id: ImageId) -> StoreResult<Change> {
        if !self.state.library.contains_key(&id) {
            return Ok(skipped("image_select", SkipReason::NotFound(id)));
        }
        let selection = &mut self.state.selected_image_ids;
        match selection.iter().position(|selected| *selected == id) {
            Some(index) => {
                selection.remove(index);
            }
            None => selection.push(id),
        }
        self.commit("image_select")?;
        Ok(Change::Applied)
    }

    pub fn select_all(&mut self) -> StoreResult<()> {
        self.state.selected_image_ids = self.state.library.keys().copied().collect();
        self.commit("image_select_all")
    }

    pub fn clear_selection(&mut self) -> StoreResult<()> {
        self.state.selected_image_ids.clear();
        self.commit("image_select_clear")
    }

    /// Adds tags to one image; blank tags are ignored.
    pub fn add_tags<I, S>(&mut self, id: ImageId, tags: I) -> StoreResult<Change>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Some(image) = self.state.library.get_mut(&id) else {
            return Ok(skipped("image_tag", SkipReason::NotFound(id)));
        };
        image.merge_tags(
            tags.into_iter()
                .map(|tag| tag.as_ref().trim().to_string())
                .filter(|tag| !tag.is_empty()),
        );
        image.updated_at = Utc::now();
        self.commit("image_tag")?;
        Ok(Change::Applied)
    }

    pub fn remove_tags<I, S>(&mut self, id: ImageId, tags: I) -> StoreResult<Change>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Some(image) = self.state.library.get_mut(&id) else {
            return Ok(skipped("image_untag", SkipReason::NotFound(id)));
        };
        let doomed: HashSet<String> = tags
            .into_iter()
            .map(|tag| tag.as_ref().trim().to_string())
            .collect();
        image.tags.retain(|tag| !doomed.contains(tag));
        image.updated_at = Utc::now();
        self.commit("image_untag")?;
        Ok(Change::Applied)
    }

    /// Drops every image and the selection. Returns how many were removed.
    pub fn clear_library(&mut self) -> StoreResult<usize> {
        let removed = self.state.library.len();
        self.state.library.clear();
        self.state.selected_image_ids.clear();
        debug!("event=image_clear module=image_library status=ok removed_count={removed}");
        self.commit("image_clear")?;
        Ok(removed)
    }

    /// Newest first by `created_at`; ties keep id order.
    pub fn all_images(&self) -> Vec<&Image> {
        let mut images: Vec<&Image> = self.state.library.values().collect();
        images.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        images
    }

    pub fn image_count(&self) -> usize {
        self.state.library.len()
    }

    /// Sum of the recorded sizes in bytes.
    pub fn total_size(&self) -> u64 {
        self.state
            .library
            .values()
            .fold(0u64, |total, image| total.saturating_add(image.size))
    }

    /// Case-insensitive substring match on names, newest first.
    pub fn images_by_name(&self, query: &str) -> Vec<&Image> {
        let needle = query.trim().to_lowercase();
        self.all_images()
            .into_iter()
            .filter(|image| needle.is_empty() || image.name.to_lowercase().contains(&needle))
            .collect()
    }

    /// Images carrying any of `tags` (case-insensitive), newest first.
    ///
    /// An empty query returns every image.
    pub fn images_by_tags<S: AsRef<str>>(&self, tags: &[S]) -> Vec<&Image> {
        let wanted: Vec<String> = tags
            .iter()
            .map(|tag| tag.as_ref().trim().to_lowercase())
            .filter(|tag| !tag.is_empty())
            .collect();
        self.all_images()
            .into_iter()
            .filter(|image| {
                wanted.is_empty()
                    || image
                        .tags
                        .iter()
                        .any(|tag| wanted.contains(&tag.to_lowercase()))
            })
            .collect()
    }

    /// Selected images in selection order.
    pub fn selected_images(&self) -> Vec<&Image> {
        self.state
            .selected_image_ids
            .iter()
            .filter_map(|id| self.state.library.get(id))
            .collect()
    }

    fn upsert(
        &mut self,
        event: &'static str,
        drafts: impl IntoIterator<Item = ImageDraft>,
    ) -> StoreResult<Vec<ImageId>> {
        let now = Utc::now();
        let mut stored = Vec::new();
        for draft in drafts {
            let id = draft.id.unwrap_or_else(new_id);
            let existing_created_at = self.state.library.get(&id).map(|image| image.created_at);
            let image = draft.into_image(id, existing_created_at, now);
            self.state.library.insert(id, image);
            stored.push(id);
        }
        if stored.is_empty() {
            return Ok(stored);
        }

        debug!(
            "event={event} module=image_library status=ok count={}",
            stored.len()
        );
        self.commit(event)?;
        Ok(stored)
    }

    fn prune_selection(&mut self) {
        let library = &self.state.library;
        let mut seen = HashSet::new();
        self.state
            .selected_image_ids
            .retain(|id| library.contains_key(id) && seen.insert(*id));
    }

    fn commit(&mut self, event: &'static str) -> StoreResult<()> {
        self.persist.persist(&self.state).map_err(|err| {
            error!("event={event} module=image_library status=error stage=persist error={err}");
            StoreError::Storage(err)
        })
    }
}

fn skipped(event: &'static str, reason: SkipReason) -> Change {
    debug!("event={event} module=image_library status=skipped reason=\"{reason}\"");
    Change::Skipped(reason)
}
