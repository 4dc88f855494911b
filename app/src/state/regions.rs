//! Region visual layer adapter
//!
//! Maps the waveform widget's region handles to region ids. The handles are
//! foreign keys into the region store; events on them are translated into
//! session operations and store-side removals are mirrored back as visual
//! removals.

use labeler_core::{LabelerError, Removal};
use labeler_types::{LabelDraft, Region};
use std::collections::HashMap;

use super::AppState;
use crate::providers::RegionLayer;

pub struct RegionBridge<L: RegionLayer> {
    layer: L,
    by_handle: HashMap<L::Handle, String>,
    by_region: HashMap<String, L::Handle>,
}

impl<L: RegionLayer> RegionBridge<L> {
    pub fn new(layer: L) -> Self {
        Self {
            layer,
            by_handle: HashMap::new(),
            by_region: HashMap::new(),
        }
    }

    pub fn layer(&self) -> &L {
        &self.layer
    }

    pub fn region_id(&self, handle: &L::Handle) -> Option<&str> {
        self.by_handle.get(handle).map(String::as_str)
    }

    pub fn handle_for(&self, region_id: &str) -> Option<&L::Handle> {
        self.by_region.get(region_id)
    }

    /// The operator drew a region
    ///
    /// A drawing the store rejects is removed from the layer again.
    pub fn region_created(
        &mut self,
        state: &AppState,
        handle: L::Handle,
        start: f64,
        end: f64,
    ) -> labeler_core::Result<Region> {
        match state.create_region(start, end) {
            Ok(region) => {
                self.bind(handle, region.id.clone());
                Ok(region)
            }
            Err(e) => {
                tracing::debug!("Rejected drawn region [{:.3}, {:.3}]: {}", start, end, e);
                self.layer.remove_visual_region(&handle);
                Err(e)
            }
        }
    }

    /// The operator dragged or resized a region
    ///
    /// A rejected move redraws the region at its stored bounds.
    pub fn region_updated(
        &mut self,
        state: &AppState,
        handle: &L::Handle,
        start: f64,
        end: f64,
    ) -> labeler_core::Result<usize> {
        let id = self.bound_id(handle)?;
        match state.update_region(&id, start, end) {
            Ok(updated) => Ok(updated),
            Err(e @ LabelerError::InvalidRange { .. }) => {
                if let Some(region) = state.regions().into_iter().find(|r| r.id == id) {
                    self.unbind_region(&id);
                    let redrawn = self.layer.create_visual_region(region.start, region.end);
                    self.bind(redrawn, id);
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// The operator clicked a region; returns the label form prefill
    pub fn region_clicked(
        &mut self,
        state: &AppState,
        handle: &L::Handle,
    ) -> labeler_core::Result<LabelDraft> {
        let id = self.bound_id(handle)?;
        state
            .select_region(&id)
            .ok_or_else(|| LabelerError::region_not_found(&id))?;
        Ok(state.label_draft(&id))
    }

    pub fn delete_region(&mut self, state: &AppState, region_id: &str) -> Removal {
        let removal = state.delete_region(region_id);
        self.apply_removal(&removal);
        removal
    }

    pub fn delete_annotation(&mut self, state: &AppState, annotation_id: &str) -> Removal {
        let removal = state.delete_annotation(annotation_id);
        self.apply_removal(&removal);
        removal
    }

    pub fn delete_row(&mut self, state: &AppState, annotation_ids: &[String]) -> Removal {
        let removal = state.delete_row(annotation_ids);
        self.apply_removal(&removal);
        removal
    }

    pub fn clear_all(&mut self, state: &AppState) {
        state.clear_all();
        self.remove_all();
    }

    /// Remove the drawings of regions the store dropped
    pub fn apply_removal(&mut self, removal: &Removal) {
        for region in &removal.regions {
            self.unbind_region(&region.id);
        }
    }

    /// Redraw every region of the current session (after a load or switch)
    pub fn show_session(&mut self, state: &AppState) {
        self.remove_all();
        for region in state.regions() {
            let handle = self.layer.create_visual_region(region.start, region.end);
            self.bind(handle, region.id);
        }
        tracing::debug!("Drew {} regions", self.by_region.len());
    }

    fn bound_id(&self, handle: &L::Handle) -> labeler_core::Result<String> {
        self.by_handle
            .get(handle)
            .cloned()
            .ok_or_else(|| LabelerError::NotFound {
                kind: "visual region",
                id: String::new(),
            })
    }

    fn bind(&mut self, handle: L::Handle, region_id: String) {
        self.by_handle.insert(handle.clone(), region_id.clone());
        self.by_region.insert(region_id, handle);
    }

    fn unbind_region(&mut self, region_id: &str) {
        if let Some(handle) = self.by_region.remove(region_id) {
            self.by_handle.remove(&handle);
            self.layer.remove_visual_region(&handle);
        }
    }

    fn remove_all(&mut self) {
        for (handle, _) in self.by_handle.drain() {
            self.layer.remove_visual_region(&handle);
        }
        self.by_region.clear();
    }
}
