//! Region and annotation store
//!
//! Regions own the timing truth; annotations carry a denormalized copy of
//! their region's bounds. The store keeps both sets consistent:
//! - updating a region re-bounds every linked annotation
//! - deleting a region deletes its annotations
//! - deleting the last annotation of a region deletes the region
//!
//! Only these cascade-safe operations are exposed; there is no raw insert
//! or remove. All bounds are kept at millisecond precision.

use std::collections::HashMap;

use labeler_types::{Annotation, Channel, LabelTarget, Region};
use uuid::Uuid;

use crate::error::{LabelerError, Result};
use crate::party::PartyRegistry;
use crate::time::round3;

/// Label type used when the operator leaves the type empty
pub const FALLBACK_LABEL_TYPE: &str = "label";

/// Everything a delete removed (empty when the id was already gone)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Removal {
    pub regions: Vec<Region>,
    pub annotations: Vec<Annotation>,
}

impl Removal {
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty() && self.annotations.is_empty()
    }

    fn absorb(&mut self, other: Removal) {
        self.regions.extend(other.regions);
        self.annotations.extend(other.annotations);
    }
}

/// Regions and annotations of one session
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    /// Regions in creation order
    regions: Vec<Region>,
    /// Annotations in insertion order
    annotations: Vec<Annotation>,
    /// region id -> ids of annotations linked to it
    by_region: HashMap<String, Vec<String>>,
    revision: u64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn region(&self, id: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }

    pub fn annotation(&self, id: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id == id)
    }

    /// Annotations linked to a region, in insertion order
    pub fn annotations_for(&self, region_id: &str) -> Vec<&Annotation> {
        match self.by_region.get(region_id) {
            Some(ids) => ids.iter().filter_map(|id| self.annotation(id)).collect(),
            None => Vec::new(),
        }
    }

    /// All regions with `start <= time <= end`
    pub fn find_containing(&self, time: f64) -> Vec<&Region> {
        self.regions.iter().filter(|r| r.contains(time)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty() && self.annotations.is_empty()
    }

    /// Bumped on every mutation; used to invalidate cached projections
    pub fn revision(&self) -> u64 {
        self.revision
    }

    // ========================================================================
    // Region operations
    // ========================================================================

    /// Create a region with a freshly minted id
    pub fn create_region(&mut self, start: f64, end: f64) -> Result<Region> {
        let (start, end) = checked_bounds(start, end)?;
        let region = Region {
            id: Uuid::new_v4().to_string(),
            start,
            end,
        };
        self.by_region.insert(region.id.clone(), Vec::new());
        self.regions.push(region.clone());
        self.touch();

        tracing::debug!(
            "create_region: {} [{:.3}, {:.3}]",
            region.id,
            region.start,
            region.end
        );
        Ok(region)
    }

    /// Re-bound a region and propagate the bounds to its annotations
    ///
    /// Returns the number of annotations that were re-bounded.
    pub fn update_region(&mut self, id: &str, start: f64, end: f64) -> Result<usize> {
        let (start, end) = checked_bounds(start, end)?;
        let region = self
            .regions
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| LabelerError::region_not_found(id))?;
        region.start = start;
        region.end = end;

        let mut updated = 0;
        for ann in self
            .annotations
            .iter_mut()
            .filter(|a| a.region_id.as_deref() == Some(id))
        {
            ann.start = start;
            ann.end = end;
            updated += 1;
        }
        self.touch();

        tracing::debug!(
            "update_region: {} -> [{:.3}, {:.3}], {} annotations re-bounded",
            id,
            start,
            end,
            updated
        );
        Ok(updated)
    }

    /// Delete a region and every annotation linked to it
    pub fn delete_region(&mut self, id: &str) -> Removal {
        let Some(pos) = self.regions.iter().position(|r| r.id == id) else {
            tracing::debug!("delete_region: {} already gone", id);
            return Removal::default();
        };
        let region = self.regions.remove(pos);
        let linked = self.by_region.remove(id).unwrap_or_default();

        let mut removed = Vec::with_capacity(linked.len());
        self.annotations.retain(|a| {
            if a.region_id.as_deref() == Some(id) {
                removed.push(a.clone());
                false
            } else {
                true
            }
        });
        self.touch();

        tracing::debug!(
            "delete_region: {} removed with {} annotations",
            id,
            removed.len()
        );
        Removal {
            regions: vec![region],
            annotations: removed,
        }
    }

    // ========================================================================
    // Annotation operations
    // ========================================================================

    /// Replace all annotations of a region with a new label
    ///
    /// `Left`/`Right` write one annotation on that channel, `Both` writes a
    /// mirrored pair. The target party is resolved from `parties`.
    pub fn set_label(
        &mut self,
        region_id: &str,
        label_type: &str,
        value: &str,
        target: LabelTarget,
        parties: &PartyRegistry,
    ) -> Result<Vec<Annotation>> {
        let region = self
            .region(region_id)
            .cloned()
            .ok_or_else(|| LabelerError::region_not_found(region_id))?;

        let previous = self.by_region.insert(region.id.clone(), Vec::new());
        let replaced = previous.map(|ids| ids.len()).unwrap_or(0);
        self.annotations
            .retain(|a| a.region_id.as_deref() != Some(region_id));

        let label_type = if label_type.trim().is_empty() {
            FALLBACK_LABEL_TYPE
        } else {
            label_type
        };

        let created: Vec<Annotation> = target
            .channels()
            .iter()
            .map(|&channel| Annotation {
                id: Uuid::new_v4().to_string(),
                label_type: label_type.to_string(),
                value: value.to_string(),
                start: round3(region.start),
                end: round3(region.end),
                target: Some(parties.party(channel).id.clone()),
                channel: Some(channel),
                region_id: Some(region.id.clone()),
            })
            .collect();

        for ann in &created {
            self.push_linked(ann.clone());
        }
        self.touch();

        tracing::debug!(
            "set_label: region {} -> {}={} ({:?}), replaced {} annotations",
            region.id,
            label_type,
            value,
            target,
            replaced
        );
        Ok(created)
    }

    /// Delete one annotation; drops its region when it was the last one
    ///
    /// Deleting an id that is already gone is a no-op.
    pub fn delete_annotation(&mut self, id: &str) -> Removal {
        let Some(pos) = self.annotations.iter().position(|a| a.id == id) else {
            tracing::debug!("delete_annotation: {} already gone", id);
            return Removal::default();
        };
        let ann = self.annotations.remove(pos);
        self.touch();

        let mut removal = Removal {
            regions: Vec::new(),
            annotations: vec![ann.clone()],
        };

        let Some(region_id) = ann.region_id.as_deref() else {
            return removal;
        };
        let orphaned = match self.by_region.get_mut(region_id) {
            Some(ids) => {
                ids.retain(|other| other != id);
                ids.is_empty()
            }
            None => false,
        };
        if orphaned {
            // The region has no annotations left, so this cannot cascade back.
            removal.absorb(self.delete_region(region_id));
            tracing::debug!(
                "delete_annotation: {} was the last label, region {} removed",
                id,
                region_id
            );
        }
        removal
    }

    /// Delete several annotations (e.g. both halves of a display row)
    pub fn delete_annotations<S: AsRef<str>>(&mut self, ids: &[S]) -> Removal {
        let mut removal = Removal::default();
        for id in ids {
            removal.absorb(self.delete_annotation(id.as_ref()));
        }
        removal
    }

    /// Empty both sets
    pub fn clear_all(&mut self) {
        self.regions.clear();
        self.annotations.clear();
        self.by_region.clear();
        self.touch();
    }

    // ========================================================================
    // Reconstruction
    // ========================================================================

    /// Link a reconstructed annotation to an existing region
    ///
    /// The annotation takes the region's bounds. A missing or duplicate id is
    /// replaced with a fresh one so ids stay unique.
    pub(crate) fn attach(&mut self, mut ann: Annotation, region_id: &str) -> Result<Annotation> {
        let region = self
            .region(region_id)
            .cloned()
            .ok_or_else(|| LabelerError::region_not_found(region_id))?;

        if ann.id.is_empty() || self.annotation(&ann.id).is_some() {
            let fresh = Uuid::new_v4().to_string();
            tracing::warn!(
                "attach: annotation id {:?} is empty or duplicated, using {}",
                ann.id,
                fresh
            );
            ann.id = fresh;
        }
        ann.start = region.start;
        ann.end = region.end;
        ann.region_id = Some(region.id);

        self.push_linked(ann.clone());
        self.touch();
        Ok(ann)
    }

    fn push_linked(&mut self, ann: Annotation) {
        if let Some(region_id) = &ann.region_id {
            self.by_region
                .entry(region_id.clone())
                .or_default()
                .push(ann.id.clone());
        }
        self.annotations.push(ann);
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}

/// Validate and round region bounds
fn checked_bounds(start: f64, end: f64) -> Result<(f64, f64)> {
    if !start.is_finite() || !end.is_finite() {
        return Err(LabelerError::InvalidRange { start, end });
    }
    let (rounded_start, rounded_end) = (round3(start), round3(end));
    if rounded_end <= rounded_start {
        return Err(LabelerError::InvalidRange { start, end });
    }
    Ok((rounded_start, rounded_end))
}

/// Channels present among a region's annotations
pub fn channels_of(annotations: &[&Annotation]) -> (bool, bool) {
    let has = |c: Channel| annotations.iter().any(|a| a.channel == Some(c));
    (has(Channel::Left), has(Channel::Right))
}
