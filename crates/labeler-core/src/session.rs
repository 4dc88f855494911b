//! Annotation session
//!
//! Ties the stores, the party registry, the loop controller and the display
//! projection together for one audio source. Every operator action goes
//! through here so region selection and cached rows stay in step with the
//! stores.

use labeler_types::{
    Annotation, Channel, DisplayRow, LabelDraft, LabelTarget, Party, PartyRole, Region,
    VconDocument,
};

use crate::codec::{self, MediaInfo, RestoreReport};
use crate::display::DisplayAggregator;
use crate::error::{LabelerError, Result};
use crate::looping::LoopController;
use crate::party::PartyRegistry;
use crate::store::{channels_of, Removal, SessionStore};
use crate::vocabulary::LabelVocabulary;

pub struct Session {
    store: SessionStore,
    parties: PartyRegistry,
    media: MediaInfo,
    media_revision: u64,
    looper: LoopController,
    display: DisplayAggregator,
    /// Region last created, moved or clicked
    active_region: Option<String>,
    vocabulary: LabelVocabulary,
}

impl Session {
    pub fn new(vocabulary: LabelVocabulary, looping: bool) -> Self {
        Self {
            store: SessionStore::new(),
            parties: PartyRegistry::new(),
            media: MediaInfo::default(),
            media_revision: 0,
            looper: LoopController::new(looping),
            display: DisplayAggregator::new(),
            active_region: None,
            vocabulary,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn parties(&self) -> &PartyRegistry {
        &self.parties
    }

    pub fn media(&self) -> &MediaInfo {
        &self.media
    }

    pub fn vocabulary(&self) -> &LabelVocabulary {
        &self.vocabulary
    }

    pub fn active_region(&self) -> Option<&Region> {
        self.active_region
            .as_deref()
            .and_then(|id| self.store.region(id))
    }

    pub fn duration(&self) -> Option<f64> {
        self.media.duration
    }

    pub fn looping(&self) -> bool {
        self.looper.enabled()
    }

    /// Changes whenever something that is persisted changes
    pub fn content_revision(&self) -> u64 {
        self.store.revision() + self.parties.revision() + self.media_revision
    }

    // ========================================================================
    // Source lifecycle
    // ========================================================================

    /// Drop everything bound to the previous source
    ///
    /// Parties go back to the defaults; the looping flag and the vocabulary
    /// are operator preferences and survive.
    pub fn reset(&mut self, media: MediaInfo) {
        self.store.clear_all();
        let defaults = PartyRegistry::new();
        self.parties
            .replace(defaults.left().clone(), defaults.right().clone());
        self.media = media;
        self.media_revision += 1;
        self.looper.reset();
        self.display.invalidate();
        self.active_region = None;
    }

    pub fn set_duration(&mut self, duration: f64) {
        if self.media.duration != Some(duration) {
            self.media.duration = Some(duration);
            self.media_revision += 1;
        }
    }

    /// Rebuild regions, annotations and parties from a stored document
    pub fn restore(&mut self, doc: &VconDocument) -> RestoreReport {
        let report = codec::restore(doc, &mut self.store, &mut self.parties);
        self.active_region = None;
        self.looper.reset();
        self.display.invalidate();
        report
    }

    pub fn to_document(&self) -> VconDocument {
        codec::encode(&self.store, &self.parties, &self.media)
    }

    pub fn to_json(&self) -> Result<String> {
        codec::to_json(&self.store, &self.parties, &self.media)
    }

    // ========================================================================
    // Regions
    // ========================================================================

    pub fn create_region(&mut self, start: f64, end: f64) -> Result<Region> {
        let (start, end) = self.clamp(start, end)?;
        let region = self.store.create_region(start, end)?;
        self.active_region = Some(region.id.clone());
        Ok(region)
    }

    /// Region of `length` seconds starting at the playhead, cut at the end of
    /// the file
    pub fn add_region_at(&mut self, playhead: f64, length: f64) -> Result<Region> {
        self.create_region(playhead, playhead + length)
    }

    pub fn update_region(&mut self, id: &str, start: f64, end: f64) -> Result<usize> {
        let (start, end) = self.clamp(start, end)?;
        let updated = self.store.update_region(id, start, end)?;
        self.active_region = Some(id.to_string());
        Ok(updated)
    }

    /// Mark a region as the current selection
    pub fn select_region(&mut self, id: &str) -> Option<&Region> {
        let region = self.store.region(id)?;
        self.active_region = Some(region.id.clone());
        Some(region)
    }

    pub fn delete_region(&mut self, id: &str) -> Removal {
        let removal = self.store.delete_region(id);
        self.forget_removed(&removal);
        removal
    }

    pub fn delete_active_region(&mut self) -> Removal {
        match self.active_region.take() {
            Some(id) => self.delete_region(&id),
            None => Removal::default(),
        }
    }

    // ========================================================================
    // Labels
    // ========================================================================

    pub fn set_label(
        &mut self,
        region_id: &str,
        label_type: &str,
        value: &str,
        target: LabelTarget,
    ) -> Result<Vec<Annotation>> {
        if !label_type.trim().is_empty() && !self.vocabulary.contains(label_type.trim()) {
            tracing::debug!("set_label: type {:?} is not in the vocabulary", label_type);
        }
        self.store
            .set_label(region_id, label_type, value, target, &self.parties)
    }

    /// Prefill for the label form of a region
    ///
    /// Reuses the region's current label; a region labeled on both channels
    /// gets a `Both` target.
    pub fn label_draft(&self, region_id: &str) -> LabelDraft {
        let annotations = self.store.annotations_for(region_id);
        let Some(first) = annotations.first() else {
            return LabelDraft {
                label_type: self.vocabulary.default_type().to_string(),
                value: String::new(),
                target: LabelTarget::Left,
            };
        };

        let target = match channels_of(&annotations) {
            (true, true) => LabelTarget::Both,
            _ => match first.channel {
                Some(Channel::Right) => LabelTarget::Right,
                _ => LabelTarget::Left,
            },
        };
        LabelDraft {
            label_type: first.label_type.clone(),
            value: first.value.clone(),
            target,
        }
    }

    pub fn delete_annotation(&mut self, id: &str) -> Removal {
        let removal = self.store.delete_annotation(id);
        self.forget_removed(&removal);
        removal
    }

    /// Delete every annotation behind a display row
    pub fn delete_row<S: AsRef<str>>(&mut self, annotation_ids: &[S]) -> Removal {
        let removal = self.store.delete_annotations(annotation_ids);
        self.forget_removed(&removal);
        removal
    }

    pub fn clear_all(&mut self) {
        self.store.clear_all();
        self.active_region = None;
        self.looper.reset();
    }

    pub fn rows(&mut self) -> &[DisplayRow] {
        self.display.rows(&self.store, &self.parties)
    }

    // ========================================================================
    // Parties
    // ========================================================================

    pub fn set_party(
        &mut self,
        channel: Channel,
        name: Option<String>,
        role: PartyRole,
        uri: Option<String>,
    ) {
        self.parties.update(channel, name, role, uri);
    }

    pub fn replace_parties(&mut self, left: Party, right: Party) {
        self.parties.replace(left, right);
    }

    // ========================================================================
    // Playback
    // ========================================================================

    /// Takes effect at the next play
    pub fn set_looping(&mut self, enabled: bool) {
        self.looper.set_enabled(enabled);
    }

    pub fn play(&mut self, playhead: f64) -> Option<Region> {
        self.looper.on_play(playhead, &self.store).cloned()
    }

    /// Seek target when the looped region's end was reached
    pub fn time_update(&mut self, time: f64) -> Option<f64> {
        self.looper.on_time_update(time, &self.store)
    }

    pub fn pause(&mut self) {
        self.looper.on_pause();
    }

    /// Fit bounds into `[0, duration]`; non-finite bounds are rejected
    fn clamp(&self, start: f64, end: f64) -> Result<(f64, f64)> {
        if !start.is_finite() || !end.is_finite() {
            return Err(LabelerError::InvalidRange { start, end });
        }
        let start = start.max(0.0);
        Ok(match self.media.duration {
            Some(duration) if duration > 0.0 => (start, end.min(duration)),
            _ => (start, end),
        })
    }

    fn forget_removed(&mut self, removal: &Removal) {
        if let Some(active) = &self.active_region {
            if removal.regions.iter().any(|r| &r.id == active) {
                self.active_region = None;
            }
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(LabelVocabulary::default(), false)
    }
}
