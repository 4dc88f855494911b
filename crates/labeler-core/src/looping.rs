//! Loop region resolution
//!
//! When playback starts with looping enabled, one region containing the
//! playhead is chosen and playback is sent back to its start whenever the
//! playhead reaches its end.
//!
//! # Selection
//! Among the regions containing the playhead, pairwise:
//! 1. a region nested inside the current pick wins (smaller is preferred)
//! 2. for partial overlaps the later start wins
//! 3. identical bounds keep the shorter one (the current pick on a tie)
//!
//! This is the same as picking the greatest start and then the smallest
//! end, so the result does not depend on the order regions are visited.

use labeler_types::Region;

use crate::store::SessionStore;

/// Seek back this far before the loop end; covers playback tick granularity
pub const LOOP_EPSILON: f64 = 0.1;

/// Pick the region to loop for a playhead position
pub fn resolve_loop_region<'a, I>(playhead: f64, regions: I) -> Option<&'a Region>
where
    I: IntoIterator<Item = &'a Region>,
{
    regions
        .into_iter()
        .filter(|r| r.contains(playhead))
        .reduce(prefer)
}

/// Preference between the current pick and a challenger
fn prefer<'a>(selected: &'a Region, challenger: &'a Region) -> &'a Region {
    let challenger_inside = selected.encloses(challenger);
    let selected_inside = challenger.encloses(selected);

    match (challenger_inside, selected_inside) {
        // Nested: keep the smaller one
        (true, false) => challenger,
        (false, true) => selected,
        // Partial overlap: the later start is the more relevant one
        (false, false) => {
            if challenger.start > selected.start {
                challenger
            } else {
                selected
            }
        }
        // Identical bounds
        (true, true) => {
            if challenger.duration() < selected.duration() {
                challenger
            } else {
                selected
            }
        }
    }
}

/// Playback-side loop state
///
/// The looping flag is sampled once when playback starts; toggling it while
/// playing only affects the next run.
#[derive(Debug, Clone, Default)]
pub struct LoopController {
    enabled: bool,
    /// Region looped in the current run
    active: Option<String>,
}

impl LoopController {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            active: None,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Set the flag used by the next play
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Id of the region looped in the current run
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Playback started at `playhead`
    pub fn on_play<'a>(&mut self, playhead: f64, store: &'a SessionStore) -> Option<&'a Region> {
        self.active = None;
        if !self.enabled {
            return None;
        }

        let region = resolve_loop_region(playhead, store.find_containing(playhead));
        if let Some(region) = region {
            tracing::debug!(
                "loop: playing {:.3}s inside region {} [{:.3}, {:.3}]",
                playhead,
                region.id,
                region.start,
                region.end
            );
            self.active = Some(region.id.clone());
        }
        region
    }

    /// Playback position changed; returns the seek target when looping back
    ///
    /// Bounds are read from the store on every tick, so dragging the looped
    /// region while playing is honored. A deleted region ends the loop.
    pub fn on_time_update(&mut self, time: f64, store: &SessionStore) -> Option<f64> {
        let id = self.active.as_deref()?;
        let Some(region) = store.region(id) else {
            tracing::debug!("loop: region {} disappeared, loop cleared", id);
            self.active = None;
            return None;
        };

        if time >= region.end - LOOP_EPSILON {
            tracing::trace!("loop: {:.3}s -> seek to {:.3}s", time, region.start);
            Some(region.start)
        } else {
            None
        }
    }

    /// Playback paused
    pub fn on_pause(&mut self) {
        self.active = None;
    }

    /// Drop any run state (source switch)
    pub fn reset(&mut self) {
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn region(id: &str, start: f64, end: f64) -> Region {
        Region {
            id: id.to_string(),
            start,
            end,
        }
    }

    #[test]
    fn test_nested_prefers_inner() {
        let regions = [region("a", 0.0, 10.0), region("b", 2.0, 4.0)];
        assert_eq!(resolve_loop_region(3.0, &regions).unwrap().id, "b");
        let reversed = [region("b", 2.0, 4.0), region("a", 0.0, 10.0)];
        assert_eq!(resolve_loop_region(3.0, &reversed).unwrap().id, "b");
    }

    #[test]
    fn test_overlap_prefers_later_start() {
        let regions = [region("a", 0.0, 5.0), region("b", 3.0, 8.0)];
        assert_eq!(resolve_loop_region(4.0, &regions).unwrap().id, "b");
    }

    #[test]
    fn test_identical_bounds_do_not_panic() {
        let regions = [region("a", 0.0, 5.0), region("b", 0.0, 5.0)];
        let picked = resolve_loop_region(1.0, &regions).unwrap();
        assert_eq!((picked.start, picked.end), (0.0, 5.0));
    }

    #[test]
    fn test_no_containing_region() {
        let regions = [region("a", 0.0, 5.0)];
        assert!(resolve_loop_region(6.0, &regions).is_none());
        let none: [Region; 0] = [];
        assert!(resolve_loop_region(1.0, &none).is_none());
    }

    #[test]
    fn test_controller_loops_back_near_end() {
        let mut store = SessionStore::new();
        let r = store.create_region(2.0, 4.0).unwrap();
        let mut looper = LoopController::new(true);

        assert_eq!(looper.on_play(3.0, &store).unwrap().id, r.id);
        assert_eq!(looper.on_time_update(3.5, &store), None);
        assert_eq!(looper.on_time_update(3.95, &store), Some(2.0));

        looper.on_pause();
        assert_eq!(looper.on_time_update(3.95, &store), None);
    }

    #[test]
    fn test_controller_flag_sampled_at_play() {
        let mut store = SessionStore::new();
        store.create_region(2.0, 4.0).unwrap();

        let mut looper = LoopController::new(false);
        assert!(looper.on_play(3.0, &store).is_none());
        looper.set_enabled(true);
        assert_eq!(looper.on_time_update(3.99, &store), None);

        assert!(looper.on_play(3.0, &store).is_some());
        looper.set_enabled(false);
        assert_eq!(looper.on_time_update(3.99, &store), Some(2.0));
    }

    #[test]
    fn test_controller_follows_region_edits() {
        let mut store = SessionStore::new();
        let r = store.create_region(2.0, 4.0).unwrap();
        let mut looper = LoopController::new(true);
        looper.on_play(3.0, &store);

        store.update_region(&r.id, 2.0, 6.0).unwrap();
        assert_eq!(looper.on_time_update(3.95, &store), None);

        store.delete_region(&r.id);
        assert_eq!(looper.on_time_update(5.95, &store), None);
        assert!(looper.active().is_none());
    }

    fn region_strategy() -> impl Strategy<Value = (u32, u32)> {
        (0u32..40, 1u32..20).prop_map(|(start, len)| (start, start + len))
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

        #[test]
        fn selection_is_order_independent(
            bounds in prop::collection::vec(region_strategy(), 1..8),
            playhead in 0u32..60,
            rotation in 0usize..8,
        ) {
            let regions: Vec<Region> = bounds
                .iter()
                .enumerate()
                .map(|(i, (s, e))| region(&format!("r{}", i), *s as f64, *e as f64))
                .collect();
            let mut shuffled = regions.clone();
            let len = shuffled.len();
            shuffled.rotate_left(rotation % len);
            shuffled.reverse();

            let t = playhead as f64;
            let a = resolve_loop_region(t, &regions).map(|r| (r.start, r.end));
            let b = resolve_loop_region(t, &shuffled).map(|r| (r.start, r.end));
            prop_assert_eq!(a, b);
        }

        #[test]
        fn selection_is_latest_start_then_earliest_end(
            bounds in prop::collection::vec(region_strategy(), 1..8),
            playhead in 0u32..60,
        ) {
            let regions: Vec<Region> = bounds
                .iter()
                .enumerate()
                .map(|(i, (s, e))| region(&format!("r{}", i), *s as f64, *e as f64))
                .collect();
            let t = playhead as f64;

            let expected = regions
                .iter()
                .filter(|r| r.contains(t))
                .map(|r| (r.start, r.end))
                .reduce(|best, next| {
                    if next.0 > best.0 || (next.0 == best.0 && next.1 < best.1) {
                        next
                    } else {
                        best
                    }
                });
            let picked = resolve_loop_region(t, &regions).map(|r| (r.start, r.end));
            prop_assert_eq!(picked, expected);
        }
    }
}
