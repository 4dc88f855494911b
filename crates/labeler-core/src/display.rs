//! Display aggregation
//!
//! Projects the annotation store into table rows. A left/right pair with the
//! same bounds, type and value is shown as a single "both" row that carries
//! both annotation ids.

use labeler_types::{Annotation, Channel, DisplayChannel, DisplayRow};

use crate::party::PartyRegistry;
use crate::store::SessionStore;
use crate::time::format_seconds;

/// Build rows ordered by `(start, end)`
///
/// Pairing is first-match-wins: an annotation consumed into a "both" row is
/// not considered again.
pub fn aggregate(annotations: &[Annotation], parties: &PartyRegistry) -> Vec<DisplayRow> {
    let mut sorted: Vec<&Annotation> = annotations.iter().collect();
    // Stable sort keeps insertion order among equal bounds
    sorted.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.end.total_cmp(&b.end)));

    let mut consumed = vec![false; sorted.len()];
    let mut rows = Vec::with_capacity(sorted.len());

    for i in 0..sorted.len() {
        if consumed[i] {
            continue;
        }
        consumed[i] = true;
        let ann = sorted[i];

        let partner = ann.channel.and_then(|channel| {
            (i + 1..sorted.len())
                .find(|&j| !consumed[j] && is_mirror(ann, sorted[j], channel))
        });

        match partner {
            Some(j) => {
                consumed[j] = true;
                rows.push(both_row(ann, sorted[j], parties));
            }
            None => rows.push(single_row(ann, parties)),
        }
    }

    rows
}

fn is_mirror(ann: &Annotation, other: &Annotation, channel: Channel) -> bool {
    other.channel == Some(channel.opposite())
        && other.start == ann.start
        && other.end == ann.end
        && other.label_type == ann.label_type
        && other.value == ann.value
}

fn single_row(ann: &Annotation, parties: &PartyRegistry) -> DisplayRow {
    DisplayRow {
        key: ann.id.clone(),
        start: ann.start,
        end: ann.end,
        start_display: format_seconds(ann.start),
        end_display: format_seconds(ann.end),
        label_type: ann.label_type.clone(),
        value: ann.value.clone(),
        channel: DisplayChannel::from_channel(ann.channel),
        party_label: parties.label_for(ann.target.as_deref(), ann.channel),
        targets: ann.target.iter().cloned().collect(),
        annotation_ids: vec![ann.id.clone()],
        region_id: ann.region_id.clone(),
    }
}

fn both_row(first: &Annotation, second: &Annotation, parties: &PartyRegistry) -> DisplayRow {
    // Left half first regardless of which one sorted first
    let (left, right) = if first.channel == Some(Channel::Left) {
        (first, second)
    } else {
        (second, first)
    };

    DisplayRow {
        key: first.id.clone(),
        start: first.start,
        end: first.end,
        start_display: format_seconds(first.start),
        end_display: format_seconds(first.end),
        label_type: first.label_type.clone(),
        value: first.value.clone(),
        channel: DisplayChannel::Both,
        party_label: format!(
            "{} & {}",
            parties.label_for(left.target.as_deref(), left.channel),
            parties.label_for(right.target.as_deref(), right.channel)
        ),
        targets: left.target.iter().chain(right.target.iter()).cloned().collect(),
        annotation_ids: vec![left.id.clone(), right.id.clone()],
        region_id: first.region_id.clone().or_else(|| second.region_id.clone()),
    }
}

/// Cached projection, recomputed when the store or the parties change
#[derive(Debug, Default)]
pub struct DisplayAggregator {
    cached: Option<CachedRows>,
}

#[derive(Debug)]
struct CachedRows {
    store_revision: u64,
    party_revision: u64,
    rows: Vec<DisplayRow>,
}

impl DisplayAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current rows for the store
    pub fn rows(&mut self, store: &SessionStore, parties: &PartyRegistry) -> &[DisplayRow] {
        let fresh = matches!(
            &self.cached,
            Some(c) if c.store_revision == store.revision() && c.party_revision == parties.revision()
        );
        if !fresh {
            tracing::trace!("display: recomputing rows at revision {}", store.revision());
            self.cached = Some(CachedRows {
                store_revision: store.revision(),
                party_revision: parties.revision(),
                rows: aggregate(store.annotations(), parties),
            });
        }
        self.cached
            .as_ref()
            .map(|c| c.rows.as_slice())
            .unwrap_or_default()
    }

    /// Forget the cached rows (source switch)
    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labeler_types::LabelTarget;
    use proptest::prelude::*;

    fn ann(id: &str, start: f64, end: f64, value: &str, channel: Option<Channel>) -> Annotation {
        Annotation {
            id: id.to_string(),
            label_type: "sentiment".to_string(),
            value: value.to_string(),
            start,
            end,
            target: channel.map(|c| match c {
                Channel::Left => "party-1".to_string(),
                Channel::Right => "party-2".to_string(),
            }),
            channel,
            region_id: None,
        }
    }

    #[test]
    fn test_pair_merges_into_both_row() {
        let parties = PartyRegistry::new();
        let anns = vec![
            ann("l", 1.0, 2.0, "positive", Some(Channel::Left)),
            ann("r", 1.0, 2.0, "positive", Some(Channel::Right)),
        ];

        let rows = aggregate(&anns, &parties);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].channel, DisplayChannel::Both);
        assert_eq!(rows[0].annotation_ids, vec!["l", "r"]);
        assert_eq!(rows[0].party_label, "Agent & Customer");
        assert_eq!(rows[0].start_display, "1.000");
        assert_eq!(rows[0].end_display, "2.000");
    }

    #[test]
    fn test_times_formatted_to_milliseconds() {
        let parties = PartyRegistry::new();
        let anns = vec![ann("a", 1.5, 3.25, "positive", Some(Channel::Left))];

        let rows = aggregate(&anns, &parties);

        assert_eq!(rows[0].start_display, "1.500");
        assert_eq!(rows[0].end_display, "3.250");
    }

    #[test]
    fn test_different_values_stay_separate() {
        let parties = PartyRegistry::new();
        let anns = vec![
            ann("l", 1.0, 2.0, "positive", Some(Channel::Left)),
            ann("r", 1.0, 2.0, "negative", Some(Channel::Right)),
        ];

        let rows = aggregate(&anns, &parties);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].channel, DisplayChannel::Left);
        assert_eq!(rows[0].party_label, "Agent");
        assert_eq!(rows[1].channel, DisplayChannel::Right);
        assert_eq!(rows[1].party_label, "Customer");
    }

    #[test]
    fn test_first_match_wins() {
        let parties = PartyRegistry::new();
        let anns = vec![
            ann("l1", 1.0, 2.0, "positive", Some(Channel::Left)),
            ann("r1", 1.0, 2.0, "positive", Some(Channel::Right)),
            ann("r2", 1.0, 2.0, "positive", Some(Channel::Right)),
        ];

        let rows = aggregate(&anns, &parties);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].annotation_ids, vec!["l1", "r1"]);
        assert_eq!(rows[1].annotation_ids, vec!["r2"]);
    }

    #[test]
    fn test_rows_sorted_by_start_then_end() {
        let parties = PartyRegistry::new();
        let anns = vec![
            ann("c", 5.0, 6.0, "x", Some(Channel::Left)),
            ann("b", 1.0, 3.0, "x", Some(Channel::Left)),
            ann("a", 1.0, 2.0, "x", Some(Channel::Right)),
            ann("g", 0.5, 9.0, "x", None),
        ];

        let rows = aggregate(&anns, &parties);
        let keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();

        assert_eq!(keys, vec!["g", "a", "b", "c"]);
        assert_eq!(rows[0].channel, DisplayChannel::Unassigned);
    }

    #[test]
    fn test_aggregator_cache_tracks_mutations() {
        let parties = PartyRegistry::new();
        let mut store = SessionStore::new();
        let mut aggregator = DisplayAggregator::new();
        let region = store.create_region(1.0, 2.0).unwrap();

        assert!(aggregator.rows(&store, &parties).is_empty());

        store
            .set_label(&region.id, "sentiment", "positive", LabelTarget::Both, &parties)
            .unwrap();
        assert_eq!(aggregator.rows(&store, &parties).len(), 1);

        let mut renamed = parties.clone();
        renamed.update(
            Channel::Left,
            Some("Ann".to_string()),
            labeler_types::PartyRole::Agent,
            None,
        );
        assert_eq!(
            aggregator.rows(&store, &renamed)[0].party_label,
            "Ann & Customer"
        );
    }

    #[test]
    fn test_deleting_both_row_removes_region() {
        let parties = PartyRegistry::new();
        let mut store = SessionStore::new();
        let region = store.create_region(1.0, 2.0).unwrap();
        store
            .set_label(&region.id, "sentiment", "positive", LabelTarget::Both, &parties)
            .unwrap();

        let rows = aggregate(store.annotations(), &parties);
        assert_eq!(rows.len(), 1);
        let removal = store.delete_annotations(&rows[0].annotation_ids);

        assert_eq!(removal.annotations.len(), 2);
        assert_eq!(removal.regions.len(), 1);
        assert!(store.is_empty());
    }

    fn annotation_strategy() -> impl Strategy<Value = (u8, u8, u8, Option<u8>)> {
        (0u8..4, 1u8..3, 0u8..2, prop::option::of(0u8..2))
    }

    proptest! {
        #[test]
        fn every_annotation_lands_in_exactly_one_row(
            specs in prop::collection::vec(annotation_strategy(), 0..12),
        ) {
            let parties = PartyRegistry::new();
            let anns: Vec<Annotation> = specs
                .iter()
                .enumerate()
                .map(|(i, (start, len, value, channel))| {
                    let channel = channel.map(|c| Channel::try_from(c).unwrap());
                    ann(
                        &format!("a{}", i),
                        *start as f64,
                        (*start + *len) as f64,
                        if *value == 0 { "positive" } else { "negative" },
                        channel,
                    )
                })
                .collect();

            let rows = aggregate(&anns, &parties);
            let mut ids: Vec<String> = rows
                .iter()
                .flat_map(|r| r.annotation_ids.iter().cloned())
                .collect();
            ids.sort();
            let mut expected: Vec<String> = anns.iter().map(|a| a.id.clone()).collect();
            expected.sort();
            prop_assert_eq!(ids, expected);

            for pair in rows.windows(2) {
                prop_assert!((pair[0].start, pair[0].end) <= (pair[1].start, pair[1].end));
            }
        }
    }
}
