//! Duplicate-stop consolidation.
//!
//! Stops are grouped by trimmed, lower-cased name. Members of a group with
//! more than one stop are marked as variants and learn their siblings and
//! the merged external codes of the whole group. Nothing else on the stop is
//! touched, so every stop id stays addressable with its own routes map.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::model::{StationVariantGroup, Stop, StopId, StopVariant};

/// Annotates variants in place and returns one group per distinct name.
/// Single-stop groups are returned too; their stops are left unchanged.
#[tracing::instrument(skip_all, fields(stops = stops.len()))]
pub fn consolidate(stops: &mut BTreeMap<StopId, Stop>) -> BTreeMap<String, StationVariantGroup> {
    let mut groups: BTreeMap<String, StationVariantGroup> = BTreeMap::new();

    // BTreeMap iteration is ordered by stop id, so the first member seen is
    // the smallest id and its name becomes the display name.
    for stop in stops.values() {
        let key = stop.name_key();
        groups
            .entry(key.clone())
            .or_insert_with(|| StationVariantGroup {
                key,
                name: stop.name.clone(),
                stops: Vec::new(),
            })
            .stops
            .push(stop.id.clone());
    }

    let mut variant_groups = 0usize;
    for group in groups.values().filter(|g| g.has_variants()) {
        variant_groups += 1;
        let codes: Vec<String> = group
            .stops
            .iter()
            .filter_map(|id| stops.get(id))
            .flat_map(|s| s.codes.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        debug!(
            station = %group.name,
            members = group.stops.len(),
            codes = codes.len(),
            "Consolidated duplicate stops"
        );

        for id in &group.stops {
            let siblings = group.stops.iter().filter(|s| *s != id).cloned().collect();
            if let Some(stop) = stops.get_mut(id) {
                stop.variant = Some(StopVariant {
                    siblings,
                    codes: codes.clone(),
                });
            }
        }
    }

    info!(groups = groups.len(), variant_groups, "Consolidated stations");
    groups
}
