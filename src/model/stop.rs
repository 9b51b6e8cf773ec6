use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::{DirectionId, RouteId, StopId};

#[derive(Clone, Debug, Serialize)]
pub struct Stop {
    pub id: StopId,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    /// External codes from the stop's own row (RBL numbers for Wiener Linien).
    pub codes: Vec<String>,
    pub zone_id: Option<String>,
    pub parent_station: Option<String>,
    /// Routes calling here and the directions they call in.
    pub routes: BTreeMap<RouteId, BTreeSet<DirectionId>>,
    pub variant: Option<StopVariant>,
}

/// Set on every stop whose name is shared with at least one other stop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StopVariant {
    /// Every other stop with the same name, sorted.
    pub siblings: Vec<StopId>,
    /// Union of the codes of all same-named stops, sorted and deduplicated.
    pub codes: Vec<String>,
}

impl Stop {
    pub fn is_variant(&self) -> bool {
        self.variant.is_some()
    }

    /// Case-insensitive grouping key for consolidation.
    pub fn name_key(&self) -> String {
        name_key(&self.name)
    }

    /// Codes to display: the merged group codes for variants, otherwise the stop's own.
    pub fn display_codes(&self) -> &[String] {
        match &self.variant {
            Some(variant) => &variant.codes,
            None => &self.codes,
        }
    }

    pub fn record_call(&mut self, route_id: &RouteId, direction_id: &DirectionId) {
        // Avoid cloning keys on the hot path when the entry already exists.
        if let Some(directions) = self.routes.get_mut(route_id) {
            if !directions.contains(direction_id) {
                directions.insert(direction_id.clone());
            }
            return;
        }
        self.routes
            .insert(route_id.clone(), BTreeSet::from([direction_id.clone()]));
    }
}

pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Stops sharing one name, compared case-insensitively.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StationVariantGroup {
    /// Trimmed, lower-cased name.
    pub key: String,
    /// Display name, taken from the member with the smallest stop id.
    pub name: String,
    /// Member stop ids, sorted.
    pub stops: Vec<StopId>,
}

impl StationVariantGroup {
    pub fn has_variants(&self) -> bool {
        self.stops.len() > 1
    }
}
