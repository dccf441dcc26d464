use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub start_label: String,
    pub end_label: String,
    pub distance_meters: f64,
    pub duration_seconds: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSource {
    Lookup,
    Estimated,
}

/// Route totals are always derived from the legs so they sum exactly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub total_distance_meters: f64,
    pub total_duration_seconds: f64,
    pub legs: Vec<Leg>,
    pub source: RouteSource,
}

impl Route {
    pub fn from_legs(legs: Vec<Leg>, source: RouteSource) -> Self {
        let total_distance_meters = legs.iter().map(|leg| leg.distance_meters).sum();
        let total_duration_seconds = legs.iter().map(|leg| leg.duration_seconds).sum();

        Self {
            total_distance_meters,
            total_duration_seconds,
            legs,
            source,
        }
    }

    pub fn distance_km(&self) -> f64 {
        self.total_distance_meters / 1000.0
    }

    pub fn duration_minutes(&self) -> f64 {
        self.total_duration_seconds / 60.0
    }
}
