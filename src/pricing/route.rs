use chrono::{NaiveDateTime, Timelike};
use std::collections::HashMap;
use std::iter;

use crate::entities::{Coordinates, Leg, Route, RouteSource};
use crate::pricing::location::{is_airport_label, normalize, LocationResolver};

const PEAK_SPEED_KMH: f64 = 20.0;
const NIGHT_SPEED_KMH: f64 = 40.0;
const DEFAULT_SPEED_KMH: f64 = 30.0;
const OUT_OF_TOWN_BONUS_KMH: f64 = 20.0;

/// Precomputed `(km, minutes)` pairs for well-known trips, matched in either direction.
#[derive(Clone, Debug, Default)]
pub struct DistanceTable {
    entries: HashMap<(String, String), (f64, f64)>,
}

impl DistanceTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn paris() -> Self {
        Self::empty()
            .with_entry("aeroport charles de gaulle", "paris", 32.0, 45.0)
            .with_entry("orly", "paris", 18.0, 30.0)
            .with_entry("aeroport charles de gaulle", "orly", 45.0, 55.0)
            .with_entry("paris", "versailles", 21.0, 35.0)
            .with_entry("paris", "disneyland", 40.0, 50.0)
    }

    pub fn with_entry(mut self, origin: &str, destination: &str, km: f64, minutes: f64) -> Self {
        self.entries
            .insert((normalize(origin), normalize(destination)), (km, minutes));
        self
    }

    pub fn lookup(&self, origin: &str, destination: &str) -> Option<(f64, f64)> {
        let origin = normalize(origin);
        let destination = normalize(destination);

        self.entries
            .get(&(origin.clone(), destination.clone()))
            .or_else(|| self.entries.get(&(destination, origin)))
            .copied()
    }
}

pub fn is_night(hour: u32) -> bool {
    hour >= 22 || hour < 6
}

pub fn is_peak(hour: u32) -> bool {
    (7..=9).contains(&hour) || (17..=19).contains(&hour)
}

/// Distance correction applied to the raw great-circle total.
pub fn correction_factor(raw_total_meters: f64, origin: &str, destination: &str) -> f64 {
    if is_airport_label(origin) || is_airport_label(destination) {
        return 1.15;
    }

    if raw_total_meters < 3_000.0 {
        1.3
    } else if raw_total_meters < 10_000.0 {
        1.2
    } else {
        1.1
    }
}

pub fn average_speed_kmh(hour: u32, out_of_town: bool) -> f64 {
    let speed = if is_peak(hour) {
        PEAK_SPEED_KMH
    } else if is_night(hour) {
        NIGHT_SPEED_KMH
    } else {
        DEFAULT_SPEED_KMH
    };

    if out_of_town {
        speed + OUT_OF_TOWN_BONUS_KMH
    } else {
        speed
    }
}

#[derive(Clone, Debug)]
pub struct RouteEstimator {
    resolver: LocationResolver,
    table: DistanceTable,
    urban_radius_meters: f64,
}

impl RouteEstimator {
    pub fn new(resolver: LocationResolver, table: DistanceTable, urban_radius_km: f64) -> Self {
        Self {
            resolver,
            table,
            urban_radius_meters: urban_radius_km * 1000.0,
        }
    }

    fn is_urban(&self, point: &Coordinates) -> bool {
        self.resolver.city_center().distance_to(point) <= self.urban_radius_meters
    }

    #[tracing::instrument(skip(self))]
    pub fn estimate(
        &self,
        origin: &str,
        destination: &str,
        stops: &[String],
        at: NaiveDateTime,
    ) -> Route {
        // the table only knows direct trips
        if stops.is_empty() {
            if let Some((km, minutes)) = self.table.lookup(origin, destination) {
                tracing::debug!("using precomputed distance {} km / {} min", km, minutes);

                let leg = Leg {
                    start_label: origin.into(),
                    end_label: destination.into(),
                    distance_meters: km * 1000.0,
                    duration_seconds: minutes * 60.0,
                };

                return Route::from_legs(vec![leg], RouteSource::Lookup);
            }
        }

        let labels: Vec<&str> = iter::once(origin)
            .chain(stops.iter().map(String::as_str))
            .chain(iter::once(destination))
            .collect();

        let points: Vec<Coordinates> = labels
            .iter()
            .map(|label| self.resolver.resolve(label))
            .collect();

        let raw_distances: Vec<f64> = points
            .windows(2)
            .map(|pair| pair[0].distance_to(&pair[1]))
            .collect();

        let raw_total: f64 = raw_distances.iter().sum();
        let factor = correction_factor(raw_total, origin, destination);

        let out_of_town = match (points.first(), points.last()) {
            (Some(first), Some(last)) => !self.is_urban(first) && !self.is_urban(last),
            _ => false,
        };
        let speed_kmh = average_speed_kmh(at.hour(), out_of_town);
        let meters_per_second = speed_kmh * 1000.0 / 3600.0;

        let legs = labels
            .windows(2)
            .zip(raw_distances)
            .map(|(pair, raw)| {
                let distance_meters = raw * factor;

                Leg {
                    start_label: pair[0].into(),
                    end_label: pair[1].into(),
                    distance_meters,
                    duration_seconds: distance_meters / meters_per_second,
                }
            })
            .collect();

        let route = Route::from_legs(legs, RouteSource::Estimated);

        tracing::debug!(
            "estimated {:.0} m / {:.0} s (factor {}, {} km/h)",
            route.total_distance_meters,
            route.total_duration_seconds,
            factor,
            speed_kmh
        );

        route
    }
}

#[cfg(test)]
fn estimator() -> RouteEstimator {
    let resolver = LocationResolver::new(Coordinates::new(48.8566, 2.3522), 0.05);
    RouteEstimator::new(resolver, DistanceTable::paris(), 5.0)
}

#[cfg(test)]
fn at(hour: u32) -> NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2024, 3, 13)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

#[test]
fn legs_sum_to_totals() {
    let stops = vec!["Montmartre".to_string(), "Gare du Nord".to_string()];
    let route = estimator().estimate("Louvre", "Tour Eiffel", &stops, at(11));

    assert_eq!(route.legs.len(), 3);
    assert_eq!(route.source, RouteSource::Estimated);

    let distance: f64 = route.legs.iter().map(|leg| leg.distance_meters).sum();
    let duration: f64 = route.legs.iter().map(|leg| leg.duration_seconds).sum();
    assert_eq!(distance, route.total_distance_meters);
    assert_eq!(duration, route.total_duration_seconds);

    assert_eq!(route.legs[0].start_label, "Louvre");
    assert_eq!(route.legs[2].end_label, "Tour Eiffel");
}

#[cfg(test)]
fn speed_kmh(route: &Route) -> f64 {
    route.total_distance_meters / route.total_duration_seconds * 3.6
}

#[test]
fn short_trip_uses_short_distance_correction() {
    let louvre = Coordinates::new(48.8606, 2.3376);
    let montmartre = Coordinates::new(48.8867, 2.3431);
    let raw = louvre.distance_to(&montmartre);
    assert!(raw < 3_000.0);

    let route = estimator().estimate("Louvre", "Montmartre", &[], at(11));

    assert!((route.total_distance_meters - raw * 1.3).abs() < 1e-6);
    // 30 km/h inside the urban zone outside peak and night hours
    let expected_seconds = raw * 1.3 / (30.0 * 1000.0 / 3600.0);
    assert!((route.total_duration_seconds - expected_seconds).abs() < 1e-6);
}

#[test]
fn trips_between_outlying_places_drive_faster() {
    let route = estimator().estimate("Versailles", "Disneyland", &[], at(11));
    assert_eq!(route.source, RouteSource::Estimated);
    assert!((speed_kmh(&route) - 50.0).abs() < 1e-9);

    // one end inside the zone keeps the city speed
    let route = estimator().estimate("Louvre", "Disneyland", &[], at(11));
    assert!((speed_kmh(&route) - 30.0).abs() < 1e-9);
}

#[test]
fn airport_override_beats_distance_bucket() {
    assert_eq!(correction_factor(1_000.0, "Orly airport", "Louvre"), 1.15);
    assert_eq!(correction_factor(2_000.0, "Louvre", "Bastille"), 1.3);
    assert_eq!(correction_factor(50_000.0, "Louvre", "CDG"), 1.15);
    assert_eq!(correction_factor(5_000.0, "Louvre", "Bastille"), 1.2);
    assert_eq!(correction_factor(12_000.0, "Louvre", "Bastille"), 1.1);
}

#[test]
fn speed_follows_time_of_day_and_zone() {
    assert_eq!(average_speed_kmh(8, false), 20.0);
    assert_eq!(average_speed_kmh(18, false), 20.0);
    assert_eq!(average_speed_kmh(23, false), 40.0);
    assert_eq!(average_speed_kmh(5, false), 40.0);
    assert_eq!(average_speed_kmh(12, false), 30.0);
    assert_eq!(average_speed_kmh(12, true), 50.0);
}

#[test]
fn lookup_table_short_circuits_geometry_in_both_directions() {
    let route = estimator().estimate("Paris", "Aéroport Charles-de-Gaulle", &[], at(11));

    assert_eq!(route.source, RouteSource::Lookup);
    assert_eq!(route.legs.len(), 1);
    assert_eq!(route.total_distance_meters, 32_000.0);
    assert_eq!(route.total_duration_seconds, 2_700.0);
}

#[test]
fn lookup_table_is_skipped_when_stops_are_present() {
    let stops = vec!["Louvre".to_string()];
    let route = estimator().estimate("Paris", "Orly", &stops, at(11));

    assert_eq!(route.source, RouteSource::Estimated);
    assert_eq!(route.legs.len(), 2);
}
