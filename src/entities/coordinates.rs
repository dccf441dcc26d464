use geo_types::Point;
use serde::{Deserialize, Serialize};

/// Mean earth radius used for great-circle distances.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Great-circle (haversine) distance in meters on a spherical earth.
    pub fn distance_to(&self, other: &Coordinates) -> f64 {
        let from: Point<f64> = (*self).into();
        let to: Point<f64> = (*other).into();

        let d_lat = (to.y() - from.y()).to_radians();
        let d_lng = (to.x() - from.x()).to_radians();

        let a = (d_lat / 2.0).sin().powi(2)
            + from.y().to_radians().cos() * to.y().to_radians().cos() * (d_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_METERS * c
    }

    pub fn displaced(&self, d_lat: f64, d_lng: f64) -> Self {
        Self {
            lat: self.lat + d_lat,
            lng: self.lng + d_lng,
        }
    }
}

impl From<Coordinates> for Point<f64> {
    fn from(coordinates: Coordinates) -> Self {
        Point::new(coordinates.lng, coordinates.lat)
    }
}

#[test]
fn distance_to_self_is_zero() {
    let louvre = Coordinates::new(48.8606, 2.3376);
    assert_eq!(louvre.distance_to(&louvre), 0.0);
}

#[test]
fn distance_is_symmetric() {
    let louvre = Coordinates::new(48.8606, 2.3376);
    let orly = Coordinates::new(48.7262, 2.3652);

    assert_eq!(louvre.distance_to(&orly), orly.distance_to(&louvre));
}

#[test]
fn distance_matches_known_separation() {
    // one degree of latitude on a 6371 km sphere
    let a = Coordinates::new(0.0, 0.0);
    let b = Coordinates::new(1.0, 0.0);

    let expected = EARTH_RADIUS_METERS * 1.0_f64.to_radians();
    assert!((a.distance_to(&b) - expected).abs() < 1e-6);
}
