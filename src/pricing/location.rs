use rand::distributions::{Distribution, Uniform};
use std::fmt::Debug;
use std::sync::Arc;

use crate::entities::Coordinates;

const AIRPORT_TOKENS: [&str; 4] = ["airport", "aeroport", "cdg", "orly"];
const STATION_TOKENS: [&str; 2] = ["station", "gare"];

/// Produces the displacement used when a label resolves to nothing known.
pub trait OffsetStrategy: Send + Sync + Debug {
    /// Returns `(d_lat, d_lng)`, each within `[-max_degrees, max_degrees]`.
    fn offset(&self, normalized_label: &str, max_degrees: f64) -> (f64, f64);
}

/// Stable FNV-1a hash of the label mapped into the offset box. Same label, same point.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashedOffset;

impl OffsetStrategy for HashedOffset {
    fn offset(&self, normalized_label: &str, max_degrees: f64) -> (f64, f64) {
        let hash = fnv1a(normalized_label.as_bytes());

        let unit = |bits: u64| (bits as f64 / u32::MAX as f64) * 2.0 - 1.0;
        let d_lat = unit(hash >> 32) * max_degrees;
        let d_lng = unit(hash & 0xffff_ffff) * max_degrees;

        (d_lat, d_lng)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomOffset;

impl OffsetStrategy for RandomOffset {
    fn offset(&self, _: &str, max_degrees: f64) -> (f64, f64) {
        if max_degrees <= 0.0 {
            return (0.0, 0.0);
        }

        let die = Uniform::new_inclusive(-max_degrees, max_degrees);
        let mut rng = rand::thread_rng();

        (die.sample(&mut rng), die.sample(&mut rng))
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

fn fold_accent(c: char) -> char {
    match c {
        'à' | 'â' | 'ä' | 'á' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'î' | 'ï' | 'í' => 'i',
        'ô' | 'ö' | 'ó' => 'o',
        'ù' | 'û' | 'ü' | 'ú' => 'u',
        'ç' => 'c',
        _ => c,
    }
}

/// Lower-cases, folds common accents, turns punctuation into spaces and collapses whitespace.
pub fn normalize(label: &str) -> String {
    let cleaned: String = label
        .to_lowercase()
        .chars()
        .map(fold_accent)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn has_token(normalized: &str, tokens: &[&str]) -> bool {
    normalized
        .split_whitespace()
        .any(|word| tokens.contains(&word))
}

pub fn is_airport_label(label: &str) -> bool {
    has_token(&normalize(label), &AIRPORT_TOKENS)
}

pub fn is_station_label(label: &str) -> bool {
    has_token(&normalize(label), &STATION_TOKENS)
}

fn paris_places() -> Vec<(String, Coordinates)> {
    [
        ("aeroport charles de gaulle", 49.0097, 2.5479),
        ("roissy", 49.0097, 2.5479),
        ("orly", 48.7262, 2.3652),
        ("beauvais", 49.4547, 2.1128),
        ("gare du nord", 48.8809, 2.3553),
        ("gare de lyon", 48.8443, 2.3744),
        ("gare montparnasse", 48.8412, 2.3206),
        ("gare saint lazare", 48.8763, 2.3254),
        ("gare de l est", 48.8765, 2.3592),
        ("tour eiffel", 48.8584, 2.2945),
        ("louvre", 48.8606, 2.3376),
        ("champs elysees", 48.8698, 2.3078),
        ("la defense", 48.8920, 2.2362),
        ("montmartre", 48.8867, 2.3431),
        ("versailles", 48.8049, 2.1204),
        ("disneyland", 48.8674, 2.7836),
    ]
    .into_iter()
    .map(|(name, lat, lng)| (name.to_string(), Coordinates::new(lat, lng)))
    .collect()
}

/// Best-effort text-to-coordinate resolution. Never fails.
#[derive(Clone, Debug)]
pub struct LocationResolver {
    places: Vec<(String, Coordinates)>,
    default_airport: Coordinates,
    default_station: Coordinates,
    city_center: Coordinates,
    max_offset_degrees: f64,
    offsets: Arc<dyn OffsetStrategy>,
}

impl LocationResolver {
    pub fn new(city_center: Coordinates, max_offset_degrees: f64) -> Self {
        Self {
            places: paris_places(),
            default_airport: Coordinates::new(49.0097, 2.5479),
            default_station: Coordinates::new(48.8443, 2.3744),
            city_center,
            max_offset_degrees,
            offsets: Arc::new(HashedOffset),
        }
    }

    pub fn with_offset_strategy(mut self, offsets: Arc<dyn OffsetStrategy>) -> Self {
        self.offsets = offsets;
        self
    }

    pub fn city_center(&self) -> Coordinates {
        self.city_center
    }

    #[tracing::instrument(skip(self))]
    pub fn resolve(&self, label: &str) -> Coordinates {
        let normalized = normalize(label);

        if !normalized.is_empty() {
            let known = self
                .places
                .iter()
                .find(|(name, _)| normalized.contains(name.as_str()) || name.contains(&normalized));

            if let Some((name, coordinates)) = known {
                tracing::debug!("resolved to known place {:?}", name);
                return *coordinates;
            }
        }

        if has_token(&normalized, &AIRPORT_TOKENS) {
            return self.default_airport;
        }

        if has_token(&normalized, &STATION_TOKENS) {
            return self.default_station;
        }

        let (d_lat, d_lng) = self.offsets.offset(&normalized, self.max_offset_degrees);
        tracing::warn!("unknown location, using synthetic coordinate near city center");

        self.city_center.displaced(d_lat, d_lng)
    }
}

#[cfg(test)]
fn paris() -> LocationResolver {
    LocationResolver::new(Coordinates::new(48.8566, 2.3522), 0.05)
}

#[test]
fn normalize_strips_punctuation_and_accents() {
    assert_eq!(normalize("  Gare de l'Est!! "), "gare de l est");
    assert_eq!(normalize("Champs-Élysées"), "champs elysees");
}

#[test]
fn resolves_known_place_both_ways() {
    let resolver = paris();
    let louvre = Coordinates::new(48.8606, 2.3376);

    assert_eq!(resolver.resolve("Musée du Louvre, Paris"), louvre);
    assert_eq!(resolver.resolve("Louvre"), louvre);
    // the registry name contains the input
    assert_eq!(resolver.resolve("eiffel"), Coordinates::new(48.8584, 2.2945));
}

#[test]
fn falls_back_to_category_defaults() {
    let resolver = paris();

    assert_eq!(resolver.resolve("Terminal 2E airport"), Coordinates::new(49.0097, 2.5479));
    assert_eq!(resolver.resolve("Nowhere station"), Coordinates::new(48.8443, 2.3744));
}

#[test]
fn unknown_label_is_deterministic_and_bounded() {
    let resolver = paris();

    let first = resolver.resolve("12 rue imaginaire");
    let second = resolver.resolve("12 Rue Imaginaire.");
    assert_eq!(first, second);

    assert!((first.lat - 48.8566).abs() <= 0.05);
    assert!((first.lng - 2.3522).abs() <= 0.05);
}

#[test]
fn random_offset_stays_within_bounds() {
    let resolver = paris().with_offset_strategy(Arc::new(RandomOffset));

    for _ in 0..50 {
        let point = resolver.resolve("somewhere unknown");
        assert!((point.lat - 48.8566).abs() <= 0.05);
        assert!((point.lng - 2.3522).abs() <= 0.05);
    }
}

#[test]
fn airport_labels_are_detected_by_token() {
    assert!(is_airport_label("Aéroport d'Orly"));
    assert!(is_airport_label("CDG T2"));
    assert!(!is_airport_label("Gare du Nord"));
    assert!(is_station_label("Gare du Nord"));
}
