use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::sync::Arc;

use crate::entities::{Coordinates, RateTable};
use crate::error::{configuration_error, Error};
use crate::pricing::{
    CustomerEligibility, DistanceTable, FactorMode, LocationResolver, PassReservedFlags,
    PromotionPolicy, PromotionValidator, Quoter, RejectReservedFlags, RouteEstimator, RulePolicy,
    SurchargeCalculator, WelcomePolicy,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionMode {
    /// Stored promotions with the full rule set.
    Rules,
    /// Only the built-in welcome code.
    Welcome,
}

impl FromStr for PromotionMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rules" => Ok(Self::Rules),
            "welcome" => Ok(Self::Welcome),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservedFlagPolicy {
    Pass,
    Reject,
}

impl FromStr for ReservedFlagPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pass" => Ok(Self::Pass),
            "reject" => Ok(Self::Reject),
            _ => Err(()),
        }
    }
}

impl FromStr for FactorMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pass_through" => Ok(Self::PassThrough),
            "applied" => Ok(Self::Applied),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub city_center: Coordinates,
    pub urban_radius_km: f64,
    pub fallback_offset_degrees: f64,
    pub promotion_mode: PromotionMode,
    pub reserved_flags: ReservedFlagPolicy,
    pub factor_mode: FactorMode,
    /// Used for requests without an organization or with an unknown one.
    pub rates: RateTable,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            city_center: Coordinates::new(48.8566, 2.3522),
            urban_radius_km: 5.0,
            fallback_offset_degrees: 0.05,
            promotion_mode: PromotionMode::Rules,
            reserved_flags: ReservedFlagPolicy::Pass,
            factor_mode: FactorMode::PassThrough,
            rates: RateTable::default(),
            database_url: None,
            database_max_connections: 5,
        }
    }
}

fn read<T, F>(lookup: &F, name: &str, default: T) -> Result<T, Error>
where
    T: FromStr,
    F: Fn(&str) -> Result<String, env::VarError>,
{
    match lookup(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| configuration_error(name)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err.into()),
    }
}

impl EngineConfig {
    /// Reads the process environment, after loading a `.env` file when one exists.
    #[tracing::instrument(name = "EngineConfig::from_env")]
    pub fn from_env() -> Result<Self, Error> {
        dotenv::dotenv().ok();

        Self::from_lookup(|name| env::var(name))
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let defaults = Self::default();
        let d = &defaults.rates;

        let rates = RateTable {
            base_price: read(&lookup, "RATE_BASE_PRICE", d.base_price)?,
            price_per_km: read(&lookup, "RATE_PRICE_PER_KM", d.price_per_km)?,
            price_per_minute: read(&lookup, "RATE_PRICE_PER_MINUTE", d.price_per_minute)?,
            minimum_price: read(&lookup, "RATE_MINIMUM_PRICE", d.minimum_price)?,
            night_surcharge_factor: read(
                &lookup,
                "RATE_NIGHT_SURCHARGE_FACTOR",
                d.night_surcharge_factor,
            )?,
            weekend_surcharge_factor: read(
                &lookup,
                "RATE_WEEKEND_SURCHARGE_FACTOR",
                d.weekend_surcharge_factor,
            )?,
            holiday_surcharge_factor: read(
                &lookup,
                "RATE_HOLIDAY_SURCHARGE_FACTOR",
                d.holiday_surcharge_factor,
            )?,
            luggage_surcharge_unit: read(
                &lookup,
                "RATE_LUGGAGE_SURCHARGE_UNIT",
                d.luggage_surcharge_unit,
            )?,
            pet_surcharge_amount: read(
                &lookup,
                "RATE_PET_SURCHARGE_AMOUNT",
                d.pet_surcharge_amount,
            )?,
            airport_surcharge_amount: read(
                &lookup,
                "RATE_AIRPORT_SURCHARGE_AMOUNT",
                d.airport_surcharge_amount,
            )?,
            premium_vehicle_factor: read(
                &lookup,
                "RATE_PREMIUM_VEHICLE_FACTOR",
                d.premium_vehicle_factor,
            )?,
            waiting_price_per_hour: read(
                &lookup,
                "RATE_WAITING_PRICE_PER_HOUR",
                d.waiting_price_per_hour,
            )?,
        };
        rates.validate()?;

        let config = Self {
            city_center: Coordinates::new(
                read(&lookup, "CITY_CENTER_LAT", defaults.city_center.lat)?,
                read(&lookup, "CITY_CENTER_LNG", defaults.city_center.lng)?,
            ),
            urban_radius_km: read(&lookup, "URBAN_ZONE_RADIUS_KM", defaults.urban_radius_km)?,
            fallback_offset_degrees: read(
                &lookup,
                "FALLBACK_OFFSET_DEGREES",
                defaults.fallback_offset_degrees,
            )?,
            promotion_mode: read(&lookup, "PROMOTION_MODE", defaults.promotion_mode)?,
            reserved_flags: read(&lookup, "PROMOTION_RESERVED_FLAGS", defaults.reserved_flags)?,
            factor_mode: read(&lookup, "SURCHARGE_FACTORS", defaults.factor_mode)?,
            rates,
            database_url: lookup("DATABASE_URL").ok().filter(|url| !url.trim().is_empty()),
            database_max_connections: read(
                &lookup,
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,
        };

        config.validate()?;

        tracing::debug!("loaded configuration: {:?}", config.promotion_mode);

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !(-90.0..=90.0).contains(&self.city_center.lat) {
            return Err(configuration_error("CITY_CENTER_LAT"));
        }

        if !(-180.0..=180.0).contains(&self.city_center.lng) {
            return Err(configuration_error("CITY_CENTER_LNG"));
        }

        if !self.urban_radius_km.is_finite() || self.urban_radius_km < 0.0 {
            return Err(configuration_error("URBAN_ZONE_RADIUS_KM"));
        }

        if !self.fallback_offset_degrees.is_finite() || self.fallback_offset_degrees < 0.0 {
            return Err(configuration_error("FALLBACK_OFFSET_DEGREES"));
        }

        self.rates.validate()
    }

    pub fn validator(&self) -> PromotionValidator {
        let eligibility: Arc<dyn CustomerEligibility> = match self.reserved_flags {
            ReservedFlagPolicy::Pass => Arc::new(PassReservedFlags),
            ReservedFlagPolicy::Reject => Arc::new(RejectReservedFlags),
        };

        PromotionValidator::new(eligibility)
    }

    pub fn quoter(&self) -> Quoter {
        self.quoter_with_table(DistanceTable::paris())
    }

    pub fn quoter_with_table(&self, table: DistanceTable) -> Quoter {
        let resolver = LocationResolver::new(self.city_center, self.fallback_offset_degrees);
        let estimator = RouteEstimator::new(resolver, table, self.urban_radius_km);

        let promotions: Arc<dyn PromotionPolicy> = match self.promotion_mode {
            PromotionMode::Rules => Arc::new(RulePolicy::new(self.validator())),
            PromotionMode::Welcome => Arc::new(WelcomePolicy),
        };

        Quoter::new(estimator, SurchargeCalculator::default(), promotions)
            .with_factor_mode(self.factor_mode)
    }
}

#[cfg(test)]
fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Result<String, env::VarError> {
    let vars: Vec<(String, String)> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    move |name: &str| {
        vars.iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
            .ok_or(env::VarError::NotPresent)
    }
}

#[test]
fn empty_environment_yields_defaults() {
    let config = EngineConfig::from_lookup(lookup_from(&[])).unwrap();

    assert_eq!(config, EngineConfig::default());
}

#[test]
fn overrides_are_parsed() {
    let config = EngineConfig::from_lookup(lookup_from(&[
        ("PROMOTION_MODE", "welcome"),
        ("PROMOTION_RESERVED_FLAGS", "reject"),
        ("SURCHARGE_FACTORS", "applied"),
        ("RATE_MINIMUM_PRICE", " 9.5 "),
        ("CITY_CENTER_LAT", "45.764"),
        ("CITY_CENTER_LNG", "4.8357"),
        ("DATABASE_URL", "postgresql://localhost/tripfare"),
    ]))
    .unwrap();

    assert_eq!(config.promotion_mode, PromotionMode::Welcome);
    assert_eq!(config.reserved_flags, ReservedFlagPolicy::Reject);
    assert_eq!(config.factor_mode, FactorMode::Applied);
    assert_eq!(config.rates.minimum_price, 9.5);
    assert_eq!(config.city_center, Coordinates::new(45.764, 4.8357));
    assert_eq!(config.database_url.as_deref(), Some("postgresql://localhost/tripfare"));
    assert!(!config.quoter().promotions().requires_lookup());
}

#[test]
fn malformed_values_name_the_variable() {
    let err =
        EngineConfig::from_lookup(lookup_from(&[("RATE_PRICE_PER_KM", "cheap")])).unwrap_err();
    assert!(err.is_configuration_error());
    assert!(err.message.contains("RATE_PRICE_PER_KM"));

    let err =
        EngineConfig::from_lookup(lookup_from(&[("RATE_PET_SURCHARGE_AMOUNT", "-1")])).unwrap_err();
    assert!(err.message.contains("petSurchargeAmount"));

    let err = EngineConfig::from_lookup(lookup_from(&[("PROMOTION_MODE", "bogus")])).unwrap_err();
    assert!(err.message.contains("PROMOTION_MODE"));

    let err =
        EngineConfig::from_lookup(lookup_from(&[("URBAN_ZONE_RADIUS_KM", "-2")])).unwrap_err();
    assert!(err.message.contains("URBAN_ZONE_RADIUS_KM"));
}
