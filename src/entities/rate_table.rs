use serde::{Deserialize, Serialize};

use crate::error::{configuration_error, Error};

/// Per-organization pricing configuration. Every field is a non-negative amount or factor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateTable {
    pub base_price: f64,
    pub price_per_km: f64,
    pub price_per_minute: f64,
    /// Floor applied after any discount.
    pub minimum_price: f64,
    pub night_surcharge_factor: f64,
    pub weekend_surcharge_factor: f64,
    pub holiday_surcharge_factor: f64,
    pub luggage_surcharge_unit: f64,
    pub pet_surcharge_amount: f64,
    pub airport_surcharge_amount: f64,
    pub premium_vehicle_factor: f64,
    pub waiting_price_per_hour: f64,
}

impl Default for RateTable {
    fn default() -> Self {
        Self {
            base_price: 2.5,
            price_per_km: 1.05,
            price_per_minute: 0.35,
            minimum_price: 7.0,
            night_surcharge_factor: 1.2,
            weekend_surcharge_factor: 1.1,
            holiday_surcharge_factor: 1.25,
            luggage_surcharge_unit: 2.0,
            pet_surcharge_amount: 5.0,
            airport_surcharge_amount: 10.0,
            premium_vehicle_factor: 1.5,
            waiting_price_per_hour: 30.0,
        }
    }
}

impl RateTable {
    pub fn fields(&self) -> [(&'static str, f64); 12] {
        [
            ("basePrice", self.base_price),
            ("pricePerKm", self.price_per_km),
            ("pricePerMinute", self.price_per_minute),
            ("minimumPrice", self.minimum_price),
            ("nightSurchargeFactor", self.night_surcharge_factor),
            ("weekendSurchargeFactor", self.weekend_surcharge_factor),
            ("holidaySurchargeFactor", self.holiday_surcharge_factor),
            ("luggageSurchargeUnit", self.luggage_surcharge_unit),
            ("petSurchargeAmount", self.pet_surcharge_amount),
            ("airportSurchargeAmount", self.airport_surcharge_amount),
            ("premiumVehicleFactor", self.premium_vehicle_factor),
            ("waitingPricePerHour", self.waiting_price_per_hour),
        ]
    }

    /// Rejects negative or non-finite fields with a configuration error naming the field.
    pub fn validate(&self) -> Result<(), Error> {
        for (name, value) in self.fields() {
            if !value.is_finite() || value < 0.0 {
                return Err(configuration_error(name));
            }
        }

        Ok(())
    }
}

#[test]
fn default_rate_table_is_valid() {
    assert!(RateTable::default().validate().is_ok());
}

#[test]
fn negative_or_nan_rate_is_a_configuration_error() {
    let rates = RateTable {
        price_per_km: -1.0,
        ..RateTable::default()
    };
    let err = rates.validate().unwrap_err();
    assert!(err.is_configuration_error());
    assert!(err.message.contains("pricePerKm"));

    let rates = RateTable {
        waiting_price_per_hour: f64::NAN,
        ..RateTable::default()
    };
    assert!(rates.validate().unwrap_err().message.contains("waitingPricePerHour"));
}
