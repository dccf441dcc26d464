use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use std::collections::BTreeMap;

use crate::entities::{QuoteRequest, RateTable, Surcharge, VehicleClass};
use crate::pricing::route::is_night;

const VAN_FACTOR: f64 = 1.3;
const LUXURY_FACTOR: f64 = 2.0;
const MAX_CHARGED_LUGGAGE: u32 = 3;

/// Fixed yearly holidays as `(month, day)`.
pub const FRENCH_HOLIDAYS: [(u32, u32); 8] = [
    (1, 1),
    (5, 1),
    (5, 8),
    (7, 14),
    (8, 15),
    (11, 1),
    (11, 11),
    (12, 25),
];

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SurchargeBreakdown {
    pub details: BTreeMap<String, Surcharge>,
    /// Fixed amounts only. Factors stay in `details`.
    pub total: f64,
}

impl SurchargeBreakdown {
    fn fixed(&mut self, key: &str, label: &str, amount: f64) {
        self.total += amount;
        self.details.insert(
            key.into(),
            Surcharge::Fixed {
                label: label.into(),
                amount,
            },
        );
    }

    fn factor(&mut self, key: &str, label: &str, factor: f64) {
        self.details.insert(
            key.into(),
            Surcharge::Factor {
                label: label.into(),
                factor,
            },
        );
    }

    /// Product of every recorded multiplicative factor, 1.0 when there are none.
    pub fn combined_factor(&self) -> f64 {
        self.details.values().filter_map(Surcharge::factor).product()
    }
}

#[derive(Clone, Debug)]
pub struct SurchargeCalculator {
    holidays: Vec<(u32, u32)>,
}

impl Default for SurchargeCalculator {
    fn default() -> Self {
        Self::new(FRENCH_HOLIDAYS.to_vec())
    }
}

impl SurchargeCalculator {
    pub fn new(holidays: Vec<(u32, u32)>) -> Self {
        Self { holidays }
    }

    pub fn is_holiday(&self, at: &NaiveDateTime) -> bool {
        self.holidays.contains(&(at.month(), at.day()))
    }

    #[tracing::instrument(skip(self, rates, request))]
    pub fn calculate(&self, rates: &RateTable, request: &QuoteRequest) -> SurchargeBreakdown {
        let at = request.date_time;
        let mut breakdown = SurchargeBreakdown::default();

        if is_night(at.hour()) {
            breakdown.factor("night", "Night surcharge", rates.night_surcharge_factor);
        }

        if matches!(at.weekday(), Weekday::Sat | Weekday::Sun) {
            breakdown.factor("weekend", "Weekend surcharge", rates.weekend_surcharge_factor);
        }

        if self.is_holiday(&at) {
            breakdown.factor("holiday", "Holiday surcharge", rates.holiday_surcharge_factor);
        }

        if request.luggage_count > 0 {
            let charged = request.luggage_count.min(MAX_CHARGED_LUGGAGE);
            breakdown.fixed(
                "luggage",
                &format!("Luggage ({} item(s))", charged),
                f64::from(charged) * rates.luggage_surcharge_unit,
            );
        }

        if request.with_pet {
            breakdown.fixed("pet", "Pet on board", rates.pet_surcharge_amount);
        }

        if request.is_airport {
            breakdown.fixed("airport", "Airport pickup/drop-off", rates.airport_surcharge_amount);
        }

        match request.vehicle_class {
            VehicleClass::Standard => (),
            VehicleClass::Premium => {
                breakdown.factor("vehicle", "Premium vehicle", rates.premium_vehicle_factor)
            }
            VehicleClass::Van => breakdown.factor("vehicle", "Van", VAN_FACTOR),
            VehicleClass::Luxury => breakdown.factor("vehicle", "Luxury vehicle", LUXURY_FACTOR),
        }

        if request.waiting_minutes > 0 {
            breakdown.fixed(
                "waiting",
                &format!("Waiting time ({} min)", request.waiting_minutes),
                f64::from(request.waiting_minutes) / 60.0 * rates.waiting_price_per_hour,
            );
        }

        tracing::debug!(
            "{} surcharge(s), fixed total {}",
            breakdown.details.len(),
            breakdown.total
        );

        breakdown
    }
}

#[cfg(test)]
fn request_at(y: i32, m: u32, d: u32, hour: u32) -> QuoteRequest {
    let at = chrono::NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(hour, 30, 0)
        .unwrap();
    QuoteRequest::new("Louvre", "Tour Eiffel", at)
}

#[test]
fn night_only_leaves_fixed_total_at_zero() {
    // Wednesday 13 March 2024, 23:30
    let request = request_at(2024, 3, 13, 23);
    let breakdown = SurchargeCalculator::default().calculate(&RateTable::default(), &request);

    assert_eq!(breakdown.details.len(), 1);
    assert_eq!(breakdown.details["night"].factor(), Some(1.2));
    assert_eq!(breakdown.total, 0.0);
}

#[test]
fn calendar_and_vehicle_factors_never_reach_the_total() {
    // Sunday 14 July 2024, 23:30: night, weekend and holiday at once
    let mut request = request_at(2024, 7, 14, 23);
    request.vehicle_class = VehicleClass::Luxury;

    let breakdown = SurchargeCalculator::default().calculate(&RateTable::default(), &request);

    assert!(breakdown.details.contains_key("night"));
    assert!(breakdown.details.contains_key("weekend"));
    assert!(breakdown.details.contains_key("holiday"));
    assert_eq!(breakdown.details["vehicle"].factor(), Some(2.0));
    assert_eq!(breakdown.total, 0.0);
    assert!((breakdown.combined_factor() - 1.2 * 1.1 * 1.25 * 2.0).abs() < 1e-9);
}

#[test]
fn fixed_items_accumulate() {
    let mut request = request_at(2024, 3, 13, 11);
    request.luggage_count = 5;
    request.with_pet = true;
    request.is_airport = true;
    request.waiting_minutes = 30;
    request.vehicle_class = VehicleClass::Van;

    let rates = RateTable::default();
    let breakdown = SurchargeCalculator::default().calculate(&rates, &request);

    // luggage capped at three items
    assert_eq!(breakdown.details["luggage"].amount(), Some(6.0));
    assert_eq!(breakdown.details["pet"].amount(), Some(5.0));
    assert_eq!(breakdown.details["airport"].amount(), Some(10.0));
    assert_eq!(breakdown.details["waiting"].amount(), Some(15.0));
    assert_eq!(breakdown.details["vehicle"].factor(), Some(1.3));
    assert_eq!(breakdown.total, 36.0);
}

#[test]
fn standard_daytime_weekday_has_no_surcharge() {
    let request = request_at(2024, 3, 13, 11);
    let breakdown = SurchargeCalculator::default().calculate(&RateTable::default(), &request);

    assert!(breakdown.details.is_empty());
    assert_eq!(breakdown.combined_factor(), 1.0);
}
