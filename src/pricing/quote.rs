use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{DiscountDetail, Promotion, Quote, QuoteRequest, RateTable};
use crate::error::Error;
use crate::pricing::promotion::{EligibilityContext, PromotionPolicy};
use crate::pricing::route::RouteEstimator;
use crate::pricing::surcharge::SurchargeCalculator;

/// Whether calendar and vehicle factors change the price or are only reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorMode {
    PassThrough,
    Applied,
}

impl Default for FactorMode {
    fn default() -> Self {
        Self::PassThrough
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Clone, Debug)]
pub struct Quoter {
    estimator: RouteEstimator,
    surcharges: SurchargeCalculator,
    promotions: Arc<dyn PromotionPolicy>,
    factor_mode: FactorMode,
}

impl Quoter {
    pub fn new(
        estimator: RouteEstimator,
        surcharges: SurchargeCalculator,
        promotions: Arc<dyn PromotionPolicy>,
    ) -> Self {
        Self {
            estimator,
            surcharges,
            promotions,
            factor_mode: FactorMode::default(),
        }
    }

    pub fn with_factor_mode(mut self, factor_mode: FactorMode) -> Self {
        self.factor_mode = factor_mode;
        self
    }

    pub fn promotions(&self) -> &Arc<dyn PromotionPolicy> {
        &self.promotions
    }

    /// Prices a request. `promotion` is the stored promotion already looked up by the
    /// request's code.
    ///
    /// The discount is computed on the post-surcharge price and the minimum price floor is
    /// applied after it, so a discount can never take the total below `minimum_price`.
    #[tracing::instrument(
        skip(self, rates, promotion),
        fields(origin = %request.origin, destination = %request.destination)
    )]
    pub fn quote(
        &self,
        request: &QuoteRequest,
        rates: &RateTable,
        promotion: Option<&Promotion>,
    ) -> Result<Quote, Error> {
        rates.validate()?;

        let route = self.estimator.estimate(
            &request.origin,
            &request.destination,
            &request.stops,
            request.date_time,
        );

        let base_price = rates.base_price;
        let distance_price = route.distance_km() * rates.price_per_km;
        let duration_price = route.duration_minutes() * rates.price_per_minute;
        let mut price = base_price + distance_price + duration_price;

        let surcharges = self.surcharges.calculate(rates, request);

        let factor_adjustment = match self.factor_mode {
            FactorMode::PassThrough => 0.0,
            FactorMode::Applied => price * (surcharges.combined_factor() - 1.0),
        };
        price += factor_adjustment;
        price += surcharges.total;

        let mut discount_detail: Option<DiscountDetail> = None;
        let mut promotion_rejection = None;

        let code = request
            .promotion_code
            .as_deref()
            .filter(|code| !code.trim().is_empty());

        if let Some(code) = code {
            let ctx = EligibilityContext {
                requester: request.requester.clone(),
                order_amount: price,
                vehicle_class: Some(request.vehicle_class),
                at: Some(request.date_time),
            };

            match self.promotions.evaluate(code, promotion, &ctx) {
                Ok(detail) => discount_detail = Some(detail),
                Err(reason) => {
                    tracing::info!("promotion {:?} not applied: {}", code, reason);
                    promotion_rejection = Some(reason);
                }
            }
        }

        let discount = discount_detail.as_ref().map_or(0.0, |detail| detail.amount);
        price -= discount;

        let minimum_applied = price < rates.minimum_price;
        if minimum_applied {
            price = rates.minimum_price;
        }

        let discount_detail = discount_detail.map(|detail| DiscountDetail {
            amount: round2(detail.amount),
            ..detail
        });

        Ok(Quote {
            token: Uuid::new_v4(),
            base_price: round2(base_price),
            distance_price: round2(distance_price),
            duration_price: round2(duration_price),
            surcharges: surcharges.details,
            surcharge_total: round2(surcharges.total),
            factor_adjustment: round2(factor_adjustment),
            discount: round2(discount),
            discount_detail,
            promotion_rejection,
            minimum_applied,
            total_price: round2(price),
            route,
        })
    }
}

#[cfg(test)]
use crate::entities::{Coordinates, Ineligibility, PromotionKind, VehicleClass};
#[cfg(test)]
use crate::pricing::location::LocationResolver;
#[cfg(test)]
use crate::pricing::promotion::{RulePolicy, WelcomePolicy};
#[cfg(test)]
use crate::pricing::route::DistanceTable;
#[cfg(test)]
use chrono::{NaiveDate, NaiveDateTime};

#[cfg(test)]
fn wednesday_noon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 13)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

#[cfg(test)]
fn quoter(promotions: Arc<dyn PromotionPolicy>) -> Quoter {
    let resolver = LocationResolver::new(Coordinates::new(48.8566, 2.3522), 0.05);
    let table = DistanceTable::empty().with_entry("Hotel A", "Hotel B", 2.0, 5.0);
    let estimator = RouteEstimator::new(resolver, table, 5.0);

    Quoter::new(estimator, SurchargeCalculator::default(), promotions)
}

#[cfg(test)]
fn short_trip() -> QuoteRequest {
    QuoteRequest::new("Hotel A", "Hotel B", wednesday_noon())
}

#[test]
fn short_trip_is_raised_to_minimum_price() {
    let quote = quoter(Arc::new(RulePolicy::default()))
        .quote(&short_trip(), &RateTable::default(), None)
        .unwrap();

    assert_eq!(quote.base_price, 2.5);
    assert_eq!(quote.distance_price, 2.1);
    assert_eq!(quote.duration_price, 1.75);
    assert_eq!(quote.surcharge_total, 0.0);
    assert_eq!(quote.discount, 0.0);
    assert!(quote.minimum_applied);
    assert_eq!(quote.total_price, 7.0);
}

#[test]
fn free_promotion_is_absorbed_by_the_floor() {
    let mut request = short_trip();
    request.promotion_code = Some("freeride".into());
    let free = Promotion::new("FREERIDE", PromotionKind::Free, 0.0, "On the house");

    let quote = quoter(Arc::new(RulePolicy::default()))
        .quote(&request, &RateTable::default(), Some(&free))
        .unwrap();

    assert_eq!(quote.discount, 6.35);
    assert_eq!(quote.discount_detail.unwrap().code, "FREERIDE");
    assert_eq!(quote.total_price, 7.0);
}

#[test]
fn fixed_surcharges_add_to_price_but_factors_do_not() {
    let mut request = short_trip();
    request.luggage_count = 1;
    request.vehicle_class = VehicleClass::Luxury;
    let rates = RateTable {
        minimum_price: 0.0,
        ..RateTable::default()
    };

    let quote = quoter(Arc::new(RulePolicy::default()))
        .quote(&request, &rates, None)
        .unwrap();

    assert_eq!(quote.surcharge_total, 2.0);
    assert_eq!(quote.surcharges["vehicle"].factor(), Some(2.0));
    assert_eq!(quote.factor_adjustment, 0.0);
    assert_eq!(quote.total_price, 8.35);
}

#[test]
fn applied_factor_mode_multiplies_the_metered_price() {
    let mut request = short_trip();
    request.vehicle_class = VehicleClass::Luxury;
    let rates = RateTable {
        minimum_price: 0.0,
        ..RateTable::default()
    };

    let quote = quoter(Arc::new(RulePolicy::default()))
        .with_factor_mode(FactorMode::Applied)
        .quote(&request, &rates, None)
        .unwrap();

    assert_eq!(quote.factor_adjustment, 6.35);
    assert_eq!(quote.total_price, 12.7);
}

#[test]
fn rejected_code_is_reported_not_raised() {
    let mut request = short_trip();
    request.promotion_code = Some("NOPE".into());

    let quote = quoter(Arc::new(RulePolicy::default()))
        .quote(&request, &RateTable::default(), None)
        .unwrap();

    assert_eq!(quote.discount, 0.0);
    assert_eq!(quote.promotion_rejection, Some(Ineligibility::UnknownCode));
}

#[test]
fn welcome_stub_discounts_ten_percent() {
    let mut request = short_trip();
    request.promotion_code = Some("WELCOME".into());
    request.waiting_minutes = 60;

    let rates = RateTable {
        base_price: 2.55,
        ..RateTable::default()
    };

    // 6.40 metered + 30.00 waiting, minus 10%
    let quote = quoter(Arc::new(WelcomePolicy))
        .quote(&request, &rates, None)
        .unwrap();

    assert_eq!(quote.discount, 3.64);
    assert_eq!(quote.total_price, 32.76);
}

#[test]
fn malformed_rate_table_is_a_configuration_error() {
    let rates = RateTable {
        minimum_price: -7.0,
        ..RateTable::default()
    };

    let err = quoter(Arc::new(RulePolicy::default()))
        .quote(&short_trip(), &rates, None)
        .unwrap_err();
    assert!(err.is_configuration_error());
}
