use chrono::{Datelike, Local, NaiveDateTime, Timelike};
use std::fmt::Debug;
use std::sync::Arc;

use crate::entities::{
    DiscountDetail, Ineligibility, Promotion, PromotionKind, Requester, VehicleClass,
};

pub const WELCOME_CODE: &str = "WELCOME";
pub const WELCOME_PERCENT: f64 = 10.0;

/// Request-side facts a promotion is checked against.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EligibilityContext {
    pub requester: Option<Requester>,
    pub order_amount: f64,
    pub vehicle_class: Option<VehicleClass>,
    /// Evaluation time in local wall-clock time; now when absent.
    pub at: Option<NaiveDateTime>,
}

impl EligibilityContext {
    pub fn evaluation_time(&self) -> NaiveDateTime {
        self.at.unwrap_or_else(|| Local::now().naive_local())
    }
}

/// Decides the reserved `for_new_customers_only` / `first_ride_only` flags.
pub trait CustomerEligibility: Send + Sync + Debug {
    fn allows(&self, promotion: &Promotion, requester: Option<&Requester>) -> bool;
}

/// Reserved flags are not enforced.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassReservedFlags;

impl CustomerEligibility for PassReservedFlags {
    fn allows(&self, _: &Promotion, _: Option<&Requester>) -> bool {
        true
    }
}

/// Any promotion carrying a reserved flag is refused until customer history is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct RejectReservedFlags;

impl CustomerEligibility for RejectReservedFlags {
    fn allows(&self, promotion: &Promotion, _: Option<&Requester>) -> bool {
        !(promotion.for_new_customers_only || promotion.first_ride_only)
    }
}

#[derive(Clone, Debug)]
pub struct PromotionValidator {
    eligibility: Arc<dyn CustomerEligibility>,
}

impl Default for PromotionValidator {
    fn default() -> Self {
        Self::new(Arc::new(PassReservedFlags))
    }
}

impl PromotionValidator {
    pub fn new(eligibility: Arc<dyn CustomerEligibility>) -> Self {
        Self { eligibility }
    }

    /// Runs every eligibility rule in order and reports the first one that fails.
    pub fn check(
        &self,
        promotion: &Promotion,
        ctx: &EligibilityContext,
    ) -> Result<(), Ineligibility> {
        let at = ctx.evaluation_time();

        if !promotion.is_active {
            return Err(Ineligibility::Inactive);
        }

        if promotion.valid_from.map_or(false, |from| at < from) {
            return Err(Ineligibility::NotYetValid);
        }

        if promotion.valid_until.map_or(false, |until| at > until) {
            return Err(Ineligibility::Expired);
        }

        if promotion
            .usage_limit
            .map_or(false, |limit| promotion.usage_count >= limit)
        {
            return Err(Ineligibility::UsageLimitReached);
        }

        if ctx.order_amount < promotion.min_order_amount {
            return Err(Ineligibility::BelowMinimumOrder);
        }

        if let Some(class) = ctx.vehicle_class {
            if !promotion.applicable_vehicle_classes.contains(&class) {
                return Err(Ineligibility::VehicleClassNotApplicable);
            }
        }

        if promotion
            .excluded_weekdays
            .contains(&at.weekday().num_days_from_sunday())
        {
            return Err(Ineligibility::ExcludedWeekday);
        }

        if promotion
            .excluded_hour_ranges
            .iter()
            .any(|range| range.contains(at.hour()))
        {
            return Err(Ineligibility::ExcludedHour);
        }

        if !self.eligibility.allows(promotion, ctx.requester.as_ref()) {
            return Err(Ineligibility::CustomerNotEligible);
        }

        if let Some(requester) = &ctx.requester {
            if let Some(usage) = promotion.usage_for(requester) {
                if usage.usage_count >= promotion.limit_per_user {
                    return Err(Ineligibility::PerUserLimitReached);
                }
            }
        }

        Ok(())
    }

    pub fn is_valid(&self, promotion: &Promotion, ctx: &EligibilityContext) -> bool {
        self.check(promotion, ctx).is_ok()
    }
}

/// Discount granted by an already validated promotion on `order_amount`.
pub fn discount_for(promotion: &Promotion, order_amount: f64) -> f64 {
    match promotion.kind {
        PromotionKind::Percentage => {
            let discount = order_amount * promotion.value / 100.0;
            promotion.max_value.map_or(discount, |cap| discount.min(cap))
        }
        PromotionKind::Fixed => promotion.value.min(order_amount),
        PromotionKind::Free => order_amount,
    }
}

/// How a supplied code turns into a discount.
pub trait PromotionPolicy: Send + Sync + Debug {
    /// Whether the code must be resolved against the promotion store first.
    fn requires_lookup(&self) -> bool;

    fn evaluate(
        &self,
        code: &str,
        promotion: Option<&Promotion>,
        ctx: &EligibilityContext,
    ) -> Result<DiscountDetail, Ineligibility>;
}

/// Full rule set backed by stored promotions.
#[derive(Clone, Debug, Default)]
pub struct RulePolicy {
    validator: PromotionValidator,
}

impl RulePolicy {
    pub fn new(validator: PromotionValidator) -> Self {
        Self { validator }
    }

    pub fn validator(&self) -> &PromotionValidator {
        &self.validator
    }
}

impl PromotionPolicy for RulePolicy {
    fn requires_lookup(&self) -> bool {
        true
    }

    fn evaluate(
        &self,
        code: &str,
        promotion: Option<&Promotion>,
        ctx: &EligibilityContext,
    ) -> Result<DiscountDetail, Ineligibility> {
        let code = Promotion::normalize_code(code);
        let promotion = promotion
            .filter(|promotion| promotion.code == code)
            .ok_or(Ineligibility::UnknownCode)?;

        self.validator.check(promotion, ctx)?;

        Ok(DiscountDetail {
            code,
            kind: promotion.kind,
            value: promotion.value,
            amount: discount_for(promotion, ctx.order_amount),
            description: promotion.description.clone(),
        })
    }
}

/// Registry-free stub: one hard-coded code worth a flat 10%.
#[derive(Clone, Copy, Debug, Default)]
pub struct WelcomePolicy;

impl PromotionPolicy for WelcomePolicy {
    fn requires_lookup(&self) -> bool {
        false
    }

    fn evaluate(
        &self,
        code: &str,
        _: Option<&Promotion>,
        ctx: &EligibilityContext,
    ) -> Result<DiscountDetail, Ineligibility> {
        if Promotion::normalize_code(code) != WELCOME_CODE {
            return Err(Ineligibility::UnknownCode);
        }

        Ok(DiscountDetail {
            code: WELCOME_CODE.into(),
            kind: PromotionKind::Percentage,
            value: WELCOME_PERCENT,
            amount: ctx.order_amount * WELCOME_PERCENT / 100.0,
            description: "Welcome discount".into(),
        })
    }
}

#[cfg(test)]
use crate::entities::HourRange;
#[cfg(test)]
use chrono::{NaiveDate, Utc};
#[cfg(test)]
use uuid::Uuid;

// Wednesday 13 March 2024
#[cfg(test)]
fn wednesday(hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 13)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

#[cfg(test)]
fn ctx(amount: f64) -> EligibilityContext {
    EligibilityContext {
        requester: None,
        order_amount: amount,
        vehicle_class: Some(VehicleClass::Standard),
        at: Some(wednesday(11)),
    }
}

#[cfg(test)]
fn promotion() -> Promotion {
    Promotion::new("spring", PromotionKind::Percentage, 20.0, "Spring offer")
}

#[test]
fn plain_promotion_is_valid() {
    assert!(PromotionValidator::default().is_valid(&promotion(), &ctx(50.0)));
}

#[test]
fn rejects_before_valid_from_and_after_valid_until() {
    let validator = PromotionValidator::default();

    let mut early = promotion();
    early.valid_from = Some(wednesday(12));
    assert_eq!(validator.check(&early, &ctx(50.0)), Err(Ineligibility::NotYetValid));

    let mut late = promotion();
    late.valid_until = Some(wednesday(10));
    assert_eq!(validator.check(&late, &ctx(50.0)), Err(Ineligibility::Expired));
}

#[test]
fn rejects_inactive_and_exhausted() {
    let validator = PromotionValidator::default();

    let mut inactive = promotion();
    inactive.is_active = false;
    assert_eq!(validator.check(&inactive, &ctx(50.0)), Err(Ineligibility::Inactive));

    let mut exhausted = promotion();
    exhausted.usage_limit = Some(3);
    exhausted.usage_count = 3;
    assert_eq!(
        validator.check(&exhausted, &ctx(50.0)),
        Err(Ineligibility::UsageLimitReached)
    );
}

#[test]
fn rejects_below_minimum_order() {
    let mut minimum = promotion();
    minimum.min_order_amount = 30.0;

    let validator = PromotionValidator::default();
    assert_eq!(
        validator.check(&minimum, &ctx(29.99)),
        Err(Ineligibility::BelowMinimumOrder)
    );
    assert!(validator.is_valid(&minimum, &ctx(30.0)));
}

#[test]
fn rejects_vehicle_class_not_listed() {
    let mut vans_only = promotion();
    vans_only.applicable_vehicle_classes = vec![VehicleClass::Van];

    let validator = PromotionValidator::default();
    assert_eq!(
        validator.check(&vans_only, &ctx(50.0)),
        Err(Ineligibility::VehicleClassNotApplicable)
    );

    let unspecified = EligibilityContext {
        vehicle_class: None,
        ..ctx(50.0)
    };
    assert!(validator.is_valid(&vans_only, &unspecified));
}

#[test]
fn rejects_excluded_weekday_and_hour() {
    let validator = PromotionValidator::default();

    let mut no_wednesdays = promotion();
    no_wednesdays.excluded_weekdays = vec![3];
    assert_eq!(
        validator.check(&no_wednesdays, &ctx(50.0)),
        Err(Ineligibility::ExcludedWeekday)
    );

    let mut no_late_mornings = promotion();
    no_late_mornings.excluded_hour_ranges = vec![HourRange::new(10, 12)];
    assert_eq!(
        validator.check(&no_late_mornings, &ctx(50.0)),
        Err(Ineligibility::ExcludedHour)
    );

    no_late_mornings.excluded_hour_ranges = vec![HourRange::new(8, 11)];
    assert!(validator.is_valid(&no_late_mornings, &ctx(50.0)));
}

#[test]
fn rejects_requester_at_per_user_limit() {
    let requester = Requester::client(Uuid::new_v4());
    let mut used = promotion();
    used.record_usage(Some(&requester), Utc::now()).unwrap();

    let context = EligibilityContext {
        requester: Some(requester),
        ..ctx(50.0)
    };
    assert_eq!(
        PromotionValidator::default().check(&used, &context),
        Err(Ineligibility::PerUserLimitReached)
    );

    let stranger = EligibilityContext {
        requester: Some(Requester::user(Uuid::new_v4())),
        ..ctx(50.0)
    };
    assert!(PromotionValidator::default().is_valid(&used, &stranger));
}

#[test]
fn reserved_flags_follow_the_configured_policy() {
    let mut first_ride = promotion();
    first_ride.first_ride_only = true;

    assert!(PromotionValidator::new(Arc::new(PassReservedFlags)).is_valid(&first_ride, &ctx(50.0)));
    assert_eq!(
        PromotionValidator::new(Arc::new(RejectReservedFlags)).check(&first_ride, &ctx(50.0)),
        Err(Ineligibility::CustomerNotEligible)
    );
}

#[test]
fn verdict_is_stable_without_redemptions() {
    let validator = PromotionValidator::default();
    let mut limited = promotion();
    limited.usage_limit = Some(1);

    let verdicts: Vec<bool> = (0..5).map(|_| validator.is_valid(&limited, &ctx(50.0))).collect();
    assert!(verdicts.iter().all(|verdict| *verdict));
}

#[test]
fn percentage_discount_is_capped() {
    let mut capped = promotion();
    capped.max_value = Some(10.0);
    assert_eq!(discount_for(&capped, 100.0), 10.0);

    capped.max_value = None;
    assert_eq!(discount_for(&capped, 100.0), 20.0);
}

#[test]
fn fixed_discount_never_exceeds_order() {
    let fixed = Promotion::new("FIFTY", PromotionKind::Fixed, 50.0, "");
    assert_eq!(discount_for(&fixed, 30.0), 30.0);
    assert_eq!(discount_for(&fixed, 80.0), 50.0);
}

#[test]
fn free_discount_waives_everything() {
    let free = Promotion::new("FREE", PromotionKind::Free, 0.0, "");
    assert_eq!(discount_for(&free, 42.5), 42.5);
}

#[test]
fn rule_policy_requires_matching_promotion() {
    let policy = RulePolicy::default();
    let spring = promotion();

    assert_eq!(
        policy.evaluate("SPRING", None, &ctx(50.0)),
        Err(Ineligibility::UnknownCode)
    );
    assert_eq!(
        policy.evaluate("autumn", Some(&spring), &ctx(50.0)),
        Err(Ineligibility::UnknownCode)
    );

    let detail = policy.evaluate("Spring", Some(&spring), &ctx(50.0)).unwrap();
    assert_eq!(detail.code, "SPRING");
    assert_eq!(detail.amount, 10.0);
}

#[test]
fn welcome_policy_grants_ten_percent_without_a_store() {
    let policy = WelcomePolicy;
    assert!(!policy.requires_lookup());

    let detail = policy.evaluate("welcome", None, &ctx(80.0)).unwrap();
    assert_eq!(detail.amount, 8.0);
    assert_eq!(
        policy.evaluate("SPRING", Some(&promotion()), &ctx(80.0)),
        Err(Ineligibility::UnknownCode)
    );
}
