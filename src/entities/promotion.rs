use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::entities::{Requester, VehicleClass};
use crate::error::{invalid_input_error, Error};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionKind {
    Percentage,
    Fixed,
    Free,
}

/// Half-open `[start, end)` range of hours. A range whose start is after its end wraps past
/// midnight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourRange {
    pub start: u32,
    pub end: u32,
}

impl HourRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, hour: u32) -> bool {
        if self.start <= self.end {
            hour >= self.start && hour < self.end
        } else {
            hour >= self.start || hour < self.end
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PromotionUsage {
    pub user_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub usage_count: u32,
    pub last_used_at: DateTime<Utc>,
}

/// Why a promotion could not be applied. These are verdicts, not faults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Ineligibility {
    UnknownCode,
    Inactive,
    NotYetValid,
    Expired,
    UsageLimitReached,
    BelowMinimumOrder,
    VehicleClassNotApplicable,
    ExcludedWeekday,
    ExcludedHour,
    CustomerNotEligible,
    PerUserLimitReached,
}

impl fmt::Display for Ineligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::UnknownCode => "this promotion code does not exist",
            Self::Inactive => "this promotion is no longer active",
            Self::NotYetValid => "this promotion is not valid yet",
            Self::Expired => "this promotion has expired",
            Self::UsageLimitReached => "this promotion has reached its usage limit",
            Self::BelowMinimumOrder => "the order amount is below the promotion minimum",
            Self::VehicleClassNotApplicable => {
                "this promotion does not apply to the selected vehicle"
            }
            Self::ExcludedWeekday => "this promotion cannot be used on this day",
            Self::ExcludedHour => "this promotion cannot be used at this time",
            Self::CustomerNotEligible => "this promotion is reserved for other customers",
            Self::PerUserLimitReached => "you have already used this promotion",
        };

        f.write_str(message)
    }
}

fn default_limit_per_user() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Promotion {
    pub id: Uuid,
    /// Always stored upper-cased.
    pub code: String,
    pub kind: PromotionKind,
    pub value: f64,
    /// Cap on the discount amount, percentage promotions only.
    pub max_value: Option<f64>,
    #[serde(default)]
    pub min_order_amount: f64,
    #[serde(default)]
    pub description: String,
    pub usage_limit: Option<u32>,
    #[serde(default)]
    pub usage_count: u32,
    #[serde(default = "default_limit_per_user")]
    pub limit_per_user: u32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub valid_from: Option<NaiveDateTime>,
    pub valid_until: Option<NaiveDateTime>,
    #[serde(default = "VehicleClass::all")]
    pub applicable_vehicle_classes: Vec<VehicleClass>,
    /// 0 = Sunday through 6 = Saturday.
    #[serde(default)]
    pub excluded_weekdays: Vec<u32>,
    #[serde(default)]
    pub excluded_hour_ranges: Vec<HourRange>,
    #[serde(default)]
    pub for_new_customers_only: bool,
    #[serde(default)]
    pub first_ride_only: bool,
    #[serde(default)]
    pub used_by: Vec<PromotionUsage>,
}

impl Promotion {
    pub fn new(code: &str, kind: PromotionKind, value: f64, description: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: Self::normalize_code(code),
            kind,
            value,
            max_value: None,
            min_order_amount: 0.0,
            description: description.into(),
            usage_limit: None,
            usage_count: 0,
            limit_per_user: default_limit_per_user(),
            is_active: true,
            valid_from: None,
            valid_until: None,
            applicable_vehicle_classes: VehicleClass::all(),
            excluded_weekdays: vec![],
            excluded_hour_ranges: vec![],
            for_new_customers_only: false,
            first_ride_only: false,
            used_by: vec![],
        }
    }

    pub fn normalize_code(code: &str) -> String {
        code.trim().to_uppercase()
    }

    /// Field-level sanity checks run when an administrator creates a promotion.
    pub fn validate_fields(&self) -> Result<(), Error> {
        let amounts_ok = self.value.is_finite()
            && self.value >= 0.0
            && self.min_order_amount.is_finite()
            && self.min_order_amount >= 0.0
            && self.max_value.map_or(true, |cap| cap.is_finite() && cap >= 0.0)
            && (self.kind != PromotionKind::Percentage || self.value <= 100.0);

        let window_ok = match (self.valid_from, self.valid_until) {
            (Some(from), Some(until)) => from <= until,
            _ => true,
        };

        let calendar_ok = self.excluded_weekdays.iter().all(|day| *day <= 6)
            && self
                .excluded_hour_ranges
                .iter()
                .all(|range| range.start <= 23 && range.end <= 24 && range.start != range.end);

        if self.code.is_empty() || !amounts_ok || !window_ok || !calendar_ok {
            return Err(invalid_input_error());
        }

        Ok(())
    }

    /// Active and, when a global limit is set, still below it.
    pub fn is_redeemable(&self) -> bool {
        self.is_active && self.usage_limit.map_or(true, |limit| self.usage_count < limit)
    }

    pub fn usage_for(&self, requester: &Requester) -> Option<&PromotionUsage> {
        self.used_by
            .iter()
            .find(|usage| requester.matches(usage.user_id, usage.client_id))
    }

    /// Records one redemption. Both counters are only incremented while below their limits,
    /// so applying this under the store's per-promotion lock is an atomic conditional increment.
    #[tracing::instrument(skip(self), fields(code = %self.code))]
    pub fn record_usage(
        &mut self,
        requester: Option<&Requester>,
        at: DateTime<Utc>,
    ) -> Result<(), Ineligibility> {
        if !self.is_redeemable() {
            return Err(if self.is_active {
                Ineligibility::UsageLimitReached
            } else {
                Ineligibility::Inactive
            });
        }

        let requester = requester.filter(|requester| !requester.is_anonymous());

        if let Some(requester) = requester {
            let limit_per_user = self.limit_per_user;

            match self
                .used_by
                .iter_mut()
                .find(|usage| requester.matches(usage.user_id, usage.client_id))
            {
                Some(usage) => {
                    if usage.usage_count >= limit_per_user {
                        return Err(Ineligibility::PerUserLimitReached);
                    }
                    usage.usage_count += 1;
                    usage.last_used_at = at;
                }
                None => self.used_by.push(PromotionUsage {
                    user_id: requester.user_id,
                    client_id: requester.client_id,
                    usage_count: 1,
                    last_used_at: at,
                }),
            }
        }

        self.usage_count += 1;

        Ok(())
    }
}

/// Outcome of checking or redeeming a code against a given order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PromotionVerdict {
    pub code: String,
    pub valid: bool,
    pub discount: f64,
    pub reason: Option<Ineligibility>,
}

impl PromotionVerdict {
    pub fn accepted(code: &str, discount: f64) -> Self {
        Self {
            code: code.into(),
            valid: true,
            discount,
            reason: None,
        }
    }

    pub fn rejected(code: &str, reason: Ineligibility) -> Self {
        Self {
            code: Promotion::normalize_code(code),
            valid: false,
            discount: 0.0,
            reason: Some(reason),
        }
    }

    /// User-facing explanation, empty when the code was accepted.
    pub fn message(&self) -> String {
        self.reason
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default()
    }
}

#[test]
fn code_is_stored_upper_cased() {
    let promotion = Promotion::new(" summer10 ", PromotionKind::Percentage, 10.0, "");
    assert_eq!(promotion.code, "SUMMER10");
}

#[test]
fn hour_range_is_half_open_and_wraps() {
    let lunch = HourRange::new(12, 14);
    assert!(lunch.contains(12));
    assert!(lunch.contains(13));
    assert!(!lunch.contains(14));

    let overnight = HourRange::new(22, 2);
    assert!(overnight.contains(23));
    assert!(overnight.contains(1));
    assert!(!overnight.contains(2));
    assert!(!overnight.contains(12));
}

#[test]
fn record_usage_appends_then_increments_entry() {
    let mut promotion = Promotion::new("TWICE", PromotionKind::Fixed, 5.0, "");
    promotion.limit_per_user = 2;
    let requester = Requester::user(Uuid::new_v4());

    promotion.record_usage(Some(&requester), Utc::now()).unwrap();
    assert_eq!(promotion.used_by.len(), 1);
    assert_eq!(promotion.used_by[0].usage_count, 1);

    promotion.record_usage(Some(&requester), Utc::now()).unwrap();
    assert_eq!(promotion.used_by.len(), 1);
    assert_eq!(promotion.used_by[0].usage_count, 2);
    assert_eq!(promotion.usage_count, 2);

    assert_eq!(
        promotion.record_usage(Some(&requester), Utc::now()),
        Err(Ineligibility::PerUserLimitReached)
    );
    assert_eq!(promotion.usage_count, 2);
}

#[test]
fn record_usage_refuses_past_global_limit() {
    let mut promotion = Promotion::new("ONCE", PromotionKind::Free, 0.0, "");
    promotion.usage_limit = Some(1);

    promotion.record_usage(None, Utc::now()).unwrap();
    assert_eq!(
        promotion.record_usage(None, Utc::now()),
        Err(Ineligibility::UsageLimitReached)
    );
    assert_eq!(promotion.usage_count, 1);
    assert!(promotion.used_by.is_empty());
}

#[test]
fn validate_fields_rejects_bad_calendar_rules() {
    let mut promotion = Promotion::new("BAD", PromotionKind::Fixed, 5.0, "");
    assert!(promotion.validate_fields().is_ok());

    promotion.excluded_weekdays = vec![7];
    assert!(promotion.validate_fields().is_err());

    promotion.excluded_weekdays = vec![];
    promotion.excluded_hour_ranges = vec![HourRange::new(5, 5)];
    assert!(promotion.validate_fields().is_err());

    promotion.excluded_hour_ranges = vec![];
    promotion.value = -1.0;
    assert!(promotion.validate_fields().is_err());
}

#[test]
fn percentage_above_one_hundred_is_rejected() {
    let mut promotion = Promotion::new("ALL", PromotionKind::Percentage, 100.0, "");
    assert!(promotion.validate_fields().is_ok());

    promotion.value = 250.0;
    let err = promotion.validate_fields().unwrap_err();
    assert!(err.is_invalid_input_error());

    // fixed amounts have no such ceiling
    promotion.kind = PromotionKind::Fixed;
    assert!(promotion.validate_fields().is_ok());
}
