use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::entities::{Ineligibility, PromotionKind, Requester, Route, VehicleClass};

/// A ride request as received from the booking surface. `date_time` is local wall-clock time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub origin: String,
    pub destination: String,
    #[serde(default)]
    pub stops: Vec<String>,
    pub date_time: NaiveDateTime,
    #[serde(default)]
    pub vehicle_class: VehicleClass,
    #[serde(default = "default_passenger_count")]
    pub passenger_count: u32,
    #[serde(default)]
    pub luggage_count: u32,
    #[serde(default)]
    pub with_pet: bool,
    #[serde(default)]
    pub is_airport: bool,
    #[serde(default)]
    pub waiting_minutes: u32,
    pub promotion_code: Option<String>,
    pub requester: Option<Requester>,
    pub organization_id: Option<Uuid>,
}

fn default_passenger_count() -> u32 {
    1
}

impl QuoteRequest {
    pub fn new(origin: &str, destination: &str, date_time: NaiveDateTime) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            stops: vec![],
            date_time,
            vehicle_class: VehicleClass::Standard,
            passenger_count: default_passenger_count(),
            luggage_count: 0,
            with_pet: false,
            is_airport: false,
            waiting_minutes: 0,
            promotion_code: None,
            requester: None,
            organization_id: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Surcharge {
    Fixed { label: String, amount: f64 },
    Factor { label: String, factor: f64 },
}

impl Surcharge {
    pub fn amount(&self) -> Option<f64> {
        match self {
            Self::Fixed { amount, .. } => Some(*amount),
            Self::Factor { .. } => None,
        }
    }

    pub fn factor(&self) -> Option<f64> {
        match self {
            Self::Factor { factor, .. } => Some(*factor),
            Self::Fixed { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiscountDetail {
    pub code: String,
    pub kind: PromotionKind,
    pub value: f64,
    pub amount: f64,
    pub description: String,
}

/// Itemized price breakdown. Field names are consumed as-is by document renderers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub token: Uuid,
    pub base_price: f64,
    pub distance_price: f64,
    pub duration_price: f64,
    pub surcharges: BTreeMap<String, Surcharge>,
    /// Sum of the fixed-amount surcharges only.
    pub surcharge_total: f64,
    /// Extra amount from multiplicative factors; zero unless factors are applied.
    pub factor_adjustment: f64,
    pub discount: f64,
    pub discount_detail: Option<DiscountDetail>,
    pub promotion_rejection: Option<Ineligibility>,
    pub minimum_applied: bool,
    pub total_price: f64,
    pub route: Route,
}
