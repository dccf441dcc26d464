mod coordinates;
mod promotion;
mod quote;
mod rate_table;
mod requester;
mod route;
mod vehicle;

pub use coordinates::{Coordinates, EARTH_RADIUS_METERS};
pub use promotion::{
    HourRange, Ineligibility, Promotion, PromotionKind, PromotionUsage, PromotionVerdict,
};
pub use quote::{DiscountDetail, Quote, QuoteRequest, Surcharge};
pub use rate_table::RateTable;
pub use requester::Requester;
pub use route::{Leg, Route, RouteSource};
pub use vehicle::VehicleClass;
