pub mod location;
pub mod promotion;
pub mod quote;
pub mod route;
pub mod surcharge;

pub use location::{HashedOffset, LocationResolver, OffsetStrategy, RandomOffset};
pub use promotion::{
    discount_for, CustomerEligibility, EligibilityContext, PassReservedFlags, PromotionPolicy,
    PromotionValidator, RejectReservedFlags, RulePolicy, WelcomePolicy,
};
pub use quote::{round2, FactorMode, Quoter};
pub use route::{DistanceTable, RouteEstimator};
pub use surcharge::{SurchargeBreakdown, SurchargeCalculator};
