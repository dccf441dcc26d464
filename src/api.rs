use async_trait::async_trait;

use crate::entities::{Promotion, PromotionVerdict, Quote, QuoteRequest};
use crate::error::Error;
use crate::pricing::EligibilityContext;

#[async_trait]
pub trait QuoteAPI {
    /// Prices a ride. An unusable promotion code is reported on the quote, never raised.
    async fn create_quote(&self, request: QuoteRequest) -> Result<Quote, Error>;
}

#[async_trait]
pub trait PromotionAPI {
    async fn create_promotion(&self, promotion: Promotion) -> Result<Promotion, Error>;

    async fn find_promotion(&self, code: &str) -> Result<Option<Promotion>, Error>;

    /// Read-only eligibility check for `ctx.order_amount`.
    async fn check_promotion(
        &self,
        code: &str,
        ctx: EligibilityContext,
    ) -> Result<PromotionVerdict, Error>;

    /// Validates and records one use of the code in a single atomic step.
    async fn redeem_promotion(
        &self,
        code: &str,
        ctx: EligibilityContext,
    ) -> Result<PromotionVerdict, Error>;
}

pub trait API: QuoteAPI + PromotionAPI {}
