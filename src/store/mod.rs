mod memory;
mod postgres;

pub use memory::InMemoryPromotionStore;
pub use postgres::PgPromotionStore;

use async_trait::async_trait;

use crate::entities::{Ineligibility, Promotion};
use crate::error::Error;

#[derive(Clone, Debug, PartialEq)]
pub enum Redemption {
    Applied(Promotion),
    Rejected(Ineligibility),
}

/// Validation and usage recording run against the locked promotion.
pub type RedemptionGuard<'a> =
    &'a (dyn Fn(&mut Promotion) -> Result<(), Ineligibility> + Send + Sync);

#[async_trait]
pub trait PromotionStore: Send + Sync {
    /// Fails with an invalid input error when the code is already taken.
    async fn insert_promotion(&self, promotion: Promotion) -> Result<Promotion, Error>;

    async fn find_promotion(&self, code: &str) -> Result<Option<Promotion>, Error>;

    /// Applies `redeem` while holding the promotion exclusively. Changes are written back
    /// only when it succeeds, so concurrent redemptions of one code are serialized.
    async fn redeem_promotion(
        &self,
        code: &str,
        redeem: RedemptionGuard<'_>,
    ) -> Result<Redemption, Error>;
}
