use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{PromotionStore, Redemption, RedemptionGuard};
use crate::entities::{Ineligibility, Promotion};
use crate::error::{invalid_input_error, Error};

#[derive(Debug, Default)]
pub struct InMemoryPromotionStore {
    promotions: Mutex<HashMap<String, Promotion>>,
}

impl InMemoryPromotionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PromotionStore for InMemoryPromotionStore {
    #[tracing::instrument(skip(self, promotion), fields(code = %promotion.code))]
    async fn insert_promotion(&self, promotion: Promotion) -> Result<Promotion, Error> {
        let code = Promotion::normalize_code(&promotion.code);
        let mut promotions = self.promotions.lock().await;

        if promotions.contains_key(&code) {
            return Err(invalid_input_error());
        }

        let promotion = Promotion { code: code.clone(), ..promotion };
        promotions.insert(code, promotion.clone());

        Ok(promotion)
    }

    #[tracing::instrument(skip(self))]
    async fn find_promotion(&self, code: &str) -> Result<Option<Promotion>, Error> {
        let promotions = self.promotions.lock().await;

        Ok(promotions.get(&Promotion::normalize_code(code)).cloned())
    }

    #[tracing::instrument(skip(self, redeem))]
    async fn redeem_promotion(
        &self,
        code: &str,
        redeem: RedemptionGuard<'_>,
    ) -> Result<Redemption, Error> {
        let mut promotions = self.promotions.lock().await;

        let stored = match promotions.get_mut(&Promotion::normalize_code(code)) {
            Some(stored) => stored,
            None => return Ok(Redemption::Rejected(Ineligibility::UnknownCode)),
        };

        let mut candidate = stored.clone();

        match redeem(&mut candidate) {
            Ok(()) => {
                *stored = candidate.clone();
                Ok(Redemption::Applied(candidate))
            }
            Err(reason) => Ok(Redemption::Rejected(reason)),
        }
    }
}

#[test]
fn duplicate_codes_are_rejected_case_insensitively() {
    use crate::entities::PromotionKind;
    use tokio_test::block_on;

    let store = InMemoryPromotionStore::new();

    let summer = Promotion::new("summer", PromotionKind::Fixed, 5.0, "");
    block_on(store.insert_promotion(summer)).unwrap();

    let clash = Promotion::new("SUMMER", PromotionKind::Fixed, 3.0, "");
    let err = block_on(store.insert_promotion(clash)).unwrap_err();
    assert!(err.is_invalid_input_error());

    let found = block_on(store.find_promotion("Summer")).unwrap().unwrap();
    assert_eq!(found.value, 5.0);
}

#[test]
fn failed_redemption_leaves_promotion_untouched() {
    use crate::entities::PromotionKind;
    use tokio_test::block_on;

    let store = InMemoryPromotionStore::new();
    let keep = Promotion::new("KEEP", PromotionKind::Fixed, 5.0, "");
    block_on(store.insert_promotion(keep)).unwrap();

    let outcome = block_on(store.redeem_promotion("keep", &|promotion: &mut Promotion| {
        promotion.usage_count += 10;
        Err(Ineligibility::ExcludedHour)
    }))
    .unwrap();

    assert_eq!(outcome, Redemption::Rejected(Ineligibility::ExcludedHour));
    assert_eq!(block_on(store.find_promotion("KEEP")).unwrap().unwrap().usage_count, 0);

    let missing = block_on(store.redeem_promotion("GONE", &|_: &mut Promotion| Ok(()))).unwrap();
    assert_eq!(missing, Redemption::Rejected(Ineligibility::UnknownCode));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_redemptions_respect_usage_limit() {
    use crate::entities::PromotionKind;
    use chrono::Utc;
    use std::sync::Arc;

    let store = Arc::new(InMemoryPromotionStore::new());
    let mut promotion = Promotion::new("ONLYONE", PromotionKind::Percentage, 50.0, "");
    promotion.usage_limit = Some(1);
    store.insert_promotion(promotion).await.unwrap();

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .redeem_promotion("ONLYONE", &|promotion: &mut Promotion| {
                        promotion.record_usage(None, Utc::now())
                    })
                    .await
                    .unwrap()
            })
        })
        .collect();

    let outcomes = futures::future::join_all(handles).await;
    let applied = outcomes
        .into_iter()
        .filter(|outcome| matches!(outcome, Ok(Redemption::Applied(_))))
        .count();

    assert_eq!(applied, 1);
    let stored = store.find_promotion("ONLYONE").await.unwrap().unwrap();
    assert_eq!(stored.usage_count, 1);
}
