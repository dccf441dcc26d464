use super::Engine;

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    api::PromotionAPI,
    entities::{Promotion, PromotionVerdict},
    error::Error,
    pricing::{discount_for, round2, EligibilityContext},
    store::Redemption,
};

impl Engine {
    async fn lookup_for_policy(&self, code: &str) -> Result<Option<Promotion>, Error> {
        if self.quoter.promotions().requires_lookup() {
            self.store.find_promotion(code).await
        } else {
            Ok(None)
        }
    }
}

#[async_trait]
impl PromotionAPI for Engine {
    #[tracing::instrument(skip(self, promotion), fields(code = %promotion.code))]
    async fn create_promotion(&self, promotion: Promotion) -> Result<Promotion, Error> {
        let promotion = Promotion {
            code: Promotion::normalize_code(&promotion.code),
            ..promotion
        };

        promotion.validate_fields()?;

        let promotion = self.store.insert_promotion(promotion).await?;

        tracing::info!("created promotion {}", promotion.code);

        Ok(promotion)
    }

    #[tracing::instrument(skip(self))]
    async fn find_promotion(&self, code: &str) -> Result<Option<Promotion>, Error> {
        self.store.find_promotion(code).await
    }

    #[tracing::instrument(skip(self))]
    async fn check_promotion(
        &self,
        code: &str,
        ctx: EligibilityContext,
    ) -> Result<PromotionVerdict, Error> {
        let promotion = self.lookup_for_policy(code).await?;

        let verdict = match self.quoter.promotions().evaluate(code, promotion.as_ref(), &ctx) {
            Ok(detail) => PromotionVerdict::accepted(&detail.code, round2(detail.amount)),
            Err(reason) => PromotionVerdict::rejected(code, reason),
        };

        Ok(verdict)
    }

    #[tracing::instrument(skip(self))]
    async fn redeem_promotion(
        &self,
        code: &str,
        ctx: EligibilityContext,
    ) -> Result<PromotionVerdict, Error> {
        let policy = self.quoter.promotions();

        // the built-in code keeps no counters
        if !policy.requires_lookup() {
            return self.check_promotion(code, ctx).await;
        }

        let now = Utc::now();

        let redemption = self
            .store
            .redeem_promotion(code, &|promotion: &mut Promotion| {
                policy.evaluate(code, Some(&*promotion), &ctx)?;
                promotion.record_usage(ctx.requester.as_ref(), now)
            })
            .await?;

        match redemption {
            Redemption::Applied(promotion) => {
                tracing::info!(
                    "redeemed {} ({} use(s))",
                    promotion.code,
                    promotion.usage_count
                );

                let discount = discount_for(&promotion, ctx.order_amount);

                Ok(PromotionVerdict::accepted(&promotion.code, round2(discount)))
            }
            Redemption::Rejected(reason) => {
                tracing::info!("redemption of {:?} refused: {}", code, reason);

                Ok(PromotionVerdict::rejected(code, reason))
            }
        }
    }
}

#[cfg(test)]
use crate::config::{EngineConfig, PromotionMode};
#[cfg(test)]
use crate::engine::test_engine;
#[cfg(test)]
use crate::entities::{Ineligibility, PromotionKind, Requester, VehicleClass};
#[cfg(test)]
use chrono::{NaiveDate, NaiveDateTime};
#[cfg(test)]
use std::sync::Arc;
#[cfg(test)]
use tokio_test::block_on;
#[cfg(test)]
use uuid::Uuid;

#[cfg(test)]
fn wednesday_noon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 13)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

#[cfg(test)]
fn ctx(requester: Option<Requester>, amount: f64) -> EligibilityContext {
    EligibilityContext {
        requester,
        order_amount: amount,
        vehicle_class: Some(VehicleClass::Standard),
        at: Some(wednesday_noon()),
    }
}

#[test]
fn create_promotion_normalizes_and_validates() {
    let engine = test_engine(&EngineConfig::default());

    let created = block_on(engine.create_promotion(Promotion::new(
        " tenoff ",
        PromotionKind::Fixed,
        10.0,
        "Ten off",
    )))
    .unwrap();
    assert_eq!(created.code, "TENOFF");

    let duplicate = block_on(engine.create_promotion(Promotion::new(
        "TenOff",
        PromotionKind::Fixed,
        5.0,
        "",
    )))
    .unwrap_err();
    assert!(duplicate.is_invalid_input_error());

    let negative = block_on(engine.create_promotion(Promotion::new(
        "BROKEN",
        PromotionKind::Fixed,
        -5.0,
        "",
    )))
    .unwrap_err();
    assert!(negative.is_invalid_input_error());

    let oversized = block_on(engine.create_promotion(Promotion::new(
        "TOOMUCH",
        PromotionKind::Percentage,
        250.0,
        "",
    )))
    .unwrap_err();
    assert!(oversized.is_invalid_input_error());
    assert!(block_on(engine.find_promotion("TOOMUCH")).unwrap().is_none());
    assert!(block_on(engine.find_promotion("BROKEN")).unwrap().is_none());
}

#[test]
fn check_reports_reasons_without_consuming() {
    let engine = test_engine(&EngineConfig::default());

    let mut promotion = Promotion::new("BIGORDER", PromotionKind::Percentage, 15.0, "");
    promotion.min_order_amount = 50.0;
    block_on(engine.create_promotion(promotion)).unwrap();

    let unknown = block_on(engine.check_promotion("nope", ctx(None, 100.0))).unwrap();
    assert!(!unknown.valid);
    assert_eq!(unknown.reason, Some(Ineligibility::UnknownCode));
    assert_eq!(unknown.message(), "this promotion code does not exist");

    let small = block_on(engine.check_promotion("bigorder", ctx(None, 20.0))).unwrap();
    assert_eq!(small.reason, Some(Ineligibility::BelowMinimumOrder));
    assert_eq!(small.discount, 0.0);

    let ok = block_on(engine.check_promotion("bigorder", ctx(None, 80.0))).unwrap();
    assert!(ok.valid);
    assert_eq!(ok.discount, 12.0);

    let stored = block_on(engine.find_promotion("BIGORDER")).unwrap().unwrap();
    assert_eq!(stored.usage_count, 0);
}

#[test]
fn redeem_enforces_per_user_limit() {
    let engine = test_engine(&EngineConfig::default());
    block_on(engine.create_promotion(Promotion::new("ONCE", PromotionKind::Fixed, 5.0, "")))
        .unwrap();

    let rider = Requester::user(Uuid::new_v4());

    let first = block_on(engine.redeem_promotion("once", ctx(Some(rider.clone()), 30.0))).unwrap();
    assert!(first.valid);
    assert_eq!(first.discount, 5.0);

    let second = block_on(engine.redeem_promotion("once", ctx(Some(rider.clone()), 30.0))).unwrap();
    assert_eq!(second.reason, Some(Ineligibility::PerUserLimitReached));

    let other = Requester::user(Uuid::new_v4());
    let third = block_on(engine.redeem_promotion("ONCE", ctx(Some(other), 30.0))).unwrap();
    assert!(third.valid);

    let stored = block_on(engine.find_promotion("ONCE")).unwrap().unwrap();
    assert_eq!(stored.usage_count, 2);
    assert_eq!(stored.used_by.len(), 2);
    assert_eq!(stored.usage_for(&rider).unwrap().usage_count, 1);
}

#[test]
fn redeem_checks_rules_before_counting() {
    let engine = test_engine(&EngineConfig::default());

    let mut promotion = Promotion::new("WEEKENDS", PromotionKind::Percentage, 10.0, "");
    // no Wednesdays
    promotion.excluded_weekdays = vec![3];
    block_on(engine.create_promotion(promotion)).unwrap();

    let verdict = block_on(engine.redeem_promotion("WEEKENDS", ctx(None, 40.0))).unwrap();
    assert_eq!(verdict.reason, Some(Ineligibility::ExcludedWeekday));

    let stored = block_on(engine.find_promotion("WEEKENDS")).unwrap().unwrap();
    assert_eq!(stored.usage_count, 0);
    assert!(stored.used_by.is_empty());
}

#[test]
fn welcome_mode_accepts_only_the_built_in_code() {
    let config = EngineConfig {
        promotion_mode: PromotionMode::Welcome,
        ..EngineConfig::default()
    };
    let engine = test_engine(&config);

    let verdict = block_on(engine.redeem_promotion("welcome", ctx(None, 50.0))).unwrap();
    assert!(verdict.valid);
    assert_eq!(verdict.code, "WELCOME");
    assert_eq!(verdict.discount, 5.0);

    let other = block_on(engine.check_promotion("SPRING", ctx(None, 50.0))).unwrap();
    assert_eq!(other.reason, Some(Ineligibility::UnknownCode));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_redemptions_never_exceed_usage_limit() {
    let engine = Arc::new(test_engine(&EngineConfig::default()));

    let mut promotion = Promotion::new("FIRST3", PromotionKind::Fixed, 4.0, "");
    promotion.usage_limit = Some(3);
    engine.create_promotion(promotion).await.unwrap();

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move {
                let requester = Requester::client(Uuid::new_v4());
                engine
                    .redeem_promotion("FIRST3", ctx(Some(requester), 25.0))
                    .await
                    .unwrap()
            })
        })
        .collect();

    let verdicts: Vec<PromotionVerdict> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(verdicts.iter().filter(|verdict| verdict.valid).count(), 3);
    assert!(verdicts
        .iter()
        .filter(|verdict| !verdict.valid)
        .all(|verdict| verdict.reason == Some(Ineligibility::UsageLimitReached)));

    let stored = engine.find_promotion("FIRST3").await.unwrap().unwrap();
    assert_eq!(stored.usage_count, 3);
    assert_eq!(stored.used_by.len(), 3);
}
