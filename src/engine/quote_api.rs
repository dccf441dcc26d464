use super::Engine;

use async_trait::async_trait;

use crate::{
    api::QuoteAPI,
    entities::{Quote, QuoteRequest},
    error::Error,
};

#[async_trait]
impl QuoteAPI for Engine {
    #[tracing::instrument(
        skip(self, request),
        fields(origin = %request.origin, destination = %request.destination)
    )]
    async fn create_quote(&self, request: QuoteRequest) -> Result<Quote, Error> {
        let rates = self.rates_for(request.organization_id);

        let promotion = match request.promotion_code.as_deref() {
            Some(code) if self.quoter.promotions().requires_lookup() && !code.trim().is_empty() => {
                self.store.find_promotion(code).await?
            }
            _ => None,
        };

        let quote = self.quoter.quote(&request, rates, promotion.as_ref())?;

        tracing::info!(
            "quoted {} ({} m) at {}",
            quote.token,
            quote.route.total_distance_meters.round(),
            quote.total_price
        );

        Ok(quote)
    }
}

#[cfg(test)]
fn hotel_trip() -> QuoteRequest {
    // Wednesday 13 March 2024, noon
    let at = chrono::NaiveDate::from_ymd_opt(2024, 3, 13)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();

    QuoteRequest::new("Hotel A", "Hotel B", at)
}

#[test]
fn quote_applies_stored_promotion() {
    use crate::api::PromotionAPI;
    use crate::config::EngineConfig;
    use crate::entities::{Promotion, PromotionKind};
    use tokio_test::block_on;

    let engine = super::test_engine(&EngineConfig::default());
    let spring = Promotion::new("SPRING", PromotionKind::Percentage, 20.0, "Spring");
    block_on(engine.create_promotion(spring)).unwrap();

    let mut request = hotel_trip();
    request.promotion_code = Some("spring".into());

    let quote = block_on(engine.create_quote(request)).unwrap();

    // 2.50 + 20 km * 1.05 + 30 min * 0.35
    assert_eq!(quote.distance_price, 21.0);
    assert_eq!(quote.duration_price, 10.5);
    assert_eq!(quote.discount, 6.8);
    assert_eq!(quote.total_price, 27.2);
    assert!(!quote.minimum_applied);

    // quoting never consumes the promotion
    let stored = block_on(engine.find_promotion("SPRING")).unwrap().unwrap();
    assert_eq!(stored.usage_count, 0);
}

#[test]
fn quote_uses_organization_rate_table() {
    use crate::config::EngineConfig;
    use crate::entities::RateTable;
    use tokio_test::block_on;
    use uuid::Uuid;

    let organization_id = Uuid::new_v4();
    let engine = super::test_engine(&EngineConfig::default())
        .with_organization_rates(
            organization_id,
            RateTable {
                price_per_km: 2.0,
                ..RateTable::default()
            },
        )
        .unwrap();

    let mut request = hotel_trip();
    request.organization_id = Some(organization_id);

    let quote = block_on(engine.create_quote(request)).unwrap();
    assert_eq!(quote.distance_price, 40.0);
    assert_eq!(quote.total_price, 53.0);
}

#[test]
fn welcome_mode_skips_the_store() {
    use crate::config::{EngineConfig, PromotionMode};
    use tokio_test::block_on;

    let config = EngineConfig {
        promotion_mode: PromotionMode::Welcome,
        ..EngineConfig::default()
    };
    let engine = super::test_engine(&config);

    let mut request = hotel_trip();
    request.promotion_code = Some("Welcome".into());

    let quote = block_on(engine.create_quote(request)).unwrap();
    assert_eq!(quote.discount, 3.4);
    assert_eq!(quote.total_price, 30.6);
}
