mod promotion_api;
mod quote_api;

use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    api::API,
    config::EngineConfig,
    db::PgPool,
    entities::RateTable,
    error::Error,
    pricing::Quoter,
    store::{InMemoryPromotionStore, PgPromotionStore, PromotionStore},
};

pub struct Engine {
    store: Arc<dyn PromotionStore>,
    quoter: Quoter,
    rates: RateTable,
    organization_rates: HashMap<Uuid, RateTable>,
}

impl Engine {
    #[tracing::instrument(name = "Engine::new", skip_all)]
    pub fn new(config: &EngineConfig, store: Arc<dyn PromotionStore>) -> Self {
        Self {
            store,
            quoter: config.quoter(),
            rates: config.rates.clone(),
            organization_rates: HashMap::new(),
        }
    }

    /// Postgres-backed when `database_url` is set, in-memory otherwise.
    #[tracing::instrument(name = "Engine::connect", skip_all)]
    pub async fn connect(config: &EngineConfig) -> Result<Self, Error> {
        let store: Arc<dyn PromotionStore> = match &config.database_url {
            Some(url) => {
                let PgPool(pool) = PgPool::new(url, config.database_max_connections).await?;
                Arc::new(PgPromotionStore::new(pool).await?)
            }
            None => {
                tracing::info!("DATABASE_URL not set, promotions are kept in memory");
                Arc::new(InMemoryPromotionStore::new())
            }
        };

        Ok(Self::new(config, store))
    }

    pub fn with_quoter(mut self, quoter: Quoter) -> Self {
        self.quoter = quoter;
        self
    }

    pub fn with_organization_rates(
        mut self,
        organization_id: Uuid,
        rates: RateTable,
    ) -> Result<Self, Error> {
        rates.validate()?;
        self.organization_rates.insert(organization_id, rates);
        Ok(self)
    }

    fn rates_for(&self, organization_id: Option<Uuid>) -> &RateTable {
        organization_id
            .and_then(|id| self.organization_rates.get(&id))
            .unwrap_or(&self.rates)
    }
}

impl API for Engine {}

#[cfg(test)]
pub(crate) fn test_engine(config: &EngineConfig) -> Engine {
    use crate::pricing::DistanceTable;

    let table = DistanceTable::empty().with_entry("Hotel A", "Hotel B", 20.0, 30.0);

    Engine::new(config, Arc::new(InMemoryPromotionStore::new()))
        .with_quoter(config.quoter_with_table(table))
}

#[test]
fn unknown_organization_falls_back_to_default_rates() {
    let organization_id = Uuid::new_v4();
    let rates = RateTable {
        price_per_km: 2.0,
        ..RateTable::default()
    };

    let engine = test_engine(&EngineConfig::default())
        .with_organization_rates(organization_id, rates.clone())
        .unwrap();

    assert_eq!(engine.rates_for(Some(organization_id)), &rates);
    assert_eq!(engine.rates_for(Some(Uuid::new_v4())), &RateTable::default());
    assert_eq!(engine.rates_for(None), &RateTable::default());

    let invalid = RateTable {
        price_per_km: -1.0,
        ..RateTable::default()
    };
    let err = test_engine(&EngineConfig::default())
        .with_organization_rates(organization_id, invalid)
        .err()
        .unwrap();
    assert!(err.is_configuration_error());
}
