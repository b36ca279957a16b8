//! Demand-side reconciliation.
//!
//! Works like [`super::auto_sell_api`], but demand comes from stockpile deficits rather than container contents.
//! Both price bounds of a derived buy order are set to the same resolved unit price, so an order only matches
//! listings priced at exactly that level unless it is edited by hand.
use std::{
    collections::{HashMap, HashSet},
    fmt::Debug,
};

use log::*;

use crate::{
    db_types::{AutoBuyConfig, BuyOrder, NewBuyOrder},
    pricing::PricingPolicy,
    trade_api::{errors::SyncError, sync_objects::SyncSummary},
    traits::{BuyOrderManagement, ReferencePrices, StockpileDeficits},
};

pub struct AutoBuyApi<B, S> {
    db: B,
    deficits: S,
    region_id: i64,
}

impl<B, S> Debug for AutoBuyApi<B, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AutoBuyApi (region {})", self.region_id)
    }
}

impl<B, S> AutoBuyApi<B, S>
where
    B: BuyOrderManagement + ReferencePrices,
    S: StockpileDeficits,
{
    pub fn new(db: B, deficits: S, region_id: i64) -> Self {
        Self { db, deficits, region_id }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub async fn sync_all(&self) -> Result<SyncSummary, SyncError> {
        let configs = self.db.fetch_active_auto_buy_configs().await?;
        debug!("🛒 Syncing {} auto-buy configs", configs.len());
        Ok(self.sync_configs(&configs).await)
    }

    pub async fn sync_for_user(&self, user_id: i64) -> Result<SyncSummary, SyncError> {
        let configs = self.db.fetch_auto_buy_configs_for_user(user_id).await?;
        debug!("🛒 Syncing {} auto-buy configs for user {user_id}", configs.len());
        Ok(self.sync_configs(&configs).await)
    }

    async fn sync_configs(&self, configs: &[AutoBuyConfig]) -> SyncSummary {
        let mut summary = SyncSummary::default();
        for config in configs {
            match self.sync_config(config).await {
                Ok(result) => summary += result,
                Err(e) => {
                    warn!("🛒 Could not sync auto-buy config #{}: {e}", config.id);
                    summary.entities += 1;
                    summary.failed += 1;
                },
            }
        }
        info!("🛒 Auto-buy pass complete: {summary}");
        summary
    }

    /// Brings the buy orders of one config in line with the buyer's current deficits.
    pub async fn sync_config(&self, config: &AutoBuyConfig) -> Result<SyncSummary, SyncError> {
        let deficits = self.deficits.deficits_for_config(config).await?;
        let wanted = deficits.into_iter().filter(|d| d.deficit > 0).collect::<Vec<_>>();
        let type_ids = wanted.iter().map(|d| d.type_id).collect::<Vec<_>>();
        let prices = self.db.prices_for_types(&type_ids, self.region_id).await?;
        let existing = self
            .db
            .fetch_active_orders_for_config(config.id)
            .await?
            .into_iter()
            .map(|o| (o.type_id, o))
            .collect::<HashMap<i64, BuyOrder>>();

        let mut summary = SyncSummary { entities: 1, ..Default::default() };
        let mut keep = HashSet::new();
        for deficit in wanted {
            let type_id = deficit.type_id;
            let policy = PricingPolicy::for_deficit(config, &deficit);
            let Some(price) = prices.get(&type_id).and_then(|p| policy.unit_price(p)) else {
                debug!("🛒 No usable {} price for type {type_id} in auto-buy config #{}", policy.source, config.id);
                continue;
            };
            keep.insert(type_id);
            let order = NewBuyOrder::for_config(config, type_id, deficit.deficit, price, price);
            match self.db.upsert_auto_buy_order(order).await {
                Ok(order) => {
                    trace!("🛒 Buy order #{} now wants {} of type {type_id} at {price}", order.id, deficit.deficit);
                    summary.upserted += 1;
                },
                Err(e) => warn!("🛒 Could not upsert buy order for type {type_id} in config #{}: {e}", config.id),
            }
        }

        for (type_id, order) in existing {
            if keep.contains(&type_id) {
                continue;
            }
            match self.db.deactivate_buy_order(order.id).await {
                Ok(()) => {
                    debug!("🛒 Buy order #{} for type {type_id} deactivated", order.id);
                    summary.deactivated += 1;
                },
                Err(e) => warn!("🛒 Could not deactivate buy order #{}: {e}", order.id),
            }
        }
        Ok(summary)
    }
}
