//! Timer-driven workers, one per reconciliation pass.
//!
//! Each worker owns its API object and runs the pass on every tick. Errors are logged and the worker carries on. Do
//! not await the returned `JoinHandle`s, as they run indefinitely.
use std::time::Duration;

use log::*;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use trade_engine::{
    events::EventProducers,
    AutoBuyApi,
    AutoFulfillApi,
    AutoSellApi,
    ContractSyncApi,
    NotificationApi,
    SqliteDatabase,
};

use crate::integrations::esi::EsiContractHistory;

fn timer(period: Duration) -> tokio::time::Interval {
    let mut timer = tokio::time::interval(period);
    // A slow pass must not trigger a burst of catch-up passes
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

pub fn start_auto_sell_worker(db: SqliteDatabase, region_id: i64, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = timer(period);
        let api = AutoSellApi::new(db.clone(), db, region_id);
        info!("🕰️ Auto-sell worker started. Interval: {}s", period.as_secs());
        loop {
            timer.tick().await;
            debug!("🕰️ Running auto-sell pass");
            match api.sync_all().await {
                Ok(summary) => info!("🕰️ Auto-sell pass: {summary}"),
                Err(e) => error!("🕰️ Error running auto-sell pass: {e}"),
            }
        }
    })
}

pub fn start_auto_buy_worker(db: SqliteDatabase, region_id: i64, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = timer(period);
        let api = AutoBuyApi::new(db.clone(), db, region_id);
        info!("🕰️ Auto-buy worker started. Interval: {}s", period.as_secs());
        loop {
            timer.tick().await;
            debug!("🕰️ Running auto-buy pass");
            match api.sync_all().await {
                Ok(summary) => info!("🕰️ Auto-buy pass: {summary}"),
                Err(e) => error!("🕰️ Error running auto-buy pass: {e}"),
            }
        }
    })
}

pub fn start_auto_fulfill_worker(db: SqliteDatabase, producers: EventProducers, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = timer(period);
        let api = AutoFulfillApi::new(db, producers);
        info!("🕰️ Auto-fulfill worker started. Interval: {}s", period.as_secs());
        loop {
            timer.tick().await;
            debug!("🕰️ Running auto-fulfill pass");
            match api.sync_all().await {
                Ok(summary) => info!("🕰️ Auto-fulfill pass: {summary}"),
                Err(e) => error!("🕰️ Error running auto-fulfill pass: {e}"),
            }
        }
    })
}

pub fn start_contract_sync_worker(
    db: SqliteDatabase,
    contracts: EsiContractHistory,
    producers: EventProducers,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = timer(period);
        let api = ContractSyncApi::new(db, contracts, producers);
        info!("🕰️ Contract sync worker started. Interval: {}s", period.as_secs());
        loop {
            timer.tick().await;
            debug!("🕰️ Running contract sync pass");
            match api.sync_all().await {
                Ok(summary) => info!("🕰️ Contract sync pass: {summary}"),
                Err(e) => error!("🕰️ Error running contract sync pass: {e}"),
            }
        }
    })
}

pub fn start_outbox_worker(
    db: SqliteDatabase,
    producers: EventProducers,
    batch_size: i64,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = timer(period);
        let api = NotificationApi::new(db, producers);
        info!("🕰️ Outbox worker started. Interval: {}s", period.as_secs());
        loop {
            timer.tick().await;
            match api.dispatch_pending(batch_size).await {
                Ok(0) => trace!("🕰️ Outbox is empty"),
                Ok(n) => info!("🕰️ {n} purchase notifications re-delivered"),
                Err(e) => error!("🕰️ Error draining the purchase outbox: {e}"),
            }
        }
    })
}
