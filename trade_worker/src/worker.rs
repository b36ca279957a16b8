use log::*;
use trade_engine::SqliteDatabase;

use crate::{
    config::WorkerConfig,
    errors::WorkerError,
    integrations::{esi::EsiContractHistory, notifications::create_notification_handlers},
    workers::{
        start_auto_buy_worker,
        start_auto_fulfill_worker,
        start_auto_sell_worker,
        start_contract_sync_worker,
        start_outbox_worker,
    },
};

/// Opens the database, starts the event handlers and every enabled worker, then runs until Ctrl-C.
pub async fn run_worker(config: WorkerConfig) -> Result<(), WorkerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| WorkerError::InitializeError(e.to_string()))?;
    if config.skip_migrations {
        info!("🗃️ Skipping database migrations");
    } else {
        db.run_migrations().await.map_err(|e| WorkerError::MigrationError(e.to_string()))?;
    }

    let handlers = create_notification_handlers(config.event_buffer_size);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let region_id = config.reference_region_id;
    let intervals = config.intervals;
    let mut jobs = vec![
        start_auto_sell_worker(db.clone(), region_id, intervals.auto_sell),
        start_auto_buy_worker(db.clone(), region_id, intervals.auto_buy),
        start_outbox_worker(db.clone(), producers.clone(), config.outbox_batch_size, intervals.outbox),
    ];
    if config.disable_auto_fulfill {
        info!("🕰️ Auto-fulfill worker not started");
    } else {
        jobs.push(start_auto_fulfill_worker(db.clone(), producers.clone(), intervals.auto_fulfill));
    }
    if config.disable_contract_sync {
        info!("🕰️ Contract sync worker not started");
    } else {
        let contracts = EsiContractHistory::from_config(config.esi.clone())?;
        jobs.push(start_contract_sync_worker(db.clone(), contracts, producers.clone(), intervals.contract_sync));
    }
    drop(producers);
    info!("🚀️ {} workers running. Press Ctrl-C to stop.", jobs.len());

    tokio::signal::ctrl_c().await?;
    info!("🚀️ Shutting down");
    for job in jobs {
        job.abort();
    }
    Ok(())
}
