//! # SQLite Database methods
//!
//! "Low-level" SQLite interactions. Every function takes a `&mut SqliteConnection`, so callers can use a pooled
//! connection, or open a transaction and pass `&mut *tx` to compose several calls atomically.
use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

pub mod assets;
pub mod auto_configs;
pub mod buy_orders;
pub mod characters;
pub mod listings;
pub mod market_prices;
pub mod names;
pub mod outbox;
pub mod permissions;
pub mod purchases;
pub mod reviews;

const SQLITE_DB_URL: &str = "sqlite://data/trade_store.db";

pub fn db_url() -> String {
    let result = env::var("TRD_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ TRD_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}
