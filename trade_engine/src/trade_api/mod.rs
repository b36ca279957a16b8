//! # Trade engine public API
//!
//! The reconciliation pipeline is split into independent passes. Each one can be run on a timer or triggered by an
//! upstream refresh, and each is idempotent under repetition.
//!
//! * [`auto_sell_api`] derives listings from auto-sell containers.
//! * [`auto_buy_api`] derives buy orders from auto-buy configs and stockpile deficits.
//! * [`auto_fulfill_api`] matches buy orders against listings and records purchases.
//! * [`contract_sync_api`] settles purchases once their delivery contract has finished in game.
//! * [`notification_api`] re-delivers purchase notifications that could not be sent at commit time.
//!
//! # API usage
//!
//! Every API is created by supplying a backend that implements the store traits it needs, plus any external
//! collaborators:
//!
//! ```rust,ignore
//! use trade_engine::{AutoSellApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! // SqliteDatabase also serves container contents from the imported asset tables
//! let api = AutoSellApi::new(db.clone(), db, 10000002);
//! let summary = api.sync_all().await?;
//! ```
pub mod auto_buy_api;
pub mod auto_fulfill_api;
pub mod auto_sell_api;
pub mod contract_sync_api;
pub mod errors;
pub mod notification_api;
pub mod sync_objects;
