//! Trade Engine
//!
//! The trade engine runs the player-to-player trading layer of the companion tool. Sellers mark containers as
//! "auto-sell" and buyers mark stockpile targets as "auto-buy". The engine keeps listings and buy orders in line with
//! reference prices and inventory, matches compatible intents into purchases, and later settles those purchases once
//! the in-game delivery contract has finished.
//!
//! The library is divided into these sections:
//! 1. Storage ([`mod@traits`] and the SQLite backend). The APIs only talk to storage and to external collaborators
//!    through the traits. The data types themselves are public, in [`mod@db_types`].
//! 2. Pricing ([`mod@pricing`]). A pure mapping from reference prices and a layered pricing policy to a unit price.
//! 3. The reconciliation API ([`mod@trade_api`]): auto-sell, auto-buy, auto-fulfill, contract sync and the
//!    notification outbox.
//!
//! The engine also emits events when purchases are created and completed. See [`mod@events`].
#[cfg(feature = "sqlite")]
mod sqlite;

pub mod db_types;
pub mod events;
pub mod helpers;
pub mod pricing;
mod trade_api;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::{db, SqliteDatabase};
pub use trade_api::{
    auto_buy_api::AutoBuyApi,
    auto_fulfill_api::{AutoFulfillApi, OrderOutcome},
    auto_sell_api::AutoSellApi,
    contract_sync_api::{index_by_buyer, match_keys, ContractSyncApi, KeyIndex},
    errors::SyncError,
    notification_api::NotificationApi,
    sync_objects::{FulfillSummary, SettlementSummary, SyncSummary},
};
