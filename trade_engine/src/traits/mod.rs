//! # Storage backends and external collaborators
//!
//! The reconciliation APIs never talk to a database or the game API directly. Everything goes through the traits
//! defined here.
//!
//! ## Stores
//! * [`ListingManagement`] holds auto-sell policies and the listings derived from them.
//! * [`BuyOrderManagement`] holds auto-buy policies and the buy orders derived from them.
//! * [`PurchaseManagement`] holds matched trades, performs the atomic purchase, and tracks settlement.
//! * [`NotificationOutbox`] is the durable queue of purchase notifications.
//! * [`PermissionManagement`] answers the bilateral-trust question.
//! * [`ReferencePrices`] provides reference-market prices.
//! * [`CharacterManagement`] and [`NameLookup`] provide character credentials and display names.
//!
//! ## Collaborators
//! * [`AssetSnapshot`] returns container contents.
//! * [`StockpileDeficits`] returns what a buyer is short of.
//! * [`ContractHistory`] returns in-game contracts and refreshes credentials.
//!
//! [`crate::SqliteDatabase`] implements every store, plus [`AssetSnapshot`] and [`StockpileDeficits`] on top of the
//! imported asset tables.
mod buy_order_management;
mod errors;
mod listing_management;
mod permission_management;
mod purchase_management;
mod reference_prices;
mod upstream;

pub use buy_order_management::BuyOrderManagement;
pub use errors::{StoreError, UpstreamError};
pub use listing_management::ListingManagement;
pub use permission_management::PermissionManagement;
pub use purchase_management::{NotificationOutbox, PurchaseManagement};
pub use reference_prices::ReferencePrices;
pub use upstream::{AssetSnapshot, CharacterManagement, ContractHistory, NameLookup, StockpileDeficits};
