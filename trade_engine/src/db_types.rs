use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;
pub use trade_common::Isk;
use trade_common::Secret;

use crate::helpers::ContractKey;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------      OwnerType      ---------------------------------------------------------
/// Assets, listings and policies belong either to a single character or to a corporation (in which case the
/// division number selects the hangar / wallet division).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OwnerType {
    Character,
    Corporation,
}

impl Display for OwnerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OwnerType::Character => write!(f, "character"),
            OwnerType::Corporation => write!(f, "corporation"),
        }
    }
}

impl FromStr for OwnerType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "character" => Ok(Self::Character),
            "corporation" => Ok(Self::Corporation),
            s => Err(ConversionError(format!("Invalid owner type: {s}"))),
        }
    }
}

//--------------------------------------     PriceSource     ---------------------------------------------------------
/// Which side of the reference market a derived price is anchored to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    /// Highest buy order in the reference region.
    #[default]
    JitaBuy,
    /// Lowest sell order in the reference region.
    JitaSell,
    /// Mid-point of buy and sell. Only defined when both sides exist.
    JitaSplit,
}

impl PriceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceSource::JitaBuy => "jita_buy",
            PriceSource::JitaSell => "jita_sell",
            PriceSource::JitaSplit => "jita_split",
        }
    }
}

impl Display for PriceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for PriceSource {
    /// Unknown price sources fall back to `jita_buy`.
    fn from(value: &str) -> Self {
        match value {
            "jita_buy" => Self::JitaBuy,
            "jita_sell" => Self::JitaSell,
            "jita_split" => Self::JitaSplit,
            other => {
                warn!("Unknown price source '{other}'. Falling back to jita_buy");
                Self::JitaBuy
            },
        }
    }
}

//--------------------------------------   PurchaseStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    /// The trade has been matched, but no delivery contract has been set up yet.
    Pending,
    /// The seller has been given a contract key and is expected to create the in-game delivery contract.
    ContractCreated,
    /// A finished in-game contract carrying the contract key has been observed.
    Completed,
}

impl Display for PurchaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PurchaseStatus::Pending => write!(f, "pending"),
            PurchaseStatus::ContractCreated => write!(f, "contract_created"),
            PurchaseStatus::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for PurchaseStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "contract_created" => Ok(Self::ContractCreated),
            "completed" => Ok(Self::Completed),
            s => Err(ConversionError(format!("Invalid purchase status: {s}"))),
        }
    }
}

//--------------------------------------     ServiceType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    /// Permission to see (and therefore be matched against) the granting user's listings.
    ForSaleBrowse,
}

impl Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceType::ForSaleBrowse => write!(f, "for_sale_browse"),
        }
    }
}

//--------------------------------------     ForSaleItem     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ForSaleItem {
    pub id: i64,
    /// The selling user
    pub user_id: i64,
    pub type_id: i64,
    pub owner_type: OwnerType,
    pub owner_id: i64,
    pub location_id: i64,
    pub container_id: Option<i64>,
    pub division_number: Option<i64>,
    pub quantity_available: i64,
    pub price_per_unit: Isk,
    pub is_active: bool,
    /// `None` for manually created listings. Those are never deactivated by the auto-sell sync.
    pub auto_sell_container_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewForSaleItem {
    pub user_id: i64,
    pub type_id: i64,
    pub owner_type: OwnerType,
    pub owner_id: i64,
    pub location_id: i64,
    pub container_id: Option<i64>,
    pub division_number: Option<i64>,
    pub quantity_available: i64,
    pub price_per_unit: Isk,
    pub auto_sell_container_id: Option<i64>,
}

impl NewForSaleItem {
    /// A listing derived from the contents of an auto-sell container.
    pub fn for_container(container: &AutoSellContainer, type_id: i64, quantity: i64, price_per_unit: Isk) -> Self {
        Self {
            user_id: container.user_id,
            type_id,
            owner_type: container.owner_type,
            owner_id: container.owner_id,
            location_id: container.location_id,
            container_id: Some(container.container_id),
            division_number: container.division_number,
            quantity_available: quantity,
            price_per_unit,
            auto_sell_container_id: Some(container.id),
        }
    }
}

//--------------------------------------      BuyOrder       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct BuyOrder {
    pub id: i64,
    pub buyer_user_id: i64,
    pub type_id: i64,
    pub location_id: i64,
    pub quantity_desired: i64,
    pub min_price_per_unit: Isk,
    pub max_price_per_unit: Isk,
    pub is_active: bool,
    pub auto_buy_config_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BuyOrder {
    /// An order with a non-positive maximum price can never be matched.
    pub fn is_matchable(&self) -> bool {
        self.is_active && self.max_price_per_unit.is_positive()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewBuyOrder {
    pub buyer_user_id: i64,
    pub type_id: i64,
    pub location_id: i64,
    pub quantity_desired: i64,
    pub min_price_per_unit: Isk,
    pub max_price_per_unit: Isk,
    pub auto_buy_config_id: Option<i64>,
}

impl NewBuyOrder {
    pub fn for_config(config: &AutoBuyConfig, type_id: i64, quantity: i64, min: Isk, max: Isk) -> Self {
        Self {
            buyer_user_id: config.user_id,
            type_id,
            location_id: config.location_id,
            quantity_desired: quantity,
            min_price_per_unit: min,
            max_price_per_unit: max,
            auto_buy_config_id: Some(config.id),
        }
    }
}

//--------------------------------------  AutoSellContainer  ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct AutoSellContainer {
    pub id: i64,
    pub user_id: i64,
    pub owner_type: OwnerType,
    pub owner_id: i64,
    pub location_id: i64,
    pub container_id: i64,
    pub division_number: Option<i64>,
    pub price_source: PriceSource,
    pub price_percentage: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAutoSellContainer {
    pub user_id: i64,
    pub owner_type: OwnerType,
    pub owner_id: i64,
    pub location_id: i64,
    pub container_id: i64,
    pub division_number: Option<i64>,
    pub price_source: PriceSource,
    pub price_percentage: f64,
}

/// A per-type pricing override for everything a given owner auto-sells.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct AutoSellOverride {
    pub user_id: i64,
    pub owner_type: OwnerType,
    pub owner_id: i64,
    pub type_id: i64,
    pub price_source: Option<PriceSource>,
    pub price_percentage: Option<f64>,
}

//--------------------------------------    AutoBuyConfig    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct AutoBuyConfig {
    pub id: i64,
    pub user_id: i64,
    pub owner_type: OwnerType,
    pub owner_id: i64,
    pub location_id: i64,
    pub container_id: Option<i64>,
    pub division_number: Option<i64>,
    pub price_source: PriceSource,
    pub price_percentage: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAutoBuyConfig {
    pub user_id: i64,
    pub owner_type: OwnerType,
    pub owner_id: i64,
    pub location_id: i64,
    pub container_id: Option<i64>,
    pub division_number: Option<i64>,
    pub price_source: PriceSource,
    pub price_percentage: f64,
}

//-------------------------------------- PurchaseTransaction ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct PurchaseTransaction {
    pub id: i64,
    pub for_sale_item_id: i64,
    pub buy_order_id: Option<i64>,
    pub buyer_user_id: i64,
    pub seller_user_id: i64,
    pub type_id: i64,
    pub quantity_purchased: i64,
    /// Snapshot of the listing price at match time. Never updated afterwards.
    pub price_per_unit: Isk,
    pub total_price: Isk,
    pub status: PurchaseStatus,
    pub is_auto_fulfilled: bool,
    pub contract_key: Option<String>,
    pub eve_contract_id: Option<i64>,
    pub purchased_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPurchase {
    pub for_sale_item_id: i64,
    pub buy_order_id: Option<i64>,
    pub buyer_user_id: i64,
    pub seller_user_id: i64,
    pub type_id: i64,
    pub quantity_purchased: i64,
    pub price_per_unit: Isk,
    pub is_auto_fulfilled: bool,
    pub contract_key: Option<ContractKey>,
}

impl NewPurchase {
    /// A purchase generated by matching `order` against `item`. The price is copied from the listing.
    pub fn auto_fulfill(order: &BuyOrder, item: &ForSaleItem, quantity: i64, key: ContractKey) -> Self {
        Self {
            for_sale_item_id: item.id,
            buy_order_id: Some(order.id),
            buyer_user_id: order.buyer_user_id,
            seller_user_id: item.user_id,
            type_id: item.type_id,
            quantity_purchased: quantity,
            price_per_unit: item.price_per_unit,
            is_auto_fulfilled: true,
            contract_key: Some(key),
        }
    }

    pub fn total_price(&self) -> Isk {
        self.price_per_unit * self.quantity_purchased
    }
}

//--------------------------------------     MarketPrice     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct MarketPrice {
    pub type_id: i64,
    pub region_id: i64,
    pub buy_price: Option<Isk>,
    pub sell_price: Option<Isk>,
    pub updated_at: DateTime<Utc>,
}

impl MarketPrice {
    pub fn new(type_id: i64, region_id: i64, buy_price: Option<f64>, sell_price: Option<f64>) -> Self {
        Self {
            type_id,
            region_id,
            buy_price: buy_price.map(Isk::from),
            sell_price: sell_price.map(Isk::from),
            updated_at: Utc::now(),
        }
    }
}

//--------------------------------------  ContactPermission  ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ContactPermission {
    pub granting_user_id: i64,
    pub receiving_user_id: i64,
    pub service_type: ServiceType,
    pub can_access: bool,
}

//--------------------------------------   Upstream facts    ---------------------------------------------------------
/// One item type and its total quantity inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ContainerItem {
    pub type_id: i64,
    pub quantity: i64,
}

/// The gap between what a buyer wants to have on hand and what they currently hold.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct StockpileDeficit {
    pub type_id: i64,
    pub desired_quantity: i64,
    pub current_quantity: i64,
    pub deficit: i64,
    pub price_source: Option<PriceSource>,
    pub price_percentage: Option<f64>,
}

//--------------------------------------      Character      ---------------------------------------------------------
pub const CORPORATION_CONTRACTS_SCOPE: &str = "esi-contracts.read_corporation_contracts.v1";

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Character {
    pub character_id: i64,
    pub user_id: i64,
    pub name: String,
    pub corporation_id: i64,
    pub esi_token: String,
    pub esi_refresh_token: String,
    pub esi_token_expires_on: DateTime<Utc>,
    /// Space-separated list of granted ESI scopes
    pub esi_scopes: String,
}

impl Character {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.esi_scopes.split_whitespace().any(|s| s == scope)
    }

    pub fn can_read_corporation_contracts(&self) -> bool {
        self.has_scope(CORPORATION_CONTRACTS_SCOPE)
    }

    /// Tokens are refreshed a minute early so they do not expire mid-request.
    pub fn token_expired(&self, now: DateTime<Utc>) -> bool {
        self.esi_token_expires_on <= now + chrono::Duration::minutes(1)
    }

    pub fn credential(&self) -> AccessCredential {
        AccessCredential {
            access_token: Secret::new(self.esi_token.clone()),
            refresh_token: Secret::new(self.esi_refresh_token.clone()),
            expires_at: self.esi_token_expires_on,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AccessCredential {
    pub access_token: Secret<String>,
    pub refresh_token: Secret<String>,
    pub expires_at: DateTime<Utc>,
}

//--------------------------------------  ExternalContract   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractType {
    ItemExchange,
    Auction,
    Courier,
    Loan,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Outstanding,
    InProgress,
    FinishedIssuer,
    FinishedContractor,
    Finished,
    Cancelled,
    Rejected,
    Failed,
    Deleted,
    Reversed,
    #[serde(other)]
    Unknown,
}

/// An in-game contract as seen in a character's or corporation's contract history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalContract {
    pub contract_id: i64,
    pub title: String,
    pub contract_type: ContractType,
    pub status: ContractStatus,
}

impl ExternalContract {
    /// Only finished item exchanges can settle a purchase.
    pub fn is_settlement_candidate(&self) -> bool {
        self.contract_type == ContractType::ItemExchange && self.status == ContractStatus::Finished
    }
}

//--------------------------------------  Settlement review  ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementReview {
    pub contract_id: i64,
    pub buyer_user_id: i64,
    pub title: String,
    pub matched_keys: Vec<String>,
}

//--------------------------------------       Outbox        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct OutboxEntry {
    pub id: i64,
    pub purchase_id: i64,
    pub created_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
}
