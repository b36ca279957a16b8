use thiserror::Error;

use crate::db_types::PurchaseStatus;

/// Errors raised by the storage backends.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("Listing {0} is inactive or does not have enough quantity available")]
    ListingUnavailable(i64),
    #[error("Buy order {order_id} cannot take {requested} more units. {pending} of {desired} are already committed")]
    BuyOrderOverCommitted { order_id: i64, requested: i64, pending: i64, desired: i64 },
    #[error("The requested buy order {0} does not exist")]
    BuyOrderNotFound(i64),
    #[error("The requested listing {0} does not exist")]
    ListingNotFound(i64),
    #[error("The requested purchase {0} does not exist")]
    PurchaseNotFound(i64),
    #[error("Purchase {id} cannot move from {from} to {to}")]
    InvalidStatusTransition { id: i64, from: PurchaseStatus, to: PurchaseStatus },
    #[error("Purchase {purchase_id} does not belong to seller {seller_user_id}")]
    NotTheSeller { purchase_id: i64, seller_user_id: i64 },
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}

/// Failures of the external collaborators (asset snapshots, stockpile calculations, the game API).
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("Could not fetch the contents of container {container_id}: {reason}")]
    ContainerContents { container_id: i64, reason: String },
    #[error("Could not calculate stockpile deficits for auto-buy config {config_id}: {reason}")]
    StockpileDeficits { config_id: i64, reason: String },
    #[error("Could not fetch contracts for {owner}: {reason}")]
    ContractHistory { owner: String, reason: String },
    #[error("Could not refresh the access credential for character {character_id}: {reason}")]
    CredentialRefresh { character_id: i64, reason: String },
}
