use serde::{Deserialize, Serialize};

use crate::db_types::PurchaseTransaction;

/// A purchase was matched and committed. Display names are looked up on a best-effort basis and may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseCreatedEvent {
    pub purchase: PurchaseTransaction,
    pub seller_name: Option<String>,
    pub buyer_name: Option<String>,
    pub type_name: Option<String>,
    pub location_name: Option<String>,
}

impl PurchaseCreatedEvent {
    pub fn new(purchase: PurchaseTransaction) -> Self {
        Self { purchase, seller_name: None, buyer_name: None, type_name: None, location_name: None }
    }
}

/// A finished in-game contract settled the purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseCompletedEvent {
    pub purchase: PurchaseTransaction,
    pub contract_id: i64,
}

impl PurchaseCompletedEvent {
    pub fn new(purchase: PurchaseTransaction, contract_id: i64) -> Self {
        Self { purchase, contract_id }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventType {
    PurchaseCreated(PurchaseCreatedEvent),
    PurchaseCompleted(PurchaseCompletedEvent),
}
