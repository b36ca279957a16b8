use crate::{
    db_types::{NewPurchase, OutboxEntry, PurchaseTransaction, SettlementReview},
    helpers::ContractKey,
    traits::StoreError,
};

/// Storage for matched trades and their settlement state.
#[allow(async_fn_in_trait)]
pub trait PurchaseManagement {
    /// Executes a purchase atomically.
    ///
    /// In a single transaction:
    /// * the listing's available quantity is decremented by the purchased quantity. If the listing is inactive or
    ///   does not have enough left, [`StoreError::ListingUnavailable`] is returned.
    /// * if the purchase is tied to a buy order, the quantity already committed to the order is re-read and
    ///   [`StoreError::BuyOrderOverCommitted`] is returned if this purchase would exceed the desired quantity.
    /// * the purchase is inserted with status `pending`, along with an outbox entry announcing it.
    ///
    /// Any failure rolls the whole transaction back.
    async fn create_purchase(&self, purchase: NewPurchase) -> Result<PurchaseTransaction, StoreError>;

    /// The total quantity of the buy order's purchases that are not yet completed.
    async fn pending_quantity_for_buy_order(&self, buy_order_id: i64) -> Result<i64, StoreError>;

    /// The total quantity of not-yet-completed purchases from every listing the auto-sell container has held for
    /// `type_id`, including deactivated ones.
    async fn committed_quantity_for_auto_sell(&self, auto_sell_container_id: i64, type_id: i64)
        -> Result<i64, StoreError>;

    async fn fetch_purchase(&self, id: i64) -> Result<Option<PurchaseTransaction>, StoreError>;

    async fn fetch_purchases_for_buy_order(&self, buy_order_id: i64) -> Result<Vec<PurchaseTransaction>, StoreError>;

    /// Assigns `key` to the given pending purchases of `seller_user_id` and moves them to `contract_created`.
    /// All purchases are updated, or none are.
    async fn assign_contract_key(
        &self,
        seller_user_id: i64,
        purchase_ids: &[i64],
        key: &ContractKey,
    ) -> Result<Vec<PurchaseTransaction>, StoreError>;

    /// Every purchase in `contract_created` status that carries a contract key.
    async fn fetch_contract_created_with_keys(&self) -> Result<Vec<PurchaseTransaction>, StoreError>;

    /// Moves a `contract_created` purchase to `completed`, recording the external contract id.
    async fn complete_with_contract_id(
        &self,
        purchase_id: i64,
        contract_id: i64,
    ) -> Result<PurchaseTransaction, StoreError>;

    /// Records an ambiguous contract for manual review. Flagging the same contract twice is a no-op.
    async fn flag_for_review(&self, review: SettlementReview) -> Result<(), StoreError>;

    async fn fetch_settlement_reviews(&self) -> Result<Vec<SettlementReview>, StoreError>;
}

/// The durable purchase-notification outbox.
#[allow(async_fn_in_trait)]
pub trait NotificationOutbox {
    /// Outbox entries that have not been dispatched yet, oldest first.
    async fn fetch_undispatched(&self, limit: i64) -> Result<Vec<OutboxEntry>, StoreError>;

    async fn mark_dispatched(&self, entry_id: i64) -> Result<(), StoreError>;

    /// Marks every outstanding outbox entry for the purchase as dispatched.
    async fn mark_purchase_dispatched(&self, purchase_id: i64) -> Result<(), StoreError>;
}
