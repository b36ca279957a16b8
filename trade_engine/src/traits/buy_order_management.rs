use crate::{
    db_types::{AutoBuyConfig, BuyOrder, NewAutoBuyConfig, NewBuyOrder},
    traits::StoreError,
};

/// Storage for the demand side: auto-buy policies and the buy orders derived from them.
#[allow(async_fn_in_trait)]
pub trait BuyOrderManagement {
    async fn insert_auto_buy_config(&self, config: NewAutoBuyConfig) -> Result<AutoBuyConfig, StoreError>;

    async fn fetch_active_auto_buy_configs(&self) -> Result<Vec<AutoBuyConfig>, StoreError>;

    async fn fetch_auto_buy_configs_for_user(&self, user_id: i64) -> Result<Vec<AutoBuyConfig>, StoreError>;

    /// The currently active buy orders derived from the given auto-buy config.
    async fn fetch_active_orders_for_config(&self, config_id: i64) -> Result<Vec<BuyOrder>, StoreError>;

    /// Updates the active order for `(auto_buy_config_id, type_id)` in place, or inserts a new one.
    async fn upsert_auto_buy_order(&self, order: NewBuyOrder) -> Result<BuyOrder, StoreError>;

    /// Inserts a buy order that is not tied to any auto-buy config.
    async fn insert_buy_order(&self, order: NewBuyOrder) -> Result<BuyOrder, StoreError>;

    async fn fetch_buy_order(&self, id: i64) -> Result<Option<BuyOrder>, StoreError>;

    async fn deactivate_buy_order(&self, id: i64) -> Result<(), StoreError>;

    /// Active buy orders with a positive maximum price, oldest first.
    async fn fetch_matchable_buy_orders(&self) -> Result<Vec<BuyOrder>, StoreError>;

    async fn fetch_matchable_buy_orders_for_user(&self, buyer_user_id: i64) -> Result<Vec<BuyOrder>, StoreError>;
}
