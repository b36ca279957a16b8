//! `SqliteDatabase` is the concrete storage backend of the trade engine.
//!
//! It implements every store trait defined in [`crate::traits`], and also serves the asset-snapshot and
//! stockpile-deficit collaborators from the imported asset tables.
use std::{collections::HashMap, fmt::Debug};

use log::*;
use sqlx::SqlitePool;

use super::db::{
    assets,
    auto_configs,
    buy_orders,
    characters,
    db_url,
    listings,
    market_prices,
    names,
    new_pool,
    outbox,
    permissions,
    purchases,
    reviews,
};
use crate::{
    db_types::{
        AccessCredential,
        AutoBuyConfig,
        AutoSellContainer,
        AutoSellOverride,
        BuyOrder,
        Character,
        ContainerItem,
        ForSaleItem,
        MarketPrice,
        NewAutoBuyConfig,
        NewAutoSellContainer,
        NewBuyOrder,
        NewForSaleItem,
        NewPurchase,
        OutboxEntry,
        OwnerType,
        PurchaseTransaction,
        ServiceType,
        SettlementReview,
        StockpileDeficit,
    },
    helpers::ContractKey,
    traits::{
        AssetSnapshot,
        BuyOrderManagement,
        CharacterManagement,
        ListingManagement,
        NameLookup,
        NotificationOutbox,
        PermissionManagement,
        PurchaseManagement,
        ReferencePrices,
        StockpileDeficits,
        StoreError,
        UpstreamError,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using `TRD_DATABASE_URL` (or the default) as the connection string.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Applies the embedded migrations.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Migrations complete");
        Ok(())
    }
}

impl ListingManagement for SqliteDatabase {
    async fn insert_auto_sell_container(
        &self,
        container: NewAutoSellContainer,
    ) -> Result<AutoSellContainer, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let container = auto_configs::insert_auto_sell_container(container, &mut conn).await?;
        Ok(container)
    }

    async fn upsert_auto_sell_override(&self, ov: AutoSellOverride) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        auto_configs::upsert_auto_sell_override(ov, &mut conn).await?;
        Ok(())
    }

    async fn fetch_active_auto_sell_containers(&self) -> Result<Vec<AutoSellContainer>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let containers = auto_configs::fetch_active_auto_sell_containers(None, &mut conn).await?;
        Ok(containers)
    }

    async fn fetch_auto_sell_containers_for_user(&self, user_id: i64) -> Result<Vec<AutoSellContainer>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let containers = auto_configs::fetch_active_auto_sell_containers(Some(user_id), &mut conn).await?;
        Ok(containers)
    }

    async fn fetch_auto_sell_overrides(
        &self,
        container: &AutoSellContainer,
    ) -> Result<Vec<AutoSellOverride>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let overrides = auto_configs::fetch_auto_sell_overrides(
            container.user_id,
            container.owner_type,
            container.owner_id,
            &mut conn,
        )
        .await?;
        Ok(overrides)
    }

    async fn fetch_active_listings_for_container(&self, container_id: i64) -> Result<Vec<ForSaleItem>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let items = listings::fetch_active_listings_for_container(container_id, &mut conn).await?;
        Ok(items)
    }

    async fn upsert_auto_sell_listing(&self, item: NewForSaleItem) -> Result<ForSaleItem, StoreError> {
        let mut tx = self.pool.begin().await?;
        let item = listings::upsert_auto_sell_listing(item, &mut tx).await?;
        tx.commit().await?;
        Ok(item)
    }

    async fn insert_listing(&self, item: NewForSaleItem) -> Result<ForSaleItem, StoreError> {
        let mut conn = self.pool.acquire().await?;
        listings::insert_listing(item, &mut conn).await
    }

    async fn fetch_listing(&self, id: i64) -> Result<Option<ForSaleItem>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let item = listings::fetch_listing(id, &mut conn).await?;
        Ok(item)
    }

    async fn deactivate_listing(&self, id: i64) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        listings::deactivate_listing(id, &mut conn).await?;
        Ok(())
    }

    async fn fetch_matching_listings(&self, order: &BuyOrder) -> Result<Vec<ForSaleItem>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let items = listings::fetch_matching_listings(order, &mut conn).await?;
        Ok(items)
    }
}

impl BuyOrderManagement for SqliteDatabase {
    async fn insert_auto_buy_config(&self, config: NewAutoBuyConfig) -> Result<AutoBuyConfig, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let config = auto_configs::insert_auto_buy_config(config, &mut conn).await?;
        Ok(config)
    }

    async fn fetch_active_auto_buy_configs(&self) -> Result<Vec<AutoBuyConfig>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let configs = auto_configs::fetch_active_auto_buy_configs(None, &mut conn).await?;
        Ok(configs)
    }

    async fn fetch_auto_buy_configs_for_user(&self, user_id: i64) -> Result<Vec<AutoBuyConfig>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let configs = auto_configs::fetch_active_auto_buy_configs(Some(user_id), &mut conn).await?;
        Ok(configs)
    }

    async fn fetch_active_orders_for_config(&self, config_id: i64) -> Result<Vec<BuyOrder>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let orders = buy_orders::fetch_active_orders_for_config(config_id, &mut conn).await?;
        Ok(orders)
    }

    async fn upsert_auto_buy_order(&self, order: NewBuyOrder) -> Result<BuyOrder, StoreError> {
        let mut tx = self.pool.begin().await?;
        let order = buy_orders::upsert_auto_buy_order(order, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn insert_buy_order(&self, order: NewBuyOrder) -> Result<BuyOrder, StoreError> {
        let mut conn = self.pool.acquire().await?;
        buy_orders::insert_buy_order(order, &mut conn).await
    }

    async fn fetch_buy_order(&self, id: i64) -> Result<Option<BuyOrder>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = buy_orders::fetch_buy_order(id, &mut conn).await?;
        Ok(order)
    }

    async fn deactivate_buy_order(&self, id: i64) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        buy_orders::deactivate_buy_order(id, &mut conn).await?;
        Ok(())
    }

    async fn fetch_matchable_buy_orders(&self) -> Result<Vec<BuyOrder>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let orders = buy_orders::fetch_matchable_buy_orders(None, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_matchable_buy_orders_for_user(&self, buyer_user_id: i64) -> Result<Vec<BuyOrder>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let orders = buy_orders::fetch_matchable_buy_orders(Some(buyer_user_id), &mut conn).await?;
        Ok(orders)
    }
}

impl PurchaseManagement for SqliteDatabase {
    async fn create_purchase(&self, purchase: NewPurchase) -> Result<PurchaseTransaction, StoreError> {
        let listing_id = purchase.for_sale_item_id;
        let quantity = purchase.quantity_purchased;
        if quantity <= 0 {
            return Err(StoreError::InvalidRequest(format!("Cannot purchase {quantity} units")));
        }
        let mut tx = self.pool.begin().await?;
        // The decrement takes the write lock, so the committed quantity read below cannot change under us.
        if !listings::try_decrement_quantity(listing_id, quantity, &mut tx).await? {
            return Err(StoreError::ListingUnavailable(listing_id));
        }
        if let Some(order_id) = purchase.buy_order_id {
            let order =
                buy_orders::fetch_buy_order(order_id, &mut tx).await?.ok_or(StoreError::BuyOrderNotFound(order_id))?;
            let pending = purchases::pending_quantity_for_buy_order(order_id, &mut tx).await?;
            if pending + quantity > order.quantity_desired {
                return Err(StoreError::BuyOrderOverCommitted {
                    order_id,
                    requested: quantity,
                    pending,
                    desired: order.quantity_desired,
                });
            }
        }
        let purchase = purchases::insert_purchase(purchase, &mut tx).await?;
        outbox::insert_outbox_entry(purchase.id, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🗃️ Purchase #{} committed: {} units from listing #{listing_id} at {}",
            purchase.id, purchase.quantity_purchased, purchase.price_per_unit
        );
        Ok(purchase)
    }

    async fn pending_quantity_for_buy_order(&self, buy_order_id: i64) -> Result<i64, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let qty = purchases::pending_quantity_for_buy_order(buy_order_id, &mut conn).await?;
        Ok(qty)
    }

    async fn committed_quantity_for_auto_sell(
        &self,
        auto_sell_container_id: i64,
        type_id: i64,
    ) -> Result<i64, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let qty = purchases::committed_quantity_for_auto_sell(auto_sell_container_id, type_id, &mut conn).await?;
        Ok(qty)
    }

    async fn fetch_purchase(&self, id: i64) -> Result<Option<PurchaseTransaction>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let purchase = purchases::fetch_purchase(id, &mut conn).await?;
        Ok(purchase)
    }

    async fn fetch_purchases_for_buy_order(&self, buy_order_id: i64) -> Result<Vec<PurchaseTransaction>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let purchases = purchases::fetch_purchases_for_buy_order(buy_order_id, &mut conn).await?;
        Ok(purchases)
    }

    async fn assign_contract_key(
        &self,
        seller_user_id: i64,
        purchase_ids: &[i64],
        key: &ContractKey,
    ) -> Result<Vec<PurchaseTransaction>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut updated = Vec::with_capacity(purchase_ids.len());
        for id in purchase_ids {
            let purchase = purchases::set_contract_key(*id, seller_user_id, key, &mut tx).await?;
            updated.push(purchase);
        }
        tx.commit().await?;
        Ok(updated)
    }

    async fn fetch_contract_created_with_keys(&self) -> Result<Vec<PurchaseTransaction>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let purchases = purchases::fetch_contract_created_with_keys(&mut conn).await?;
        Ok(purchases)
    }

    async fn complete_with_contract_id(
        &self,
        purchase_id: i64,
        contract_id: i64,
    ) -> Result<PurchaseTransaction, StoreError> {
        let mut conn = self.pool.acquire().await?;
        purchases::complete_with_contract_id(purchase_id, contract_id, &mut conn).await
    }

    async fn flag_for_review(&self, review: SettlementReview) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        reviews::insert_review(review, &mut conn).await
    }

    async fn fetch_settlement_reviews(&self) -> Result<Vec<SettlementReview>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        reviews::fetch_reviews(&mut conn).await
    }
}

impl NotificationOutbox for SqliteDatabase {
    async fn fetch_undispatched(&self, limit: i64) -> Result<Vec<OutboxEntry>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let entries = outbox::fetch_undispatched(limit, &mut conn).await?;
        Ok(entries)
    }

    async fn mark_dispatched(&self, entry_id: i64) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        outbox::mark_dispatched(entry_id, &mut conn).await?;
        Ok(())
    }

    async fn mark_purchase_dispatched(&self, purchase_id: i64) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        outbox::mark_purchase_dispatched(purchase_id, &mut conn).await?;
        Ok(())
    }
}

impl PermissionManagement for SqliteDatabase {
    async fn check_permission(
        &self,
        granting_user_id: i64,
        receiving_user_id: i64,
        service: ServiceType,
    ) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let allowed = permissions::check_permission(granting_user_id, receiving_user_id, service, &mut conn).await?;
        Ok(allowed)
    }

    async fn set_permission(
        &self,
        granting_user_id: i64,
        receiving_user_id: i64,
        service: ServiceType,
        can_access: bool,
    ) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        permissions::set_permission(granting_user_id, receiving_user_id, service, can_access, &mut conn).await?;
        Ok(())
    }
}

impl ReferencePrices for SqliteDatabase {
    async fn prices_for_types(
        &self,
        type_ids: &[i64],
        region_id: i64,
    ) -> Result<HashMap<i64, MarketPrice>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let prices = market_prices::prices_for_types(type_ids, region_id, &mut conn).await?;
        Ok(prices)
    }

    async fn set_market_price(&self, price: &MarketPrice) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        market_prices::set_market_price(price, &mut conn).await?;
        Ok(())
    }
}

impl CharacterManagement for SqliteDatabase {
    async fn characters_for_user(&self, user_id: i64) -> Result<Vec<Character>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let characters = characters::characters_for_user(user_id, &mut conn).await?;
        Ok(characters)
    }

    async fn upsert_character(&self, character: &Character) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        characters::upsert_character(character, &mut conn).await?;
        Ok(())
    }

    async fn update_character_credential(
        &self,
        character_id: i64,
        credential: &AccessCredential,
    ) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        characters::update_credential(character_id, credential, &mut conn).await?;
        Ok(())
    }
}

impl NameLookup for SqliteDatabase {
    async fn user_name(&self, user_id: i64) -> Result<Option<String>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let name = names::user_name(user_id, &mut conn).await?;
        Ok(name)
    }

    async fn type_name(&self, type_id: i64) -> Result<Option<String>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let name = names::type_name(type_id, &mut conn).await?;
        Ok(name)
    }

    async fn location_name(&self, location_id: i64) -> Result<Option<String>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let name = names::location_name(location_id, &mut conn).await?;
        Ok(name)
    }
}

impl AssetSnapshot for SqliteDatabase {
    async fn items_in_container(
        &self,
        owner_type: OwnerType,
        owner_id: i64,
        container_id: i64,
    ) -> Result<Vec<ContainerItem>, UpstreamError> {
        let upstream = |e: sqlx::Error| UpstreamError::ContainerContents { container_id, reason: e.to_string() };
        let mut conn = self.pool.acquire().await.map_err(upstream)?;
        assets::items_in_container(owner_type, owner_id, container_id, &mut conn).await.map_err(upstream)
    }
}

impl StockpileDeficits for SqliteDatabase {
    async fn deficits_for_config(&self, config: &AutoBuyConfig) -> Result<Vec<StockpileDeficit>, UpstreamError> {
        let upstream = |e: sqlx::Error| UpstreamError::StockpileDeficits { config_id: config.id, reason: e.to_string() };
        let mut conn = self.pool.acquire().await.map_err(upstream)?;
        assets::deficits_for_config(config, &mut conn).await.map_err(upstream)
    }
}
