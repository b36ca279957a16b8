//! Writers for the read-only input tables (users, assets, prices, ...), which are normally filled by importers.
use chrono::{Duration, Utc};

use crate::{
    db::{
        assets::{self, NewAsset, NewStockpileMarker},
        names,
    },
    db_types::{
        AutoBuyConfig,
        AutoSellContainer,
        BuyOrder,
        Character,
        ForSaleItem,
        MarketPrice,
        NewAutoBuyConfig,
        NewAutoSellContainer,
        NewBuyOrder,
        NewForSaleItem,
        OwnerType,
        PriceSource,
        ServiceType,
    },
    traits::{BuyOrderManagement, CharacterManagement, ListingManagement, PermissionManagement, ReferencePrices},
    SqliteDatabase,
};

pub const JITA: i64 = 10000002;
pub const TRITANIUM: i64 = 34;
pub const PYERITE: i64 = 35;
pub const MEXALLON: i64 = 36;
pub const HOME_STATION: i64 = 60003760;

pub async fn user(db: &SqliteDatabase, id: i64, name: &str) {
    let mut conn = db.pool().acquire().await.expect("Error acquiring connection");
    names::insert_user(id, name, &mut conn).await.expect("Error inserting user");
}

pub async fn item_type(db: &SqliteDatabase, type_id: i64, name: &str) {
    let mut conn = db.pool().acquire().await.expect("Error acquiring connection");
    names::insert_item_type(type_id, name, &mut conn).await.expect("Error inserting item type");
}

pub async fn location(db: &SqliteDatabase, location_id: i64, name: &str) {
    let mut conn = db.pool().acquire().await.expect("Error acquiring connection");
    names::insert_location(location_id, name, &mut conn).await.expect("Error inserting location");
}

/// Grants `for_sale_browse` in both directions.
pub async fn trust(db: &SqliteDatabase, a: i64, b: i64) {
    db.set_permission(a, b, ServiceType::ForSaleBrowse, true).await.expect("Error setting permission");
    db.set_permission(b, a, ServiceType::ForSaleBrowse, true).await.expect("Error setting permission");
}

pub async fn price(db: &SqliteDatabase, type_id: i64, buy: Option<f64>, sell: Option<f64>) {
    db.set_market_price(&MarketPrice::new(type_id, JITA, buy, sell)).await.expect("Error setting price");
}

pub async fn asset_in_container(db: &SqliteDatabase, owner_id: i64, container_id: i64, type_id: i64, quantity: i64) {
    let asset = NewAsset {
        owner_type: OwnerType::Character,
        owner_id,
        location_id: HOME_STATION,
        container_id: Some(container_id),
        division_number: None,
        type_id,
        quantity,
    };
    let mut conn = db.pool().acquire().await.expect("Error acquiring connection");
    assets::insert_asset(&asset, &mut conn).await.expect("Error inserting asset");
}

pub async fn empty_container(db: &SqliteDatabase, owner_id: i64, container_id: i64) {
    let mut conn = db.pool().acquire().await.expect("Error acquiring connection");
    assets::clear_container(OwnerType::Character, owner_id, container_id, &mut conn)
        .await
        .expect("Error clearing container");
}

pub async fn stockpile_marker(db: &SqliteDatabase, user_id: i64, type_id: i64, desired_quantity: i64) {
    let marker = NewStockpileMarker {
        user_id,
        owner_type: OwnerType::Character,
        owner_id: user_id,
        location_id: HOME_STATION,
        container_id: None,
        division_number: None,
        type_id,
        desired_quantity,
        price_source: None,
        price_percentage: None,
    };
    stockpile_marker_with(db, marker).await;
}

pub async fn stockpile_marker_with(db: &SqliteDatabase, marker: NewStockpileMarker) {
    let mut conn = db.pool().acquire().await.expect("Error acquiring connection");
    assets::insert_stockpile_marker(&marker, &mut conn).await.expect("Error inserting stockpile marker");
}

/// A character-owned auto-sell container. The owner character id is the user id.
pub async fn auto_sell_container(
    db: &SqliteDatabase,
    user_id: i64,
    container_id: i64,
    source: PriceSource,
    percentage: f64,
) -> AutoSellContainer {
    let container = NewAutoSellContainer {
        user_id,
        owner_type: OwnerType::Character,
        owner_id: user_id,
        location_id: HOME_STATION,
        container_id,
        division_number: None,
        price_source: source,
        price_percentage: percentage,
    };
    db.insert_auto_sell_container(container).await.expect("Error inserting auto-sell container")
}

pub async fn auto_buy_config(db: &SqliteDatabase, user_id: i64, source: PriceSource, percentage: f64) -> AutoBuyConfig {
    let config = NewAutoBuyConfig {
        user_id,
        owner_type: OwnerType::Character,
        owner_id: user_id,
        location_id: HOME_STATION,
        container_id: None,
        division_number: None,
        price_source: source,
        price_percentage: percentage,
    };
    db.insert_auto_buy_config(config).await.expect("Error inserting auto-buy config")
}

/// A manual listing.
pub async fn listing(db: &SqliteDatabase, seller: i64, type_id: i64, quantity: i64, price: f64) -> ForSaleItem {
    let item = NewForSaleItem {
        user_id: seller,
        type_id,
        owner_type: OwnerType::Character,
        owner_id: seller,
        location_id: HOME_STATION,
        container_id: None,
        division_number: None,
        quantity_available: quantity,
        price_per_unit: price.into(),
        auto_sell_container_id: None,
    };
    db.insert_listing(item).await.expect("Error inserting listing")
}

/// A manual buy order.
pub async fn buy_order(db: &SqliteDatabase, buyer: i64, type_id: i64, quantity: i64, min: f64, max: f64) -> BuyOrder {
    let order = NewBuyOrder {
        buyer_user_id: buyer,
        type_id,
        location_id: HOME_STATION,
        quantity_desired: quantity,
        min_price_per_unit: min.into(),
        max_price_per_unit: max.into(),
        auto_buy_config_id: None,
    };
    db.insert_buy_order(order).await.expect("Error inserting buy order")
}

/// Moves a purchase to `contract_created` with an arbitrary key, as older tooling did with hand-typed keys.
pub async fn contract_created_with_key(db: &SqliteDatabase, purchase_id: i64, key: &str) {
    sqlx::query("UPDATE purchase_transactions SET status = 'contract_created', contract_key = $1 WHERE id = $2")
        .bind(key)
        .bind(purchase_id)
        .execute(db.pool())
        .await
        .expect("Error setting contract key");
}

pub fn character(character_id: i64, user_id: i64, corporation_id: i64, scopes: &str, expired: bool) -> Character {
    let offset = if expired { Duration::minutes(-10) } else { Duration::minutes(20) };
    Character {
        character_id,
        user_id,
        name: format!("Character {character_id}"),
        corporation_id,
        esi_token: format!("token-{character_id}"),
        esi_refresh_token: format!("refresh-{character_id}"),
        esi_token_expires_on: Utc::now() + offset,
        esi_scopes: scopes.to_string(),
    }
}

pub async fn linked_character(db: &SqliteDatabase, character: &Character) {
    db.upsert_character(character).await.expect("Error inserting character");
}
