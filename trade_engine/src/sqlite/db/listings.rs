use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{BuyOrder, ForSaleItem, NewForSaleItem},
    traits::StoreError,
};

pub async fn fetch_listing(id: i64, conn: &mut SqliteConnection) -> Result<Option<ForSaleItem>, sqlx::Error> {
    let item = sqlx::query_as("SELECT * FROM for_sale_items WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(item)
}

pub async fn fetch_active_listings_for_container(
    auto_sell_container_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<ForSaleItem>, sqlx::Error> {
    let items = sqlx::query_as(
        "SELECT * FROM for_sale_items WHERE auto_sell_container_id = $1 AND is_active = 1 ORDER BY type_id",
    )
    .bind(auto_sell_container_id)
    .fetch_all(conn)
    .await?;
    Ok(items)
}

/// Inserts a new listing. This is not atomic on its own; wrap it in a transaction if it needs to be.
pub async fn insert_listing(item: NewForSaleItem, conn: &mut SqliteConnection) -> Result<ForSaleItem, StoreError> {
    let item = sqlx::query_as(
        r#"
            INSERT INTO for_sale_items (
                user_id,
                type_id,
                owner_type,
                owner_id,
                location_id,
                container_id,
                division_number,
                quantity_available,
                price_per_unit,
                auto_sell_container_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *;
        "#,
    )
    .bind(item.user_id)
    .bind(item.type_id)
    .bind(item.owner_type)
    .bind(item.owner_id)
    .bind(item.location_id)
    .bind(item.container_id)
    .bind(item.division_number)
    .bind(item.quantity_available)
    .bind(item.price_per_unit)
    .bind(item.auto_sell_container_id)
    .fetch_one(conn)
    .await?;
    Ok(item)
}

/// Overwrites price and quantity of the listing for `(auto_sell_container_id, type_id)`, reactivating it if a price
/// gap or an empty container deactivated it. Returns `None` if the container has never listed the type.
///
/// Reusing the row keeps its unsettled purchases attached to it.
pub async fn update_auto_sell_listing(
    item: &NewForSaleItem,
    conn: &mut SqliteConnection,
) -> Result<Option<ForSaleItem>, sqlx::Error> {
    let updated = sqlx::query_as(
        r#"
            UPDATE for_sale_items SET
                quantity_available = $1,
                price_per_unit = $2,
                location_id = $3,
                division_number = $4,
                is_active = 1,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = (
                SELECT id FROM for_sale_items
                WHERE auto_sell_container_id = $5 AND type_id = $6
                ORDER BY is_active DESC, id DESC
                LIMIT 1
            )
            RETURNING *;
        "#,
    )
    .bind(item.quantity_available)
    .bind(item.price_per_unit)
    .bind(item.location_id)
    .bind(item.division_number)
    .bind(item.auto_sell_container_id)
    .bind(item.type_id)
    .fetch_optional(conn)
    .await?;
    Ok(updated)
}

pub async fn upsert_auto_sell_listing(
    item: NewForSaleItem,
    conn: &mut SqliteConnection,
) -> Result<ForSaleItem, StoreError> {
    if item.auto_sell_container_id.is_none() {
        return Err(StoreError::InvalidRequest("Auto-sell listings must reference their container".into()));
    }
    match update_auto_sell_listing(&item, conn).await? {
        Some(listing) => {
            trace!("🗃️ Listing #{} for type {} refreshed", listing.id, listing.type_id);
            Ok(listing)
        },
        None => {
            let listing = insert_listing(item, conn).await?;
            debug!("🗃️ New listing #{} for type {} created", listing.id, listing.type_id);
            Ok(listing)
        },
    }
}

pub async fn deactivate_listing(id: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE for_sale_items SET is_active = 0, updated_at = CURRENT_TIMESTAMP WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Compare-and-swap decrement of a listing's available quantity. Returns `false` if the listing is inactive or has
/// fewer than `quantity` units left, in which case nothing is changed.
pub async fn try_decrement_quantity(
    id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE for_sale_items SET
                quantity_available = quantity_available - $1,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 AND is_active = 1 AND quantity_available >= $1
        "#,
    )
    .bind(quantity)
    .bind(id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn fetch_matching_listings(
    order: &BuyOrder,
    conn: &mut SqliteConnection,
) -> Result<Vec<ForSaleItem>, sqlx::Error> {
    let items = sqlx::query_as(
        r#"
            SELECT * FROM for_sale_items
            WHERE type_id = $1
              AND is_active = 1
              AND quantity_available > 0
              AND price_per_unit >= $2
              AND price_per_unit <= $3
              AND user_id != $4
            ORDER BY price_per_unit ASC, created_at ASC, id ASC
        "#,
    )
    .bind(order.type_id)
    .bind(order.min_price_per_unit)
    .bind(order.max_price_per_unit)
    .bind(order.buyer_user_id)
    .fetch_all(conn)
    .await?;
    Ok(items)
}
