use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{BuyOrder, NewBuyOrder},
    traits::StoreError,
};

pub async fn fetch_buy_order(id: i64, conn: &mut SqliteConnection) -> Result<Option<BuyOrder>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM buy_orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_active_orders_for_config(
    auto_buy_config_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<BuyOrder>, sqlx::Error> {
    let orders =
        sqlx::query_as("SELECT * FROM buy_orders WHERE auto_buy_config_id = $1 AND is_active = 1 ORDER BY type_id")
            .bind(auto_buy_config_id)
            .fetch_all(conn)
            .await?;
    Ok(orders)
}

pub async fn insert_buy_order(order: NewBuyOrder, conn: &mut SqliteConnection) -> Result<BuyOrder, StoreError> {
    let order = sqlx::query_as(
        r#"
            INSERT INTO buy_orders (
                buyer_user_id,
                type_id,
                location_id,
                quantity_desired,
                min_price_per_unit,
                max_price_per_unit,
                auto_buy_config_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(order.buyer_user_id)
    .bind(order.type_id)
    .bind(order.location_id)
    .bind(order.quantity_desired)
    .bind(order.min_price_per_unit)
    .bind(order.max_price_per_unit)
    .bind(order.auto_buy_config_id)
    .fetch_one(conn)
    .await?;
    Ok(order)
}

/// Overwrites quantity and bounds of the order for `(auto_buy_config_id, type_id)`, reactivating it if it was
/// deactivated. Returns `None` if the config has never ordered the type.
///
/// Reusing the row means purchases committed before a deactivation still count against the order.
pub async fn update_auto_buy_order(
    order: &NewBuyOrder,
    conn: &mut SqliteConnection,
) -> Result<Option<BuyOrder>, sqlx::Error> {
    let updated = sqlx::query_as(
        r#"
            UPDATE buy_orders SET
                quantity_desired = $1,
                min_price_per_unit = $2,
                max_price_per_unit = $3,
                location_id = $4,
                is_active = 1,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = (
                SELECT id FROM buy_orders
                WHERE auto_buy_config_id = $5 AND type_id = $6
                ORDER BY is_active DESC, id DESC
                LIMIT 1
            )
            RETURNING *;
        "#,
    )
    .bind(order.quantity_desired)
    .bind(order.min_price_per_unit)
    .bind(order.max_price_per_unit)
    .bind(order.location_id)
    .bind(order.auto_buy_config_id)
    .bind(order.type_id)
    .fetch_optional(conn)
    .await?;
    Ok(updated)
}

pub async fn upsert_auto_buy_order(order: NewBuyOrder, conn: &mut SqliteConnection) -> Result<BuyOrder, StoreError> {
    if order.auto_buy_config_id.is_none() {
        return Err(StoreError::InvalidRequest("Auto-buy orders must reference their config".into()));
    }
    match update_auto_buy_order(&order, conn).await? {
        Some(order) => {
            trace!("🗃️ Buy order #{} for type {} refreshed", order.id, order.type_id);
            Ok(order)
        },
        None => {
            let order = insert_buy_order(order, conn).await?;
            debug!("🗃️ New buy order #{} for type {} created", order.id, order.type_id);
            Ok(order)
        },
    }
}

pub async fn deactivate_buy_order(id: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE buy_orders SET is_active = 0, updated_at = CURRENT_TIMESTAMP WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Active orders with a positive maximum price. Pass a user id to restrict the result to one buyer.
pub async fn fetch_matchable_buy_orders(
    buyer_user_id: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<Vec<BuyOrder>, sqlx::Error> {
    let orders = sqlx::query_as(
        r#"
            SELECT * FROM buy_orders
            WHERE is_active = 1 AND max_price_per_unit > 0 AND ($1 IS NULL OR buyer_user_id = $1)
            ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(buyer_user_id)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}
