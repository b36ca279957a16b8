use sqlx::SqliteConnection;

use crate::db_types::{
    AutoBuyConfig,
    AutoSellContainer,
    AutoSellOverride,
    NewAutoBuyConfig,
    NewAutoSellContainer,
    OwnerType,
};

pub async fn insert_auto_sell_container(
    container: NewAutoSellContainer,
    conn: &mut SqliteConnection,
) -> Result<AutoSellContainer, sqlx::Error> {
    let container = sqlx::query_as(
        r#"
            INSERT INTO auto_sell_containers (
                user_id,
                owner_type,
                owner_id,
                location_id,
                container_id,
                division_number,
                price_source,
                price_percentage
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(container.user_id)
    .bind(container.owner_type)
    .bind(container.owner_id)
    .bind(container.location_id)
    .bind(container.container_id)
    .bind(container.division_number)
    .bind(container.price_source)
    .bind(container.price_percentage)
    .fetch_one(conn)
    .await?;
    Ok(container)
}

/// Active auto-sell containers, optionally restricted to a single user.
pub async fn fetch_active_auto_sell_containers(
    user_id: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<Vec<AutoSellContainer>, sqlx::Error> {
    let containers = sqlx::query_as(
        "SELECT * FROM auto_sell_containers WHERE is_active = 1 AND ($1 IS NULL OR user_id = $1) ORDER BY id",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    Ok(containers)
}

pub async fn upsert_auto_sell_override(ov: AutoSellOverride, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO auto_sell_overrides (user_id, owner_type, owner_id, type_id, price_source, price_percentage)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, owner_type, owner_id, type_id) DO UPDATE SET
                price_source = excluded.price_source,
                price_percentage = excluded.price_percentage
        "#,
    )
    .bind(ov.user_id)
    .bind(ov.owner_type)
    .bind(ov.owner_id)
    .bind(ov.type_id)
    .bind(ov.price_source)
    .bind(ov.price_percentage)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_auto_sell_overrides(
    user_id: i64,
    owner_type: OwnerType,
    owner_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<AutoSellOverride>, sqlx::Error> {
    let overrides = sqlx::query_as(
        r#"
            SELECT user_id, owner_type, owner_id, type_id, price_source, price_percentage
            FROM auto_sell_overrides
            WHERE user_id = $1 AND owner_type = $2 AND owner_id = $3
        "#,
    )
    .bind(user_id)
    .bind(owner_type)
    .bind(owner_id)
    .fetch_all(conn)
    .await?;
    Ok(overrides)
}

pub async fn insert_auto_buy_config(
    config: NewAutoBuyConfig,
    conn: &mut SqliteConnection,
) -> Result<AutoBuyConfig, sqlx::Error> {
    let config = sqlx::query_as(
        r#"
            INSERT INTO auto_buy_configs (
                user_id,
                owner_type,
                owner_id,
                location_id,
                container_id,
                division_number,
                price_source,
                price_percentage
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(config.user_id)
    .bind(config.owner_type)
    .bind(config.owner_id)
    .bind(config.location_id)
    .bind(config.container_id)
    .bind(config.division_number)
    .bind(config.price_source)
    .bind(config.price_percentage)
    .fetch_one(conn)
    .await?;
    Ok(config)
}

pub async fn fetch_active_auto_buy_configs(
    user_id: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<Vec<AutoBuyConfig>, sqlx::Error> {
    let configs = sqlx::query_as(
        "SELECT * FROM auto_buy_configs WHERE is_active = 1 AND ($1 IS NULL OR user_id = $1) ORDER BY id",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    Ok(configs)
}
