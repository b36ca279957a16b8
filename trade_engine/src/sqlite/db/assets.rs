use std::collections::BTreeMap;

use sqlx::{FromRow, SqliteConnection};

use crate::db_types::{AutoBuyConfig, ContainerItem, OwnerType, PriceSource, StockpileDeficit};

pub async fn items_in_container(
    owner_type: OwnerType,
    owner_id: i64,
    container_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<ContainerItem>, sqlx::Error> {
    let items = sqlx::query_as(
        r#"
            SELECT type_id, SUM(quantity) AS quantity FROM assets
            WHERE owner_type = $1 AND owner_id = $2 AND container_id = $3
            GROUP BY type_id
            HAVING SUM(quantity) > 0
            ORDER BY type_id
        "#,
    )
    .bind(owner_type)
    .bind(owner_id)
    .bind(container_id)
    .fetch_all(conn)
    .await?;
    Ok(items)
}

#[derive(FromRow)]
struct MarkerRow {
    type_id: i64,
    desired_quantity: i64,
    current_quantity: i64,
    price_source: Option<PriceSource>,
    price_percentage: Option<f64>,
}

/// Compares the stockpile markers in the config's scope with current holdings.
///
/// A config without a container covers every marker at its location. Several markers for the same type are merged:
/// desired and current quantities are summed, and the first marker carrying an override supplies it.
pub async fn deficits_for_config(
    config: &AutoBuyConfig,
    conn: &mut SqliteConnection,
) -> Result<Vec<StockpileDeficit>, sqlx::Error> {
    let rows: Vec<MarkerRow> = sqlx::query_as(
        r#"
            SELECT
                m.type_id,
                m.desired_quantity,
                COALESCE((
                    SELECT SUM(a.quantity) FROM assets a
                    WHERE a.owner_type = m.owner_type
                      AND a.owner_id = m.owner_id
                      AND a.location_id = m.location_id
                      AND a.type_id = m.type_id
                      AND (m.container_id IS NULL OR a.container_id = m.container_id)
                      AND (m.division_number IS NULL OR a.division_number = m.division_number)
                ), 0) AS current_quantity,
                m.price_source,
                m.price_percentage
            FROM stockpile_markers m
            WHERE m.user_id = $1
              AND m.owner_type = $2
              AND m.owner_id = $3
              AND m.location_id = $4
              AND ($5 IS NULL OR m.container_id = $5)
              AND ($6 IS NULL OR m.division_number = $6)
            ORDER BY m.type_id, m.id
        "#,
    )
    .bind(config.user_id)
    .bind(config.owner_type)
    .bind(config.owner_id)
    .bind(config.location_id)
    .bind(config.container_id)
    .bind(config.division_number)
    .fetch_all(conn)
    .await?;
    let mut merged: BTreeMap<i64, StockpileDeficit> = BTreeMap::new();
    for row in rows {
        let entry = merged.entry(row.type_id).or_insert_with(|| StockpileDeficit {
            type_id: row.type_id,
            desired_quantity: 0,
            current_quantity: 0,
            deficit: 0,
            price_source: None,
            price_percentage: None,
        });
        entry.desired_quantity += row.desired_quantity;
        entry.current_quantity += row.current_quantity;
        entry.deficit = entry.desired_quantity - entry.current_quantity;
        entry.price_source = entry.price_source.or(row.price_source);
        entry.price_percentage = entry.price_percentage.or(row.price_percentage);
    }
    Ok(merged.into_values().collect())
}

/// A single asset row, as written by the asset importer.
#[derive(Debug, Clone)]
pub struct NewAsset {
    pub owner_type: OwnerType,
    pub owner_id: i64,
    pub location_id: i64,
    pub container_id: Option<i64>,
    pub division_number: Option<i64>,
    pub type_id: i64,
    pub quantity: i64,
}

pub async fn insert_asset(asset: &NewAsset, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO assets (owner_type, owner_id, location_id, container_id, division_number, type_id, quantity)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(asset.owner_type)
    .bind(asset.owner_id)
    .bind(asset.location_id)
    .bind(asset.container_id)
    .bind(asset.division_number)
    .bind(asset.type_id)
    .bind(asset.quantity)
    .execute(conn)
    .await?;
    Ok(())
}

/// Removes every asset row in a container.
pub async fn clear_container(
    owner_type: OwnerType,
    owner_id: i64,
    container_id: i64,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM assets WHERE owner_type = $1 AND owner_id = $2 AND container_id = $3")
        .bind(owner_type)
        .bind(owner_id)
        .bind(container_id)
        .execute(conn)
        .await?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct NewStockpileMarker {
    pub user_id: i64,
    pub owner_type: OwnerType,
    pub owner_id: i64,
    pub location_id: i64,
    pub container_id: Option<i64>,
    pub division_number: Option<i64>,
    pub type_id: i64,
    pub desired_quantity: i64,
    pub price_source: Option<PriceSource>,
    pub price_percentage: Option<f64>,
}

pub async fn insert_stockpile_marker(marker: &NewStockpileMarker, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO stockpile_markers (
                user_id,
                owner_type,
                owner_id,
                location_id,
                container_id,
                division_number,
                type_id,
                desired_quantity,
                price_source,
                price_percentage
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(marker.user_id)
    .bind(marker.owner_type)
    .bind(marker.owner_id)
    .bind(marker.location_id)
    .bind(marker.container_id)
    .bind(marker.division_number)
    .bind(marker.type_id)
    .bind(marker.desired_quantity)
    .bind(marker.price_source)
    .bind(marker.price_percentage)
    .execute(conn)
    .await?;
    Ok(())
}
