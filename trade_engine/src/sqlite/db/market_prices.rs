use std::collections::HashMap;

use sqlx::{QueryBuilder, SqliteConnection};

use crate::db_types::MarketPrice;

pub async fn prices_for_types(
    type_ids: &[i64],
    region_id: i64,
    conn: &mut SqliteConnection,
) -> Result<HashMap<i64, MarketPrice>, sqlx::Error> {
    if type_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let mut builder = QueryBuilder::new("SELECT * FROM market_prices WHERE region_id = ");
    builder.push_bind(region_id);
    builder.push(" AND type_id IN (");
    let mut ids = builder.separated(", ");
    for id in type_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(")");
    let prices: Vec<MarketPrice> = builder.build_query_as().fetch_all(conn).await?;
    Ok(prices.into_iter().map(|p| (p.type_id, p)).collect())
}

pub async fn set_market_price(price: &MarketPrice, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO market_prices (type_id, region_id, buy_price, sell_price, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (type_id, region_id) DO UPDATE SET
                buy_price = excluded.buy_price,
                sell_price = excluded.sell_price,
                updated_at = excluded.updated_at
        "#,
    )
    .bind(price.type_id)
    .bind(price.region_id)
    .bind(price.buy_price)
    .bind(price.sell_price)
    .bind(price.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}
