use sqlx::SqliteConnection;

use crate::{db_types::SettlementReview, traits::StoreError};

/// Records a contract for manual review. If the contract has already been flagged, nothing changes.
pub async fn insert_review(review: SettlementReview, conn: &mut SqliteConnection) -> Result<(), StoreError> {
    let keys = serde_json::to_string(&review.matched_keys).map_err(|e| StoreError::InvalidRequest(e.to_string()))?;
    sqlx::query(
        r#"
            INSERT INTO settlement_reviews (contract_id, buyer_user_id, title, matched_keys)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (contract_id) DO NOTHING
        "#,
    )
    .bind(review.contract_id)
    .bind(review.buyer_user_id)
    .bind(review.title)
    .bind(keys)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_reviews(conn: &mut SqliteConnection) -> Result<Vec<SettlementReview>, StoreError> {
    let rows: Vec<(i64, i64, String, String)> = sqlx::query_as(
        "SELECT contract_id, buyer_user_id, title, matched_keys FROM settlement_reviews ORDER BY flagged_at, contract_id",
    )
    .fetch_all(conn)
    .await?;
    rows.into_iter()
        .map(|(contract_id, buyer_user_id, title, keys)| {
            let matched_keys =
                serde_json::from_str(&keys).map_err(|e| StoreError::DatabaseError(format!("Invalid key list: {e}")))?;
            Ok(SettlementReview { contract_id, buyer_user_id, title, matched_keys })
        })
        .collect()
}
