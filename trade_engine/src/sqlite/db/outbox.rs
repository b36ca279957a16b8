use sqlx::SqliteConnection;

use crate::db_types::OutboxEntry;

pub async fn insert_outbox_entry(purchase_id: i64, conn: &mut SqliteConnection) -> Result<OutboxEntry, sqlx::Error> {
    let entry = sqlx::query_as("INSERT INTO purchase_outbox (purchase_id) VALUES ($1) RETURNING *")
        .bind(purchase_id)
        .fetch_one(conn)
        .await?;
    Ok(entry)
}

pub async fn fetch_undispatched(limit: i64, conn: &mut SqliteConnection) -> Result<Vec<OutboxEntry>, sqlx::Error> {
    let entries = sqlx::query_as("SELECT * FROM purchase_outbox WHERE dispatched_at IS NULL ORDER BY id LIMIT $1")
        .bind(limit)
        .fetch_all(conn)
        .await?;
    Ok(entries)
}

/// Marks every undispatched outbox entry for the purchase as dispatched.
pub async fn mark_purchase_dispatched(purchase_id: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE purchase_outbox SET dispatched_at = CURRENT_TIMESTAMP WHERE purchase_id = $1 AND dispatched_at IS NULL",
    )
    .bind(purchase_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn mark_dispatched(entry_id: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE purchase_outbox SET dispatched_at = CURRENT_TIMESTAMP WHERE id = $1")
        .bind(entry_id)
        .execute(conn)
        .await?;
    Ok(())
}
