use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewPurchase, PurchaseStatus, PurchaseTransaction},
    helpers::ContractKey,
    traits::StoreError,
};

/// Inserts the purchase with status `pending`. Callers are responsible for the quantity bookkeeping on the listing,
/// so this should only ever be called inside a transaction that also decrements the listing.
pub async fn insert_purchase(
    purchase: NewPurchase,
    conn: &mut SqliteConnection,
) -> Result<PurchaseTransaction, sqlx::Error> {
    let total_price = purchase.total_price();
    let purchase: PurchaseTransaction = sqlx::query_as(
        r#"
            INSERT INTO purchase_transactions (
                for_sale_item_id,
                buy_order_id,
                buyer_user_id,
                seller_user_id,
                type_id,
                quantity_purchased,
                price_per_unit,
                total_price,
                status,
                is_auto_fulfilled,
                contract_key
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *;
        "#,
    )
    .bind(purchase.for_sale_item_id)
    .bind(purchase.buy_order_id)
    .bind(purchase.buyer_user_id)
    .bind(purchase.seller_user_id)
    .bind(purchase.type_id)
    .bind(purchase.quantity_purchased)
    .bind(purchase.price_per_unit)
    .bind(total_price)
    .bind(PurchaseStatus::Pending)
    .bind(purchase.is_auto_fulfilled)
    .bind(purchase.contract_key.map(String::from))
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Purchase #{} of {} units inserted", purchase.id, purchase.quantity_purchased);
    Ok(purchase)
}

pub async fn fetch_purchase(id: i64, conn: &mut SqliteConnection) -> Result<Option<PurchaseTransaction>, sqlx::Error> {
    let purchase =
        sqlx::query_as("SELECT * FROM purchase_transactions WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(purchase)
}

pub async fn fetch_purchases_for_buy_order(
    buy_order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<PurchaseTransaction>, sqlx::Error> {
    let purchases = sqlx::query_as("SELECT * FROM purchase_transactions WHERE buy_order_id = $1 ORDER BY id")
        .bind(buy_order_id)
        .fetch_all(conn)
        .await?;
    Ok(purchases)
}

/// Sum of `quantity_purchased` over the buy order's purchases that are not completed.
pub async fn pending_quantity_for_buy_order(buy_order_id: i64, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let qty = sqlx::query_scalar(
        r#"
            SELECT COALESCE(SUM(quantity_purchased), 0) FROM purchase_transactions
            WHERE buy_order_id = $1 AND status != 'completed'
        "#,
    )
    .bind(buy_order_id)
    .fetch_one(conn)
    .await?;
    Ok(qty)
}

/// Sum of `quantity_purchased` over the unsettled purchases of every listing a container has held for the type,
/// active or not.
pub async fn committed_quantity_for_auto_sell(
    auto_sell_container_id: i64,
    type_id: i64,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let qty = sqlx::query_scalar(
        r#"
            SELECT COALESCE(SUM(p.quantity_purchased), 0)
            FROM purchase_transactions p JOIN for_sale_items i ON p.for_sale_item_id = i.id
            WHERE i.auto_sell_container_id = $1 AND i.type_id = $2 AND p.status != 'completed'
        "#,
    )
    .bind(auto_sell_container_id)
    .bind(type_id)
    .fetch_one(conn)
    .await?;
    Ok(qty)
}

pub async fn fetch_contract_created_with_keys(
    conn: &mut SqliteConnection,
) -> Result<Vec<PurchaseTransaction>, sqlx::Error> {
    let purchases = sqlx::query_as(
        r#"
            SELECT * FROM purchase_transactions
            WHERE status = $1 AND contract_key IS NOT NULL AND contract_key != ''
            ORDER BY buyer_user_id, id
        "#,
    )
    .bind(PurchaseStatus::ContractCreated)
    .fetch_all(conn)
    .await?;
    Ok(purchases)
}

/// Sets the contract key on a pending purchase and moves it to `contract_created`.
pub async fn set_contract_key(
    purchase_id: i64,
    seller_user_id: i64,
    key: &ContractKey,
    conn: &mut SqliteConnection,
) -> Result<PurchaseTransaction, StoreError> {
    let purchase = fetch_purchase(purchase_id, conn).await?.ok_or(StoreError::PurchaseNotFound(purchase_id))?;
    if purchase.seller_user_id != seller_user_id {
        return Err(StoreError::NotTheSeller { purchase_id, seller_user_id });
    }
    if purchase.status != PurchaseStatus::Pending {
        return Err(StoreError::InvalidStatusTransition {
            id: purchase_id,
            from: purchase.status,
            to: PurchaseStatus::ContractCreated,
        });
    }
    let purchase = sqlx::query_as(
        r#"
            UPDATE purchase_transactions SET
                contract_key = $1,
                status = $2,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $3
            RETURNING *;
        "#,
    )
    .bind(key.as_str())
    .bind(PurchaseStatus::ContractCreated)
    .bind(purchase_id)
    .fetch_one(conn)
    .await?;
    Ok(purchase)
}

pub async fn complete_with_contract_id(
    purchase_id: i64,
    contract_id: i64,
    conn: &mut SqliteConnection,
) -> Result<PurchaseTransaction, StoreError> {
    let updated = sqlx::query_as(
        r#"
            UPDATE purchase_transactions SET
                status = $1,
                eve_contract_id = $2,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $3 AND status = $4
            RETURNING *;
        "#,
    )
    .bind(PurchaseStatus::Completed)
    .bind(contract_id)
    .bind(purchase_id)
    .bind(PurchaseStatus::ContractCreated)
    .fetch_optional(&mut *conn)
    .await?;
    match updated {
        Some(p) => Ok(p),
        None => match fetch_purchase(purchase_id, conn).await? {
            Some(p) => Err(StoreError::InvalidStatusTransition {
                id: purchase_id,
                from: p.status,
                to: PurchaseStatus::Completed,
            }),
            None => Err(StoreError::PurchaseNotFound(purchase_id)),
        },
    }
}
