use sqlx::SqliteConnection;

use crate::db_types::ServiceType;

/// Returns `false` if no permission has been recorded.
pub async fn check_permission(
    granting_user_id: i64,
    receiving_user_id: i64,
    service: ServiceType,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let can_access: Option<bool> = sqlx::query_scalar(
        r#"
            SELECT can_access FROM contact_permissions
            WHERE granting_user_id = $1 AND receiving_user_id = $2 AND service_type = $3
        "#,
    )
    .bind(granting_user_id)
    .bind(receiving_user_id)
    .bind(service)
    .fetch_optional(conn)
    .await?;
    Ok(can_access.unwrap_or(false))
}

pub async fn set_permission(
    granting_user_id: i64,
    receiving_user_id: i64,
    service: ServiceType,
    can_access: bool,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO contact_permissions (granting_user_id, receiving_user_id, service_type, can_access)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (granting_user_id, receiving_user_id, service_type) DO UPDATE SET
                can_access = excluded.can_access,
                updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(granting_user_id)
    .bind(receiving_user_id)
    .bind(service)
    .bind(can_access)
    .execute(conn)
    .await?;
    Ok(())
}
