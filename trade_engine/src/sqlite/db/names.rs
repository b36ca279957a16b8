use sqlx::SqliteConnection;

pub async fn user_name(user_id: i64, conn: &mut SqliteConnection) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT name FROM users WHERE id = $1").bind(user_id).fetch_optional(conn).await
}

pub async fn type_name(type_id: i64, conn: &mut SqliteConnection) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT name FROM item_types WHERE type_id = $1").bind(type_id).fetch_optional(conn).await
}

pub async fn location_name(location_id: i64, conn: &mut SqliteConnection) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT name FROM locations WHERE location_id = $1")
        .bind(location_id)
        .fetch_optional(conn)
        .await
}

/// Registers a user. User records are normally maintained by the account service.
pub async fn insert_user(id: i64, name: &str, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO users (id, name) VALUES ($1, $2) ON CONFLICT (id) DO UPDATE SET name = excluded.name")
        .bind(id)
        .bind(name)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn insert_item_type(type_id: i64, name: &str, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO item_types (type_id, name) VALUES ($1, $2) ON CONFLICT (type_id) DO UPDATE SET name = excluded.name",
    )
    .bind(type_id)
    .bind(name)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn insert_location(location_id: i64, name: &str, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO locations (location_id, name) VALUES ($1, $2) ON CONFLICT (location_id) DO UPDATE SET name = \
         excluded.name",
    )
    .bind(location_id)
    .bind(name)
    .execute(conn)
    .await?;
    Ok(())
}
