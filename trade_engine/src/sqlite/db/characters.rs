use sqlx::SqliteConnection;

use crate::db_types::{AccessCredential, Character};

pub async fn characters_for_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Character>, sqlx::Error> {
    let characters = sqlx::query_as(
        r#"
            SELECT character_id, user_id, name, corporation_id, esi_token, esi_refresh_token, esi_token_expires_on,
                   esi_scopes
            FROM characters WHERE user_id = $1 ORDER BY character_id
        "#,
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    Ok(characters)
}

pub async fn upsert_character(character: &Character, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO characters (
                character_id,
                user_id,
                name,
                corporation_id,
                esi_token,
                esi_refresh_token,
                esi_token_expires_on,
                esi_scopes
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (character_id) DO UPDATE SET
                user_id = excluded.user_id,
                name = excluded.name,
                corporation_id = excluded.corporation_id,
                esi_token = excluded.esi_token,
                esi_refresh_token = excluded.esi_refresh_token,
                esi_token_expires_on = excluded.esi_token_expires_on,
                esi_scopes = excluded.esi_scopes,
                updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(character.character_id)
    .bind(character.user_id)
    .bind(&character.name)
    .bind(character.corporation_id)
    .bind(&character.esi_token)
    .bind(&character.esi_refresh_token)
    .bind(character.esi_token_expires_on)
    .bind(&character.esi_scopes)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn update_credential(
    character_id: i64,
    credential: &AccessCredential,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            UPDATE characters SET
                esi_token = $1,
                esi_refresh_token = $2,
                esi_token_expires_on = $3,
                updated_at = CURRENT_TIMESTAMP
            WHERE character_id = $4
        "#,
    )
    .bind(credential.access_token.reveal())
    .bind(credential.refresh_token.reveal())
    .bind(credential.expires_at)
    .bind(character_id)
    .execute(conn)
    .await?;
    Ok(())
}
