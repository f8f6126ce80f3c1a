use actix_web::{web, Error, HttpRequest, HttpResponse};
use serde_json::json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::i18n::{self, Locale};
use crate::models::{TelegramAuthRequest, User};
use crate::state::AppState;

/// Login endpoint of the Mini App: resolves a Telegram identity to a
/// club user, creating the row on first login.
///
/// TODO: verify the initData signature before trusting the payload; the
/// bot token and the Telegram HMAC scheme are needed for that.
pub async fn telegram_auth(
    req: HttpRequest,
    data: web::Json<TelegramAuthRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let locale = i18n::detect_locale(&req);
    let auth_req = data.into_inner();
    let pool = &state.pool;

    let telegram_id = auth_req.telegram_id.unwrap_or(0);
    let first_name = auth_req.first_name.unwrap_or_default();
    if telegram_id == 0 || first_name.is_empty() {
        let error_msg = match locale {
            Locale::Ru => "telegram_id и first_name обязательны",
            Locale::En => "telegram_id and first_name are required",
        };
        return Ok(HttpResponse::BadRequest().json(json!({ "error": error_msg })));
    }

    match resolve_user(
        pool,
        telegram_id,
        auth_req.username.as_deref(),
        &first_name,
        auth_req.last_name.as_deref(),
    )
    .await
    {
        Ok((user, false)) => Ok(HttpResponse::Ok().json(json!({ "user": user }))),
        Ok((user, true)) => Ok(HttpResponse::Created().json(json!({ "user": user }))),
        Err(e) => {
            log::error!("telegram auth failed for {}: {}", telegram_id, e);
            Ok(HttpResponse::InternalServerError().json(json!({
                "error": i18n::internal_error(locale),
                "details": e.to_string()
            })))
        }
    }
}

/// Lookup-or-create by Telegram id. Returns the user and whether the
/// row was created by this call. Repeated calls with the same id keep
/// resolving to the same user.
pub(crate) async fn resolve_user(
    pool: &SqlitePool,
    telegram_id: i64,
    username: Option<&str>,
    first_name: &str,
    last_name: Option<&str>,
) -> Result<(User, bool), sqlx::Error> {
    if let Some(user) = find_user_by_telegram_id(pool, telegram_id).await? {
        return Ok((user, false));
    }

    let id = Uuid::new_v4().to_string();
    let created_at = chrono::Utc::now().to_rfc3339();

    // Normalize empty strings to None
    let username = username.and_then(|s| if s.is_empty() { None } else { Some(s) });
    let last_name = last_name.and_then(|s| if s.is_empty() { None } else { Some(s) });

    sqlx::query(
        "INSERT INTO users (id, telegram_id, username, first_name, last_name, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(telegram_id)
    .bind(username)
    .bind(first_name)
    .bind(last_name)
    .bind(&created_at)
    .bind(&created_at)
    .execute(pool)
    .await?;

    let user = User {
        id,
        telegram_id,
        username: username.map(str::to_string),
        first_name: first_name.to_string(),
        last_name: last_name.map(str::to_string),
        created_at: created_at.clone(),
        updated_at: Some(created_at),
    };
    Ok((user, true))
}

pub(crate) async fn find_user_by_telegram_id(
    pool: &SqlitePool,
    telegram_id: i64,
) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT id, telegram_id, username, first_name, last_name, created_at, updated_at
         FROM users
         WHERE telegram_id = ?
         LIMIT 1",
    )
    .bind(telegram_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(User::from_row))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[sqlx::test]
    async fn repeated_login_resolves_to_the_same_user(pool: SqlitePool) {
        db::init_schema(&pool).await.unwrap();

        let (first, created) = resolve_user(&pool, 42, Some("anna"), "Anna", None)
            .await
            .unwrap();
        assert!(created);

        let (second, created) = resolve_user(&pool, 42, Some("anna"), "Anna", None)
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);

        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(1) FROM users WHERE telegram_id = 42")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[sqlx::test]
    async fn empty_optional_fields_are_stored_as_null(pool: SqlitePool) {
        db::init_schema(&pool).await.unwrap();

        let (user, _) = resolve_user(&pool, 7, Some(""), "Boris", Some(""))
            .await
            .unwrap();
        assert_eq!(user.username, None);
        assert_eq!(user.last_name, None);

        let stored = find_user_by_telegram_id(&pool, 7).await.unwrap().unwrap();
        assert_eq!(stored.username, None);
        assert_eq!(stored.last_name, None);
    }
}
