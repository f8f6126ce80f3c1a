use actix_web::{web, Error, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::i18n;
use crate::models::PaymentStatus;
use crate::services::sync::ParticipantChange;
use crate::state::AppState;

use super::auth::find_user_by_telegram_id;

#[derive(Debug, Deserialize)]
pub struct PaymentCallback {
    pub event_id: Option<i64>,
    pub user_id: Option<String>,
    pub telegram_id: Option<i64>,
    pub payment_status: Option<String>,
    pub paylink: Option<String>,
}

/// Write path of the external payment workflow: upserts the participant
/// row it reports on and publishes the change on the push channel so
/// waiting clients converge without waiting for the next poll.
pub async fn payment_callback(
    req: HttpRequest,
    data: web::Json<PaymentCallback>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let locale = i18n::detect_locale(&req);
    let callback = data.into_inner();
    let pool = &state.pool;

    let event_id = match callback.event_id {
        Some(event_id) => event_id,
        None => {
            return Ok(HttpResponse::BadRequest().json(json!({ "error": "event_id is required" })));
        }
    };

    let status = match callback.payment_status.as_deref().and_then(PaymentStatus::parse) {
        Some(status) => status,
        None => {
            return Ok(HttpResponse::BadRequest().json(json!({
                "error": "payment_status must be 'none', 'pending' or 'paid'"
            })));
        }
    };

    // The workflow may only know the Telegram identity.
    let user_id = match (callback.user_id, callback.telegram_id) {
        (Some(user_id), _) if !user_id.is_empty() => user_id,
        (_, Some(telegram_id)) => {
            match find_user_by_telegram_id(pool, telegram_id).await {
                Ok(Some(user)) => user.id,
                Ok(None) => {
                    return Ok(HttpResponse::NotFound().json(json!({
                        "error": i18n::user_not_found(locale)
                    })));
                }
                Err(e) => {
                    return Ok(HttpResponse::InternalServerError().json(json!({
                        "error": i18n::internal_error(locale),
                        "details": e.to_string()
                    })));
                }
            }
        }
        _ => {
            return Ok(HttpResponse::BadRequest().json(json!({
                "error": "user_id or telegram_id is required"
            })));
        }
    };

    let id = Uuid::new_v4().to_string();
    let updated_at = chrono::Utc::now().to_rfc3339();

    let result = sqlx::query(
        "INSERT INTO event_participants (id, event_id, user_id, payment_status, paylink) VALUES (?, ?, ?, ?, ?) \
         ON CONFLICT(event_id, user_id) DO UPDATE SET \
            payment_status = excluded.payment_status, \
            paylink = COALESCE(excluded.paylink, paylink), \
            updated_at = ?",
    )
    .bind(&id)
    .bind(event_id)
    .bind(&user_id)
    .bind(status.as_str())
    .bind(&callback.paylink)
    .bind(&updated_at)
    .execute(pool)
    .await;

    match result {
        Ok(_) => {
            // Nobody listening is fine; the interval poll still covers
            // the update.
            let _ = state
                .participant_changes
                .send(ParticipantChange { event_id, user_id });
            Ok(HttpResponse::Ok().json(json!({ "status": "ok" })))
        }
        Err(e) => {
            log::error!("participant upsert failed for event {}: {}", event_id, e);
            Ok(HttpResponse::InternalServerError().json(json!({
                "error": i18n::internal_error(locale),
                "details": e.to_string()
            })))
        }
    }
}

#[cfg(test)]
mod tests {
    use sqlx::SqlitePool;

    use crate::db;
    use crate::services::sync::fetch_participant;

    #[sqlx::test]
    async fn callback_upsert_is_idempotent_per_event_and_user(pool: SqlitePool) {
        db::init_schema(&pool).await.unwrap();

        sqlx::query("INSERT INTO users (id, telegram_id, first_name, created_at) VALUES ('u1', 5, 'Anna', '2026-08-01T10:00:00Z')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO events (id, event_type, title, starts_at) VALUES (1, 'training', 'Evening games', '2026-08-10T18:00:00Z')")
            .execute(&pool)
            .await
            .unwrap();

        let upsert = "INSERT INTO event_participants (id, event_id, user_id, payment_status, paylink) VALUES (?, 1, 'u1', ?, ?) \
                      ON CONFLICT(event_id, user_id) DO UPDATE SET \
                         payment_status = excluded.payment_status, \
                         paylink = COALESCE(excluded.paylink, paylink), \
                         updated_at = '2026-08-02T10:00:00Z'";

        sqlx::query(upsert)
            .bind("p1")
            .bind("pending")
            .bind(Some("https://pay.example.com/x"))
            .execute(&pool)
            .await
            .unwrap();

        // Second report for the same pair flips the status and keeps
        // the link even though the callback omitted it.
        sqlx::query(upsert)
            .bind("p2")
            .bind("paid")
            .bind(None::<String>)
            .execute(&pool)
            .await
            .unwrap();

        let row = fetch_participant(&pool, 1, "u1").await.unwrap().unwrap();
        assert_eq!(row.id, "p1");
        assert_eq!(row.payment_status, "paid");
        assert_eq!(row.paylink.as_deref(), Some("https://pay.example.com/x"));

        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(1) FROM event_participants")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
