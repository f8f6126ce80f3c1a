use actix_web::{web, Error, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;

use crate::i18n::{self, Locale};
use crate::models::event::STATUS_FINISHED;
use crate::models::Event;
use crate::services::sync::{self, RegistrationState};
use crate::services::webhook::{RegistrationWebhook, WebhookReply};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub user_id: Option<String>,
    pub telegram_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RegistrationQuery {
    pub user_id: String,
}

/// Announcements: everything starting strictly after now, regardless of
/// status, soonest first.
pub async fn upcoming_events(state: web::Data<AppState>) -> HttpResponse {
    match fetch_upcoming(&state.pool, &Utc::now().to_rfc3339()).await {
        Ok(events) => HttpResponse::Ok().json(events),
        Err(e) => {
            log::error!("upcoming events fetch failed: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

pub async fn finished_events(state: web::Data<AppState>) -> HttpResponse {
    match fetch_finished(&state.pool, &Utc::now().to_rfc3339()).await {
        Ok(events) => HttpResponse::Ok().json(events),
        Err(e) => {
            log::error!("finished events fetch failed: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

pub(crate) async fn fetch_upcoming(pool: &SqlitePool, now: &str) -> Result<Vec<Event>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT e.id, e.club_id, c.name AS club_name, e.event_type, e.title, e.description,
                e.address, e.price, e.duration_minutes, e.starts_at, e.status, e.created_at
         FROM events e LEFT JOIN clubs c ON c.id = e.club_id
         WHERE datetime(e.starts_at) > datetime(?)
         ORDER BY datetime(e.starts_at) ASC",
    )
    .bind(now)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(Event::from_row).collect())
}

pub(crate) async fn fetch_finished(pool: &SqlitePool, now: &str) -> Result<Vec<Event>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT e.id, e.club_id, c.name AS club_name, e.event_type, e.title, e.description,
                e.address, e.price, e.duration_minutes, e.starts_at, e.status, e.created_at
         FROM events e LEFT JOIN clubs c ON c.id = e.club_id
         WHERE e.status = ? AND datetime(e.starts_at) < datetime(?)
         ORDER BY datetime(e.starts_at) DESC",
    )
    .bind(STATUS_FINISHED)
    .bind(now)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(Event::from_row).collect())
}

/// One user action: submit a registration to the external workflow.
/// While a submission is in flight for this (event, user) pair, repeat
/// triggers are swallowed without a second outgoing call.
pub async fn register_for_event(
    req: HttpRequest,
    path: web::Path<i64>,
    data: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let locale = i18n::detect_locale(&req);
    let event_id = path.into_inner();
    let body = data.into_inner();
    let pool = &state.pool;

    let (user_id, telegram_id) = match (body.user_id, body.telegram_id) {
        (Some(user_id), Some(telegram_id)) if !user_id.is_empty() => (user_id, telegram_id),
        _ => {
            let error_msg = match locale {
                Locale::Ru => "user_id и telegram_id обязательны",
                Locale::En => "user_id and telegram_id are required",
            };
            return Ok(HttpResponse::BadRequest().json(json!({ "error": error_msg })));
        }
    };

    let event_exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(1) FROM events WHERE id = ?")
        .bind(event_id)
        .fetch_one(pool)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    if event_exists == 0 {
        let error_msg = match locale {
            Locale::Ru => "Событие не найдено",
            Locale::En => "Event not found",
        };
        return Ok(HttpResponse::NotFound().json(json!({ "error": error_msg })));
    }

    let key = (event_id, user_id.clone());
    if !sync::begin_submission(&state.registrations, &key) {
        return Ok(HttpResponse::Ok().json(RegistrationState::Submitting));
    }

    let webhook = match RegistrationWebhook::new() {
        Ok(webhook) => webhook,
        Err(e) => {
            log::error!("registration webhook is not configured: {}", e);
            let failed = RegistrationState::Failed {
                message: i18n::internal_error(locale).to_string(),
            };
            sync::set_state(&state.registrations, &key, failed.clone());
            return Ok(HttpResponse::InternalServerError().json(failed));
        }
    };

    match webhook.register(event_id, &user_id, telegram_id).await {
        Ok(WebhookReply::Paylink(paylink)) => {
            let pending = RegistrationState::PendingPayment { paylink: Some(paylink) };
            sync::set_state(&state.registrations, &key, pending.clone());
            Ok(HttpResponse::Ok().json(pending))
        }
        Ok(WebhookReply::Accepted) => {
            // The immediate reply does not reliably reflect final state;
            // the participant row decides.
            match sync::fetch_participant(pool, event_id, &user_id).await {
                Ok(Some(row)) => {
                    let current = sync::state_from_row(&row);
                    sync::set_state(&state.registrations, &key, current.clone());
                    Ok(HttpResponse::Ok().json(current))
                }
                Ok(None) => {
                    let failed = RegistrationState::Failed {
                        message: i18n::registration_failed(locale).to_string(),
                    };
                    sync::set_state(&state.registrations, &key, failed.clone());
                    Ok(HttpResponse::BadGateway().json(failed))
                }
                Err(e) => {
                    log::error!("participant re-query failed for event {}: {}", event_id, e);
                    let failed = RegistrationState::Failed {
                        message: i18n::internal_error(locale).to_string(),
                    };
                    sync::set_state(&state.registrations, &key, failed.clone());
                    Ok(HttpResponse::InternalServerError().json(failed))
                }
            }
        }
        Ok(WebhookReply::Ack) => {
            // A bare acknowledgement carries no signal that the
            // registration completed; treated as a retriable failure.
            let failed = RegistrationState::Failed {
                message: i18n::registration_failed(locale).to_string(),
            };
            sync::set_state(&state.registrations, &key, failed.clone());
            Ok(HttpResponse::BadGateway().json(failed))
        }
        Err(e) => {
            log::error!("registration webhook call failed for event {}: {}", event_id, e);
            let failed = RegistrationState::Failed {
                message: i18n::registration_failed(locale).to_string(),
            };
            sync::set_state(&state.registrations, &key, failed.clone());
            Ok(HttpResponse::BadGateway().json(failed))
        }
    }
}

/// Resynchronize-and-read of the registration state. Clients hit this
/// on load and whenever they regain foreground visibility; it shares
/// the refresh path with the push and poll triggers.
pub async fn registration_status(
    req: HttpRequest,
    path: web::Path<i64>,
    query: web::Query<RegistrationQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let locale = i18n::detect_locale(&req);
    let event_id = path.into_inner();
    let user_id = query.into_inner().user_id;

    match sync::refresh_registration(&state.pool, &state.registrations, event_id, &user_id).await {
        Ok(Some(current)) => Ok(HttpResponse::Ok().json(current)),
        Ok(None) => Ok(HttpResponse::Ok().json(json!({ "status": "unregistered" }))),
        Err(e) => {
            log::error!("registration status fetch failed for event {}: {}", event_id, e);
            Ok(HttpResponse::InternalServerError().json(json!({
                "error": i18n::internal_error(locale),
                "details": e.to_string()
            })))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn insert_event(pool: &SqlitePool, id: i64, starts_at: &str, status: &str) {
        sqlx::query("INSERT INTO events (id, event_type, title, starts_at, status) VALUES (?, 'training', 'Evening games', ?, ?)")
            .bind(id)
            .bind(starts_at)
            .bind(status)
            .execute(pool)
            .await
            .unwrap();
    }

    #[sqlx::test]
    async fn upcoming_excludes_events_at_or_before_now(pool: SqlitePool) {
        db::init_schema(&pool).await.unwrap();
        let now = "2026-08-06T12:00:00Z";

        insert_event(&pool, 1, "2026-08-06T11:00:00Z", "scheduled").await;
        insert_event(&pool, 2, "2026-08-06T12:00:00Z", "scheduled").await;
        insert_event(&pool, 3, "2026-08-07T12:00:00Z", "scheduled").await;
        // Cancelled but still in the future: announcements keep it.
        insert_event(&pool, 4, "2026-08-06T13:00:00Z", "cancelled").await;

        let upcoming = fetch_upcoming(&pool, now).await.unwrap();
        let ids: Vec<i64> = upcoming.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![4, 3]);
    }

    #[sqlx::test]
    async fn finished_view_is_status_and_time_bounded(pool: SqlitePool) {
        db::init_schema(&pool).await.unwrap();
        let now = "2026-08-06T12:00:00Z";

        insert_event(&pool, 1, "2026-08-01T18:00:00Z", "finished").await;
        insert_event(&pool, 2, "2026-08-04T18:00:00Z", "finished").await;
        // Past but never marked finished.
        insert_event(&pool, 3, "2026-08-02T18:00:00Z", "cancelled").await;
        // Marked finished but starting in the future.
        insert_event(&pool, 4, "2026-08-09T18:00:00Z", "finished").await;

        let finished = fetch_finished(&pool, now).await.unwrap();
        let ids: Vec<i64> = finished.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[sqlx::test]
    async fn club_names_are_joined_into_the_event(pool: SqlitePool) {
        db::init_schema(&pool).await.unwrap();

        sqlx::query("INSERT INTO events (id, club_id, event_type, title, starts_at) VALUES (1, 1, 'tournament', 'Cup', '2026-09-01T10:00:00Z')")
            .execute(&pool)
            .await
            .unwrap();

        let upcoming = fetch_upcoming(&pool, "2026-08-06T12:00:00Z").await.unwrap();
        assert_eq!(upcoming[0].club_name.as_deref(), Some("ClubTac"));
    }
}
