use std::time::Duration;

use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::models::{EventParticipant, PaymentStatus};
use crate::state::{RegistrationKey, RegistrationMap};

/// Fallback re-poll period, covering a push channel that failed to
/// establish or silently dropped.
pub const PAYMENT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Participant-row change published by the payment callback handler.
#[derive(Debug, Clone)]
pub struct ParticipantChange {
    pub event_id: i64,
    pub user_id: String,
}

/// Registration progress for one (event, user) pair, as shown to the
/// Mini App.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegistrationState {
    Submitting,
    PendingPayment { paylink: Option<String> },
    Paid,
    Failed { message: String },
}

impl RegistrationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RegistrationState::Paid | RegistrationState::Failed { .. })
    }
}

/// Marks the key as submitting unless a submission is already in
/// flight. Returns false when the caller must not issue another
/// webhook call.
pub fn begin_submission(registrations: &RegistrationMap, key: &RegistrationKey) -> bool {
    let mut map = registrations.lock().unwrap();
    if matches!(map.get(key), Some(RegistrationState::Submitting)) {
        return false;
    }
    map.insert(key.clone(), RegistrationState::Submitting);
    true
}

pub fn set_state(registrations: &RegistrationMap, key: &RegistrationKey, state: RegistrationState) {
    registrations.lock().unwrap().insert(key.clone(), state);
}

pub fn state_from_row(row: &EventParticipant) -> RegistrationState {
    match PaymentStatus::parse(&row.payment_status) {
        Some(PaymentStatus::Paid) => RegistrationState::Paid,
        // 'none' is a registered participant whose payment has not been
        // initiated yet; shown as pending without a link.
        _ => RegistrationState::PendingPayment { paylink: row.paylink.clone() },
    }
}

/// Last-read-wins refresh step. A missing row never invents a state;
/// only the registration handler downgrades that case to a failure.
pub(crate) fn next_state(
    current: Option<RegistrationState>,
    row: Option<&EventParticipant>,
) -> Option<RegistrationState> {
    match row {
        Some(row) => Some(state_from_row(row)),
        None => current,
    }
}

pub async fn fetch_participant(
    pool: &SqlitePool,
    event_id: i64,
    user_id: &str,
) -> Result<Option<EventParticipant>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT id, event_id, user_id, payment_status, paylink, created_at, updated_at
         FROM event_participants
         WHERE event_id = ? AND user_id = ?
         LIMIT 1",
    )
    .bind(event_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(EventParticipant::from_row))
}

/// The one resynchronize operation every trigger funnels into: the push
/// channel, the interval poll and the foreground re-check endpoint all
/// end up here, so simultaneous firing is safe.
pub async fn refresh_registration(
    pool: &SqlitePool,
    registrations: &RegistrationMap,
    event_id: i64,
    user_id: &str,
) -> Result<Option<RegistrationState>, sqlx::Error> {
    let row = fetch_participant(pool, event_id, user_id).await?;
    let key = (event_id, user_id.to_string());

    let mut map = registrations.lock().unwrap();
    let next = next_state(map.get(&key).cloned(), row.as_ref());
    if let Some(state) = next.clone() {
        map.insert(key, state);
    }
    Ok(next)
}

async fn resync_tracked(pool: &SqlitePool, registrations: &RegistrationMap) {
    let keys: Vec<RegistrationKey> = {
        let map = registrations.lock().unwrap();
        map.iter()
            .filter(|(_, state)| !state.is_terminal())
            .map(|(key, _)| key.clone())
            .collect()
    };

    for (event_id, user_id) in keys {
        if let Err(e) = refresh_registration(pool, registrations, event_id, &user_id).await {
            log::warn!("payment re-poll failed for event {}: {}", event_id, e);
        }
    }
}

/// Background convergence loop for payment statuses updated out of band
/// by the payment workflow. Pushed changes are filtered to tracked
/// keys; the interval re-polls every tracked non-terminal key.
pub fn spawn_payment_sync(
    pool: SqlitePool,
    registrations: RegistrationMap,
    mut changes: broadcast::Receiver<ParticipantChange>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PAYMENT_POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    resync_tracked(&pool, &registrations).await;
                }
                change = changes.recv() => match change {
                    Ok(change) => {
                        let key = (change.event_id, change.user_id.clone());
                        let tracked = registrations.lock().unwrap().contains_key(&key);
                        if tracked {
                            if let Err(e) = refresh_registration(&pool, &registrations, change.event_id, &change.user_id).await {
                                log::warn!("push refresh failed for event {}: {}", change.event_id, e);
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        log::warn!("payment push channel lagged by {}, re-polling", missed);
                        resync_tracked(&pool, &registrations).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    })
}
