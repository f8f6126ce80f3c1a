use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sqlx::SqlitePool;
use tokio::sync::broadcast;

use crate::services::sync::{ParticipantChange, RegistrationState};

/// Registration state is tracked per user per event, so actions on
/// different events never contend with each other.
pub type RegistrationKey = (i64, String);
pub type RegistrationMap = Arc<Mutex<HashMap<RegistrationKey, RegistrationState>>>;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub registrations: RegistrationMap,
    pub participant_changes: broadcast::Sender<ParticipantChange>,
}

impl AppState {
    pub fn new(pool: SqlitePool, participant_changes: broadcast::Sender<ParticipantChange>) -> Self {
        Self {
            pool,
            registrations: Arc::new(Mutex::new(HashMap::new())),
            participant_changes,
        }
    }
}
