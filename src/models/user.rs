use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub id: String,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

/// Payload of the Mini App login call.
#[derive(Debug, Deserialize)]
pub struct TelegramAuthRequest {
    pub telegram_id: Option<i64>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl User {
    pub fn from_row(row: &SqliteRow) -> Self {
        User {
            id: row.get::<String, _>("id"),
            telegram_id: row.get::<i64, _>("telegram_id"),
            username: row.try_get::<Option<String>, _>("username").unwrap_or(None),
            first_name: row.get::<String, _>("first_name"),
            last_name: row.try_get::<Option<String>, _>("last_name").unwrap_or(None),
            created_at: row.get::<String, _>("created_at"),
            updated_at: row.try_get::<Option<String>, _>("updated_at").unwrap_or(None),
        }
    }

    /// Display name used to match the four player-name slots of a game.
    pub fn display_name(&self) -> Option<&str> {
        self.username.as_deref()
    }
}
