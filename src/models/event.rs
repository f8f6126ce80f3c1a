use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

pub const STATUS_FINISHED: &str = "finished";

/// A scheduled club activity. Status transitions (scheduled → finished
/// or cancelled) happen server-side, never through this API.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub id: i64,
    pub club_id: Option<i64>,
    pub club_name: Option<String>,
    pub event_type: String,
    pub title: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub price: Option<f64>,
    pub duration_minutes: Option<i64>,
    pub starts_at: String,
    pub status: String,
    pub created_at: String,
}

impl Event {
    pub fn from_row(row: &SqliteRow) -> Self {
        Event {
            id: row.get::<i64, _>("id"),
            club_id: row.try_get::<Option<i64>, _>("club_id").unwrap_or(None),
            club_name: row.try_get::<Option<String>, _>("club_name").unwrap_or(None),
            event_type: row.get::<String, _>("event_type"),
            title: row.get::<String, _>("title"),
            description: row.try_get::<Option<String>, _>("description").unwrap_or(None),
            address: row.try_get::<Option<String>, _>("address").unwrap_or(None),
            price: row.try_get::<Option<f64>, _>("price").unwrap_or(None),
            duration_minutes: row.try_get::<Option<i64>, _>("duration_minutes").unwrap_or(None),
            starts_at: row.get::<String, _>("starts_at"),
            status: row.get::<String, _>("status"),
            created_at: row.get::<String, _>("created_at"),
        }
    }
}

/// Payment status of an event participant, updated asynchronously by the
/// external payment workflow.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    None,
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::None => "none",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
        }
    }

    pub fn parse(value: &str) -> Option<PaymentStatus> {
        match value {
            "none" => Some(PaymentStatus::None),
            "pending" => Some(PaymentStatus::Pending),
            "paid" => Some(PaymentStatus::Paid),
            _ => None,
        }
    }
}

/// Join row of a user and an event. The only table written on behalf of
/// a client, and only through the registration workflow.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EventParticipant {
    pub id: String,
    pub event_id: i64,
    pub user_id: String,
    pub payment_status: String,
    pub paylink: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl EventParticipant {
    pub fn from_row(row: &SqliteRow) -> Self {
        EventParticipant {
            id: row.get::<String, _>("id"),
            event_id: row.get::<i64, _>("event_id"),
            user_id: row.get::<String, _>("user_id"),
            payment_status: row.get::<String, _>("payment_status"),
            paylink: row.try_get::<Option<String>, _>("paylink").unwrap_or(None),
            created_at: row.get::<String, _>("created_at"),
            updated_at: row.get::<String, _>("updated_at"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Club {
    pub id: i64,
    pub name: String,
}
