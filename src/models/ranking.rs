use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Precomputed player leaderboard row. Recalculated by the club backend
/// out of band; read-only here.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlayerRanking {
    pub place: i64,
    pub user_id: String,
    pub username: String,
    pub games_played: i64,
    pub wins: i64,
    pub win_rate: i64,
    pub points: Option<f64>,
}

impl PlayerRanking {
    pub fn from_row(row: &SqliteRow) -> Self {
        PlayerRanking {
            place: row.get::<i64, _>("place"),
            user_id: row.get::<String, _>("user_id"),
            username: row.get::<String, _>("username"),
            games_played: row.get::<i64, _>("games_played"),
            wins: row.get::<i64, _>("wins"),
            win_rate: row.get::<i64, _>("win_rate"),
            points: row.try_get::<Option<f64>, _>("points").unwrap_or(None),
        }
    }
}

/// Precomputed team leaderboard row. The win rate is derived at read
/// time from games_played/wins.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TeamRanking {
    pub rank: i64,
    pub player_1_id: String,
    pub player_1_username: String,
    pub player_2_id: String,
    pub player_2_username: String,
    pub games_played: i64,
    pub wins: i64,
    pub win_rate: i64,
}
