use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// One finished 2v2 game. Rows are written by the club bot and are
/// immutable as far as this service is concerned.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GameRecord {
    pub game_id: i64,
    pub created_at: String,
    pub player_1_1: String,
    pub player_1_2: String,
    pub player_2_1: String,
    pub player_2_2: String,
    pub score_1: i64,
    pub score_2: i64,
}

impl GameRecord {
    pub fn from_row(row: &SqliteRow) -> Self {
        GameRecord {
            game_id: row.get::<i64, _>("game_id"),
            created_at: row.get::<String, _>("created_at"),
            player_1_1: row.get::<String, _>("player_1_1"),
            player_1_2: row.get::<String, _>("player_1_2"),
            player_2_1: row.get::<String, _>("player_2_1"),
            player_2_2: row.get::<String, _>("player_2_2"),
            score_1: row.get::<i64, _>("score_1"),
            score_2: row.get::<i64, _>("score_2"),
        }
    }

    pub fn involves(&self, name: &str) -> bool {
        self.player_1_1 == name
            || self.player_1_2 == name
            || self.player_2_1 == name
            || self.player_2_2 == name
    }

    /// The teammate of `name` and whether that team won, if `name`
    /// played in this game.
    pub fn partner_of(&self, name: &str) -> Option<(&str, bool)> {
        let (partner, on_first_team) = if self.player_1_1 == name {
            (self.player_1_2.as_str(), true)
        } else if self.player_1_2 == name {
            (self.player_1_1.as_str(), true)
        } else if self.player_2_1 == name {
            (self.player_2_2.as_str(), false)
        } else if self.player_2_2 == name {
            (self.player_2_1.as_str(), false)
        } else {
            return None;
        };

        let won = if on_first_team {
            self.score_1 > self.score_2
        } else {
            self.score_2 > self.score_1
        };
        Some((partner, won))
    }
}
