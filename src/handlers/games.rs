use std::collections::HashMap;

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use sqlx::{Row, SqlitePool};

use crate::models::{Event, GameRecord};
use crate::state::AppState;

use super::events::fetch_finished;

/// One calendar day of game history, optionally tied to the finished
/// event that took place that day.
#[derive(Debug, Serialize)]
pub struct GamesDay {
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<Event>,
    pub games: Vec<GameRecord>,
}

/// Full game history, newest first, grouped by day, plus the
/// username → user id map the board needs for profile links.
pub async fn games_history(state: web::Data<AppState>) -> HttpResponse {
    let pool = &state.pool;

    let rows = sqlx::query(
        "SELECT game_id, created_at, player_1_1, player_1_2, player_2_1, player_2_2, score_1, score_2
         FROM games
         ORDER BY datetime(created_at) DESC",
    )
    .fetch_all(pool)
    .await;

    let games: Vec<GameRecord> = match rows {
        Ok(rows) => rows.iter().map(GameRecord::from_row).collect(),
        Err(e) => {
            log::error!("games fetch failed: {}", e);
            return HttpResponse::InternalServerError().finish();
        }
    };

    // The id map and the event join degrade independently of the game
    // list itself.
    let players = match player_id_map(pool).await {
        Ok(map) => map,
        Err(e) => {
            log::warn!("player id map fetch failed: {}", e);
            HashMap::new()
        }
    };

    let finished = match fetch_finished(pool, &Utc::now().to_rfc3339()).await {
        Ok(events) => events,
        Err(e) => {
            log::warn!("finished events fetch failed: {}", e);
            Vec::new()
        }
    };

    let mut groups = group_by_day(games);
    attach_day_events(&mut groups, &finished);

    HttpResponse::Ok().json(json!({
        "groups": groups,
        "players": players,
    }))
}

/// Calendar-day key of an RFC 3339 timestamp (UTC). Unparsable values
/// group under the raw string, mirroring how the board renders them.
pub(crate) fn date_key(timestamp: &str) -> String {
    match DateTime::parse_from_rfc3339(timestamp) {
        Ok(dt) => dt.with_timezone(&Utc).date_naive().to_string(),
        Err(_) => timestamp.to_string(),
    }
}

/// Groups games by day, preserving the incoming (newest-first) order of
/// both the groups and the games inside each group.
pub fn group_by_day(games: Vec<GameRecord>) -> Vec<GamesDay> {
    let mut groups: Vec<GamesDay> = Vec::new();

    for game in games {
        let date = date_key(&game.created_at);
        match groups.iter_mut().find(|group| group.date == date) {
            Some(group) => group.games.push(game),
            None => groups.push(GamesDay { date, event: None, games: vec![game] }),
        }
    }

    groups
}

/// Associates each day group with the finished event sharing that
/// calendar day. First match wins; no uniqueness is guaranteed.
pub fn attach_day_events(groups: &mut [GamesDay], finished: &[Event]) {
    for group in groups.iter_mut() {
        group.event = finished
            .iter()
            .find(|event| date_key(&event.starts_at) == group.date)
            .cloned();
    }
}

async fn player_id_map(pool: &SqlitePool) -> Result<HashMap<String, String>, sqlx::Error> {
    let rows = sqlx::query("SELECT user_id, username FROM player_rankings")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| (row.get::<String, _>("username"), row.get::<String, _>("user_id")))
        .collect())
}
