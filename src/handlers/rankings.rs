use actix_web::{web, HttpResponse};
use sqlx::Row;

use crate::models::{Club, PlayerRanking, TeamRanking};
use crate::state::AppState;

use super::stats::win_rate_pct;

/// Player leaderboard, precomputed out of band and served as-is.
pub async fn player_rankings(state: web::Data<AppState>) -> HttpResponse {
    let rows = sqlx::query(
        "SELECT place, user_id, username, games_played, wins, win_rate, points
         FROM player_rankings
         ORDER BY place",
    )
    .fetch_all(&state.pool)
    .await;

    match rows {
        Ok(rows) => {
            let players: Vec<PlayerRanking> = rows.iter().map(PlayerRanking::from_row).collect();
            HttpResponse::Ok().json(players)
        }
        Err(e) => {
            log::error!("player rankings fetch failed: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

pub async fn team_rankings(state: web::Data<AppState>) -> HttpResponse {
    let rows = sqlx::query(
        "SELECT rank, player_1_id, player_1_username, player_2_id, player_2_username, games_played, wins
         FROM team_rankings
         ORDER BY rank",
    )
    .fetch_all(&state.pool)
    .await;

    match rows {
        Ok(rows) => {
            let teams: Vec<TeamRanking> = rows
                .into_iter()
                .map(|row| {
                    let games_played = row.get::<i64, _>("games_played");
                    let wins = row.get::<i64, _>("wins");
                    TeamRanking {
                        rank: row.get::<i64, _>("rank"),
                        player_1_id: row.get::<String, _>("player_1_id"),
                        player_1_username: row.get::<String, _>("player_1_username"),
                        player_2_id: row.get::<String, _>("player_2_id"),
                        player_2_username: row.get::<String, _>("player_2_username"),
                        games_played,
                        wins,
                        win_rate: win_rate_pct(wins, games_played),
                    }
                })
                .collect();
            HttpResponse::Ok().json(teams)
        }
        Err(e) => {
            log::error!("team rankings fetch failed: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

pub async fn clubs(state: web::Data<AppState>) -> HttpResponse {
    let rows = sqlx::query("SELECT id, name FROM clubs ORDER BY name")
        .fetch_all(&state.pool)
        .await;

    match rows {
        Ok(rows) => {
            let clubs: Vec<Club> = rows
                .into_iter()
                .map(|row| Club {
                    id: row.get::<i64, _>("id"),
                    name: row.get::<String, _>("name"),
                })
                .collect();
            HttpResponse::Ok().json(clubs)
        }
        Err(e) => {
            log::error!("clubs fetch failed: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}
