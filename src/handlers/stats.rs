use std::collections::BTreeMap;

use actix_web::{web, Error, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;

use crate::i18n::{self, Locale};
use crate::models::{GameRecord, PlayerRanking, User};
use crate::state::AppState;

/// Window of recent games scanned for a player's history and partner
/// stats. The games table grows unbounded; everything older than this
/// window is invisible to the profile.
pub const GAMES_WINDOW: i64 = 100;
pub const RECENT_GAMES_LIMIT: usize = 10;
pub const MIN_PARTNER_GAMES: i64 = 3;
pub const TOP_PARTNERS: usize = 3;

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub telegram_id: Option<i64>,
    pub username: Option<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct PartnerStats {
    pub name: String,
    pub games: i64,
    pub wins: i64,
    #[serde(rename = "winRate")]
    pub win_rate: i64,
}

/// Profile statistics: the resolved user, their precomputed ranking row
/// (null when absent), the last games they played and their best
/// partners over the recent window.
pub async fn user_stats(
    req: HttpRequest,
    query: web::Query<StatsQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let locale = i18n::detect_locale(&req);
    let q = query.into_inner();
    let pool = &state.pool;

    if q.telegram_id.is_none() && q.username.is_none() {
        let error_msg = match locale {
            Locale::Ru => "telegram_id или username обязательны",
            Locale::En => "telegram_id or username is required",
        };
        return Ok(HttpResponse::BadRequest().json(json!({ "error": error_msg })));
    }

    let user = match fetch_user(pool, q.telegram_id, q.username.as_deref()).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return Ok(HttpResponse::NotFound().json(json!({
                "error": i18n::user_not_found(locale)
            })));
        }
        Err(e) => {
            log::error!("user lookup failed: {}", e);
            return Ok(HttpResponse::InternalServerError().json(json!({
                "error": i18n::internal_error(locale),
                "details": e.to_string()
            })));
        }
    };

    // Ranking and game fetches degrade independently: an absent or
    // failing panel must not take the whole profile down.
    let stats = match fetch_ranking(pool, &user).await {
        Ok(stats) => stats,
        Err(e) => {
            log::warn!("ranking fetch failed for {}: {}", user.id, e);
            None
        }
    };

    let games = match fetch_recent_window(pool).await {
        Ok(games) => games,
        Err(e) => {
            log::warn!("games window fetch failed: {}", e);
            Vec::new()
        }
    };

    let (recent_games, partners) = match user.display_name() {
        Some(name) => {
            let recent = recent_games_for(&games, name);
            let partners = if stats.is_some() {
                best_partners(&games, name)
            } else {
                Vec::new()
            };
            (recent, partners)
        }
        None => (Vec::new(), Vec::new()),
    };

    Ok(HttpResponse::Ok().json(json!({
        "user": user,
        "stats": stats,
        "recentGames": recent_games,
        "bestPartners": partners,
    })))
}

/// The user's games inside the window, newest first, capped at
/// RECENT_GAMES_LIMIT.
pub fn recent_games_for(games: &[GameRecord], username: &str) -> Vec<GameRecord> {
    games
        .iter()
        .filter(|game| game.involves(username))
        .take(RECENT_GAMES_LIMIT)
        .cloned()
        .collect()
}

/// Partner leaderboard over the user's games in the window: everyone
/// the user teamed with at least MIN_PARTNER_GAMES times, best win rate
/// first, capped at TOP_PARTNERS. Ties break by shared games, then by
/// name, so the result does not depend on input order.
pub fn best_partners(games: &[GameRecord], username: &str) -> Vec<PartnerStats> {
    let mut per_partner: BTreeMap<String, (i64, i64)> = BTreeMap::new();

    for game in games {
        if let Some((partner, won)) = game.partner_of(username) {
            let entry = per_partner.entry(partner.to_string()).or_insert((0, 0));
            entry.0 += 1;
            if won {
                entry.1 += 1;
            }
        }
    }

    let mut partners: Vec<PartnerStats> = per_partner
        .into_iter()
        .map(|(name, (games, wins))| PartnerStats {
            name,
            games,
            wins,
            win_rate: win_rate_pct(wins, games),
        })
        .filter(|p| p.games >= MIN_PARTNER_GAMES)
        .collect();

    partners.sort_by(|a, b| {
        b.win_rate
            .cmp(&a.win_rate)
            .then(b.games.cmp(&a.games))
            .then(a.name.cmp(&b.name))
    });
    partners.truncate(TOP_PARTNERS);
    partners
}

pub(crate) fn win_rate_pct(wins: i64, games: i64) -> i64 {
    if games > 0 {
        ((wins as f64 / games as f64) * 100.0).round() as i64
    } else {
        0
    }
}

async fn fetch_user(
    pool: &SqlitePool,
    telegram_id: Option<i64>,
    username: Option<&str>,
) -> Result<Option<User>, sqlx::Error> {
    let row = if let Some(telegram_id) = telegram_id {
        sqlx::query(
            "SELECT id, telegram_id, username, first_name, last_name, created_at, updated_at
             FROM users WHERE telegram_id = ? LIMIT 1",
        )
        .bind(telegram_id)
        .fetch_optional(pool)
        .await?
    } else {
        sqlx::query(
            "SELECT id, telegram_id, username, first_name, last_name, created_at, updated_at
             FROM users WHERE username = ? LIMIT 1",
        )
        .bind(username)
        .fetch_optional(pool)
        .await?
    };

    Ok(row.as_ref().map(User::from_row))
}

/// Ranking rows are keyed by username when the user has one, by the
/// internal id otherwise.
async fn fetch_ranking(pool: &SqlitePool, user: &User) -> Result<Option<PlayerRanking>, sqlx::Error> {
    let row = match user.username.as_deref() {
        Some(username) => {
            sqlx::query(
                "SELECT place, user_id, username, games_played, wins, win_rate, points
                 FROM player_rankings WHERE username = ? LIMIT 1",
            )
            .bind(username)
            .fetch_optional(pool)
            .await?
        }
        None => {
            sqlx::query(
                "SELECT place, user_id, username, games_played, wins, win_rate, points
                 FROM player_rankings WHERE user_id = ? LIMIT 1",
            )
            .bind(&user.id)
            .fetch_optional(pool)
            .await?
        }
    };

    Ok(row.as_ref().map(PlayerRanking::from_row))
}

async fn fetch_recent_window(pool: &SqlitePool) -> Result<Vec<GameRecord>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT game_id, created_at, player_1_1, player_1_2, player_2_1, player_2_2, score_1, score_2
         FROM games
         ORDER BY datetime(created_at) DESC
         LIMIT ?",
    )
    .bind(GAMES_WINDOW)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(GameRecord::from_row).collect())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn game(id: i64, team1: (&str, &str), team2: (&str, &str), score: (i64, i64)) -> GameRecord {
        GameRecord {
            game_id: id,
            created_at: format!("2026-07-{:02}T18:00:00Z", (id % 28) + 1),
            player_1_1: team1.0.to_string(),
            player_1_2: team1.1.to_string(),
            player_2_1: team2.0.to_string(),
            player_2_2: team2.1.to_string(),
            score_1: score.0,
            score_2: score.1,
        }
    }

    #[test]
    fn partners_below_the_shared_games_threshold_are_excluded() {
        // B: 2 shared games (1 win), E: 1 shared game. Neither reaches
        // the 3-game minimum, so the board stays empty.
        let games = vec![
            game(1, ("A", "B"), ("C", "D"), (2, 1)),
            game(2, ("A", "B"), ("C", "D"), (1, 2)),
            game(3, ("A", "E"), ("C", "D"), (3, 0)),
        ];
        assert!(best_partners(&games, "A").is_empty());
    }

    #[test]
    fn board_is_sorted_by_win_rate_and_capped() {
        let mut games = Vec::new();
        // C: 3 games, 3 wins (100%)
        for i in 0..3 {
            games.push(game(i, ("A", "C"), ("X", "Y"), (2, 0)));
        }
        // B: 4 games, 2 wins (50%)
        for i in 3..5 {
            games.push(game(i, ("B", "A"), ("X", "Y"), (2, 0)));
        }
        for i in 5..7 {
            games.push(game(i, ("A", "B"), ("X", "Y"), (0, 2)));
        }
        // F: 3 games, 1 win (33%)
        games.push(game(7, ("X", "Y"), ("A", "F"), (0, 2)));
        games.push(game(8, ("X", "Y"), ("F", "A"), (2, 0)));
        games.push(game(9, ("X", "Y"), ("A", "F"), (2, 0)));
        // D: 3 games, 0 wins (0%), pushed out by the cap.
        for i in 10..13 {
            games.push(game(i, ("A", "D"), ("X", "Y"), (0, 2)));
        }

        let board = best_partners(&games, "A");
        let names: Vec<&str> = board.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["C", "B", "F"]);
        assert_eq!(board[0].win_rate, 100);
        assert_eq!(board[1].win_rate, 50);
        assert_eq!(board[2].win_rate, 33);
    }

    #[test]
    fn ties_break_by_games_then_name() {
        let mut games = Vec::new();
        // B and C both at 100%, C with more shared games.
        for i in 0..3 {
            games.push(game(i, ("A", "B"), ("X", "Y"), (2, 0)));
        }
        for i in 3..7 {
            games.push(game(i, ("A", "C"), ("X", "Y"), (2, 0)));
        }
        let board = best_partners(&games, "A");
        assert_eq!(board[0].name, "C");
        assert_eq!(board[1].name, "B");

        // Equal games and win rate: lexicographic order decides.
        let mut games = Vec::new();
        for i in 0..3 {
            games.push(game(i, ("A", "B"), ("X", "Y"), (2, 0)));
            games.push(game(100 + i, ("C", "A"), ("X", "Y"), (2, 0)));
        }
        let board = best_partners(&games, "A");
        assert_eq!(board[0].name, "B");
        assert_eq!(board[1].name, "C");
    }

    #[test]
    fn opposing_team_wins_do_not_count_for_the_partner() {
        // A plays on the second team; score_2 decides the win.
        let games = vec![
            game(1, ("X", "Y"), ("A", "B"), (1, 3)),
            game(2, ("X", "Y"), ("B", "A"), (3, 1)),
            game(3, ("X", "Y"), ("A", "B"), (0, 2)),
        ];
        let board = best_partners(&games, "A");
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].games, 3);
        assert_eq!(board[0].wins, 2);
        assert_eq!(board[0].win_rate, 67);
    }

    #[test]
    fn recent_games_are_capped_and_keep_input_order() {
        let mut games = Vec::new();
        for i in 0..15 {
            games.push(game(i, ("A", "B"), ("C", "D"), (2, 1)));
            games.push(game(100 + i, ("X", "Y"), ("C", "D"), (2, 1)));
        }

        let recent = recent_games_for(&games, "A");
        assert_eq!(recent.len(), RECENT_GAMES_LIMIT);
        let ids: Vec<i64> = recent.iter().map(|g| g.game_id).collect();
        assert_eq!(ids, (0..10).collect::<Vec<i64>>());
    }

    #[test]
    fn win_rate_is_rounded_to_the_nearest_percent() {
        assert_eq!(win_rate_pct(1, 3), 33);
        assert_eq!(win_rate_pct(2, 3), 67);
        assert_eq!(win_rate_pct(1, 2), 50);
        assert_eq!(win_rate_pct(0, 0), 0);
    }

    fn game_pool() -> impl Strategy<Value = Vec<GameRecord>> {
        prop::collection::vec((0..3usize, any::<bool>(), any::<bool>()), 1..30).prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, (partner, user_first, won))| {
                    let partner = ["B", "C", "D"][partner];
                    let (score, other) = if won { (3, 1) } else { (1, 3) };
                    if user_first {
                        game(i as i64, ("A", partner), ("X", "Y"), (score, other))
                    } else {
                        game(i as i64, ("X", "Y"), (partner, "A"), (other, score))
                    }
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn partner_board_is_independent_of_input_order(
            (original, shuffled) in game_pool()
                .prop_flat_map(|games| (Just(games.clone()), Just(games).prop_shuffle()))
        ) {
            prop_assert_eq!(best_partners(&original, "A"), best_partners(&shuffled, "A"));
        }
    }
}
