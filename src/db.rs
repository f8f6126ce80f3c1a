use sqlx::{sqlite::{SqlitePoolOptions, SqliteConnectOptions}, SqlitePool};
use std::str::FromStr;

pub async fn init_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let connect_opts = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_opts)
        .await?;

    init_schema(&pool).await?;

    Ok(pool)
}

pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            telegram_id INTEGER NOT NULL UNIQUE,
            username TEXT,
            first_name TEXT NOT NULL,
            last_name TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Immutable game history written by the club bot.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS games (
            game_id INTEGER PRIMARY KEY AUTOINCREMENT,
            player_1_1 TEXT NOT NULL,
            player_1_2 TEXT NOT NULL,
            player_2_1 TEXT NOT NULL,
            player_2_2 TEXT NOT NULL,
            score_1 INTEGER NOT NULL,
            score_2 INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Leaderboards are recalculated out of band and are read-only to
    // every request handler.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS player_rankings (
            user_id TEXT PRIMARY KEY,
            place INTEGER NOT NULL,
            username TEXT NOT NULL,
            games_played INTEGER NOT NULL,
            wins INTEGER NOT NULL,
            win_rate INTEGER NOT NULL,
            points REAL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS team_rankings (
            player_1_id TEXT NOT NULL,
            player_2_id TEXT NOT NULL,
            rank INTEGER NOT NULL,
            player_1_username TEXT NOT NULL,
            player_2_username TEXT NOT NULL,
            games_played INTEGER NOT NULL,
            wins INTEGER NOT NULL,
            PRIMARY KEY (player_1_id, player_2_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS clubs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            club_id INTEGER,
            event_type TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            address TEXT,
            price REAL,
            duration_minutes INTEGER,
            starts_at TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'scheduled'
                CHECK(status IN ('scheduled','finished','cancelled')),
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
            FOREIGN KEY(club_id) REFERENCES clubs(id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS event_participants (
            id TEXT PRIMARY KEY,
            event_id INTEGER NOT NULL,
            user_id TEXT NOT NULL,
            payment_status TEXT NOT NULL DEFAULT 'none'
                CHECK(payment_status IN ('none','pending','paid')),
            paylink TEXT,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
            UNIQUE(event_id, user_id),
            FOREIGN KEY(event_id) REFERENCES events(id),
            FOREIGN KEY(user_id) REFERENCES users(id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("INSERT OR IGNORE INTO clubs (id, name) VALUES (1, 'ClubTac');")
        .execute(pool)
        .await?;

    Ok(())
}
