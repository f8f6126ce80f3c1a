mod models;
mod handlers;
mod services;
mod state;
mod db;
mod i18n;

use actix_web::middleware::NormalizePath;
use actix_web::{web, App, HttpServer};
use actix_cors::Cors;
use tokio::sync::broadcast;

use state::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    pretty_env_logger::init();

    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse::<u16>()
        .unwrap_or(8080);
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://clubtac.db".to_string());

    let pool = db::init_pool(&database_url)
        .await
        .expect("Failed to initialize SQLite pool");

    let (participant_changes, change_feed) = broadcast::channel(64);
    let app_state = web::Data::new(AppState::new(pool.clone(), participant_changes));

    let _sync_worker =
        services::sync::spawn_payment_sync(pool, app_state.registrations.clone(), change_feed);

    log::info!("listening on 0.0.0.0:{}", port);

    HttpServer::new(move || {
        App::new()
            .wrap(NormalizePath::trim())
            .wrap(Cors::permissive())
            .app_data(app_state.clone())
            .route("/health", web::get().to(handlers::health_check))

            .route("/api/auth/telegram", web::post().to(handlers::auth::telegram_auth))
            .route("/api/user/stats", web::get().to(handlers::stats::user_stats))

            .route("/api/rankings/players", web::get().to(handlers::rankings::player_rankings))
            .route("/api/rankings/teams", web::get().to(handlers::rankings::team_rankings))
            .route("/api/clubs", web::get().to(handlers::rankings::clubs))
            .route("/api/games", web::get().to(handlers::games::games_history))

            .route("/api/events/upcoming", web::get().to(handlers::events::upcoming_events))
            .route("/api/events/finished", web::get().to(handlers::events::finished_events))
            .route("/api/events/{event_id}/register", web::post().to(handlers::events::register_for_event))
            .route("/api/events/{event_id}/registration", web::get().to(handlers::events::registration_status))
            .route("/api/payments/callback", web::post().to(handlers::payments::payment_callback))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
