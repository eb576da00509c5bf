mod cache;
mod clock;
mod config;
mod gateway;
mod identity;
mod matchmaker;
mod persistence;
mod rating;
mod registry;
mod session;

use std::path::Path;
use std::sync::Arc;

use persistence::sqlite::{Database, SqliteGamesRepository, SqliteMovesRepository, SqliteUsersRepository};

use config::Config;
use gateway::{AppState, GatewayLimits};
use identity::IdentityProvider;
use matchmaker::Matchmaker;
use persistence::{GamesRepository, MovesRepository, Projector, UsersRepository};
use registry::Registry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::fmt::format::FmtSpan;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_span_events(FmtSpan::CLOSE)
        .init();

    let config = Config::from_env();
    tracing::info!(port = config.listen_port, "starting realtime chess backend");

    let db_path = config
        .store_dsn
        .strip_prefix("sqlite://")
        .unwrap_or(&config.store_dsn);
    let database = Database::open(Path::new(db_path)).await?;

    let games: Arc<dyn GamesRepository> = Arc::new(SqliteGamesRepository::new(database.pool().clone()));
    let moves: Arc<dyn MovesRepository> = Arc::new(SqliteMovesRepository::new(database.pool().clone()));
    let users: Arc<dyn UsersRepository> = Arc::new(SqliteUsersRepository::new(database.pool().clone()));

    let registry = Registry::new(
        config.session_tick_cadence,
        config.session_retire_after,
        config.session_disconnect_grace,
        config.user_max_active_games,
    );
    tokio::spawn(registry.clone().run_sweep());

    let projector = Projector::new(games.clone(), moves.clone(), users.clone(), config.elo_k_factor);
    let matchmaker = Arc::new(Matchmaker::new(registry.clone(), games.clone(), projector));
    let identity = Arc::new(IdentityProvider::new(&config.jwt_secret));

    let state = AppState::new(
        registry,
        matchmaker,
        identity,
        games,
        moves,
        users,
        std::time::Duration::from_secs(2),
        GatewayLimits {
            moves_per_min: config.ratelimit_moves_per_min,
            chat_per_min: config.ratelimit_chat_per_min,
            game_create_per_5min: config.ratelimit_game_create_per_5min,
        },
    );

    let app = gateway::router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.listen_port)).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(err) = result {
                tracing::error!(%err, "server error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received SIGINT, shutting down gracefully");
        }
        _ = sigterm.recv() => {
            tracing::info!("received SIGTERM, shutting down gracefully");
        }
    }

    Ok(())
}
