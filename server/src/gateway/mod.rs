//! Realtime Gateway (C6): the `axum` WebSocket upgrade that is the
//! primary transport, plus a thin HTTP shell exposing the same core
//! operations as sibling handlers for the alternate path.

mod chat;
mod converters;
mod http;
mod ratelimit;
mod ws;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;

use crate::cache::LobbyCache;
use crate::identity::IdentityProvider;
use crate::matchmaker::Matchmaker;
use crate::persistence::{GamesRepository, MovesRepository, UsersRepository};
use crate::registry::Registry;
use chat::ChatRelay;
use ratelimit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
    pub matchmaker: Arc<Matchmaker>,
    pub identity: Arc<IdentityProvider>,
    pub games: Arc<dyn GamesRepository>,
    pub moves: Arc<dyn MovesRepository>,
    pub users: Arc<dyn UsersRepository>,
    pub lobby_cache: Arc<LobbyCache>,
    pub chat_relay: Arc<ChatRelay>,
    pub move_limiter: Arc<RateLimiter>,
    pub chat_limiter: Arc<RateLimiter>,
    pub create_limiter: Arc<RateLimiter>,
}

pub struct GatewayLimits {
    pub moves_per_min: u32,
    pub chat_per_min: u32,
    pub game_create_per_5min: u32,
}

impl AppState {
    pub fn new(
        registry: Registry,
        matchmaker: Arc<Matchmaker>,
        identity: Arc<IdentityProvider>,
        games: Arc<dyn GamesRepository>,
        moves: Arc<dyn MovesRepository>,
        users: Arc<dyn UsersRepository>,
        lobby_cache_ttl: Duration,
        limits: GatewayLimits,
    ) -> Self {
        Self {
            registry,
            matchmaker,
            identity,
            games,
            moves,
            users,
            lobby_cache: Arc::new(LobbyCache::new(lobby_cache_ttl)),
            chat_relay: Arc::new(ChatRelay::new()),
            move_limiter: Arc::new(RateLimiter::new(limits.moves_per_min, Duration::from_secs(60))),
            chat_limiter: Arc::new(RateLimiter::new(limits.chat_per_min, Duration::from_secs(60))),
            create_limiter: Arc::new(RateLimiter::new(limits.game_create_per_5min, Duration::from_secs(300))),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/games", post(http::create_game))
        .route("/games/lobby", get(http::lobby))
        .route("/games/{id}", get(http::get_game))
        .route("/games/{id}/join", post(http::join_game))
        .route("/games/{id}/move", post(http::make_move))
        .route("/games/{id}/resign", post(http::resign))
        .route("/games/{id}/history", get(http::history))
        .route("/ws", get(ws::upgrade))
        .with_state(state)
}
