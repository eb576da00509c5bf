//! Server configuration, read from the environment with documented
//! defaults.
//!
//! Precedence for every key: `CHESS_<KEY>` environment variable, else the
//! default below. There is no config file; that keeps the Durable Store
//! and Cache/TTL Store DSNs (credentials included) out of version
//! control by construction.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_port: u16,
    pub jwt_secret: String,
    pub store_dsn: String,
    pub cache_dsn: String,
    pub session_disconnect_grace: Duration,
    pub session_tick_cadence: Duration,
    pub session_retire_after: Duration,
    pub ratelimit_moves_per_min: u32,
    pub ratelimit_chat_per_min: u32,
    pub ratelimit_game_create_per_5min: u32,
    pub user_max_active_games: u32,
    pub clock_tolerance: Duration,
    pub elo_k_factor: i32,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            listen_port: env_u16("CHESS_LISTEN_PORT", 8080),
            jwt_secret: env_string("CHESS_IDENTITY_JWT_SECRET", "dev-secret-change-me"),
            store_dsn: env_string("CHESS_STORE_DSN", "sqlite://chess.db"),
            cache_dsn: env_string("CHESS_CACHE_DSN", "memory://"),
            session_disconnect_grace: Duration::from_millis(env_u64("CHESS_SESSION_DISCONNECT_GRACE_MS", 30_000)),
            session_tick_cadence: hz_to_period(env_u64("CHESS_SESSION_TICK_HZ", 1)),
            session_retire_after: Duration::from_millis(env_u64("CHESS_SESSION_RETIRE_AFTER_MS", 300_000)),
            ratelimit_moves_per_min: env_u32("CHESS_RATELIMIT_MOVES_PER_MIN", 30),
            ratelimit_chat_per_min: env_u32("CHESS_RATELIMIT_CHAT_PER_MIN", 10),
            ratelimit_game_create_per_5min: env_u32("CHESS_RATELIMIT_GAME_CREATE_PER_5MIN", 3),
            user_max_active_games: env_u32("CHESS_USER_MAX_ACTIVE_GAMES", 5),
            clock_tolerance: Duration::from_millis(env_u64("CHESS_CLOCK_TOLERANCE_MS", 50)),
            elo_k_factor: env_u32("CHESS_ELO_K_FACTOR", 32) as i32,
        }
    }
}

fn hz_to_period(hz: u64) -> Duration {
    if hz == 0 {
        Duration::from_secs(1)
    } else {
        Duration::from_millis(1000 / hz)
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::from_env();
        assert_eq!(config.session_disconnect_grace, Duration::from_secs(30));
        assert_eq!(config.elo_k_factor, 32);
        assert_eq!(config.user_max_active_games, 5);
    }

    #[test]
    fn tick_hz_of_one_is_one_second_period() {
        assert_eq!(hz_to_period(1), Duration::from_secs(1));
    }
}
