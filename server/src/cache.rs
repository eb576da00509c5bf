//! Cache/TTL Store seam: holds the lobby listing only. In-process
//! `Mutex<HashMap>` is the production-least-surprise default here since no
//! external cache crate appears anywhere in the pack for this concern.
//! Best-effort: invalidated eagerly on create/join/complete rather than
//! relying on the TTL alone, per §5.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::persistence::GameRecord;

struct Entry {
    games: Vec<GameRecord>,
    fetched_at: Instant,
}

pub struct LobbyCache {
    ttl: Duration,
    entry: Mutex<Option<Entry>>,
}

impl LobbyCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    /// Returns the cached lobby listing if it's still within TTL.
    pub fn get(&self) -> Option<Vec<GameRecord>> {
        let guard = self.entry.lock().unwrap();
        let entry = guard.as_ref()?;
        if entry.fetched_at.elapsed() < self.ttl {
            Some(entry.games.clone())
        } else {
            None
        }
    }

    pub fn put(&self, games: Vec<GameRecord>) {
        *self.entry.lock().unwrap() = Some(Entry {
            games,
            fetched_at: Instant::now(),
        });
    }

    /// Called on create/join/complete so a stale listing is never served
    /// past the mutation that invalidated it.
    pub fn invalidate(&self) {
        *self.entry.lock().unwrap() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(id: &str) -> GameRecord {
        GameRecord {
            id: id.to_string(),
            white_id: None,
            black_id: None,
            time_control_ms: 180_000,
            increment_ms: 2_000,
            delay_ms: 0,
            delay_mode: "fischer".into(),
            fen: String::new(),
            pgn: String::new(),
            white_remaining_ms: 0,
            black_remaining_ms: 0,
            active_color: None,
            status: "lobby".into(),
            result: None,
            winner_id: None,
            end_reason: None,
        }
    }

    #[test]
    fn miss_until_populated() {
        let cache = LobbyCache::new(Duration::from_secs(5));
        assert!(cache.get().is_none());
        cache.put(vec![game("g1")]);
        assert_eq!(cache.get().unwrap().len(), 1);
    }

    #[test]
    fn invalidate_clears_immediately() {
        let cache = LobbyCache::new(Duration::from_secs(5));
        cache.put(vec![game("g1")]);
        cache.invalidate();
        assert!(cache.get().is_none());
    }

    #[test]
    fn expires_after_ttl() {
        let cache = LobbyCache::new(Duration::from_millis(1));
        cache.put(vec![game("g1")]);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get().is_none());
    }
}
