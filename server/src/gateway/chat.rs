//! Chat relay: carries `chat` frames between subscribers of a game without
//! routing them through the session actor's event bus. Chat has no replay
//! or ordering guarantee (unlike [`crate::session::events::SessionEvent`]);
//! a client that misses a message while disconnected simply misses it.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub from: String,
    pub text: String,
}

pub struct ChatRelay {
    channels: Mutex<HashMap<String, broadcast::Sender<ChatMessage>>>,
}

impl ChatRelay {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    pub fn subscribe(&self, game_id: &str) -> broadcast::Receiver<ChatMessage> {
        let mut channels = self.channels.lock().unwrap();
        channels
            .entry(game_id.to_string())
            .or_insert_with(|| broadcast::channel(64).0)
            .subscribe()
    }

    /// Never inspected or moderated; relayed verbatim to every current
    /// subscriber. Dropped silently if nobody else is listening.
    pub fn publish(&self, game_id: &str, message: ChatMessage) {
        let mut channels = self.channels.lock().unwrap();
        let tx = channels
            .entry(game_id.to_string())
            .or_insert_with(|| broadcast::channel(64).0);
        let _ = tx.send(message);
    }
}

impl Default for ChatRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_of_the_same_game_receive_published_messages() {
        let relay = ChatRelay::new();
        let mut rx = relay.subscribe("game1");
        relay.publish(
            "game1",
            ChatMessage {
                from: "alice".into(),
                text: "gg".into(),
            },
        );
        let received = rx.recv().await.unwrap();
        assert_eq!(received.text, "gg");
    }

    #[tokio::test]
    async fn messages_do_not_cross_games() {
        let relay = ChatRelay::new();
        let mut rx = relay.subscribe("game1");
        relay.publish(
            "game2",
            ChatMessage {
                from: "bob".into(),
                text: "hi".into(),
            },
        );
        assert!(rx.try_recv().is_err());
    }
}
