//! In-memory position store, partitioned by game code.
//!
//! Last write wins per `(game code, player id)`. Nothing is persisted; a
//! record lives until it is older than the retention window.

use std::collections::HashMap;

use api_types::{PlayerPosition, normalize_game_code};
use tokio::sync::RwLock;

type Partition = HashMap<String, PlayerPosition>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Eviction {
    pub positions: usize,
    pub games: usize,
}

#[derive(Debug)]
pub struct PositionStore {
    games: RwLock<HashMap<String, Partition>>,
    max_age_ms: i64,
}

impl PositionStore {
    pub fn new(max_age_ms: i64) -> Self {
        Self {
            games: RwLock::new(HashMap::new()),
            max_age_ms,
        }
    }

    fn is_expired(&self, position: &PlayerPosition, now: i64) -> bool {
        now.saturating_sub(position.timestamp) > self.max_age_ms
    }

    /// Replace the player's record wholesale, stamped with `received_at`.
    /// Returns how many players the game now has.
    pub async fn upsert(&self, mut position: PlayerPosition, received_at: i64) -> usize {
        position.timestamp = received_at;
        position.game_code = normalize_game_code(&position.game_code);

        let mut games = self.games.write().await;
        let partition = games.entry(position.game_code.clone()).or_default();
        partition.insert(position.player_id.clone(), position);
        partition.len()
    }

    /// Unexpired records of a game, in no particular order. Unknown games
    /// are simply empty.
    pub async fn list(&self, game_code: &str, now: i64) -> Vec<PlayerPosition> {
        let games = self.games.read().await;
        games
            .get(&normalize_game_code(game_code))
            .map(|partition| {
                partition
                    .values()
                    .filter(|position| !self.is_expired(position, now))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drop expired records, then any game left without players.
    pub async fn evict(&self, now: i64) -> Eviction {
        let mut games = self.games.write().await;
        let mut eviction = Eviction::default();

        games.retain(|_, partition| {
            let before = partition.len();
            partition.retain(|_, position| !self.is_expired(position, now));
            eviction.positions += before - partition.len();

            let keep = !partition.is_empty();
            if !keep {
                eviction.games += 1;
            }
            keep
        });

        eviction
    }

    pub async fn active_games(&self) -> usize {
        self.games.read().await.len()
    }
}
