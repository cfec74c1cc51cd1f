use gotg_engine::game::{Game, GameId};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::RwLock;
use thiserror::Error;

pub type Version = u64;

/// A stored game together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub version: Version,
    pub game: Game,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Game not found: {0}")]
    NotFound(GameId),
    #[error("Write conflict on game {game_id}: expected version {expected}, found {actual}")]
    Conflict {
        game_id: GameId,
        expected: Version,
        actual: Version,
    },
    #[error("Lobby {lobby_id} already has game {existing}")]
    LobbyTaken { lobby_id: String, existing: GameId },
    #[error("Game storage poisoned")]
    StoragePoisoned,
}

impl StoreError {
    /// Errors a fresh read-modify-write attempt may resolve.
    pub fn is_write_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. } | StoreError::LobbyTaken { .. })
    }
}

/// Persistence for game documents with optimistic, versioned commits.
///
/// A commit succeeds only if the stored version still equals the version the
/// caller loaded; the whole document is then replaced atomically and the
/// version bumped.
pub trait GameStore: Send + Sync + Debug {
    fn load(&self, game_id: &str) -> Result<Option<Versioned>, StoreError>;

    fn find_by_lobby(&self, lobby_id: &str) -> Result<Option<Versioned>, StoreError>;

    /// Stores a new game at version 1. Fails with [`StoreError::LobbyTaken`]
    /// if the lobby already has a game.
    fn insert(&self, game: Game) -> Result<Versioned, StoreError>;

    /// Replaces the game if it is still at `expected`. Returns the new version.
    fn commit(&self, game_id: &str, expected: Version, game: Game) -> Result<Version, StoreError>;
}

#[derive(Debug, Default)]
struct Tables {
    games: HashMap<GameId, Versioned>,
    lobbies: HashMap<String, GameId>,
}

#[derive(Debug, Default)]
pub struct InMemoryGameStore {
    tables: RwLock<Tables>,
}

impl InMemoryGameStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tables.read().map(|t| t.games.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl GameStore for InMemoryGameStore {
    fn load(&self, game_id: &str) -> Result<Option<Versioned>, StoreError> {
        let guard = self
            .tables
            .read()
            .map_err(|_| StoreError::StoragePoisoned)?;
        Ok(guard.games.get(game_id).cloned())
    }

    fn find_by_lobby(&self, lobby_id: &str) -> Result<Option<Versioned>, StoreError> {
        let guard = self
            .tables
            .read()
            .map_err(|_| StoreError::StoragePoisoned)?;
        Ok(guard
            .lobbies
            .get(lobby_id)
            .and_then(|id| guard.games.get(id))
            .cloned())
    }

    fn insert(&self, game: Game) -> Result<Versioned, StoreError> {
        let mut guard = self
            .tables
            .write()
            .map_err(|_| StoreError::StoragePoisoned)?;
        if let Some(existing) = guard.lobbies.get(game.lobby_id()) {
            return Err(StoreError::LobbyTaken {
                lobby_id: game.lobby_id().to_string(),
                existing: existing.clone(),
            });
        }
        let id = game.id().clone();
        let stored = Versioned { version: 1, game };
        guard
            .lobbies
            .insert(stored.game.lobby_id().to_string(), id.clone());
        guard.games.insert(id.clone(), stored.clone());

        tracing::debug!(game_id = %id, "game inserted");
        Ok(stored)
    }

    fn commit(&self, game_id: &str, expected: Version, game: Game) -> Result<Version, StoreError> {
        let mut guard = self
            .tables
            .write()
            .map_err(|_| StoreError::StoragePoisoned)?;
        let slot = guard
            .games
            .get_mut(game_id)
            .ok_or_else(|| StoreError::NotFound(game_id.to_string()))?;
        if slot.version != expected {
            tracing::debug!(
                game_id = %game_id,
                expected,
                actual = slot.version,
                "rejecting stale commit"
            );
            return Err(StoreError::Conflict {
                game_id: game_id.to_string(),
                expected,
                actual: slot.version,
            });
        }
        slot.version += 1;
        slot.game = game;
        Ok(slot.version)
    }
}
