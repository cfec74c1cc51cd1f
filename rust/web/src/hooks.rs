//! Collaborators the lifecycle manager calls into when a game concludes.
//!
//! Stats, ratings and achievements live outside this service; so does the
//! presence layer that owns per-game rooms. They are handed to
//! [`GameService`](crate::service::GameService) as trait objects.

use gotg_engine::game::{GameEndReason, GameId};
use gotg_engine::replay::CombatStats;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    Win,
    Loss,
}

/// One player's line for the stats collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatUpdate {
    pub game_id: GameId,
    pub player_id: String,
    pub outcome: MatchOutcome,
    pub reason: GameEndReason,
    pub duration_ms: i64,
    pub combat: CombatStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingUpdate {
    pub game_id: GameId,
    pub winner_id: String,
    pub loser_id: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{collaborator} failed: {message}")]
pub struct HookError {
    pub collaborator: &'static str,
    pub message: String,
}

pub trait PostGameHooks: Send + Sync + Debug {
    fn record_stats(&self, update: &StatUpdate) -> Result<(), HookError>;

    /// Called only for rating-eligible games.
    fn update_ratings(&self, update: &RatingUpdate) -> Result<(), HookError>;

    fn evaluate_achievements(&self, player_id: &str, game_id: &str) -> Result<(), HookError>;
}

pub trait PresenceRooms: Send + Sync + Debug {
    fn close_room(&self, game_id: &str) -> Result<(), HookError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl PostGameHooks for NoopHooks {
    fn record_stats(&self, _update: &StatUpdate) -> Result<(), HookError> {
        Ok(())
    }

    fn update_ratings(&self, _update: &RatingUpdate) -> Result<(), HookError> {
        Ok(())
    }

    fn evaluate_achievements(&self, _player_id: &str, _game_id: &str) -> Result<(), HookError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPresence;

impl PresenceRooms for NoopPresence {
    fn close_room(&self, _game_id: &str) -> Result<(), HookError> {
        Ok(())
    }
}

/// A call observed by [`RecordingHooks`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookCall {
    Stats(StatUpdate),
    Rating(RatingUpdate),
    Achievements { player_id: String, game_id: GameId },
    CloseRoom { game_id: GameId },
}

/// Keeps every collaborator call in order. Implements both traits so one
/// instance sees the full post-game sequence.
#[derive(Debug, Default)]
pub struct RecordingHooks {
    calls: Mutex<Vec<HookCall>>,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<HookCall> {
        self.calls
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn stats_for(&self, game_id: &str) -> Vec<StatUpdate> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                HookCall::Stats(update) if update.game_id == game_id => Some(update),
                _ => None,
            })
            .collect()
    }

    fn push(&self, call: HookCall) -> Result<(), HookError> {
        self.calls
            .lock()
            .map_err(|_| HookError {
                collaborator: "recording",
                message: "call log poisoned".into(),
            })?
            .push(call);
        Ok(())
    }
}

impl PostGameHooks for RecordingHooks {
    fn record_stats(&self, update: &StatUpdate) -> Result<(), HookError> {
        self.push(HookCall::Stats(update.clone()))
    }

    fn update_ratings(&self, update: &RatingUpdate) -> Result<(), HookError> {
        self.push(HookCall::Rating(update.clone()))
    }

    fn evaluate_achievements(&self, player_id: &str, game_id: &str) -> Result<(), HookError> {
        self.push(HookCall::Achievements {
            player_id: player_id.to_string(),
            game_id: game_id.to_string(),
        })
    }
}

impl PresenceRooms for RecordingHooks {
    fn close_room(&self, game_id: &str) -> Result<(), HookError> {
        self.push(HookCall::CloseRoom {
            game_id: game_id.to_string(),
        })
    }
}
