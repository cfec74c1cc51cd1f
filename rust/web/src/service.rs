//! The game lifecycle manager.
//!
//! Every mutating operation is one optimistic transaction: load the stored
//! game and its version, apply the engine rule, commit against the version
//! that was read. A stale commit is a write conflict and the whole
//! transaction is retried under the [`RetryPolicy`]. The transaction that
//! moves a game into `Finished` is the only one that sees the transition, so
//! post-game collaborators run exactly once per game.

use crate::clock::{Clock, SystemClock};
use crate::errors::{ErrorSeverity, IntoErrorResponse};
use crate::events::{EventBus, GameEvent};
use crate::hooks::{
    MatchOutcome, NoopHooks, NoopPresence, PostGameHooks, PresenceRooms, RatingUpdate, StatUpdate,
};
use crate::retry::{with_retry, RetryPolicy};
use crate::store::{GameStore, StoreError, Versioned};
use gotg_engine::board::{Board, Position};
use gotg_engine::errors::GameError;
use gotg_engine::game::{Game, GameEndReason, GameId, GameStatus, Seat, Seating, DEFAULT_TIME_BUDGET_MS};
use gotg_engine::logger::{GameLogger, GameRecord, MoveRecord};
use gotg_engine::moves::make_move;
use gotg_engine::pieces::Side;
use gotg_engine::replay::{combat_stats, replay_board, CombatStats};
use gotg_engine::setup::{commit_setup, Placement, SetupOutcome};
use gotg_engine::timer::{check_timeout, TimeoutCheck};
use gotg_engine::view::{move_view, view_for, viewer_for, GameView, MoveView};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Missing player identity")]
    Unauthenticated,
    #[error(transparent)]
    Game(#[from] GameError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{operation} abandoned after {attempts} conflicting attempts")]
    RetriesExhausted {
        operation: &'static str,
        attempts: usize,
    },
}

impl ServiceError {
    pub fn is_write_conflict(&self) -> bool {
        matches!(self, ServiceError::Store(err) if err.is_write_conflict())
    }

    fn game_not_found(game_id: &str) -> Self {
        ServiceError::Game(GameError::NotFound(format!("game {game_id}")))
    }
}

impl IntoErrorResponse for ServiceError {
    fn status_code(&self) -> warp::http::StatusCode {
        use warp::http::StatusCode;
        match self {
            ServiceError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ServiceError::Game(err) => match err {
                GameError::NotAParticipant { .. } => StatusCode::FORBIDDEN,
                GameError::InvalidState(_) => StatusCode::CONFLICT,
                GameError::NotYourTurn { .. } => StatusCode::CONFLICT,
                GameError::IllegalMove { .. } => StatusCode::BAD_REQUEST,
                GameError::InvalidSetup(_) => StatusCode::BAD_REQUEST,
                GameError::NotFound(_) => StatusCode::NOT_FOUND,
                GameError::ReplayDiverged { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServiceError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ServiceError::Store(StoreError::Conflict { .. })
            | ServiceError::Store(StoreError::LobbyTaken { .. }) => StatusCode::CONFLICT,
            ServiceError::Store(StoreError::StoragePoisoned) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::RetriesExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ServiceError::Unauthenticated => "unauthenticated",
            ServiceError::Game(err) => match err {
                GameError::NotAParticipant { .. } => "not_a_participant",
                GameError::InvalidState(_) => "invalid_state",
                GameError::NotYourTurn { .. } => "not_your_turn",
                GameError::IllegalMove { .. } => "illegal_move",
                GameError::InvalidSetup(_) => "invalid_setup",
                GameError::NotFound(_) => "game_not_found",
                GameError::ReplayDiverged { .. } => "replay_diverged",
            },
            ServiceError::Store(StoreError::NotFound(_)) => "game_not_found",
            ServiceError::Store(StoreError::Conflict { .. })
            | ServiceError::Store(StoreError::LobbyTaken { .. }) => "write_conflict",
            ServiceError::Store(StoreError::StoragePoisoned) => "storage_error",
            ServiceError::RetriesExhausted { .. } => "retries_exhausted",
        }
    }

    fn error_message(&self) -> String {
        self.to_string()
    }

    fn error_details(&self) -> Option<serde_json::Value> {
        match self {
            ServiceError::Game(GameError::IllegalMove { from, to, reason }) => {
                Some(serde_json::json!({
                    "from": from,
                    "to": to,
                    "reason": reason.to_string(),
                }))
            }
            ServiceError::RetriesExhausted { attempts, .. } => {
                Some(serde_json::json!({ "attempts": attempts }))
            }
            _ => None,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            ServiceError::Store(StoreError::StoragePoisoned)
            | ServiceError::Game(GameError::ReplayDiverged { .. }) => ErrorSeverity::Critical,
            ServiceError::RetriesExhausted { .. } => ErrorSeverity::Server,
            _ => ErrorSeverity::Client,
        }
    }
}

/// Result of `start_game`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartedGame {
    pub game_id: GameId,
    /// False when the lobby already had a game
    pub created: bool,
}

/// Result of an explicit termination call (surrender, timeout, forfeit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Termination {
    pub winner: Option<Side>,
    pub reason: Option<GameEndReason>,
    /// This call finished the game
    pub transitioned: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerResult {
    pub seat: Seat,
    pub side: Side,
    pub outcome: MatchOutcome,
    pub time_used_ms: i64,
    pub combat: CombatStats,
    pub acknowledged: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub game_id: GameId,
    pub winner: Side,
    pub winner_id: String,
    pub reason: GameEndReason,
    pub duration_ms: i64,
    pub move_count: u32,
    pub finished_at: Option<i64>,
    pub player1: PlayerResult,
    pub player2: PlayerResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameReplay {
    pub game_id: GameId,
    pub initial_board: Board,
    /// Moves up to the requested limit
    pub moves: Vec<MoveRecord>,
    /// Board after `moves` were re-applied
    pub board: Board,
    pub total_moves: usize,
}

/// What a committed transaction hands back.
struct Committed<T> {
    value: T,
    game: Game,
    finished_now: bool,
}

#[derive(Debug)]
pub struct GameService {
    store: Arc<dyn GameStore>,
    events: Arc<EventBus>,
    hooks: Arc<dyn PostGameHooks>,
    presence: Arc<dyn PresenceRooms>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    time_budget_ms: i64,
    archive: Option<Mutex<GameLogger>>,
}

impl GameService {
    pub fn new(store: Arc<dyn GameStore>, events: Arc<EventBus>) -> Self {
        Self {
            store,
            events,
            hooks: Arc::new(NoopHooks),
            presence: Arc::new(NoopPresence),
            clock: Arc::new(SystemClock),
            retry: RetryPolicy::default(),
            time_budget_ms: DEFAULT_TIME_BUDGET_MS,
            archive: None,
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn PostGameHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_presence(mut self, presence: Arc<dyn PresenceRooms>) -> Self {
        self.presence = presence;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_time_budget_ms(mut self, time_budget_ms: i64) -> Self {
        self.time_budget_ms = time_budget_ms;
        self
    }

    pub fn with_archive(mut self, logger: GameLogger) -> Self {
        self.archive = Some(Mutex::new(logger));
        self
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }

    /// Creates the game for a lobby, or returns the one it already has.
    pub async fn start_game(&self, seating: Seating) -> Result<StartedGame, ServiceError> {
        if seating.player1.id.is_empty() || seating.player2.id.is_empty() {
            return Err(GameError::InvalidState("both seats must be filled".into()).into());
        }
        if seating.player1.id == seating.player2.id {
            return Err(
                GameError::InvalidState("a player cannot take both seats".into()).into(),
            );
        }

        let started = with_retry(&self.retry, "start_game", || {
            if let Some(existing) = self.store.find_by_lobby(&seating.lobby_id)? {
                return Ok(StartedGame {
                    game_id: existing.game.id().clone(),
                    created: false,
                });
            }
            let id = Uuid::new_v4().to_string();
            let game = Game::new(id, seating.clone(), self.time_budget_ms, self.clock.now_ms());
            let stored = self.store.insert(game)?;
            Ok(StartedGame {
                game_id: stored.game.id().clone(),
                created: true,
            })
        })
        .await?;

        if started.created {
            tracing::info!(
                game_id = %started.game_id,
                lobby_id = %seating.lobby_id,
                player1 = %seating.player1.id,
                player2 = %seating.player2.id,
                rating_eligible = seating.rating_eligible,
                "game created"
            );
            self.events.broadcast(
                &started.game_id,
                GameEvent::GameCreated {
                    game_id: started.game_id.clone(),
                    lobby_id: seating.lobby_id.clone(),
                },
            );
        } else {
            tracing::debug!(
                game_id = %started.game_id,
                lobby_id = %seating.lobby_id,
                "lobby already has a game"
            );
        }
        Ok(started)
    }

    /// Viewer-scoped read. `Ok(None)` for viewers with no relation to the
    /// game, so they cannot tell it exists.
    pub fn get_game(&self, game_id: &str, viewer_id: &str) -> Result<Option<GameView>, ServiceError> {
        let Some(Versioned { game, .. }) = self.store.load(game_id)? else {
            return Ok(None);
        };
        Ok(viewer_for(&game, viewer_id).map(|viewer| view_for(&game, viewer)))
    }

    pub async fn setup_pieces(
        &self,
        game_id: &str,
        player_id: &str,
        placements: Vec<Placement>,
    ) -> Result<SetupOutcome, ServiceError> {
        let committed = self
            .transact("setup_pieces", game_id, |game, now| {
                commit_setup(game, player_id, &placements, now)
            })
            .await?;
        let outcome = committed.value;

        tracing::info!(
            game_id = %game_id,
            player_id = %player_id,
            side = ?outcome.side,
            started = outcome.started,
            "setup committed"
        );
        self.events.broadcast(
            game_id,
            GameEvent::SetupCommitted {
                game_id: game_id.to_string(),
                side: outcome.side,
            },
        );
        if outcome.started {
            self.events.broadcast(
                game_id,
                GameEvent::GameStarted {
                    game_id: game_id.to_string(),
                    current_turn: committed.game.current_turn(),
                },
            );
        }
        Ok(outcome)
    }

    /// Applies a move for `player_id`. The full record stays in the game log;
    /// the caller gets the mover's projection of it.
    pub async fn make_move(
        &self,
        game_id: &str,
        player_id: &str,
        from: Position,
        to: Position,
    ) -> Result<MoveView, ServiceError> {
        let committed = self
            .transact("make_move", game_id, |game, now| {
                make_move(game, player_id, from, to, now)
            })
            .await?;
        let outcome = &committed.value;

        tracing::debug!(
            game_id = %game_id,
            player_id = %player_id,
            from = %from,
            to = %to,
            move_type = ?outcome.record.move_type,
            elapsed_ms = outcome.elapsed_ms,
            "move applied"
        );
        self.events.broadcast(
            game_id,
            GameEvent::move_made(game_id, &outcome.record, outcome.next_turn),
        );
        if committed.finished_now {
            self.conclude(&committed.game);
        }
        Ok(move_view(outcome))
    }

    /// The caller resigns; allowed during setup and play.
    pub async fn surrender_game(
        &self,
        game_id: &str,
        player_id: &str,
    ) -> Result<Termination, ServiceError> {
        let committed = self
            .transact("surrender_game", game_id, |game, now| {
                let side = game.require_side(player_id)?;
                if game.is_finished() {
                    return Err(GameError::InvalidState("game already finished".into()));
                }
                game.finish(side.opponent(), GameEndReason::Surrender, now)
            })
            .await?;
        Ok(self.after_termination("surrender_game", player_id, committed))
    }

    /// The caller reports that its own clock ran out.
    pub async fn timeout_game(
        &self,
        game_id: &str,
        player_id: &str,
    ) -> Result<Termination, ServiceError> {
        let committed = self
            .transact("timeout_game", game_id, |game, now| {
                let side = game.require_side(player_id)?;
                if game.is_finished() {
                    return Err(GameError::InvalidState("game already finished".into()));
                }
                if game.status() != GameStatus::Playing || game.current_turn() != side {
                    return Err(GameError::InvalidState(
                        "only the player on the clock can run out of time".into(),
                    ));
                }
                game.finish(side.opponent(), GameEndReason::Timeout, now)
            })
            .await?;
        Ok(self.after_termination("timeout_game", player_id, committed))
    }

    /// Evaluates the clock of whoever is to move. Safe to call from both
    /// clients at once; at most one call finishes the game.
    pub async fn check_opponent_timeout(
        &self,
        game_id: &str,
        player_id: &str,
    ) -> Result<TimeoutCheck, ServiceError> {
        let committed = self
            .transact("check_opponent_timeout", game_id, |game, now| {
                game.require_side(player_id)?;
                check_timeout(game, now)
            })
            .await?;
        if committed.finished_now {
            tracing::info!(
                game_id = %game_id,
                checked_by = %player_id,
                loser = ?committed.value.side,
                "game finished on time"
            );
            self.conclude(&committed.game);
        }
        Ok(committed.value)
    }

    /// Disconnection-driven loss for `player_id`, invoked by an external
    /// sweep. Idempotent: a game that already ended is reported unchanged.
    pub async fn forfeit_game(
        &self,
        game_id: &str,
        player_id: &str,
        reason: GameEndReason,
    ) -> Result<Termination, ServiceError> {
        if !matches!(reason, GameEndReason::Surrender | GameEndReason::Timeout) {
            return Err(GameError::InvalidState(format!(
                "forfeit reason must be surrender or timeout, got {reason:?}"
            ))
            .into());
        }
        let committed = self
            .transact("forfeit_game", game_id, |game, now| {
                let side = game.require_side(player_id)?;
                if game.is_finished() {
                    return Ok(());
                }
                game.finish(side.opponent(), reason, now)
            })
            .await?;
        Ok(self.after_termination("forfeit_game", player_id, committed))
    }

    /// Sets the caller's post-game acknowledgment. Returns whether it changed.
    pub async fn acknowledge_game_result(
        &self,
        game_id: &str,
        player_id: &str,
    ) -> Result<bool, ServiceError> {
        let committed = self
            .transact("acknowledge_game_result", game_id, |game, _| {
                game.acknowledge(player_id)
            })
            .await?;
        Ok(committed.value)
    }

    pub fn get_match_result(&self, game_id: &str, viewer_id: &str) -> Result<MatchResult, ServiceError> {
        let game = self.finished_game_for(game_id, viewer_id)?;
        let (Some(winner), Some(reason)) = (game.winner(), game.end_reason()) else {
            return Err(GameError::InvalidState("finished game has no result".into()).into());
        };
        let player = |side: Side| PlayerResult {
            seat: game.seat(side).clone(),
            side,
            outcome: if side == winner {
                MatchOutcome::Win
            } else {
                MatchOutcome::Loss
            },
            time_used_ms: game.time_used(side),
            combat: combat_stats(game.moves(), side),
            acknowledged: game.acknowledged(side),
        };
        Ok(MatchResult {
            game_id: game.id().clone(),
            winner,
            winner_id: game.seat(winner).id.clone(),
            reason,
            duration_ms: game.duration_ms(self.clock.now_ms()),
            move_count: game.move_count(),
            finished_at: game.finished_at(),
            player1: player(Side::Player1),
            player2: player(Side::Player2),
        })
    }

    /// Rebuilds the board after the first `move_limit` moves (all when
    /// `None`) of a finished game.
    pub fn get_game_replay(
        &self,
        game_id: &str,
        viewer_id: &str,
        move_limit: Option<usize>,
    ) -> Result<GameReplay, ServiceError> {
        let game = self.finished_game_for(game_id, viewer_id)?;
        let Some(initial) = game.initial_setup_board() else {
            return Err(
                GameError::InvalidState("game ended before both setups were committed".into())
                    .into(),
            );
        };
        let total_moves = game.moves().len();
        let shown = move_limit.unwrap_or(total_moves).min(total_moves);
        let board = replay_board(initial, game.moves(), Some(shown))?;
        Ok(GameReplay {
            game_id: game.id().clone(),
            initial_board: initial.clone(),
            moves: game.moves()[..shown].to_vec(),
            board,
            total_moves,
        })
    }

    fn finished_game_for(&self, game_id: &str, viewer_id: &str) -> Result<Game, ServiceError> {
        let game = self
            .store
            .load(game_id)?
            .map(|v| v.game)
            .filter(|g| viewer_for(g, viewer_id).is_some())
            .ok_or_else(|| ServiceError::game_not_found(game_id))?;
        if !game.is_finished() {
            return Err(GameError::InvalidState("game is still in progress".into()).into());
        }
        Ok(game)
    }

    /// One optimistic read-modify-write. Rejections from `apply` leave the
    /// stored game untouched; unchanged documents are not written back.
    async fn transact<T, F>(
        &self,
        operation: &'static str,
        game_id: &str,
        mut apply: F,
    ) -> Result<Committed<T>, ServiceError>
    where
        F: FnMut(&mut Game, i64) -> Result<T, GameError>,
    {
        with_retry(&self.retry, operation, || {
            let Versioned { version, game } = self
                .store
                .load(game_id)?
                .ok_or_else(|| ServiceError::game_not_found(game_id))?;
            let mut working = game.clone();
            let value = apply(&mut working, self.clock.now_ms())?;
            if working != game {
                self.store.commit(game_id, version, working.clone())?;
            }
            Ok(Committed {
                value,
                finished_now: !game.is_finished() && working.is_finished(),
                game: working,
            })
        })
        .await
    }

    fn after_termination(
        &self,
        operation: &'static str,
        player_id: &str,
        committed: Committed<()>,
    ) -> Termination {
        let game = &committed.game;
        if committed.finished_now {
            tracing::info!(
                game_id = %game.id(),
                player_id = %player_id,
                operation,
                reason = ?game.end_reason(),
                "game terminated"
            );
            self.conclude(game);
        }
        Termination {
            winner: game.winner(),
            reason: game.end_reason(),
            transitioned: committed.finished_now,
        }
    }

    /// Post-game sequence. Collaborator failures are logged; the game result
    /// is already committed and is not rolled back.
    fn conclude(&self, game: &Game) {
        let (Some(winner), Some(reason)) = (game.winner(), game.end_reason()) else {
            tracing::error!(game_id = %game.id(), "finished game without a result");
            return;
        };
        let game_id = game.id();
        let duration_ms = game.duration_ms(self.clock.now_ms());

        for side in [Side::Player1, Side::Player2] {
            let update = StatUpdate {
                game_id: game_id.clone(),
                player_id: game.seat(side).id.clone(),
                outcome: if side == winner {
                    MatchOutcome::Win
                } else {
                    MatchOutcome::Loss
                },
                reason,
                duration_ms,
                combat: combat_stats(game.moves(), side),
            };
            if let Err(err) = self.hooks.record_stats(&update) {
                tracing::warn!(game_id = %game_id, player_id = %update.player_id, error = %err, "stat update failed");
            }
        }

        if game.rating_eligible() {
            let update = RatingUpdate {
                game_id: game_id.clone(),
                winner_id: game.seat(winner).id.clone(),
                loser_id: game.seat(winner.opponent()).id.clone(),
            };
            if let Err(err) = self.hooks.update_ratings(&update) {
                tracing::warn!(game_id = %game_id, error = %err, "rating update failed");
            }
        }

        for side in [Side::Player1, Side::Player2] {
            let player_id = &game.seat(side).id;
            if let Err(err) = self.hooks.evaluate_achievements(player_id, game_id) {
                tracing::warn!(game_id = %game_id, player_id = %player_id, error = %err, "achievement evaluation failed");
            }
        }

        if let Err(err) = self.presence.close_room(game_id) {
            tracing::warn!(game_id = %game_id, error = %err, "presence teardown failed");
        }

        if let Some(archive) = &self.archive {
            let written = archive
                .lock()
                .map_err(|_| std::io::Error::other("archive lock poisoned"))
                .and_then(|mut logger| logger.write(&GameRecord::from_game(game)));
            if let Err(err) = written {
                tracing::error!(game_id = %game_id, error = %err, "failed to archive game");
            }
        }

        tracing::info!(
            game_id = %game_id,
            winner = ?winner,
            reason = ?reason,
            duration_ms,
            move_count = game.move_count(),
            "game concluded"
        );
        self.events.broadcast(
            game_id,
            GameEvent::GameEnded {
                game_id: game_id.clone(),
                winner: Some(winner),
                reason: Some(reason),
            },
        );
        self.events.drop_game(game_id);
    }
}
