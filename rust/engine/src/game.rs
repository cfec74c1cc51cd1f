use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::errors::GameError;
use crate::logger::MoveRecord;
use crate::pieces::Side;

pub type GameId = String;

/// Default per-side thinking budget: 15 minutes.
pub const DEFAULT_TIME_BUDGET_MS: i64 = 15 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Setup,
    Playing,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameEndReason {
    FlagCaptured,
    FlagReachedBase,
    Timeout,
    Surrender,
    Elimination,
}

/// A seated player's identity as handed over by the lobby.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub id: String,
    pub name: String,
}

impl Seat {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Everything the lobby contributes when a game is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seating {
    pub lobby_id: String,
    pub player1: Seat,
    pub player2: Seat,
    #[serde(default)]
    pub spectators: Vec<String>,
    #[serde(default)]
    pub rating_eligible: bool,
}

/// The shared game document.
///
/// Setup and move resolution mutate it through the crate's rule modules;
/// once `status` is [`GameStatus::Finished`] only the acknowledgment flags
/// may still change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    id: GameId,
    lobby_id: String,
    player1: Seat,
    player2: Seat,
    spectators: Vec<String>,
    rating_eligible: bool,
    pub(crate) board: Board,
    pub(crate) status: GameStatus,
    pub(crate) current_turn: Side,
    pub(crate) winner: Option<Side>,
    pub(crate) game_end_reason: Option<GameEndReason>,
    pub(crate) player1_setup: bool,
    pub(crate) player2_setup: bool,
    pub(crate) player1_time_used: i64,
    pub(crate) player2_time_used: i64,
    time_budget_ms: i64,
    pub(crate) last_move_time: Option<i64>,
    pub(crate) game_time_started: Option<i64>,
    created_at: i64,
    pub(crate) finished_at: Option<i64>,
    pub(crate) initial_setup_board: Option<Board>,
    pub(crate) moves: Vec<MoveRecord>,
    pub(crate) move_count: u32,
    player1_acknowledged: bool,
    player2_acknowledged: bool,
}

impl Game {
    pub fn new(id: GameId, seating: Seating, time_budget_ms: i64, now: i64) -> Self {
        Self {
            id,
            lobby_id: seating.lobby_id,
            player1: seating.player1,
            player2: seating.player2,
            spectators: seating.spectators,
            rating_eligible: seating.rating_eligible,
            board: Board::empty(),
            status: GameStatus::Setup,
            current_turn: Side::Player1,
            winner: None,
            game_end_reason: None,
            player1_setup: false,
            player2_setup: false,
            player1_time_used: 0,
            player2_time_used: 0,
            time_budget_ms,
            last_move_time: None,
            game_time_started: None,
            created_at: now,
            finished_at: None,
            initial_setup_board: None,
            moves: Vec::new(),
            move_count: 0,
            player1_acknowledged: false,
            player2_acknowledged: false,
        }
    }

    pub fn id(&self) -> &GameId {
        &self.id
    }
    pub fn lobby_id(&self) -> &str {
        &self.lobby_id
    }
    pub fn board(&self) -> &Board {
        &self.board
    }
    pub fn status(&self) -> GameStatus {
        self.status
    }
    pub fn is_finished(&self) -> bool {
        self.status == GameStatus::Finished
    }
    pub fn current_turn(&self) -> Side {
        self.current_turn
    }
    pub fn winner(&self) -> Option<Side> {
        self.winner
    }
    pub fn end_reason(&self) -> Option<GameEndReason> {
        self.game_end_reason
    }
    pub fn rating_eligible(&self) -> bool {
        self.rating_eligible
    }
    pub fn spectators(&self) -> &[String] {
        &self.spectators
    }
    pub fn time_budget_ms(&self) -> i64 {
        self.time_budget_ms
    }
    pub fn last_move_time(&self) -> Option<i64> {
        self.last_move_time
    }
    pub fn game_time_started(&self) -> Option<i64> {
        self.game_time_started
    }
    pub fn created_at(&self) -> i64 {
        self.created_at
    }
    pub fn finished_at(&self) -> Option<i64> {
        self.finished_at
    }
    pub fn initial_setup_board(&self) -> Option<&Board> {
        self.initial_setup_board.as_ref()
    }
    pub fn moves(&self) -> &[MoveRecord] {
        &self.moves
    }
    pub fn move_count(&self) -> u32 {
        self.move_count
    }

    pub fn seat(&self, side: Side) -> &Seat {
        match side {
            Side::Player1 => &self.player1,
            Side::Player2 => &self.player2,
        }
    }

    pub fn setup_done(&self, side: Side) -> bool {
        match side {
            Side::Player1 => self.player1_setup,
            Side::Player2 => self.player2_setup,
        }
    }

    pub(crate) fn mark_setup_done(&mut self, side: Side) {
        match side {
            Side::Player1 => self.player1_setup = true,
            Side::Player2 => self.player2_setup = true,
        }
    }

    pub fn time_used(&self, side: Side) -> i64 {
        match side {
            Side::Player1 => self.player1_time_used,
            Side::Player2 => self.player2_time_used,
        }
    }

    pub(crate) fn add_time_used(&mut self, side: Side, ms: i64) {
        match side {
            Side::Player1 => self.player1_time_used += ms,
            Side::Player2 => self.player2_time_used += ms,
        }
    }

    pub fn acknowledged(&self, side: Side) -> bool {
        match side {
            Side::Player1 => self.player1_acknowledged,
            Side::Player2 => self.player2_acknowledged,
        }
    }

    /// Seat occupied by `player_id`, if any.
    pub fn side_of(&self, player_id: &str) -> Option<Side> {
        if self.player1.id == player_id {
            Some(Side::Player1)
        } else if self.player2.id == player_id {
            Some(Side::Player2)
        } else {
            None
        }
    }

    pub fn require_side(&self, player_id: &str) -> Result<Side, GameError> {
        self.side_of(player_id)
            .ok_or_else(|| GameError::NotAParticipant {
                player_id: player_id.to_string(),
            })
    }

    pub fn is_spectator(&self, player_id: &str) -> bool {
        self.spectators.iter().any(|s| s == player_id)
    }

    /// Milliseconds between the start of play and the end (or `now`).
    pub fn duration_ms(&self, now: i64) -> i64 {
        match self.game_time_started {
            Some(start) => (self.finished_at.unwrap_or(now) - start).max(0),
            None => 0,
        }
    }

    /// Single entry point for every terminal transition. Fails if the game
    /// has already finished so two racing termination paths cannot both win.
    pub fn finish(
        &mut self,
        winner: Side,
        reason: GameEndReason,
        now: i64,
    ) -> Result<(), GameError> {
        if self.is_finished() {
            return Err(GameError::InvalidState("game already finished".into()));
        }
        self.status = GameStatus::Finished;
        self.winner = Some(winner);
        self.game_end_reason = Some(reason);
        self.finished_at = Some(now);
        Ok(())
    }

    /// Records that `player_id` has seen the result. Returns whether the flag
    /// changed.
    pub fn acknowledge(&mut self, player_id: &str) -> Result<bool, GameError> {
        let side = self.require_side(player_id)?;
        if !self.is_finished() {
            return Err(GameError::InvalidState(
                "result can only be acknowledged after the game finishes".into(),
            ));
        }
        let flag = match side {
            Side::Player1 => &mut self.player1_acknowledged,
            Side::Player2 => &mut self.player2_acknowledged,
        };
        let changed = !*flag;
        *flag = true;
        Ok(changed)
    }

    pub(crate) fn ensure_playing(&self) -> Result<(), GameError> {
        match self.status {
            GameStatus::Playing => Ok(()),
            other => Err(GameError::InvalidState(format!(
                "game is {other:?}, expected Playing"
            ))),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn seating() -> Seating {
        Seating {
            lobby_id: "lobby-1".into(),
            player1: Seat::new("alice", "Alice"),
            player2: Seat::new("bob", "Bob"),
            spectators: vec!["carol".into()],
            rating_eligible: true,
        }
    }

    pub fn new_game() -> Game {
        Game::new("g-1".into(), seating(), DEFAULT_TIME_BUDGET_MS, 1_000)
    }

    /// A game already in play with the given pieces and no setup history.
    pub fn playing_with(board: Board, now: i64) -> Game {
        let mut game = new_game();
        game.initial_setup_board = Some(board.concealed());
        game.board = board;
        game.player1_setup = true;
        game.player2_setup = true;
        game.status = GameStatus::Playing;
        game.game_time_started = Some(now);
        game
    }
}
