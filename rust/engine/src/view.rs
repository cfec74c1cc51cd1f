use serde::{Deserialize, Serialize};

use crate::board::{Board, Cell, Position, COLS, ROWS};
use crate::combat::Outcome;
use crate::game::{Game, GameEndReason, GameId, GameStatus, Seat};
use crate::logger::MoveType;
use crate::moves::MoveOutcome;
use crate::pieces::{Rank, Side};
use crate::termination::Verdict;

/// Who is looking at the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Viewer {
    Seated(Side),
    Spectator,
}

/// A square as a particular viewer sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViewCell {
    Empty,
    Hidden { side: Side },
    Piece { rank: Rank, side: Side, revealed: bool },
}

impl ViewCell {
    fn visible(cell: &Cell) -> Self {
        ViewCell::Piece {
            rank: cell.rank,
            side: cell.side,
            revealed: cell.revealed,
        }
    }
}

/// Viewer-scoped projection of a game document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameView {
    pub game_id: GameId,
    pub viewer: Viewer,
    pub masked: bool,
    pub status: GameStatus,
    pub current_turn: Side,
    pub winner: Option<Side>,
    pub game_end_reason: Option<GameEndReason>,
    pub player1: Seat,
    pub player2: Seat,
    pub player1_setup: bool,
    pub player2_setup: bool,
    pub player1_time_used: i64,
    pub player2_time_used: i64,
    pub time_budget_ms: i64,
    pub last_move_time: Option<i64>,
    pub game_time_started: Option<i64>,
    pub move_count: u32,
    pub board: Vec<Vec<ViewCell>>,
}

/// Masks `board` for `viewer`. Spectators and finished games see all.
pub fn mask_board(board: &Board, viewer: Viewer, finished: bool) -> (Vec<Vec<ViewCell>>, bool) {
    let own = match viewer {
        Viewer::Seated(side) if !finished => Some(side),
        _ => None,
    };
    let mut rows = Vec::with_capacity(ROWS);
    for row in board.rows() {
        let mut cells = Vec::with_capacity(COLS);
        for cell in row {
            cells.push(match (cell, own) {
                (None, _) => ViewCell::Empty,
                (Some(c), Some(side)) if c.side != side && !c.revealed => {
                    ViewCell::Hidden { side: c.side }
                }
                (Some(c), _) => ViewCell::visible(c),
            });
        }
        rows.push(cells);
    }
    (rows, own.is_some())
}

pub fn view_for(game: &Game, viewer: Viewer) -> GameView {
    let (board, masked) = mask_board(game.board(), viewer, game.is_finished());
    GameView {
        game_id: game.id().clone(),
        viewer,
        masked,
        status: game.status(),
        current_turn: game.current_turn(),
        winner: game.winner(),
        game_end_reason: game.end_reason(),
        player1: game.seat(Side::Player1).clone(),
        player2: game.seat(Side::Player2).clone(),
        player1_setup: game.setup_done(Side::Player1),
        player2_setup: game.setup_done(Side::Player2),
        player1_time_used: game.time_used(Side::Player1),
        player2_time_used: game.time_used(Side::Player2),
        time_budget_ms: game.time_budget_ms(),
        last_move_time: game.last_move_time(),
        game_time_started: game.game_time_started(),
        move_count: game.move_count(),
        board,
    }
}

/// A challenge as the attacker is allowed to see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeView {
    pub attacker: Rank,
    /// Withheld when the defender survived
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defender: Option<Rank>,
    pub winner: Outcome,
}

/// What the mover is told about a move they just made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveView {
    pub from: Position,
    pub to: Position,
    pub mover: Side,
    pub move_type: MoveType,
    pub piece: Rank,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<ChallengeView>,
    pub elapsed_ms: i64,
    pub next_turn: Side,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
}

/// Projects an applied move for its mover. A defender that held its square
/// stays anonymous, same as on the masked board.
pub fn move_view(outcome: &MoveOutcome) -> MoveView {
    let record = &outcome.record;
    let challenge = record.challenge_result.map(|result| ChallengeView {
        attacker: result.attacker,
        defender: match result.winner {
            Outcome::Defender => None,
            Outcome::Attacker | Outcome::Tie => Some(result.defender),
        },
        winner: result.winner,
    });
    MoveView {
        from: record.from,
        to: record.to,
        mover: record.mover,
        move_type: record.move_type,
        piece: record.piece,
        challenge,
        elapsed_ms: outcome.elapsed_ms,
        next_turn: outcome.next_turn,
        verdict: outcome.verdict,
    }
}

/// Resolves `viewer_id` against the game. Unrelated viewers get `None`.
pub fn viewer_for(game: &Game, viewer_id: &str) -> Option<Viewer> {
    if let Some(side) = game.side_of(viewer_id) {
        Some(Viewer::Seated(side))
    } else if game.is_spectator(viewer_id) {
        Some(Viewer::Spectator)
    } else {
        None
    }
}
