//! Win-condition detection run after every legal move.
//!
//! Order: own Flag reaching base (immediate side only), Flag captured or
//! lost in a challenge, the deferred base check, then elimination.

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::combat::Outcome;
use crate::game::GameEndReason;
use crate::logger::{MoveRecord, MoveType};
use crate::pieces::{Rank, Side};

/// How a Flag arriving on the opponent's back row is scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseArrival {
    /// Wins on the arriving move.
    Immediate,
    /// Wins only if the Flag is still there after the opponent's reply.
    Deferred,
}

/// Player1's Flag gets the one-ply delay; Player2's scores at once.
pub fn base_arrival(side: Side) -> BaseArrival {
    match side {
        Side::Player1 => BaseArrival::Deferred,
        Side::Player2 => BaseArrival::Immediate,
    }
}

/// A decided game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub winner: Side,
    pub reason: GameEndReason,
}

/// Evaluates the board after `record` was applied and the turn passed to
/// `next_to_move`.
pub fn after_move(board: &Board, record: &MoveRecord, next_to_move: Side) -> Option<Verdict> {
    let mover = record.mover;

    // 1. Immediate base arrival.
    if record.move_type == MoveType::Move
        && record.piece == Rank::Flag
        && record.to.row == mover.target_row() as i8
        && base_arrival(mover) == BaseArrival::Immediate
    {
        return Some(Verdict {
            winner: mover,
            reason: GameEndReason::FlagReachedBase,
        });
    }

    // 2. A Flag lost in a challenge, as defender or as attacker.
    if let Some(result) = record.challenge_result {
        if result.defender == Rank::Flag && result.winner == Outcome::Attacker {
            return Some(Verdict {
                winner: mover,
                reason: GameEndReason::FlagCaptured,
            });
        }
        if result.attacker == Rank::Flag && result.winner != Outcome::Attacker {
            return Some(Verdict {
                winner: mover.opponent(),
                reason: GameEndReason::FlagCaptured,
            });
        }
    }

    // 3. Deferred base arrival, checked when the turn comes back to a side
    //    whose Flag uses the delayed rule.
    if base_arrival(next_to_move) == BaseArrival::Deferred {
        if let Some(flag) = board.flag_of(next_to_move) {
            if flag.row == next_to_move.target_row() as i8 {
                return Some(Verdict {
                    winner: next_to_move,
                    reason: GameEndReason::FlagReachedBase,
                });
            }
        }
    }

    // 4. The side to move has nothing it can legally do.
    if !has_legal_move(board, next_to_move) {
        return Some(Verdict {
            winner: next_to_move.opponent(),
            reason: GameEndReason::Elimination,
        });
    }

    None
}

/// True when at least one piece of `side` can step onto an empty or enemy
/// square.
pub fn has_legal_move(board: &Board, side: Side) -> bool {
    board
        .occupied()
        .filter(|(_, c)| c.side == side)
        .any(|(pos, _)| {
            pos.neighbors()
                .any(|n| board.get(n).map_or(true, |c| c.side != side))
        })
}
