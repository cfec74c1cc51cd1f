//! Move-by-move reconstruction from the concealed setup snapshot, and the
//! per-side combat counters derived from the same log.

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::combat::Outcome;
use crate::errors::GameError;
use crate::logger::MoveRecord;
use crate::moves::{apply_step, StepResult};
use crate::pieces::{Rank, Side};

/// Re-applies logged moves with the live reveal/removal rules.
#[derive(Debug, Clone)]
pub struct Replayer {
    board: Board,
    applied: usize,
}

impl Replayer {
    pub fn new(initial: &Board) -> Self {
        Self {
            board: initial.clone(),
            applied: 0,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn applied(&self) -> usize {
        self.applied
    }

    /// Applies one record and checks the recorded outcome against what the
    /// board actually produced.
    pub fn apply(&mut self, record: &MoveRecord) -> Result<StepResult, GameError> {
        let index = self.applied;
        let step = apply_step(&mut self.board, record.mover, record.from, record.to).map_err(
            |reason| GameError::ReplayDiverged {
                index,
                detail: reason.to_string(),
            },
        )?;
        if step.piece != record.piece || step.challenge != record.challenge_result {
            return Err(GameError::ReplayDiverged {
                index,
                detail: format!(
                    "recorded {:?}/{:?}, replayed {:?}/{:?}",
                    record.piece, record.challenge_result, step.piece, step.challenge
                ),
            });
        }
        self.applied += 1;
        Ok(step)
    }
}

/// Board after the first `limit` moves (all moves when `None`).
pub fn replay_board(
    initial: &Board,
    moves: &[MoveRecord],
    limit: Option<usize>,
) -> Result<Board, GameError> {
    let take = limit.unwrap_or(moves.len()).min(moves.len());
    let mut replayer = Replayer::new(initial);
    for record in &moves[..take] {
        replayer.apply(record)?;
    }
    Ok(replayer.board)
}

/// Combat counters for one side, derived from the move log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatStats {
    pub moves: u32,
    pub challenges_initiated: u32,
    pub challenges_won: u32,
    pub challenges_lost: u32,
    pub challenges_tied: u32,
    pub defenses_held: u32,
    pub pieces_captured: u32,
    pub pieces_lost: u32,
    pub flag_captured: bool,
}

pub fn combat_stats(moves: &[MoveRecord], side: Side) -> CombatStats {
    let mut stats = CombatStats::default();
    for record in moves {
        let attacking = record.mover == side;
        if attacking {
            stats.moves += 1;
        }
        let Some(result) = record.challenge_result else {
            continue;
        };
        match (attacking, result.winner) {
            (true, Outcome::Attacker) => {
                stats.challenges_initiated += 1;
                stats.challenges_won += 1;
                stats.pieces_captured += 1;
                if result.defender == Rank::Flag {
                    stats.flag_captured = true;
                }
            }
            (true, Outcome::Defender) => {
                stats.challenges_initiated += 1;
                stats.challenges_lost += 1;
                stats.pieces_lost += 1;
            }
            (true, Outcome::Tie) => {
                stats.challenges_initiated += 1;
                stats.challenges_tied += 1;
                stats.pieces_captured += 1;
                stats.pieces_lost += 1;
            }
            (false, Outcome::Attacker) => {
                stats.pieces_lost += 1;
            }
            (false, Outcome::Defender) => {
                stats.defenses_held += 1;
                stats.pieces_captured += 1;
                if result.attacker == Rank::Flag {
                    stats.flag_captured = true;
                }
            }
            (false, Outcome::Tie) => {
                stats.pieces_captured += 1;
                stats.pieces_lost += 1;
            }
        }
    }
    stats
}
