use thiserror::Error;

use crate::board::Position;

/// Why a move request was refused by the move resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IllegalMoveReason {
    OutOfBounds,
    EmptyOrigin,
    NotYourPiece,
    NotAdjacent,
    OwnPieceAtDestination,
}

impl std::fmt::Display for IllegalMoveReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            IllegalMoveReason::OutOfBounds => "coordinates out of bounds",
            IllegalMoveReason::EmptyOrigin => "no piece at origin",
            IllegalMoveReason::NotYourPiece => "origin piece belongs to the opponent",
            IllegalMoveReason::NotAdjacent => "destination is not one orthogonal step away",
            IllegalMoveReason::OwnPieceAtDestination => "destination holds your own piece",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Player {player_id} is not seated in this game")]
    NotAParticipant { player_id: String },
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("It's not {player_id}'s turn")]
    NotYourTurn { player_id: String },
    #[error("Illegal move {from} -> {to}: {reason}")]
    IllegalMove {
        from: Position,
        to: Position,
        reason: IllegalMoveReason,
    },
    #[error("Invalid setup: {0}")]
    InvalidSetup(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Replay diverged at move {index}: {detail}")]
    ReplayDiverged { index: usize, detail: String },
}
