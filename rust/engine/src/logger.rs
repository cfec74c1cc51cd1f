use serde::{Deserialize, Serialize};

use crate::board::{Board, Position};
use crate::combat::Outcome;
use crate::game::{Game, GameEndReason, GameId};
use crate::pieces::{Rank, Side};

/// Kind of an in-play move. There is no setup kind: placements never enter
/// the move log and are captured whole by the game's initial setup snapshot,
/// so every logged record replays as a board step.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveType {
    /// Destination was empty
    Move,
    /// Destination held an enemy piece
    Challenge,
}

/// Both identities involved in a challenge and who survived.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChallengeResult {
    pub attacker: Rank,
    pub defender: Rank,
    pub winner: Outcome,
}

/// Append-only log entry for one successful move.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub from: Position,
    pub to: Position,
    pub mover: Side,
    pub move_type: MoveType,
    /// The moving piece
    pub piece: Rank,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge_result: Option<ChallengeResult>,
    /// Server time in milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// Archived summary of a finished game, written one per line.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub game_id: GameId,
    pub lobby_id: String,
    pub player1_id: String,
    pub player2_id: String,
    pub winner: Option<Side>,
    pub reason: Option<GameEndReason>,
    pub initial_board: Option<Board>,
    pub moves: Vec<MoveRecord>,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    /// Write time (RFC3339)
    #[serde(default)]
    pub ts: Option<String>,
}

impl GameRecord {
    pub fn from_game(game: &Game) -> Self {
        Self {
            game_id: game.id().clone(),
            lobby_id: game.lobby_id().to_string(),
            player1_id: game.seat(Side::Player1).id.clone(),
            player2_id: game.seat(Side::Player2).id.clone(),
            winner: game.winner(),
            reason: game.end_reason(),
            initial_board: game.initial_setup_board().cloned(),
            moves: game.moves().to_vec(),
            started_at: game.game_time_started(),
            finished_at: game.finished_at(),
            ts: None,
        }
    }
}

use chrono::{SecondsFormat, Utc};
use std::fs::{create_dir_all, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Appends finished games to a JSONL file.
#[derive(Debug)]
pub struct GameLogger {
    writer: BufWriter<std::fs::File>,
}

impl GameLogger {
    pub fn create<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent)?;
            }
        }
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(f),
        })
    }

    pub fn write(&mut self, record: &GameRecord) -> std::io::Result<()> {
        let mut rec = record.clone();
        if rec.ts.is_none() {
            rec.ts = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
        }
        let line = serde_json::to_string(&rec).map_err(std::io::Error::other)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}
