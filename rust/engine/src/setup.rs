use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::board::{Cell, Position, COLS};
use crate::errors::GameError;
use crate::game::{Game, GameStatus};
use crate::pieces::{Rank, Side, PIECES_PER_SIDE, ROSTER};

/// One piece placed during setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub rank: Rank,
    pub row: i8,
    pub col: i8,
}

impl Placement {
    pub fn new(rank: Rank, row: i8, col: i8) -> Self {
        Self { rank, row, col }
    }

    pub fn position(&self) -> Position {
        Position::new(self.row, self.col)
    }
}

/// Result of committing one side's setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupOutcome {
    pub side: Side,
    /// Both sides are ready and the game moved to `Playing`.
    pub started: bool,
}

/// Checks a placement list against the roster and the side's home rows.
///
/// # Errors
///
/// [`GameError::InvalidSetup`] when the count, roster, rows, columns or
/// square uniqueness are wrong.
pub fn validate_placements(side: Side, placements: &[Placement]) -> Result<(), GameError> {
    if placements.len() != PIECES_PER_SIDE {
        return Err(GameError::InvalidSetup(format!(
            "expected {PIECES_PER_SIDE} pieces, got {}",
            placements.len()
        )));
    }

    let rows = side.home_rows();
    let mut squares = HashSet::with_capacity(PIECES_PER_SIDE);
    let mut counts: HashMap<Rank, usize> = HashMap::new();
    for p in placements {
        if p.row < 0 || !rows.contains(&(p.row as u8)) {
            return Err(GameError::InvalidSetup(format!(
                "row {} is outside rows {}..={} allowed for {side:?}",
                p.row,
                rows.start(),
                rows.end()
            )));
        }
        if !(0..COLS as i8).contains(&p.col) {
            return Err(GameError::InvalidSetup(format!(
                "column {} is outside 0..={}",
                p.col,
                COLS - 1
            )));
        }
        if !squares.insert((p.row, p.col)) {
            return Err(GameError::InvalidSetup(format!(
                "two pieces placed on {}",
                p.position()
            )));
        }
        *counts.entry(p.rank).or_insert(0) += 1;
    }

    for (rank, expected) in ROSTER {
        let got = counts.get(&rank).copied().unwrap_or(0);
        if got != expected {
            return Err(GameError::InvalidSetup(format!(
                "expected {expected} x {rank:?}, got {got}"
            )));
        }
    }
    Ok(())
}

/// Validates and writes `player_id`'s placements. When both sides are ready
/// the game starts and the concealed board is snapshotted for replay.
pub fn commit_setup(
    game: &mut Game,
    player_id: &str,
    placements: &[Placement],
    now: i64,
) -> Result<SetupOutcome, GameError> {
    let side = game.require_side(player_id)?;
    if game.status != GameStatus::Setup {
        return Err(GameError::InvalidState(format!(
            "game is {:?}, setup is closed",
            game.status
        )));
    }
    if game.setup_done(side) {
        return Err(GameError::InvalidState(format!(
            "{side:?} has already committed a setup"
        )));
    }
    validate_placements(side, placements)?;

    for p in placements {
        game.board.place(p.position(), Cell::hidden(p.rank, side));
    }
    game.mark_setup_done(side);

    let started = game.player1_setup && game.player2_setup;
    if started {
        game.status = GameStatus::Playing;
        game.current_turn = Side::Player1;
        game.game_time_started = Some(now);
        game.initial_setup_board = Some(game.board.concealed());
    }
    Ok(SetupOutcome { side, started })
}

/// A valid random arrangement of the full roster on `side`'s home rows.
pub fn random_placements(side: Side, seed: u64) -> Vec<Placement> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let mut squares: Vec<(i8, i8)> = side
        .home_rows()
        .flat_map(|r| (0..COLS as i8).map(move |c| (r as i8, c)))
        .collect();
    squares.shuffle(&mut rng);

    let pieces = ROSTER
        .iter()
        .flat_map(|(rank, n)| std::iter::repeat(*rank).take(*n));
    pieces
        .zip(squares)
        .map(|(rank, (row, col))| Placement::new(rank, row, col))
        .collect()
}
