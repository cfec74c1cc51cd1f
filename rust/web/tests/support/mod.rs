#![allow(dead_code)]

use gotg_engine::board::Position;
use gotg_engine::game::{Seat, Seating};
use gotg_engine::pieces::{Side, ROSTER};
use gotg_engine::setup::{random_placements, Placement};
use gotg_engine::view::{GameView, ViewCell};
use gotg_web::{EventBus, GameService, InMemoryGameStore, ManualClock, RecordingHooks, RetryPolicy};
use std::sync::Arc;

pub const SPECTATOR: &str = "carol";

pub fn seating(lobby: &str) -> Seating {
    Seating {
        lobby_id: lobby.to_string(),
        player1: Seat::new("alice", "Alice"),
        player2: Seat::new("bob", "Bob"),
        spectators: vec![SPECTATOR.to_string()],
        rating_eligible: true,
    }
}

pub fn player_id(side: Side) -> &'static str {
    match side {
        Side::Player1 => "alice",
        Side::Player2 => "bob",
    }
}

pub struct Harness {
    pub service: Arc<GameService>,
    pub hooks: Arc<RecordingHooks>,
    pub clock: Arc<ManualClock>,
    pub events: Arc<EventBus>,
}

pub fn harness() -> Harness {
    let hooks = Arc::new(RecordingHooks::new());
    let clock = Arc::new(ManualClock::new(10_000));
    let events = Arc::new(EventBus::new());
    let service = GameService::new(Arc::new(InMemoryGameStore::new()), Arc::clone(&events))
        .with_hooks(hooks.clone())
        .with_presence(hooks.clone())
        .with_clock(clock.clone())
        .with_retry_policy(RetryPolicy::from_millis(&[1, 2, 4]));
    Harness {
        service: Arc::new(service),
        hooks,
        clock,
        events,
    }
}

/// Creates a game in `lobby` and commits both setups.
pub async fn started_game(h: &Harness, lobby: &str, seed: u64) -> String {
    let started = h.service.start_game(seating(lobby)).await.expect("start game");
    h.service
        .setup_pieces(&started.game_id, "alice", random_placements(Side::Player1, seed))
        .await
        .expect("alice setup");
    h.service
        .setup_pieces(&started.game_id, "bob", random_placements(Side::Player2, seed + 1))
        .await
        .expect("bob setup");
    started.game_id
}

/// Full roster for `side` with the `fixed` pieces pinned and the rest filled
/// in row by row over the free home squares.
pub fn arranged_placements(side: Side, fixed: &[Placement]) -> Vec<Placement> {
    let mut remaining: Vec<_> = ROSTER.to_vec();
    for placement in fixed {
        if let Some(entry) = remaining.iter_mut().find(|(rank, _)| *rank == placement.rank) {
            entry.1 -= 1;
        }
    }
    let free = side
        .home_rows()
        .flat_map(|r| (0..9i8).map(move |c| (r as i8, c)))
        .filter(|&(r, c)| !fixed.iter().any(|p| p.row == r && p.col == c));
    let fill = remaining
        .iter()
        .flat_map(|(rank, n)| std::iter::repeat(*rank).take(*n));
    let mut placements = fixed.to_vec();
    placements.extend(fill.zip(free).map(|(rank, (row, col))| Placement::new(rank, row, col)));
    placements
}

/// Legal moves for the side to move, read from an unmasked view.
pub fn legal_moves(view: &GameView) -> Vec<(Position, Position)> {
    let side = view.current_turn;
    let side_at = |pos: Position| -> Option<Side> {
        match view.board[pos.row as usize][pos.col as usize] {
            ViewCell::Piece { side, .. } | ViewCell::Hidden { side } => Some(side),
            ViewCell::Empty => None,
        }
    };
    let mut moves = Vec::new();
    for (r, row) in view.board.iter().enumerate() {
        for c in 0..row.len() {
            let from = Position::new(r as i8, c as i8);
            if side_at(from) != Some(side) {
                continue;
            }
            for to in from.neighbors() {
                if side_at(to) != Some(side) {
                    moves.push((from, to));
                }
            }
        }
    }
    moves
}

pub fn pieces_in_view(view: &GameView) -> usize {
    view.board
        .iter()
        .flatten()
        .filter(|cell| !matches!(cell, ViewCell::Empty))
        .count()
}
