//! # gotg-engine: Game of the Generals rules core
//!
//! The rules and turn/state machine for the two-player hidden-information
//! board game: piece setup, legal-move validation, combat resolution,
//! per-side time accounting and win detection. Every function here is pure
//! over a [`game::Game`] document; callers supply the current time in
//! milliseconds so the rules stay deterministic and testable.
//!
//! ## Core Modules
//!
//! - [`pieces`] - Ranks, sides and the fixed 21-piece roster
//! - [`board`] - The 8×9 grid, positions and cells
//! - [`combat`] - The 15×15 challenge outcome table
//! - [`setup`] - Placement validation and the setup → playing transition
//! - [`moves`] - The move pipeline
//! - [`timer`] - Time budgets and the idempotent timeout check
//! - [`termination`] - Win conditions evaluated after each move
//! - [`view`] - Viewer-scoped masking of the board
//! - [`replay`] - Board reconstruction and combat statistics from the log
//! - [`logger`] - Move records and the JSONL game archive
//! - [`errors`] - Error types for game operations
//!
//! ## Quick Start
//!
//! ```rust
//! use gotg_engine::combat::{resolve, Outcome};
//! use gotg_engine::pieces::Rank;
//!
//! assert_eq!(resolve(Rank::Private, Rank::Spy), Outcome::Attacker);
//! assert_eq!(resolve(Rank::Spy, Rank::Private), Outcome::Defender);
//! assert_eq!(resolve(Rank::Major, Rank::Major), Outcome::Tie);
//! ```
//!
//! ## Playing a game
//!
//! ```rust
//! use gotg_engine::game::{Game, GameStatus, Seat, Seating, DEFAULT_TIME_BUDGET_MS};
//! use gotg_engine::pieces::Side;
//! use gotg_engine::setup::{commit_setup, random_placements};
//!
//! let seating = Seating {
//!     lobby_id: "lobby-7".into(),
//!     player1: Seat::new("p1", "Ana"),
//!     player2: Seat::new("p2", "Ben"),
//!     spectators: vec![],
//!     rating_eligible: false,
//! };
//! let mut game = Game::new("game-7".into(), seating, DEFAULT_TIME_BUDGET_MS, 0);
//!
//! commit_setup(&mut game, "p1", &random_placements(Side::Player1, 1), 10).unwrap();
//! let outcome = commit_setup(&mut game, "p2", &random_placements(Side::Player2, 2), 20).unwrap();
//!
//! assert!(outcome.started);
//! assert_eq!(game.status(), GameStatus::Playing);
//! assert_eq!(game.board().piece_count(), 42);
//! ```

pub mod board;
pub mod combat;
pub mod errors;
pub mod game;
pub mod logger;
pub mod moves;
pub mod pieces;
pub mod replay;
pub mod setup;
pub mod termination;
pub mod timer;
pub mod view;
