use serde::{Deserialize, Serialize};

use crate::board::{Board, Position};
use crate::combat::{self, Outcome};
use crate::errors::{GameError, IllegalMoveReason};
use crate::game::Game;
use crate::logger::{ChallengeResult, MoveRecord, MoveType};
use crate::pieces::{Rank, Side};
use crate::termination::{self, Verdict};
use crate::timer;

/// What a single board step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepResult {
    pub move_type: MoveType,
    pub piece: Rank,
    pub challenge: Option<ChallengeResult>,
}

/// Validates the geometry of `mover` stepping `from` -> `to`, then applies
/// the relocation or challenge to `board`. Nothing is written unless every
/// check passes.
///
/// - empty destination: the piece relocates and stays concealed
/// - attacker wins: the attacker takes the square and is revealed
/// - defender wins: the attacker is removed, the defender is untouched
/// - tie: both pieces are removed
pub fn apply_step(
    board: &mut Board,
    mover: Side,
    from: Position,
    to: Position,
) -> Result<StepResult, IllegalMoveReason> {
    if !from.in_bounds() || !to.in_bounds() {
        return Err(IllegalMoveReason::OutOfBounds);
    }
    let attacker = *board.get(from).ok_or(IllegalMoveReason::EmptyOrigin)?;
    if attacker.side != mover {
        return Err(IllegalMoveReason::NotYourPiece);
    }
    if !from.is_orthogonally_adjacent(to) {
        return Err(IllegalMoveReason::NotAdjacent);
    }

    let defender = match board.get(to) {
        None => {
            let piece = board.take(from).ok_or(IllegalMoveReason::EmptyOrigin)?;
            board.place(to, piece);
            return Ok(StepResult {
                move_type: MoveType::Move,
                piece: attacker.rank,
                challenge: None,
            });
        }
        Some(cell) if cell.side == mover => {
            return Err(IllegalMoveReason::OwnPieceAtDestination);
        }
        Some(cell) => *cell,
    };

    let winner = combat::resolve(attacker.rank, defender.rank);
    match winner {
        Outcome::Attacker => {
            board.take(to);
            if let Some(mut piece) = board.take(from) {
                piece.reveal();
                board.place(to, piece);
            }
        }
        Outcome::Defender => {
            board.take(from);
        }
        Outcome::Tie => {
            board.take(from);
            board.take(to);
        }
    }

    Ok(StepResult {
        move_type: MoveType::Challenge,
        piece: attacker.rank,
        challenge: Some(ChallengeResult {
            attacker: attacker.rank,
            defender: defender.rank,
            winner,
        }),
    })
}

/// Result of a successful move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOutcome {
    pub record: MoveRecord,
    /// Elapsed time charged to the mover
    pub elapsed_ms: i64,
    pub next_turn: Side,
    /// Set when this move ended the game
    pub verdict: Option<Verdict>,
}

/// Runs the full move pipeline for `player_id`: legality, board step, clock
/// charge, turn flip, log append and termination checks.
///
/// A rejected move leaves `game` exactly as it was.
pub fn make_move(
    game: &mut Game,
    player_id: &str,
    from: Position,
    to: Position,
    now: i64,
) -> Result<MoveOutcome, GameError> {
    game.ensure_playing()?;
    let mover = game.require_side(player_id)?;
    if game.current_turn != mover {
        return Err(GameError::NotYourTurn {
            player_id: player_id.to_string(),
        });
    }

    let step = apply_step(&mut game.board, mover, from, to)
        .map_err(|reason| GameError::IllegalMove { from, to, reason })?;

    let elapsed_ms = timer::charge_mover(game, mover, now);
    let next_turn = mover.opponent();
    game.current_turn = next_turn;

    let record = MoveRecord {
        from,
        to,
        mover,
        move_type: step.move_type,
        piece: step.piece,
        challenge_result: step.challenge,
        timestamp: now,
    };
    game.moves.push(record.clone());
    game.move_count += 1;

    let verdict = termination::after_move(&game.board, &record, next_turn);
    if let Some(v) = verdict {
        game.finish(v.winner, v.reason, now)?;
    }

    Ok(MoveOutcome {
        record,
        elapsed_ms,
        next_turn,
        verdict,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Cell;
    use crate::game::fixtures::playing_with;
    use crate::game::{GameEndReason, GameStatus};

    fn pos(r: i8, c: i8) -> Position {
        Position::new(r, c)
    }

    /// Both flags parked far from the action plus the given pieces.
    fn board_with(pieces: &[(i8, i8, Rank, Side)]) -> Board {
        let mut board = Board::empty();
        board.place(pos(7, 0), Cell::hidden(Rank::Flag, Side::Player1));
        board.place(pos(0, 8), Cell::hidden(Rank::Flag, Side::Player2));
        for &(r, c, rank, side) in pieces {
            board.place(pos(r, c), Cell::hidden(rank, side));
        }
        board
    }

    #[test]
    fn simple_move_relocates_without_reveal() {
        let mut game = playing_with(board_with(&[(5, 4, Rank::Colonel, Side::Player1)]), 0);
        let out = make_move(&mut game, "alice", pos(5, 4), pos(4, 4), 2_000).unwrap();
        assert_eq!(out.record.move_type, MoveType::Move);
        assert_eq!(out.next_turn, Side::Player2);
        assert!(game.board().get(pos(5, 4)).is_none());
        let cell = game.board().get(pos(4, 4)).unwrap();
        assert_eq!(cell.rank, Rank::Colonel);
        assert!(!cell.revealed);
        assert_eq!(game.board().piece_count(), 3);
        assert_eq!(game.move_count(), 1);
        assert_eq!(game.time_used(Side::Player1), 2_000);
    }

    #[test]
    fn private_attacking_spy_wins_and_is_revealed() {
        let mut game = playing_with(
            board_with(&[(4, 4, Rank::Private, Side::Player1), (3, 4, Rank::Spy, Side::Player2)]),
            0,
        );
        let out = make_move(&mut game, "alice", pos(4, 4), pos(3, 4), 10).unwrap();
        let result = out.record.challenge_result.unwrap();
        assert_eq!(result.winner, Outcome::Attacker);
        let cell = game.board().get(pos(3, 4)).unwrap();
        assert_eq!((cell.rank, cell.side, cell.revealed), (Rank::Private, Side::Player1, true));
        assert!(game.board().get(pos(4, 4)).is_none());
        assert_eq!(game.board().piece_count(), 3);
    }

    #[test]
    fn spy_attacking_private_loses_and_defender_stays_hidden() {
        let mut game = playing_with(
            board_with(&[(4, 4, Rank::Spy, Side::Player1), (3, 4, Rank::Private, Side::Player2)]),
            0,
        );
        let out = make_move(&mut game, "alice", pos(4, 4), pos(3, 4), 10).unwrap();
        assert_eq!(out.record.challenge_result.unwrap().winner, Outcome::Defender);
        assert!(game.board().get(pos(4, 4)).is_none());
        let cell = game.board().get(pos(3, 4)).unwrap();
        assert_eq!((cell.rank, cell.side, cell.revealed), (Rank::Private, Side::Player2, false));
        assert_eq!(game.board().piece_count(), 3);
    }

    #[test]
    fn private_tie_clears_both_squares() {
        let mut game = playing_with(
            board_with(&[(4, 4, Rank::Private, Side::Player1), (3, 4, Rank::Private, Side::Player2)]),
            0,
        );
        let out = make_move(&mut game, "alice", pos(4, 4), pos(3, 4), 10).unwrap();
        assert_eq!(out.record.challenge_result.unwrap().winner, Outcome::Tie);
        assert!(game.board().get(pos(4, 4)).is_none());
        assert!(game.board().get(pos(3, 4)).is_none());
        assert_eq!(game.board().piece_count(), 2);
    }

    #[test]
    fn capturing_the_flag_ends_the_game() {
        let mut game = playing_with(board_with(&[(1, 8, Rank::Sergeant, Side::Player1)]), 0);
        let out = make_move(&mut game, "alice", pos(1, 8), pos(0, 8), 10).unwrap();
        let verdict = out.verdict.expect("game over");
        assert_eq!(verdict.winner, Side::Player1);
        assert_eq!(game.status(), GameStatus::Finished);
        assert_eq!(game.end_reason(), Some(GameEndReason::FlagCaptured));
    }

    #[test]
    fn each_rejection_is_distinct_and_leaves_game_unchanged() {
        let mut game = playing_with(
            board_with(&[
                (5, 4, Rank::Major, Side::Player1),
                (5, 5, Rank::Captain, Side::Player1),
                (2, 4, Rank::Major, Side::Player2),
            ]),
            0,
        );
        let before = game.clone();

        let cases = [
            ("bob", pos(2, 4), pos(3, 4)),
            ("carol", pos(5, 4), pos(4, 4)),
            ("alice", pos(4, 0), pos(3, 0)),
            ("alice", pos(2, 4), pos(3, 4)),
            ("alice", pos(5, 4), pos(3, 4)),
            ("alice", pos(5, 4), pos(4, 5)),
            ("alice", pos(5, 4), pos(5, 5)),
            ("alice", pos(7, 0), pos(8, 0)),
        ];
        let mut kinds = Vec::new();
        for (player, from, to) in cases {
            let err = make_move(&mut game, player, from, to, 99).unwrap_err();
            kinds.push(match err {
                GameError::NotYourTurn { .. } => "turn".to_string(),
                GameError::NotAParticipant { .. } => "auth".to_string(),
                GameError::IllegalMove { reason, .. } => format!("{reason:?}"),
                other => panic!("unexpected {other:?}"),
            });
            assert_eq!(game, before);
        }
        assert_eq!(
            kinds,
            [
                "turn",
                "auth",
                "EmptyOrigin",
                "NotYourPiece",
                "NotAdjacent",
                "NotAdjacent",
                "OwnPieceAtDestination",
                "OutOfBounds"
            ]
        );
    }

    #[test]
    fn moves_rejected_outside_play() {
        let mut game = playing_with(board_with(&[]), 0);
        game.finish(Side::Player2, GameEndReason::Surrender, 5).unwrap();
        let err = make_move(&mut game, "alice", pos(7, 0), pos(6, 0), 10).unwrap_err();
        assert!(matches!(err, GameError::InvalidState(_)));
    }

    #[test]
    fn turns_alternate_without_bonus_moves() {
        let mut game = playing_with(
            board_with(&[(5, 4, Rank::Major, Side::Player1), (2, 4, Rank::Major, Side::Player2)]),
            0,
        );
        make_move(&mut game, "alice", pos(5, 4), pos(4, 4), 1_000).unwrap();
        assert!(make_move(&mut game, "alice", pos(4, 4), pos(3, 4), 1_500).is_err());
        make_move(&mut game, "bob", pos(2, 4), pos(3, 4), 4_000).unwrap();
        assert_eq!(game.current_turn(), Side::Player1);
        assert_eq!(game.time_used(Side::Player1), 1_000);
        assert_eq!(game.time_used(Side::Player2), 3_000);
    }

    #[test]
    fn player1_flag_arrival_is_deferred_one_ply() {
        let mut board = Board::empty();
        board.place(pos(1, 4), Cell::hidden(Rank::Flag, Side::Player1));
        board.place(pos(3, 8), Cell::hidden(Rank::Flag, Side::Player2));
        board.place(pos(5, 0), Cell::hidden(Rank::Private, Side::Player2));
        let mut game = playing_with(board, 0);

        let arrival = make_move(&mut game, "alice", pos(1, 4), pos(0, 4), 10).unwrap();
        assert!(arrival.verdict.is_none());
        assert_eq!(game.status(), GameStatus::Playing);

        let reply = make_move(&mut game, "bob", pos(5, 0), pos(6, 0), 20).unwrap();
        let verdict = reply.verdict.expect("deferred win");
        assert_eq!(verdict.winner, Side::Player1);
        assert_eq!(game.end_reason(), Some(GameEndReason::FlagReachedBase));
    }

    #[test]
    fn player2_flag_arrival_is_immediate() {
        let mut board = Board::empty();
        board.place(pos(6, 4), Cell::hidden(Rank::Flag, Side::Player2));
        board.place(pos(3, 0), Cell::hidden(Rank::Flag, Side::Player1));
        let mut game = playing_with(board, 0);
        make_move(&mut game, "alice", pos(3, 0), pos(3, 1), 10).unwrap();
        let out = make_move(&mut game, "bob", pos(6, 4), pos(7, 4), 20).unwrap();
        assert_eq!(out.verdict.unwrap().winner, Side::Player2);
        assert_eq!(game.winner(), Some(Side::Player2));
        assert_eq!(game.end_reason(), Some(GameEndReason::FlagReachedBase));
    }
}
