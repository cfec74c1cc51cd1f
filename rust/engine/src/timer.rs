//! Per-side thinking-time accounting.

use serde::{Deserialize, Serialize};

use crate::errors::GameError;
use crate::game::{Game, GameEndReason, GameStatus};
use crate::pieces::Side;

/// Result of evaluating the current-turn player's clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutCheck {
    /// Whose clock was evaluated
    pub side: Side,
    pub remaining_ms: i64,
    /// The game is over on time (now or earlier)
    pub timed_out: bool,
    /// This call performed the transition to `Finished`
    pub transitioned: bool,
}

/// Adds the time since the later of game start and the previous move to
/// `mover`'s accumulator and stamps `now` as the last move time.
pub fn charge_mover(game: &mut Game, mover: Side, now: i64) -> i64 {
    let since = match (game.game_time_started, game.last_move_time) {
        (Some(start), Some(last)) => start.max(last),
        (Some(start), None) => start,
        (None, Some(last)) => last,
        (None, None) => now,
    };
    let elapsed = (now - since).max(0);
    game.add_time_used(mover, elapsed);
    game.last_move_time = Some(now);
    elapsed
}

/// Remaining budget of the player to move, counting the running interval:
/// `budget - (now - started) + opponent_time_used`.
pub fn remaining_ms(game: &Game, now: i64) -> Option<i64> {
    let started = game.game_time_started?;
    let opponent = game.current_turn.opponent();
    Some(game.time_budget_ms() - (now - started) + game.time_used(opponent))
}

/// Idempotent timeout evaluation. Finishes the game with the current-turn
/// player as loser when their remaining time is negative; on an already
/// finished game it reports without touching anything.
pub fn check_timeout(game: &mut Game, now: i64) -> Result<TimeoutCheck, GameError> {
    let side = game.current_turn;
    match game.status {
        GameStatus::Setup => Err(GameError::InvalidState(
            "clocks do not run during setup".into(),
        )),
        GameStatus::Finished => {
            let at = game.finished_at.unwrap_or(now);
            Ok(TimeoutCheck {
                side,
                remaining_ms: remaining_ms(game, at).unwrap_or(0),
                timed_out: game.game_end_reason == Some(GameEndReason::Timeout),
                transitioned: false,
            })
        }
        GameStatus::Playing => {
            let remaining = remaining_ms(game, now).unwrap_or(game.time_budget_ms());
            let timed_out = remaining < 0;
            if timed_out {
                game.finish(side.opponent(), GameEndReason::Timeout, now)?;
            }
            Ok(TimeoutCheck {
                side,
                remaining_ms: remaining,
                timed_out,
                transitioned: timed_out,
            })
        }
    }
}
