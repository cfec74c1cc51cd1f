pub mod games;
pub mod health;
pub mod sse;

pub use games::{
    ForfeitRequest, MoveRequest, ReplayQuery, SetupRequest, StartGameRequest, acknowledge,
    check_timeout, forfeit, get_game, make_move, match_result, replay, setup_pieces, start_game,
    surrender, timeout,
};
pub use health::health;
pub use sse::stream_events;
