use crate::errors::IntoErrorResponse;
use crate::service::{GameService, ServiceError};
use gotg_engine::board::Position;
use gotg_engine::errors::GameError;
use gotg_engine::game::{GameEndReason, Seat, Seating};
use gotg_engine::setup::Placement;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::{self, Response};
use warp::Reply;

#[derive(Debug, Deserialize)]
pub struct StartGameRequest {
    pub lobby_id: String,
    pub player1: Seat,
    pub player2: Seat,
    #[serde(default)]
    pub spectators: Vec<String>,
    #[serde(default)]
    pub rating_eligible: bool,
}

impl StartGameRequest {
    fn into_seating(self) -> Seating {
        Seating {
            lobby_id: self.lobby_id,
            player1: self.player1,
            player2: self.player2,
            spectators: self.spectators,
            rating_eligible: self.rating_eligible,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SetupRequest {
    pub placements: Vec<Placement>,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub from: Position,
    pub to: Position,
}

/// Sent by the disconnect sweep, which acts on behalf of the absent player.
#[derive(Debug, Deserialize)]
pub struct ForfeitRequest {
    pub player_id: String,
    pub reason: GameEndReason,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReplayQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct AcknowledgeResponse {
    acknowledged: bool,
    changed: bool,
}

/// Creates the game for a lobby.
///
/// # HTTP Method and Path
/// - **Method**: POST
/// - **Path**: `/api/games`
///
/// # Response Format
/// - **201 Created**: a new game was stored
/// - **200 OK**: the lobby already had a game; its id is returned
///
/// ```json
/// { "game_id": "uuid-string", "created": true }
/// ```
///
/// # Error Cases
/// - `invalid_state`: a seat is empty or both seats name the same player
pub async fn start_game(games: Arc<GameService>, request: StartGameRequest) -> Response {
    match games.start_game(request.into_seating()).await {
        Ok(started) => {
            let status = if started.created {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            success_response(status, started)
        }
        Err(err) => service_error(err),
    }
}

/// Viewer-scoped game document. Players see only their own identities until
/// the game ends; spectators see everything.
///
/// # HTTP Method and Path
/// - **Method**: GET
/// - **Path**: `/api/games/{game_id}`
///
/// # Error Cases
/// - `unauthenticated`: no `x-player-id` header
/// - `game_not_found`: unknown game, or the caller has no relation to it
pub async fn get_game(games: Arc<GameService>, game_id: String, caller: Option<String>) -> Response {
    let Some(viewer) = caller else {
        return service_error(ServiceError::Unauthenticated);
    };
    match games.get_game(&game_id, &viewer) {
        Ok(Some(view)) => success_response(StatusCode::OK, view),
        Ok(None) => service_error(GameError::NotFound(format!("game {game_id}")).into()),
        Err(err) => service_error(err),
    }
}

/// Commits the caller's setup.
///
/// # HTTP Method and Path
/// - **Method**: POST
/// - **Path**: `/api/games/{game_id}/setup`
///
/// # Request Format
/// ```json
/// { "placements": [ { "rank": "flag", "row": 0, "col": 4 }, ... ] }
/// ```
///
/// # Error Cases
/// - `invalid_setup`: wrong roster, squares outside the home rows, duplicates
/// - `invalid_state`: setup already committed or the game has started
pub async fn setup_pieces(
    games: Arc<GameService>,
    game_id: String,
    caller: Option<String>,
    request: SetupRequest,
) -> Response {
    let Some(player_id) = caller else {
        return service_error(ServiceError::Unauthenticated);
    };
    match games
        .setup_pieces(&game_id, &player_id, request.placements)
        .await
    {
        Ok(outcome) => success_response(StatusCode::OK, outcome),
        Err(err) => service_error(err),
    }
}

/// Moves one of the caller's pieces one square orthogonally.
///
/// # HTTP Method and Path
/// - **Method**: POST
/// - **Path**: `/api/games/{game_id}/moves`
///
/// # Request Format
/// ```json
/// { "from": { "row": 2, "col": 4 }, "to": { "row": 3, "col": 4 } }
/// ```
///
/// # Response Format
/// - **202 Accepted**: the move as the mover sees it (a defender that
///   survived a challenge is not named), elapsed time, next turn and, when
///   the move ended the game, the verdict
///
/// # Error Cases
/// - `not_your_turn`, `illegal_move` (with `details.reason`), `invalid_state`
pub async fn make_move(
    games: Arc<GameService>,
    game_id: String,
    caller: Option<String>,
    request: MoveRequest,
) -> Response {
    let Some(player_id) = caller else {
        return service_error(ServiceError::Unauthenticated);
    };
    match games
        .make_move(&game_id, &player_id, request.from, request.to)
        .await
    {
        Ok(outcome) => success_response(StatusCode::ACCEPTED, outcome),
        Err(err) => service_error(err),
    }
}

pub async fn surrender(games: Arc<GameService>, game_id: String, caller: Option<String>) -> Response {
    let Some(player_id) = caller else {
        return service_error(ServiceError::Unauthenticated);
    };
    match games.surrender_game(&game_id, &player_id).await {
        Ok(termination) => success_response(StatusCode::OK, termination),
        Err(err) => service_error(err),
    }
}

/// The caller concedes on time.
pub async fn timeout(games: Arc<GameService>, game_id: String, caller: Option<String>) -> Response {
    let Some(player_id) = caller else {
        return service_error(ServiceError::Unauthenticated);
    };
    match games.timeout_game(&game_id, &player_id).await {
        Ok(termination) => success_response(StatusCode::OK, termination),
        Err(err) => service_error(err),
    }
}

/// Evaluates the clock of the player to move. Either seated player may call
/// it, any number of times.
///
/// # HTTP Method and Path
/// - **Method**: POST
/// - **Path**: `/api/games/{game_id}/timeout-check`
///
/// # Response Format
/// ```json
/// { "side": "player2", "remaining_ms": -250, "timed_out": true, "transitioned": true }
/// ```
pub async fn check_timeout(
    games: Arc<GameService>,
    game_id: String,
    caller: Option<String>,
) -> Response {
    let Some(player_id) = caller else {
        return service_error(ServiceError::Unauthenticated);
    };
    match games.check_opponent_timeout(&game_id, &player_id).await {
        Ok(check) => success_response(StatusCode::OK, check),
        Err(err) => service_error(err),
    }
}

pub async fn forfeit(games: Arc<GameService>, game_id: String, request: ForfeitRequest) -> Response {
    match games
        .forfeit_game(&game_id, &request.player_id, request.reason)
        .await
    {
        Ok(termination) => success_response(StatusCode::OK, termination),
        Err(err) => service_error(err),
    }
}

pub async fn acknowledge(
    games: Arc<GameService>,
    game_id: String,
    caller: Option<String>,
) -> Response {
    let Some(player_id) = caller else {
        return service_error(ServiceError::Unauthenticated);
    };
    match games.acknowledge_game_result(&game_id, &player_id).await {
        Ok(changed) => success_response(
            StatusCode::OK,
            AcknowledgeResponse {
                acknowledged: true,
                changed,
            },
        ),
        Err(err) => service_error(err),
    }
}

/// Final result of a finished game with per-player combat statistics.
///
/// # HTTP Method and Path
/// - **Method**: GET
/// - **Path**: `/api/games/{game_id}/result`
///
/// # Error Cases
/// - `invalid_state`: the game is still in progress
/// - `game_not_found`: unknown game, or the caller has no relation to it
pub async fn match_result(
    games: Arc<GameService>,
    game_id: String,
    caller: Option<String>,
) -> Response {
    let Some(viewer) = caller else {
        return service_error(ServiceError::Unauthenticated);
    };
    match games.get_match_result(&game_id, &viewer) {
        Ok(result) => success_response(StatusCode::OK, result),
        Err(err) => service_error(err),
    }
}

/// Board of a finished game rebuilt from its setup snapshot and move log.
///
/// # HTTP Method and Path
/// - **Method**: GET
/// - **Path**: `/api/games/{game_id}/replay?limit={n}`
///
/// Without `limit` every move is applied.
pub async fn replay(
    games: Arc<GameService>,
    game_id: String,
    caller: Option<String>,
    query: ReplayQuery,
) -> Response {
    let Some(viewer) = caller else {
        return service_error(ServiceError::Unauthenticated);
    };
    match games.get_game_replay(&game_id, &viewer, query.limit) {
        Ok(replay) => success_response(StatusCode::OK, replay),
        Err(err) => service_error(err),
    }
}

fn success_response<T>(status: StatusCode, body: T) -> Response
where
    T: Serialize,
{
    reply::with_status(reply::json(&body), status).into_response()
}

fn service_error(err: ServiceError) -> Response {
    err.into_http_response()
}
