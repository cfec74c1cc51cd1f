mod support;

use gotg_engine::pieces::{Rank, Side};
use gotg_engine::setup::{random_placements, Placement};
use gotg_engine::view::GameView;
use gotg_web::server::{AppContext, ServerConfig, WebServer};
use gotg_web::AppSettings;
use serde_json::{json, Value};
use std::time::Duration;
use support::{arranged_placements, legal_moves};
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::hyper::{self, Client as HyperClient};
use warp::reply::Response;

fn routes() -> BoxedFilter<(Response,)> {
    WebServer::routes(&AppContext::new_for_tests())
}

fn body(response: &warp::http::Response<warp::hyper::body::Bytes>) -> Value {
    serde_json::from_slice(response.body()).expect("json body")
}

fn start_body(lobby: &str) -> Value {
    json!({
        "lobby_id": lobby,
        "player1": { "id": "alice", "name": "Alice" },
        "player2": { "id": "bob", "name": "Bob" },
        "spectators": ["carol"],
        "rating_eligible": true
    })
}

async fn create_game(routes: &BoxedFilter<(Response,)>, lobby: &str) -> String {
    let response = warp::test::request()
        .method("POST")
        .path("/api/games")
        .json(&start_body(lobby))
        .reply(routes)
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body(&response)["game_id"]
        .as_str()
        .expect("game id")
        .to_string()
}

async fn post_as(
    routes: &BoxedFilter<(Response,)>,
    player: &str,
    path: &str,
    payload: Value,
) -> warp::http::Response<warp::hyper::body::Bytes> {
    warp::test::request()
        .method("POST")
        .path(path)
        .header("x-player-id", player)
        .json(&payload)
        .reply(routes)
        .await
}

async fn get_as(
    routes: &BoxedFilter<(Response,)>,
    player: &str,
    path: &str,
) -> warp::http::Response<warp::hyper::body::Bytes> {
    warp::test::request()
        .method("GET")
        .path(path)
        .header("x-player-id", player)
        .reply(routes)
        .await
}

async fn setup_both(routes: &BoxedFilter<(Response,)>, game_id: &str) {
    let path = format!("/api/games/{game_id}/setup");
    let response = post_as(
        routes,
        "alice",
        &path,
        json!({ "placements": random_placements(Side::Player1, 1) }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(&response)["started"], false);

    let response = post_as(
        routes,
        "bob",
        &path,
        json!({ "placements": random_placements(Side::Player2, 2) }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(&response)["started"], true);
}

#[tokio::test]
async fn start_game_is_idempotent_over_http() {
    let routes = routes();
    let game_id = create_game(&routes, "lobby-http").await;

    let again = warp::test::request()
        .method("POST")
        .path("/api/games")
        .json(&start_body("lobby-http"))
        .reply(&routes)
        .await;
    assert_eq!(again.status(), StatusCode::OK);
    assert_eq!(body(&again)["game_id"], game_id.as_str());
    assert_eq!(body(&again)["created"], false);
}

#[tokio::test]
async fn unknown_and_unrelated_games_look_the_same() {
    let routes = routes();
    let game_id = create_game(&routes, "lobby-hidden").await;

    let anonymous = warp::test::request()
        .method("GET")
        .path(&format!("/api/games/{game_id}"))
        .reply(&routes)
        .await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body(&anonymous)["error"], "unauthenticated");

    let stranger = get_as(&routes, "mallory", &format!("/api/games/{game_id}")).await;
    let missing = get_as(&routes, "alice", "/api/games/no-such-game").await;
    assert_eq!(stranger.status(), StatusCode::NOT_FOUND);
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(body(&stranger)["error"], "game_not_found");
    assert_eq!(body(&missing)["error"], "game_not_found");

    let player = get_as(&routes, "alice", &format!("/api/games/{game_id}")).await;
    assert_eq!(player.status(), StatusCode::OK);
    assert_eq!(body(&player)["status"], "setup");
}

#[tokio::test]
async fn setup_move_and_surrender_flow() {
    let routes = routes();
    let game_id = create_game(&routes, "lobby-flow").await;
    setup_both(&routes, &game_id).await;

    let view = get_as(&routes, "carol", &format!("/api/games/{game_id}")).await;
    let view: GameView = serde_json::from_slice(view.body()).expect("game view");
    let (from, to) = legal_moves(&view)[0];
    let moves_path = format!("/api/games/{game_id}/moves");

    let out_of_turn = post_as(&routes, "bob", &moves_path, json!({ "from": from, "to": to })).await;
    assert_eq!(out_of_turn.status(), StatusCode::CONFLICT);
    assert_eq!(body(&out_of_turn)["error"], "not_your_turn");

    let diagonal = post_as(
        &routes,
        "alice",
        &moves_path,
        json!({ "from": from, "to": { "row": from.row - 1, "col": from.col + 1 } }),
    )
    .await;
    assert_eq!(diagonal.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(&diagonal)["error"], "illegal_move");
    assert!(body(&diagonal)["details"]["reason"].is_string());

    let moved = post_as(&routes, "alice", &moves_path, json!({ "from": from, "to": to })).await;
    assert_eq!(moved.status(), StatusCode::ACCEPTED);
    assert_eq!(body(&moved)["next_turn"], "player2");

    let early = get_as(&routes, "alice", &format!("/api/games/{game_id}/result")).await;
    assert_eq!(early.status(), StatusCode::CONFLICT);

    let surrendered = post_as(
        &routes,
        "bob",
        &format!("/api/games/{game_id}/surrender"),
        json!({}),
    )
    .await;
    assert_eq!(surrendered.status(), StatusCode::OK);
    assert_eq!(body(&surrendered)["winner"], "player1");
    assert_eq!(body(&surrendered)["transitioned"], true);

    let result = get_as(&routes, "carol", &format!("/api/games/{game_id}/result")).await;
    assert_eq!(result.status(), StatusCode::OK);
    let result = body(&result);
    assert_eq!(result["winner_id"], "alice");
    assert_eq!(result["reason"], "surrender");
    assert_eq!(result["move_count"], 1);

    let replay = get_as(&routes, "bob", &format!("/api/games/{game_id}/replay?limit=0")).await;
    assert_eq!(replay.status(), StatusCode::OK);
    let replay = body(&replay);
    assert_eq!(replay["total_moves"], 1);
    assert_eq!(replay["moves"].as_array().map(Vec::len), Some(0));

    let ack_path = format!("/api/games/{game_id}/acknowledge");
    let ack = post_as(&routes, "alice", &ack_path, json!({})).await;
    assert_eq!(body(&ack)["changed"], true);
    let ack = post_as(&routes, "alice", &ack_path, json!({})).await;
    assert_eq!(body(&ack)["changed"], false);
}

async fn move_as(
    routes: &BoxedFilter<(Response,)>,
    player: &str,
    game_id: &str,
    from: (i8, i8),
    to: (i8, i8),
) -> Value {
    let response = post_as(
        routes,
        player,
        &format!("/api/games/{game_id}/moves"),
        json!({
            "from": { "row": from.0, "col": from.1 },
            "to": { "row": to.0, "col": to.1 }
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED, "{:?}", response.body());
    body(&response)
}

#[tokio::test]
async fn move_responses_do_not_name_surviving_defenders() {
    let routes = routes();
    let game_id = create_game(&routes, "lobby-defence").await;
    let setup_path = format!("/api/games/{game_id}/setup");

    let alice = arranged_placements(
        Side::Player1,
        &[Placement::new(Rank::Spy, 5, 4), Placement::new(Rank::Private, 5, 2)],
    );
    let bob = arranged_placements(
        Side::Player2,
        &[Placement::new(Rank::Private, 2, 4), Placement::new(Rank::Private, 2, 2)],
    );
    for (player, placements) in [("alice", alice), ("bob", bob)] {
        let response = post_as(&routes, player, &setup_path, json!({ "placements": placements })).await;
        assert_eq!(response.status(), StatusCode::OK);
        let mut keys: Vec<_> = body(&response)
            .as_object()
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        assert_eq!(keys, ["side", "started"]);
    }

    // Bob shuffles a piece along row 3 while alice walks her Spy forward.
    move_as(&routes, "alice", &game_id, (5, 4), (4, 4)).await;
    move_as(&routes, "bob", &game_id, (2, 0), (3, 0)).await;
    move_as(&routes, "alice", &game_id, (4, 4), (3, 4)).await;
    move_as(&routes, "bob", &game_id, (3, 0), (3, 1)).await;

    let failed = move_as(&routes, "alice", &game_id, (3, 4), (2, 4)).await;
    assert_eq!(failed["move_type"], "challenge");
    assert_eq!(failed["challenge"]["winner"], "defender");
    assert_eq!(failed["challenge"]["attacker"], "spy");
    assert!(failed["challenge"].get("defender").is_none());
    assert!(!failed.to_string().contains("private"), "{failed}");

    let view = get_as(&routes, "alice", &format!("/api/games/{game_id}")).await;
    let view: GameView = serde_json::from_slice(view.body()).expect("game view");
    assert_eq!(view.board[2][4], gotg_engine::view::ViewCell::Hidden { side: Side::Player2 });

    move_as(&routes, "bob", &game_id, (3, 1), (3, 0)).await;
    move_as(&routes, "alice", &game_id, (5, 2), (4, 2)).await;
    move_as(&routes, "bob", &game_id, (3, 0), (3, 1)).await;
    move_as(&routes, "alice", &game_id, (4, 2), (3, 2)).await;
    move_as(&routes, "bob", &game_id, (3, 1), (3, 0)).await;

    let tied = move_as(&routes, "alice", &game_id, (3, 2), (2, 2)).await;
    assert_eq!(tied["challenge"]["winner"], "tie");
    assert_eq!(tied["challenge"]["defender"], "private");

    let surrendered = post_as(
        &routes,
        "bob",
        &format!("/api/games/{game_id}/surrender"),
        json!({}),
    )
    .await;
    let mut keys: Vec<_> = body(&surrendered)
        .as_object()
        .map(|o| o.keys().cloned().collect())
        .unwrap_or_default();
    keys.sort();
    assert_eq!(keys, ["reason", "transitioned", "winner"]);
}

#[tokio::test]
async fn forfeit_requires_a_termination_reason() {
    let routes = routes();
    let game_id = create_game(&routes, "lobby-forfeit").await;
    let path = format!("/api/games/{game_id}/forfeit");

    let bad = warp::test::request()
        .method("POST")
        .path(&path)
        .json(&json!({ "player_id": "alice", "reason": "flag_captured" }))
        .reply(&routes)
        .await;
    assert_eq!(bad.status(), StatusCode::CONFLICT);

    for expected in [true, false] {
        let response = warp::test::request()
            .method("POST")
            .path(&path)
            .json(&json!({ "player_id": "alice", "reason": "timeout" }))
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(&response)["winner"], "player2");
        assert_eq!(body(&response)["transitioned"], expected);
    }
}

#[tokio::test]
async fn timeout_check_reports_the_clock() {
    let routes = routes();
    let game_id = create_game(&routes, "lobby-check").await;

    let during_setup = post_as(
        &routes,
        "bob",
        &format!("/api/games/{game_id}/timeout-check"),
        json!({}),
    )
    .await;
    assert_eq!(during_setup.status(), StatusCode::CONFLICT);

    setup_both(&routes, &game_id).await;
    let check = post_as(
        &routes,
        "bob",
        &format!("/api/games/{game_id}/timeout-check"),
        json!({}),
    )
    .await;
    assert_eq!(check.status(), StatusCode::OK);
    let check = body(&check);
    assert_eq!(check["side"], "player1");
    assert_eq!(check["timed_out"], false);
    assert!(check["remaining_ms"].as_i64().unwrap_or_default() > 0);
}

#[tokio::test]
async fn health_over_a_live_server() {
    let server = WebServer::new(ServerConfig::for_tests(), AppSettings::default())
        .expect("construct server");
    let handle = server.start().await.expect("start server");
    let address = handle.address();
    let client = HyperClient::new();

    tokio::time::sleep(Duration::from_millis(20)).await;

    let uri: hyper::Uri = format!("http://{address}/health")
        .parse()
        .expect("parse health uri");
    let response = client.get(uri).await.expect("request health");
    assert_eq!(response.status(), hyper::StatusCode::OK);
    let bytes = hyper::body::to_bytes(response.into_body())
        .await
        .expect("read health body");
    let json: Value = serde_json::from_slice(&bytes).expect("parse health json");
    assert_eq!(json["status"], "ok");

    handle.shutdown().await.expect("shutdown");
}
