/// Racing requests against one game: duplicate creation, simultaneous
/// timeout checks and competing termination paths.
mod support;

use gotg_engine::game::{GameEndReason, DEFAULT_TIME_BUDGET_MS};
use gotg_web::HookCall;
use std::collections::HashSet;
use std::sync::Arc;
use support::{harness, seating, started_game};
use tokio::task::JoinSet;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_start_game_yields_one_game_per_lobby() {
    let h = harness();
    let mut join_set = JoinSet::new();

    for _ in 0..12 {
        let service = Arc::clone(&h.service);
        join_set.spawn(async move { service.start_game(seating("lobby-race")).await });
    }

    let mut ids = HashSet::new();
    let mut created = 0;
    while let Some(result) = join_set.join_next().await {
        let started = result.expect("task completed").expect("start game");
        if started.created {
            created += 1;
        }
        ids.insert(started.game_id);
    }

    assert_eq!(created, 1);
    assert_eq!(ids.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_timeout_checks_transition_once() {
    let h = harness();
    let game_id = started_game(&h, "lobby-timeout-race", 21).await;
    h.clock.advance(DEFAULT_TIME_BUDGET_MS + 500);

    let mut join_set = JoinSet::new();
    for i in 0..16 {
        let service = Arc::clone(&h.service);
        let game_id = game_id.clone();
        let caller = if i % 2 == 0 { "alice" } else { "bob" };
        join_set.spawn(async move { service.check_opponent_timeout(&game_id, caller).await });
    }

    let mut transitions = 0;
    while let Some(result) = join_set.join_next().await {
        let check = result.expect("task completed").expect("timeout check");
        assert!(check.timed_out);
        if check.transitioned {
            transitions += 1;
        }
    }

    assert_eq!(transitions, 1);
    assert_eq!(h.hooks.stats_for(&game_id).len(), 2);
    let closes = h
        .hooks
        .calls()
        .into_iter()
        .filter(|c| matches!(c, HookCall::CloseRoom { .. }))
        .count();
    assert_eq!(closes, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn competing_termination_paths_finish_once() {
    let h = harness();
    let game_id = started_game(&h, "lobby-termination-race", 33).await;
    h.clock.advance(DEFAULT_TIME_BUDGET_MS + 1);

    let mut join_set = JoinSet::new();
    {
        let service = Arc::clone(&h.service);
        let id = game_id.clone();
        join_set.spawn(async move {
            service
                .surrender_game(&id, "bob")
                .await
                .map(|t| t.transitioned)
        });
    }
    {
        let service = Arc::clone(&h.service);
        let id = game_id.clone();
        join_set.spawn(async move {
            service
                .check_opponent_timeout(&id, "bob")
                .await
                .map(|c| c.transitioned)
        });
    }
    {
        let service = Arc::clone(&h.service);
        let id = game_id.clone();
        join_set.spawn(async move {
            service
                .forfeit_game(&id, "alice", GameEndReason::Surrender)
                .await
                .map(|t| t.transitioned)
        });
    }

    let mut transitions = 0;
    while let Some(result) = join_set.join_next().await {
        // A surrender that loses the race is rejected; the others report.
        if let Ok(true) = result.expect("task completed") {
            transitions += 1;
        }
    }

    assert_eq!(transitions, 1);
    assert_eq!(h.hooks.stats_for(&game_id).len(), 2);
}
