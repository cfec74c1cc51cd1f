use gotg_engine::board::Position;
use gotg_engine::combat::Outcome;
use gotg_engine::game::{GameEndReason, GameId};
use gotg_engine::logger::{MoveRecord, MoveType};
use gotg_engine::pieces::{Rank, Side};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;

pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1000;

pub type EventSender = mpsc::Sender<GameEvent>;
pub type EventReceiver = mpsc::Receiver<GameEvent>;

pub struct EventSubscription {
    bus: EventBus,
    game_id: GameId,
    subscriber_id: usize,
    pub receiver: EventReceiver,
}

impl EventSubscription {
    pub fn receiver(&mut self) -> &mut EventReceiver {
        &mut self.receiver
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.game_id, self.subscriber_id);
    }
}

/// Per-game fan-out of [`GameEvent`]s over bounded channels. A subscriber
/// whose channel is full or closed is dropped rather than blocking play.
#[derive(Debug, Clone)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

#[derive(Debug)]
struct EventBusInner {
    subscribers: RwLock<HashMap<GameId, Vec<(usize, EventSender)>>>,
    next_id: AtomicUsize,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CHANNEL_CAPACITY)
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(EventBusInner {
                subscribers: RwLock::new(HashMap::new()),
                next_id: AtomicUsize::new(0),
                capacity: capacity.max(1),
            }),
        }
    }

    pub fn subscribe(&self, game_id: GameId) -> EventSubscription {
        let (subscriber_id, receiver) = self.subscribe_raw(game_id.clone());
        EventSubscription {
            bus: self.clone(),
            game_id,
            subscriber_id,
            receiver,
        }
    }

    fn subscribe_raw(&self, game_id: GameId) -> (usize, EventReceiver) {
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let id = self.inner.next_id.fetch_add(1, Ordering::AcqRel);
        self.write()
            .entry(game_id.clone())
            .or_default()
            .push((id, tx));

        tracing::info!(
            game_id = %game_id,
            subscriber_id = id,
            "client subscribed to game events"
        );

        (id, rx)
    }

    pub fn broadcast(&self, game_id: &str, event: GameEvent) {
        tracing::debug!(
            game_id = %game_id,
            event_type = event.kind(),
            "broadcasting game event"
        );

        let subscribers = self.read().get(game_id).cloned();
        let Some(list) = subscribers else {
            return;
        };

        let mut failed = Vec::new();
        for (id, sender) in list {
            if let Err(e) = sender.try_send(event.clone()) {
                tracing::warn!(
                    game_id = %game_id,
                    subscriber_id = id,
                    error = ?e,
                    "dropping slow or closed subscriber"
                );
                failed.push(id);
            }
        }
        if !failed.is_empty() {
            self.remove_subscribers(game_id, &failed);
        }
    }

    pub fn unsubscribe(&self, game_id: &str, subscriber_id: usize) {
        self.remove_subscribers(game_id, &[subscriber_id]);
    }

    /// Closes every stream for the game. Events already queued are still
    /// delivered.
    pub fn drop_game(&self, game_id: &str) {
        self.write().remove(game_id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.read().values().map(|list| list.len()).sum()
    }

    fn remove_subscribers(&self, game_id: &str, ids: &[usize]) {
        let mut guard = self.write();
        if let Some(list) = guard.get_mut(game_id) {
            list.retain(|(id, _)| !ids.contains(id));
            if list.is_empty() {
                guard.remove(game_id);
            }
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<GameId, Vec<(usize, EventSender)>>> {
        self.inner
            .subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<GameId, Vec<(usize, EventSender)>>> {
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// What everyone watching a game may learn. Hidden identities never appear
/// here; only a winning attacker's rank is public.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    GameCreated {
        game_id: GameId,
        lobby_id: String,
    },
    SetupCommitted {
        game_id: GameId,
        side: Side,
    },
    GameStarted {
        game_id: GameId,
        current_turn: Side,
    },
    MoveMade {
        game_id: GameId,
        mover: Side,
        from: Position,
        to: Position,
        move_type: MoveType,
        #[serde(skip_serializing_if = "Option::is_none")]
        outcome: Option<Outcome>,
        #[serde(skip_serializing_if = "Option::is_none")]
        revealed: Option<Rank>,
        next_turn: Side,
    },
    GameEnded {
        game_id: GameId,
        winner: Option<Side>,
        reason: Option<GameEndReason>,
    },
}

impl GameEvent {
    pub fn move_made(game_id: &str, record: &MoveRecord, next_turn: Side) -> Self {
        let outcome = record.challenge_result.map(|r| r.winner);
        let revealed = match outcome {
            Some(Outcome::Attacker) => Some(record.piece),
            _ => None,
        };
        GameEvent::MoveMade {
            game_id: game_id.to_string(),
            mover: record.mover,
            from: record.from,
            to: record.to,
            move_type: record.move_type,
            outcome,
            revealed,
            next_turn,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GameEvent::GameCreated { .. } => "game_created",
            GameEvent::SetupCommitted { .. } => "setup_committed",
            GameEvent::GameStarted { .. } => "game_started",
            GameEvent::MoveMade { .. } => "move_made",
            GameEvent::GameEnded { .. } => "game_ended",
        }
    }
}
