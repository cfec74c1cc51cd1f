//! HTTP game service for Game of the Generals.
//!
//! [`GameService`] owns the lifecycle of every game: creation from a lobby,
//! setup, moves, explicit and clock-driven termination, and the post-game
//! sequence. Writes go through a versioned [`GameStore`] with retried
//! optimistic commits; the warp routes in [`server`] are a thin layer over it.

pub mod clock;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod hooks;
pub mod logging;
pub mod middleware;
pub mod retry;
pub mod server;
pub mod service;
pub mod settings;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{ErrorResponse, ErrorSeverity, IntoErrorResponse};
pub use events::{EventBus, EventSubscription, GameEvent};
pub use hooks::{
    HookCall, HookError, MatchOutcome, NoopHooks, NoopPresence, PostGameHooks, PresenceRooms,
    RatingUpdate, RecordingHooks, StatUpdate,
};
pub use logging::{LogEntry, LogFormat, TestLogSubscriber, init_logging, init_test_logging};
pub use middleware::{log_response, with_request_logging};
pub use retry::{RetryPolicy, with_retry};
pub use server::{AppContext, ServerConfig, ServerError, ServerHandle, WebServer};
pub use service::{
    GameReplay, GameService, MatchResult, PlayerResult, ServiceError, StartedGame, Termination,
};
pub use settings::{AppSettings, SettingsError};
pub use store::{GameStore, InMemoryGameStore, StoreError, Version, Versioned};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_provides_shared_components() {
        let ctx = AppContext::new_for_tests();

        assert_eq!(ctx.event_bus().subscriber_count(), 0);
        assert_eq!(ctx.settings(), &AppSettings::default());
        assert!(ctx.games().get_game("missing", "alice").unwrap().is_none());
    }
}
