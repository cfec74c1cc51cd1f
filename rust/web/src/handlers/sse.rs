use crate::errors::IntoErrorResponse;
use crate::events::{EventBus, EventSubscription, GameEvent};
use crate::service::{GameService, ServiceError};
use gotg_engine::errors::GameError;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use warp::http;
use warp::reply::{self, Response};
use warp::sse;
use warp::Reply;

/// Server-sent stream of public [`GameEvent`]s for one game. The stream ends
/// after `game_ended`.
pub async fn stream_events(
    game_id: String,
    caller: Option<String>,
    games: Arc<GameService>,
    event_bus: Arc<EventBus>,
) -> Response {
    let Some(viewer) = caller else {
        return ServiceError::Unauthenticated.into_http_response();
    };
    match games.get_game(&game_id, &viewer) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return ServiceError::from(GameError::NotFound(format!("game {game_id}")))
                .into_http_response();
        }
        Err(err) => return err.into_http_response(),
    }

    let subscription = event_bus.subscribe(game_id);
    let stream = subscription_stream(subscription);
    let keep_alive = sse::keep_alive()
        .interval(Duration::from_secs(15))
        .text(":keep-alive\n");

    let reply = sse::reply(keep_alive.stream(stream));
    reply::with_header(reply, http::header::CACHE_CONTROL, "no-cache").into_response()
}

fn subscription_stream(
    subscription: EventSubscription,
) -> impl tokio_stream::Stream<Item = Result<sse::Event, Infallible>> {
    let mut subscription = subscription;
    let (_, placeholder_rx) = mpsc::channel(1);
    let receiver = std::mem::replace(&mut subscription.receiver, placeholder_rx);
    let subscription = Arc::new(subscription);

    ReceiverStream::new(receiver).map(move |event| {
        let _keep_alive = Arc::clone(&subscription);
        Ok(render_event(event))
    })
}

fn render_event(event: GameEvent) -> sse::Event {
    let (name, data) = event_payload(&event);
    sse::Event::default().event(name).data(data)
}

/// SSE event name and JSON data line for `event`.
fn event_payload(event: &GameEvent) -> (&'static str, String) {
    match serde_json::to_string(event) {
        Ok(json) => (event.kind(), json),
        Err(err) => {
            let fallback = serde_json::json!({
                "type": "error",
                "message": format!("failed to serialize game event: {err}")
            })
            .to_string();
            ("error", fallback)
        }
    }
}
