use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::realtime::RealtimeEvent;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct EventsQuery {
    pub user_id: Uuid,
}

/// GET /api/v1/events
///
/// Server-sent event stream of messages and notifications addressed to `user_id`.
pub async fn handle_events(
    State(state): State<AppState>,
    Query(params): Query<EventsQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    crate::users::store::get_user(&state.db, params.user_id).await?;
    info!("Realtime stream opened for user {}", params.user_id);

    let stream = user_events(BroadcastStream::new(state.realtime.subscribe()), params.user_id)
        .map(|event| Ok::<_, Infallible>(to_sse_event(&event)));

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

/// Filters the shared broadcast down to the events addressed to one user.
fn user_events(
    events: BroadcastStream<RealtimeEvent>,
    user_id: Uuid,
) -> impl Stream<Item = RealtimeEvent> {
    events.filter_map(move |item| async move {
        match item {
            Ok(event) if event.user_id == user_id => Some(event),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!("Realtime stream for user {user_id} lagged, skipped {skipped} events");
                None
            }
        }
    })
}

fn to_sse_event(event: &RealtimeEvent) -> Event {
    Event::default()
        .event(event.kind.as_str())
        .data(event.payload.to_string())
}
