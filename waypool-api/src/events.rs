use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Extension,
};
use futures_util::stream::Stream;
use futures_util::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// SSE bridge over the caller's fan-out subscription. Each event carries the
/// topic as its event name and the payload as JSON data; lagged subscribers
/// silently lose events (best-effort channel).
pub async fn event_stream(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.fanout.subscribe(user.id);

    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(envelope) => {
                let data = match serde_json::to_string(&envelope.payload) {
                    Ok(data) => data,
                    Err(_) => return None,
                };
                Some(Ok(Event::default().event(envelope.topic).data(data)))
            }
            // Lagged receiver; skip and keep streaming.
            Err(_) => None,
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
