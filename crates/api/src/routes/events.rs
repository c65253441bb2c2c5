//! Committed-change SSE feed.
//!
//! Streams the id of every entity mutated by a committed operation
//! (account, order, institute). Events carry no payload; clients re-fetch
//! through the read API. A lagging client skips missed events and keeps
//! going - the feed is a cache-invalidation hint, not a source of truth.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;

use crate::auth::CurrentUser;
use crate::state::AppState;

/// `GET /events`
pub async fn stream(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.engine().subscribe();
    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(change) => {
                    match Event::default().event("change").json_data(&change) {
                        Ok(event) => yield Ok(event),
                        Err(error) => {
                            tracing::warn!(%error, "failed to encode change event");
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "event subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::default())
}
