//! Server-Sent Events support
//!
//! Pushes a full session snapshot after every mutation so the page can
//! re-render from state alone.

use crate::session::SessionSnapshot;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;

/// Convert a snapshot receiver to an SSE stream.
///
/// The current snapshot goes out first; intermediate snapshots published
/// faster than the client reads are collapsed into the latest one.
pub fn sse_stream(
    updates: watch::Receiver<SessionSnapshot>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = WatchStream::new(updates).map(|snapshot| Ok::<_, Infallible>(snapshot_event(&snapshot)));

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn snapshot_event(snapshot: &SessionSnapshot) -> Event {
    let data = serde_json::to_string(snapshot).unwrap_or_else(|_| "{}".to_string());
    Event::default().event("snapshot").data(data)
}
