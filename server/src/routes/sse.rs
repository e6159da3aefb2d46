use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::Sse;
use axum::response::sse::{Event, KeepAlive};
use bytes::Bytes;
use futures::stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

use crate::config::SSE_KEEPALIVE_SECS;
use crate::state::{AppState, PreSerializedEvent};

pub async fn lot_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = async_stream::stream! {
        // Subscribe before reading the current snapshot so nothing published in between is lost.
        let rx = state.event_tx.subscribe();

        if let Some(event) = current_snapshot_event(&state).await {
            yield Ok(event);
        }

        let mut stream = BroadcastStream::new(rx);
        while let Some(result) = stream.next().await {
            match result {
                Ok(PreSerializedEvent::Snapshot { seq, json }) => {
                    let Some(event) = snapshot_event(seq, &json) else {
                        warn!(seq, "snapshot payload is not valid utf-8; dropping SSE event");
                        continue;
                    };
                    yield Ok(event);
                }
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(
                        skipped_events = skipped,
                        "SSE client lagged behind broadcast buffer; replaying snapshot"
                    );
                    if let Some(event) = current_snapshot_event(&state).await {
                        yield Ok(event);
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(SSE_KEEPALIVE_SECS))
            .text("keep-alive"),
    )
}

async fn current_snapshot_event(state: &AppState) -> Option<Event> {
    let (seq, data) = {
        let snapshot = state.live_snapshot.read().await;
        (snapshot.seq, snapshot.snapshot_event_json.clone())
    };
    if data.is_empty() {
        return None;
    }
    let event = snapshot_event(seq, &data);
    if event.is_none() {
        warn!(seq, "snapshot payload is not valid utf-8; skipping SSE snapshot");
    }
    event
}

fn snapshot_event(seq: u64, data: &Bytes) -> Option<Event> {
    let payload = std::str::from_utf8(data.as_ref()).ok()?;
    Some(
        Event::default()
            .id(seq.to_string())
            .event("snapshot")
            .data(payload),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    use futures::StreamExt;
    use parkmap_shared::{Lot, LotSnapshot, MapSettings, Space};

    use crate::services::lot_poller::apply_snapshot;
    use crate::state::AppState;

    fn lots(occupied: bool) -> LotSnapshot {
        LotSnapshot::new(vec![Lot {
            name: "Lot A".to_string(),
            coords: vec![[0.0, 0.0], [0.0, 1.0], [1.0, 1.0]],
            spaces: vec![Space {
                id: "1".to_string(),
                coords: vec![[0.0, 0.0], [0.0, 1.0], [1.0, 1.0]],
                occupied,
            }],
        }])
    }

    /// Read until one complete SSE frame (terminated by a blank line) is buffered.
    async fn next_frame(
        stream: &mut (impl futures::Stream<Item = reqwest::Result<bytes::Bytes>> + Unpin),
        buffer: &mut String,
    ) -> String {
        loop {
            if let Some(end) = buffer.find("\n\n") {
                let frame = buffer[..end].to_string();
                buffer.drain(..end + 2);
                if frame.starts_with(':') {
                    continue;
                }
                return frame;
            }
            let chunk = tokio::time::timeout(Duration::from_secs(5), stream.next())
                .await
                .expect("SSE chunk should arrive")
                .expect("SSE stream should stay open")
                .expect("SSE chunk should be readable");
            buffer.push_str(std::str::from_utf8(&chunk).expect("SSE chunk is utf-8"));
        }
    }

    #[tokio::test]
    async fn stream_sends_current_snapshot_then_updates() {
        let state = AppState::new(MapSettings::default(), false);
        apply_snapshot(&state, &AtomicBool::new(false), 1, lots(false)).await;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        let app = crate::app::build_app(state.clone());
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve test app");
        });

        let response = reqwest::Client::new()
            .get(format!("http://{addr}/api/events"))
            .send()
            .await
            .expect("events request")
            .error_for_status()
            .expect("events status");
        let mut body = response.bytes_stream();
        let mut buffer = String::new();

        let first = next_frame(&mut body, &mut buffer).await;
        assert!(first.contains("event: snapshot"), "{first}");
        assert!(first.contains("id: 1"), "{first}");
        assert!(first.contains("\"occupied\":false"), "{first}");

        apply_snapshot(&state, &AtomicBool::new(false), 2, lots(true)).await;
        let second = next_frame(&mut body, &mut buffer).await;
        assert!(second.contains("id: 2"), "{second}");
        assert!(second.contains("\"occupied\":true"), "{second}");

        server.abort();
        let _ = server.await;
    }
}
