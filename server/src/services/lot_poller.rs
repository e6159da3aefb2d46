use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use parkmap_shared::{LotSnapshot, SnapshotError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::state::{AppState, LayerPayloads, LiveSnapshot, PreSerializedEvent, snapshot_event_json};

pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<LotSnapshot, PollError>> + Send + 'a>>;

const BODY_PREVIEW_CHARS: usize = 200;

/// Where snapshots come from. The HTTP feed in production, scripted in tests.
pub trait LotSource: Send + Sync + 'static {
    fn fetch(&self) -> FetchFuture<'_>;
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("upstream status {status}; body preview: {preview}")]
    Status {
        status: reqwest::StatusCode,
        preview: String,
    },

    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("{source}; body preview: {preview}")]
    Malformed {
        #[source]
        source: SnapshotError,
        preview: String,
    },
}

impl PollError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Malformed { .. } => "malformed_payload",
            Self::Transport(_) | Self::Status { .. } | Self::Body(_) => "fetch_failure",
        }
    }
}

/// `GET {base}/data` against the occupancy feed.
pub struct HttpLotSource {
    client: reqwest::Client,
    url: String,
}

impl HttpLotSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

impl LotSource for HttpLotSource {
    fn fetch(&self) -> FetchFuture<'_> {
        Box::pin(fetch_lots(&self.client, &self.url))
    }
}

fn body_preview(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .take(BODY_PREVIEW_CHARS)
        .collect()
}

async fn fetch_lots(client: &reqwest::Client, url: &str) -> Result<LotSnapshot, PollError> {
    let resp = client.get(url).send().await.map_err(PollError::Transport)?;
    let status = resp.status();
    let bytes = resp.bytes().await.map_err(PollError::Body)?;

    if !status.is_success() {
        return Err(PollError::Status {
            status,
            preview: body_preview(&bytes),
        });
    }

    LotSnapshot::from_json_slice(&bytes).map_err(|source| PollError::Malformed {
        source,
        preview: body_preview(&bytes),
    })
}

/// Running poller. Dropping the handle stops it.
pub struct PollerHandle {
    cancelled: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// No fetch is dispatched and no snapshot applied once this returns,
    /// except a write that already held the live lock.
    pub fn stop(&self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(task) = &self.task {
            task.abort();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Stop and wait until the polling task has fully unwound.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Fetch once right away, then once per `interval`, until the handle stops.
pub fn start<S: LotSource>(state: AppState, source: S, interval: Duration) -> PollerHandle {
    let cancelled = Arc::new(AtomicBool::new(false));
    let task = tokio::spawn(run(state, source, interval, Arc::clone(&cancelled)));
    PollerHandle {
        cancelled,
        task: Some(task),
    }
}

async fn run<S: LotSource>(
    state: AppState,
    source: S,
    period: Duration,
    cancelled: Arc<AtomicBool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // A slow fetch does not hold back the next tick; requests may overlap.
    let mut in_flight = FuturesUnordered::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if cancelled.load(Ordering::Acquire) {
                    break;
                }
                let request_id = state.next_request_id.fetch_add(1, Ordering::Relaxed) + 1;
                state.observability.record_poll_started();
                let fetch = source.fetch();
                in_flight.push(async move { (request_id, fetch.await) });
            }
            Some((request_id, result)) = in_flight.next(), if !in_flight.is_empty() => {
                handle_completion(&state, &cancelled, request_id, result).await;
            }
        }
    }
}

async fn handle_completion(
    state: &AppState,
    cancelled: &AtomicBool,
    request_id: u64,
    result: Result<LotSnapshot, PollError>,
) {
    let lots = match result {
        Ok(lots) => lots,
        Err(e) => {
            if matches!(e, PollError::Malformed { .. }) {
                state.observability.record_malformed_payload();
            } else {
                state.observability.record_fetch_failure();
            }
            warn!(
                request_id,
                kind = e.kind(),
                error = %e,
                "failed to poll lot data; keeping previous snapshot"
            );
            return;
        }
    };
    state.observability.record_poll_succeeded();

    match apply_snapshot(state, cancelled, request_id, lots).await {
        ApplyOutcome::Published { seq, lots, spaces } => {
            info!(seq, request_id, lots, spaces, "published new lot snapshot");
        }
        ApplyOutcome::Unchanged => {
            debug!(request_id, "lot data unchanged");
        }
        ApplyOutcome::Stale { held } => {
            state.observability.record_stale_completion();
            debug!(request_id, held, "discarding out-of-order poll completion");
        }
        ApplyOutcome::Cancelled => {
            debug!(request_id, "discarding poll completion after stop");
        }
        ApplyOutcome::Failed => {}
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ApplyOutcome {
    Published { seq: u64, lots: usize, spaces: usize },
    Unchanged,
    Stale { held: u64 },
    Cancelled,
    /// Already logged where it happened.
    Failed,
}

/// Swap in a freshly polled snapshot unless it is older than what is held
/// or the poller was stopped in the meantime.
pub(crate) async fn apply_snapshot(
    state: &AppState,
    cancelled: &AtomicBool,
    request_id: u64,
    lots: LotSnapshot,
) -> ApplyOutcome {
    let payloads = match LayerPayloads::build(&lots) {
        Ok(payloads) => payloads,
        Err(e) => {
            warn!(request_id, error = %e, "failed to serialize lot layers");
            return ApplyOutcome::Failed;
        }
    };

    let (outcome, event) = {
        let mut current = state.live_snapshot.write().await;
        if cancelled.load(Ordering::Acquire) {
            return ApplyOutcome::Cancelled;
        }
        if request_id <= current.request_id {
            return ApplyOutcome::Stale {
                held: current.request_id,
            };
        }
        if *current.lots == lots {
            current.request_id = request_id;
            return ApplyOutcome::Unchanged;
        }

        let Some(seq) = current.seq.checked_add(1) else {
            warn!("sequence counter overflow while publishing snapshot");
            return ApplyOutcome::Failed;
        };
        let timestamp = Utc::now().to_rfc3339();
        let event_json = match snapshot_event_json(seq, &timestamp, &payloads.lots_json) {
            Ok(json) => Arc::new(json),
            Err(e) => {
                warn!(request_id, error = %e, "failed to serialize snapshot event");
                return ApplyOutcome::Failed;
            }
        };

        let outcome = ApplyOutcome::Published {
            seq,
            lots: lots.len(),
            spaces: lots.total_spaces(),
        };
        *current = LiveSnapshot {
            seq,
            request_id,
            timestamp,
            lots: Arc::new(lots),
            payloads,
            snapshot_event_json: Arc::clone(&event_json),
        };
        (outcome, PreSerializedEvent::Snapshot { seq, json: event_json })
    };

    state.observability.record_snapshot_published();
    let _ = state.event_tx.send(event);
    outcome
}
