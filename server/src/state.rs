use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parkmap_shared::detail::render_detailed;
use parkmap_shared::summary::summarize;
use parkmap_shared::{LotSnapshot, MapSettings};
use tokio::sync::{RwLock, broadcast};
use tracing::warn;

use crate::config::{sse_broadcast_buffer, upstream_connect_timeout, upstream_http_timeout};

/// Pre-serialized SSE event, serialized once by the poller and shared by all clients.
#[derive(Debug, Clone)]
pub enum PreSerializedEvent {
    Snapshot { seq: u64, json: Arc<Bytes> },
}

/// JSON bodies derived from one snapshot. None of them depend on the sequence
/// number, so they are built before the live lock is taken.
#[derive(Debug, Clone)]
pub struct LayerPayloads {
    pub lots_json: Arc<Bytes>,
    pub summary_json: Arc<Bytes>,
    pub spaces_json: Arc<Bytes>,
}

impl LayerPayloads {
    pub fn build(lots: &LotSnapshot) -> Result<Self, serde_json::Error> {
        Ok(Self {
            lots_json: Arc::new(Bytes::from(serde_json::to_vec(lots)?)),
            summary_json: Arc::new(Bytes::from(serde_json::to_vec(&summarize(lots))?)),
            spaces_json: Arc::new(Bytes::from(serde_json::to_vec(&render_detailed(lots))?)),
        })
    }
}

impl Default for LayerPayloads {
    fn default() -> Self {
        Self {
            lots_json: Arc::new(Bytes::from_static(b"[]")),
            summary_json: Arc::new(Bytes::from_static(b"[]")),
            spaces_json: Arc::new(Bytes::from_static(b"[]")),
        }
    }
}

/// The snapshot every reader sees. Replaced as a whole under the write lock.
#[derive(Debug, Clone)]
pub struct LiveSnapshot {
    /// Publication counter; advances only when the lot data changes.
    pub seq: u64,
    /// Poll request that produced (or last confirmed) this data.
    pub request_id: u64,
    pub timestamp: String,
    pub lots: Arc<LotSnapshot>,
    pub payloads: LayerPayloads,
    /// `LotEvent::Snapshot` JSON; empty until the first successful poll.
    pub snapshot_event_json: Arc<Bytes>,
}

impl Default for LiveSnapshot {
    fn default() -> Self {
        Self {
            seq: 0,
            request_id: 0,
            timestamp: Utc::now().to_rfc3339(),
            lots: Arc::new(LotSnapshot::default()),
            payloads: LayerPayloads::default(),
            snapshot_event_json: Arc::new(Bytes::new()),
        }
    }
}

/// Splice already-serialized lots into a `LotEvent::Snapshot` body.
pub fn snapshot_event_json(
    seq: u64,
    timestamp: &str,
    lots_json: &[u8],
) -> Result<Bytes, serde_json::Error> {
    let timestamp_json = serde_json::to_string(timestamp)?;
    let seq_json = seq.to_string();

    let mut buf = Vec::with_capacity(lots_json.len() + 96);
    buf.extend_from_slice(b"{\"type\":\"Snapshot\",\"seq\":");
    buf.extend_from_slice(seq_json.as_bytes());
    buf.extend_from_slice(b",\"lots\":");
    buf.extend_from_slice(lots_json);
    buf.extend_from_slice(b",\"timestamp\":");
    buf.extend_from_slice(timestamp_json.as_bytes());
    buf.push(b'}');
    Ok(Bytes::from(buf))
}

#[derive(Clone)]
pub struct AppState {
    pub live_snapshot: Arc<RwLock<LiveSnapshot>>,
    /// Monotonic across poller restarts so stale completions stay detectable.
    pub next_request_id: Arc<AtomicU64>,
    pub event_tx: broadcast::Sender<PreSerializedEvent>,
    pub http_client: reqwest::Client,
    pub map: Arc<MapSettings>,
    /// Simulated `/data` body, present only when the demo feed is enabled.
    pub demo_feed: Option<Arc<RwLock<Bytes>>>,
    pub observability: Arc<ObservabilityCounters>,
}

#[derive(Debug, Default)]
pub struct ObservabilityCounters {
    polls_started_total: AtomicU64,
    polls_succeeded_total: AtomicU64,
    fetch_failures_total: AtomicU64,
    malformed_payloads_total: AtomicU64,
    stale_completions_total: AtomicU64,
    snapshots_published_total: AtomicU64,
    view_requests_total: AtomicU64,
    /// Unix millis of the last successful poll, 0 before the first one.
    last_success_unix_ms: AtomicI64,
}

#[derive(Debug, Clone, Copy)]
pub struct ObservabilitySnapshot {
    pub polls_started_total: u64,
    pub polls_succeeded_total: u64,
    pub fetch_failures_total: u64,
    pub malformed_payloads_total: u64,
    pub stale_completions_total: u64,
    pub snapshots_published_total: u64,
    pub view_requests_total: u64,
    pub last_success: Option<DateTime<Utc>>,
}

impl ObservabilityCounters {
    pub fn snapshot(&self) -> ObservabilitySnapshot {
        let last_success_ms = self.last_success_unix_ms.load(Ordering::Relaxed);
        ObservabilitySnapshot {
            polls_started_total: self.polls_started_total.load(Ordering::Relaxed),
            polls_succeeded_total: self.polls_succeeded_total.load(Ordering::Relaxed),
            fetch_failures_total: self.fetch_failures_total.load(Ordering::Relaxed),
            malformed_payloads_total: self.malformed_payloads_total.load(Ordering::Relaxed),
            stale_completions_total: self.stale_completions_total.load(Ordering::Relaxed),
            snapshots_published_total: self.snapshots_published_total.load(Ordering::Relaxed),
            view_requests_total: self.view_requests_total.load(Ordering::Relaxed),
            last_success: (last_success_ms > 0)
                .then(|| DateTime::from_timestamp_millis(last_success_ms))
                .flatten(),
        }
    }

    pub fn record_poll_started(&self) {
        self.polls_started_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_poll_succeeded(&self) {
        self.polls_succeeded_total.fetch_add(1, Ordering::Relaxed);
        self.last_success_unix_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn record_fetch_failure(&self) {
        self.fetch_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed_payload(&self) {
        self.malformed_payloads_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_completion(&self) {
        self.stale_completions_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_snapshot_published(&self) {
        self.snapshots_published_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_view_request(&self) {
        self.view_requests_total.fetch_add(1, Ordering::Relaxed);
    }
}

impl AppState {
    pub fn new(map: MapSettings, demo_feed: bool) -> Self {
        let (event_tx, _) = broadcast::channel(sse_broadcast_buffer());
        let request_timeout = upstream_http_timeout();
        let connect_timeout = upstream_connect_timeout();
        let http_client = reqwest::Client::builder()
            .user_agent("parkmap/0.1")
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(
                    error = %e,
                    "failed to build configured HTTP client, falling back to defaults"
                );
                reqwest::Client::new()
            });
        Self {
            live_snapshot: Arc::new(RwLock::new(LiveSnapshot::default())),
            next_request_id: Arc::new(AtomicU64::new(0)),
            event_tx,
            http_client,
            map: Arc::new(map),
            demo_feed: demo_feed.then(|| Arc::new(RwLock::new(Bytes::from_static(b"[]")))),
            observability: Arc::new(ObservabilityCounters::default()),
        }
    }
}
