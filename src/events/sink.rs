use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// One event emitted by the graph runtime. `kind` is serialized as the `event`
/// field of the server-sent-events wire format (§6): `starting`,
/// `discovery_complete`, `routing`, `scanning`, `aggregating`, `threat_stage`,
/// `complete`, `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScanEvent {
    Starting {
        scan_id: String,
        project_id: String,
    },
    DiscoveryComplete {
        asset_count: usize,
        log_line_count: usize,
    },
    Routing {
        public_count: usize,
        private_count: usize,
    },
    Scanning {
        total_assets: usize,
        assets_scanned: usize,
    },
    Aggregating {
        scan_type: String,
        public_count: usize,
        private_count: usize,
    },
    ThreatStage {
        stage: String,
    },
    Complete {
        status: String,
        total_findings: usize,
        active_exploit_count: usize,
    },
    Error {
        message: String,
    },
}

/// Caller-supplied sink the runtime streams progress through. Implementations
/// must be non-blocking — the runtime never waits for a client to drain.
///
/// Backpressure policy: progress events (`Scanning`, `Routing`) may be dropped
/// oldest-first when the sink is saturated; `Complete` and `Error` are
/// best-effort retried once.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ScanEvent);
}

/// Reference sink backed by an unbounded mpsc channel — the shape the HTTP
/// surface wires to a server-sent-events stream, and the shape tests wire to
/// a buffer via an `UnboundedReceiver`.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ScanEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ScanEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: ScanEvent) {
        // Receiver dropped (client disconnected) is not a sink error.
        let _ = self.tx.send(event);
    }
}

/// No-op sink for call sites that don't need progress streaming (e.g. tests
/// focused purely on final state).
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: ScanEvent) {}
}
