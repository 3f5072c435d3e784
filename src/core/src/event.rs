//! Transfer progress events and the reporter capability that receives them.
//!
//! The copy and export pipelines never log directly; they hand every
//! progress step to a [`Reporter`]. [`TracingReporter`] forwards events to
//! `tracing`, [`EventEmitter`] fans them out over a broadcast channel.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Which role a blob plays in its manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobKind {
    Config,
    Layer,
}

impl std::fmt::Display for BlobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config => f.write_str("config"),
            Self::Layer => f.write_str("layer"),
        }
    }
}

/// A single progress step of a copy, export or inspect operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TransferEvent {
    CopyStarted {
        source: String,
        target: String,
    },
    BlobCopied {
        kind: BlobKind,
        digest: String,
    },
    ManifestPushed {
        target: String,
    },
    ExportStarted {
        reference: String,
        work_dir: String,
    },
    LayerExported {
        index: usize,
        blob_digest: String,
        diff_id: String,
        size: u64,
    },
    ConfigWritten {
        digest: String,
    },
    ExportFinished {
        reference: String,
        layers: usize,
    },
    /// Fetched content hashed to something other than its declared digest.
    DigestMismatch {
        subject: String,
        expected: String,
        calculated: String,
    },
}

impl TransferEvent {
    /// Whether the event should be surfaced to users as a warning.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::DigestMismatch { .. })
    }
}

/// Receives progress events from the transfer pipelines.
pub trait Reporter: Send + Sync {
    fn report(&self, event: &TransferEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn report(&self, _event: &TransferEvent) {}
}

/// Forwards events to `tracing`; warnings at WARN, progress at INFO.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, event: &TransferEvent) {
        match event {
            TransferEvent::CopyStarted { source, target } => {
                tracing::info!(source = %source, target = %target, "Copying image");
            }
            TransferEvent::BlobCopied { kind, digest } => {
                tracing::info!(kind = %kind, digest = %digest, "Copied blob");
            }
            TransferEvent::ManifestPushed { target } => {
                tracing::info!(target = %target, "Pushed manifest");
            }
            TransferEvent::ExportStarted { reference, work_dir } => {
                tracing::debug!(reference = %reference, dir = %work_dir, "Using temp directory for export");
            }
            TransferEvent::LayerExported {
                index,
                blob_digest,
                diff_id,
                size,
            } => {
                tracing::info!(
                    index,
                    layer = %blob_digest,
                    diff_id = %diff_id,
                    size,
                    "Exported layer"
                );
            }
            TransferEvent::ConfigWritten { digest } => {
                tracing::debug!(digest = %digest, "Wrote image config");
            }
            TransferEvent::ExportFinished { reference, layers } => {
                tracing::info!(reference = %reference, layers, "Export complete");
            }
            TransferEvent::DigestMismatch {
                subject,
                expected,
                calculated,
            } => {
                tracing::warn!(
                    subject = %subject,
                    expected = %expected,
                    calculated = %calculated,
                    "Digest mismatch"
                );
            }
        }
    }
}

/// Event emitter
#[derive(Clone)]
pub struct EventEmitter {
    sender: Arc<broadcast::Sender<TransferEvent>>,
}

impl EventEmitter {
    /// Create a new event emitter
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Emit an event
    pub fn emit(&self, event: TransferEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<TransferEvent> {
        self.sender.subscribe()
    }

    /// Subscribe to events with a filter
    pub fn subscribe_filtered(
        &self,
        filter: impl Fn(&TransferEvent) -> bool + Send + Sync + 'static,
    ) -> EventStream {
        EventStream {
            receiver: self.sender.subscribe(),
            filter: Arc::new(filter),
        }
    }
}

impl Reporter for EventEmitter {
    fn report(&self, event: &TransferEvent) {
        self.emit(event.clone());
    }
}

/// Event stream with filtering
pub struct EventStream {
    receiver: broadcast::Receiver<TransferEvent>,
    filter: Arc<dyn Fn(&TransferEvent) -> bool + Send + Sync>,
}

impl EventStream {
    /// Receive the next matching event
    pub async fn recv(&mut self) -> Option<TransferEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if (self.filter)(&event) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
