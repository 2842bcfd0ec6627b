//! Transfer task model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    Download,
    Upload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    #[default]
    Queued,
    Active,
    Completed,
    Failed,
}

impl TransferStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Completed | TransferStatus::Failed)
    }
}

/// Bytes moved so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub done: u64,
    /// Unknown until the executor learns it, e.g. from `Content-Length`.
    pub total: Option<u64>,
}

impl Progress {
    pub fn fraction(&self) -> Option<f64> {
        match self.total {
            Some(0) => Some(1.0),
            Some(total) => Some((self.done as f64 / total as f64).min(1.0)),
            None => None,
        }
    }
}

/// What the caller asks the queue to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub id: String,
    pub kind: TransferKind,
    /// Opaque description of the payload, kept for observers.
    #[serde(default)]
    pub descriptor: serde_json::Value,
}

impl TransferRequest {
    pub fn new(id: impl Into<String>, kind: TransferKind) -> Self {
        Self {
            id: id.into(),
            kind,
            descriptor: serde_json::Value::Null,
        }
    }

    /// Request with a freshly generated id.
    pub fn generated(kind: TransferKind) -> Self {
        Self::new(Uuid::new_v4().to_string(), kind)
    }

    pub fn with_descriptor(mut self, descriptor: serde_json::Value) -> Self {
        self.descriptor = descriptor;
        self
    }
}

/// Snapshot of a task as the queue tracks it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferTask {
    pub id: String,
    pub kind: TransferKind,
    pub status: TransferStatus,
    pub descriptor: serde_json::Value,
    pub progress: Progress,
    /// Failure reason, passed through from the executor.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TransferTask {
    pub(crate) fn queued(request: TransferRequest) -> Self {
        Self {
            id: request.id,
            kind: request.kind,
            status: TransferStatus::Queued,
            descriptor: request.descriptor,
            progress: Progress::default(),
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }
}
