//! # Observability Sinks
//!
//! Every remote call produces one [`CallRecord`]. The transport hands it to
//! whatever [`ObservabilitySink`] the client was built with.
//!
//! ```text
//! ┌──────────────┐   CallRecord   ┌─────────────────────────────────────────┐
//! │  Transport   │ ─────────────► │ Arc<dyn ObservabilitySink>              │
//! └──────────────┘                │   TracingSink  → info!/warn! events     │
//! │                               │   ApiLogSink   → api_logs table         │
//! │                               │   FanoutSink   → several of the above   │
//! │                               │   MemorySink   → Vec, for inspection    │
//! │                               └─────────────────────────────────────────┘
//! ```
//!
//! Sinks are advisory. A sink that fails logs the failure itself and the
//! call result is unaffected.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use ruten_db::{ApiLogRepository, NewApiLog};

// =============================================================================
// Call Record
// =============================================================================

/// How a remote call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Success,
    RemoteError,
    TransportError,
}

impl CallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Success => "success",
            CallOutcome::RemoteError => "remote_error",
            CallOutcome::TransportError => "transport_error",
        }
    }
}

/// One remote call, as observed by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallRecord {
    pub method: String,
    /// API path without host or query.
    pub endpoint: String,
    pub status: Option<u16>,
    pub elapsed_ms: u64,
    pub correlation_id: Option<String>,
    pub outcome: CallOutcome,
    /// Body exactly as sent; `None` for bodyless and multipart calls.
    pub request_body: Option<String>,
    /// Leading part of the response body.
    pub response_excerpt: Option<String>,
}

// =============================================================================
// Sink Trait
// =============================================================================

/// Receives call records. Implementations must not fail the call.
#[async_trait]
pub trait ObservabilitySink: Send + Sync {
    async fn record(&self, record: &CallRecord);
}

// =============================================================================
// Tracing Sink
// =============================================================================

/// Emits one `tracing` event per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl ObservabilitySink for TracingSink {
    async fn record(&self, record: &CallRecord) {
        match record.outcome {
            CallOutcome::Success => info!(
                method = %record.method,
                endpoint = %record.endpoint,
                status = ?record.status,
                elapsed_ms = record.elapsed_ms,
                correlation_id = ?record.correlation_id,
                "Remote call succeeded"
            ),
            outcome => warn!(
                method = %record.method,
                endpoint = %record.endpoint,
                status = ?record.status,
                elapsed_ms = record.elapsed_ms,
                correlation_id = ?record.correlation_id,
                outcome = outcome.as_str(),
                response = ?record.response_excerpt,
                "Remote call failed"
            ),
        }
    }
}

// =============================================================================
// API Log Sink
// =============================================================================

/// Persists each call to the `api_logs` table.
#[derive(Debug, Clone)]
pub struct ApiLogSink {
    repo: ApiLogRepository,
}

impl ApiLogSink {
    pub fn new(repo: ApiLogRepository) -> Self {
        ApiLogSink { repo }
    }
}

#[async_trait]
impl ObservabilitySink for ApiLogSink {
    async fn record(&self, record: &CallRecord) {
        let row = NewApiLog {
            endpoint: record.endpoint.clone(),
            method: record.method.clone(),
            request_data: record.request_body.clone(),
            response_data: record.response_excerpt.clone(),
            status_code: record.status,
            execution_ms: i64::try_from(record.elapsed_ms).unwrap_or(i64::MAX),
            correlation_id: record.correlation_id.clone(),
            outcome: record.outcome.as_str().to_string(),
        };

        if let Err(e) = self.repo.insert(&row).await {
            warn!(?e, endpoint = %record.endpoint, "Failed to persist API call log");
        }
    }
}

// =============================================================================
// Fanout / Memory
// =============================================================================

/// Forwards each record to several sinks in order.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn ObservabilitySink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn ObservabilitySink>>) -> Self {
        FanoutSink { sinks }
    }
}

#[async_trait]
impl ObservabilitySink for FanoutSink {
    async fn record(&self, record: &CallRecord) {
        for sink in &self.sinks {
            sink.record(record).await;
        }
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<CallRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies of everything recorded so far.
    pub fn records(&self) -> Vec<CallRecord> {
        match self.records.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl ObservabilitySink for MemorySink {
    async fn record(&self, record: &CallRecord) {
        match self.records.lock() {
            Ok(mut guard) => guard.push(record.clone()),
            Err(poisoned) => poisoned.into_inner().push(record.clone()),
        }
    }
}
