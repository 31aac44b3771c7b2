//! Shared progress slot and coarse stop flag.
//!
//! One slot per process, updated by whichever stage is running and polled
//! by callers every few seconds. There is no push channel. The stop flag is
//! a `CancellationToken` consulted only at stage boundaries; an in-flight
//! batch always finishes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncProgress {
    pub active: bool,
    pub percentage: f32,
    pub message: String,
    pub updated_at: DateTime<Utc>,
}

impl Default for SyncProgress {
    fn default() -> Self {
        Self { active: false, percentage: 0.0, message: String::new(), updated_at: Utc::now() }
    }
}

#[derive(Clone)]
pub struct ProgressTracker {
    slot: Arc<RwLock<SyncProgress>>,
    stop: Arc<RwLock<CancellationToken>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(RwLock::new(SyncProgress::default())),
            stop: Arc::new(RwLock::new(CancellationToken::new())),
        }
    }

    /// Mark a run as active, reset the percentage and install a fresh stop
    /// token. The only place the percentage may move backwards.
    pub async fn begin(&self, message: impl Into<String>) {
        let mut slot = self.slot.write().await;
        *slot = SyncProgress {
            active: true,
            percentage: 0.0,
            message: message.into(),
            updated_at: Utc::now(),
        };
        *self.stop.write().await = CancellationToken::new();
    }

    /// Publish progress. Clamped upward so observed progress never
    /// decreases within a run.
    pub async fn update(&self, percentage: f32, message: impl Into<String>) {
        let mut slot = self.slot.write().await;
        slot.percentage = slot.percentage.max(percentage.clamp(0.0, 100.0));
        slot.message = message.into();
        slot.updated_at = Utc::now();
        debug!("progress {:.1}%: {}", slot.percentage, slot.message);
    }

    /// Mark the run finished; the percentage freezes where it is.
    pub async fn finish(&self, message: impl Into<String>) {
        let mut slot = self.slot.write().await;
        slot.active = false;
        slot.message = message.into();
        slot.updated_at = Utc::now();
    }

    pub async fn snapshot(&self) -> SyncProgress {
        self.slot.read().await.clone()
    }

    pub async fn request_stop(&self) {
        self.stop.read().await.cancel();
    }

    pub async fn stop_requested(&self) -> bool {
        self.stop.read().await.is_cancelled()
    }

    /// A view of this tracker that maps a stage-local 0–100 range into the
    /// `[base, base + span]` band of the overall run.
    pub fn scoped(&self, base: f32, span: f32) -> ProgressScope {
        ProgressScope { tracker: self.clone(), base, span }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Stage-local progress reporter; see [`ProgressTracker::scoped`].
#[derive(Clone)]
pub struct ProgressScope {
    tracker: ProgressTracker,
    base: f32,
    span: f32,
}

impl ProgressScope {
    pub async fn report(&self, stage_percentage: f32, message: impl Into<String>) {
        let overall = self.base + self.span * stage_percentage.clamp(0.0, 100.0) / 100.0;
        self.tracker.update(overall, message).await;
    }
}
