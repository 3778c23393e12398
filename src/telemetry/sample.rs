//! Traffic sample types and the sample source contract

use std::time::Instant;

/// One observation tick, immutable once stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrafficSample {
    /// When the sample was recorded
    pub timestamp: Instant,
    /// Bytes uploaded in this tick
    pub upload: u64,
    /// Bytes downloaded in this tick
    pub download: u64,
    /// upload + download
    pub total: u64,
}

/// Deep, consistent snapshot of the monitor's traffic state.
///
/// Taken under a single lock acquisition; current, session and history
/// values always belong to the same instant.
#[derive(Debug, Clone, Default)]
pub struct TrafficStats {
    pub current_upload: u64,
    pub current_download: u64,
    pub current_total: u64,

    /// Cumulative per-direction byte counts since the last session reset
    pub session_upload: u64,
    pub session_download: u64,
    pub session_total: u64,

    /// Bounded FIFO window of past samples, oldest first
    pub history: Vec<TrafficSample>,
}

/// Supplier of per-tick traffic observations.
///
/// Implementations return the bytes transferred since the previous tick,
/// `(upload, download)`. A real implementation reads OS interface counters;
/// acquiring those is outside the monitor's scope, which is why the source
/// is injected.
pub trait SampleSource: Send + Sync {
    fn sample(&self) -> (u64, u64);
}
