//! Traffic telemetry
//!
//! This module owns all traffic state for the control plane:
//! - TrafficSample / TrafficStats: one observation tick and the snapshot
//!   of current, session and windowed history values
//! - SampleSource: injectable collaborator that supplies per-tick byte counts
//! - TrafficMonitor: the sampling loop, windowed speed computation and
//!   session accounting; publishes traffic updates on the event bus

mod monitor;
mod sample;

pub use monitor::{MonitorConfig, TrafficMonitor};
pub use sample::{SampleSource, TrafficSample, TrafficStats};
