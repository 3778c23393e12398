//! Flowgate - local control plane for an external proxy engine
//!
//! # Architecture
//!
//! ```text
//! SampleSource (interface counters, injected)
//! → TrafficMonitor (sampling loop, windowed speed, session counters)
//! → EventBus (fan-out to subscribers)
//! → Handlers (loggers, metrics exporter, UI updaters, ...)
//! ```
//!
//! ## Core Principles
//!
//! - The monitor is the single writer to traffic state; readers get deep
//!   snapshots, never torn reads
//! - The bus never holds a lock while a handler runs, and a faulting
//!   handler never reaches the publisher or its siblings
//! - The proxy engine itself is externally managed; this crate only
//!   observes and announces
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── event/           # Event bus: kinds, payloads, delivery, handlers
//! ├── telemetry/       # Traffic monitor: samples, history, speed
//! ├── control/         # Facade: lifecycle and mode switching
//! ├── api.rs           # Stats HTTP endpoint (JSON + Prometheus)
//! ├── metrics.rs       # Prometheus gauges and formatting helpers
//! └── config.rs        # JSON configuration
//! ```

// Core components
pub mod event;
pub mod telemetry;

// Application
pub mod api;
pub mod config;
pub mod control;
pub mod error;
pub mod metrics;

// Re-exports for convenience
pub use config::Config;
pub use control::{Mode, ProxyControl};
pub use error::{Error, Result};
pub use event::{EventBus, EventKind, EventPayload, PayloadBuilder, SubscriptionHandle};
pub use telemetry::{MonitorConfig, SampleSource, TrafficMonitor, TrafficSample, TrafficStats};
