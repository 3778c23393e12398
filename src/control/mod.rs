//! Control facade
//!
//! Orchestrates the lifecycle of the traffic monitor on behalf of an
//! externally managed proxy engine, consuming only the bus and monitor
//! public contracts. Engine process supervision itself lives outside this
//! crate; the engine event kinds exist for external publishers.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::{Error, Result};
use crate::event::{EventBus, EventKind, EventPayload};
use crate::telemetry::TrafficMonitor;

/// Proxy routing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// All traffic through the engine
    Global,
    /// Rule-based routing
    #[default]
    Rule,
    /// Direct connections only
    Direct,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Global => "global",
            Mode::Rule => "rule",
            Mode::Direct => "direct",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Facade over the monitor lifecycle and mode switches.
///
/// `start` spawns the sampling loop; `stop` fires the shutdown broadcast
/// and waits for the loop to exit. Both publish the matching lifecycle
/// events on the bus.
pub struct ProxyControl {
    bus: Arc<EventBus>,
    monitor: Arc<TrafficMonitor>,
    mode: Mutex<Mode>,
    running: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl ProxyControl {
    pub fn new(bus: Arc<EventBus>, monitor: Arc<TrafficMonitor>, mode: Mode) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            bus,
            monitor,
            mode: Mutex::new(mode),
            running: AtomicBool::new(false),
            shutdown_tx,
            loop_handle: Mutex::new(None),
        }
    }

    /// Start the control plane: spawn the sampling loop and announce it.
    ///
    /// Errors if already running. Must be called from within a Tokio
    /// runtime.
    pub fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyRunning);
        }

        let mode = self.mode();
        info!("Starting control plane (mode: {})", mode);

        let monitor = Arc::clone(&self.monitor);
        let shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            monitor.run(shutdown_rx).await;
        });
        *self.lock_handle() = Some(handle);

        let payload = EventPayload::builder().set("mode", mode.as_str()).build();
        self.bus.publish_async(EventKind::ProxyStarted, payload);
        Ok(())
    }

    /// Stop the control plane: cancel the sampling loop and wait for it.
    ///
    /// Errors if not running. Async handler tasks already in flight are
    /// fire-and-forget and not awaited.
    pub async fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(Error::NotRunning);
        }

        info!("Stopping control plane");
        let _ = self.shutdown_tx.send(());

        let handle = self.lock_handle().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        self.bus.publish_async(EventKind::ProxyStopped, EventPayload::empty());
        info!("Control plane stopped");
        Ok(())
    }

    /// Switch routing mode and announce the change.
    ///
    /// Errors if the control plane is not running.
    pub fn set_mode(&self, mode: Mode) -> Result<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(Error::NotRunning);
        }

        *self.mode.lock().unwrap_or_else(PoisonError::into_inner) = mode;
        info!("Proxy mode switched to: {}", mode);

        let payload = EventPayload::builder().set("new_mode", mode.as_str()).build();
        self.bus.publish_async(EventKind::ModeChanged, payload);
        Ok(())
    }

    pub fn mode(&self) -> Mode {
        *self.mode.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The monitor this facade drives
    pub fn monitor(&self) -> &Arc<TrafficMonitor> {
        &self.monitor
    }

    fn lock_handle(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.loop_handle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
