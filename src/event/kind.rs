//! Event kind identifiers

use std::fmt;

/// Category of an occurrence published on the bus.
///
/// The string names returned by [`EventKind::as_str`] are the wire contract
/// between publishers and subscribers and must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // Proxy lifecycle
    ProxyStarted,
    ProxyStopped,
    ModeChanged,
    ConfigChanged,

    // Traffic
    TrafficUpdated,
    SpeedChanged,

    // Connections
    ConnectionAdded,
    ConnectionRemoved,
    ConnectionError,

    // External engine lifecycle
    EngineStarted,
    EngineStopped,
    EngineError,
    ConfigLoaded,

    // System
    SystemError,
    SystemInfo,
}

impl EventKind {
    /// Stable string name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ProxyStarted => "proxy_started",
            EventKind::ProxyStopped => "proxy_stopped",
            EventKind::ModeChanged => "mode_changed",
            EventKind::ConfigChanged => "config_changed",
            EventKind::TrafficUpdated => "traffic_updated",
            EventKind::SpeedChanged => "speed_changed",
            EventKind::ConnectionAdded => "connection_added",
            EventKind::ConnectionRemoved => "connection_removed",
            EventKind::ConnectionError => "connection_error",
            EventKind::EngineStarted => "engine_started",
            EventKind::EngineStopped => "engine_stopped",
            EventKind::EngineError => "engine_error",
            EventKind::ConfigLoaded => "config_loaded",
            EventKind::SystemError => "system_error",
            EventKind::SystemInfo => "system_info",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
