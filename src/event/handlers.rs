//! Predefined event handlers
//!
//! Free functions with the handler signature, ready to pass to
//! [`EventBus::subscribe`](super::EventBus::subscribe). They only log; an
//! embedding application supplies its own handlers for anything richer.

use tracing::{error, info};

use crate::metrics::format_speed;

use super::kind::EventKind;
use super::payload::EventPayload;

/// Log every event it sees, with its payload
pub fn logging(kind: EventKind, payload: &EventPayload) {
    info!("Event: {}, payload: {}", kind, payload);
}

/// Log error events only
pub fn error_filter(kind: EventKind, payload: &EventPayload) {
    if matches!(kind, EventKind::SystemError | EventKind::EngineError) {
        error!("Error event: {}, payload: {}", kind, payload);
    }
}

/// Log traffic updates in human-readable form
pub fn traffic_logger(kind: EventKind, payload: &EventPayload) {
    if kind != EventKind::TrafficUpdated {
        return;
    }
    let upload_speed = payload.get_u64("upload_speed").unwrap_or(0);
    let download_speed = payload.get_u64("download_speed").unwrap_or(0);
    let total_upload = payload.get_u64("total_upload").unwrap_or(0);
    let total_download = payload.get_u64("total_download").unwrap_or(0);

    info!(
        "Traffic - up: {}, down: {}, session up: {} bytes, session down: {} bytes",
        format_speed(upload_speed as f64),
        format_speed(download_speed as f64),
        total_upload,
        total_download,
    );
}

/// Log proxy mode switches
pub fn mode_logger(kind: EventKind, payload: &EventPayload) {
    if kind == EventKind::ModeChanged {
        let new_mode = payload.get_str("new_mode").unwrap_or("?");
        info!("Proxy mode switched to: {}", new_mode);
    }
}

/// Log connection lifecycle events
pub fn connection_logger(kind: EventKind, payload: &EventPayload) {
    let address = payload.get_str("address").unwrap_or("?");
    match kind {
        EventKind::ConnectionAdded => info!("New connection: {}", address),
        EventKind::ConnectionRemoved => info!("Connection closed: {}", address),
        EventKind::ConnectionError => {
            let err = payload.get_str("error").unwrap_or("?");
            error!("Connection error: {}, cause: {}", address, err);
        }
        _ => {}
    }
}
