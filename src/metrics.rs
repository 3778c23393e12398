//! Prometheus metrics
//!
//! Gauges mirroring the traffic monitor's published state, kept fresh by
//! the [`export`] bus handler and exposed via the stats API's /metrics
//! endpoint.

use lazy_static::lazy_static;
use prometheus::{IntGauge, Registry};

use crate::event::{EventKind, EventPayload};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Current upload speed in bytes per second
    pub static ref UPLOAD_SPEED: IntGauge = IntGauge::new(
        "flowgate_upload_speed_bytes",
        "Current upload speed in bytes per second"
    ).unwrap();

    /// Current download speed in bytes per second
    pub static ref DOWNLOAD_SPEED: IntGauge = IntGauge::new(
        "flowgate_download_speed_bytes",
        "Current download speed in bytes per second"
    ).unwrap();

    /// Bytes uploaded this session
    pub static ref SESSION_UPLOAD_BYTES: IntGauge = IntGauge::new(
        "flowgate_session_upload_bytes",
        "Total bytes uploaded since the last session reset"
    ).unwrap();

    /// Bytes downloaded this session
    pub static ref SESSION_DOWNLOAD_BYTES: IntGauge = IntGauge::new(
        "flowgate_session_download_bytes",
        "Total bytes downloaded since the last session reset"
    ).unwrap();
}

/// Register all metrics with the global registry
pub fn init_metrics() {
    REGISTRY.register(Box::new(UPLOAD_SPEED.clone())).ok();
    REGISTRY.register(Box::new(DOWNLOAD_SPEED.clone())).ok();
    REGISTRY.register(Box::new(SESSION_UPLOAD_BYTES.clone())).ok();
    REGISTRY.register(Box::new(SESSION_DOWNLOAD_BYTES.clone())).ok();
}

/// Bus handler that exports traffic updates as Prometheus gauges.
///
/// Subscribe it to [`EventKind::TrafficUpdated`].
pub fn export(kind: EventKind, payload: &EventPayload) {
    if kind != EventKind::TrafficUpdated {
        return;
    }
    UPLOAD_SPEED.set(payload.get_i64("upload_speed").unwrap_or(0));
    DOWNLOAD_SPEED.set(payload.get_i64("download_speed").unwrap_or(0));
    SESSION_UPLOAD_BYTES.set(payload.get_i64("total_upload").unwrap_or(0));
    SESSION_DOWNLOAD_BYTES.set(payload.get_i64("total_download").unwrap_or(0));
}

/// Format bytes to human readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    const GB: u64 = 1024 * 1024 * 1024;
    const TB: u64 = 1024 * 1024 * 1024 * 1024;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format bytes per second to human readable string
pub fn format_speed(bytes_per_sec: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    const GB: f64 = 1024.0 * 1024.0 * 1024.0;

    if bytes_per_sec >= GB {
        format!("{:.2} GB/s", bytes_per_sec / GB)
    } else if bytes_per_sec >= MB {
        format!("{:.2} MB/s", bytes_per_sec / MB)
    } else if bytes_per_sec >= KB {
        format!("{:.2} KB/s", bytes_per_sec / KB)
    } else {
        format!("{:.0} B/s", bytes_per_sec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1024 * 1024), "1.00 MB");
    }

    #[test]
    fn test_format_speed() {
        assert_eq!(format_speed(500.0), "500 B/s");
        assert_eq!(format_speed(1024.0), "1.00 KB/s");
        assert_eq!(format_speed(1024.0 * 1024.0), "1.00 MB/s");
    }

    #[test]
    fn test_export_sets_gauges() {
        let payload = EventPayload::builder()
            .set("upload_speed", 111u64)
            .set("download_speed", 222u64)
            .set("total_upload", 333u64)
            .set("total_download", 444u64)
            .build();

        export(EventKind::TrafficUpdated, &payload);
        assert_eq!(UPLOAD_SPEED.get(), 111);
        assert_eq!(DOWNLOAD_SPEED.get(), 222);
        assert_eq!(SESSION_UPLOAD_BYTES.get(), 333);
        assert_eq!(SESSION_DOWNLOAD_BYTES.get(), 444);

        // Other kinds are ignored
        export(EventKind::SystemInfo, &EventPayload::empty());
        assert_eq!(UPLOAD_SPEED.get(), 111);
    }
}
