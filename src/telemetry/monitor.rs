//! Traffic monitor - sampling loop, windowed speed and session accounting

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::event::{EventBus, EventKind, EventPayload};

use super::sample::{SampleSource, TrafficSample, TrafficStats};

/// Tuning knobs for the traffic monitor
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Tick period of the sampling loop
    pub sample_interval: Duration,
    /// Maximum number of samples kept in the history window
    /// (3600 at 1-second ticks is roughly one hour)
    pub history_capacity: usize,
    /// Number of most recent samples used to compute instantaneous speed
    pub speed_lookback: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_secs(1),
            history_capacity: 3600,
            speed_lookback: 5,
        }
    }
}

/// All mutable traffic state, behind one lock so snapshots are never torn
#[derive(Default)]
struct StatsInner {
    current_upload: u64,
    current_download: u64,
    current_total: u64,

    session_upload: u64,
    session_download: u64,
    session_total: u64,

    history: VecDeque<TrafficSample>,
}

/// Ingests periodic traffic samples, maintains a bounded sliding-window
/// history, derives windowed throughput and tracks session counters.
///
/// The sampling loop is the single writer; every reader gets a deep
/// snapshot. Updates are published on the event bus as `traffic_updated`
/// events carrying `{upload_speed, download_speed, total_upload,
/// total_download}` (totals are session-cumulative).
pub struct TrafficMonitor {
    stats: Mutex<StatsInner>,
    interval: Mutex<Duration>,
    history_capacity: usize,
    speed_lookback: usize,
    bus: Arc<EventBus>,
    source: Option<Arc<dyn SampleSource>>,
}

impl TrafficMonitor {
    /// Build a monitor publishing on `bus`.
    ///
    /// Fails on a zero sample interval, zero history capacity or a speed
    /// lookback below 2 (two samples are the minimum for a rate).
    pub fn new(bus: Arc<EventBus>, config: MonitorConfig) -> Result<Self> {
        if config.sample_interval.is_zero() {
            return Err(Error::Config("sample interval must be positive".into()));
        }
        if config.history_capacity == 0 {
            return Err(Error::Config("history capacity must be positive".into()));
        }
        if config.speed_lookback < 2 {
            return Err(Error::Config("speed lookback must be at least 2".into()));
        }

        Ok(Self {
            stats: Mutex::new(StatsInner::default()),
            interval: Mutex::new(config.sample_interval),
            history_capacity: config.history_capacity,
            speed_lookback: config.speed_lookback,
            bus,
            source: None,
        })
    }

    /// Inject a real sample source.
    ///
    /// Without one the monitor feeds its own previously computed speed back
    /// in as the next sample - an explicit placeholder until interface
    /// counters are wired up.
    pub fn with_source(mut self, source: Arc<dyn SampleSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Ingest one sample: bytes transferred since the previous tick.
    ///
    /// Sets the current values, adds the per-direction deltas to the
    /// session counters and appends to the history window, evicting exactly
    /// the oldest sample once at capacity. Does not publish; the sampling
    /// loop decides when to publish.
    pub fn record(&self, upload: u64, download: u64) {
        self.record_at(Instant::now(), upload, download);
    }

    fn record_at(&self, timestamp: Instant, upload: u64, download: u64) {
        let mut stats = self.lock_stats();

        stats.current_upload = upload;
        stats.current_download = download;
        stats.current_total = upload + download;

        stats.session_upload += upload;
        stats.session_download += download;
        stats.session_total = stats.session_upload + stats.session_download;

        if stats.history.len() == self.history_capacity {
            stats.history.pop_front();
        }
        stats.history.push_back(TrafficSample {
            timestamp,
            upload,
            download,
            total: upload + download,
        });
    }

    /// Instantaneous `(upload, download)` speed in bytes per second.
    ///
    /// Computed from the most recent up-to-lookback samples as
    /// `(last - first) / elapsed` per direction. Returns `(0, 0)` with
    /// fewer than 2 samples or a non-positive elapsed time; a negative
    /// byte diff clamps to 0.
    pub fn speed(&self) -> (u64, u64) {
        let stats = self.lock_stats();
        if stats.history.len() < 2 {
            return (0, 0);
        }

        let start = stats.history.len().saturating_sub(self.speed_lookback);
        let first = stats.history[start];
        let last = stats.history[stats.history.len() - 1];

        let elapsed = last.timestamp.duration_since(first.timestamp).as_secs_f64();
        if elapsed <= 0.0 {
            return (0, 0);
        }

        let upload = (last.upload.saturating_sub(first.upload) as f64 / elapsed) as u64;
        let download = (last.download.saturating_sub(first.download) as f64 / elapsed) as u64;
        (upload, download)
    }

    /// Deep snapshot of current, session and history state
    pub fn stats(&self) -> TrafficStats {
        let stats = self.lock_stats();
        TrafficStats {
            current_upload: stats.current_upload,
            current_download: stats.current_download,
            current_total: stats.current_total,
            session_upload: stats.session_upload,
            session_download: stats.session_download,
            session_total: stats.session_total,
            history: stats.history.iter().copied().collect(),
        }
    }

    /// Zero the session counters and clear the history window.
    ///
    /// Current instantaneous values are untouched.
    pub fn reset_session(&self) {
        info!("Resetting session traffic statistics");
        let mut stats = self.lock_stats();
        stats.session_upload = 0;
        stats.session_download = 0;
        stats.session_total = 0;
        stats.history.clear();
    }

    /// Change the tick period; takes effect on the next tick
    pub fn set_sample_interval(&self, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(Error::Config("sample interval must be positive".into()));
        }
        *self.interval.lock().unwrap_or_else(PoisonError::into_inner) = interval;
        Ok(())
    }

    /// The sampling loop.
    ///
    /// Ticks on the configured interval until the shutdown broadcast fires;
    /// cancellation is observed within at most one tick period and never
    /// mid-sample. Each tick records one sample and fire-and-forgets a
    /// `traffic_updated` event whose payload reflects the state after that
    /// record.
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            "Traffic monitor started (interval: {:?})",
            *self.interval.lock().unwrap_or_else(PoisonError::into_inner)
        );

        loop {
            let interval = *self.interval.lock().unwrap_or_else(PoisonError::into_inner);
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    self.tick();
                }
                _ = shutdown_rx.recv() => {
                    info!("Traffic monitor shutting down");
                    break;
                }
            }
        }
    }

    /// One sampling tick: obtain, record, publish
    fn tick(&self) {
        let (upload, download) = match &self.source {
            Some(source) => source.sample(),
            // Placeholder policy: feed the previous speed reading back in
            None => self.speed(),
        };

        self.record(upload, download);

        // The loop is the single writer, so these reads see exactly the
        // state left by the record above.
        let (upload_speed, download_speed) = self.speed();
        let stats = self.lock_stats();
        let payload = EventPayload::builder()
            .set("upload_speed", upload_speed)
            .set("download_speed", download_speed)
            .set("total_upload", stats.session_upload)
            .set("total_download", stats.session_download)
            .build();
        drop(stats);

        debug!(
            "Tick: up {} B, down {} B, speed {}/{} B/s",
            upload, download, upload_speed, download_speed
        );
        self.bus.publish_async(EventKind::TrafficUpdated, payload);
    }

    fn lock_stats(&self) -> std::sync::MutexGuard<'_, StatsInner> {
        // Handlers never run under this lock, so poisoning is not expected;
        // recover instead of propagating a panic either way.
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn monitor_with_capacity(capacity: usize) -> TrafficMonitor {
        let config = MonitorConfig {
            history_capacity: capacity,
            ..Default::default()
        };
        TrafficMonitor::new(Arc::new(EventBus::new()), config).unwrap()
    }

    struct FixedSource(u64, u64);

    impl SampleSource for FixedSource {
        fn sample(&self) -> (u64, u64) {
            (self.0, self.1)
        }
    }

    #[test]
    fn test_record_updates_current_values() {
        let monitor = monitor_with_capacity(16);
        monitor.record(100, 200);
        monitor.record(30, 40);

        let stats = monitor.stats();
        assert_eq!(stats.current_upload, 30);
        assert_eq!(stats.current_download, 40);
        assert_eq!(stats.current_total, 70);
        assert_eq!(stats.history.len(), 2);
    }

    #[test]
    fn test_history_evicts_fifo_at_capacity() {
        let monitor = monitor_with_capacity(3);
        for i in 1..=5u64 {
            monitor.record(i, 0);
        }

        let stats = monitor.stats();
        assert_eq!(stats.history.len(), 3);
        let uploads: Vec<u64> = stats.history.iter().map(|s| s.upload).collect();
        // Oldest-first, exactly the last three
        assert_eq!(uploads, vec![3, 4, 5]);
    }

    #[test]
    fn test_session_counters_accumulate_per_direction() {
        let monitor = monitor_with_capacity(16);
        monitor.record(10, 1);
        monitor.record(20, 2);
        monitor.record(30, 3);

        let stats = monitor.stats();
        assert_eq!(stats.session_upload, 60);
        assert_eq!(stats.session_download, 6);
        assert_eq!(stats.session_total, 66);
    }

    #[test]
    fn test_reset_session_keeps_current_values() {
        let monitor = monitor_with_capacity(16);
        monitor.record(10, 20);
        monitor.reset_session();

        let stats = monitor.stats();
        assert_eq!(stats.session_upload, 0);
        assert_eq!(stats.session_download, 0);
        assert_eq!(stats.session_total, 0);
        assert!(stats.history.is_empty());
        // Current instantaneous values survive a reset
        assert_eq!(stats.current_upload, 10);
        assert_eq!(stats.current_download, 20);
        assert_eq!(stats.current_total, 30);
    }

    #[test]
    fn test_speed_requires_two_samples() {
        let monitor = monitor_with_capacity(16);
        assert_eq!(monitor.speed(), (0, 0));
        monitor.record(1000, 500);
        assert_eq!(monitor.speed(), (0, 0));
    }

    #[test]
    fn test_speed_from_two_samples() {
        let monitor = monitor_with_capacity(16);
        let t0 = Instant::now();
        monitor.record_at(t0, 0, 0);
        monitor.record_at(t0 + Duration::from_secs(2), 1000, 500);

        assert_eq!(monitor.speed(), (500, 250));
    }

    #[test]
    fn test_speed_zero_elapsed_is_zero() {
        let monitor = monitor_with_capacity(16);
        let t0 = Instant::now();
        monitor.record_at(t0, 0, 0);
        monitor.record_at(t0, 1000, 500);

        assert_eq!(monitor.speed(), (0, 0));
    }

    #[test]
    fn test_speed_uses_lookback_window() {
        let config = MonitorConfig {
            speed_lookback: 3,
            ..Default::default()
        };
        let monitor = TrafficMonitor::new(Arc::new(EventBus::new()), config).unwrap();

        let t0 = Instant::now();
        // Old samples outside the lookback must not influence the rate
        monitor.record_at(t0, 1_000_000, 0);
        monitor.record_at(t0 + Duration::from_secs(1), 0, 0);
        monitor.record_at(t0 + Duration::from_secs(2), 100, 0);
        monitor.record_at(t0 + Duration::from_secs(3), 200, 0);

        // Window is the last 3 samples: (0 -> 200) over 2 seconds
        assert_eq!(monitor.speed(), (100, 0));
    }

    #[test]
    fn test_speed_negative_diff_clamps_to_zero() {
        let monitor = monitor_with_capacity(16);
        let t0 = Instant::now();
        monitor.record_at(t0, 1000, 0);
        monitor.record_at(t0 + Duration::from_secs(1), 0, 100);

        assert_eq!(monitor.speed(), (0, 100));
    }

    #[test]
    fn test_window_scenario() {
        // Four records through a 3-sample window
        let monitor = monitor_with_capacity(3);
        monitor.record(10, 5);
        monitor.record(20, 5);
        monitor.record(5, 5);
        monitor.record(0, 10);

        let stats = monitor.stats();
        let window: Vec<(u64, u64)> = stats.history.iter().map(|s| (s.upload, s.download)).collect();
        assert_eq!(window, vec![(20, 5), (5, 5), (0, 10)]);
        assert_eq!(stats.current_total, 10);
        assert_eq!(stats.session_total, 60);
    }

    #[test]
    fn test_construction_validation() {
        let bus = Arc::new(EventBus::new());

        let zero_interval = MonitorConfig {
            sample_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(TrafficMonitor::new(Arc::clone(&bus), zero_interval).is_err());

        let zero_capacity = MonitorConfig {
            history_capacity: 0,
            ..Default::default()
        };
        assert!(TrafficMonitor::new(Arc::clone(&bus), zero_capacity).is_err());

        let short_lookback = MonitorConfig {
            speed_lookback: 1,
            ..Default::default()
        };
        assert!(TrafficMonitor::new(Arc::clone(&bus), short_lookback).is_err());
    }

    #[test]
    fn test_set_sample_interval_rejects_zero() {
        let monitor = monitor_with_capacity(16);
        assert!(monitor.set_sample_interval(Duration::ZERO).is_err());
        assert!(monitor.set_sample_interval(Duration::from_millis(50)).is_ok());
    }

    #[tokio::test]
    async fn test_run_publishes_and_stops_on_shutdown() {
        let bus = Arc::new(EventBus::new());
        let hits = Arc::new(AtomicUsize::new(0));
        {
            let hits = Arc::clone(&hits);
            bus.subscribe(EventKind::TrafficUpdated, move |_, payload| {
                assert!(payload.get_u64("upload_speed").is_some());
                assert!(payload.get_u64("total_upload").is_some());
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }

        let config = MonitorConfig {
            sample_interval: Duration::from_millis(10),
            ..Default::default()
        };
        let monitor = Arc::new(
            TrafficMonitor::new(Arc::clone(&bus), config)
                .unwrap()
                .with_source(Arc::new(FixedSource(100, 50))),
        );

        let (shutdown_tx, _) = broadcast::channel(1);
        let loop_monitor = Arc::clone(&monitor);
        let shutdown_rx = shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            loop_monitor.run(shutdown_rx).await;
        });

        tokio::time::sleep(Duration::from_millis(80)).await;
        shutdown_tx.send(()).unwrap();

        // Loop must observe the shutdown within one tick
        tokio::time::timeout(Duration::from_millis(100), handle)
            .await
            .expect("monitor loop did not stop")
            .unwrap();

        assert!(hits.load(Ordering::SeqCst) >= 1);
        let stats = monitor.stats();
        assert!(stats.session_upload >= 100);
        assert_eq!(stats.session_upload, stats.session_download * 2);
    }
}
