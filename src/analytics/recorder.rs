//! Fire-and-forget analytics recording
//!
//! The redirect path only does a `try_send` into a bounded channel. A
//! background worker drains the channel and writes events to the sink with
//! bounded concurrency. When the channel is full the newest event is dropped,
//! so a slow sink never delays a redirect.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::bot::BotDetector;
use super::models::{AnalyticsEvent, Visit};
use super::request::IpHasher;
use super::sink::AnalyticsSink;
use crate::config::AnalyticsConfig;

/// Message types for the recorder worker
enum WorkerMessage {
    Event(AnalyticsEvent),
    /// Finish queued and in-flight writes, then acknowledge
    Shutdown(oneshot::Sender<()>),
}

/// Counters describing what happened to recorded events
#[derive(Debug, Default)]
pub struct RecorderStats {
    queued: AtomicU64,
    written: AtomicU64,
    skipped_bots: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecorderSnapshot {
    pub queued: u64,
    pub written: u64,
    pub skipped_bots: u64,
    pub dropped: u64,
    pub failed: u64,
}

impl RecorderStats {
    pub fn snapshot(&self) -> RecorderSnapshot {
        RecorderSnapshot {
            queued: self.queued.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            skipped_bots: self.skipped_bots.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

pub struct AnalyticsRecorder {
    tx: mpsc::Sender<WorkerMessage>,
    detector: Arc<dyn BotDetector>,
    hasher: IpHasher,
    /// Skip events from bots entirely
    disable_bot_access_log: bool,
    stats: Arc<RecorderStats>,
}

impl AnalyticsRecorder {
    /// Create a recorder and spawn its worker on the current runtime
    pub fn new(
        sink: Arc<dyn AnalyticsSink>,
        detector: Arc<dyn BotDetector>,
        hasher: IpHasher,
        config: &AnalyticsConfig,
        disable_bot_access_log: bool,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_size.max(1));
        let stats = Arc::new(RecorderStats::default());

        let worker = Worker {
            receiver: rx,
            sink,
            permits: Arc::new(Semaphore::new(config.concurrency.max(1))),
            timeout: config.timeout(),
            stats: Arc::clone(&stats),
        };
        tokio::spawn(worker.run());

        Self {
            tx,
            detector,
            hasher,
            disable_bot_access_log,
            stats,
        }
    }

    pub fn stats(&self) -> RecorderSnapshot {
        self.stats.snapshot()
    }

    /// Build the event for a visit; detector errors count as human traffic
    pub fn event_for(&self, visit: Visit) -> AnalyticsEvent {
        let is_bot = self
            .detector
            .is_bot(visit.user_agent.as_deref())
            .unwrap_or_else(|err| {
                debug!(error = %err, "bot detection failed, treating visitor as human");
                false
            });

        AnalyticsEvent {
            slug: visit.slug,
            url: visit.url,
            timestamp: chrono::Utc::now().timestamp(),
            referrer: visit.referrer,
            user_agent: visit.user_agent,
            ip_hash: visit.ip.map(|ip| self.hasher.hash(ip)),
            country: visit.country,
            is_bot,
        }
    }

    pub fn record_visit(&self, visit: Visit) {
        self.record(self.event_for(visit));
    }

    /// Queue an event without waiting. Never fails from the caller's view.
    pub fn record(&self, event: AnalyticsEvent) {
        if event.is_bot && self.disable_bot_access_log {
            self.stats.skipped_bots.fetch_add(1, Ordering::Relaxed);
            return;
        }

        match self.tx.try_send(WorkerMessage::Event(event)) {
            Ok(()) => {
                self.stats.queued.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Analytics event queue full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("Analytics worker stopped, dropping event");
            }
        }
    }

    /// Flush queued events and wait for pending writes to finish
    pub async fn shutdown(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(WorkerMessage::Shutdown(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }
}

struct Worker {
    receiver: mpsc::Receiver<WorkerMessage>,
    sink: Arc<dyn AnalyticsSink>,
    permits: Arc<Semaphore>,
    timeout: Duration,
    stats: Arc<RecorderStats>,
}

impl Worker {
    async fn run(mut self) {
        let mut writes = JoinSet::new();

        while let Some(message) = self.receiver.recv().await {
            match message {
                WorkerMessage::Event(event) => {
                    // Waiting for a permit here lets the queue fill up instead of
                    // spawning unbounded writes
                    let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
                        break;
                    };
                    let sink = Arc::clone(&self.sink);
                    let stats = Arc::clone(&self.stats);
                    let timeout = self.timeout;

                    writes.spawn(async move {
                        let _permit = permit;
                        match tokio::time::timeout(timeout, sink.write(&event)).await {
                            Ok(Ok(())) => {
                                stats.written.fetch_add(1, Ordering::Relaxed);
                            }
                            Ok(Err(err)) => {
                                stats.failed.fetch_add(1, Ordering::Relaxed);
                                warn!(
                                    slug = %event.slug,
                                    error = %err,
                                    "failed to write analytics event"
                                );
                            }
                            Err(_) => {
                                stats.failed.fetch_add(1, Ordering::Relaxed);
                                warn!(slug = %event.slug, "analytics write timed out");
                            }
                        }
                    });

                    while writes.try_join_next().is_some() {}
                }
                WorkerMessage::Shutdown(ack) => {
                    info!("Analytics recorder received shutdown signal, flushing...");
                    while writes.join_next().await.is_some() {}
                    let _ = ack.send(());
                    return;
                }
            }
        }

        while writes.join_next().await.is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::bot::UserAgentBotDetector;
    use anyhow::bail;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemorySink {
        events: Mutex<Vec<AnalyticsEvent>>,
    }

    #[async_trait]
    impl AnalyticsSink for MemorySink {
        async fn write(&self, event: &AnalyticsEvent) -> anyhow::Result<()> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl AnalyticsSink for FailingSink {
        async fn write(&self, _event: &AnalyticsEvent) -> anyhow::Result<()> {
            bail!("sink unavailable")
        }
    }

    /// Blocks every write until released
    struct GatedSink {
        gate: tokio::sync::Notify,
    }

    #[async_trait]
    impl AnalyticsSink for GatedSink {
        async fn write(&self, _event: &AnalyticsEvent) -> anyhow::Result<()> {
            self.gate.notified().await;
            Ok(())
        }
    }

    struct BrokenDetector;

    impl BotDetector for BrokenDetector {
        fn is_bot(&self, _user_agent: Option<&str>) -> anyhow::Result<bool> {
            bail!("detector offline")
        }
    }

    fn config(queue_size: usize, concurrency: usize) -> AnalyticsConfig {
        AnalyticsConfig {
            enabled: true,
            queue_size,
            concurrency,
            timeout_ms: 500,
            ip_hash_secret: None,
        }
    }

    fn hasher() -> IpHasher {
        IpHasher::new(Some("recorder-secret")).unwrap()
    }

    fn visit(user_agent: &str) -> Visit {
        Visit {
            slug: "launch".to_string(),
            url: "https://example.com/launch-page".to_string(),
            referrer: Some("https://news.example.com".to_string()),
            user_agent: Some(user_agent.to_string()),
            ip: Some("203.0.113.9".parse().unwrap()),
            country: Some("US".to_string()),
        }
    }

    const BROWSER: &str = "Mozilla/5.0 (X11; Linux x86_64) Firefox/121.0";

    #[tokio::test]
    async fn test_events_reach_sink_with_hashed_ip() {
        let sink = Arc::new(MemorySink::default());
        let recorder = AnalyticsRecorder::new(
            sink.clone(),
            Arc::new(UserAgentBotDetector),
            hasher(),
            &config(16, 2),
            false,
        );

        recorder.record_visit(visit(BROWSER));
        recorder.shutdown().await;

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.slug, "launch");
        assert_eq!(event.country.as_deref(), Some("US"));
        assert!(!event.is_bot);
        assert_eq!(
            event.ip_hash.as_deref(),
            Some(hasher().hash("203.0.113.9".parse().unwrap()).as_str())
        );
        assert_eq!(recorder.stats().written, 1);
    }

    #[tokio::test]
    async fn test_bots_skipped_when_bot_logging_disabled() {
        let sink = Arc::new(MemorySink::default());
        let recorder = AnalyticsRecorder::new(
            sink.clone(),
            Arc::new(UserAgentBotDetector),
            hasher(),
            &config(16, 2),
            true,
        );

        recorder.record_visit(visit("Googlebot/2.1"));
        recorder.record_visit(visit(BROWSER));
        recorder.shutdown().await;

        assert_eq!(sink.events.lock().unwrap().len(), 1);
        assert_eq!(recorder.stats().skipped_bots, 1);
    }

    #[tokio::test]
    async fn test_bots_recorded_and_flagged_when_bot_logging_enabled() {
        let sink = Arc::new(MemorySink::default());
        let recorder = AnalyticsRecorder::new(
            sink.clone(),
            Arc::new(UserAgentBotDetector),
            hasher(),
            &config(16, 2),
            false,
        );

        recorder.record_visit(visit("Googlebot/2.1"));
        recorder.shutdown().await;

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_bot);
    }

    #[tokio::test]
    async fn test_detector_failure_counts_as_human() {
        let sink = Arc::new(MemorySink::default());
        let recorder = AnalyticsRecorder::new(
            sink.clone(),
            Arc::new(BrokenDetector),
            hasher(),
            &config(16, 2),
            true,
        );

        recorder.record_visit(visit("Googlebot/2.1"));
        recorder.shutdown().await;

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(!events[0].is_bot);
    }

    #[tokio::test]
    async fn test_sink_failures_are_counted_not_raised() {
        let recorder = AnalyticsRecorder::new(
            Arc::new(FailingSink),
            Arc::new(UserAgentBotDetector),
            hasher(),
            &config(16, 2),
            false,
        );

        for _ in 0..3 {
            recorder.record_visit(visit(BROWSER));
        }
        recorder.shutdown().await;

        let stats = recorder.stats();
        assert_eq!(stats.failed, 3);
        assert_eq!(stats.written, 0);
    }

    #[tokio::test]
    async fn test_full_queue_drops_newest_without_blocking() {
        let sink = Arc::new(GatedSink {
            gate: tokio::sync::Notify::new(),
        });
        let recorder = AnalyticsRecorder::new(
            sink.clone(),
            Arc::new(UserAgentBotDetector),
            hasher(),
            &config(2, 1),
            false,
        );

        // One write occupies the only permit, one message waits for it, two fill the queue
        for _ in 0..20 {
            recorder.record_visit(visit(BROWSER));
            tokio::task::yield_now().await;
        }

        let stats = recorder.stats();
        assert!(stats.dropped > 0, "expected drops, got {stats:?}");
        assert_eq!(stats.queued + stats.dropped, 20);
    }
}
