//! Background refresh of term sheet pairs.
//!
//! A spawned task fetches from a [`TermsheetSource`] on a fixed interval and
//! publishes each outcome as a [`Snapshot`] on a `watch` channel. Readers
//! always see the most recent snapshot; nothing queues.
//!
//! On failure the last good data is kept and marked [`SnapshotOrigin::Stale`].
//! Before the first success, the caller's fallback data is served instead
//! ([`SnapshotOrigin::Fallback`]).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use termsheet_core::TermsheetPair;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::http::SyncError;

#[async_trait]
pub trait TermsheetSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<TermsheetPair>, SyncError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOrigin {
    /// Fetched successfully on the latest attempt.
    Live,
    /// No successful fetch yet; serving caller-supplied data.
    Fallback,
    /// Latest fetch failed; serving the last successful fetch.
    Stale,
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub pairs: Vec<TermsheetPair>,
    pub origin: SnapshotOrigin,
    /// Time of the last successful fetch.
    pub fetched_at: Option<DateTime<Utc>>,
    /// Error from the latest attempt, cleared on success.
    pub last_error: Option<String>,
}

impl Snapshot {
    fn fallback(pairs: Vec<TermsheetPair>) -> Self {
        Self {
            pairs,
            origin: SnapshotOrigin::Fallback,
            fetched_at: None,
            last_error: None,
        }
    }

    fn failed(&self, error: &SyncError) -> Self {
        let origin = match self.origin {
            SnapshotOrigin::Fallback => SnapshotOrigin::Fallback,
            SnapshotOrigin::Live | SnapshotOrigin::Stale => SnapshotOrigin::Stale,
        };
        Self {
            pairs: self.pairs.clone(),
            origin,
            fetched_at: self.fetched_at,
            last_error: Some(error.to_string()),
        }
    }
}

/// Owner of a running poller. Dropping it stops the task.
pub struct PollHandle {
    rx: watch::Receiver<Snapshot>,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.rx.clone()
    }

    pub fn latest(&self) -> Snapshot {
        self.rx.borrow().clone()
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start polling `source` every `interval`, beginning immediately.
pub fn spawn_poller(
    source: Arc<dyn TermsheetSource>,
    interval: Duration,
    fallback: Vec<TermsheetPair>,
) -> PollHandle {
    let (tx, rx) = watch::channel(Snapshot::fallback(fallback));

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = interval.as_secs_f64(), "term sheet poller started");

        loop {
            ticker.tick().await;
            let next = match source.fetch().await {
                Ok(pairs) => {
                    debug!(count = pairs.len(), "poll succeeded");
                    Snapshot {
                        pairs,
                        origin: SnapshotOrigin::Live,
                        fetched_at: Some(Utc::now()),
                        last_error: None,
                    }
                }
                Err(e) => {
                    let current = tx.borrow().clone();
                    warn!(error = %e, origin = ?current.origin, "poll failed, keeping previous data");
                    current.failed(&e)
                }
            };
            if tx.send(next).is_err() {
                debug!("all snapshot receivers dropped, stopping poller");
                break;
            }
        }
    });

    PollHandle { rx, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use termsheet_core::FieldRecord;

    /// Replays scripted outcomes, then repeats the last one.
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<Vec<TermsheetPair>, u16>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Vec<TermsheetPair>, u16>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TermsheetSource for ScriptedSource {
        async fn fetch(&self) -> Result<Vec<TermsheetPair>, SyncError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            let next = if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().cloned()
            };
            match next {
                Some(Ok(pairs)) => Ok(pairs),
                Some(Err(status)) => Err(SyncError::Server {
                    status,
                    body: "unavailable".into(),
                }),
                None => Ok(Vec::new()),
            }
        }
    }

    fn pair(id: &str) -> TermsheetPair {
        TermsheetPair {
            trade_id: Some(id.to_string()),
            termsheet: Some(FieldRecord::new()),
            reference_swap: Some(FieldRecord::new()),
        }
    }

    fn ids(s: &Snapshot) -> Vec<String> {
        s.pairs.iter().filter_map(|p| p.trade_id.clone()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn starts_with_fallback_then_goes_live() {
        let source = ScriptedSource::new(vec![Ok(vec![pair("IRS-001")])]);
        let handle = spawn_poller(source.clone(), Duration::from_secs(30), vec![pair("MOCK-1")]);
        let mut rx = handle.subscribe();

        let initial = rx.borrow_and_update().clone();
        assert_eq!(initial.origin, SnapshotOrigin::Fallback);
        assert_eq!(ids(&initial), vec!["MOCK-1"]);

        rx.changed().await.unwrap();
        let live = rx.borrow_and_update().clone();
        assert_eq!(live.origin, SnapshotOrigin::Live);
        assert_eq!(ids(&live), vec!["IRS-001"]);
        assert!(live.fetched_at.is_some());
        assert!(live.last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_before_success_keeps_fallback() {
        let source = ScriptedSource::new(vec![Err(503)]);
        let handle = spawn_poller(source, Duration::from_secs(30), vec![pair("MOCK-1")]);
        let mut rx = handle.subscribe();

        rx.changed().await.unwrap();
        let snap = rx.borrow_and_update().clone();
        assert_eq!(snap.origin, SnapshotOrigin::Fallback);
        assert_eq!(ids(&snap), vec!["MOCK-1"]);
        assert!(snap.last_error.as_deref().unwrap_or_default().contains("503"));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_after_success_is_stale_then_recovers() {
        let source = ScriptedSource::new(vec![
            Ok(vec![pair("IRS-001")]),
            Err(500),
            Ok(vec![pair("IRS-001"), pair("IRS-002")]),
        ]);
        let handle = spawn_poller(source.clone(), Duration::from_secs(30), Vec::new());
        let mut rx = handle.subscribe();

        rx.changed().await.unwrap();
        let live = rx.borrow_and_update().clone();
        assert_eq!(live.origin, SnapshotOrigin::Live);

        rx.changed().await.unwrap();
        let stale = rx.borrow_and_update().clone();
        assert_eq!(stale.origin, SnapshotOrigin::Stale);
        assert_eq!(ids(&stale), vec!["IRS-001"]);
        assert_eq!(stale.fetched_at, live.fetched_at);
        assert!(stale.last_error.is_some());

        rx.changed().await.unwrap();
        let recovered = rx.borrow_and_update().clone();
        assert_eq!(recovered.origin, SnapshotOrigin::Live);
        assert_eq!(ids(&recovered), vec!["IRS-001", "IRS-002"]);
        assert!(recovered.last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn polls_on_interval() {
        let source = ScriptedSource::new(vec![Ok(Vec::new())]);
        let handle = spawn_poller(source.clone(), Duration::from_secs(30), Vec::new());

        tokio::time::sleep(Duration::from_secs(95)).await;
        // Immediate first tick, then at 30, 60, 90.
        assert_eq!(source.calls.load(Ordering::SeqCst), 4);
        drop(handle);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_stops_polling() {
        let source = ScriptedSource::new(vec![Ok(Vec::new())]);
        let handle = spawn_poller(source.clone(), Duration::from_secs(30), Vec::new());
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.stop();

        let before = source.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), before);
    }
}
