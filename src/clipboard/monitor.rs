//! clipkeep - Clipboard monitoring module
//!
//! Polls one X11 selection for changes and emits newly observed selections
//! to the ingestion path

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::models::{Selection, Target};
use super::source::{ClipSelection, ClipboardSource};

/// Polling monitor for a single X11 selection.
///
/// Change detection and capture use two distinct target lists: the monitor
/// set is probed on every tick to notice that a change happened, the
/// capture list ranks the formats worth delivering once a change is
/// confirmed, richest first.
pub struct ClipboardMonitor {
    source: Arc<dyn ClipboardSource>,
    selection: ClipSelection,
    monitor_targets: Vec<Target>,
    capture_targets: Vec<Target>,
    poll_interval: Duration,
}

impl ClipboardMonitor {
    pub fn new(
        source: Arc<dyn ClipboardSource>,
        selection: ClipSelection,
        monitor_targets: Vec<Target>,
        capture_targets: Vec<Target>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            source,
            selection,
            monitor_targets,
            capture_targets,
            poll_interval,
        }
    }

    /// Spawn the polling loop. It stops when `cancel` fires or the receiver
    /// side of `events` goes away.
    pub fn spawn(
        self,
        events: mpsc::Sender<Selection>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(events, cancel).await })
    }

    async fn run(self, events: mpsc::Sender<Selection>, cancel: CancellationToken) {
        log::info!(
            "[monitor:{}] started with {:?} interval",
            self.selection,
            self.poll_interval
        );

        // Reading once up front avoids emitting a spurious change for
        // whatever the session already holds when the daemon starts.
        let mut baseline = self.initial_baseline().await;

        let mut ticker = time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let Some(observed) = self.poll_once(&mut baseline).await else {
                continue;
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                sent = events.send(observed) => {
                    if sent.is_err() {
                        log::warn!("[monitor:{}] consumer gone, stopping", self.selection);
                        break;
                    }
                }
            }
        }

        log::info!("[monitor:{}] stopped", self.selection);
    }

    async fn initial_baseline(&self) -> Vec<u8> {
        let Some(available) = self.targets_bounded().await else {
            return Vec::new();
        };
        let Some(probe) = self.first_present(&self.monitor_targets, &available) else {
            return Vec::new();
        };
        self.read_bounded(probe).await.unwrap_or_default()
    }

    /// One poll cycle: detect a change against the baseline and capture it.
    /// Returns the selection to emit, if any.
    async fn poll_once(&self, baseline: &mut Vec<u8>) -> Option<Selection> {
        let available = self.targets_bounded().await?;
        let probe = self.first_present(&self.monitor_targets, &available)?;

        let current = self.read_bounded(probe).await?;
        if current == *baseline {
            return None;
        }
        *baseline = current.clone();

        let Some(capture) = self.first_present(&self.capture_targets, &available) else {
            // The baseline stays updated so the same content is not
            // re-evaluated on the next tick.
            log::info!(
                "[monitor:{}] change detected but none of the capture targets are offered, dropping",
                self.selection
            );
            return None;
        };

        let content = if capture == probe {
            current
        } else {
            self.read_bounded(capture).await?
        };
        log::debug!(
            "[monitor:{}] new selection: {} bytes as {}",
            self.selection,
            content.len(),
            capture
        );
        Some(Selection::new(content, capture.clone()))
    }

    fn first_present<'a>(&self, wanted: &'a [Target], available: &[Target]) -> Option<&'a Target> {
        wanted.iter().find(|target| available.contains(target))
    }

    /// List targets, bounded by the poll interval so a hung owner cannot
    /// stall shutdown
    async fn targets_bounded(&self) -> Option<Vec<Target>> {
        match time::timeout(self.poll_interval, self.source.targets(self.selection)).await {
            Ok(Ok(targets)) => Some(targets),
            Ok(Err(err)) => {
                log::debug!("[monitor:{}] listing targets failed: {}", self.selection, err);
                None
            }
            Err(_) => {
                log::warn!("[monitor:{}] listing targets timed out", self.selection);
                None
            }
        }
    }

    async fn read_bounded(&self, target: &Target) -> Option<Vec<u8>> {
        match time::timeout(self.poll_interval, self.source.read(self.selection, target)).await {
            Ok(Ok(content)) => Some(content),
            Ok(Err(err)) => {
                log::warn!(
                    "[monitor:{}] reading {} failed: {}",
                    self.selection,
                    target,
                    err
                );
                None
            }
            Err(_) => {
                log::warn!("[monitor:{}] reading {} timed out", self.selection, target);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::clipboard::source::SourceError;

    /// Scripted clipboard source: every target serves a queue of canned
    /// contents; the final entry repeats once the queue drains.
    struct ScriptedSource {
        targets: Vec<Target>,
        reads: Mutex<HashMap<String, Vec<Vec<u8>>>>,
    }

    impl ScriptedSource {
        fn new(targets: Vec<Target>) -> Self {
            Self {
                targets,
                reads: Mutex::new(HashMap::new()),
            }
        }

        fn script(self, target: &Target, contents: &[&[u8]]) -> Self {
            self.reads.lock().insert(
                target.as_str().to_string(),
                contents.iter().rev().map(|c| c.to_vec()).collect(),
            );
            self
        }
    }

    #[async_trait]
    impl ClipboardSource for ScriptedSource {
        async fn targets(&self, _selection: ClipSelection) -> Result<Vec<Target>, SourceError> {
            Ok(self.targets.clone())
        }

        async fn read(
            &self,
            _selection: ClipSelection,
            target: &Target,
        ) -> Result<Vec<u8>, SourceError> {
            let mut reads = self.reads.lock();
            let queue = reads
                .get_mut(target.as_str())
                .unwrap_or_else(|| panic!("unscripted read of {}", target));
            if queue.len() > 1 {
                Ok(queue.pop().unwrap())
            } else {
                Ok(queue.last().expect("scripted queue is empty").clone())
            }
        }

        async fn write(
            &self,
            _selection: ClipSelection,
            _target: &Target,
            _content: &[u8],
        ) -> Result<(), SourceError> {
            Ok(())
        }
    }

    fn monitor(source: ScriptedSource, monitored: Vec<Target>, captured: Vec<Target>) -> ClipboardMonitor {
        ClipboardMonitor::new(
            Arc::new(source),
            ClipSelection::Clipboard,
            monitored,
            captured,
            Duration::from_millis(100),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn emits_exactly_one_selection_per_change() {
        let source = ScriptedSource::new(vec![Target::Text])
            .script(&Target::Text, &[b"a", b"a", b"b"]);
        let m = monitor(source, vec![Target::Text], vec![Target::Text]);

        let (tx, mut rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let handle = m.spawn(tx, cancel.clone());

        let observed = rx.recv().await.expect("expected one emission");
        assert_eq!(observed.content, b"b".to_vec());
        assert_eq!(observed.target, Target::Text);

        // The unchanged content must not be emitted again.
        let next = time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(next.is_err(), "unexpected second emission");

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn captures_with_the_priority_target_not_the_probe() {
        let source = ScriptedSource::new(vec![Target::Timestamp, Target::Utf8String])
            .script(&Target::Timestamp, &[b"100", b"200"])
            .script(&Target::Utf8String, &[b"hello world"]);
        let m = monitor(
            source,
            vec![Target::Timestamp, Target::ImagePng],
            vec![Target::GnomeCopiedFiles, Target::ImagePng, Target::Utf8String],
        );

        let (tx, mut rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let handle = m.spawn(tx, cancel.clone());

        let observed = rx.recv().await.expect("expected one emission");
        assert_eq!(observed.content, b"hello world".to_vec());
        assert_eq!(observed.target, Target::Utf8String);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn drops_change_when_no_capture_target_is_offered() {
        let source = ScriptedSource::new(vec![Target::Timestamp])
            .script(&Target::Timestamp, &[b"100", b"200"]);
        let m = monitor(
            source,
            vec![Target::Timestamp],
            vec![Target::GnomeCopiedFiles, Target::ImagePng, Target::Utf8String],
        );

        let (tx, mut rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let handle = m.spawn(tx, cancel.clone());

        let next = time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(next.is_err(), "dropped change must not be emitted");

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_cancellation() {
        let source = ScriptedSource::new(vec![Target::Text]).script(&Target::Text, &[b"a"]);
        let m = monitor(source, vec![Target::Text], vec![Target::Text]);

        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let handle = m.spawn(tx, cancel.clone());

        cancel.cancel();
        time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("monitor did not stop")
            .unwrap();
    }
}
