//! Paced outgoing message queue
//!
//! The piano drops sysex sent back-to-back, so every outgoing frame goes
//! through a single actor that keeps a minimum gap between sends. Batches are
//! queued atomically: a message submitted after a batch can never be sent
//! ahead of (or between) the batch's messages.
//!
//! When the transport fails or is detached, everything still queued is
//! dropped, never retried.
//!
//! ```ignore
//! let pacer = PacerHandle::spawn(Duration::from_millis(25), Some(Box::new(transport)));
//! pacer.submit(init_sequence);
//! pacer.send(QueueEntry::new(volume_msg));
//! let stats = pacer.when_idle().await;
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, trace, warn};

use crate::midi::format_hex;
use crate::roland::OutgoingMessage;

/// Default minimum spacing between two sends
pub const DEFAULT_MIN_SPACING_MS: u64 = 25;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport disconnected")]
    Disconnected,
    #[error("send failed: {0}")]
    Send(String),
}

/// Outgoing MIDI sink
pub trait Transport: Send + 'static {
    fn name(&self) -> &str;
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
}

/// One queued message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub bytes: Vec<u8>,
    /// Gap to leave after this message; never shorter than the minimum spacing
    pub delay: Option<Duration>,
}

impl QueueEntry {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, delay: None }
    }

    pub fn with_delay(bytes: Vec<u8>, delay: Duration) -> Self {
        Self {
            bytes,
            delay: Some(delay),
        }
    }
}

impl From<OutgoingMessage> for QueueEntry {
    fn from(msg: OutgoingMessage) -> Self {
        Self::new(msg.into_bytes())
    }
}

/// Counters reported by [`PacerHandle::when_idle`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacerStats {
    pub sent: u64,
    pub dropped: u64,
}

enum PacerCommand {
    Submit(Vec<QueueEntry>),
    Attach(Box<dyn Transport>),
    Detach,
    WhenIdle(oneshot::Sender<PacerStats>),
    Shutdown,
}

struct PacerActor {
    command_rx: mpsc::UnboundedReceiver<PacerCommand>,
    transport: Option<Box<dyn Transport>>,
    queue: VecDeque<QueueEntry>,
    min_spacing: Duration,
    /// Earliest instant the next message may leave
    next_send_at: Instant,
    idle_waiters: Vec<oneshot::Sender<PacerStats>>,
    stats: PacerStats,
    channel_open: bool,
}

impl PacerActor {
    async fn run(mut self) {
        debug!("Pacer started (min spacing {:?})", self.min_spacing);

        loop {
            if self.queue.is_empty() {
                self.notify_idle();
                match self.command_rx.recv().await {
                    Some(cmd) => {
                        if !self.handle_command(cmd) {
                            break;
                        }
                    }
                    None => break,
                }
                continue;
            }

            let ready_at = self.next_send_at;
            tokio::select! {
                biased;
                cmd = self.command_rx.recv(), if self.channel_open => match cmd {
                    Some(cmd) => {
                        if !self.handle_command(cmd) {
                            break;
                        }
                    }
                    None => self.channel_open = false,
                },
                _ = sleep_until(ready_at) => self.send_next(),
            }
        }

        self.notify_idle();
        debug!(
            "Pacer stopped (sent {}, dropped {})",
            self.stats.sent, self.stats.dropped
        );
    }

    /// Returns false when the actor should stop
    fn handle_command(&mut self, cmd: PacerCommand) -> bool {
        match cmd {
            PacerCommand::Submit(entries) => {
                if self.transport.is_none() {
                    warn!("No transport attached, dropping {} message(s)", entries.len());
                    self.stats.dropped += entries.len() as u64;
                } else {
                    trace!("Queued {} message(s)", entries.len());
                    self.queue.extend(entries);
                }
            }
            PacerCommand::Attach(transport) => {
                info!("Pacer attached to '{}'", transport.name());
                self.transport = Some(transport);
            }
            PacerCommand::Detach => {
                if let Some(transport) = self.transport.take() {
                    info!("Pacer detached from '{}'", transport.name());
                }
                self.drop_queue();
            }
            PacerCommand::WhenIdle(tx) => {
                if self.queue.is_empty() {
                    let _ = tx.send(self.stats);
                } else {
                    self.idle_waiters.push(tx);
                }
            }
            PacerCommand::Shutdown => {
                self.drop_queue();
                return false;
            }
        }
        true
    }

    fn send_next(&mut self) {
        let Some(entry) = self.queue.pop_front() else {
            return;
        };

        let Some(transport) = self.transport.as_mut() else {
            self.stats.dropped += 1;
            self.drop_queue();
            return;
        };

        match transport.send(&entry.bytes) {
            Ok(()) => {
                self.stats.sent += 1;
                debug!("Sent: {}", format_hex(&entry.bytes));
                let gap = entry.delay.unwrap_or_default().max(self.min_spacing);
                self.next_send_at = Instant::now() + gap;
            }
            Err(e) => {
                warn!("Send to '{}' failed: {}", transport.name(), e);
                self.transport = None;
                self.stats.dropped += 1;
                self.drop_queue();
            }
        }
    }

    fn drop_queue(&mut self) {
        if !self.queue.is_empty() {
            warn!("Dropping {} queued message(s)", self.queue.len());
            self.stats.dropped += self.queue.len() as u64;
            self.queue.clear();
        }
    }

    fn notify_idle(&mut self) {
        for tx in self.idle_waiters.drain(..) {
            let _ = tx.send(self.stats);
        }
    }
}

/// Handle for submitting messages to the pacer
///
/// Cheap to clone. All methods except [`PacerHandle::when_idle`] are
/// fire-and-forget.
#[derive(Clone)]
pub struct PacerHandle {
    cmd_tx: mpsc::UnboundedSender<PacerCommand>,
}

impl PacerHandle {
    /// Spawn the pacer task on the current runtime
    pub fn spawn(min_spacing: Duration, transport: Option<Box<dyn Transport>>) -> Self {
        let (cmd_tx, command_rx) = mpsc::unbounded_channel();

        let actor = PacerActor {
            command_rx,
            transport,
            queue: VecDeque::new(),
            min_spacing,
            next_send_at: Instant::now(),
            idle_waiters: Vec::new(),
            stats: PacerStats::default(),
            channel_open: true,
        };
        tokio::spawn(actor.run());

        Self { cmd_tx }
    }

    /// Queue a batch; it is sent contiguously and in order
    pub fn submit(&self, entries: Vec<QueueEntry>) {
        if entries.is_empty() {
            return;
        }
        let _ = self.cmd_tx.send(PacerCommand::Submit(entries));
    }

    pub fn send(&self, entry: impl Into<QueueEntry>) {
        self.submit(vec![entry.into()]);
    }

    /// Replace the transport (on connect / reconnect)
    pub fn attach(&self, transport: Box<dyn Transport>) {
        let _ = self.cmd_tx.send(PacerCommand::Attach(transport));
    }

    /// Drop the transport and everything queued (on disconnect)
    pub fn detach(&self) {
        let _ = self.cmd_tx.send(PacerCommand::Detach);
    }

    /// Resolves once the queue is empty
    ///
    /// Returns None if the pacer has stopped.
    pub async fn when_idle(&self) -> Option<PacerStats> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx.send(PacerCommand::WhenIdle(tx)).ok()?;
        rx.await.ok()
    }

    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(PacerCommand::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    type SendLog = Arc<Mutex<Vec<(Instant, Vec<u8>)>>>;

    struct RecordingTransport {
        log: SendLog,
        fail_after: Option<usize>,
    }

    impl RecordingTransport {
        fn new(fail_after: Option<usize>) -> (Box<dyn Transport>, SendLog) {
            let log = SendLog::default();
            let transport = Box::new(Self {
                log: log.clone(),
                fail_after,
            });
            (transport, log)
        }
    }

    impl Transport for RecordingTransport {
        fn name(&self) -> &str {
            "recording"
        }

        fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
            let mut log = self.log.lock();
            if self.fail_after.is_some_and(|k| log.len() >= k) {
                return Err(TransportError::Disconnected);
            }
            log.push((Instant::now(), bytes.to_vec()));
            Ok(())
        }
    }

    fn entries(n: u8) -> Vec<QueueEntry> {
        (0..n).map(|i| QueueEntry::new(vec![0xF0, i, 0xF7])).collect()
    }

    fn sent_ids(log: &SendLog) -> Vec<u8> {
        log.lock().iter().map(|(_, bytes)| bytes[1]).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_order_and_spacing() {
        let spacing = Duration::from_millis(25);
        let (transport, log) = RecordingTransport::new(None);
        let pacer = PacerHandle::spawn(spacing, Some(transport));

        pacer.submit(entries(6));
        let stats = pacer.when_idle().await.unwrap();

        assert_eq!(stats, PacerStats { sent: 6, dropped: 0 });
        assert_eq!(sent_ids(&log), vec![0, 1, 2, 3, 4, 5]);

        let log = log.lock();
        for pair in log.windows(2) {
            assert!(pair[1].0 - pair[0].0 >= spacing);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_submission_waits_for_batch() {
        let (transport, log) = RecordingTransport::new(None);
        let pacer = PacerHandle::spawn(Duration::from_millis(25), Some(transport));

        pacer.submit(entries(4));
        pacer.send(QueueEntry::new(vec![0xF0, 99, 0xF7]));
        pacer.when_idle().await.unwrap();

        assert_eq!(sent_ids(&log), vec![0, 1, 2, 3, 99]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_loss_drops_remainder() {
        let (transport, log) = RecordingTransport::new(Some(3));
        let pacer = PacerHandle::spawn(Duration::from_millis(25), Some(transport));

        pacer.submit(entries(7));
        let stats = pacer.when_idle().await.unwrap();

        assert_eq!(sent_ids(&log), vec![0, 1, 2]);
        assert_eq!(stats, PacerStats { sent: 3, dropped: 4 });

        // Nothing goes out until a new transport is attached
        pacer.submit(entries(2));
        let stats = pacer.when_idle().await.unwrap();
        assert_eq!(stats.dropped, 6);
        assert_eq!(log.lock().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_override_extends_gap() {
        let (transport, log) = RecordingTransport::new(None);
        let pacer = PacerHandle::spawn(Duration::from_millis(25), Some(transport));

        pacer.submit(vec![
            QueueEntry::with_delay(vec![0xF0, 0, 0xF7], Duration::from_millis(500)),
            QueueEntry::with_delay(vec![0xF0, 1, 0xF7], Duration::from_millis(1)),
            QueueEntry::new(vec![0xF0, 2, 0xF7]),
        ]);
        pacer.when_idle().await.unwrap();

        let log = log.lock();
        assert!(log[1].0 - log[0].0 >= Duration::from_millis(500));
        // Override shorter than the minimum spacing is ignored
        assert!(log[2].0 - log[1].0 >= Duration::from_millis(25));
    }

    #[tokio::test(start_paused = true)]
    async fn test_detach_and_reattach() {
        let (first, first_log) = RecordingTransport::new(None);
        let pacer = PacerHandle::spawn(Duration::from_millis(25), Some(first));

        // Both commands are queued before the actor first runs
        pacer.submit(entries(5));
        pacer.detach();
        let stats = pacer.when_idle().await.unwrap();
        assert_eq!(stats, PacerStats { sent: 0, dropped: 5 });

        let (second, second_log) = RecordingTransport::new(None);
        pacer.attach(second);
        pacer.submit(entries(2));
        pacer.when_idle().await.unwrap();

        assert_eq!(sent_ids(&second_log), vec![0, 1]);
        assert!(first_log.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spacing_holds_across_batches() {
        let spacing = Duration::from_millis(25);
        let (transport, log) = RecordingTransport::new(None);
        let pacer = PacerHandle::spawn(spacing, Some(transport));

        pacer.send(QueueEntry::new(vec![0xF0, 0, 0xF7]));
        pacer.when_idle().await.unwrap();
        pacer.send(QueueEntry::new(vec![0xF0, 1, 0xF7]));
        pacer.when_idle().await.unwrap();

        // A batch arriving after the gap has passed goes out at once
        tokio::time::sleep(Duration::from_millis(100)).await;
        let submitted = Instant::now();
        pacer.send(QueueEntry::new(vec![0xF0, 2, 0xF7]));
        pacer.when_idle().await.unwrap();

        let log = log.lock();
        assert_eq!(log.len(), 3);
        assert!(log[1].0 - log[0].0 >= spacing);
        assert_eq!(log[2].0, submitted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_transport_drops() {
        let pacer = PacerHandle::spawn(Duration::from_millis(25), None);
        pacer.submit(entries(3));
        let stats = pacer.when_idle().await.unwrap();
        assert_eq!(stats, PacerStats { sent: 0, dropped: 3 });
    }

    #[tokio::test]
    async fn test_shutdown_stops_actor() {
        let pacer = PacerHandle::spawn(Duration::from_millis(25), None);
        pacer.shutdown();
        // Give the actor a chance to exit
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(pacer.when_idle().await, None);
    }
}
