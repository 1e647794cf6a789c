//! Quiet-Period Sink
//!
//! Captures a job's output stream and decides when it is "done": the
//! completion signal fires once no record has arrived for the idle period
//! after the countdown was armed, or when completion is forced. The signal
//! fires at most once per epoch; `reset` starts a new epoch so one sink can
//! serve several test cases.
//!
//! The job's task appends through [`OutputSink::on_record`] while the
//! orchestrator only reads the snapshot carried by the completion signal, so
//! all state sits behind one mutex and the snapshot is taken under it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until, timeout};

use cluster::OutputSink;
use shared::{CapturedRecord, ComponentId, component_debug, component_info};

use crate::error::{HarnessError, HarnessResult};

const COMPONENT: ComponentId = ComponentId::Sink;

/// Records accumulated when the completion signal fired
pub type Snapshot = Arc<Vec<String>>;

struct SinkState {
    epoch: u64,
    records: Vec<CapturedRecord>,
    idle_period: Duration,
    /// Set while the countdown is armed and has not fired
    deadline: Option<Instant>,
    fired: bool,
    completion_tx: watch::Sender<Option<Snapshot>>,
    completion_rx: watch::Receiver<Option<Snapshot>>,
    timer: Option<JoinHandle<()>>,
}

impl SinkState {
    fn new(epoch: u64, idle_period: Duration) -> Self {
        let (completion_tx, completion_rx) = watch::channel(None);
        Self {
            epoch,
            records: Vec::new(),
            idle_period,
            deadline: None,
            fired: false,
            completion_tx,
            completion_rx,
            timer: None,
        }
    }

    fn payloads(&self) -> Vec<String> {
        self.records.iter().map(|record| record.payload.clone()).collect()
    }

    fn fire(&mut self, cause: &str) {
        let snapshot = Arc::new(self.payloads());
        self.fired = true;
        self.deadline = None;
        component_info!(
            COMPONENT,
            "🔔 Sink complete ({}) with {} records in epoch {}",
            cause,
            snapshot.len(),
            self.epoch
        );
        self.completion_tx.send_replace(Some(snapshot));
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Single-fire completion signal of one sink epoch
#[derive(Clone)]
pub struct Completion {
    epoch: u64,
    rx: watch::Receiver<Option<Snapshot>>,
}

impl Completion {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// True when both refer to the same signal instance
    pub fn same_signal(&self, other: &Completion) -> bool {
        self.epoch == other.epoch && self.rx.same_channel(&other.rx)
    }

    /// Snapshot if the signal already fired
    pub fn peek(&self) -> Option<Snapshot> {
        self.rx.borrow().clone()
    }

    /// Wait for the signal; `None` if the sink was reset before it fired
    pub async fn wait(mut self) -> Option<Snapshot> {
        match self.rx.wait_for(Option::is_some).await {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => None,
        }
    }

    /// Wait for the signal, bounded by `limit`
    pub async fn wait_timeout(self, limit: Duration) -> HarnessResult<Snapshot> {
        match timeout(limit, self.wait()).await {
            Ok(Some(snapshot)) => Ok(snapshot),
            Ok(None) | Err(_) => Err(HarnessError::SinkTimeout { waited: limit }),
        }
    }
}

/// Output consumer that completes after a quiet period
pub struct QuietPeriodSink {
    runtime: Handle,
    inner: Arc<Mutex<SinkState>>,
}

impl QuietPeriodSink {
    /// Create a sink whose timers run on `runtime`
    pub fn new(runtime: Handle, idle_period: Duration) -> Self {
        Self {
            runtime,
            inner: Arc::new(Mutex::new(SinkState::new(0, idle_period))),
        }
    }

    fn state(&self) -> MutexGuard<'_, SinkState> {
        lock(&self.inner)
    }

    /// Append a record and push the idle deadline out; blank records are ignored
    pub fn on_record(&self, payload: impl Into<String>) {
        let payload = payload.into();
        if payload.trim().is_empty() {
            return;
        }
        let mut state = self.state();
        let record = CapturedRecord::new(payload);
        if state.deadline.is_some() {
            state.deadline = Some(record.arrived_at + state.idle_period);
        }
        state.records.push(record);
    }

    /// Arm (or re-arm) the idle countdown for the current epoch
    ///
    /// Arm only once the job is confirmed running. Does nothing if the
    /// epoch already completed.
    pub fn start_countdown(&self, idle_period: Duration) {
        let mut state = self.state();
        if state.fired {
            component_debug!(COMPONENT, "Countdown ignored, epoch {} already complete", state.epoch);
            return;
        }
        state.stop_timer();
        state.idle_period = idle_period;
        state.deadline = Some(Instant::now() + idle_period);
        let timer = self.runtime.spawn(countdown(self.inner.clone(), state.epoch));
        state.timer = Some(timer);
        component_debug!(COMPONENT, "⏳ Countdown armed: {:?} in epoch {}", idle_period, state.epoch);
    }

    /// Arm the countdown with the idle period given at construction or last arm
    pub fn start_default_countdown(&self) {
        let idle_period = self.state().idle_period;
        self.start_countdown(idle_period);
    }

    /// Completion signal of the current epoch
    pub fn completion_future(&self) -> Completion {
        let state = self.state();
        Completion {
            epoch: state.epoch,
            rx: state.completion_rx.clone(),
        }
    }

    /// Fire the completion signal now, unless it already fired this epoch
    pub fn force_complete(&self) {
        let mut state = self.state();
        if state.fired {
            return;
        }
        state.stop_timer();
        state.fire("forced");
    }

    /// Clear records, cancel any pending timer and start a new epoch
    ///
    /// Waiters on the previous epoch's signal that has not fired resolve to `None`.
    pub fn reset(&self) -> u64 {
        let mut state = self.state();
        state.stop_timer();
        let next = SinkState::new(state.epoch + 1, state.idle_period);
        *state = next;
        component_debug!(COMPONENT, "♻️ Sink reset to epoch {}", state.epoch);
        state.epoch
    }

    /// Records captured so far in this epoch
    pub fn snapshot(&self) -> Vec<String> {
        self.state().payloads()
    }

    pub fn len(&self) -> usize {
        self.state().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn epoch(&self) -> u64 {
        self.state().epoch
    }

    /// Whether the countdown is running for this epoch
    pub fn is_armed(&self) -> bool {
        self.state().deadline.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.state().fired
    }
}

impl OutputSink for QuietPeriodSink {
    fn on_record(&self, record: String) {
        QuietPeriodSink::on_record(self, record);
    }
}

impl Drop for QuietPeriodSink {
    fn drop(&mut self) {
        self.state().stop_timer();
    }
}

fn lock(inner: &Mutex<SinkState>) -> MutexGuard<'_, SinkState> {
    // Records are append-only, so a poisoned guard still holds consistent data
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Sleep until the idle deadline; fire if no record moved it in the meantime
async fn countdown(inner: Arc<Mutex<SinkState>>, epoch: u64) {
    loop {
        let deadline = {
            let state = lock(&inner);
            if state.epoch != epoch || state.fired {
                return;
            }
            match state.deadline {
                Some(deadline) => deadline,
                None => return,
            }
        };

        sleep_until(deadline).await;

        let mut state = lock(&inner);
        if state.epoch != epoch || state.fired {
            return;
        }
        match state.deadline {
            Some(current) if Instant::now() >= current => {
                state.timer = None;
                state.fire("idle");
                return;
            }
            Some(_) => continue,
            None => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tokio::time::advance;

    const IDLE: Duration = Duration::from_millis(1000);

    fn sink() -> QuietPeriodSink {
        QuietPeriodSink::new(Handle::current(), IDLE)
    }

    /// Virtual time is exact up to the timer wheel's millisecond resolution
    fn assert_elapsed(start: Instant, expected: Duration) {
        let elapsed = start.elapsed();
        assert!(
            elapsed >= expected && elapsed <= expected + Duration::from_millis(1),
            "elapsed {elapsed:?}, expected {expected:?}"
        );
    }

    /// Completion lands one idle period after the last arrival
    #[tokio::test(start_paused = true)]
    async fn test_completes_idle_period_after_last_record() {
        let sink = sink();
        let start = Instant::now();
        sink.start_countdown(IDLE);

        sink.on_record("a");
        advance(Duration::from_millis(400)).await;
        sink.on_record("b");
        advance(Duration::from_millis(500)).await;
        sink.on_record("c");

        let snapshot = sink.completion_future().wait().await.unwrap();
        assert_elapsed(start, Duration::from_millis(1900));
        assert_eq!(*snapshot, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_empty_after_idle_period_without_records() {
        let sink = sink();
        let start = Instant::now();
        sink.start_countdown(IDLE);

        let snapshot = sink.completion_future().wait().await.unwrap();
        assert_elapsed(start, IDLE);
        assert!(snapshot.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_records_are_skipped() {
        let sink = sink();
        sink.start_countdown(IDLE);
        sink.on_record("x");
        sink.on_record("   ");
        sink.on_record("");

        let snapshot = sink.completion_future().wait().await.unwrap();
        assert_eq!(*snapshot, vec!["x".to_string()]);
    }

    /// Without an armed countdown the signal never fires on its own
    #[tokio::test(start_paused = true)]
    async fn test_unarmed_sink_never_completes() {
        let sink = sink();
        sink.on_record("a");
        assert!(!sink.is_armed());

        let result = sink.completion_future().wait_timeout(Duration::from_secs(30)).await;
        assert_matches!(result, Err(HarnessError::SinkTimeout { .. }));
        assert_eq!(sink.snapshot(), vec!["a".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_at_most_once_per_epoch() {
        let sink = sink();
        sink.start_countdown(IDLE);
        sink.on_record("a");
        let first = sink.completion_future().wait().await.unwrap();

        // Late records are captured but do not produce a second completion
        sink.on_record("late");
        sink.force_complete();
        sink.start_countdown(IDLE);
        assert!(!sink.is_armed());

        let again = sink.completion_future().peek().unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(sink.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_complete_fires_immediately() {
        let sink = sink();
        let start = Instant::now();
        sink.start_countdown(IDLE);
        sink.on_record("a");
        sink.force_complete();

        let snapshot = sink.completion_future().wait().await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(*snapshot, vec!["a".to_string()]);
        assert!(sink.is_complete());
    }

    /// After reset the accumulation starts empty and the signal is a new instance
    #[tokio::test(start_paused = true)]
    async fn test_reset_starts_a_fresh_epoch() {
        let sink = sink();
        sink.start_countdown(IDLE);
        sink.on_record("old");
        let previous = sink.completion_future();
        previous.clone().wait().await.unwrap();

        let epoch = sink.reset();
        assert_eq!(epoch, 1);
        assert!(sink.is_empty());
        assert!(!sink.is_complete());

        let current = sink.completion_future();
        assert!(!current.same_signal(&previous));
        assert!(current.same_signal(&sink.completion_future()));
        assert!(current.peek().is_none());

        sink.start_countdown(IDLE);
        sink.on_record("new");
        let snapshot = current.wait().await.unwrap();
        assert_eq!(*snapshot, vec!["new".to_string()]);
    }

    /// A reset cancels the pending timer and releases waiters of the old epoch
    #[tokio::test(start_paused = true)]
    async fn test_reset_cancels_pending_countdown() {
        let sink = sink();
        sink.start_countdown(IDLE);
        sink.on_record("a");
        let stale = sink.completion_future();

        sink.reset();
        assert!(stale.wait().await.is_none());

        advance(IDLE * 2).await;
        assert!(!sink.is_complete());
        assert!(sink.completion_future().peek().is_none());
    }

    /// Re-arming replaces the countdown duration
    #[tokio::test(start_paused = true)]
    async fn test_rearm_uses_new_duration() {
        let sink = sink();
        let start = Instant::now();
        sink.start_countdown(IDLE);
        sink.start_countdown(Duration::from_millis(250));

        sink.completion_future().wait().await.unwrap();
        assert_elapsed(start, Duration::from_millis(250));
    }
}
