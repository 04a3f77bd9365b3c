use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent};

/// Unified event type consumed by the app runner
#[derive(Clone, Debug)]
pub enum BlinkEvent {
    Key(KeyEvent),
    Resize,
    Tick,
    /// One-shot "go" signal for the reaction game. Carries the round
    /// generation it was scheduled for so a superseded timer can be told
    /// apart from the live one.
    Trigger(u64),
}

/// Source of terminal events (keyboard, resize, etc.)
pub trait EventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<BlinkEvent, RecvTimeoutError>;
}

/// Production event source using crossterm, multiplexed with scheduler
/// deliveries over the same channel.
pub struct CrosstermEventSource {
    rx: Receiver<BlinkEvent>,
    tx: Sender<BlinkEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        let key_tx = tx.clone();
        thread::spawn(move || loop {
            match event::read() {
                Ok(CtEvent::Key(key)) => {
                    if key_tx.send(BlinkEvent::Key(key)).is_err() {
                        break;
                    }
                }
                Ok(CtEvent::Resize(_, _)) => {
                    if key_tx.send(BlinkEvent::Resize).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            }
        });

        Self { rx, tx }
    }

    /// Sender half for feeding scheduler deliveries into the same stream
    pub fn sender(&self) -> Sender<BlinkEvent> {
        self.tx.clone()
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<BlinkEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    rx: Receiver<BlinkEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<BlinkEvent>) -> Self {
        Self { rx }
    }
}

impl EventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<BlinkEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Cancellation handle for a scheduled trigger. Dropping the handle does not
/// cancel; `cancel()` must be called so a stale timer can never fire into a
/// later round.
#[derive(Clone, Debug)]
pub struct TriggerHandle {
    token: u64,
    cancelled: Arc<AtomicBool>,
}

impl TriggerHandle {
    pub fn new(token: u64) -> Self {
        Self {
            token,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// "Call me after N milliseconds" primitive for the reaction game
pub trait TriggerScheduler {
    /// Schedule a one-shot trigger carrying `token` after `delay`.
    /// The returned handle cancels the delivery.
    fn schedule(&self, token: u64, delay: Duration) -> TriggerHandle;
}

/// Production scheduler: a spawned sleeper thread that sends
/// `BlinkEvent::Trigger(token)` into the event stream unless cancelled first.
pub struct ThreadScheduler {
    tx: Sender<BlinkEvent>,
}

impl ThreadScheduler {
    pub fn new(tx: Sender<BlinkEvent>) -> Self {
        Self { tx }
    }
}

impl TriggerScheduler for ThreadScheduler {
    fn schedule(&self, token: u64, delay: Duration) -> TriggerHandle {
        let handle = TriggerHandle::new(token);
        let thread_handle = handle.clone();
        let tx = self.tx.clone();

        thread::spawn(move || {
            thread::sleep(delay);
            if !thread_handle.is_cancelled() {
                let _ = tx.send(BlinkEvent::Trigger(token));
            }
        });

        handle
    }
}

/// Test scheduler that records every request and hands out inspectable
/// handles instead of spawning threads.
#[derive(Default)]
pub struct RecordingScheduler {
    scheduled: std::cell::RefCell<Vec<(u64, Duration, TriggerHandle)>>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheduled(&self) -> Vec<(u64, Duration)> {
        self.scheduled
            .borrow()
            .iter()
            .map(|(t, d, _)| (*t, *d))
            .collect()
    }

    pub fn handle_for(&self, token: u64) -> Option<TriggerHandle> {
        self.scheduled
            .borrow()
            .iter()
            .find(|(t, _, _)| *t == token)
            .map(|(_, _, h)| h.clone())
    }

    pub fn last_token(&self) -> Option<u64> {
        self.scheduled.borrow().last().map(|(t, _, _)| *t)
    }
}

impl TriggerScheduler for RecordingScheduler {
    fn schedule(&self, token: u64, delay: Duration) -> TriggerHandle {
        let handle = TriggerHandle::new(token);
        self.scheduled
            .borrow_mut()
            .push((token, delay, handle.clone()));
        handle
    }
}

/// Runner that advances the application one event/tick at a time
pub struct Runner<E: EventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: EventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Blocks up to tick interval and returns the next event, or Tick on timeout
    pub fn step(&self) -> BlinkEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                BlinkEvent::Tick
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::mpsc;

    #[test]
    fn step_returns_tick_on_timeout() {
        let (_tx, rx) = mpsc::channel();
        let es = TestEventSource::new(rx);
        let ticker = FixedTicker::new(Duration::from_millis(1));
        let runner = Runner::new(es, ticker);

        // With no events available, step should yield Tick
        assert_matches!(runner.step(), BlinkEvent::Tick);
    }

    #[test]
    fn step_passes_through_events() {
        let (tx, rx) = mpsc::channel();
        tx.send(BlinkEvent::Resize).unwrap();
        let es = TestEventSource::new(rx);
        let ticker = FixedTicker::new(Duration::from_millis(10));
        let runner = Runner::new(es, ticker);

        assert_matches!(runner.step(), BlinkEvent::Resize);
    }

    #[test]
    fn thread_scheduler_delivers_trigger_with_token() {
        let (tx, rx) = mpsc::channel();
        let scheduler = ThreadScheduler::new(tx);

        scheduler.schedule(7, Duration::from_millis(5));

        let ev = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_matches!(ev, BlinkEvent::Trigger(7));
    }

    #[test]
    fn cancelled_trigger_is_never_delivered() {
        let (tx, rx) = mpsc::channel();
        let scheduler = ThreadScheduler::new(tx);

        let handle = scheduler.schedule(3, Duration::from_millis(20));
        handle.cancel();

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn recording_scheduler_tracks_requests() {
        let scheduler = RecordingScheduler::new();

        scheduler.schedule(1, Duration::from_millis(2500));
        scheduler.schedule(2, Duration::from_millis(4000));

        assert_eq!(
            scheduler.scheduled(),
            vec![
                (1, Duration::from_millis(2500)),
                (2, Duration::from_millis(4000))
            ]
        );
        assert_eq!(scheduler.last_token(), Some(2));
        assert!(!scheduler.handle_for(1).unwrap().is_cancelled());
    }
}
