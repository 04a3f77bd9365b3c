use rand::Rng;
use std::time::{Duration, SystemTime};

use crate::clock::{time_diff_ms, Clock};
use crate::gateway::Recorder;
use crate::runtime::{TriggerHandle, TriggerScheduler};
use crate::session::{SessionStats, SessionSummary};

pub const GAME_TITLE: &str = "Reaction Game";

pub const DEFAULT_MIN_DELAY_MS: u64 = 2000;
pub const DEFAULT_MAX_DELAY_MS: u64 = 5000;

const MSG_IDLE: &str = "Press space to start!";
const MSG_WAIT: &str = "Wait for the green signal...";
const MSG_GO: &str = "CLICK NOW!";
const MSG_TOO_SOON: &str = "Too soon! Wait for the green signal!";

/// Round lifecycle. The only legal skip is the fault path,
/// `Armed -> Resolved` on a premature action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    Idle,
    Armed,
    Triggered,
    Resolved,
}

/// Reaction-time round engine. Owns the state transitions, the randomized
/// arm delay, the pending trigger handle, and the session sample log.
#[derive(Debug)]
pub struct ReactionGame {
    state: RoundState,
    armed_at: Option<SystemTime>,
    trigger_at: Option<SystemTime>,
    last_latency_ms: Option<u64>,
    faulted: bool,
    best_ms: Option<u64>,
    message: String,
    /// Handle for the not-yet-fired trigger of the current round. Cancelled
    /// and replaced at the top of every `start()` so a stale timer can never
    /// complete a later round.
    pending: Option<TriggerHandle>,
    generation: u64,
    min_delay_ms: u64,
    max_delay_ms: u64,
    session: SessionStats,
    recorder: Option<Recorder>,
    user_id: Option<String>,
}

impl ReactionGame {
    pub fn new(user_id: Option<String>, recorder: Option<Recorder>) -> Self {
        Self::with_delay_range(user_id, recorder, DEFAULT_MIN_DELAY_MS, DEFAULT_MAX_DELAY_MS)
    }

    pub fn with_delay_range(
        user_id: Option<String>,
        recorder: Option<Recorder>,
        min_delay_ms: u64,
        max_delay_ms: u64,
    ) -> Self {
        Self {
            state: RoundState::Idle,
            armed_at: None,
            trigger_at: None,
            last_latency_ms: None,
            faulted: false,
            best_ms: None,
            message: MSG_IDLE.to_string(),
            pending: None,
            generation: 0,
            min_delay_ms,
            max_delay_ms: max_delay_ms.max(min_delay_ms + 1),
            session: SessionStats::new(),
            recorder,
            user_id,
        }
    }

    /// Abandon whatever round is in flight and arm a new one. The previous
    /// round's trigger is cancelled before the new delay is drawn.
    pub fn start(&mut self, clock: &impl Clock, scheduler: &impl TriggerScheduler) {
        if let Some(pending) = self.pending.take() {
            pending.cancel();
        }

        self.generation += 1;
        self.state = RoundState::Armed;
        self.armed_at = Some(clock.now());
        self.trigger_at = None;
        self.last_latency_ms = None;
        self.faulted = false;
        self.message = MSG_WAIT.to_string();

        let delay_ms = rand::thread_rng().gen_range(self.min_delay_ms..self.max_delay_ms);
        self.pending = Some(scheduler.schedule(self.generation, Duration::from_millis(delay_ms)));
    }

    /// Apply a delivered trigger. A token from a superseded round, or one
    /// arriving after the round already resolved, is a no-op.
    pub fn trigger_fired(&mut self, token: u64, clock: &impl Clock) {
        if token != self.generation || self.state != RoundState::Armed {
            return;
        }

        self.pending = None;
        self.state = RoundState::Triggered;
        self.trigger_at = Some(clock.now());
        self.message = MSG_GO.to_string();
    }

    /// Single entry point for the user's action, dispatched on round state.
    pub fn handle_action(&mut self, clock: &impl Clock, scheduler: &impl TriggerScheduler) {
        match self.state {
            RoundState::Triggered => {
                let Some(trigger_at) = self.trigger_at else {
                    return;
                };
                let latency = time_diff_ms(trigger_at, clock.now());

                self.state = RoundState::Resolved;
                self.last_latency_ms = Some(latency);
                self.message = format!("Your reaction time: {}ms", latency);
                self.session.append(latency);

                if self.best_ms.map_or(true, |best| latency < best) {
                    self.best_ms = Some(latency);
                }

                if let Some(recorder) = &self.recorder {
                    // duration mirrors the score here; it is a free-form
                    // secondary metric, not a contract
                    recorder.submit(
                        GAME_TITLE,
                        self.user_id.as_deref(),
                        latency as i64,
                        latency as i64,
                    );
                }
            }
            RoundState::Armed => {
                if let Some(pending) = self.pending.take() {
                    pending.cancel();
                }
                self.state = RoundState::Resolved;
                self.faulted = true;
                self.message = MSG_TOO_SOON.to_string();
            }
            RoundState::Idle | RoundState::Resolved => {
                self.start(clock, scheduler);
            }
        }
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn armed_at(&self) -> Option<SystemTime> {
        self.armed_at
    }

    pub fn trigger_at(&self) -> Option<SystemTime> {
        self.trigger_at
    }

    pub fn last_latency_ms(&self) -> Option<u64> {
        self.last_latency_ms
    }

    pub fn best_ms(&self) -> Option<u64> {
        self.best_ms
    }

    pub fn faulted(&self) -> bool {
        self.faulted
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_pending_trigger(&self) -> bool {
        self.pending.is_some()
    }

    pub fn session(&self) -> &SessionStats {
        &self.session
    }

    pub fn summary(&self) -> SessionSummary {
        self.session.summary()
    }
}
