//! Throttled analysis triggering with an in-flight gate.
//!
//! The scheduler decides, after each batch that added messages, whether to
//! start an analysis cycle. At most one cycle is outstanding at a time;
//! triggers that arrive while a cycle is in flight are dropped, not queued.
//!
//! Remote calls cannot be cancelled, so every cycle carries the session epoch
//! it was started in. A completion from an older epoch, or one arriving after
//! the session stopped, is reported as stale and leaves the state untouched.

use chrono::{DateTime, Duration, Utc};

/// Minimum number of buffered messages before an analysis can fire.
pub const MIN_MESSAGES_FOR_ANALYSIS: usize = 2;

/// Longest cooldown honored; larger settings are clamped.
const MAX_COOLDOWN_SECONDS: u64 = 86_400;

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    InFlight,
}

/// Handle for one started analysis cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleTicket {
    pub epoch: u64,
    pub triggered_at: DateTime<Utc>,
}

/// Outcome of reporting a finished cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The cycle belongs to the running session; its result may be rendered.
    Current,
    /// The session stopped or restarted since the cycle fired; discard the result.
    Stale,
}

#[derive(Debug, Clone)]
pub struct AnalysisScheduler {
    state: SchedulerState,
    active: bool,
    epoch: u64,
    cooldown: Duration,
    last_trigger: Option<DateTime<Utc>>,
}

impl Default for AnalysisScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisScheduler {
    pub fn new() -> Self {
        Self {
            state: SchedulerState::Idle,
            active: false,
            epoch: 0,
            cooldown: Duration::zero(),
            last_trigger: None,
        }
    }

    /// Arm for a new session. Returns the new epoch.
    pub fn start(&mut self, cooldown_seconds: u64) -> u64 {
        self.epoch += 1;
        self.active = true;
        self.state = SchedulerState::Idle;
        self.cooldown = Duration::seconds(cooldown_seconds.min(MAX_COOLDOWN_SECONDS) as i64);
        self.last_trigger = None;
        self.epoch
    }

    /// Disarm. Any cycle still in flight becomes stale.
    pub fn stop(&mut self) {
        self.active = false;
        self.state = SchedulerState::Idle;
        self.last_trigger = None;
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn last_trigger(&self) -> Option<DateTime<Utc>> {
        self.last_trigger
    }

    /// Evaluate the trigger condition after a batch added messages.
    ///
    /// Fires when the session is active, at least two messages are buffered,
    /// no cycle is in flight, and strictly more than the cooldown has elapsed
    /// since the previous trigger. The trigger time is recorded at fire time.
    pub fn evaluate(&mut self, buffered: usize, now: DateTime<Utc>) -> Option<CycleTicket> {
        if !self.active || self.state == SchedulerState::InFlight {
            return None;
        }
        if buffered < MIN_MESSAGES_FOR_ANALYSIS {
            return None;
        }
        if let Some(last) = self.last_trigger {
            if now - last <= self.cooldown {
                return None;
            }
        }

        self.state = SchedulerState::InFlight;
        self.last_trigger = Some(now);
        Some(CycleTicket {
            epoch: self.epoch,
            triggered_at: now,
        })
    }

    /// Report that a cycle finished, successfully or not.
    pub fn complete(&mut self, ticket: CycleTicket) -> Completion {
        if !self.active || ticket.epoch != self.epoch {
            return Completion::Stale;
        }
        self.state = SchedulerState::Idle;
        Completion::Current
    }
}
