// src/state.rs - Alarm state record and its transition rules
//!
//! One [`AlarmState`] exists per engine. Both the message path and the
//! background re-evaluation mutate it, always under the engine lock.
//!
//! ```text
//!           alarm (filterTime = 0)
//!   Idle ─────────────────────────────────────► Triggered ──► Resending
//!    │                                              ▲          (every sendInterval)
//!    │ alarm (filterTime > 0)                       │
//!    └──────────────► Debouncing ───────────────────┘
//!                        elapsed >= filterTime (tick or message)
//!
//!   reset observation: any state ──► Idle
//! ```

use crate::{condition::Checks, message::Message, value::Scalar};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// Conceptual alarm state derived from the flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlarmStatus {
    /// No alarm condition since the last reset
    Idle,
    /// Condition observed, waiting out `filterTime`
    Debouncing,
    /// Alarm sent, awaiting reset
    Triggered,
    /// Triggered and re-notifying every `sendInterval`
    Resending,
}

/// Where the outstanding send decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOrigin {
    /// Decided while evaluating an inbound message
    Message,
    /// Decided by the background re-evaluation
    Background,
}

/// Last real message and the observation extracted from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Retained {
    pub message: Message,
    pub value: Scalar,
}

/// What an observation changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserveEffect {
    pub triggered: bool,
    pub debounce_started: bool,
    pub reset: bool,
}

/// What a background tick changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickEffect {
    Nothing,
    /// Debounce window elapsed, first send scheduled
    DebounceElapsed,
    /// Resend period elapsed, re-notification scheduled
    Resend,
}

/// Mutable alarm state; lives as long as its engine.
#[derive(Debug, Default)]
pub struct AlarmState {
    /// An alarm fired and has not been reset
    triggered: bool,
    /// The alarm condition was seen since the last reset
    condition_active: bool,
    /// First observation of the condition in this episode
    debounce_start: Option<Instant>,
    /// Last background re-notification
    last_resend_at: Option<Instant>,
    /// A send was decided and not yet emitted
    pending_send: bool,
    /// The pending send came from the background task
    resend_fired: bool,
    /// Content template for background-originated sends
    retained: Option<Retained>,
}

impl AlarmState {
    /// Fresh idle state
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the latest real message as the replay template
    pub fn retain(&mut self, message: Message, value: Scalar) {
        self.retained = Some(Retained { message, value });
    }

    /// Replay template, if a real message was seen
    pub fn retained(&self) -> Option<&Retained> {
        self.retained.as_ref()
    }

    /// Apply one classified observation.
    ///
    /// A reset in the same observation wins over a trigger, including any
    /// send that was still outstanding.
    pub fn observe(&mut self, checks: Checks, filter_time: Duration, now: Instant) -> ObserveEffect {
        let mut effect = ObserveEffect::default();

        if checks.alarm && !self.triggered {
            self.condition_active = true;
            if filter_time.is_zero() {
                self.fire(SendOrigin::Message);
                effect.triggered = true;
            } else {
                match self.debounce_start {
                    None => {
                        self.debounce_start = Some(now);
                        effect.debounce_started = true;
                    }
                    Some(start) if now.duration_since(start) >= filter_time => {
                        self.fire(SendOrigin::Message);
                        effect.triggered = true;
                    }
                    Some(_) => {}
                }
            }
        }

        if checks.reset {
            effect.reset = self.triggered || self.condition_active;
            self.reset();
        }

        effect
    }

    /// Time-driven transitions, run by the background task.
    pub fn tick(&mut self, filter_time: Duration, send_interval: Duration, now: Instant) -> TickEffect {
        if let Some(start) = self.debounce_start {
            if self.condition_active && !self.triggered && now.duration_since(start) >= filter_time {
                self.fire(SendOrigin::Background);
                return TickEffect::DebounceElapsed;
            }
        }

        if !send_interval.is_zero() && self.triggered && self.condition_active {
            match self.last_resend_at {
                None => self.last_resend_at = Some(now),
                Some(last) if now.duration_since(last) >= send_interval => {
                    self.pending_send = true;
                    self.resend_fired = true;
                    self.last_resend_at = Some(now);
                    return TickEffect::Resend;
                }
                Some(_) => {}
            }
        }

        TickEffect::Nothing
    }

    /// Consume the outstanding send decision.
    pub fn take_send(&mut self) -> Option<SendOrigin> {
        if !self.pending_send {
            return None;
        }
        let origin = if self.resend_fired {
            SendOrigin::Background
        } else {
            SendOrigin::Message
        };
        self.pending_send = false;
        self.resend_fired = false;
        Some(origin)
    }

    /// True while a send is outstanding
    pub fn has_pending_send(&self) -> bool {
        self.pending_send
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered
    }

    pub fn is_condition_active(&self) -> bool {
        self.condition_active
    }

    /// Conceptual state for status reporting
    pub fn status(&self, send_interval: Duration) -> AlarmStatus {
        match (self.condition_active, self.triggered) {
            (false, _) => AlarmStatus::Idle,
            (true, false) => AlarmStatus::Debouncing,
            (true, true) if !send_interval.is_zero() && self.last_resend_at.is_some() => {
                AlarmStatus::Resending
            }
            (true, true) => AlarmStatus::Triggered,
        }
    }

    fn fire(&mut self, origin: SendOrigin) {
        self.triggered = true;
        self.condition_active = true;
        self.pending_send = true;
        self.resend_fired = origin == SendOrigin::Background;
    }

    fn reset(&mut self) {
        self.triggered = false;
        self.condition_active = false;
        self.debounce_start = None;
        self.last_resend_at = None;
        self.pending_send = false;
        self.resend_fired = false;
    }
}
