// src/engine.rs - Alarm engine: per-message evaluation plus background re-evaluation
use crate::{
    builder::{build, render_text},
    config::{AlarmConfig, AlarmSettings},
    error::Result,
    message::{DropReason, Message, Outcome},
    scheduler::PeriodicTask,
    state::{AlarmState, AlarmStatus, SendOrigin, TickEffect},
    value::{extract, Scalar},
};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// Re-evaluation period used by [`AlarmEngine::new`].
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Point-in-time counters of one engine.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AlarmStats {
    pub messages: u64,
    pub pings: u64,
    pub emitted: u64,
    pub forwarded: u64,
    pub suppressed: u64,
    pub build_failures: u64,
    pub extraction_errors: u64,
    pub triggers: u64,
    pub resets: u64,
    pub resends: u64,
    pub triggered: bool,
    pub condition_active: bool,
    pub uptime_secs: u64,
}

#[derive(Default)]
struct Counters {
    messages: AtomicU64,
    pings: AtomicU64,
    emitted: AtomicU64,
    forwarded: AtomicU64,
    suppressed: AtomicU64,
    build_failures: AtomicU64,
    extraction_errors: AtomicU64,
    triggers: AtomicU64,
    resets: AtomicU64,
    resends: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// State shared between the message path and the background task.
struct Shared {
    settings: AlarmSettings,
    state: Mutex<AlarmState>,
    counters: Counters,
    started_at: Instant,
}

impl Shared {
    fn tick(&self, now: Instant) -> TickEffect {
        let effect = self
            .state
            .lock()
            .tick(self.settings.filter_time, self.settings.send_interval, now);

        match effect {
            TickEffect::DebounceElapsed => {
                bump(&self.counters.triggers);
                info!("Alarm triggered after debounce, send queued for next ping");
            }
            TickEffect::Resend => {
                bump(&self.counters.resends);
                info!("Resend interval elapsed, send queued for next ping");
            }
            TickEffect::Nothing => trace!("Re-evaluation tick, nothing to do"),
        }
        effect
    }
}

/// One configured alarm.
///
/// Messages go through [`process`](Self::process). When `filterTime` or
/// `sendInterval` is set, a background task re-evaluates the state on a
/// fixed period; sends it decides are emitted on the next ping message.
///
/// # Examples
///
/// ```rust
/// use serde_json::json;
/// use threshold_alarm::{AlarmConfig, AlarmEngine, Message, Outcome};
///
/// let engine = AlarmEngine::new(&AlarmConfig::default())?;
///
/// let outcome = engine.process(Message::new(json!(150)))?;
/// assert!(outcome.is_alarm());
///
/// // Already triggered, nothing more to say
/// let outcome = engine.process(Message::new(json!(160)))?;
/// assert!(matches!(outcome, Outcome::Drop(_)));
/// # Ok::<(), threshold_alarm::AlarmError>(())
/// ```
pub struct AlarmEngine {
    shared: Arc<Shared>,
    reevaluation: Mutex<Option<PeriodicTask>>,
}

impl AlarmEngine {
    /// Build an engine with the default re-evaluation period.
    ///
    /// Needs a tokio runtime only when a timer is configured.
    pub fn new(config: &AlarmConfig) -> Result<Self> {
        Self::with_tick_interval(config, DEFAULT_TICK_INTERVAL)
    }

    pub fn with_tick_interval(config: &AlarmConfig, tick_interval: Duration) -> Result<Self> {
        Self::from_settings(config.compile()?, tick_interval)
    }

    /// Build an engine from already compiled settings
    pub fn from_settings(settings: AlarmSettings, tick_interval: Duration) -> Result<Self> {
        info!("Creating alarm engine: {}", settings.summary());

        let needs_timer = settings.needs_timer();
        let shared = Arc::new(Shared {
            settings,
            state: Mutex::new(AlarmState::new()),
            counters: Counters::default(),
            started_at: Instant::now(),
        });

        let reevaluation = if needs_timer {
            let weak = Arc::downgrade(&shared);
            let task = PeriodicTask::spawn("re-evaluation", tick_interval, move || {
                if let Some(shared) = weak.upgrade() {
                    shared.tick(Instant::now());
                }
            })?;
            Some(task)
        } else {
            debug!("No filterTime or sendInterval, background re-evaluation disabled");
            None
        };

        Ok(Self {
            shared,
            reevaluation: Mutex::new(reevaluation),
        })
    }

    /// Evaluate one inbound message.
    ///
    /// Extraction failures are returned as errors and leave the state
    /// untouched. Build failures and suppressed traffic come back as
    /// [`Outcome::Drop`] with distinct reasons.
    pub fn process(&self, message: Message) -> Result<Outcome> {
        if message.is_ping() {
            return Ok(self.process_ping());
        }

        let counters = &self.shared.counters;
        let settings = &self.shared.settings;
        bump(&counters.messages);

        let observed = extract(&message.payload, settings.observe_path.as_deref())
            .and_then(|value| settings.conditions.check(&value).map(|checks| (value, checks)));
        let (value, checks) = match observed {
            Ok(observed) => observed,
            Err(e) => {
                bump(&counters.extraction_errors);
                warn!("Failed to evaluate message: {}", e);
                return Err(e);
            }
        };

        let send = {
            let mut state = self.shared.state.lock();
            state.retain(message.clone(), value.clone());
            let effect = state.observe(checks, settings.filter_time, Instant::now());

            if effect.triggered && effect.reset {
                debug!("Alarm and reset conditions both hold for {}, reset wins", value);
            } else if effect.triggered {
                bump(&counters.triggers);
                info!("Alarm triggered by value {}", value);
            } else if effect.debounce_started {
                debug!(
                    "Alarm condition met by value {}, debouncing for {:?}",
                    value, settings.filter_time
                );
            }
            if effect.reset {
                bump(&counters.resets);
                info!("Alarm reset by value {}", value);
            }

            state.take_send()
        };

        match send {
            Some(origin) => Ok(self.emit(&message, &value, origin)),
            None if settings.send_alarm_only => {
                bump(&counters.suppressed);
                debug!("Suppressed non-alarm message");
                Ok(Outcome::Drop(DropReason::Suppressed))
            }
            None => {
                bump(&counters.forwarded);
                Ok(Outcome::Forward(message))
            }
        }
    }

    fn process_ping(&self) -> Outcome {
        bump(&self.shared.counters.pings);

        let pending = {
            let mut state = self.shared.state.lock();
            match state.take_send() {
                Some(origin) => state.retained().cloned().map(|retained| (retained, origin)),
                None => None,
            }
        };

        match pending {
            Some((retained, origin)) => self.emit(&retained.message, &retained.value, origin),
            None => {
                trace!("Ping with no pending send");
                Outcome::Drop(DropReason::Ping)
            }
        }
    }

    fn emit(&self, source: &Message, value: &Scalar, origin: SendOrigin) -> Outcome {
        let settings = &self.shared.settings;
        let text = render_text(settings, value);

        match build(settings, source, value, &text) {
            Ok(alarm) => {
                bump(&self.shared.counters.emitted);
                if origin == SendOrigin::Background {
                    info!("Emitting background-originated alarm: {}", text);
                } else {
                    debug!("Emitting alarm: {}", text);
                }
                Outcome::Emit(alarm)
            }
            Err(e) => {
                bump(&self.shared.counters.build_failures);
                warn!("Alarm message could not be built, dropping: {}", e);
                Outcome::Drop(DropReason::BuildFailed(e.to_string()))
            }
        }
    }

    /// Run one re-evaluation step now, independent of the background task.
    pub fn tick(&self) -> TickEffect {
        self.shared.tick(Instant::now())
    }

    /// Stop the background task. Safe to call repeatedly or without a task.
    pub fn shutdown(&self) {
        if let Some(mut task) = self.reevaluation.lock().take() {
            task.stop();
            info!("Alarm engine shut down");
        }
    }

    /// True while the background re-evaluation task runs
    pub fn has_background_task(&self) -> bool {
        self.reevaluation.lock().is_some()
    }

    /// Conceptual state of the alarm
    pub fn status(&self) -> AlarmStatus {
        self.shared
            .state
            .lock()
            .status(self.shared.settings.send_interval)
    }

    pub fn settings(&self) -> &AlarmSettings {
        &self.shared.settings
    }

    pub fn stats(&self) -> AlarmStats {
        let counters = &self.shared.counters;
        let (triggered, condition_active) = {
            let state = self.shared.state.lock();
            (state.is_triggered(), state.is_condition_active())
        };

        AlarmStats {
            messages: counters.messages.load(Ordering::Relaxed),
            pings: counters.pings.load(Ordering::Relaxed),
            emitted: counters.emitted.load(Ordering::Relaxed),
            forwarded: counters.forwarded.load(Ordering::Relaxed),
            suppressed: counters.suppressed.load(Ordering::Relaxed),
            build_failures: counters.build_failures.load(Ordering::Relaxed),
            extraction_errors: counters.extraction_errors.load(Ordering::Relaxed),
            triggers: counters.triggers.load(Ordering::Relaxed),
            resets: counters.resets.load(Ordering::Relaxed),
            resends: counters.resends.load(Ordering::Relaxed),
            triggered,
            condition_active,
            uptime_secs: self.shared.started_at.elapsed().as_secs(),
        }
    }
}

impl Drop for AlarmEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for AlarmEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlarmEngine")
            .field("settings", &self.shared.settings)
            .field("status", &self.status())
            .finish()
    }
}
