// Event playhead - keeps a time-ordered event stream in step with a playback clock
// Fires events as the tick passes them and un-fires them when the tick goes back

use super::clock::{PlaybackClock, SubscriptionId, lock};
use crate::error::{PlaybackError, PlaybackResult};
use crate::messaging::channels::{NotificationSender, try_notify};
use crate::messaging::notification::{Notification, NotificationCategory};
use crate::midi::event::{TimedEvent, is_time_ordered};
use crate::midi::sink::EventSink;
use std::sync::{Arc, Mutex};

/// How the playhead is driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayheadMode {
    /// Clock-driven playback, forward or reversed, with seeks
    #[default]
    Standard,
    /// Interactive scrubbing with per-event inverse delivery (not implemented)
    Scrubbing,
}

/// Calls made by one reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Reconciliation {
    pub fired: usize,
    pub unfired: usize,
}

impl Reconciliation {
    pub fn is_noop(&self) -> bool {
        self.fired == 0 && self.unfired == 0
    }
}

struct PlayheadState<P, S> {
    events: Arc<[TimedEvent<P>]>,
    // events[..fired] have been delivered, events[fired..] are pending
    fired: usize,
    sink: S,
    disposed: bool,
    notification_tx: Option<NotificationSender>,
}

impl<P, S: EventSink<P>> PlayheadState<P, S> {
    fn reconcile(&mut self, tick: f64) -> Reconciliation {
        let mut result = Reconciliation::default();
        if self.disposed {
            return result;
        }
        let events = Arc::clone(&self.events);

        while let Some(next) = events.get(self.fired) {
            if next.tick > tick {
                break;
            }
            self.fired += 1;
            result.fired += 1;
            if let Err(err) = self.sink.fire(next) {
                self.report_sink_error("fire", err);
            }
        }

        while self.fired > 0 && events[self.fired - 1].tick > tick {
            self.fired -= 1;
            result.unfired += 1;
        }

        // One coalesced reset covers every event un-fired in this pass
        if result.unfired > 0 {
            if let Err(err) = self.sink.reset() {
                self.report_sink_error("reset", err);
            }
        }

        result
    }

    fn silence(&mut self) {
        if let Err(err) = self.sink.silence() {
            self.report_sink_error("silence", err);
        }
    }

    fn report_sink_error(&self, operation: &str, err: PlaybackError) {
        let message = format!("sink {} failed: {}", operation, err);
        log::warn!("{}", message);
        if let Some(tx) = &self.notification_tx {
            try_notify(tx, Notification::warning(NotificationCategory::Sink, message));
        }
    }
}

/// Playhead over a sorted event stream, driven by an owned clock
pub struct EventPlayhead<P, S: EventSink<P>> {
    clock: PlaybackClock,
    state: Arc<Mutex<PlayheadState<P, S>>>,
    subscription: SubscriptionId,
}

impl<P, S> EventPlayhead<P, S>
where
    P: Send + Sync + 'static,
    S: EventSink<P> + 'static,
{
    /// Build a playhead over `events` (sorted by ascending tick)
    ///
    /// The partition is reconciled against the clock's current tick right
    /// away, so events at or before the start tick fire immediately.
    pub fn new(events: Vec<TimedEvent<P>>, clock: PlaybackClock, sink: S) -> PlaybackResult<Self> {
        Self::with_mode(events, clock, sink, PlayheadMode::Standard)
    }

    pub fn with_mode(
        events: Vec<TimedEvent<P>>,
        clock: PlaybackClock,
        sink: S,
        mode: PlayheadMode,
    ) -> PlaybackResult<Self> {
        if mode == PlayheadMode::Scrubbing {
            return Err(PlaybackError::UnsupportedOperation(
                "scrubbing playheads are not implemented".to_string(),
            ));
        }
        if clock.is_disposed() {
            return Err(PlaybackError::InvalidState(
                "cannot drive a playhead from a disposed clock".to_string(),
            ));
        }
        if !is_time_ordered(&events) {
            return Err(PlaybackError::InvalidArgument(
                "events must have finite ticks sorted in ascending order".to_string(),
            ));
        }

        let state = Arc::new(Mutex::new(PlayheadState {
            events: events.into(),
            fired: 0,
            sink,
            disposed: false,
            notification_tx: clock.notification_sender(),
        }));

        lock(&state).reconcile(clock.current_tick());

        let listener_state = Arc::clone(&state);
        let subscription = clock.subscribe(move |tick| {
            lock(&listener_state).reconcile(tick);
        });

        log::debug!(
            "playhead created over {} events at tick {}",
            lock(&state).events.len(),
            clock.current_tick()
        );

        Ok(Self {
            clock,
            state,
            subscription,
        })
    }

    /// Resume the clock
    pub fn start(&self) {
        self.clock.start();
    }

    /// Hold playback: stop the clock and mute whatever is still sounding
    pub fn pause(&self) {
        self.clock.stop();
        let mut state = lock(&self.state);
        if !state.disposed {
            state.silence();
        }
    }

    /// Return to the leadup start tick
    ///
    /// Events after the start tick are un-fired. The clock resumes only if it
    /// was running when `restart` was called.
    pub fn restart(&self) -> PlaybackResult<()> {
        if self.is_disposed() {
            return Ok(());
        }

        let was_running = self.clock.is_running();
        self.clock.stop();
        self.clock.overwrite_tick(self.clock.min_tick())?;
        if was_running {
            self.clock.start();
        }
        Ok(())
    }

    /// Detach from the clock, dispose it and silence the sink (idempotent)
    pub fn dispose(&self) {
        if self.teardown() {
            log::debug!("playhead disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        lock(&self.state).disposed
    }

    /// Reconcile against the clock's current tick without waiting for a firing
    pub fn sync(&self) -> Reconciliation {
        let tick = self.clock.current_tick();
        lock(&self.state).reconcile(tick)
    }

    /// Route sink and listener failures to a diagnostic channel
    pub fn set_notification_sender(&self, sender: NotificationSender) {
        self.clock.set_notification_sender(Arc::clone(&sender));
        lock(&self.state).notification_tx = Some(sender);
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    /// Number of events delivered to the sink
    pub fn fired_count(&self) -> usize {
        lock(&self.state).fired
    }

    /// Number of events still waiting for the tick to reach them
    pub fn pending_count(&self) -> usize {
        let state = lock(&self.state);
        state.events.len() - state.fired
    }

    pub fn len(&self) -> usize {
        lock(&self.state).events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inspect the sink (e.g. to read its state from a render thread)
    pub fn with_sink<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&lock(&self.state).sink)
    }
}

impl<P, S> EventPlayhead<P, S>
where
    P: Clone + Send + Sync + 'static,
    S: EventSink<P> + 'static,
{
    /// Next event to fire, `None` once everything has fired
    pub fn peek_next_pending(&self) -> Option<TimedEvent<P>> {
        let state = lock(&self.state);
        state.events.get(state.fired).cloned()
    }

    /// Most recently fired event, `None` if nothing has fired
    pub fn peek_last_fired(&self) -> Option<TimedEvent<P>> {
        let state = lock(&self.state);
        state
            .fired
            .checked_sub(1)
            .and_then(|index| state.events.get(index))
            .cloned()
    }
}

impl<P, S: EventSink<P>> EventPlayhead<P, S> {
    /// Detach, dispose the clock and silence the sink. False if already done
    fn teardown(&self) -> bool {
        let first = {
            let mut state = lock(&self.state);
            !std::mem::replace(&mut state.disposed, true)
        };
        if first {
            self.clock.unsubscribe(self.subscription);
            self.clock.dispose();
            lock(&self.state).silence();
        }
        first
    }
}

impl<P, S: EventSink<P>> Drop for EventPlayhead<P, S> {
    fn drop(&mut self) {
        self.teardown();
    }
}
