// Playback clock - self-driving logical tick counter
// Advances a tick value on a wall-clock schedule and pushes every change to its listeners

use super::status::{AtomicClockStatus, ClockStatus};
use super::timeline::TickLength;
use crate::config::PlaybackConfig;
use crate::error::{PlaybackError, PlaybackResult};
use crate::messaging::channels::{NotificationSender, try_notify};
use crate::messaging::notification::{Notification, NotificationCategory};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Smallest interval the timer thread is trusted to honour reliably
pub const MIN_SCHEDULER_INTERVAL_MS: f64 = 16.0;

/// Longest time the timer thread may wait between two firings (one hour)
pub const MAX_SCHEDULER_INTERVAL_MS: f64 = 3_600_000.0;

/// Direction in which scheduled firings move the tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

impl Direction {
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Forward => 1.0,
            Direction::Reverse => -1.0,
        }
    }

    pub fn reversed(&self) -> Self {
        match self {
            Direction::Forward => Direction::Reverse,
            Direction::Reverse => Direction::Forward,
        }
    }
}

/// Who drives the scheduled firings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Scheduling {
    /// A dedicated timer thread owned by the clock
    #[default]
    Threaded,
    /// No thread; the host calls `PlaybackClock::step` (offline rendering, tests)
    Manual,
}

/// Firing schedule derived from a speed factor
///
/// When `tick_length / factor` drops under `MIN_SCHEDULER_INTERVAL_MS`, the
/// interval is pinned to the floor and each firing advances by more than one
/// tick instead. The average rate `increment_factor / scheduled_interval_ms`
/// always equals `factor / tick_length`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedSettings {
    pub factor: f64,
    pub scheduled_interval_ms: f64,
    pub increment_factor: f64,
}

impl SpeedSettings {
    pub fn compute(tick_length: TickLength, factor: f64) -> PlaybackResult<Self> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(PlaybackError::InvalidArgument(format!(
                "speed factor must be > 0, got {}",
                factor
            )));
        }

        let interval_ms = tick_length.ms() / factor;
        if interval_ms > MAX_SCHEDULER_INTERVAL_MS {
            return Err(PlaybackError::InvalidArgument(format!(
                "speed factor {} gives {}ms per tick, longer than {}ms",
                factor, interval_ms, MAX_SCHEDULER_INTERVAL_MS
            )));
        }

        if interval_ms < MIN_SCHEDULER_INTERVAL_MS {
            let increment_factor = MIN_SCHEDULER_INTERVAL_MS / interval_ms;
            if !increment_factor.is_finite() {
                return Err(PlaybackError::InvalidArgument(format!(
                    "speed factor {} is too large for a {} tick",
                    factor, tick_length
                )));
            }
            Ok(Self {
                factor,
                scheduled_interval_ms: MIN_SCHEDULER_INTERVAL_MS,
                increment_factor,
            })
        } else {
            Ok(Self {
                factor,
                scheduled_interval_ms: interval_ms,
                increment_factor: 1.0,
            })
        }
    }

    /// Average logical ticks advanced per real millisecond
    pub fn ticks_per_ms(&self) -> f64 {
        self.increment_factor / self.scheduled_interval_ms
    }

    fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.scheduled_interval_ms / 1000.0)
            .unwrap_or(Duration::from_millis(MAX_SCHEDULER_INTERVAL_MS as u64))
    }
}

/// Handle returned by `PlaybackClock::subscribe`
pub type SubscriptionId = u64;

type TickListener = Box<dyn FnMut(f64) + Send>;

#[derive(Default)]
struct Listeners {
    next_id: SubscriptionId,
    entries: Vec<(SubscriptionId, TickListener)>,
}

/// State shared between the clock handle and its timer thread
struct ClockShared {
    tick_length: TickLength,
    min_tick: f64,
    current_tick: AtomicU64, // f64 bits
    reverse: AtomicBool,
    status: AtomicClockStatus,
    speed: Mutex<SpeedSettings>,
    // Held for the whole advance + notify step, so it also serializes
    // firings, seeks and the stop/dispose barriers.
    listeners: Mutex<Listeners>,
    notification_tx: Mutex<Option<NotificationSender>>,
}

/// Lock a mutex, recovering the data if a previous holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl ClockShared {
    fn tick(&self) -> f64 {
        f64::from_bits(self.current_tick.load(Ordering::Acquire))
    }

    fn store_tick(&self, tick: f64) {
        self.current_tick.store(tick.to_bits(), Ordering::Release);
    }

    fn direction(&self) -> Direction {
        if self.reverse.load(Ordering::Relaxed) {
            Direction::Reverse
        } else {
            Direction::Forward
        }
    }

    /// One scheduled firing. Returns false if the clock is not running
    fn fire_scheduled(&self) -> bool {
        let mut listeners = lock(&self.listeners);
        if !self.status.get().is_running() {
            return false;
        }

        let increment = lock(&self.speed).increment_factor;
        let next = (self.tick() + increment * self.direction().sign()).max(self.min_tick);
        self.store_tick(next);
        self.dispatch(&mut listeners, next);
        true
    }

    fn seek(&self, tick: f64) {
        let mut listeners = lock(&self.listeners);
        if self.status.get().is_disposed() {
            return;
        }

        let clamped = tick.max(self.min_tick);
        self.store_tick(clamped);
        self.dispatch(&mut listeners, clamped);
    }

    fn dispatch(&self, listeners: &mut Listeners, tick: f64) {
        for (id, listener) in listeners.entries.iter_mut() {
            let result = catch_unwind(AssertUnwindSafe(|| listener(tick)));
            if let Err(payload) = result {
                let message = format!(
                    "tick listener {} panicked at tick {}: {}",
                    id,
                    tick,
                    panic_message(payload.as_ref())
                );
                log::error!("{}", message);
                self.report(Notification::error(NotificationCategory::Clock, message));
            }
        }
    }

    fn report(&self, notification: Notification) {
        if let Some(tx) = lock(&self.notification_tx).as_ref() {
            if !try_notify(tx, notification) {
                log::warn!("diagnostic channel unavailable, notification dropped");
            }
        }
    }
}

/// Timer thread body: fires on a deadline grid while the clock is running
fn run_timer(shared: Arc<ClockShared>) {
    let mut next_deadline: Option<Instant> = None;

    loop {
        match shared.status.get() {
            ClockStatus::Disposed => break,
            ClockStatus::Stopped => {
                next_deadline = None;
                thread::park();
                continue;
            }
            ClockStatus::Running => {}
        }

        let interval = lock(&shared.speed).interval();
        let deadline = *next_deadline.get_or_insert_with(|| Instant::now() + interval);

        let now = Instant::now();
        if now < deadline {
            // Woken early by start/stop/dispose or spuriously: re-check status
            thread::park_timeout(deadline - now);
            continue;
        }

        shared.fire_scheduled();

        // Stay on the grid, but never burst to catch up after a long stall
        let mut next = deadline + interval;
        let now = Instant::now();
        if next <= now {
            next = now + interval;
        }
        next_deadline = Some(next);
    }

    log::debug!("playback clock timer thread exited");
}

/// Logical playback clock
///
/// Every method takes `&self`; the clock can be shared behind an `Arc` between
/// a control thread and render threads. Listeners run on the firing thread
/// and must not call back into the clock's mutating methods.
pub struct PlaybackClock {
    shared: Arc<ClockShared>,
    timer: Mutex<Option<JoinHandle<()>>>,
    scheduling: Scheduling,
}

impl PlaybackClock {
    /// Create a clock driven by its own timer thread
    ///
    /// `initial_time_ms` is usually `-leadup`: the clock starts (and is
    /// floored) at `initial_time_ms / tick_length_ms`.
    pub fn new(tick_length_ms: f64, initial_time_ms: f64) -> PlaybackResult<Self> {
        Self::with_scheduling(tick_length_ms, initial_time_ms, Scheduling::Threaded)
    }

    /// Create a clock without a timer thread; firings come from `step`
    pub fn manual(tick_length_ms: f64, initial_time_ms: f64) -> PlaybackResult<Self> {
        Self::with_scheduling(tick_length_ms, initial_time_ms, Scheduling::Manual)
    }

    pub fn with_scheduling(
        tick_length_ms: f64,
        initial_time_ms: f64,
        scheduling: Scheduling,
    ) -> PlaybackResult<Self> {
        let tick_length = TickLength::new(tick_length_ms)?;
        if !initial_time_ms.is_finite() {
            return Err(PlaybackError::InvalidArgument(format!(
                "initial time must be finite, got {}",
                initial_time_ms
            )));
        }

        let min_tick = tick_length.ms_to_ticks(initial_time_ms);
        let shared = Arc::new(ClockShared {
            tick_length,
            min_tick,
            current_tick: AtomicU64::new(min_tick.to_bits()),
            reverse: AtomicBool::new(false),
            status: AtomicClockStatus::new(ClockStatus::Stopped),
            speed: Mutex::new(SpeedSettings::compute(tick_length, 1.0)?),
            listeners: Mutex::new(Listeners::default()),
            notification_tx: Mutex::new(None),
        });

        let timer = match scheduling {
            Scheduling::Threaded => {
                let thread_shared = Arc::clone(&shared);
                let handle = thread::Builder::new()
                    .name("playback-clock".to_string())
                    .spawn(move || run_timer(thread_shared))?;
                Some(handle)
            }
            Scheduling::Manual => None,
        };

        log::debug!(
            "playback clock created: {}, start tick {}, {:?}",
            tick_length,
            min_tick,
            scheduling
        );

        Ok(Self {
            shared,
            timer: Mutex::new(timer),
            scheduling,
        })
    }

    /// Create a clock from a validated configuration
    pub fn from_config(config: &PlaybackConfig) -> PlaybackResult<Self> {
        config.validate()?;
        let clock = Self::with_scheduling(
            config.tick_length_ms,
            -config.initial_leadup_ms,
            config.scheduling,
        )?;
        clock.set_speed(config.playback_speed)?;
        Ok(clock)
    }

    /// Current tick (consistent snapshot, safe from any thread)
    pub fn current_tick(&self) -> f64 {
        self.shared.tick()
    }

    /// Current time in milliseconds (`current_tick × tick_length`)
    pub fn current_time_ms(&self) -> f64 {
        self.shared.tick_length.ticks_to_ms(self.current_tick())
    }

    /// Lowest tick the clock can reach (the leadup start)
    pub fn min_tick(&self) -> f64 {
        self.shared.min_tick
    }

    pub fn tick_length(&self) -> TickLength {
        self.shared.tick_length
    }

    pub fn speed(&self) -> SpeedSettings {
        *lock(&self.shared.speed)
    }

    pub fn direction(&self) -> Direction {
        self.shared.direction()
    }

    pub fn status(&self) -> ClockStatus {
        self.shared.status.get()
    }

    pub fn is_running(&self) -> bool {
        self.status().is_running()
    }

    pub fn is_disposed(&self) -> bool {
        self.status().is_disposed()
    }

    pub fn scheduling(&self) -> Scheduling {
        self.scheduling
    }

    /// Change playback speed (no-op once disposed)
    pub fn set_speed(&self, factor: f64) -> PlaybackResult<()> {
        if self.is_disposed() {
            return Ok(());
        }

        let settings = SpeedSettings::compute(self.shared.tick_length, factor)?;
        *lock(&self.shared.speed) = settings;
        log::debug!(
            "speed set to {}x: every {:.3}ms advance {:.3} ticks",
            factor,
            settings.scheduled_interval_ms,
            settings.increment_factor
        );
        Ok(())
    }

    /// Set the direction of scheduled firings (no-op once disposed)
    pub fn set_direction(&self, direction: Direction) {
        if self.is_disposed() {
            return;
        }
        self.shared
            .reverse
            .store(direction == Direction::Reverse, Ordering::Relaxed);
    }

    /// Start the recurring schedule (idempotent)
    pub fn start(&self) {
        let previous = self.shared.status.transition(ClockStatus::Running);
        if previous == ClockStatus::Stopped {
            log::debug!("playback clock started at tick {}", self.current_tick());
            self.wake_timer();
        }
    }

    /// Stop the recurring schedule (idempotent)
    ///
    /// Once this returns no scheduled notification is delivered until `start`.
    pub fn stop(&self) {
        let previous = self.shared.status.transition(ClockStatus::Stopped);
        if previous.is_disposed() {
            return;
        }

        // Wait out a firing that may already be dispatching
        drop(lock(&self.shared.listeners));

        if previous == ClockStatus::Running {
            log::debug!("playback clock stopped at tick {}", self.current_tick());
            self.wake_timer();
        }
    }

    /// Seek to an absolute time and notify immediately (no-op once disposed)
    pub fn overwrite_time(&self, time_ms: f64) -> PlaybackResult<()> {
        self.overwrite_tick(self.shared.tick_length.ms_to_ticks(time_ms))
    }

    /// Seek to an absolute tick and notify immediately (no-op once disposed)
    ///
    /// Targets below `min_tick` are clamped to it.
    pub fn overwrite_tick(&self, tick: f64) -> PlaybackResult<()> {
        if !tick.is_finite() {
            return Err(PlaybackError::InvalidArgument(format!(
                "seek target must be finite, got {}",
                tick
            )));
        }

        log::debug!("seek to tick {}", tick);
        self.shared.seek(tick);
        Ok(())
    }

    /// Perform one scheduled firing now
    ///
    /// Returns false (and does nothing) unless the clock is running.
    pub fn step(&self) -> bool {
        self.shared.fire_scheduled()
    }

    /// Register a tick-change listener
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: FnMut(f64) + Send + 'static,
    {
        let mut listeners = lock(&self.shared.listeners);
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns false if the id was unknown
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = lock(&self.shared.listeners);
        let before = listeners.entries.len();
        listeners.entries.retain(|(entry_id, _)| *entry_id != id);
        listeners.entries.len() != before
    }

    /// Route listener failures to a diagnostic channel
    pub fn set_notification_sender(&self, sender: NotificationSender) {
        *lock(&self.shared.notification_tx) = Some(sender);
    }

    pub(crate) fn notification_sender(&self) -> Option<NotificationSender> {
        lock(&self.shared.notification_tx).clone()
    }

    /// Stop, release the timer thread and drop all listeners (idempotent)
    pub fn dispose(&self) {
        let previous = self.shared.status.transition(ClockStatus::Disposed);
        if previous.is_disposed() {
            return;
        }

        // Barrier against an in-flight firing, then release listener captures
        let released = std::mem::take(&mut lock(&self.shared.listeners).entries);
        drop(released);

        if let Some(handle) = lock(&self.timer).take() {
            handle.thread().unpark();
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                log::error!("playback clock timer thread panicked");
            }
        }

        log::debug!("playback clock disposed");
    }

    fn wake_timer(&self) {
        if let Some(handle) = lock(&self.timer).as_ref() {
            handle.thread().unpark();
        }
    }
}

impl Drop for PlaybackClock {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for PlaybackClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackClock")
            .field("tick_length", &self.shared.tick_length)
            .field("min_tick", &self.shared.min_tick)
            .field("current_tick", &self.current_tick())
            .field("status", &self.status())
            .field("scheduling", &self.scheduling)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn manual_clock(tick_length_ms: f64, initial_time_ms: f64) -> PlaybackClock {
        PlaybackClock::manual(tick_length_ms, initial_time_ms).unwrap()
    }

    #[test]
    fn test_construction_rejects_bad_tick_length() {
        assert!(matches!(
            PlaybackClock::manual(0.0, 0.0),
            Err(PlaybackError::InvalidArgument(_))
        ));
        assert!(matches!(
            PlaybackClock::manual(-1.0, 0.0),
            Err(PlaybackError::InvalidArgument(_))
        ));
        assert!(PlaybackClock::manual(10.0, f64::NAN).is_err());
    }

    #[test]
    fn test_initial_state() {
        let clock = manual_clock(10.0, -40.0);
        assert_eq!(clock.min_tick(), -4.0);
        assert_eq!(clock.current_tick(), -4.0);
        assert_eq!(clock.current_time_ms(), -40.0);
        assert_eq!(clock.status(), ClockStatus::Stopped);
        assert_eq!(clock.direction(), Direction::Forward);
        assert_eq!(clock.speed().factor, 1.0);
    }

    #[test]
    fn test_step_requires_running() {
        let clock = manual_clock(20.0, 0.0);
        assert!(!clock.step());
        assert_eq!(clock.current_tick(), 0.0);

        clock.start();
        assert!(clock.step());
        assert!(clock.step());
        assert_eq!(clock.current_tick(), 2.0);

        clock.stop();
        assert!(!clock.step());
        assert_eq!(clock.current_tick(), 2.0);
    }

    #[test]
    fn test_reverse_clamps_to_min_tick() {
        let clock = manual_clock(20.0, -40.0);
        let observed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&observed);
        clock.subscribe(move |tick| sink.lock().unwrap().push(tick));

        clock.start();
        clock.step();
        clock.set_direction(Direction::Reverse);
        for _ in 0..5 {
            clock.step();
        }

        assert_eq!(clock.current_tick(), -2.0);
        let observed = observed.lock().unwrap();
        assert_eq!(observed.first(), Some(&-1.0));
        assert!(observed.iter().all(|tick| *tick >= -2.0));
    }

    #[test]
    fn test_speed_without_compensation() {
        let clock = manual_clock(40.0, 0.0);
        clock.set_speed(2.0).unwrap();

        let speed = clock.speed();
        assert_eq!(speed.scheduled_interval_ms, 20.0);
        assert_eq!(speed.increment_factor, 1.0);
    }

    #[test]
    fn test_speed_with_compensation() {
        let clock = manual_clock(10.0, 0.0);
        clock.set_speed(2.0).unwrap();

        // 10ms / 2 = 5ms per tick, below the 16ms floor
        let speed = clock.speed();
        assert_eq!(speed.scheduled_interval_ms, MIN_SCHEDULER_INTERVAL_MS);
        assert!((speed.increment_factor - 3.2).abs() < 1e-12);
        assert!((speed.ticks_per_ms() - 2.0 / 10.0).abs() < 1e-12);

        clock.start();
        clock.step();
        assert!((clock.current_tick() - 3.2).abs() < 1e-12);
    }

    #[test]
    fn test_speed_rejects_non_positive() {
        let clock = manual_clock(10.0, 0.0);
        assert!(clock.set_speed(0.0).is_err());
        assert!(clock.set_speed(-1.0).is_err());
        assert!(clock.set_speed(f64::NAN).is_err());
        assert_eq!(clock.speed().factor, 1.0);
    }

    #[test]
    fn test_overwrite_time_notifies_while_stopped() {
        let clock = manual_clock(10.0, -40.0);
        let last = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&last);
        clock.subscribe(move |tick| *sink.lock().unwrap() = Some(tick));

        clock.overwrite_time(120.0).unwrap();
        assert_eq!(clock.current_time_ms(), 120.0);
        assert_eq!(*last.lock().unwrap(), Some(12.0));

        // Below the floor clamps
        clock.overwrite_time(-500.0).unwrap();
        assert_eq!(clock.current_tick(), -4.0);
        assert_eq!(*last.lock().unwrap(), Some(-4.0));

        assert!(clock.overwrite_tick(f64::INFINITY).is_err());
    }

    #[test]
    fn test_unsubscribe() {
        let clock = manual_clock(10.0, 0.0);
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let id = clock.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        clock.overwrite_tick(1.0).unwrap();
        assert!(clock.unsubscribe(id));
        assert!(!clock.unsubscribe(id));
        clock.overwrite_tick(2.0).unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_listener_is_contained() {
        let clock = manual_clock(10.0, 0.0);
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);

        clock.subscribe(|_| panic!("listener failure"));
        clock.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        clock.start();
        assert!(clock.step());
        assert!(clock.step());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_disposed_mutators_are_noops() {
        let clock = manual_clock(10.0, 0.0);
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        clock.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        clock.dispose();
        clock.dispose();
        assert!(clock.is_disposed());

        clock.start();
        assert_eq!(clock.status(), ClockStatus::Disposed);
        assert!(clock.set_speed(4.0).is_ok());
        assert_eq!(clock.speed().factor, 1.0);
        clock.set_direction(Direction::Reverse);
        assert_eq!(clock.direction(), Direction::Forward);
        clock.overwrite_tick(10.0).unwrap();
        assert!(!clock.step());

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(clock.current_tick(), 0.0);
    }

    #[test]
    fn test_speed_rejects_unschedulable_interval() {
        let clock = manual_clock(16.0, 0.0);
        assert!(matches!(
            clock.set_speed(1e-30),
            Err(PlaybackError::InvalidArgument(_))
        ));
        assert!(matches!(
            clock.set_speed(f64::MAX),
            Err(PlaybackError::InvalidArgument(_))
        ));
        assert_eq!(clock.speed().factor, 1.0);

        // A very slow but schedulable speed is still accepted
        clock.set_speed(1e-5).unwrap();
        assert!((clock.speed().scheduled_interval_ms - 1_600_000.0).abs() < 1e-3);
        assert_eq!(clock.speed().increment_factor, 1.0);
        assert!(clock.speed().interval() > Duration::from_secs(1_599));

        assert!(PlaybackClock::manual(1e12, 0.0).is_err());
    }

    #[test]
    fn test_direction_helpers() {
        assert_eq!(Direction::Forward.sign(), 1.0);
        assert_eq!(Direction::Reverse.sign(), -1.0);
        assert_eq!(Direction::Forward.reversed(), Direction::Reverse);
    }
}
