// Sequencer - tick clock and event playhead
// The clock produces ticks on its own schedule; the playhead turns ticks into sink calls

pub mod clock;
pub mod playhead;
pub mod status;
pub mod timeline;

pub use clock::{
    Direction, MAX_SCHEDULER_INTERVAL_MS, MIN_SCHEDULER_INTERVAL_MS, PlaybackClock, Scheduling,
    SpeedSettings, SubscriptionId,
};
pub use playhead::{EventPlayhead, PlayheadMode, Reconciliation};
pub use status::{AtomicClockStatus, ClockStatus};
pub use timeline::{Tempo, TickLength};
