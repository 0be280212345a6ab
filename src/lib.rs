// Rhythm playback - Library exports for the game client, tests and benchmarks

pub mod config;
pub mod error;
pub mod messaging;
pub mod midi;
pub mod scoring;
pub mod sequencer;

// Re-export commonly used types for convenience
pub use config::PlaybackConfig;
pub use error::{PlaybackError, PlaybackResult};
pub use messaging::channels::{create_command_channel, create_notification_channel};
pub use midi::event::{MidiEvent, TimedEvent};
pub use midi::sink::{CommandSink, EventSink};
pub use scoring::{Accuracy, AccuracyTally, AccuracyWindows, CollisionRanges};
pub use sequencer::{
    ClockStatus, Direction, EventPlayhead, PlaybackClock, PlayheadMode, Scheduling, TickLength,
};
