// MIDI payloads and output sinks

pub mod event;
pub mod sink;

pub use event::{MidiEvent, TimedEvent, is_time_ordered};
pub use sink::{CommandSink, EventSink};
