// Command types - Playback core → MIDI output

use crate::midi::event::MidiEvent;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Midi(MidiEvent),
    /// Panic button: silence every channel regardless of tracked state
    AllNotesOff,
}
