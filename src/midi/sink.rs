// Event sinks - where the playhead delivers fired events

use crate::error::{PlaybackError, PlaybackResult};
use crate::messaging::channels::CommandProducer;
use crate::messaging::command::Command;
use crate::midi::event::{MidiEvent, TimedEvent};
use ringbuf::traits::Producer;

/// Output collaborator of the playhead
///
/// Called from the clock's firing thread, so implementations must be `Send`
/// and must return quickly.
pub trait EventSink<P>: Send {
    /// Deliver the effect of one event (note on/off, spawn a lane object, ...)
    fn fire(&mut self, event: &TimedEvent<P>) -> PlaybackResult<()>;

    /// Clear all active effects after the playhead moved backwards
    ///
    /// A single reset may stand for several un-fired events: exact per-event
    /// inversion is not meaningful for sounding notes.
    fn reset(&mut self) -> PlaybackResult<()>;

    /// Mute everything still sounding when playback is held
    fn silence(&mut self) -> PlaybackResult<()> {
        self.reset()
    }
}

impl<P, S: EventSink<P> + ?Sized> EventSink<P> for Box<S> {
    fn fire(&mut self, event: &TimedEvent<P>) -> PlaybackResult<()> {
        (**self).fire(event)
    }

    fn reset(&mut self) -> PlaybackResult<()> {
        (**self).reset()
    }

    fn silence(&mut self) -> PlaybackResult<()> {
        (**self).silence()
    }
}

/// Sink that forwards MIDI events as commands into a lock-free ring buffer
/// Tracks sounding notes so a reset can release exactly those
pub struct CommandSink {
    command_tx: CommandProducer,
    sounding: [bool; 128],
}

impl CommandSink {
    pub fn new(command_tx: CommandProducer) -> Self {
        Self {
            command_tx,
            sounding: [false; 128],
        }
    }

    /// Number of notes currently held on
    pub fn sounding_count(&self) -> usize {
        self.sounding.iter().filter(|on| **on).count()
    }

    pub fn is_sounding(&self, note: u8) -> bool {
        self.sounding.get(note as usize).copied().unwrap_or(false)
    }

    fn push(&mut self, command: Command) -> PlaybackResult<()> {
        self.command_tx
            .try_push(command)
            .map_err(|cmd| PlaybackError::ChannelFull(format!("dropped {:?}", cmd)))
    }
}

impl EventSink<MidiEvent> for CommandSink {
    fn fire(&mut self, event: &TimedEvent<MidiEvent>) -> PlaybackResult<()> {
        self.push(Command::Midi(event.payload))?;

        match event.payload {
            MidiEvent::NoteOn { note, .. } => {
                if let Some(slot) = self.sounding.get_mut(note as usize) {
                    *slot = true;
                }
            }
            MidiEvent::NoteOff { note } => {
                if let Some(slot) = self.sounding.get_mut(note as usize) {
                    *slot = false;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn reset(&mut self) -> PlaybackResult<()> {
        let mut dropped = 0;

        for note in 0..self.sounding.len() {
            if !self.sounding[note] {
                continue;
            }
            match self.push(Command::Midi(MidiEvent::NoteOff { note: note as u8 })) {
                Ok(()) => self.sounding[note] = false,
                Err(_) => dropped += 1,
            }
        }

        if dropped > 0 {
            return Err(PlaybackError::ChannelFull(format!(
                "{} note-off commands could not be queued",
                dropped
            )));
        }
        Ok(())
    }

    /// Release tracked notes, then send a blanket all-notes-off for anything
    /// the sink did not start itself
    fn silence(&mut self) -> PlaybackResult<()> {
        let released = self.reset();
        self.push(Command::AllNotesOff)?;
        released
    }
}
