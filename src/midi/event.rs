// MIDI event payloads and tick-stamped stream entries

/// Channel voice message carried by a timed event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
    ControlChange { controller: u8, value: u8 },
    PitchBend { value: i16 },
}

impl MidiEvent {
    /// Parse a raw MIDI message (the channel nibble is ignored)
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let &[status, data1, data2, ..] = bytes else {
            return None;
        };

        match status & 0xF0 {
            // Velocity 0 on a NoteOn is a NoteOff by convention
            0x90 if data2 == 0 => Some(MidiEvent::NoteOff { note: data1 }),
            0x90 => Some(MidiEvent::NoteOn {
                note: data1,
                velocity: data2,
            }),
            0x80 => Some(MidiEvent::NoteOff { note: data1 }),
            0xB0 => Some(MidiEvent::ControlChange {
                controller: data1,
                value: data2,
            }),
            0xE0 => Some(MidiEvent::PitchBend {
                value: ((data2 as i16) << 7) | data1 as i16,
            }),
            _ => None,
        }
    }

    /// Note number for note messages
    pub fn note(&self) -> Option<u8> {
        match *self {
            MidiEvent::NoteOn { note, .. } | MidiEvent::NoteOff { note } => Some(note),
            _ => None,
        }
    }
}

/// A discrete event positioned on the tick axis
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvent<P> {
    /// Tick-domain timestamp
    pub tick: f64,
    pub payload: P,
}

impl<P> TimedEvent<P> {
    pub fn new(tick: f64, payload: P) -> Self {
        Self { tick, payload }
    }
}

impl TimedEvent<MidiEvent> {
    pub fn note_on(tick: f64, note: u8, velocity: u8) -> Self {
        Self::new(tick, MidiEvent::NoteOn { note, velocity })
    }

    pub fn note_off(tick: f64, note: u8) -> Self {
        Self::new(tick, MidiEvent::NoteOff { note })
    }
}

/// Check that a stream is ordered by ascending tick and has only finite ticks
pub fn is_time_ordered<P>(events: &[TimedEvent<P>]) -> bool {
    events.iter().all(|e| e.tick.is_finite())
        && events.windows(2).all(|pair| pair[0].tick <= pair[1].tick)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on() {
        let event = MidiEvent::from_bytes(&[0x90, 60, 100]).unwrap();
        assert_eq!(
            event,
            MidiEvent::NoteOn {
                note: 60,
                velocity: 100
            }
        );
    }

    #[test]
    fn test_note_off_velocity_zero() {
        let event = MidiEvent::from_bytes(&[0x90, 64, 0]).unwrap();
        assert_eq!(event, MidiEvent::NoteOff { note: 64 });
    }

    #[test]
    fn test_pitch_bend_center() {
        let event = MidiEvent::from_bytes(&[0xE0, 0x00, 0x40]).unwrap();
        assert_eq!(event, MidiEvent::PitchBend { value: 8192 });
    }

    #[test]
    fn test_invalid_messages() {
        assert!(MidiEvent::from_bytes(&[]).is_none());
        assert!(MidiEvent::from_bytes(&[0x90, 60]).is_none());
        assert!(MidiEvent::from_bytes(&[0xF0, 0x00, 0x00]).is_none());
    }

    #[test]
    fn test_channel_ignored() {
        assert_eq!(
            MidiEvent::from_bytes(&[0x90, 60, 100]),
            MidiEvent::from_bytes(&[0x9F, 60, 100])
        );
    }

    #[test]
    fn test_note_accessor() {
        assert_eq!(TimedEvent::note_on(0.0, 60, 90).payload.note(), Some(60));
        assert_eq!(TimedEvent::note_off(2.0, 61).payload.note(), Some(61));
        assert_eq!(MidiEvent::PitchBend { value: 0 }.note(), None);
    }

    #[test]
    fn test_time_ordering_check() {
        let sorted = vec![
            TimedEvent::new(0.0, ()),
            TimedEvent::new(0.0, ()),
            TimedEvent::new(5.0, ()),
        ];
        assert!(is_time_ordered(&sorted));

        let unsorted = vec![TimedEvent::new(5.0, ()), TimedEvent::new(1.0, ())];
        assert!(!is_time_ordered(&unsorted));

        let nan = vec![TimedEvent::new(f64::NAN, ())];
        assert!(!is_time_ordered(&nan));

        assert!(is_time_ordered::<()>(&[]));
    }
}
