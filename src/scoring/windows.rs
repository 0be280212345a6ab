// Accuracy windows - classify timing error into discrete tiers
// All times are in milliseconds

use crate::config::DEFAULT_FORGIVENESS_MS;
use crate::error::{PlaybackError, PlaybackResult};
use std::fmt;

/// Accuracy tier of a player input against its target event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Accuracy {
    Perfect,
    Good,
    Okay,
    Miss,
}

impl Accuracy {
    /// Score awarded for one judged event
    pub fn points(&self) -> u32 {
        match self {
            Accuracy::Perfect => 300,
            Accuracy::Good => 200,
            Accuracy::Okay => 100,
            Accuracy::Miss => 0,
        }
    }
}

impl fmt::Display for Accuracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Accuracy::Perfect => "PERFECT",
            Accuracy::Good => "GOOD",
            Accuracy::Okay => "OKAY",
            Accuracy::Miss => "MISS",
        };
        f.write_str(label)
    }
}

/// Which edge of a note the input is judged against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteEdge {
    On,
    Off,
}

/// Three concentric forgiveness radii (perfect ⊂ good ⊂ okay)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccuracyWindows {
    pub perfect_ms: f64,
    pub good_ms: f64,
    pub okay_ms: f64,
}

impl AccuracyWindows {
    pub fn new(perfect_ms: f64, good_ms: f64, okay_ms: f64) -> PlaybackResult<Self> {
        let finite = [perfect_ms, good_ms, okay_ms].iter().all(|r| r.is_finite());
        if !finite || perfect_ms < 0.0 || perfect_ms > good_ms || good_ms > okay_ms {
            return Err(PlaybackError::InvalidArgument(format!(
                "accuracy windows must satisfy 0 <= perfect <= good <= okay, got {}/{}/{}",
                perfect_ms, good_ms, okay_ms
            )));
        }
        Ok(Self {
            perfect_ms,
            good_ms,
            okay_ms,
        })
    }

    /// Windows derived from a single width: okay = width, good = width/2, perfect = width/4
    pub fn from_forgiveness(forgiveness_ms: f64) -> PlaybackResult<Self> {
        Self::new(forgiveness_ms / 4.0, forgiveness_ms / 2.0, forgiveness_ms)
    }

    /// Classify a signed timing error (input time − event time)
    pub fn classify(&self, error_ms: f64) -> Accuracy {
        let distance = error_ms.abs();
        if distance.is_nan() {
            Accuracy::Miss
        } else if distance <= self.perfect_ms {
            Accuracy::Perfect
        } else if distance <= self.good_ms {
            Accuracy::Good
        } else if distance <= self.okay_ms {
            Accuracy::Okay
        } else {
            Accuracy::Miss
        }
    }

    /// Check if an event is past its last chance to be hit
    pub fn is_missed(&self, event_time_ms: f64, now_ms: f64) -> bool {
        now_ms - event_time_ms > self.okay_ms
    }
}

/// Accuracy windows for note-on and note-off judged independently
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionRanges {
    pub note_on: AccuracyWindows,
    pub note_off: AccuracyWindows,
}

impl CollisionRanges {
    /// Releases are judged twice as leniently as presses
    pub fn from_forgiveness(forgiveness_ms: f64) -> PlaybackResult<Self> {
        if !forgiveness_ms.is_finite() || forgiveness_ms <= 0.0 {
            return Err(PlaybackError::InvalidArgument(format!(
                "forgiveness must be > 0, got {}",
                forgiveness_ms
            )));
        }
        Ok(Self {
            note_on: AccuracyWindows::from_forgiveness(forgiveness_ms)?,
            note_off: AccuracyWindows::from_forgiveness(forgiveness_ms * 2.0)?,
        })
    }

    pub fn windows(&self, edge: NoteEdge) -> &AccuracyWindows {
        match edge {
            NoteEdge::On => &self.note_on,
            NoteEdge::Off => &self.note_off,
        }
    }

    pub fn classify(&self, edge: NoteEdge, error_ms: f64) -> Accuracy {
        self.windows(edge).classify(error_ms)
    }
}

impl Default for CollisionRanges {
    fn default() -> Self {
        let note_on = AccuracyWindows {
            perfect_ms: DEFAULT_FORGIVENESS_MS / 4.0,
            good_ms: DEFAULT_FORGIVENESS_MS / 2.0,
            okay_ms: DEFAULT_FORGIVENESS_MS,
        };
        let note_off = AccuracyWindows {
            perfect_ms: note_on.perfect_ms * 2.0,
            good_ms: note_on.good_ms * 2.0,
            okay_ms: note_on.okay_ms * 2.0,
        };
        Self { note_on, note_off }
    }
}

/// Running count of judged events
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccuracyTally {
    pub perfect: u32,
    pub good: u32,
    pub okay: u32,
    pub miss: u32,
    pub combo: u32,
    pub max_combo: u32,
    pub score: u64,
}

impl AccuracyTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, accuracy: Accuracy) {
        match accuracy {
            Accuracy::Perfect => self.perfect += 1,
            Accuracy::Good => self.good += 1,
            Accuracy::Okay => self.okay += 1,
            Accuracy::Miss => self.miss += 1,
        }

        if accuracy == Accuracy::Miss {
            self.combo = 0;
        } else {
            self.combo += 1;
            self.max_combo = self.max_combo.max(self.combo);
        }
        self.score += accuracy.points() as u64;
    }

    pub fn judged(&self) -> u32 {
        self.perfect + self.good + self.okay + self.miss
    }

    /// Share of the maximum possible score, in [0, 1] (1 when nothing is judged)
    pub fn accuracy_ratio(&self) -> f64 {
        let judged = self.judged();
        if judged == 0 {
            return 1.0;
        }
        self.score as f64 / (judged as f64 * Accuracy::Perfect.points() as f64)
    }
}
