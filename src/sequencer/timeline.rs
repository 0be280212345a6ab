// Timeline - Tick domain representation
// Handles conversion between logical ticks and real time (milliseconds)

use crate::error::{PlaybackError, PlaybackResult};
use std::fmt;

/// Real-world duration of one logical tick, in milliseconds
/// Always finite and strictly positive
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct TickLength {
    ms: f64,
}

impl TickLength {
    /// Creates a new tick length
    pub fn new(ms: f64) -> PlaybackResult<Self> {
        if !ms.is_finite() || ms <= 0.0 {
            return Err(PlaybackError::InvalidArgument(format!(
                "tick length must be a positive number of milliseconds, got {}",
                ms
            )));
        }
        Ok(Self { ms })
    }

    /// Tick length for a given tempo and resolution (pulses per quarter note)
    /// Example: 120 BPM at 480 PPQN = 500ms / 480 ≈ 1.0417ms per tick
    pub fn from_tempo(tempo: &Tempo, ticks_per_quarter: u16) -> PlaybackResult<Self> {
        if ticks_per_quarter == 0 {
            return Err(PlaybackError::InvalidArgument(
                "ticks per quarter note must be > 0".to_string(),
            ));
        }
        Self::new(tempo.beat_duration_ms() / ticks_per_quarter as f64)
    }

    /// Get duration in milliseconds
    pub fn ms(&self) -> f64 {
        self.ms
    }

    /// Convert a time in milliseconds to ticks
    pub fn ms_to_ticks(&self, ms: f64) -> f64 {
        ms / self.ms
    }

    /// Convert ticks to a time in milliseconds
    pub fn ticks_to_ms(&self, ticks: f64) -> f64 {
        ticks * self.ms
    }
}

impl fmt::Display for TickLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} ms/tick", self.ms)
    }
}

/// Tempo in BPM (Beats Per Minute)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    /// Creates a new tempo
    /// BPM must be in range [20.0, 999.0]
    pub fn new(bpm: f64) -> Self {
        assert!(Self::is_valid_bpm(bpm), "BPM must be between 20 and 999");
        Self { bpm }
    }

    /// Creates a new tempo from untrusted input (chart files, user settings)
    pub fn try_new(bpm: f64) -> PlaybackResult<Self> {
        if !Self::is_valid_bpm(bpm) {
            return Err(PlaybackError::InvalidArgument(format!(
                "BPM must be between 20 and 999, got {}",
                bpm
            )));
        }
        Ok(Self { bpm })
    }

    fn is_valid_bpm(bpm: f64) -> bool {
        (20.0..=999.0).contains(&bpm)
    }

    /// Get BPM value
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Duration of one beat in milliseconds
    pub fn beat_duration_ms(&self) -> f64 {
        60_000.0 / self.bpm
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::new(120.0)
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.bpm)
    }
}
