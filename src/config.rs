// Playback configuration - construction-time parameters for clock, playhead and scoring
// Persisted as RON (default) or JSON

use crate::error::{PlaybackError, PlaybackResult};
use crate::scoring::CollisionRanges;
use crate::sequencer::clock::Scheduling;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default accuracy window width in milliseconds
pub const DEFAULT_FORGIVENESS_MS: f64 = 400.0;

/// Parameters consumed when a playback session is built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Real duration of one tick (ms), usually one MIDI tick at the song tempo
    pub tick_length_ms: f64,
    /// Pre-roll before the first playable event (ms); the clock starts at `-leadup`
    pub initial_leadup_ms: f64,
    /// Playback speed multiplier
    pub playback_speed: f64,
    /// Width of the accuracy windows used for scoring (ms)
    pub forgiveness_ms: f64,
    pub scheduling: Scheduling,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick_length_ms: 10.0,
            initial_leadup_ms: 0.0,
            playback_speed: 1.0,
            forgiveness_ms: DEFAULT_FORGIVENESS_MS,
            scheduling: Scheduling::Threaded,
        }
    }
}

impl PlaybackConfig {
    /// Check every field against its constraint
    pub fn validate(&self) -> PlaybackResult<()> {
        fn positive(name: &str, value: f64) -> PlaybackResult<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(PlaybackError::InvalidArgument(format!(
                    "{} must be > 0, got {}",
                    name, value
                )))
            }
        }

        positive("tick_length_ms", self.tick_length_ms)?;
        positive("playback_speed", self.playback_speed)?;
        positive("forgiveness_ms", self.forgiveness_ms)?;

        if !self.initial_leadup_ms.is_finite() || self.initial_leadup_ms < 0.0 {
            return Err(PlaybackError::InvalidArgument(format!(
                "initial_leadup_ms must be >= 0, got {}",
                self.initial_leadup_ms
            )));
        }
        Ok(())
    }

    /// Tick the clock starts on (negative during leadup)
    pub fn start_tick(&self) -> f64 {
        -self.initial_leadup_ms / self.tick_length_ms
    }

    /// Accuracy windows for the configured forgiveness
    pub fn collision_ranges(&self) -> PlaybackResult<CollisionRanges> {
        CollisionRanges::from_forgiveness(self.forgiveness_ms)
    }

    pub fn from_ron_str(data: &str) -> PlaybackResult<Self> {
        let config: Self = ron::from_str(data).map_err(|e| {
            PlaybackError::Config(format!("Failed to deserialize from RON: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_ron_string(&self) -> PlaybackResult<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| PlaybackError::Config(format!("Failed to serialize to RON: {}", e)))
    }

    pub fn from_json_str(data: &str) -> PlaybackResult<Self> {
        let config: Self = serde_json::from_str(data).map_err(|e| {
            PlaybackError::Config(format!("Failed to deserialize from JSON: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> PlaybackResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PlaybackError::Config(format!("Failed to serialize to JSON: {}", e)))
    }

    /// Load from a `.json` file, anything else is read as RON
    pub fn load(path: &Path) -> PlaybackResult<Self> {
        let data = fs::read_to_string(path)?;
        if is_json(path) {
            Self::from_json_str(&data)
        } else {
            Self::from_ron_str(&data)
        }
    }

    /// Save to a `.json` file, anything else is written as RON
    pub fn save(&self, path: &Path) -> PlaybackResult<()> {
        let data = if is_json(path) {
            self.to_json_string()?
        } else {
            self.to_ron_string()?
        };
        fs::write(path, data)?;
        Ok(())
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PlaybackConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.forgiveness_ms, 400.0);
        assert_eq!(config.playback_speed, 1.0);
        assert_eq!(config.start_tick(), 0.0);
        assert_eq!(config.collision_ranges().unwrap().note_on.okay_ms, 400.0);
    }

    #[test]
    fn test_start_tick_from_leadup() {
        let config = PlaybackConfig {
            tick_length_ms: 10.0,
            initial_leadup_ms: 40.0,
            ..Default::default()
        };
        assert_eq!(config.start_tick(), -4.0);
    }

    #[test]
    fn test_validation_failures() {
        let bad = [
            PlaybackConfig {
                tick_length_ms: 0.0,
                ..Default::default()
            },
            PlaybackConfig {
                playback_speed: -2.0,
                ..Default::default()
            },
            PlaybackConfig {
                initial_leadup_ms: -1.0,
                ..Default::default()
            },
            PlaybackConfig {
                forgiveness_ms: f64::NAN,
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(matches!(
                config.validate(),
                Err(PlaybackError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config =
            PlaybackConfig::from_ron_str("(tick_length_ms: 2.5, scheduling: Manual)").unwrap();
        assert_eq!(config.tick_length_ms, 2.5);
        assert_eq!(config.scheduling, Scheduling::Manual);
        assert_eq!(config.forgiveness_ms, DEFAULT_FORGIVENESS_MS);
    }

    #[test]
    fn test_ron_and_json_agree() {
        let config = PlaybackConfig {
            tick_length_ms: 4.0,
            initial_leadup_ms: 1000.0,
            playback_speed: 1.5,
            forgiveness_ms: 250.0,
            scheduling: Scheduling::Manual,
        };

        let from_ron = PlaybackConfig::from_ron_str(&config.to_ron_string().unwrap()).unwrap();
        let from_json = PlaybackConfig::from_json_str(&config.to_json_string().unwrap()).unwrap();
        assert_eq!(from_ron, config);
        assert_eq!(from_json, config);
    }

    #[test]
    fn test_invalid_documents() {
        assert!(matches!(
            PlaybackConfig::from_ron_str("(tick_length_ms: \"fast\")"),
            Err(PlaybackError::Config(_))
        ));
        assert!(matches!(
            PlaybackConfig::from_json_str("{\"tick_length_ms\": -3.0}"),
            Err(PlaybackError::InvalidArgument(_))
        ));
    }
}
