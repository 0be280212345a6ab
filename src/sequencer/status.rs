// Clock status shared between the control side and the timer thread

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a playback clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockStatus {
    #[default]
    Stopped = 0,
    Running = 1,
    Disposed = 2,
}

impl ClockStatus {
    /// Check if the clock is advancing on its schedule
    pub fn is_running(&self) -> bool {
        matches!(self, ClockStatus::Running)
    }

    /// Check if the clock has been torn down (terminal)
    pub fn is_disposed(&self) -> bool {
        matches!(self, ClockStatus::Disposed)
    }
}

impl From<u8> for ClockStatus {
    fn from(value: u8) -> Self {
        match value {
            0 => ClockStatus::Stopped,
            1 => ClockStatus::Running,
            _ => ClockStatus::Disposed,
        }
    }
}

/// Status cell read by the timer thread and written by the control side
#[derive(Debug)]
pub struct AtomicClockStatus {
    inner: AtomicU8,
}

impl AtomicClockStatus {
    pub fn new(status: ClockStatus) -> Self {
        Self {
            inner: AtomicU8::new(status as u8),
        }
    }

    pub fn get(&self) -> ClockStatus {
        ClockStatus::from(self.inner.load(Ordering::Acquire))
    }

    /// Set a new status unless the clock is already disposed
    /// Returns the previous status
    pub fn transition(&self, status: ClockStatus) -> ClockStatus {
        let mut current = self.inner.load(Ordering::Acquire);
        loop {
            if ClockStatus::from(current).is_disposed() {
                return ClockStatus::Disposed;
            }
            match self.inner.compare_exchange_weak(
                current,
                status as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(previous) => return ClockStatus::from(previous),
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for AtomicClockStatus {
    fn default() -> Self {
        Self::new(ClockStatus::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_predicates() {
        assert!(ClockStatus::Running.is_running());
        assert!(!ClockStatus::Stopped.is_running());
        assert!(ClockStatus::Disposed.is_disposed());
        assert_eq!(ClockStatus::default(), ClockStatus::Stopped);
    }

    #[test]
    fn test_transition_returns_previous() {
        let status = AtomicClockStatus::default();
        assert_eq!(status.transition(ClockStatus::Running), ClockStatus::Stopped);
        assert_eq!(status.get(), ClockStatus::Running);
        assert_eq!(status.transition(ClockStatus::Stopped), ClockStatus::Running);
    }

    #[test]
    fn test_disposed_is_terminal() {
        let status = AtomicClockStatus::new(ClockStatus::Running);
        status.transition(ClockStatus::Disposed);
        assert_eq!(status.transition(ClockStatus::Running), ClockStatus::Disposed);
        assert_eq!(status.get(), ClockStatus::Disposed);
    }

    #[test]
    fn test_concurrent_transitions_keep_dispose_terminal() {
        let status = AtomicClockStatus::default();
        std::thread::scope(|scope| {
            for i in 0..4 {
                let status = &status;
                scope.spawn(move || {
                    for _ in 0..1_000 {
                        let next = if i % 2 == 0 {
                            ClockStatus::Running
                        } else {
                            ClockStatus::Stopped
                        };
                        status.transition(next);
                    }
                });
            }
            scope.spawn(|| status.transition(ClockStatus::Disposed));
        });
        assert_eq!(status.get(), ClockStatus::Disposed);
    }
}
