//! Timing expectations declared by a test and their evaluation at `DONE`.

use crate::protocol::Event;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// How far the measured duration may stray from the declared one.
///
/// Fixed: host-side timing over a 9600 baud link is not more precise than this.
pub const TIMING_TOLERANCE: Duration = Duration::from_millis(100);

/// What a test declared about its own duration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub enum TimingExpectation {
    #[default]
    None,
    /// Expected duration in seconds.
    Fixed(f64),
    /// Acceptable duration window in seconds.
    Range { min: f64, max: f64 },
}

impl TimingExpectation {
    /// The expectation a timing event installs, if any.
    ///
    /// `TIME 0` declares nothing.
    pub fn from_event(event: &Event) -> Option<Self> {
        match *event {
            Event::TimeExpect(secs) if secs > 0.0 => Some(Self::Fixed(secs)),
            Event::TimeRange { min, max } => Some(Self::Range { min, max }),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Judge a finished test that took `elapsed`.
    pub fn evaluate(&self, elapsed: Duration) -> TimingVerdict {
        let took = elapsed.as_secs_f64();
        let tolerance = TIMING_TOLERANCE.as_secs_f64();

        let missed = match *self {
            Self::None => return TimingVerdict::Unchecked,
            Self::Fixed(expected) => (took - expected).abs() >= tolerance,
            Self::Range { min, max } => took - max >= tolerance || min - took >= tolerance,
        };

        if missed {
            TimingVerdict::Missed {
                expected: *self,
                elapsed,
            }
        } else {
            TimingVerdict::Met
        }
    }
}

impl fmt::Display for TimingExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "no expectation"),
            Self::Fixed(secs) => write!(f, "{secs:.3} s"),
            Self::Range { min, max } => write!(f, "{min:.3} to {max:.3} s"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimingVerdict {
    /// The test declared no expectation.
    Unchecked,
    Met,
    Missed {
        expected: TimingExpectation,
        elapsed: Duration,
    },
}

impl TimingVerdict {
    pub fn is_missed(&self) -> bool {
        matches!(self, Self::Missed { .. })
    }
}

impl fmt::Display for TimingVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unchecked => write!(f, "timing not checked"),
            Self::Met => write!(f, "timing met"),
            Self::Missed { expected, elapsed } => write!(
                f,
                "expected test to complete in {}, took {:.3} s",
                expected,
                elapsed.as_secs_f64()
            ),
        }
    }
}
