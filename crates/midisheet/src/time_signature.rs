use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_TEMPO: u32 = 500_000;

/// Meter and tempo of a song. Times are in pulses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    numerator: u32,
    denominator: u32,
    quarter: u32,
    measure: u32,
    /// Microseconds per quarter note.
    tempo: u32,
}

/// Notated length of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NoteDuration {
    ThirtySecond,
    Sixteenth,
    Triplet,
    Eighth,
    DottedEighth,
    Quarter,
    DottedQuarter,
    Half,
    DottedHalf,
    Whole,
}

impl TimeSignature {
    /// Zero fields are raised to 1 so the measure length is never zero.
    pub fn new(numerator: u32, denominator: u32, quarter: u32, tempo: u32) -> Self {
        let numerator = numerator.max(1);
        let denominator = denominator.max(1);
        let quarter = quarter.max(1);
        let measure = (quarter * numerator * 4 / denominator).max(1);
        Self {
            numerator,
            denominator,
            quarter,
            measure,
            tempo,
        }
    }

    /// 4/4 at 120 beats per minute.
    pub fn common(quarter: u32) -> Self {
        Self::new(4, 4, quarter, DEFAULT_TEMPO)
    }

    pub fn numerator(&self) -> u32 {
        self.numerator
    }

    pub fn denominator(&self) -> u32 {
        self.denominator
    }

    /// Pulses per quarter note.
    pub fn quarter(&self) -> u32 {
        self.quarter
    }

    /// Pulses per measure.
    pub fn measure(&self) -> u32 {
        self.measure
    }

    pub fn tempo(&self) -> u32 {
        self.tempo
    }

    pub fn with_tempo(&self, tempo: u32) -> Self {
        Self::new(self.numerator, self.denominator, self.quarter, tempo)
    }

    /// Zero-based measure containing `time`.
    pub fn measure_of(&self, time: u32) -> u32 {
        time / self.measure
    }

    pub fn note_duration(&self, duration: u32) -> NoteDuration {
        let whole = self.quarter * 4;
        if duration >= 28 * whole / 32 {
            NoteDuration::Whole
        } else if duration >= 20 * whole / 32 {
            NoteDuration::DottedHalf
        } else if duration >= 14 * whole / 32 {
            NoteDuration::Half
        } else if duration >= 10 * whole / 32 {
            NoteDuration::DottedQuarter
        } else if duration >= 7 * whole / 32 {
            NoteDuration::Quarter
        } else if duration >= 5 * whole / 32 {
            NoteDuration::DottedEighth
        } else if duration >= 6 * whole / 64 {
            NoteDuration::Eighth
        } else if duration >= 5 * whole / 64 {
            NoteDuration::Triplet
        } else if duration >= 3 * whole / 64 {
            NoteDuration::Sixteenth
        } else {
            NoteDuration::ThirtySecond
        }
    }

    /// Nominal pulse count of a notated duration.
    pub fn duration_to_time(&self, duration: NoteDuration) -> u32 {
        let eighth = self.quarter / 2;
        let sixteenth = eighth / 2;
        match duration {
            NoteDuration::Whole => self.quarter * 4,
            NoteDuration::DottedHalf => self.quarter * 3,
            NoteDuration::Half => self.quarter * 2,
            NoteDuration::DottedQuarter => 3 * eighth,
            NoteDuration::Quarter => self.quarter,
            NoteDuration::DottedEighth => 3 * sixteenth,
            NoteDuration::Eighth => eighth,
            NoteDuration::Triplet => self.quarter / 3,
            NoteDuration::Sixteenth => sixteenth,
            NoteDuration::ThirtySecond => sixteenth / 2,
        }
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} quarter={} tempo={}",
            self.numerator, self.denominator, self.quarter, self.tempo
        )
    }
}
