//! Implant-decay correlation state machine.
//!
//! Each pixel cycles through empty -> has-implant -> has-implant-and-decay
//! states for as long as the run is active. Implants stamp the pixel;
//! decays are timed against the most recent implant, subject to a maximum
//! correlation time, a minimum spacing between the implant and its own
//! predecessor, and an externally supplied anti-coincidence veto.

use std::fmt;
use std::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};

use crate::correlation::grid::{CorrelationEntry, CorrelationGrid, Pixel};
use crate::error::DecayResult;

/// Externally assigned type of an incoming event at a pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Implant,
    Decay,
}

/// Outcome class of a correlation decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    Implant,
    Decay,
    Unknown,
    Ignored,
}

impl Display for Classification {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Implant => write!(f, "implant"),
            Classification::Decay => write!(f, "decay"),
            Classification::Unknown => write!(f, "unknown"),
            Classification::Ignored => write!(f, "ignored"),
        }
    }
}

/// Result of classifying one event at one pixel.
///
/// For decays, `delta_t` is the elapsed time since the last qualifying
/// implant; it is `None` when no implant was ever recorded at the pixel
/// (classification `Unknown`) or when the interval is not defined.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub pixel: Pixel,
    pub classification: Classification,
    pub delta_t: Option<u64>,
    pub correlated: bool,
}

impl Display for CorrelationResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.delta_t {
            Some(dt) => write!(
                f,
                "CorrelationResult(pixel: {}, {}, dt: {}, correlated: {})",
                self.pixel, self.classification, dt, self.correlated
            ),
            None => write!(
                f,
                "CorrelationResult(pixel: {}, {}, correlated: {})",
                self.pixel, self.classification, self.correlated
            ),
        }
    }
}

/// Per-pixel implant-decay correlator over a dense grid.
///
/// # Example
///
/// ```rust
/// use dscore::correlation::correlator::{Correlator, EventKind, Classification};
/// use dscore::correlation::grid::Pixel;
///
/// let mut correlator = Correlator::new(40, 40, 200, 0);
/// let pixel = Pixel::new(3, 7);
///
/// correlator.classify(pixel, EventKind::Implant, 100, false).unwrap();
/// let decay = correlator.classify(pixel, EventKind::Decay, 150, false).unwrap();
///
/// assert_eq!(decay.classification, Classification::Decay);
/// assert_eq!(decay.delta_t, Some(50));
/// assert!(decay.correlated);
/// ```
#[derive(Clone, Debug)]
pub struct Correlator {
    grid: CorrelationGrid,
    max_correlation_time: u64,
    min_implant_spacing: u64,
}

impl Correlator {
    pub fn new(
        x_extent: usize,
        y_extent: usize,
        max_correlation_time: u64,
        min_implant_spacing: u64,
    ) -> Self {
        Correlator {
            grid: CorrelationGrid::new(x_extent, y_extent),
            max_correlation_time,
            min_implant_spacing,
        }
    }

    /// Classifies one event at a pixel and updates the pixel's state.
    ///
    /// Implants stamp the pixel and are never correlated against anything
    /// here. A decay is correlated when its interval to the last implant
    /// is within the maximum correlation time and that implant was not
    /// itself preceded within the minimum spacing by another implant; a
    /// decay at a pixel with no implant history classifies as `Unknown`.
    /// When the caller reports a coincident veto signal the decay
    /// candidate is `Ignored` and the pixel state is left untouched.
    pub fn classify(
        &mut self,
        pixel: Pixel,
        kind: EventKind,
        time: u64,
        vetoed: bool,
    ) -> DecayResult<CorrelationResult> {
        let max_correlation_time = self.max_correlation_time;
        let min_implant_spacing = self.min_implant_spacing;
        let entry = self.grid.entry_mut(pixel)?;

        match kind {
            EventKind::Implant => {
                entry.record_implant(time);
                Ok(CorrelationResult {
                    pixel,
                    classification: Classification::Implant,
                    delta_t: None,
                    correlated: false,
                })
            }
            EventKind::Decay => {
                if vetoed {
                    return Ok(CorrelationResult {
                        pixel,
                        classification: Classification::Ignored,
                        delta_t: None,
                        correlated: false,
                    });
                }

                match entry.last_implant_time {
                    None => {
                        entry.record_decay(time);
                        Ok(CorrelationResult {
                            pixel,
                            classification: Classification::Unknown,
                            delta_t: None,
                            correlated: false,
                        })
                    }
                    Some(implant_time) => {
                        let delta_t = time.checked_sub(implant_time);
                        let spacing_ok = entry
                            .implant_gap
                            .map_or(true, |gap| gap >= min_implant_spacing);
                        let correlated = matches!(delta_t, Some(dt) if dt <= max_correlation_time)
                            && spacing_ok;

                        entry.record_decay(time);
                        if correlated {
                            entry.correlated_count += 1;
                        }

                        Ok(CorrelationResult {
                            pixel,
                            classification: Classification::Decay,
                            delta_t,
                            correlated,
                        })
                    }
                }
            }
        }
    }

    /// Read-only view of a pixel's correlation state.
    pub fn entry(&self, pixel: Pixel) -> DecayResult<&CorrelationEntry> {
        self.grid.entry(pixel)
    }

    pub fn grid(&self) -> &CorrelationGrid {
        &self.grid
    }

    /// Clears all pixel state; used at run boundaries.
    pub fn clear(&mut self) {
        self.grid.clear();
    }
}
