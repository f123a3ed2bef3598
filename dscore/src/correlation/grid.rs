use std::fmt;
use std::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};

use crate::error::{DecayError, DecayResult};

/// Spatial address on the segmented detector at which correlation state
/// is tracked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pixel {
    pub x: usize,
    pub y: usize,
}

impl Pixel {
    pub fn new(x: usize, y: usize) -> Self {
        Pixel { x, y }
    }
}

impl Display for Pixel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Per-pixel correlation state: most recent implant and decay times plus
/// cumulative counts.
///
/// `implant_gap` holds the time between the last two implants at this
/// pixel; the correlator uses it to reject decays following back-to-back
/// implants. Entries start "empty" and persist for the whole run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationEntry {
    pub last_implant_time: Option<u64>,
    pub implant_gap: Option<u64>,
    pub last_decay_time: Option<u64>,
    pub implant_count: u64,
    pub decay_count: u64,
    pub correlated_count: u64,
}

impl CorrelationEntry {
    pub(crate) fn record_implant(&mut self, time: u64) {
        self.implant_gap = self.last_implant_time.map(|t| time.saturating_sub(t));
        self.last_implant_time = Some(time);
        self.implant_count += 1;
    }

    pub(crate) fn record_decay(&mut self, time: u64) {
        self.last_decay_time = Some(time);
        self.decay_count += 1;
    }
}

/// Dense 2-D array of per-pixel correlation state.
///
/// The grid is allocated for the full configured extent so pixel lookup
/// is O(1); extents are small (tens to low hundreds per axis). A lookup
/// outside the extent fails with [DecayError::PixelOutOfBounds] rather
/// than defaulting.
///
/// # Example
///
/// ```rust
/// use dscore::correlation::grid::{CorrelationGrid, Pixel};
///
/// let grid = CorrelationGrid::new(40, 40);
/// assert!(grid.entry(Pixel::new(39, 0)).is_ok());
/// assert!(grid.entry(Pixel::new(40, 0)).is_err());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CorrelationGrid {
    x_extent: usize,
    y_extent: usize,
    entries: Vec<CorrelationEntry>,
}

impl CorrelationGrid {
    pub fn new(x_extent: usize, y_extent: usize) -> Self {
        CorrelationGrid {
            x_extent,
            y_extent,
            entries: vec![CorrelationEntry::default(); x_extent * y_extent],
        }
    }

    pub fn extent(&self) -> (usize, usize) {
        (self.x_extent, self.y_extent)
    }

    fn index(&self, pixel: Pixel) -> DecayResult<usize> {
        if pixel.x >= self.x_extent || pixel.y >= self.y_extent {
            return Err(DecayError::PixelOutOfBounds {
                x: pixel.x,
                y: pixel.y,
                x_extent: self.x_extent,
                y_extent: self.y_extent,
            });
        }
        Ok(pixel.x * self.y_extent + pixel.y)
    }

    pub fn entry(&self, pixel: Pixel) -> DecayResult<&CorrelationEntry> {
        let idx = self.index(pixel)?;
        Ok(&self.entries[idx])
    }

    pub fn entry_mut(&mut self, pixel: Pixel) -> DecayResult<&mut CorrelationEntry> {
        let idx = self.index(pixel)?;
        Ok(&mut self.entries[idx])
    }

    /// Resets every entry to empty; used at run boundaries only.
    pub fn clear(&mut self) {
        for entry in self.entries.iter_mut() {
            *entry = CorrelationEntry::default();
        }
    }
}
