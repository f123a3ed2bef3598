use std::fmt;
use std::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};

use crate::data::trace::Trace;
use crate::error::{DecayError, DecayResult};

/// A timestamped, typed, channel-identified hit produced by the decoding
/// layer.
///
/// Timestamps are in hardware clock units and are guaranteed by the decoder
/// to arrive in non-decreasing order. The hit is immutable after creation
/// except for the calibrated energy, which is set exactly once downstream.
///
/// # Example
///
/// ```rust
/// use dscore::data::hit::ChannelHit;
///
/// let mut hit = ChannelHit::new(1024, 7, "dssd_front", 312.0);
/// hit.set_calibrated_energy(1245.8).unwrap();
/// assert!(hit.set_calibrated_energy(1300.0).is_err());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChannelHit {
    pub time: u64,
    pub channel_id: u32,
    pub detector_type: String,
    pub energy: f64,
    pub calibrated_energy: Option<f64>,
    pub trace: Option<Trace>,
}

impl ChannelHit {
    pub fn new(time: u64, channel_id: u32, detector_type: &str, energy: f64) -> Self {
        ChannelHit {
            time,
            channel_id,
            detector_type: detector_type.to_string(),
            energy,
            calibrated_energy: None,
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: Trace) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Sets the calibrated energy. Fails if it was already set, since
    /// calibration is applied exactly once per hit.
    pub fn set_calibrated_energy(&mut self, energy: f64) -> DecayResult<()> {
        if self.calibrated_energy.is_some() {
            return Err(DecayError::CalibrationAlreadySet {
                channel_id: self.channel_id,
            });
        }
        self.calibrated_energy = Some(energy);
        Ok(())
    }
}

impl Display for ChannelHit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ChannelHit(t: {}, channel: {}, type: {}, energy: {:.1})",
            self.time, self.channel_id, self.detector_type, self.energy
        )
    }
}
