//! Synthetic pulse and hit-stream generation for demos and tests.
//!
//! Renders detector-like waveforms (an exponential-tail pulse riding on a
//! flat baseline, with Gaussian noise on the ADC scale) and produces
//! time-ordered implant/decay hit sequences over a pixel grid.

use rand::distributions::Distribution;
use rand::Rng;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;

use dscore::correlation::correlator::EventKind;
use dscore::correlation::grid::Pixel;
use dscore::data::hit::ChannelHit;
use dscore::data::trace::Trace;

/// Shape parameters for one synthetic waveform.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PulseTemplate {
    pub length: usize,
    pub baseline: f64,
    pub amplitude: f64,
    pub onset: usize,
    pub rise: f64,
    pub decay: f64,
    pub noise_sigma: f64,
}

impl Default for PulseTemplate {
    fn default() -> Self {
        PulseTemplate {
            length: 128,
            baseline: 220.0,
            amplitude: 600.0,
            onset: 40,
            rise: 4.0,
            decay: 20.0,
            noise_sigma: 2.0,
        }
    }
}

impl PulseTemplate {
    /// Renders one waveform: `baseline + A * (1 - exp(-t/rise)) * exp(-t/decay)`
    /// past the onset, rounded to the integer ADC scale, with optional
    /// Gaussian noise.
    pub fn render<R: Rng>(&self, rng: &mut R) -> Trace {
        let noise = if self.noise_sigma > 0.0 {
            Some(Normal::new(0.0, self.noise_sigma).unwrap())
        } else {
            None
        };

        let samples: Vec<i32> = (0..self.length)
            .map(|i| {
                let shape = if i >= self.onset {
                    let t = (i - self.onset) as f64;
                    self.amplitude * (1.0 - (-t / self.rise).exp()) * (-t / self.decay).exp()
                } else {
                    0.0
                };
                let n = noise.as_ref().map_or(0.0, |d| d.sample(rng));
                (self.baseline + shape + n).round() as i32
            })
            .collect();

        Trace::new(samples)
    }
}

/// Timing layout of a simulated run of implant/decay pairs.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct StreamTemplate {
    pub extent: (usize, usize),
    pub pairs: usize,
    /// Range the implant-to-decay delay is drawn from, in timestamp units.
    pub decay_delay: (u64, u64),
    /// Quiet time between one pair's decay and the next pair's implant.
    pub pair_spacing: u64,
}

impl Default for StreamTemplate {
    fn default() -> Self {
        StreamTemplate {
            extent: (40, 40),
            pairs: 50,
            decay_delay: (500, 1500),
            pair_spacing: 10_000,
        }
    }
}

/// Generates a time-ordered hit stream of implant/decay pairs at random
/// pixels, each hit carrying a rendered waveform.
///
/// Pixels are encoded into `channel_id` (row-major over the extent) so a
/// dispatch closure can recover them with [pixel_of].
pub fn simulate_stream<R: Rng>(
    stream: &StreamTemplate,
    pulse: &PulseTemplate,
    rng: &mut R,
) -> Vec<ChannelHit> {
    let mut hits = Vec::with_capacity(stream.pairs * 2);
    let mut time: u64 = stream.pair_spacing;

    for _ in 0..stream.pairs {
        let x = rng.gen_range(0..stream.extent.0);
        let y = rng.gen_range(0..stream.extent.1);
        let channel_id = (x * stream.extent.1 + y) as u32;

        hits.push(
            ChannelHit::new(time, channel_id, "implant", pulse.amplitude)
                .with_trace(pulse.render(rng)),
        );

        let delay = rng.gen_range(stream.decay_delay.0..stream.decay_delay.1);
        time += delay;
        hits.push(
            ChannelHit::new(time, channel_id, "decay", pulse.amplitude / 2.0)
                .with_trace(pulse.render(rng)),
        );

        time += stream.pair_spacing;
    }
    hits
}

/// Recovers the pixel encoded into a simulated hit's channel id.
pub fn pixel_of(hit: &ChannelHit, extent: (usize, usize)) -> Pixel {
    let id = hit.channel_id as usize;
    Pixel::new(id / extent.1, id % extent.1)
}

/// Maps a simulated hit's detector type tag to an event kind.
pub fn kind_of(hit: &ChannelHit) -> Option<EventKind> {
    match hit.detector_type.as_str() {
        "implant" => Some(EventKind::Implant),
        "decay" => Some(EventKind::Decay),
        _ => None,
    }
}
