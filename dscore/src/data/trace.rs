use std::fmt;
use std::fmt::{Display, Formatter};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{DecayError, DecayResult};

/// Identifies a derived scalar feature attached to a [Trace].
///
/// Features are stored in a small fixed-capacity table indexed by this enum
/// rather than an open string map, so a lookup for a feature that was never
/// computed fails instead of silently producing a default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceFeature {
    Baseline,
    SigmaBaseline,
    MaxPos,
    MaxVal,
    Qdc,
    Psd,
}

impl TraceFeature {
    pub const COUNT: usize = 6;

    pub fn index(&self) -> usize {
        match self {
            TraceFeature::Baseline => 0,
            TraceFeature::SigmaBaseline => 1,
            TraceFeature::MaxPos => 2,
            TraceFeature::MaxVal => 3,
            TraceFeature::Qdc => 4,
            TraceFeature::Psd => 5,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TraceFeature::Baseline => "baseline",
            TraceFeature::SigmaBaseline => "sigmaBaseline",
            TraceFeature::MaxPos => "maxpos",
            TraceFeature::MaxVal => "maxval",
            TraceFeature::Qdc => "qdc",
            TraceFeature::Psd => "psd",
        }
    }

    pub fn all() -> [TraceFeature; TraceFeature::COUNT] {
        [
            TraceFeature::Baseline,
            TraceFeature::SigmaBaseline,
            TraceFeature::MaxPos,
            TraceFeature::MaxVal,
            TraceFeature::Qdc,
            TraceFeature::Psd,
        ]
    }
}

impl Display for TraceFeature {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Sample window over which a baseline was estimated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineWindow {
    pub lo: usize,
    pub len: usize,
}

/// Mean and sample standard deviation of a baseline window.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BaselineStats {
    pub mean: f64,
    pub sigma: f64,
}

/// A raw waveform for a single channel hit, with derived scalar features.
///
/// The sample sequence is fixed at construction and never mutated by the
/// filter operations; only the feature table and the baseline cache change.
///
/// # Example
///
/// ```rust
/// use dscore::data::trace::{Trace, TraceFeature};
///
/// let trace = Trace::new(vec![10, 11, 9, 10, 250, 80, 20]);
/// assert_eq!(trace.len(), 7);
/// assert!(trace.feature(TraceFeature::Baseline).is_none());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Trace {
    pub samples: Vec<i32>,
    features: [Option<f64>; TraceFeature::COUNT],
    baseline_cache: Option<(BaselineWindow, BaselineStats)>,
}

impl Trace {
    pub fn new(samples: Vec<i32>) -> Self {
        Trace {
            samples,
            features: [None; TraceFeature::COUNT],
            baseline_cache: None,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns the value of a feature, or `None` if it has not been computed.
    pub fn feature(&self, feature: TraceFeature) -> Option<f64> {
        self.features[feature.index()]
    }

    /// Looks up a feature that the calling operation depends on.
    ///
    /// A missing prerequisite feature fails loudly instead of being treated
    /// as zero, which would corrupt downstream correlation decisions.
    pub fn require_feature(&self, op: &'static str, feature: TraceFeature) -> DecayResult<f64> {
        self.feature(feature)
            .ok_or(DecayError::MissingFeature { op, feature })
    }

    pub fn set_feature(&mut self, feature: TraceFeature, value: f64) {
        self.features[feature.index()] = Some(value);
    }

    /// Returns the memoized baseline statistics if the window matches the
    /// one the cache was filled for.
    pub(crate) fn cached_baseline(&self, window: BaselineWindow) -> Option<BaselineStats> {
        match self.baseline_cache {
            Some((cached, stats)) if cached == window => Some(stats),
            _ => None,
        }
    }

    /// Stores baseline statistics in the cache, replacing any previous window,
    /// and records them under the `baseline` and `sigmaBaseline` features.
    pub(crate) fn store_baseline(&mut self, window: BaselineWindow, stats: BaselineStats) {
        self.baseline_cache = Some((window, stats));
        self.set_feature(TraceFeature::Baseline, stats.mean);
        self.set_feature(TraceFeature::SigmaBaseline, stats.sigma);
    }
}

impl Display for Trace {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let features = TraceFeature::all()
            .iter()
            .filter_map(|&feat| self.feature(feat).map(|v| format!("{}={:.3}", feat, v)))
            .join(", ");

        write!(f, "Trace({} samples, features: [{}])", self.len(), features)
    }
}
