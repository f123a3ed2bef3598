//! Pure filter operations over a single [Trace]: baseline estimation,
//! trapezoidal filtering, charge integration (QDC), pulse-shape
//! discrimination and peak localization.
//!
//! Every operation takes an explicit sample-index range and fails with
//! [DecayError::WindowOutOfRange] if the range is not fully contained in
//! the trace; a failed operation leaves the trace's feature table
//! unchanged. The raw sample sequence is never mutated; the trapezoidal
//! filter writes into a caller-supplied separate output buffer.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::data::hit::ChannelHit;
use crate::data::trace::{BaselineStats, BaselineWindow, Trace, TraceFeature};
use crate::error::{DecayError, DecayResult};

/// Geometry of the trapezoidal (moving-window difference) filter.
///
/// The filter subtracts the sum of a `rise_samples`-wide window from the
/// sum of an equal-width window one `window()` earlier, which suppresses
/// slow baseline drift while preserving fast pulse edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrapezoidParams {
    pub rise_samples: usize,
    pub gap_samples: usize,
}

impl TrapezoidParams {
    pub fn new(rise_samples: usize, gap_samples: usize) -> DecayResult<Self> {
        if rise_samples == 0 || gap_samples == 0 {
            return Err(DecayError::InvalidFilterGeometry {
                rise: rise_samples,
                gap: gap_samples,
            });
        }
        Ok(TrapezoidParams {
            rise_samples,
            gap_samples,
        })
    }

    /// Offset between the two summing windows.
    pub fn window(&self) -> usize {
        self.rise_samples + self.gap_samples
    }

    /// Earliest output index for which both windows are inside the trace.
    pub fn support(&self) -> usize {
        2 * self.rise_samples + self.gap_samples
    }
}

/// Estimates the baseline as mean and sample standard deviation over the
/// window `[lo, lo + len)` and records both as features.
///
/// The result is memoized per trace: a second call with an identical
/// window returns the cached statistics without touching the samples,
/// and a call with different bounds recomputes and replaces the cache.
///
/// # Example
///
/// ```rust
/// use dscore::data::trace::Trace;
/// use dscore::algorithm::filter::baseline;
///
/// let mut trace = Trace::new(vec![1, 2, 3, 4, 5]);
/// let stats = baseline(&mut trace, 0, 5).unwrap();
/// assert_eq!(stats.mean, 3.0);
/// ```
pub fn baseline(trace: &mut Trace, lo: usize, len: usize) -> DecayResult<BaselineStats> {
    let window = BaselineWindow { lo, len };
    if let Some(stats) = trace.cached_baseline(window) {
        return Ok(stats);
    }

    let hi = lo + len;
    if len == 0 || hi > trace.len() {
        return Err(DecayError::WindowOutOfRange {
            op: "baseline",
            lo: lo as isize,
            hi: hi as isize,
            len: trace.len(),
        });
    }

    let values: Vec<f64> = trace.samples[lo..hi].iter().map(|&s| s as f64).collect();
    let mean = values.iter().mean();
    let sigma = if len > 1 { values.iter().std_dev() } else { 0.0 };

    let stats = BaselineStats { mean, sigma };
    trace.store_baseline(window, stats);
    Ok(stats)
}

/// Applies the trapezoidal filter over the output range `[lo, hi)`,
/// writing into the caller-supplied `out` buffer.
///
/// Output sample `i` is the difference between the sum of the rise window
/// ending at `i` and the sum of an equal-width window one `window()`
/// earlier. The lower output bound is clamped up to `params.support()` so
/// the filter never reads before the start of the trace; the output is
/// zero-filled up to the clamped bound and carries `hi - lo` computed
/// values beyond it.
pub fn trapezoidal(
    trace: &Trace,
    lo: usize,
    hi: usize,
    params: &TrapezoidParams,
    out: &mut Vec<f64>,
) -> DecayResult<()> {
    if params.rise_samples == 0 || params.gap_samples == 0 {
        return Err(DecayError::InvalidFilterGeometry {
            rise: params.rise_samples,
            gap: params.gap_samples,
        });
    }
    if hi > trace.len() {
        return Err(DecayError::WindowOutOfRange {
            op: "trapezoidal",
            lo: lo as isize,
            hi: hi as isize,
            len: trace.len(),
        });
    }

    let rise = params.rise_samples;
    let window = params.window();
    let lo = lo.max(params.support());

    out.clear();
    out.resize(lo, 0.0);

    for i in lo..hi {
        let top: f64 = trace.samples[i + 1 - rise..=i]
            .iter()
            .map(|&s| s as f64)
            .sum();
        let bot: f64 = trace.samples[i + 1 - rise - window..=i - window]
            .iter()
            .map(|&s| s as f64)
            .sum();
        out.push(top - bot);
    }
    Ok(())
}

/// Locates the maximum sample within the margin-trimmed sub-range of
/// `[lo, hi)` and records its index and baseline-subtracted value as the
/// `maxpos` and `maxval` features.
///
/// As a side effect, the baseline is estimated over the region preceding
/// the located peak. Fails if the trimmed range is empty.
pub fn find_peak(
    trace: &mut Trace,
    lo: usize,
    hi: usize,
    low_margin: usize,
    high_margin: usize,
) -> DecayResult<(usize, f64)> {
    if hi > trace.len() {
        return Err(DecayError::WindowOutOfRange {
            op: "find_peak",
            lo: lo as isize,
            hi: hi as isize,
            len: trace.len(),
        });
    }
    let trim_lo = lo + low_margin;
    let trim_hi = hi.saturating_sub(high_margin);
    if trim_lo >= trim_hi {
        return Err(DecayError::WindowOutOfRange {
            op: "find_peak",
            lo: trim_lo as isize,
            hi: trim_hi as isize,
            len: trace.len(),
        });
    }

    let mut max_pos = trim_lo;
    let mut max_raw = trace.samples[trim_lo];
    for i in trim_lo + 1..trim_hi {
        if trace.samples[i] > max_raw {
            max_raw = trace.samples[i];
            max_pos = i;
        }
    }

    // Baseline over the region preceding the peak.
    let base_len = (max_pos - lo).max(1);
    let stats = baseline(trace, lo, base_len)?;

    let max_val = max_raw as f64 - stats.mean;
    trace.set_feature(TraceFeature::MaxPos, max_pos as f64);
    trace.set_feature(TraceFeature::MaxVal, max_val);
    Ok((max_pos, max_val))
}

/// Integrates charge: the sum of (sample - baseline) over the window
/// `[start, start + len)`, recorded as the `qdc` feature.
///
/// The baseline is looked up, not recomputed; calling this before
/// [baseline] fails with [DecayError::MissingFeature].
pub fn qdc(trace: &mut Trace, start: usize, len: usize) -> DecayResult<f64> {
    let base = trace.require_feature("qdc", TraceFeature::Baseline)?;

    let hi = start + len;
    if len == 0 || hi > trace.len() {
        return Err(DecayError::WindowOutOfRange {
            op: "qdc",
            lo: start as isize,
            hi: hi as isize,
            len: trace.len(),
        });
    }

    let charge: f64 = trace.samples[start..hi]
        .iter()
        .map(|&s| s as f64 - base)
        .sum();
    trace.set_feature(TraceFeature::Qdc, charge);
    Ok(charge)
}

/// Pulse-shape discrimination: sums (sample - baseline) over a window
/// positioned relative to the located peak, recorded as the `psd`
/// feature.
///
/// Requires `maxpos` and `baseline` to be present already.
pub fn psd(trace: &mut Trace, lo_rel: i64, hi_rel: i64) -> DecayResult<f64> {
    let base = trace.require_feature("psd", TraceFeature::Baseline)?;
    let max_pos = trace.require_feature("psd", TraceFeature::MaxPos)? as i64;

    let lo = max_pos + lo_rel;
    let hi = max_pos + hi_rel;
    if lo < 0 || lo >= hi || hi > trace.len() as i64 {
        return Err(DecayError::WindowOutOfRange {
            op: "psd",
            lo: lo as isize,
            hi: hi as isize,
            len: trace.len(),
        });
    }

    let value: f64 = trace.samples[lo as usize..hi as usize]
        .iter()
        .map(|&s| s as f64 - base)
        .sum();
    trace.set_feature(TraceFeature::Psd, value);
    Ok(value)
}

/// Per-trace analysis parameters for the standard feature extraction
/// sequence applied to every hit that carries a waveform.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TraceParams {
    pub baseline_lo: usize,
    pub baseline_len: usize,
    pub peak_low_margin: usize,
    pub peak_high_margin: usize,
    pub qdc_start: usize,
    pub qdc_len: usize,
    pub psd_lo_rel: i64,
    pub psd_hi_rel: i64,
}

impl Default for TraceParams {
    fn default() -> Self {
        TraceParams {
            baseline_lo: 0,
            baseline_len: 32,
            peak_low_margin: 5,
            peak_high_margin: 5,
            qdc_start: 32,
            qdc_len: 64,
            psd_lo_rel: 0,
            psd_hi_rel: 24,
        }
    }
}

/// Entry stage of the typed analysis pipeline.
///
/// The stages expose operations in the only valid order: QDC and peak
/// finding become available after baseline estimation, and discrimination
/// after peak finding, so the prerequisite ordering is enforced at
/// compile time instead of checked at run time.
///
/// # Example
///
/// ```rust
/// use dscore::data::trace::Trace;
/// use dscore::algorithm::filter::TraceAnalyzer;
///
/// let mut trace = Trace::new(vec![2, 2, 2, 2, 10, 6, 2, 2]);
/// let mut stage = TraceAnalyzer::new(&mut trace)
///     .baseline(0, 4)
///     .unwrap();
/// assert_eq!(stage.qdc(4, 2).unwrap(), 12.0);
/// ```
pub struct TraceAnalyzer<'a> {
    trace: &'a mut Trace,
}

impl<'a> TraceAnalyzer<'a> {
    pub fn new(trace: &'a mut Trace) -> Self {
        TraceAnalyzer { trace }
    }

    pub fn baseline(self, lo: usize, len: usize) -> DecayResult<BaselinedTrace<'a>> {
        let stats = baseline(self.trace, lo, len)?;
        Ok(BaselinedTrace {
            trace: self.trace,
            stats,
        })
    }
}

/// Pipeline stage reached after baseline estimation.
pub struct BaselinedTrace<'a> {
    trace: &'a mut Trace,
    stats: BaselineStats,
}

impl<'a> BaselinedTrace<'a> {
    pub fn stats(&self) -> BaselineStats {
        self.stats
    }

    pub fn qdc(&mut self, start: usize, len: usize) -> DecayResult<f64> {
        qdc(self.trace, start, len)
    }

    /// Locates the peak over the full trace; re-runs baseline estimation
    /// over the region preceding the peak per the peak finder's contract.
    pub fn find_peak(self, low_margin: usize, high_margin: usize) -> DecayResult<PeakedTrace<'a>> {
        let hi = self.trace.len();
        let peak = find_peak(self.trace, 0, hi, low_margin, high_margin)?;
        Ok(PeakedTrace {
            trace: self.trace,
            peak,
        })
    }
}

/// Pipeline stage reached after peak localization.
pub struct PeakedTrace<'a> {
    trace: &'a mut Trace,
    peak: (usize, f64),
}

impl<'a> PeakedTrace<'a> {
    pub fn peak(&self) -> (usize, f64) {
        self.peak
    }

    pub fn qdc(&mut self, start: usize, len: usize) -> DecayResult<f64> {
        qdc(self.trace, start, len)
    }

    pub fn psd(&mut self, lo_rel: i64, hi_rel: i64) -> DecayResult<f64> {
        psd(self.trace, lo_rel, hi_rel)
    }
}

/// Runs the standard feature extraction sequence over one trace.
fn analyze_trace(trace: &mut Trace, p: &TraceParams) -> DecayResult<()> {
    let stage = TraceAnalyzer::new(trace).baseline(p.baseline_lo, p.baseline_len)?;
    let mut peaked = stage.find_peak(p.peak_low_margin, p.peak_high_margin)?;
    peaked.qdc(p.qdc_start, p.qdc_len)?;
    peaked.psd(p.psd_lo_rel, p.psd_hi_rel)?;
    Ok(())
}

/// Applies the standard feature extraction sequence to every hit that
/// carries a trace, in parallel across hits.
///
/// Traces of distinct hits are independent, so this parallelism does not
/// change results. Returns one result per input hit; hits without a
/// trace succeed trivially.
pub fn process_traces(hits: &mut [ChannelHit], params: &TraceParams) -> Vec<DecayResult<()>> {
    hits.par_iter_mut()
        .map(|hit| match hit.trace.as_mut() {
            Some(trace) => analyze_trace(trace, params),
            None => Ok(()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_mean_and_sigma() {
        let mut trace = Trace::new(vec![1, 2, 3, 4, 5]);
        let stats = baseline(&mut trace, 0, 5).unwrap();

        assert_eq!(stats.mean, 3.0);
        // sample standard deviation: sqrt(10 / 4)
        assert!((stats.sigma - 2.5f64.sqrt()).abs() < 1e-12);
        assert_eq!(trace.feature(TraceFeature::Baseline), Some(3.0));
    }

    #[test]
    fn test_baseline_memoized_for_identical_window() {
        let mut trace = Trace::new(vec![10, 10, 10, 10]);
        let first = baseline(&mut trace, 0, 4).unwrap();
        assert_eq!(first.mean, 10.0);

        // Mutating the samples makes a cache hit observable: the identical
        // window returns the memoized statistics untouched.
        trace.samples[0] = 0;
        let second = baseline(&mut trace, 0, 4).unwrap();
        assert_eq!(second, first);

        // A different window recomputes from the current samples.
        let third = baseline(&mut trace, 0, 2).unwrap();
        assert_eq!(third.mean, 5.0);
    }

    #[test]
    fn test_baseline_rejects_window_past_end() {
        let mut trace = Trace::new(vec![1, 2, 3]);
        let err = baseline(&mut trace, 1, 5).unwrap_err();
        assert_eq!(
            err,
            DecayError::WindowOutOfRange {
                op: "baseline",
                lo: 1,
                hi: 6,
                len: 3
            }
        );
        // failed operation leaves the feature table unchanged
        assert!(trace.feature(TraceFeature::Baseline).is_none());
    }

    #[test]
    fn test_trapezoidal_step_response() {
        // step from 0 to 10 at index 5; rise 2, gap 1
        let trace = Trace::new(vec![0, 0, 0, 0, 0, 10, 10, 10, 10, 10]);
        let params = TrapezoidParams::new(2, 1).unwrap();
        let mut out = Vec::new();

        trapezoidal(&trace, 0, 10, &params, &mut out).unwrap();
        assert_eq!(out, vec![0.0, 0.0, 0.0, 0.0, 0.0, 10.0, 20.0, 20.0, 10.0, 0.0]);
    }

    #[test]
    fn test_trapezoidal_output_length() {
        let trace = Trace::new(vec![1; 64]);
        let params = TrapezoidParams::new(4, 2).unwrap();
        let mut out = Vec::new();

        // lo below the filter support gets clamped to 2*rise + gap = 10
        trapezoidal(&trace, 3, 40, &params, &mut out).unwrap();
        assert_eq!(out.len(), 40);
        assert!(out[..10].iter().all(|&v| v == 0.0));

        // constant input cancels exactly
        assert!(out[10..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_trapezoidal_rejects_range_past_end() {
        let trace = Trace::new(vec![0; 16]);
        let params = TrapezoidParams::new(2, 2).unwrap();
        let mut out = Vec::new();
        assert!(trapezoidal(&trace, 0, 17, &params, &mut out).is_err());
    }

    #[test]
    fn test_invalid_filter_geometry() {
        assert_eq!(
            TrapezoidParams::new(0, 3).unwrap_err(),
            DecayError::InvalidFilterGeometry { rise: 0, gap: 3 }
        );
    }

    #[test]
    fn test_find_peak_with_margins() {
        let mut trace = Trace::new(vec![0, 1, 2, 9, 2, 1, 0]);
        let (pos, val) = find_peak(&mut trace, 0, 7, 1, 1).unwrap();

        assert_eq!(pos, 3);
        // baseline over [0, 3): mean 1.0; maxval = 9 - 1
        assert_eq!(val, 8.0);
        assert_eq!(trace.feature(TraceFeature::MaxPos), Some(3.0));
        assert_eq!(trace.feature(TraceFeature::MaxVal), Some(8.0));
        assert_eq!(trace.feature(TraceFeature::Baseline), Some(1.0));
    }

    #[test]
    fn test_find_peak_rejects_empty_trimmed_range() {
        let mut trace = Trace::new(vec![1, 2, 3, 4]);
        let err = find_peak(&mut trace, 0, 4, 2, 2).unwrap_err();
        assert!(matches!(err, DecayError::WindowOutOfRange { op: "find_peak", .. }));
        assert!(trace.feature(TraceFeature::MaxPos).is_none());
    }

    #[test]
    fn test_qdc_requires_baseline() {
        let mut trace = Trace::new(vec![2, 2, 2, 2, 6, 6, 2, 2]);

        let err = qdc(&mut trace, 4, 2).unwrap_err();
        assert_eq!(
            err,
            DecayError::MissingFeature {
                op: "qdc",
                feature: TraceFeature::Baseline
            }
        );

        baseline(&mut trace, 0, 4).unwrap();
        let charge = qdc(&mut trace, 4, 2).unwrap();
        assert_eq!(charge, 8.0);
        assert_eq!(trace.feature(TraceFeature::Qdc), Some(8.0));
    }

    #[test]
    fn test_qdc_rejects_window_past_end() {
        let mut trace = Trace::new(vec![2, 2, 2, 2]);
        baseline(&mut trace, 0, 4).unwrap();

        assert!(qdc(&mut trace, 2, 4).is_err());
        assert!(trace.feature(TraceFeature::Qdc).is_none());
    }

    #[test]
    fn test_psd_window_relative_to_peak() {
        let mut trace = Trace::new(vec![0, 1, 2, 9, 2, 1, 0]);
        find_peak(&mut trace, 0, 7, 1, 1).unwrap();

        // window [maxpos, maxpos + 2) = [3, 5): (9 - 1) + (2 - 1)
        let value = psd(&mut trace, 0, 2).unwrap();
        assert_eq!(value, 9.0);
        assert_eq!(trace.feature(TraceFeature::Psd), Some(9.0));
    }

    #[test]
    fn test_psd_requires_peak() {
        let mut trace = Trace::new(vec![1, 2, 3, 4]);
        baseline(&mut trace, 0, 2).unwrap();
        let err = psd(&mut trace, 0, 2).unwrap_err();
        assert_eq!(
            err,
            DecayError::MissingFeature {
                op: "psd",
                feature: TraceFeature::MaxPos
            }
        );
    }

    #[test]
    fn test_typed_pipeline_full_sequence() {
        let mut trace = Trace::new(vec![0, 1, 2, 9, 2, 1, 0]);
        let stage = TraceAnalyzer::new(&mut trace).baseline(0, 2).unwrap();
        let mut peaked = stage.find_peak(1, 1).unwrap();

        assert_eq!(peaked.peak().0, 3);
        peaked.qdc(0, 7).unwrap();
        peaked.psd(0, 2).unwrap();

        assert!(trace.feature(TraceFeature::Qdc).is_some());
        assert!(trace.feature(TraceFeature::Psd).is_some());
    }

    #[test]
    fn test_process_traces_batch() {
        let pulse = vec![0, 1, 2, 9, 2, 1, 0];
        let params = TraceParams {
            baseline_lo: 0,
            baseline_len: 2,
            peak_low_margin: 1,
            peak_high_margin: 1,
            qdc_start: 0,
            qdc_len: 7,
            psd_lo_rel: 0,
            psd_hi_rel: 2,
        };

        let mut hits = vec![
            ChannelHit::new(10, 0, "dssd_front", 1.0).with_trace(Trace::new(pulse.clone())),
            ChannelHit::new(11, 1, "ge", 2.0),
            ChannelHit::new(12, 2, "dssd_back", 3.0).with_trace(Trace::new(pulse)),
        ];

        let results = process_traces(&mut hits, &params);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.is_ok()));

        let trace = hits[0].trace.as_ref().unwrap();
        assert_eq!(trace.feature(TraceFeature::MaxPos), Some(3.0));
        assert!(hits[1].trace.is_none());
    }
}
