//! Online processing driver: per-hit trace feature extraction, event
//! assembly, and implant-decay correlation for one run.
//!
//! The pipeline processes one logical stream of hits strictly in order;
//! every stage runs to completion for one unit of input before the next
//! is admitted. Routing an assembled event to a pixel and an event kind
//! belongs to the per-detector dispatch layer, which the caller supplies
//! as a closure.

use std::fmt;
use std::fmt::{Display, Formatter};

use dscore::algorithm::assembly::EventAssembler;
use dscore::algorithm::filter::process_traces;
use dscore::correlation::correlator::{Classification, CorrelationResult, Correlator, EventKind};
use dscore::correlation::grid::Pixel;
use dscore::data::event::Event;
use dscore::data::hit::ChannelHit;
use dscore::error::DecayError;

use crate::config::ScanConfig;

/// Dispatch decision for one assembled event: where it landed, what kind
/// of event it is, and whether a coincident veto detector fired.
#[derive(Clone, Copy, Debug)]
pub struct PixelAssignment {
    pub pixel: Pixel,
    pub kind: EventKind,
    pub vetoed: bool,
}

/// Cumulative statistics for one pipeline run.
#[derive(Clone, Debug, Default)]
pub struct RunSummary {
    pub events: u64,
    pub unassigned: u64,
    pub implants: u64,
    pub decays: u64,
    pub correlated: u64,
    pub unknown: u64,
    pub ignored: u64,
    pub trace_failures: u64,
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RunSummary(events: {}, implants: {}, decays: {} ({} correlated), unknown: {}, ignored: {}, unassigned: {}, trace failures: {})",
            self.events,
            self.implants,
            self.decays,
            self.correlated,
            self.unknown,
            self.ignored,
            self.unassigned,
            self.trace_failures
        )
    }
}

/// Drives one acquisition run through trace analysis, event assembly and
/// correlation.
pub struct Pipeline {
    config: ScanConfig,
    correlator: Correlator,
}

impl Pipeline {
    pub fn new(config: ScanConfig) -> Self {
        let correlator = Correlator::new(
            config.grid_extent.0,
            config.grid_extent.1,
            config.max_correlation_time,
            config.min_implant_spacing,
        );
        Pipeline { config, correlator }
    }

    /// Processes a time-ordered hit stream to completion.
    ///
    /// Trace features are extracted for every hit carrying a waveform
    /// (in parallel across hits, which are independent), the stream is
    /// grouped into events, and each event the `assign` dispatch closure
    /// routes to a pixel is fed to the correlator. Events the closure
    /// declines are counted but otherwise skipped.
    ///
    /// Returns the correlation results together with the run summary.
    /// An ordering violation or an out-of-bounds pixel aborts the run;
    /// results accumulated up to that point are preserved and returned
    /// alongside the error.
    pub fn run<F>(
        &mut self,
        mut hits: Vec<ChannelHit>,
        assign: F,
    ) -> (Vec<CorrelationResult>, RunSummary, Option<DecayError>)
    where
        F: Fn(&Event) -> Option<PixelAssignment>,
    {
        let mut summary = RunSummary::default();

        for (i, result) in process_traces(&mut hits, &self.config.trace_analysis)
            .iter()
            .enumerate()
        {
            if let Err(e) = result {
                summary.trace_failures += 1;
                log::warn!("trace analysis failed for hit {}: {}", i, e);
            }
        }

        let mut results = Vec::new();
        for item in EventAssembler::new(hits.into_iter(), self.config.event_width) {
            let event = match item {
                Ok(event) => event,
                Err(e) => {
                    log::error!("event assembly aborted: {}", e);
                    return (results, summary, Some(e));
                }
            };
            summary.events += 1;

            let assignment = match assign(&event) {
                Some(assignment) => assignment,
                None => {
                    summary.unassigned += 1;
                    continue;
                }
            };

            let result = match self.correlator.classify(
                assignment.pixel,
                assignment.kind,
                event.time(),
                assignment.vetoed,
            ) {
                Ok(result) => result,
                Err(e) => {
                    log::error!("correlation aborted at pixel {}: {}", assignment.pixel, e);
                    return (results, summary, Some(e));
                }
            };

            match result.classification {
                Classification::Implant => summary.implants += 1,
                Classification::Decay => {
                    summary.decays += 1;
                    if result.correlated {
                        summary.correlated += 1;
                    }
                }
                Classification::Unknown => summary.unknown += 1,
                Classification::Ignored => summary.ignored += 1,
            }
            results.push(result);
        }

        log::debug!("{}", summary);
        (results, summary, None)
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    /// Resets all correlation state for a new run.
    pub fn clear(&mut self) {
        self.correlator.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ScanConfig {
        ScanConfig {
            event_width: 10,
            max_correlation_time: 200,
            min_implant_spacing: 50,
            grid_extent: (8, 8),
            ..ScanConfig::default()
        }
    }

    fn hit(time: u64, detector_type: &str) -> ChannelHit {
        ChannelHit::new(time, 0, detector_type, 1.0)
    }

    fn assign_by_type(event: &Event) -> Option<PixelAssignment> {
        let first = &event.hits()[0];
        let kind = match first.detector_type.as_str() {
            "implant" => EventKind::Implant,
            "decay" => EventKind::Decay,
            _ => return None,
        };
        Some(PixelAssignment {
            pixel: Pixel::new(2, 2),
            kind,
            vetoed: false,
        })
    }

    #[test]
    fn test_run_correlates_implant_decay_pair() {
        let mut pipeline = Pipeline::new(test_config());
        let hits = vec![hit(100, "implant"), hit(150, "decay")];

        let (results, summary, err) = pipeline.run(hits, assign_by_type);
        assert!(err.is_none());

        assert_eq!(summary.events, 2);
        assert_eq!(summary.implants, 1);
        assert_eq!(summary.decays, 1);
        assert_eq!(summary.correlated, 1);

        assert_eq!(results.len(), 2);
        assert_eq!(results[1].delta_t, Some(50));
        assert!(results[1].correlated);
    }

    #[test]
    fn test_run_counts_unassigned_events() {
        let mut pipeline = Pipeline::new(test_config());
        let hits = vec![hit(100, "implant"), hit(500, "ge")];

        let (results, summary, err) = pipeline.run(hits, assign_by_type);
        assert!(err.is_none());
        assert_eq!(summary.events, 2);
        assert_eq!(summary.unassigned, 1);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_run_aborts_on_unsorted_hits_preserving_results() {
        let mut pipeline = Pipeline::new(test_config());
        let hits = vec![hit(100, "implant"), hit(500, "decay"), hit(400, "decay")];

        let (results, summary, err) = pipeline.run(hits, assign_by_type);
        assert!(matches!(err, Some(DecayError::UnsortedInput { .. })));

        // the implant event closed and was classified before the abort
        assert_eq!(results.len(), 1);
        assert_eq!(summary.implants, 1);
    }

    #[test]
    fn test_vetoed_decay_counts_as_ignored() {
        let mut pipeline = Pipeline::new(test_config());
        let hits = vec![hit(100, "implant"), hit(150, "decay")];

        let (results, summary, err) = pipeline.run(hits, |event| {
            let mut assignment = assign_by_type(event)?;
            if assignment.kind == EventKind::Decay {
                assignment.vetoed = true;
            }
            Some(assignment)
        });
        assert!(err.is_none());
        assert_eq!(summary.ignored, 1);
        assert_eq!(summary.decays, 0);
        assert_eq!(results[1].classification, Classification::Ignored);
    }

    #[test]
    fn test_clear_resets_correlation_state() {
        let mut pipeline = Pipeline::new(test_config());
        let (_, _, err) = pipeline.run(vec![hit(100, "implant")], assign_by_type);
        assert!(err.is_none());

        pipeline.clear();
        let entry = pipeline.correlator().entry(Pixel::new(2, 2)).unwrap();
        assert_eq!(entry.last_implant_time, None);
    }
}
