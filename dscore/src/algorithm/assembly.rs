//! Groups a time-ordered stream of channel hits into events under a
//! maximum-gap rule.
//!
//! The rule compares each hit's timestamp to the timestamp of the
//! *previous* hit consumed, not to the event's first member. A long run
//! of hits, each within the window of its immediate predecessor, can
//! therefore produce an event whose total span exceeds the configured
//! width; this chained grouping is intentional.

use crate::data::event::Event;
use crate::data::hit::ChannelHit;
use crate::error::{DecayError, DecayResult};

/// Lazy assembler over a time-ordered hit stream.
///
/// Yields closed events as the stream is consumed; the final open event
/// is flushed at end of input. Input ordering is a precondition: a
/// decreasing timestamp yields [DecayError::UnsortedInput] and ends the
/// stream, leaving all previously yielded events valid.
///
/// # Example
///
/// ```rust
/// use dscore::data::hit::ChannelHit;
/// use dscore::algorithm::assembly::EventAssembler;
///
/// let hits = vec![
///     ChannelHit::new(0, 0, "dssd_front", 1.0),
///     ChannelHit::new(5, 1, "dssd_back", 2.0),
///     ChannelHit::new(12, 2, "ge", 3.0),
/// ];
///
/// let events: Vec<_> = EventAssembler::new(hits.into_iter(), 6)
///     .map(|e| e.unwrap())
///     .collect();
/// assert_eq!(events.len(), 2);
/// assert_eq!(events[0].len(), 2);
/// assert_eq!(events[1].time(), 12);
/// ```
pub struct EventAssembler<I> {
    hits: I,
    event_width: u64,
    open: Option<(Event, u64)>,
    done: bool,
}

impl<I: Iterator<Item = ChannelHit>> EventAssembler<I> {
    /// Creates an assembler with the given maximum gap between successive
    /// hits of the same event, in timestamp units.
    pub fn new(hits: I, event_width: u64) -> Self {
        EventAssembler {
            hits,
            event_width,
            open: None,
            done: false,
        }
    }
}

impl<I: Iterator<Item = ChannelHit>> Iterator for EventAssembler<I> {
    type Item = DecayResult<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            match self.hits.next() {
                Some(hit) => match self.open.take() {
                    None => {
                        let time = hit.time;
                        self.open = Some((Event::open(hit), time));
                    }
                    Some((mut event, prev)) => {
                        if hit.time < prev {
                            self.done = true;
                            return Some(Err(DecayError::UnsortedInput {
                                prev,
                                next: hit.time,
                            }));
                        }
                        if hit.time - prev <= self.event_width {
                            let time = hit.time;
                            event.push(hit);
                            self.open = Some((event, time));
                        } else {
                            let time = hit.time;
                            self.open = Some((Event::open(hit), time));
                            return Some(Ok(event));
                        }
                    }
                },
                None => {
                    self.done = true;
                    return self.open.take().map(|(event, _)| Ok(event));
                }
            }
        }
    }
}

/// Collects an entire hit sequence into events.
///
/// On an ordering violation the already-closed events are preserved and
/// returned alongside the error; the event open at the time of the
/// violation is discarded.
pub fn assemble(hits: Vec<ChannelHit>, event_width: u64) -> (Vec<Event>, Option<DecayError>) {
    let mut events = Vec::new();
    for item in EventAssembler::new(hits.into_iter(), event_width) {
        match item {
            Ok(event) => events.push(event),
            Err(e) => return (events, Some(e)),
        }
    }
    (events, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hits_at(times: &[u64]) -> Vec<ChannelHit> {
        times
            .iter()
            .enumerate()
            .map(|(i, &t)| ChannelHit::new(t, i as u32, "dssd_front", 1.0))
            .collect()
    }

    #[test]
    fn test_gap_boundary() {
        // gap 5 -> 12 is 7 > 6, so the event closes
        let (events, err) = assemble(hits_at(&[0, 5, 12]), 6);
        assert!(err.is_none());
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].len(), 2);
        assert_eq!(events[0].time(), 0);
        assert_eq!(events[1].len(), 1);
        assert_eq!(events[1].time(), 12);
    }

    #[test]
    fn test_gap_exactly_at_width_is_in_window() {
        let (events, err) = assemble(hits_at(&[0, 6]), 6);
        assert!(err.is_none());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].len(), 2);
    }

    #[test]
    fn test_equal_timestamps_group_together() {
        let (events, err) = assemble(hits_at(&[10, 10, 10]), 0);
        assert!(err.is_none());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].len(), 3);
    }

    #[test]
    fn test_chained_grouping_can_exceed_width() {
        // every successive gap is 5 <= 6, but the total span is 15 > 6;
        // the successive-gap rule keeps this as one event on purpose
        let (events, err) = assemble(hits_at(&[0, 5, 10, 15]), 6);
        assert!(err.is_none());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].span(), 15);
    }

    #[test]
    fn test_idempotent_under_regrouping() {
        let times = [0, 3, 4, 20, 22, 50, 51, 52, 90];
        let (first, err) = assemble(hits_at(&times), 6);
        assert!(err.is_none());

        let flattened: Vec<ChannelHit> = first
            .iter()
            .flat_map(|e| e.hits().to_vec())
            .collect();
        let (second, err) = assemble(flattened, 6);
        assert!(err.is_none());

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.time(), b.time());
            assert_eq!(a.len(), b.len());
        }
    }

    #[test]
    fn test_unsorted_input_aborts_preserving_closed_events() {
        // {0, 1} closes when 20 arrives; 15 < 20 then violates ordering
        let (events, err) = assemble(hits_at(&[0, 1, 20, 15]), 3);
        assert_eq!(err, Some(DecayError::UnsortedInput { prev: 20, next: 15 }));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].len(), 2);
    }

    #[test]
    fn test_assembler_fuses_after_ordering_error() {
        let hits = hits_at(&[5, 2, 3, 4]);
        let mut assembler = EventAssembler::new(hits.into_iter(), 10);

        assert!(matches!(assembler.next(), Some(Err(_))));
        assert!(assembler.next().is_none());
    }

    #[test]
    fn test_empty_input_yields_no_events() {
        let (events, err) = assemble(Vec::new(), 6);
        assert!(err.is_none());
        assert!(events.is_empty());
    }
}
