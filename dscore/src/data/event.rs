use std::fmt;
use std::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};

use crate::data::hit::ChannelHit;

/// A time-grouped set of channel hits believed to originate from one
/// physical occurrence.
///
/// Events are built by the assembler and are never empty; members are
/// time-ordered, and a closed event is never mutated again. The timestamp
/// of the first member serves as the canonical event time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    hits: Vec<ChannelHit>,
}

impl Event {
    /// Opens a new event containing just the given hit.
    pub(crate) fn open(first: ChannelHit) -> Self {
        Event { hits: vec![first] }
    }

    pub(crate) fn push(&mut self, hit: ChannelHit) {
        self.hits.push(hit);
    }

    /// Canonical event time: the timestamp of the first member.
    pub fn time(&self) -> u64 {
        self.hits[0].time
    }

    /// Total time spanned by the event's members.
    ///
    /// Because grouping compares only successive hits, the span of a chained
    /// event may exceed the configured assembly width.
    pub fn span(&self) -> u64 {
        self.hits[self.hits.len() - 1].time - self.hits[0].time
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn hits(&self) -> &[ChannelHit] {
        &self.hits
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChannelHit> {
        self.hits.iter()
    }

    pub fn into_hits(self) -> Vec<ChannelHit> {
        self.hits
    }
}

impl Display for Event {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Event(t: {}, hits: {}, span: {})",
            self.time(),
            self.len(),
            self.span()
        )
    }
}
