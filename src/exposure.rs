//! Hierarchical behavioural-exposure labels derived from the event stream.
//!
//! Event strings end in a marker character: `s` opens an exposure, `e` or
//! `o` closes one, and a trailing digit marks an instantaneous exposure whose
//! whole string is its name (`s1` is later closed by `s1o`). Open exposures
//! nest, and the label of a sample is the path of open exposures joined with
//! [`LABEL_SEPARATOR`], e.g. `r1-b1`.
//!
//! The stack reconciliation is deliberately best-effort. Opening an exposure
//! discards the most recent entry of the recently-closed buffer, and closing
//! one pops the innermost open exposure regardless of its name. Underflow on
//! either side is a no-op. Out-of-order streams (two closes before any
//! matching open, say) can therefore leave the stack out of step with the
//! intended nesting; that behaviour is kept for compatibility with existing
//! labelled datasets.

use ndarray::Array1;

use crate::timebase::partition_point;
use crate::types::Event;

/// Joins nested exposure names in a label.
pub const LABEL_SEPARATOR: &str = "-";

/// Meaning of an event string's final character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Start,
    End,
    Other,
    Instant,
    /// Any other suffix; the event leaves the stack untouched
    Unrecognized,
}

impl Marker {
    fn opens(self) -> bool {
        matches!(self, Marker::Start | Marker::Instant)
    }

    fn closes(self) -> bool {
        matches!(self, Marker::End | Marker::Other)
    }
}

/// Splits an event string into its exposure name and marker.
///
/// For instantaneous events (trailing digit) the name is the whole string.
pub fn split_marker(raw: &str) -> (&str, Marker) {
    let Some((idx, c)) = raw.char_indices().next_back() else {
        return (raw, Marker::Unrecognized);
    };
    let stem = &raw[..idx];
    match c {
        's' => (stem, Marker::Start),
        'e' => (stem, Marker::End),
        'o' => (stem, Marker::Other),
        c if c.is_ascii_digit() => (raw, Marker::Instant),
        _ => (stem, Marker::Unrecognized),
    }
}

/// Open exposures plus the buffer of recently closed ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExposureStack {
    active: Vec<String>,
    closed: Vec<String>,
}

impl ExposureStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one event string and returns the resulting label.
    pub fn apply(&mut self, raw: &str) -> String {
        let (stem, marker) = split_marker(raw);

        if marker.opens() && !self.active.iter().any(|s| s == stem) {
            self.active.push(stem.to_string());
            self.closed.pop();
        } else if marker.closes() && !self.closed.iter().any(|s| s == stem) {
            self.closed.push(stem.to_string());
            self.active.pop();
        }

        self.label()
    }

    /// Open exposures joined outermost first.
    pub fn label(&self) -> String {
        self.active.join(LABEL_SEPARATOR)
    }

    pub fn active(&self) -> &[String] {
        &self.active
    }

    pub fn recently_closed(&self) -> &[String] {
        &self.closed
    }
}

/// Label after each event, excluding the final event, which closes the
/// session.
pub fn label_events(events: &[Event]) -> Vec<String> {
    let Some((_, body)) = events.split_last() else {
        return Vec::new();
    };
    let mut stack = ExposureStack::new();
    body.iter().map(|e| stack.apply(&e.label)).collect()
}

/// Per-sample exposure labels for one channel.
///
/// Stores one label per event and, for each sample, the index of the event
/// whose label it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposureLabels {
    labels: Vec<String>,
    sample_event: Vec<Option<u32>>,
}

impl ExposureLabels {
    /// Aligns `events` against a non-decreasing sample timebase.
    ///
    /// Each event stamps the first sample whose timestamp exceeds its own
    /// (a later event wins when two land on the same sample). Unstamped
    /// samples inherit the previous stamped sample's event; samples before
    /// the first stamp stay unlabelled.
    pub fn assign(sample_timestamps: &Array1<f64>, events: &[Event]) -> Self {
        let labels = label_events(events);
        let mut sample_event = vec![None; sample_timestamps.len()];

        for (k, event) in events.iter().take(labels.len()).enumerate() {
            let ts = event.timestamp as f64;
            let idx = partition_point(sample_timestamps, |t| t <= ts);
            if let Some(slot) = sample_event.get_mut(idx) {
                *slot = Some(k as u32);
            }
        }

        let mut current = None;
        for slot in sample_event.iter_mut() {
            if slot.is_some() {
                current = *slot;
            } else {
                *slot = current;
            }
        }

        ExposureLabels {
            labels,
            sample_event,
        }
    }

    pub fn len(&self) -> usize {
        self.sample_event.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sample_event.is_empty()
    }

    /// Label of sample `index`, `None` before the first event or out of range.
    pub fn label_at(&self, index: usize) -> Option<&str> {
        let k = (*self.sample_event.get(index)?)?;
        self.labels.get(k as usize).map(String::as_str)
    }

    /// Index of the event whose label sample `index` carries.
    pub fn event_index_at(&self, index: usize) -> Option<usize> {
        self.sample_event.get(index).copied().flatten().map(|k| k as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> + '_ {
        self.sample_event
            .iter()
            .map(|k| k.and_then(|k| self.labels.get(k as usize)).map(String::as_str))
    }

    /// Label after each event, in event order.
    pub fn event_labels(&self) -> &[String] {
        &self.labels
    }
}
