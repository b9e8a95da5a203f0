use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::exposure::ExposureLabels;
use crate::header::ParsedHeader;
use crate::layout::{NCS_SAMPLES_PER_RECORD, NEV_EXTRA_VALUES};
use crate::timebase::{partition_point, Signal, SignalUnit, Units};
use crate::validate::{Gap, ValidationReport};

/// One 512-sample record from an NCS continuous file.
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuousRecord {
    /// Acquisition time of the first sample in this record (μs)
    pub timestamp: u64,
    /// Channel number of this record (not the A/D channel number)
    pub channel_number: u32,
    /// Sampling frequency of the samples in this record (Hz)
    pub sample_freq: u32,
    /// How many entries of `samples` hold valid data
    pub num_valid_samples: u32,
    /// Raw ADC counts
    pub samples: [i16; NCS_SAMPLES_PER_RECORD],
}

impl ContinuousRecord {
    /// The valid prefix of `samples`.
    pub fn valid_samples(&self) -> &[i16] {
        let n = (self.num_valid_samples as usize).min(NCS_SAMPLES_PER_RECORD);
        &self.samples[..n]
    }
}

/// One record from an NEV event file.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    /// Reserved start-of-transmission marker
    pub stx: i16,
    /// Identifies the packet type
    pub pkt_id: i16,
    /// Size of the packet payload
    pub pkt_data_size: i16,
    /// Time of the event (μs)
    pub timestamp: u64,
    /// Event identifier
    pub event_id: i16,
    /// Value of the TTL port at the time of the event
    pub ttl: i16,
    /// Record checksum
    pub crc: i16,
    pub dummy1: i16,
    pub dummy2: i16,
    /// Extra bit values for this event
    pub extra: [i32; NEV_EXTRA_VALUES],
    /// Event string up to its first NUL byte
    pub event_string: String,
}

/// A timestamped behavioural marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Event {
    /// Time of the event (μs)
    pub timestamp: u64,
    /// Raw marker string, e.g. `"r1s"`
    pub label: String,
}

impl Event {
    pub fn new(timestamp: u64, label: impl Into<String>) -> Self {
        Event {
            timestamp,
            label: label.into(),
        }
    }
}

/// A decoded NEV file.
#[derive(Debug, Clone)]
pub struct EventFile {
    /// Path the file was read from
    pub path: PathBuf,
    /// Parsed header metadata
    pub header: ParsedHeader,
    /// Records in file order
    pub records: Vec<EventRecord>,
    /// Bytes of a truncated trailing record that were dropped
    pub partial_bytes: u64,
}

impl EventFile {
    /// Ordered `(timestamp, label)` pairs.
    pub fn events(&self) -> Vec<Event> {
        self.records
            .iter()
            .map(|r| Event::new(r.timestamp, r.event_string.clone()))
            .collect()
    }
}

/// Options controlling a continuous load.
///
/// # Examples
///
/// ```
/// use nlx_importer::{LoadOptions, SignalUnit};
///
/// let options = LoadOptions::default()
///     .with_unit(SignalUnit::Millivolts)
///     .with_gap_tolerance_us(2.0);
/// assert_eq!(options.unit, SignalUnit::Millivolts);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Physical unit of the scaled signal
    pub unit: SignalUnit,
    /// Allowed deviation of an inter-record timestamp delta from the one
    /// implied by the sampling rate before a gap is reported (μs)
    pub gap_tolerance_us: f64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            unit: SignalUnit::Microvolts,
            gap_tolerance_us: 1.0,
        }
    }
}

impl LoadOptions {
    pub fn with_unit(mut self, unit: SignalUnit) -> Self {
        self.unit = unit;
        self
    }

    pub fn with_gap_tolerance_us(mut self, tolerance: f64) -> Self {
        self.gap_tolerance_us = tolerance;
        self
    }
}

/// One continuous channel decoded from an NCS file.
///
/// A channel is immutable once built. Exposure labels are attached by
/// [`Channel::with_exposures`], which consumes the channel and returns the
/// labelled one.
///
/// # Examples
///
/// ```no_run
/// use nlx_importer::load_continuous;
///
/// let channel = load_continuous("data/LFP1.ncs").unwrap();
/// println!("{} samples at {} Hz", channel.num_samples(), channel.sampling_rate());
/// println!("{} gaps", channel.gaps().len());
/// ```
#[derive(Debug, Clone)]
pub struct Channel {
    pub(crate) path: PathBuf,
    pub(crate) header: ParsedHeader,
    pub(crate) records: Vec<ContinuousRecord>,
    pub(crate) validation: ValidationReport,
    pub(crate) sample_timestamps: Array1<f64>,
    pub(crate) signal: Signal,
    pub(crate) units: Units,
    pub(crate) exposures: Option<ExposureLabels>,
}

impl Channel {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &ParsedHeader {
        &self.header
    }

    pub fn records(&self) -> &[ContinuousRecord] {
        &self.records
    }

    /// Per-record acquisition timestamps (μs).
    pub fn record_timestamps(&self) -> Array1<u64> {
        self.records.iter().map(|r| r.timestamp).collect()
    }

    /// The scaled signal, or raw counts when the header has no `ADBitVolts`.
    pub fn samples(&self) -> &Signal {
        &self.signal
    }

    /// Interpolated timestamp of every sample (μs).
    pub fn sample_timestamps(&self) -> &Array1<f64> {
        &self.sample_timestamps
    }

    /// Per-sample exposure labels, once attached.
    pub fn exposure_labels(&self) -> Option<&ExposureLabels> {
        self.exposures.as_ref()
    }

    /// Sampling rate (Hz) reported by the records.
    pub fn sampling_rate(&self) -> u32 {
        self.validation.sample_freq
    }

    pub fn channel_number(&self) -> u32 {
        self.validation.channel_number
    }

    pub fn units(&self) -> Units {
        self.units
    }

    pub fn validation(&self) -> &ValidationReport {
        &self.validation
    }

    /// Timestamp discontinuities found while validating the records.
    pub fn gaps(&self) -> &[Gap] {
        &self.validation.gaps
    }

    pub fn num_samples(&self) -> usize {
        self.signal.len()
    }

    /// Returns the duration of the recording in seconds.
    ///
    /// Computed from the sample count, so gaps do not lengthen it.
    pub fn duration(&self) -> f64 {
        if self.sampling_rate() == 0 {
            return 0.0;
        }
        self.num_samples() as f64 / self.sampling_rate() as f64
    }

    /// Index of the first sample whose timestamp is strictly after `timestamp`.
    pub fn first_sample_after(&self, timestamp: f64) -> usize {
        partition_point(&self.sample_timestamps, |t| t <= timestamp)
    }

    /// Index of the first sample whose timestamp is not before `timestamp`.
    pub fn first_sample_from(&self, timestamp: f64) -> usize {
        partition_point(&self.sample_timestamps, |t| t < timestamp)
    }

    /// Samples from the first one after `start` up to the first one not
    /// before `end`.
    pub fn window(&self, start: u64, end: u64) -> Range<usize> {
        let from = self.first_sample_after(start as f64);
        let to = self.first_sample_from(end as f64).max(from);
        from..to
    }

    /// Attaches per-sample labels derived from `events`.
    pub fn with_exposures(mut self, events: &[Event]) -> Self {
        self.exposures = Some(ExposureLabels::assign(&self.sample_timestamps, events));
        self
    }
}
