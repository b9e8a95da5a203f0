//! Per-sample timebase reconstruction and physical scaling.
//!
//! Sample timestamps are *linearly interpolated* between the first and the
//! last record timestamp. Per-record timestamps are not carried down to the
//! individual samples, so a recording with gaps gets an evenly stretched
//! timebase rather than one that jumps at each gap. Callers needing exact
//! timing across gaps should use [`crate::Channel::gaps`] and the record
//! timestamps.

use std::fmt;

use log::warn;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::header::ParsedHeader;
use crate::layout::NCS_SAMPLES_PER_RECORD;
use crate::types::ContinuousRecord;

/// Physical unit requested for the scaled signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalUnit {
    Volts,
    Millivolts,
    Microvolts,
}

impl SignalUnit {
    /// Multiplier applied on top of `ADBitVolts`.
    pub fn factor(self) -> f64 {
        match self {
            SignalUnit::Volts => 1.0,
            SignalUnit::Millivolts => 1_000.0,
            SignalUnit::Microvolts => 1_000_000.0,
        }
    }
}

/// Unit a channel's signal is actually expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Units {
    Volts,
    Millivolts,
    Microvolts,
    /// Unscaled ADC integers, used when the header lacks `ADBitVolts`
    AdcCounts,
}

impl Units {
    pub fn symbol(self) -> &'static str {
        match self {
            Units::Volts => "V",
            Units::Millivolts => "mV",
            Units::Microvolts => "µV",
            Units::AdcCounts => "ADC counts",
        }
    }
}

impl From<SignalUnit> for Units {
    fn from(unit: SignalUnit) -> Self {
        match unit {
            SignalUnit::Volts => Units::Volts,
            SignalUnit::Millivolts => Units::Millivolts,
            SignalUnit::Microvolts => Units::Microvolts,
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A channel's sample values.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// Samples converted to physical units
    Physical(Array1<f64>),
    /// Raw ADC counts
    Counts(Array1<i16>),
}

impl Signal {
    pub fn len(&self) -> usize {
        match self {
            Signal::Physical(a) => a.len(),
            Signal::Counts(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The samples as floating point, whatever their unit.
    pub fn to_f64(&self) -> Array1<f64> {
        match self {
            Signal::Physical(a) => a.clone(),
            Signal::Counts(a) => a.mapv(f64::from),
        }
    }

    pub fn as_physical(&self) -> Option<&Array1<f64>> {
        match self {
            Signal::Physical(a) => Some(a),
            Signal::Counts(_) => None,
        }
    }

    pub fn as_counts(&self) -> Option<&Array1<i16>> {
        match self {
            Signal::Counts(a) => Some(a),
            Signal::Physical(_) => None,
        }
    }
}

/// Flattened samples with one interpolated timestamp each.
#[derive(Debug, Clone, PartialEq)]
pub struct Timebase {
    /// Raw ADC counts in record order
    pub samples: Array1<i16>,
    /// Interpolated acquisition time of every sample (μs)
    pub timestamps: Array1<f64>,
}

/// Flattens every record's full sample array and interpolates a timestamp
/// for each sample.
///
/// All 512 samples of each record are kept, including the unused tail of a
/// partial last record; `NumValidSamples` only matters to validation.
pub fn expand(records: &[ContinuousRecord]) -> Timebase {
    let mut samples = Vec::with_capacity(records.len() * NCS_SAMPLES_PER_RECORD);
    for record in records {
        samples.extend_from_slice(&record.samples);
    }

    let timestamps = match (records.first(), records.last()) {
        (Some(first), Some(last)) => {
            interpolate(first.timestamp as f64, last.timestamp as f64, samples.len())
        }
        _ => Array1::zeros(0),
    };

    Timebase {
        samples: Array1::from(samples),
        timestamps,
    }
}

/// `n` evenly spaced values from `start` to `end`, with both ends exact.
pub fn interpolate(start: f64, end: f64, n: usize) -> Array1<f64> {
    if n == 1 {
        return Array1::from_elem(1, start);
    }
    let span = end - start;
    let last = n.saturating_sub(1);
    Array1::from_shape_fn(n, |i| {
        if i == last {
            end
        } else {
            start + span * (i as f64 / last as f64)
        }
    })
}

/// Converts raw counts to `unit` using the header's `ADBitVolts`.
///
/// Without a scale factor the counts are returned unchanged and the unit is
/// [`Units::AdcCounts`].
pub fn scale(samples: &Array1<i16>, header: &ParsedHeader, unit: SignalUnit) -> (Signal, Units) {
    match header.ad_bit_volts() {
        Some(ad_bit_volts) => {
            let factor = ad_bit_volts * unit.factor();
            (
                Signal::Physical(samples.mapv(|x| f64::from(x) * factor)),
                unit.into(),
            )
        }
        None => {
            warn!("Unable to rescale data, no ADBitVolts value specified in header");
            (Signal::Counts(samples.clone()), Units::AdcCounts)
        }
    }
}

/// Number of leading timestamps satisfying `pred`, which must hold for a
/// prefix of the (non-decreasing) sequence.
pub(crate) fn partition_point(timestamps: &Array1<f64>, pred: impl Fn(f64) -> bool) -> usize {
    match timestamps.as_slice() {
        Some(slice) => slice.partition_point(|&t| pred(t)),
        None => timestamps.iter().take_while(|&&t| pred(t)).count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::parse_header;
    use crate::layout::HEADER_SIZE;

    fn record(timestamp: u64, fill: i16) -> ContinuousRecord {
        ContinuousRecord {
            timestamp,
            channel_number: 0,
            sample_freq: 32000,
            num_valid_samples: NCS_SAMPLES_PER_RECORD as u32,
            samples: [fill; NCS_SAMPLES_PER_RECORD],
        }
    }

    fn header_with(text: &str) -> ParsedHeader {
        let mut raw = text.as_bytes().to_vec();
        raw.resize(HEADER_SIZE, 0);
        parse_header(&raw)
    }

    #[test]
    fn expands_to_512_timestamps_per_record() {
        let records: Vec<_> = (0..5u64).map(|i| record(1_000_000 + i * 16_000, i as i16)).collect();
        let tb = expand(&records);

        assert_eq!(tb.samples.len(), 5 * 512);
        assert_eq!(tb.timestamps.len(), 5 * 512);
        assert_eq!(tb.timestamps[0], 1_000_000.0);
        assert_eq!(tb.timestamps[5 * 512 - 1], 1_064_000.0);
        assert!(tb.timestamps.windows(2).into_iter().all(|w| w[0] <= w[1]));
        assert_eq!(tb.samples[512], 1);
        assert_eq!(tb.samples[4 * 512 + 7], 4);
    }

    #[test]
    fn partial_last_record_keeps_its_full_array() {
        let mut last = record(16_000, 9);
        last.num_valid_samples = 100;
        let tb = expand(&[record(0, 1), last]);
        assert_eq!(tb.samples.len(), 1024);
        assert_eq!(tb.samples[1023], 9);
        assert_eq!(tb.timestamps.len(), 1024);
        assert_eq!(tb.timestamps[1023], 16_000.0);
    }

    #[test]
    fn single_record_and_empty_input() {
        let tb = expand(&[record(42, 0)]);
        assert!(tb.timestamps.iter().all(|&t| t == 42.0));

        let tb = expand(&[]);
        assert!(tb.samples.is_empty());
        assert!(tb.timestamps.is_empty());
    }

    #[test]
    fn interpolate_edges() {
        assert_eq!(interpolate(5.0, 9.0, 0).len(), 0);
        assert_eq!(interpolate(5.0, 9.0, 1).to_vec(), vec![5.0]);
        assert_eq!(interpolate(0.0, 4.0, 5).to_vec(), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn scaling_to_microvolts_is_exact() {
        let ad_bit_volts = 0.000000030518;
        let header = header_with("-ADBitVolts 0.000000030518\n");
        let raw = Array1::from(vec![-32768i16, -1, 0, 1, 1234, 32767]);

        let (signal, units) = scale(&raw, &header, SignalUnit::Microvolts);
        assert_eq!(units, Units::Microvolts);
        let scaled = signal.as_physical().unwrap();
        for (s, &r) in scaled.iter().zip(raw.iter()) {
            assert_eq!(*s, f64::from(r) * (ad_bit_volts * 1e6));
        }
    }

    #[test]
    fn missing_scale_factor_keeps_raw_counts() {
        let header = header_with("-SamplingFrequency 32000\n");
        let raw = Array1::from(vec![3i16, -4, 5]);

        let (signal, units) = scale(&raw, &header, SignalUnit::Volts);
        assert_eq!(units, Units::AdcCounts);
        assert_eq!(signal.as_counts(), Some(&raw));
        assert_eq!(signal.to_f64().to_vec(), vec![3.0, -4.0, 5.0]);
        assert_eq!(units.to_string(), "ADC counts");
    }

    #[test]
    fn unit_factors() {
        assert_eq!(SignalUnit::Volts.factor(), 1.0);
        assert_eq!(SignalUnit::Millivolts.factor(), 1e3);
        assert_eq!(SignalUnit::Microvolts.factor(), 1e6);
        assert_eq!(Units::from(SignalUnit::Millivolts).symbol(), "mV");
    }
}
