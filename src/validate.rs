//! Structural checks over one channel's continuous records.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{DriftField, NlxError, Result};
use crate::layout::{FileKind, RecordLayout, NCS_SAMPLES_PER_RECORD};
use crate::types::ContinuousRecord;

/// A timestamp discontinuity between two consecutive records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    /// Index of the record that starts after the discontinuity
    pub record_index: usize,
    /// Delta implied by the sampling rate (μs)
    pub expected_delta: f64,
    /// Delta between this record's timestamp and the previous one (μs)
    pub observed_delta: i64,
}

/// Outcome of a successful validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub channel_number: u32,
    pub sample_freq: u32,
    pub num_records: usize,
    /// `NumValidSamples` of the final record
    pub last_valid_samples: u32,
    /// Discontinuities, in record order
    pub gaps: Vec<Gap>,
}

impl ValidationReport {
    pub fn is_continuous(&self) -> bool {
        self.gaps.is_empty()
    }
}

/// Microseconds spanned by one full record at `sample_freq`.
pub fn expected_record_delta(sample_freq: u32) -> f64 {
    NCS_SAMPLES_PER_RECORD as f64 * 1_000_000.0 / sample_freq as f64
}

/// Checks a channel's records for structural integrity.
///
/// Fails on the first record whose channel number or sampling frequency
/// differs from the first record's (or on the first record itself when the
/// two records after it agree against it), or on a non-final record that is not
/// completely filled. Timestamp discontinuities beyond `tolerance_us` are
/// collected as [`Gap`]s rather than treated as errors.
pub fn validate_continuous(
    records: &[ContinuousRecord],
    tolerance_us: f64,
) -> Result<ValidationReport> {
    let layout = FileKind::Continuous.layout();
    let (first, last) = match (records.first(), records.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            return Err(NlxError::EmptyRecording {
                kind: FileKind::Continuous,
            })
        }
    };

    check_drift(records, &layout)?;
    check_complete(records, &layout)?;
    let gaps = find_gaps(records, first.sample_freq, tolerance_us);

    if gaps.is_empty() {
        debug!("No timestamp gaps across {} records", records.len());
    } else {
        warn!(
            "{} gaps in timestamp data found. Time scale will not be uniform!",
            gaps.len()
        );
    }

    Ok(ValidationReport {
        channel_number: first.channel_number,
        sample_freq: first.sample_freq,
        num_records: records.len(),
        last_valid_samples: last.num_valid_samples,
        gaps,
    })
}

fn check_drift(records: &[ContinuousRecord], layout: &RecordLayout) -> Result<()> {
    let first = &records[0];
    let Some((i, field)) = records
        .iter()
        .enumerate()
        .skip(1)
        .find_map(|(i, r)| drift_between(first, r).map(|field| (i, field)))
    else {
        return Ok(());
    };

    // When records 1 and 2 agree with each other, record 0 is the odd one out
    let (record_index, expected, found) = match records.get(2) {
        Some(third) if i == 1 && field_value(third, field) == field_value(&records[1], field) => {
            (0, field_value(&records[1], field), field_value(first, field))
        }
        _ => (i, field_value(first, field), field_value(&records[i], field)),
    };

    Err(NlxError::ChannelDrift {
        record_index,
        offset: layout.record_offset(record_index),
        field,
        expected,
        found,
    })
}

fn drift_between(reference: &ContinuousRecord, record: &ContinuousRecord) -> Option<DriftField> {
    if record.channel_number != reference.channel_number {
        Some(DriftField::ChannelNumber)
    } else if record.sample_freq != reference.sample_freq {
        Some(DriftField::SampleFreq)
    } else {
        None
    }
}

fn field_value(record: &ContinuousRecord, field: DriftField) -> u32 {
    match field {
        DriftField::ChannelNumber => record.channel_number,
        DriftField::SampleFreq => record.sample_freq,
    }
}

fn check_complete(records: &[ContinuousRecord], layout: &RecordLayout) -> Result<()> {
    let full = NCS_SAMPLES_PER_RECORD as u32;
    let body = &records[..records.len() - 1];

    match body.iter().position(|r| r.num_valid_samples != full) {
        Some(i) => Err(NlxError::IncompleteRecord {
            record_index: i,
            offset: layout.record_offset(i),
            num_valid_samples: body[i].num_valid_samples,
        }),
        None => Ok(()),
    }
}

fn find_gaps(records: &[ContinuousRecord], sample_freq: u32, tolerance_us: f64) -> Vec<Gap> {
    if sample_freq == 0 {
        warn!("Sample frequency is zero, skipping timestamp gap detection");
        return Vec::new();
    }
    let expected = expected_record_delta(sample_freq);

    records
        .windows(2)
        .enumerate()
        .filter_map(|(i, pair)| {
            let observed = pair[1].timestamp as i64 - pair[0].timestamp as i64;
            ((observed as f64 - expected).abs() > tolerance_us).then_some(Gap {
                record_index: i + 1,
                expected_delta: expected,
                observed_delta: observed,
            })
        })
        .collect()
}
