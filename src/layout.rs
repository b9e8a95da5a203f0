//! Fixed record shapes for each Neuralynx file type.
//!
//! Every recording starts with a [`HEADER_SIZE`] byte text header followed by
//! a packed sequence of little-endian records whose shape depends solely on
//! the file extension.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{NlxError, Result};

/// Size of the text header at the start of every file, whatever its type.
pub const HEADER_SIZE: usize = 16 * 1024;

/// Samples held by one continuous record.
pub const NCS_SAMPLES_PER_RECORD: usize = 512;

/// Points per channel in one spike waveform.
pub const SPIKE_POINTS_PER_CHANNEL: usize = 32;

/// Number of feature parameters stored with every spike record.
pub const SPIKE_FEATURE_PARAMS: usize = 8;

/// Width of the event string field in NEV records.
pub const NEV_EVENT_STRING_LEN: usize = 128;

/// Number of extra 32-bit values in NEV records.
pub const NEV_EXTRA_VALUES: usize = 8;

/// The closed set of recording file types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    /// `.ncs` continuous sampled channel
    Continuous,
    /// `.nev` event stream
    Event,
    /// `.nse` single-electrode spikes
    Spike1,
    /// `.nst` stereotrode spikes
    Spike2,
    /// `.ntt` tetrode spikes
    Spike4,
}

impl FileKind {
    /// Resolves a file-type tag such as `"ncs"` (case-insensitive).
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "ncs" => Ok(FileKind::Continuous),
            "nev" => Ok(FileKind::Event),
            "nse" => Ok(FileKind::Spike1),
            "nst" => Ok(FileKind::Spike2),
            "ntt" => Ok(FileKind::Spike4),
            _ => Err(NlxError::UnsupportedFormat {
                tag: tag.to_string(),
            }),
        }
    }

    /// Resolves the kind from a path's extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let tag = path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");
        Self::from_tag(tag)
    }

    pub fn tag(self) -> &'static str {
        match self {
            FileKind::Continuous => "ncs",
            FileKind::Event => "nev",
            FileKind::Spike1 => "nse",
            FileKind::Spike2 => "nst",
            FileKind::Spike4 => "ntt",
        }
    }

    /// Number of electrode channels in a spike record, `None` for other kinds.
    pub fn spike_channels(self) -> Option<usize> {
        match self {
            FileKind::Spike1 => Some(1),
            FileKind::Spike2 => Some(2),
            FileKind::Spike4 => Some(4),
            FileKind::Continuous | FileKind::Event => None,
        }
    }

    pub fn is_spike(self) -> bool {
        self.spike_channels().is_some()
    }

    pub fn layout(self) -> RecordLayout {
        match self {
            FileKind::Continuous => RecordLayout::new(self, NCS_FIELDS),
            FileKind::Event => RecordLayout::new(self, NEV_FIELDS),
            FileKind::Spike1 => RecordLayout::new(self, NSE_FIELDS),
            FileKind::Spike2 => RecordLayout::new(self, NST_FIELDS),
            FileKind::Spike4 => RecordLayout::new(self, NTT_FIELDS),
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Primitive type of one record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    I16,
    I32,
    U32,
    U64,
    /// Raw bytes, used for fixed-width strings
    Bytes,
}

impl FieldType {
    pub fn width(self) -> usize {
        match self {
            FieldType::I16 => 2,
            FieldType::I32 | FieldType::U32 => 4,
            FieldType::U64 => 8,
            FieldType::Bytes => 1,
        }
    }
}

/// One named field inside a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    /// Number of consecutive elements of `ty`
    pub count: usize,
}

impl FieldSpec {
    const fn new(name: &'static str, ty: FieldType, count: usize) -> Self {
        FieldSpec { name, ty, count }
    }

    pub fn size(&self) -> usize {
        self.ty.width() * self.count
    }
}

const NCS_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("TimeStamp", FieldType::U64, 1),
    FieldSpec::new("ChannelNumber", FieldType::U32, 1),
    FieldSpec::new("SampleFreq", FieldType::U32, 1),
    FieldSpec::new("NumValidSamples", FieldType::U32, 1),
    FieldSpec::new("Samples", FieldType::I16, NCS_SAMPLES_PER_RECORD),
];

const NEV_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("stx", FieldType::I16, 1),
    FieldSpec::new("pkt_id", FieldType::I16, 1),
    FieldSpec::new("pkt_data_size", FieldType::I16, 1),
    FieldSpec::new("TimeStamp", FieldType::U64, 1),
    FieldSpec::new("event_id", FieldType::I16, 1),
    FieldSpec::new("ttl", FieldType::I16, 1),
    FieldSpec::new("crc", FieldType::I16, 1),
    FieldSpec::new("dummy1", FieldType::I16, 1),
    FieldSpec::new("dummy2", FieldType::I16, 1),
    FieldSpec::new("Extra", FieldType::I32, NEV_EXTRA_VALUES),
    FieldSpec::new("EventString", FieldType::Bytes, NEV_EVENT_STRING_LEN),
];

macro_rules! spike_fields {
    ($channels:expr) => {
        &[
            FieldSpec::new("TimeStamp", FieldType::U64, 1),
            FieldSpec::new("ScNumber", FieldType::U32, 1),
            FieldSpec::new("CellNumber", FieldType::U32, 1),
            FieldSpec::new("Params", FieldType::U32, SPIKE_FEATURE_PARAMS),
            FieldSpec::new(
                "Data",
                FieldType::I16,
                SPIKE_POINTS_PER_CHANNEL * $channels,
            ),
        ]
    };
}

const NSE_FIELDS: &[FieldSpec] = spike_fields!(1);
const NST_FIELDS: &[FieldSpec] = spike_fields!(2);
const NTT_FIELDS: &[FieldSpec] = spike_fields!(4);

/// The fixed binary shape of one record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    pub kind: FileKind,
    pub fields: &'static [FieldSpec],
    pub record_size: usize,
    pub header_size: usize,
}

impl RecordLayout {
    fn new(kind: FileKind, fields: &'static [FieldSpec]) -> Self {
        RecordLayout {
            kind,
            fields,
            record_size: fields.iter().map(FieldSpec::size).sum(),
            header_size: HEADER_SIZE,
        }
    }

    /// Byte offset of a named field within the record.
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        let mut offset = 0;
        for field in self.fields {
            if field.name == name {
                return Some(offset);
            }
            offset += field.size();
        }
        None
    }

    /// Byte offset in the file of record `index`.
    pub fn record_offset(&self, index: usize) -> u64 {
        (self.header_size + index * self.record_size) as u64
    }

    pub fn estimate_record_count(&self, total_file_size: u64) -> Result<RecordCount> {
        estimate_record_count(
            total_file_size,
            self.header_size as u64,
            self.record_size as u64,
        )
    }
}

/// Number of whole records in a file plus any leftover bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCount {
    pub records: u64,
    /// Bytes of a truncated trailing record, zero when the file ends cleanly
    pub partial_bytes: u64,
}

impl RecordCount {
    pub fn has_partial(&self) -> bool {
        self.partial_bytes != 0
    }
}

/// Computes how many whole records follow the header.
///
/// A trailing fragment shorter than `record_size` is reported through
/// [`RecordCount::partial_bytes`] rather than discarded silently. A zero
/// `record_size` is rejected with [`NlxError::ZeroRecordSize`].
pub fn estimate_record_count(
    total_file_size: u64,
    header_size: u64,
    record_size: u64,
) -> Result<RecordCount> {
    if record_size == 0 {
        return Err(NlxError::ZeroRecordSize);
    }

    let body = total_file_size
        .checked_sub(header_size)
        .ok_or(NlxError::TruncatedFile {
            offset: 0,
            needed: header_size,
            available: total_file_size,
        })?;

    Ok(RecordCount {
        records: body / record_size,
        partial_bytes: body % record_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_sizes_match_the_file_format() {
        assert_eq!(FileKind::Continuous.layout().record_size, 1044);
        assert_eq!(FileKind::Event.layout().record_size, 184);
        assert_eq!(FileKind::Spike1.layout().record_size, 112);
        assert_eq!(FileKind::Spike2.layout().record_size, 176);
        assert_eq!(FileKind::Spike4.layout().record_size, 304);
    }

    #[test]
    fn header_size_is_independent_of_kind() {
        for tag in ["ncs", "nev", "nse", "nst", "ntt"] {
            let kind = FileKind::from_tag(tag).unwrap();
            assert_eq!(kind.layout().header_size, 16384);
            assert_eq!(kind.tag(), tag);
        }
    }

    #[test]
    fn tags_resolve_from_paths() {
        assert_eq!(
            FileKind::from_path("session/LFP1.NCS").unwrap(),
            FileKind::Continuous
        );
        assert_eq!(
            FileKind::from_path("Events.nev").unwrap(),
            FileKind::Event
        );
        assert!(matches!(
            FileKind::from_path("notes.txt"),
            Err(NlxError::UnsupportedFormat { tag }) if tag == "txt"
        ));
        assert!(matches!(
            FileKind::from_path("no_extension"),
            Err(NlxError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn field_offsets() {
        let ncs = FileKind::Continuous.layout();
        assert_eq!(ncs.offset_of("TimeStamp"), Some(0));
        assert_eq!(ncs.offset_of("NumValidSamples"), Some(16));
        assert_eq!(ncs.offset_of("Samples"), Some(20));
        assert_eq!(ncs.offset_of("Missing"), None);

        let nev = FileKind::Event.layout();
        assert_eq!(nev.offset_of("TimeStamp"), Some(6));
        assert_eq!(nev.offset_of("EventString"), Some(56));
    }

    #[test]
    fn record_count_is_floored_with_remainder_reported() {
        let k = 7u64;
        for r in [0u64, 1, 500, 1043] {
            let total = 16384 + k * 1044 + r;
            let count = estimate_record_count(total, 16384, 1044).unwrap();
            assert_eq!(count.records, k);
            assert_eq!(count.partial_bytes, r);
            assert_eq!(count.has_partial(), r != 0);
        }
    }

    #[test]
    fn record_count_rejects_files_shorter_than_header() {
        let err = estimate_record_count(100, 16384, 1044).unwrap_err();
        assert!(matches!(
            err,
            NlxError::TruncatedFile {
                needed: 16384,
                available: 100,
                ..
            }
        ));
    }

    #[test]
    fn zero_record_size_is_an_error() {
        assert!(matches!(
            estimate_record_count(20_000, 16384, 0),
            Err(NlxError::ZeroRecordSize)
        ));
    }

    #[test]
    fn spike_channel_counts() {
        assert_eq!(FileKind::Spike4.spike_channels(), Some(4));
        assert!(FileKind::Spike2.is_spike());
        assert!(!FileKind::Event.is_spike());
    }
}
