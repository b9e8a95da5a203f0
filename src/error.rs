use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::layout::FileKind;

/// Which per-record field changed part way through a continuous recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftField {
    ChannelNumber,
    SampleFreq,
}

impl std::fmt::Display for DriftField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriftField::ChannelNumber => write!(f, "channel number"),
            DriftField::SampleFreq => write!(f, "sample frequency"),
        }
    }
}

/// Errors raised while reading Neuralynx recordings.
///
/// Every fatal variant aborts the load of the file it concerns; loaders that
/// take a path wrap the underlying variant in [`NlxError::File`] so the
/// offending file is always named.
#[derive(Debug, Error)]
pub enum NlxError {
    /// The header block or the whole file is shorter than required
    #[error("truncated file: needed {needed} bytes at offset {offset}, only {available} available")]
    TruncatedFile {
        offset: u64,
        needed: u64,
        available: u64,
    },

    /// The file extension is not one of `ncs`, `nev`, `nse`, `nst`, `ntt`
    #[error("unsupported file format '{tag}'")]
    UnsupportedFormat { tag: String },

    /// Channel number or sample frequency changed mid-file
    #[error(
        "{field} changed at record {record_index} (byte offset {offset}): expected {expected}, found {found}"
    )]
    ChannelDrift {
        record_index: usize,
        offset: u64,
        field: DriftField,
        expected: u32,
        found: u32,
    },

    /// A record other than the last one is not completely filled
    #[error(
        "record {record_index} (byte offset {offset}) holds {num_valid_samples} valid samples, only the last record may be partial"
    )]
    IncompleteRecord {
        record_index: usize,
        offset: u64,
        num_valid_samples: u32,
    },

    /// A header time string did not match any known layout
    #[error("malformed timestamp '{input}'")]
    MalformedTimestamp { input: String },

    /// Spike records are recognised but not decoded
    #[error("decoding {kind} spike records is not supported")]
    SpikeDecodingUnsupported { kind: FileKind },

    /// The file holds a header but not a single whole record
    #[error("{kind} file contains no complete records")]
    EmptyRecording { kind: FileKind },

    /// A record size of zero was passed to the record-count estimate
    #[error("record size must be non-zero")]
    ZeroRecordSize,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: Box<NlxError>,
    },
}

impl NlxError {
    /// Attaches the path of the file being read.
    pub(crate) fn in_file(self, path: impl Into<PathBuf>) -> Self {
        match self {
            already @ NlxError::File { .. } => already,
            other => NlxError::File {
                path: path.into(),
                source: Box::new(other),
            },
        }
    }

    /// Returns the innermost error, looking through any path context.
    pub fn root(&self) -> &NlxError {
        match self {
            NlxError::File { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, NlxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_context_is_applied_once() {
        let err = NlxError::UnsupportedFormat { tag: "txt".into() }
            .in_file("a/b.txt")
            .in_file("ignored");

        match &err {
            NlxError::File { path, .. } => assert_eq!(path, &PathBuf::from("a/b.txt")),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(matches!(err.root(), NlxError::UnsupportedFormat { .. }));
        assert!(err.to_string().contains("a/b.txt"));
    }

    #[test]
    fn drift_message_names_the_record() {
        let err = NlxError::ChannelDrift {
            record_index: 3,
            offset: 16384 + 3 * 1044,
            field: DriftField::SampleFreq,
            expected: 32000,
            found: 32001,
        };
        let msg = err.to_string();
        assert!(msg.contains("sample frequency"));
        assert!(msg.contains("record 3"));
        assert!(msg.contains("32001"));
    }
}
