use byteorder::{LittleEndian, ReadBytesExt};
use log::{debug, info, warn};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::Instant;

use crate::error::{NlxError, Result};
use crate::header::{decode_latin1, parse_header, read_header, ParsedHeader};
use crate::layout::{
    FileKind, RecordCount, RecordLayout, HEADER_SIZE, NCS_SAMPLES_PER_RECORD,
    NEV_EVENT_STRING_LEN, NEV_EXTRA_VALUES,
};
use crate::timebase;
use crate::types::*;
use crate::validate::validate_continuous;

const READ_BUFFER_SIZE: usize = 65536;

/// A record type that can be decoded from one fixed-size chunk.
pub trait DecodeRecord: Sized {
    const KIND: FileKind;

    /// Decodes one record from exactly `layout().record_size` bytes.
    fn decode(chunk: &[u8]) -> Result<Self>;

    fn layout() -> RecordLayout {
        Self::KIND.layout()
    }
}

impl DecodeRecord for ContinuousRecord {
    const KIND: FileKind = FileKind::Continuous;

    fn decode(mut chunk: &[u8]) -> Result<Self> {
        let timestamp = chunk.read_u64::<LittleEndian>()?;
        let channel_number = chunk.read_u32::<LittleEndian>()?;
        let sample_freq = chunk.read_u32::<LittleEndian>()?;
        let num_valid_samples = chunk.read_u32::<LittleEndian>()?;

        let mut samples = [0i16; NCS_SAMPLES_PER_RECORD];
        chunk.read_i16_into::<LittleEndian>(&mut samples)?;

        Ok(ContinuousRecord {
            timestamp,
            channel_number,
            sample_freq,
            num_valid_samples,
            samples,
        })
    }
}

impl DecodeRecord for EventRecord {
    const KIND: FileKind = FileKind::Event;

    fn decode(mut chunk: &[u8]) -> Result<Self> {
        let stx = chunk.read_i16::<LittleEndian>()?;
        let pkt_id = chunk.read_i16::<LittleEndian>()?;
        let pkt_data_size = chunk.read_i16::<LittleEndian>()?;
        let timestamp = chunk.read_u64::<LittleEndian>()?;
        let event_id = chunk.read_i16::<LittleEndian>()?;
        let ttl = chunk.read_i16::<LittleEndian>()?;
        let crc = chunk.read_i16::<LittleEndian>()?;
        let dummy1 = chunk.read_i16::<LittleEndian>()?;
        let dummy2 = chunk.read_i16::<LittleEndian>()?;

        let mut extra = [0i32; NEV_EXTRA_VALUES];
        chunk.read_i32_into::<LittleEndian>(&mut extra)?;

        let mut string_bytes = [0u8; NEV_EVENT_STRING_LEN];
        chunk.read_exact(&mut string_bytes)?;

        Ok(EventRecord {
            stx,
            pkt_id,
            pkt_data_size,
            timestamp,
            event_id,
            ttl,
            crc,
            dummy1,
            dummy2,
            extra,
            event_string: read_fixed_string(&string_bytes),
        })
    }
}

/// Helper function to read a NUL-terminated fixed-width Latin-1 string
fn read_fixed_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    decode_latin1(&bytes[..end])
}

/// Records decoded from a file body, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBatch<T> {
    pub records: Vec<T>,
    /// Bytes of a trailing fragment shorter than one record, never decoded
    pub partial_bytes: u64,
}

/// Reads every whole record following the header.
///
/// Positions the source at the end of the header, decodes successive
/// fixed-size chunks and stops at end of stream. A final chunk shorter than
/// one record is dropped and counted in [`RecordBatch::partial_bytes`].
pub fn read_records<T: DecodeRecord, R: Read + Seek>(source: &mut R) -> Result<RecordBatch<T>> {
    let layout = T::layout();
    source.seek(SeekFrom::Start(layout.header_size as u64))?;

    let mut records = Vec::new();
    let mut chunk = vec![0u8; layout.record_size];

    loop {
        let filled = fill_chunk(source, &mut chunk)?;
        if filled == chunk.len() {
            records.push(T::decode(&chunk)?);
            continue;
        }

        if filled > 0 {
            warn!(
                "Dropping {} trailing bytes after record {} (byte offset {})",
                filled,
                records.len(),
                layout.record_offset(records.len())
            );
        }

        return Ok(RecordBatch {
            records,
            partial_bytes: filled as u64,
        });
    }
}

/// Helper function to fill `chunk`, returning fewer bytes only at end of stream
fn fill_chunk<R: Read>(source: &mut R, chunk: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < chunk.len() {
        match source.read(&mut chunk[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Header and record count of any recording, without decoding records.
#[derive(Debug, Clone)]
pub struct FileSummary {
    pub kind: FileKind,
    pub header: ParsedHeader,
    pub file_size: u64,
    pub record_count: RecordCount,
}

/// Reads the header of any supported file and estimates its record count.
pub fn inspect<P: AsRef<Path>>(path: P) -> Result<FileSummary> {
    let path = path.as_ref();
    inspect_file(path).map_err(|e| e.in_file(path))
}

fn inspect_file(path: &Path) -> Result<FileSummary> {
    let kind = FileKind::from_path(path)?;
    let file = File::open(path)?;
    let file_size = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let header = parse_header(&read_header(&mut reader)?);
    let record_count = kind.layout().estimate_record_count(file_size)?;

    debug!(
        "{}: {} file, {} records, {} trailing bytes",
        path.display(),
        kind,
        record_count.records,
        record_count.partial_bytes
    );

    Ok(FileSummary {
        kind,
        header,
        file_size,
        record_count,
    })
}

/// Loads a Neuralynx `.ncs` file and returns its channel.
///
/// This function reads the header, decodes every record, validates the
/// record sequence, expands the per-sample timebase and scales the samples
/// to physical units. The file handle is released before returning.
///
/// # Arguments
///
/// * `file_path` - Path to the NCS file to load
/// * `options` - Output unit and gap tolerance
///
/// # Returns
///
/// A `Result` containing either the loaded `Channel` or an error naming the
/// file.
pub fn load_continuous_file<P: AsRef<Path>>(file_path: P, options: &LoadOptions) -> Result<Channel> {
    let path = file_path.as_ref();
    read_continuous(path, options).map_err(|e| e.in_file(path))
}

fn read_continuous(path: &Path, options: &LoadOptions) -> Result<Channel> {
    let tic = Instant::now();

    let kind = resolve_kind(path, FileKind::Continuous)?;
    let (header, batch, count) = read_file::<ContinuousRecord>(path, kind)?;

    if batch.records.is_empty() {
        return Err(NlxError::EmptyRecording { kind });
    }
    warn_on_count_mismatch(&batch, count);

    let validation = validate_continuous(&batch.records, options.gap_tolerance_us)?;

    let timebase::Timebase {
        samples,
        timestamps,
    } = timebase::expand(&batch.records);
    let (signal, units) = timebase::scale(&samples, &header, options.unit);

    info!(
        "Loaded {} samples from {} (channel {}, {} Hz, {}) in {:.1} seconds",
        signal.len(),
        path.display(),
        validation.channel_number,
        validation.sample_freq,
        units,
        tic.elapsed().as_secs_f64()
    );

    Ok(Channel {
        path: path.to_path_buf(),
        header,
        records: batch.records,
        validation,
        sample_timestamps: timestamps,
        signal,
        units,
        exposures: None,
    })
}

/// Loads a Neuralynx `.nev` event file.
pub fn load_event_file<P: AsRef<Path>>(file_path: P) -> Result<EventFile> {
    let path = file_path.as_ref();
    read_events(path).map_err(|e| e.in_file(path))
}

fn read_events(path: &Path) -> Result<EventFile> {
    let kind = resolve_kind(path, FileKind::Event)?;
    let (header, batch, count) = read_file::<EventRecord>(path, kind)?;
    warn_on_count_mismatch(&batch, count);

    info!("Loaded {} events from {}", batch.records.len(), path.display());

    Ok(EventFile {
        path: path.to_path_buf(),
        header,
        records: batch.records,
        partial_bytes: batch.partial_bytes,
    })
}

/// Helper function to check the file extension against the expected kind
fn resolve_kind(path: &Path, expected: FileKind) -> Result<FileKind> {
    let kind = FileKind::from_path(path)?;
    if kind.is_spike() {
        return Err(NlxError::SpikeDecodingUnsupported { kind });
    }
    if kind != expected {
        return Err(NlxError::UnsupportedFormat {
            tag: kind.tag().to_string(),
        });
    }
    Ok(kind)
}

/// Helper function to read header and records, closing the file on return
fn read_file<T: DecodeRecord>(
    path: &Path,
    kind: FileKind,
) -> Result<(ParsedHeader, RecordBatch<T>, RecordCount)> {
    let file = File::open(path)?;
    let file_size = file.metadata()?.len();
    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

    let header = parse_header(&read_header(&mut reader)?);
    let count = kind.layout().estimate_record_count(file_size)?;
    debug!(
        "Reading {} whole {} records of {} bytes after a {} byte header",
        count.records,
        kind,
        kind.layout().record_size,
        HEADER_SIZE
    );

    let batch = read_records::<T, _>(&mut reader)?;
    Ok((header, batch, count))
}

// Helper function to flag a decoded count that disagrees with the file size
fn warn_on_count_mismatch<T>(batch: &RecordBatch<T>, count: RecordCount) {
    if batch.records.len() as u64 != count.records {
        warn!(
            "Decoded {} records but file size implies {}",
            batch.records.len(),
            count.records
        );
    }
}
