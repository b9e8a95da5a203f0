mod error;
pub mod exposure;
pub mod header;
pub mod layout;
mod reader;
mod session;
pub mod timebase;
pub mod types;
pub mod validate;

use std::path::Path;

// Re-export types
pub use error::{DriftField, NlxError, Result};
pub use exposure::{ExposureLabels, ExposureStack};
pub use header::{HeaderValue, ParsedHeader};
pub use layout::{estimate_record_count, FileKind, RecordCount, RecordLayout};
pub use reader::{inspect, read_records, DecodeRecord, FileSummary, RecordBatch};
pub use session::Session;
pub use timebase::{Signal, SignalUnit, Units};
pub use types::*;
pub use validate::{Gap, ValidationReport};

/// Loads an NCS continuous file as a `Channel`, scaled to microvolts
///
/// # Examples
///
/// ```no_run
/// use nlx_importer::load_continuous;
///
/// let result = load_continuous("path/to/your/LFP1.ncs");
/// match result {
///     Ok(channel) => println!("Sample rate: {} Hz", channel.sampling_rate()),
///     Err(e) => println!("Error loading file: {}", e),
/// }
/// ```
pub fn load_continuous<P: AsRef<Path>>(file_path: P) -> Result<Channel> {
    reader::load_continuous_file(file_path, &LoadOptions::default())
}

/// Loads an NCS continuous file with explicit options
pub fn load_continuous_with<P: AsRef<Path>>(file_path: P, options: &LoadOptions) -> Result<Channel> {
    reader::load_continuous_file(file_path, options)
}

/// Loads an NEV event file
///
/// # Examples
///
/// ```no_run
/// use nlx_importer::load_events;
///
/// let events = load_events("path/to/Events.nev").unwrap();
/// for event in events.events() {
///     println!("{} {}", event.timestamp, event.label);
/// }
/// ```
pub fn load_events<P: AsRef<Path>>(file_path: P) -> Result<EventFile> {
    reader::load_event_file(file_path)
}
