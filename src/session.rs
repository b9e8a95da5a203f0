//! One recording session: an event file plus the continuous channels
//! labelled against it.

use std::ops::Range;
use std::path::Path;

use crate::error::Result;
use crate::exposure::{split_marker, Marker};
use crate::header::ParsedHeader;
use crate::reader;
use crate::types::{Channel, Event, EventFile, LoadOptions};

/// Event stream of a session, loaded once and shared by its channels.
///
/// # Examples
///
/// ```no_run
/// use nlx_importer::Session;
///
/// let session = Session::open("data/2016-06-14_09-39-10/Events.nev").unwrap();
/// let lfp = session.load_channel("data/2016-06-14_09-39-10/LFP1.ncs").unwrap();
///
/// for exposure in session.exposures() {
///     if let Some(window) = session.exposure_window(&lfp, &exposure) {
///         println!("{exposure}: samples {window:?}");
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Session {
    event_file: EventFile,
    events: Vec<Event>,
    options: LoadOptions,
}

impl Session {
    pub fn open<P: AsRef<Path>>(events_path: P) -> Result<Self> {
        Self::open_with(events_path, LoadOptions::default())
    }

    pub fn open_with<P: AsRef<Path>>(events_path: P, options: LoadOptions) -> Result<Self> {
        let event_file = reader::load_event_file(events_path)?;
        Ok(Self::from_event_file(event_file, options))
    }

    pub fn from_event_file(event_file: EventFile, options: LoadOptions) -> Self {
        let events = event_file.events();
        Session {
            event_file,
            events,
            options,
        }
    }

    /// Header of the event file.
    pub fn header(&self) -> &ParsedHeader {
        &self.event_file.header
    }

    pub fn event_file(&self) -> &EventFile {
        &self.event_file
    }

    /// Events in file order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Loads a continuous channel and labels its samples with this
    /// session's exposures.
    pub fn load_channel<P: AsRef<Path>>(&self, path: P) -> Result<Channel> {
        let channel = reader::load_continuous_file(path, &self.options)?;
        Ok(channel.with_exposures(&self.events))
    }

    /// Loads several channels. Each file is independent, so one failing
    /// file does not affect the others.
    pub fn load_channels<I, P>(&self, paths: I) -> Vec<Result<Channel>>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        paths.into_iter().map(|p| self.load_channel(p)).collect()
    }

    /// Names of exposures with a start marker, in order of first appearance.
    pub fn exposures(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for event in &self.events {
            let (stem, marker) = split_marker(&event.label);
            if marker == Marker::Start && !names.iter().any(|n| n == stem) {
                names.push(stem.to_string());
            }
        }
        names
    }

    /// Sample range of `channel` covered by an exposure: from the first
    /// sample after its first start event to the first sample not before
    /// its first end event.
    pub fn exposure_window(&self, channel: &Channel, exposure: &str) -> Option<Range<usize>> {
        let start = self.first_event(&format!("{exposure}s"))?;
        let end = self.first_event(&format!("{exposure}e"))?;
        Some(channel.window(start.timestamp, end.timestamp))
    }

    fn first_event(&self, label: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.label == label)
    }
}
