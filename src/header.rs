//! Reading and parsing the 16 kB text header that opens every recording.

use std::fmt;
use std::io::Read;

use chrono::{NaiveDate, NaiveDateTime};
use log::debug;

use crate::error::{NlxError, Result};
use crate::layout::HEADER_SIZE;

const COMMENT_MARKER: char = '#';
const FIELD_MARKER: char = '-';

/// Key holding the ADC-count to volt conversion factor.
pub const AD_BIT_VOLTS_KEY: &str = "ADBitVolts";

/// A header value, typed opportunistically from its text.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Integer(i64),
    Float(f64),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl HeaderValue {
    /// Types `text` as an integer, then a float, then a time string, falling
    /// back to plain text.
    pub fn from_text(text: &str) -> Self {
        if let Ok(i) = text.parse::<i64>() {
            return HeaderValue::Integer(i);
        }
        if let Ok(f) = text.parse::<f64>() {
            return HeaderValue::Float(f);
        }
        if let Ok(ts) = parse_time_string(text) {
            return HeaderValue::Timestamp(ts);
        }
        HeaderValue::Text(text.to_string())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Integer(i) => Some(*i as f64),
            HeaderValue::Float(f) => Some(*f),
            HeaderValue::Timestamp(_) | HeaderValue::Text(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HeaderValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            HeaderValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::Integer(i) => write!(f, "{i}"),
            HeaderValue::Float(v) => write!(f, "{v}"),
            HeaderValue::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
            HeaderValue::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Metadata parsed from a header, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedHeader {
    entries: Vec<(String, HeaderValue)>,
    comments: Vec<String>,
}

impl ParsedHeader {
    /// Looks up a key. If a key appears more than once the last value wins.
    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Comment lines with the leading markers stripped.
    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    /// The ADC-count to volt factor. Multi-electrode headers list one factor
    /// per electrode; the first is returned.
    pub fn ad_bit_volts(&self) -> Option<f64> {
        match self.get(AD_BIT_VOLTS_KEY)? {
            HeaderValue::Text(s) => s.split_whitespace().next()?.parse().ok(),
            other => other.as_f64(),
        }
    }

    /// Original acquisition path from the `## File Name` comment.
    pub fn file_name(&self) -> Option<&str> {
        self.comment_value("File Name")
    }

    pub fn time_opened(&self) -> Option<NaiveDateTime> {
        self.get("TimeCreated")
            .and_then(HeaderValue::as_timestamp)
            .or_else(|| parse_time_string(self.comment_value("Time Opened")?).ok())
    }

    pub fn time_closed(&self) -> Option<NaiveDateTime> {
        self.get("TimeClosed")
            .and_then(HeaderValue::as_timestamp)
            .or_else(|| parse_time_string(self.comment_value("Time Closed")?).ok())
    }

    fn comment_value(&self, prefix: &str) -> Option<&str> {
        self.comments
            .iter()
            .find_map(|c| c.strip_prefix(prefix))
            .map(str::trim)
    }
}

/// Reads exactly [`HEADER_SIZE`] bytes from the current position.
pub fn read_header<R: Read>(source: &mut R) -> Result<Vec<u8>> {
    let mut raw = Vec::with_capacity(HEADER_SIZE);
    source.take(HEADER_SIZE as u64).read_to_end(&mut raw)?;

    if raw.len() < HEADER_SIZE {
        return Err(NlxError::TruncatedFile {
            offset: 0,
            needed: HEADER_SIZE as u64,
            available: raw.len() as u64,
        });
    }

    Ok(raw)
}

/// Parses raw header bytes into typed metadata.
///
/// Never fails: lines that are neither comments nor `-KEY value` fields are
/// dropped.
pub fn parse_header(raw: &[u8]) -> ParsedHeader {
    let end = raw
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |last| last + 1);
    let text = decode_latin1(&raw[..end]);

    let mut header = ParsedHeader::default();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with(COMMENT_MARKER) {
            let comment = line.trim_start_matches(COMMENT_MARKER).trim();
            if !comment.is_empty() {
                header.comments.push(comment.to_string());
            }
        } else if let Some(field) = line.strip_prefix(FIELD_MARKER) {
            let (key, value) = match field.split_once(char::is_whitespace) {
                Some((key, value)) => (key, value.trim()),
                None => (field, ""),
            };
            if key.is_empty() {
                debug!("Dropping header line without key: {line:?}");
                continue;
            }
            header
                .entries
                .push((key.to_string(), HeaderValue::from_text(value)));
        } else {
            debug!("Dropping unrecognised header line: {line:?}");
        }
    }

    header
}

/// Decodes Latin-1 text. Every byte maps to one char, so this never fails.
pub(crate) fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Parses one of the platform's header time strings.
///
/// Two layouts are recognised: `2017/04/13 14:34:34` as written in
/// `-TimeCreated`/`-TimeClosed` fields, and the older comment layout
/// `(m/d/y): 2/16/2016  (h:m:s.ms) 13:56:14.656`.
pub fn parse_time_string(s: &str) -> Result<NaiveDateTime> {
    let malformed = || NlxError::MalformedTimestamp {
        input: s.to_string(),
    };
    let trimmed = s.trim();

    for format in ["%Y/%m/%d %H:%M:%S%.f", "%Y/%m/%d %H:%M:%S"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(ts);
        }
    }

    let mut date = None;
    let mut time = None;
    let mut tokens = trimmed.split_whitespace();
    while let Some(token) = tokens.next() {
        match token {
            "(m/d/y):" => date = tokens.next(),
            "(h:m:s.ms)" => time = tokens.next(),
            _ => {}
        }
    }
    let (date, time) = date.zip(time).ok_or_else(malformed)?;

    let mdy = parse_fields(date, '/').ok_or_else(malformed)?;
    let hms = parse_fields(&time.replace('.', ":"), ':').ok_or_else(malformed)?;
    let (&[month, day, year], &[hour, minute, second, milli]) = (&mdy[..], &hms[..]) else {
        return Err(malformed());
    };

    NaiveDate::from_ymd_opt(year as i32, month, day)
        .and_then(|d| d.and_hms_micro_opt(hour, minute, second, milli * 1000))
        .ok_or_else(malformed)
}

fn parse_fields(s: &str, sep: char) -> Option<Vec<u32>> {
    s.split(sep).map(|part| part.parse().ok()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad(text: &str) -> Vec<u8> {
        let mut raw = text.as_bytes().to_vec();
        raw.resize(HEADER_SIZE, 0);
        raw
    }

    const SAMPLE: &str = "######## Neuralynx Data File Header\r\n\
        ## File Name C:\\CheetahData\\2016-06-14_09-39-10\\LFP1.ncs\r\n\
        ## Time Opened (m/d/y): 6/14/2016  (h:m:s.ms) 9:39:10.656\r\n\
        ## Time Closed (m/d/y): 6/14/2016  (h:m:s.ms) 10:41:02.120\r\n\
        \r\n\
        -CheetahRev 5.6.3\r\n\
        -AcqEntName LFP1\r\n\
        -RecordSize 1044\r\n\
        -SamplingFrequency 32000\r\n\
        -ADBitVolts 0.000000030518\r\n\
        -InputRange 1000\r\n\
        -InputInverted True\r\n\
        -TimeCreated 2016/06/14 09:39:10\r\n\
        -ReferenceChannel \"Source 01 Reference 2\"\r\n\
        -DspFilterDelay_us\r\n\
        stray text without marker\r\n\
        -\r\n";

    #[test]
    fn read_header_requires_full_block() {
        let raw = vec![b'#'; 1000];
        let err = read_header(&mut raw.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            NlxError::TruncatedFile {
                needed: 16384,
                available: 1000,
                ..
            }
        ));

        let raw = pad("-Key 1");
        let mut extended = raw.clone();
        extended.extend_from_slice(&[1, 2, 3]);
        let mut cursor = extended.as_slice();
        let header = read_header(&mut cursor).unwrap();
        assert_eq!(header, raw);
        assert_eq!(cursor, &[1, 2, 3]);
    }

    #[test]
    fn fields_are_typed() {
        let header = parse_header(&pad(SAMPLE));

        assert_eq!(header.get("RecordSize"), Some(&HeaderValue::Integer(1044)));
        assert_eq!(
            header.get("SamplingFrequency").and_then(HeaderValue::as_f64),
            Some(32000.0)
        );
        assert_eq!(header.ad_bit_volts(), Some(0.000000030518));
        assert_eq!(
            header.get("CheetahRev"),
            Some(&HeaderValue::Text("5.6.3".into()))
        );
        assert_eq!(
            header.get("ReferenceChannel").and_then(HeaderValue::as_str),
            Some("\"Source 01 Reference 2\"")
        );
        assert_eq!(
            header.get("DspFilterDelay_us"),
            Some(&HeaderValue::Text(String::new()))
        );

        let created = header.get("TimeCreated").and_then(HeaderValue::as_timestamp);
        assert_eq!(
            created,
            NaiveDate::from_ymd_opt(2016, 6, 14).and_then(|d| d.and_hms_opt(9, 39, 10))
        );
    }

    #[test]
    fn comments_and_stray_lines_stay_out_of_the_map() {
        let header = parse_header(&pad(SAMPLE));

        assert_eq!(header.len(), 10);
        assert!(!header.contains_key("stray"));
        assert!(header.entries().all(|(k, _)| !k.starts_with('#')));
        assert_eq!(
            header.file_name(),
            Some("C:\\CheetahData\\2016-06-14_09-39-10\\LFP1.ncs")
        );
        assert_eq!(header.comments()[0], "Neuralynx Data File Header");
    }

    #[test]
    fn open_and_close_times() {
        let header = parse_header(&pad(SAMPLE));
        // -TimeCreated takes precedence over the comment
        assert_eq!(
            header.time_opened(),
            NaiveDate::from_ymd_opt(2016, 6, 14).and_then(|d| d.and_hms_opt(9, 39, 10))
        );
        assert_eq!(
            header.time_closed(),
            NaiveDate::from_ymd_opt(2016, 6, 14)
                .and_then(|d| d.and_hms_micro_opt(10, 41, 2, 120_000))
        );
    }

    #[test]
    fn empty_header_parses_to_nothing() {
        let header = parse_header(&vec![0u8; HEADER_SIZE]);
        assert!(header.is_empty());
        assert!(header.comments().is_empty());
        assert_eq!(header.ad_bit_volts(), None);
    }

    #[test]
    fn multi_electrode_scale_factor_uses_first_value() {
        let header = parse_header(&pad("-ADBitVolts 0.000000015 0.000000016 0.000000017\n"));
        assert_eq!(header.ad_bit_volts(), Some(0.000000015));
    }

    #[test]
    fn time_string_layouts() {
        assert_eq!(
            parse_time_string("(m/d/y): 2/16/2016  (h:m:s.ms) 13:56:14.656").unwrap(),
            NaiveDate::from_ymd_opt(2016, 2, 16)
                .and_then(|d| d.and_hms_micro_opt(13, 56, 14, 656_000))
                .unwrap()
        );
        assert_eq!(
            parse_time_string("2017/04/13 14:34:34").unwrap(),
            NaiveDate::from_ymd_opt(2017, 4, 13)
                .and_then(|d| d.and_hms_opt(14, 34, 34))
                .unwrap()
        );
    }

    #[test]
    fn malformed_time_strings() {
        for input in ["", "yesterday", "(m/d/y): 13/45/2016 (h:m:s.ms) 1:2:3.4", "(m/d/y): 2/16/2016"] {
            assert!(
                matches!(parse_time_string(input), Err(NlxError::MalformedTimestamp { .. })),
                "{input:?} should not parse"
            );
        }
    }
}
