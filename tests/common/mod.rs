#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};
use std::fs;
use std::path::{Path, PathBuf};

pub const HEADER_SIZE: usize = 16384;
pub const SAMPLES: usize = 512;

pub const AD_BIT_VOLTS: f64 = 0.000000030518;

pub fn header(lines: &[&str]) -> Vec<u8> {
    let mut text = String::from("######## Neuralynx Data File Header\r\n");
    for line in lines {
        text.push_str(line);
        text.push_str("\r\n");
    }
    let mut raw = text.into_bytes();
    raw.resize(HEADER_SIZE, 0);
    raw
}

#[derive(Debug, Clone)]
pub struct NcsRecord {
    pub timestamp: u64,
    pub channel: u32,
    pub freq: u32,
    pub valid: u32,
    pub samples: Vec<i16>,
}

impl NcsRecord {
    pub fn write(&self, out: &mut Vec<u8>) {
        out.write_u64::<LittleEndian>(self.timestamp).unwrap();
        out.write_u32::<LittleEndian>(self.channel).unwrap();
        out.write_u32::<LittleEndian>(self.freq).unwrap();
        out.write_u32::<LittleEndian>(self.valid).unwrap();
        for &s in &self.samples {
            out.write_i16::<LittleEndian>(s).unwrap();
        }
    }
}

/// `n` contiguous full records at 32 kHz starting at `start`, sample values
/// counting up from zero.
pub fn ncs_records(n: usize, start: u64) -> Vec<NcsRecord> {
    (0..n)
        .map(|i| NcsRecord {
            timestamp: start + i as u64 * 16_000,
            channel: 1,
            freq: 32_000,
            valid: SAMPLES as u32,
            samples: (0..SAMPLES).map(|j| ((i * SAMPLES + j) % 2000) as i16 - 1000).collect(),
        })
        .collect()
}

pub fn write_ncs(path: &Path, header_lines: &[&str], records: &[NcsRecord], trailing: usize) {
    let mut data = header(header_lines);
    for record in records {
        record.write(&mut data);
    }
    data.extend(std::iter::repeat(0x5A).take(trailing));
    fs::write(path, data).unwrap();
}

pub fn write_nev(path: &Path, events: &[(u64, &str)]) {
    let mut data = header(&["-FileType Event", "-RecordSize 184"]);
    for (i, &(timestamp, label)) in events.iter().enumerate() {
        data.write_i16::<LittleEndian>(0).unwrap();
        data.write_i16::<LittleEndian>(4098).unwrap();
        data.write_i16::<LittleEndian>(2).unwrap();
        data.write_u64::<LittleEndian>(timestamp).unwrap();
        data.write_i16::<LittleEndian>(i as i16).unwrap();
        for _ in 0..4 {
            data.write_i16::<LittleEndian>(0).unwrap();
        }
        for _ in 0..8 {
            data.write_i32::<LittleEndian>(0).unwrap();
        }
        let mut text = [0u8; 128];
        text[..label.len()].copy_from_slice(label.as_bytes());
        data.extend_from_slice(&text);
    }
    fs::write(path, data).unwrap();
}

pub fn path_in(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}
