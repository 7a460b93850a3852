// Internal utilities for documentation tests and integration tests.
// Builds EDF+ and RAW byte images in memory so tests need no sample files.

use std::fs;
use std::path::Path;

use crate::Result;

/// One signal of an [`EdfFixture`].
#[derive(Debug, Clone)]
pub struct FixtureSignal {
    pub label: String,
    pub transducer: String,
    pub physical_dimension: String,
    pub physical_min: f64,
    pub physical_max: f64,
    pub digital_min: i32,
    pub digital_max: i32,
    pub prefilter: String,
    pub samples_per_record: usize,
}

/// In-memory EDF+ file description.
///
/// Each entry of `records` is one interleaved data record: all samples of
/// channel 0, then all samples of channel 1, and so on.
#[derive(Debug, Clone)]
pub struct EdfFixture {
    pub patient_id: String,
    pub recording_id: String,
    pub start_date: String,
    pub start_time: String,
    /// Overrides the declared header length; defaults to `(n + 1) * 256`
    pub header_bytes: Option<usize>,
    pub reserved: String,
    pub datarecords: i64,
    pub record_duration: String,
    pub signals: Vec<FixtureSignal>,
    pub records: Vec<Vec<i16>>,
}

impl EdfFixture {
    pub fn new(samples_per_record: &[usize]) -> Self {
        let signals = samples_per_record
            .iter()
            .enumerate()
            .map(|(i, &n)| FixtureSignal {
                label: format!("EEG {}", i + 1),
                transducer: "AgAgCl electrodes".to_string(),
                physical_dimension: "uV".to_string(),
                physical_min: -200.0,
                physical_max: 200.0,
                digital_min: -32768,
                digital_max: 32767,
                prefilter: "HP:0.1Hz LP:70Hz".to_string(),
                samples_per_record: n,
            })
            .collect();

        EdfFixture {
            patient_id: "P001 M 01-JAN-1990 Test_Patient".to_string(),
            recording_id: "Startdate 02-MAR-2002 ADM01 Tech Device".to_string(),
            start_date: "02.03.02".to_string(),
            start_time: "14.15.16".to_string(),
            header_bytes: None,
            reserved: "EDF+C".to_string(),
            datarecords: 0,
            record_duration: "1".to_string(),
            signals,
            records: Vec::new(),
        }
    }

    /// Sets the data records and declares their count in the header.
    pub fn with_records(mut self, records: Vec<Vec<i16>>) -> Self {
        self.datarecords = records.len() as i64;
        self.records = records;
        self
    }

    pub fn with_datarecords(mut self, datarecords: i64) -> Self {
        self.datarecords = datarecords;
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let n = self.signals.len();
        let header_bytes = self.header_bytes.unwrap_or((n + 1) * 256);

        let mut out = Vec::with_capacity((n + 1) * 256);

        // 主头部 (256字节)
        put_field(&mut out, "0", 8);
        put_field(&mut out, &self.patient_id, 80);
        put_field(&mut out, &self.recording_id, 80);
        put_field(&mut out, &self.start_date, 8);
        put_field(&mut out, &self.start_time, 8);
        put_field(&mut out, &header_bytes.to_string(), 8);
        put_field(&mut out, &self.reserved, 44);
        put_field(&mut out, &self.datarecords.to_string(), 8);
        put_field(&mut out, &self.record_duration, 8);
        put_field(&mut out, &n.to_string(), 4);

        // 信号头部，每个字段所有信号一起写
        for s in &self.signals {
            put_field(&mut out, &s.label, 16);
        }
        for s in &self.signals {
            put_field(&mut out, &s.transducer, 80);
        }
        for s in &self.signals {
            put_field(&mut out, &s.physical_dimension, 8);
        }
        for s in &self.signals {
            put_field(&mut out, &s.physical_min.to_string(), 8);
        }
        for s in &self.signals {
            put_field(&mut out, &s.physical_max.to_string(), 8);
        }
        for s in &self.signals {
            put_field(&mut out, &s.digital_min.to_string(), 8);
        }
        for s in &self.signals {
            put_field(&mut out, &s.digital_max.to_string(), 8);
        }
        for s in &self.signals {
            put_field(&mut out, &s.prefilter, 80);
        }
        for s in &self.signals {
            put_field(&mut out, &s.samples_per_record.to_string(), 8);
        }
        for _ in &self.signals {
            put_field(&mut out, "", 32);
        }

        for record in &self.records {
            for sample in record {
                out.extend_from_slice(&sample.to_le_bytes());
            }
        }

        out
    }

    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_bytes())?;
        Ok(())
    }
}

/// 左对齐并用空格填充到固定宽度
fn put_field(out: &mut Vec<u8>, value: &str, width: usize) {
    let mut field = vec![b' '; width];
    let bytes = value.as_bytes();
    let len = bytes.len().min(width);
    field[..len].copy_from_slice(&bytes[..len]);
    out.extend_from_slice(&field);
}

/// In-memory RAW file description.
///
/// Each entry of `records` holds `channel_count` channel values followed by
/// one flag per event code; values are written in the representation of
/// `version` (2 = i16, 4 = f32, 6 = f64, anything else writes i16).
#[derive(Debug, Clone)]
pub struct RawFixture {
    pub version: i32,
    pub sample_rate: i16,
    pub channel_count: i16,
    pub sample_count: i32,
    pub codes: Vec<[u8; 4]>,
    pub records: Vec<Vec<f64>>,
}

impl RawFixture {
    /// Codes longer than 4 bytes are cut, shorter ones padded with spaces.
    pub fn new(version: i32, channel_count: i16, codes: &[&str]) -> Self {
        let codes = codes
            .iter()
            .map(|code| {
                let mut bytes = [b' '; 4];
                let len = code.len().min(4);
                bytes[..len].copy_from_slice(&code.as_bytes()[..len]);
                bytes
            })
            .collect();

        RawFixture {
            version,
            sample_rate: 500,
            channel_count,
            sample_count: 0,
            codes,
            records: Vec::new(),
        }
    }

    /// Sets the records and declares their count as the header's sample count.
    pub fn with_records(mut self, records: Vec<Vec<f64>>) -> Self {
        self.sample_count = records.len() as i32;
        self.records = records;
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();

        out.extend_from_slice(&self.version.to_be_bytes());
        // 2020-05-17 13:45:30
        for field in [2020i16, 5, 17, 13, 45, 30] {
            out.extend_from_slice(&field.to_be_bytes());
        }
        out.extend_from_slice(&250i32.to_be_bytes());
        for field in [self.sample_rate, self.channel_count, 1, 12, 1] {
            out.extend_from_slice(&field.to_be_bytes());
        }
        out.extend_from_slice(&self.sample_count.to_be_bytes());
        out.extend_from_slice(&(self.codes.len() as i16).to_be_bytes());

        for code in &self.codes {
            out.extend_from_slice(code);
        }

        for record in &self.records {
            for &value in record {
                match self.version {
                    4 => out.extend_from_slice(&(value as f32).to_be_bytes()),
                    6 => out.extend_from_slice(&value.to_be_bytes()),
                    _ => out.extend_from_slice(&(value as i16).to_be_bytes()),
                }
            }
        }

        out
    }

    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_bytes())?;
        Ok(())
    }
}

/// Creates a small two-channel EDF+ file for documentation examples
pub fn create_simple_edf_file<P: AsRef<Path>>(path: P) -> Result<()> {
    let records: Vec<Vec<i16>> = (0..3i16)
        .map(|r| (0..8i16).map(|i| r * 100 + i).collect())
        .collect();
    EdfFixture::new(&[4, 4]).with_records(records).write_to(path)
}

/// Creates a small float32 RAW file with two event codes for documentation examples
pub fn create_simple_raw_file<P: AsRef<Path>>(path: P) -> Result<()> {
    let records: Vec<Vec<f64>> = (0..10)
        .map(|i| {
            let t = i as f64 / 500.0;
            let stim = if i == 3 { 1.0 } else { 0.0 };
            let resp = if i == 7 { 1.0 } else { 0.0 };
            vec![(t * 10.0).sin(), (t * 10.0).cos(), stim, resp]
        })
        .collect();
    RawFixture::new(4, 2, &["STIM", "RESP"]).with_records(records).write_to(path)
}
