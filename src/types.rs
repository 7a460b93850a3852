use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{DecodeError, Result};

/// Decoded 256-byte EDF+ main header.
///
/// Text fields are trimmed 7-bit ASCII; numeric fields have already been
/// parsed strictly. Immutable once decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct EdfHeader {
    pub version: String,
    pub patient_id: String,
    pub recording_id: String,
    /// 原始 "dd.mm.yy" 字段
    pub start_date: String,
    /// 原始 "hh.mm.ss" 字段
    pub start_time: String,
    /// Declared total header length in bytes (`nbyte`)
    pub header_bytes: u64,
    pub reserved: String,
    /// Declared number of data records, `-1` when unknown
    pub datarecords: i64,
    /// Duration of one data record in seconds
    pub record_duration: f64,
    pub signal_count: usize,
}

/// EDF+ patient identification sub-fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientInfo {
    pub code: String,
    pub sex: String,
    pub birthdate: String,
    pub name: String,
    pub additional: String,
}

/// EDF+ recording identification sub-fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingInfo {
    pub start_date: String,
    pub admin_code: String,
    pub technician: String,
    pub equipment: String,
    pub additional: String,
}

impl EdfHeader {
    /// Number of data records, or `None` when the header declares `-1`.
    pub fn declared_records(&self) -> Option<u64> {
        u64::try_from(self.datarecords).ok()
    }

    pub fn is_discontinuous(&self) -> bool {
        self.reserved.starts_with("EDF+D")
    }

    /// Total recording length (`record_duration × datarecords`).
    pub fn total_duration(&self) -> Option<Duration> {
        let records = self.declared_records()?;
        let micros = (self.record_duration * records as f64 * 1_000_000.0).round();
        Some(Duration::microseconds(micros as i64))
    }

    /// Total recording length as `(hours, minutes, seconds)`.
    pub fn hms(&self) -> Option<(u64, u64, f64)> {
        let records = self.declared_records()?;
        let total = self.record_duration * records as f64;
        let whole_minutes = (total / 60.0).floor();
        let seconds = total - whole_minutes * 60.0;
        let hours = (whole_minutes / 60.0).floor();
        let minutes = whole_minutes - hours * 60.0;
        Some((hours as u64, minutes as u64, seconds))
    }

    /// Parses the start date and time fields.
    ///
    /// Two-digit years above 84 map to 19yy, the rest to 20yy.
    pub fn start_datetime(&self) -> Option<NaiveDateTime> {
        let [day, month, yy] = split_dotted(&self.start_date)?;
        let year = if yy > 84 { 1900 + yy } else { 2000 + yy };
        let date = NaiveDate::from_ymd_opt(year as i32, month, day)?;

        let [hour, minute, second] = split_dotted(&self.start_time)?;
        let time = NaiveTime::from_hms_opt(hour, minute, second)?;

        Some(NaiveDateTime::new(date, time))
    }

    /// EDF+ 患者字段格式: "patientcode sex birthdate patientname additional"
    pub fn patient_info(&self) -> PatientInfo {
        let parts: Vec<&str> = self.patient_id.split_whitespace().collect();
        PatientInfo {
            code: part(&parts, 0),
            sex: part(&parts, 1),
            birthdate: part(&parts, 2),
            name: part(&parts, 3),
            additional: parts.get(4..).map(|s| s.join(" ")).unwrap_or_default(),
        }
    }

    /// EDF+ 记录字段格式: "Startdate dd-MMM-yyyy admincode technician equipment additional"
    pub fn recording_info(&self) -> RecordingInfo {
        let parts: Vec<&str> = self.recording_id.split_whitespace().collect();
        RecordingInfo {
            start_date: part(&parts, 1),
            admin_code: part(&parts, 2),
            technician: part(&parts, 3),
            equipment: part(&parts, 4),
            additional: parts.get(5..).map(|s| s.join(" ")).unwrap_or_default(),
        }
    }
}

fn part(parts: &[&str], index: usize) -> String {
    parts.get(index).map(|s| s.to_string()).unwrap_or_default()
}

fn split_dotted(s: &str) -> Option<[u32; 3]> {
    let mut it = s.trim().split('.').map(|p| p.trim().parse::<u32>());
    let a = it.next()?.ok()?;
    let b = it.next()?.ok()?;
    let c = it.next()?.ok()?;
    if it.next().is_some() {
        return None;
    }
    Some([a, b, c])
}

/// Per-channel metadata from the EDF+ signal table.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalHeader {
    pub label: String,
    pub transducer: String,
    pub physical_dimension: String,
    pub physical_min: f64,
    pub physical_max: f64,
    pub digital_min: i32,
    pub digital_max: i32,
    pub prefilter: String,
    pub samples_per_record: usize,
    pub reserved: String,
    /// Byte offset of this channel's first sample within a data record
    pub offset: usize,
}

impl SignalHeader {
    pub fn is_annotation(&self) -> bool {
        self.label == "EDF Annotations"
    }

    /// 将数字值转换为物理值
    pub fn to_physical(&self, digital: i32) -> Result<f64> {
        scale(
            digital as f64,
            (self.digital_min as f64, self.digital_max as f64),
            (self.physical_min, self.physical_max),
        )
    }
}

/// Affine digital→physical map.
///
/// `physical = (v - dmin) / (dmax - dmin) * (pmax - pmin) + pmin`, evaluated in
/// a weighted form so that `dmin` maps to exactly `pmin` and `dmax` to exactly
/// `pmax`.
///
/// ```rust
/// use edfraw::scale;
///
/// assert_eq!(scale(-32768.0, (-32768.0, 32767.0), (-0.1, 0.3)).unwrap(), -0.1);
/// assert_eq!(scale(32767.0, (-32768.0, 32767.0), (-0.1, 0.3)).unwrap(), 0.3);
/// assert!(scale(5.0, (1.0, 1.0), (0.0, 1.0)).is_err());
/// ```
pub fn scale(value: f64, digital: (f64, f64), physical: (f64, f64)) -> Result<f64> {
    let (dmin, dmax) = digital;
    let (pmin, pmax) = physical;
    if dmin == dmax {
        return Err(DecodeError::DegenerateScale { min: dmin, max: dmax });
    }
    if pmin == pmax {
        return Err(DecodeError::DegenerateScale { min: pmin, max: pmax });
    }

    let t = (value - dmin) / (dmax - dmin);
    Ok(pmin * (1.0 - t) + pmax * t)
}

/// One demultiplexed EDF+ data record: one sample sequence per channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRecord {
    channels: Vec<Vec<i16>>,
}

impl DataRecord {
    pub fn new(channels: Vec<Vec<i16>>) -> Self {
        DataRecord { channels }
    }

    pub fn channel(&self, index: usize) -> Option<&[i16]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn channels(&self) -> &[Vec<i16>] {
        &self.channels
    }

    pub fn into_channels(self) -> Vec<Vec<i16>> {
        self.channels
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Scales every channel with its own signal header.
    pub fn to_physical(&self, signals: &[SignalHeader]) -> Result<Vec<Vec<f64>>> {
        self.channels
            .iter()
            .enumerate()
            .map(|(i, samples)| {
                let signal = signals.get(i).ok_or(DecodeError::InvalidSignalIndex(i))?;
                samples
                    .iter()
                    .map(|&d| signal.to_physical(d as i32))
                    .collect::<Result<Vec<f64>>>()
            })
            .collect()
    }
}

/// Why a sequential decoder stopped producing records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOfData {
    /// The header's declared record count was reached
    DeclaredCount,
    /// The stream ended on a record boundary
    Exhausted,
    /// The stream ended inside a record; the partial record was discarded
    Truncated { remaining: usize },
}

/// Sample representation of a RAW file, selected by its version tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    Int16,
    Float32,
    Float64,
}

impl SampleFormat {
    /// 2 = 16 位整数, 4 = 单精度浮点, 6 = 双精度浮点
    pub fn from_version(version: i32) -> Result<Self> {
        match version {
            2 => Ok(SampleFormat::Int16),
            4 => Ok(SampleFormat::Float32),
            6 => Ok(SampleFormat::Float64),
            other => Err(DecodeError::UnsupportedRepresentation(format!(
                "version tag {}",
                other
            ))),
        }
    }

    pub fn version(&self) -> i32 {
        match self {
            SampleFormat::Int16 => 2,
            SampleFormat::Float32 => 4,
            SampleFormat::Float64 => 6,
        }
    }

    /// Width in bytes of one value.
    pub fn width(&self) -> usize {
        match self {
            SampleFormat::Int16 => 2,
            SampleFormat::Float32 => 4,
            SampleFormat::Float64 => 8,
        }
    }
}

/// Decoded big-endian RAW header, kept in its on-disk integer types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHeader {
    pub version: i32,
    pub year: i16,
    pub month: i16,
    pub day: i16,
    pub hour: i16,
    pub minute: i16,
    pub second: i16,
    pub millisecond: i32,
    pub sample_rate: i16,
    pub channel_count: i16,
    pub gain: i16,
    pub conversion_bits: i16,
    pub amplifier_range: i16,
    pub sample_count: i32,
    pub event_count: i16,
}

impl RawHeader {
    pub fn start_datetime(&self) -> Option<NaiveDateTime> {
        let date = NaiveDate::from_ymd_opt(
            self.year as i32,
            u32::try_from(self.month).ok()?,
            u32::try_from(self.day).ok()?,
        )?;
        let time = NaiveTime::from_hms_milli_opt(
            u32::try_from(self.hour).ok()?,
            u32::try_from(self.minute).ok()?,
            u32::try_from(self.second).ok()?,
            u32::try_from(self.millisecond).ok()?,
        )?;
        Some(NaiveDateTime::new(date, time))
    }

    /// Recording length in seconds, `nsample / rate`.
    pub fn duration_seconds(&self) -> Option<f64> {
        if self.sample_rate <= 0 || self.sample_count < 0 {
            return None;
        }
        Some(self.sample_count as f64 / self.sample_rate as f64)
    }
}

/// Opaque 4-byte RAW event code. Not trimmed: codes are identifiers, not text.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventCode([u8; 4]);

impl EventCode {
    pub fn new(bytes: [u8; 4]) -> Self {
        EventCode(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventCode({:?})", String::from_utf8_lossy(&self.0))
    }
}

impl PartialEq<str> for EventCode {
    fn eq(&self, other: &str) -> bool {
        self.0[..] == *other.as_bytes()
    }
}

impl PartialEq<&str> for EventCode {
    fn eq(&self, other: &&str) -> bool {
        self.0[..] == *other.as_bytes()
    }
}

/// Channel values of one RAW record in their native representation.
#[derive(Debug, Clone, PartialEq)]
pub enum RawSamples {
    Int16(Vec<i16>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

impl RawSamples {
    pub fn format(&self) -> SampleFormat {
        match self {
            RawSamples::Int16(_) => SampleFormat::Int16,
            RawSamples::Float32(_) => SampleFormat::Float32,
            RawSamples::Float64(_) => SampleFormat::Float64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RawSamples::Int16(v) => v.len(),
            RawSamples::Float32(v) => v.len(),
            RawSamples::Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lossless widening to `f64`.
    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            RawSamples::Int16(v) => v.iter().map(|&x| x as f64).collect(),
            RawSamples::Float32(v) => v.iter().map(|&x| x as f64).collect(),
            RawSamples::Float64(v) => v.clone(),
        }
    }

    /// Splits off everything after the first `at` values, returning the tail widened to `f64`.
    pub(crate) fn split_tail(&mut self, at: usize) -> Vec<f64> {
        match self {
            RawSamples::Int16(v) => v.split_off(at).into_iter().map(|x| x as f64).collect(),
            RawSamples::Float32(v) => v.split_off(at).into_iter().map(|x| x as f64).collect(),
            RawSamples::Float64(v) => v.split_off(at),
        }
    }
}

/// One decoded RAW record: channel values and the event codes active at this sample.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub samples: RawSamples,
    pub events: Vec<EventCode>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn header_with(date: &str, time: &str, datarecords: i64, duration: f64) -> EdfHeader {
        EdfHeader {
            version: "0".to_string(),
            patient_id: "MCH-0234567 F 02-MAY-1951 Haagse_Harry".to_string(),
            recording_id: "Startdate 02-MAR-2002 PSG-1234/2002 NN Telemetry03 extra notes"
                .to_string(),
            start_date: date.to_string(),
            start_time: time.to_string(),
            header_bytes: 768,
            reserved: "EDF+C".to_string(),
            datarecords,
            record_duration: duration,
            signal_count: 2,
        }
    }

    #[test]
    fn test_start_datetime_year_clip() {
        let header = header_with("02.03.02", "14.15.16", 1, 1.0);
        let dt = header.start_datetime().unwrap();
        assert_eq!(dt.year(), 2002);
        assert_eq!(dt.month(), 3);
        assert_eq!(dt.day(), 2);
        assert_eq!(dt.hour(), 14);

        let header = header_with("31.12.85", "00.00.00", 1, 1.0);
        assert_eq!(header.start_datetime().unwrap().year(), 1985);

        let header = header_with("xx.12.85", "00.00.00", 1, 1.0);
        assert!(header.start_datetime().is_none());
    }

    #[test]
    fn test_total_duration() {
        let header = header_with("01.01.00", "00.00.00", 3725, 1.0);
        assert_eq!(header.total_duration(), Some(Duration::seconds(3725)));
        assert_eq!(header.hms(), Some((1, 2, 5.0)));

        let header = header_with("01.01.00", "00.00.00", -1, 1.0);
        assert_eq!(header.total_duration(), None);
        assert_eq!(header.hms(), None);
    }

    #[test]
    fn test_patient_and_recording_info() {
        let header = header_with("01.01.00", "00.00.00", 1, 1.0);
        let patient = header.patient_info();
        assert_eq!(patient.code, "MCH-0234567");
        assert_eq!(patient.sex, "F");
        assert_eq!(patient.birthdate, "02-MAY-1951");
        assert_eq!(patient.name, "Haagse_Harry");
        assert_eq!(patient.additional, "");

        let recording = header.recording_info();
        assert_eq!(recording.start_date, "02-MAR-2002");
        assert_eq!(recording.admin_code, "PSG-1234/2002");
        assert_eq!(recording.technician, "NN");
        assert_eq!(recording.equipment, "Telemetry03");
        assert_eq!(recording.additional, "extra notes");
    }

    #[test]
    fn test_scale_boundaries_are_exact() {
        let ranges = [
            ((-32768.0, 32767.0), (-200.0, 200.0)),
            ((-2048.0, 2047.0), (0.1, 0.3)),
            ((0.0, 1.0), (-3.3, 7.7)),
        ];
        for (digital, physical) in ranges {
            assert_eq!(scale(digital.0, digital, physical).unwrap(), physical.0);
            assert_eq!(scale(digital.1, digital, physical).unwrap(), physical.1);
        }
    }

    #[test]
    fn test_scale_midpoint() {
        let v = scale(0.0, (-100.0, 100.0), (-1.0, 1.0)).unwrap();
        assert!(v.abs() < 1e-12);
    }

    #[test]
    fn test_scale_degenerate() {
        assert!(matches!(
            scale(1.0, (3.0, 3.0), (0.0, 1.0)),
            Err(DecodeError::DegenerateScale { .. })
        ));
        assert!(matches!(
            scale(1.0, (0.0, 3.0), (2.0, 2.0)),
            Err(DecodeError::DegenerateScale { .. })
        ));
    }

    #[test]
    fn test_signal_to_physical() {
        let signal = SignalHeader {
            label: "EEG".to_string(),
            transducer: String::new(),
            physical_dimension: "uV".to_string(),
            physical_min: -100.0,
            physical_max: 100.0,
            digital_min: -32768,
            digital_max: 32767,
            prefilter: String::new(),
            samples_per_record: 4,
            reserved: String::new(),
            offset: 0,
        };
        assert_eq!(signal.to_physical(-32768).unwrap(), -100.0);
        assert_eq!(signal.to_physical(32767).unwrap(), 100.0);

        let record = DataRecord::new(vec![vec![-32768, 32767]]);
        let physical = record.to_physical(&[signal]).unwrap();
        assert_eq!(physical, vec![vec![-100.0, 100.0]]);
    }

    #[test]
    fn test_sample_format_from_version() {
        assert_eq!(SampleFormat::from_version(2).unwrap(), SampleFormat::Int16);
        assert_eq!(SampleFormat::from_version(4).unwrap().width(), 4);
        assert_eq!(SampleFormat::from_version(6).unwrap().version(), 6);
        assert!(matches!(
            SampleFormat::from_version(9),
            Err(DecodeError::UnsupportedRepresentation(_))
        ));
    }

    #[test]
    fn test_event_code_is_not_trimmed() {
        let code = EventCode::new(*b"ab  ");
        assert_eq!(code, "ab  ");
        assert_ne!(code, "ab");
        assert_eq!(code.to_string(), "ab  ");
        assert_eq!(code.as_str(), Some("ab  "));
    }

    #[test]
    fn test_raw_header_derived_values() {
        let header = RawHeader {
            version: 4,
            year: 2020,
            month: 5,
            day: 17,
            hour: 13,
            minute: 45,
            second: 30,
            millisecond: 250,
            sample_rate: 500,
            channel_count: 3,
            gain: 1,
            conversion_bits: 1,
            amplifier_range: 1,
            sample_count: 1500,
            event_count: 0,
        };
        let dt = header.start_datetime().unwrap();
        assert_eq!(dt.year(), 2020);
        assert_eq!(dt.nanosecond(), 250_000_000);
        assert_eq!(header.duration_seconds(), Some(3.0));
    }
}
