//! NetStation continuous RAW files.
//!
//! A RAW file is a 36-byte big-endian header, a table of 4-byte event codes
//! and then one record per sample instant. Each record holds `nchan` channel
//! values followed by one flag per event code, all in the representation
//! selected by the header's version tag.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use log::{debug, warn};

use crate::error::{DecodeError, Result};
use crate::types::{EventCode, RawHeader, RawRecord, RawSamples, SampleFormat};
use crate::utils::{read_block, read_up_to};
use crate::{RAW_EVENT_CODE_WIDTH, RAW_HEADER_SIZE};

/// Streaming reader for RAW files.
///
/// Only sequential access is offered: each [`next_record`](RawReader::next_record)
/// call decodes the next record from the stream. A second cursor needs its
/// own reader.
///
/// # Examples
///
/// ```rust
/// use edfraw::RawReader;
///
/// # let dir = tempfile::tempdir().unwrap();
/// # let path = dir.path().join("session.raw");
/// # edfraw::doctest_utils::create_simple_raw_file(&path)?;
/// let mut reader = RawReader::open(&path)?;
/// println!("{} channels at {} Hz", reader.channel_count(), reader.header().sample_rate);
///
/// for record in reader.records() {
///     let record = record?;
///     if !record.events.is_empty() {
///         println!("events: {:?}", record.events);
///     }
/// }
/// # Ok::<(), edfraw::DecodeError>(())
/// ```
pub struct RawReader<R = BufReader<File>> {
    reader: R,
    header: RawHeader,
    format: SampleFormat,
    codes: Vec<EventCode>,
    channel_count: usize,
    record_size: usize,
    data_offset: u64,
    records_read: u64,
    finished: bool,
}

impl RawReader<BufReader<File>> {
    /// Opens a RAW file and decodes its header and event code table.
    ///
    /// # Errors
    ///
    /// * `DecodeError::FileNotFound` - the file can't be opened
    /// * `DecodeError::TruncatedRead` - the file is shorter than its header or code table
    /// * `DecodeError::UnsupportedRepresentation` - the version tag is not 2, 4 or 6
    /// * `DecodeError::InvalidField` - a negative channel or event count
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)
            .map_err(|e| DecodeError::FileNotFound(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_reader(BufReader::new(file))
    }
}

impl<R: Read> RawReader<R> {
    /// Decodes the header and event code table from a stream positioned at
    /// the start of the file.
    ///
    /// An unknown version tag fails here, before any record is read.
    pub fn from_reader(mut reader: R) -> Result<Self> {
        let block = read_block(&mut reader, RAW_HEADER_SIZE, "header")?;
        let header = parse_header(&block)?;
        let format = SampleFormat::from_version(header.version)?;

        let channel_count = usize::try_from(header.channel_count)
            .map_err(|_| DecodeError::invalid_field("channel count", header.channel_count.to_string()))?;
        let event_count = usize::try_from(header.event_count)
            .map_err(|_| DecodeError::invalid_field("event count", header.event_count.to_string()))?;

        // 事件码不去空格，按原样保存
        let table = read_block(&mut reader, event_count * RAW_EVENT_CODE_WIDTH, "event code table")?;
        let codes: Vec<EventCode> = table
            .chunks_exact(RAW_EVENT_CODE_WIDTH)
            .map(|c| EventCode::new([c[0], c[1], c[2], c[3]]))
            .collect();

        let data_offset = (RAW_HEADER_SIZE + table.len()) as u64;
        let record_size = (channel_count + event_count) * format.width();

        debug!(
            "RAW header decoded: {:?}, {} channels, {} event codes, record size {} bytes",
            format, channel_count, event_count, record_size
        );

        Ok(RawReader {
            reader,
            header,
            format,
            codes,
            channel_count,
            record_size,
            data_offset,
            records_read: 0,
            finished: false,
        })
    }

    /// Decoded 36-byte header.
    pub fn header(&self) -> &RawHeader {
        &self.header
    }

    /// Event code table; a code's index is its identity in each record's flags.
    pub fn event_codes(&self) -> &[EventCode] {
        &self.codes
    }

    /// Sample representation selected by the version tag.
    pub fn format(&self) -> SampleFormat {
        self.format
    }

    /// Number of channel values at the start of each record.
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Size in bytes of one record.
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// File position of the first record.
    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }

    /// Number of records decoded so far.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Decodes the next record.
    ///
    /// Returns `Ok(None)` at end of stream, on a short (truncated) record, or
    /// once the header's sample count has been produced when it is positive.
    ///
    /// # Errors
    ///
    /// `DecodeError::RecordShapeMismatch` when the decoded flag count differs
    /// from the event code table. Channel values and flags share one width and
    /// the record size is derived from the table, so a file opened by this
    /// reader never produces it.
    ///
    /// ```rust
    /// use edfraw::RawReader;
    /// use edfraw::doctest_utils::RawFixture;
    /// use std::io::Cursor;
    ///
    /// let bytes = RawFixture::new(2, 1, &["aaaa", "bbbb", "cccc"])
    ///     .with_records(vec![vec![7.0, 1.0, 0.0, 1.0]])
    ///     .to_bytes();
    /// let mut reader = RawReader::from_reader(Cursor::new(bytes))?;
    ///
    /// let record = reader.next_record()?.unwrap();
    /// assert_eq!(record.samples.to_f64(), vec![7.0]);
    /// assert_eq!(record.events, ["aaaa", "cccc"]);
    /// assert!(reader.next_record()?.is_none());
    /// # Ok::<(), edfraw::DecodeError>(())
    /// ```
    pub fn next_record(&mut self) -> Result<Option<RawRecord>> {
        if self.finished {
            return Ok(None);
        }

        if self.header.sample_count > 0 && self.records_read >= self.header.sample_count as u64 {
            self.finished = true;
            return Ok(None);
        }

        if self.record_size == 0 {
            self.finished = true;
            return Ok(None);
        }

        let buf = read_up_to(&mut self.reader, self.record_size)?;
        let got = buf.len();
        if got < self.record_size {
            if got > 0 {
                warn!(
                    "Reached end of file: {}/{} bytes of record {} left, discarding",
                    got, self.record_size, self.records_read
                );
            }
            self.finished = true;
            return Ok(None);
        }

        let mut samples = self.decode_values(&buf);
        let flags = samples.split_tail(self.channel_count);
        if flags.len() != self.codes.len() {
            return Err(DecodeError::RecordShapeMismatch {
                expected: self.codes.len(),
                actual: flags.len(),
            });
        }

        let events = self
            .codes
            .iter()
            .zip(flags)
            .filter(|(_, flag)| *flag == 1.0)
            .map(|(code, _)| *code)
            .collect();

        self.records_read += 1;
        Ok(Some(RawRecord { samples, events }))
    }

    /// Iterator over the remaining records.
    pub fn records(&mut self) -> RawRecords<'_, R> {
        RawRecords { reader: self }
    }

    /// Releases the underlying stream.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn decode_values(&self, buf: &[u8]) -> RawSamples {
        let n = buf.len() / self.format.width();
        match self.format {
            SampleFormat::Int16 => {
                let mut values = vec![0i16; n];
                BigEndian::read_i16_into(buf, &mut values);
                RawSamples::Int16(values)
            }
            SampleFormat::Float32 => {
                let mut values = vec![0f32; n];
                BigEndian::read_f32_into(buf, &mut values);
                RawSamples::Float32(values)
            }
            SampleFormat::Float64 => {
                let mut values = vec![0f64; n];
                BigEndian::read_f64_into(buf, &mut values);
                RawSamples::Float64(values)
            }
        }
    }
}

/// Iterator returned by [`RawReader::records`].
pub struct RawRecords<'a, R> {
    reader: &'a mut RawReader<R>,
}

impl<R: Read> Iterator for RawRecords<'_, R> {
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.next_record() {
            Ok(record) => record.map(Ok),
            Err(e) => {
                // 出错后停止迭代
                self.reader.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// 按大端序解析 36 字节头部
fn parse_header(block: &[u8]) -> Result<RawHeader> {
    let mut cur = block;
    Ok(RawHeader {
        version: cur.read_i32::<BigEndian>()?,
        year: cur.read_i16::<BigEndian>()?,
        month: cur.read_i16::<BigEndian>()?,
        day: cur.read_i16::<BigEndian>()?,
        hour: cur.read_i16::<BigEndian>()?,
        minute: cur.read_i16::<BigEndian>()?,
        second: cur.read_i16::<BigEndian>()?,
        millisecond: cur.read_i32::<BigEndian>()?,
        sample_rate: cur.read_i16::<BigEndian>()?,
        channel_count: cur.read_i16::<BigEndian>()?,
        gain: cur.read_i16::<BigEndian>()?,
        conversion_bits: cur.read_i16::<BigEndian>()?,
        amplifier_range: cur.read_i16::<BigEndian>()?,
        sample_count: cur.read_i32::<BigEndian>()?,
        event_count: cur.read_i16::<BigEndian>()?,
    })
}
