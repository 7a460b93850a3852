use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, warn};

use crate::error::{DecodeError, Result};
use crate::layout::{split_columns, split_fixed, RecordLayout, EDF_HEADER_FIELDS, EDF_SIGNAL_FIELDS};
use crate::types::{DataRecord, EdfHeader, EndOfData, SignalHeader};
use crate::utils::{
    ascii_field, parse_count_field, parse_float_field, parse_int_field, read_block, read_up_to,
};
use crate::{EDF_HEADER_SIZE, EDF_MAX_SIGNALS, EDF_SAMPLE_WIDTH, EDF_SIGNAL_HEADER_SIZE};

/// EDF+ file reader
///
/// Decodes the main header and the column-major signal table once at open,
/// then decodes data records either sequentially ([`next_record`]), in bulk
/// ([`read_records`], [`read_all`]) or by channel and record index
/// ([`read_channel_record`]).
///
/// The byte source is owned by the reader and released when it is dropped,
/// including after a decode error.
///
/// # Examples
///
/// ```rust
/// use edfraw::EdfReader;
///
/// # let dir = tempfile::tempdir().unwrap();
/// # let path = dir.path().join("recording.edf");
/// # edfraw::doctest_utils::create_simple_edf_file(&path)?;
/// let mut reader = EdfReader::open(&path)?;
///
/// println!("Signals: {}", reader.signals().len());
/// for signal in reader.signals() {
///     println!("  {} ({} samples/record)", signal.label, signal.samples_per_record);
/// }
///
/// // 顺序读取所有数据记录
/// while let Some(record) = reader.next_record()? {
///     println!("channel 0: {:?}", record.channel(0));
/// }
/// # Ok::<(), edfraw::DecodeError>(())
/// ```
///
/// [`next_record`]: EdfReader::next_record
/// [`read_records`]: EdfReader::read_records
/// [`read_all`]: EdfReader::read_all
/// [`read_channel_record`]: EdfReader::read_channel_record
pub struct EdfReader<R = BufReader<File>> {
    reader: R,
    header: EdfHeader,
    signals: Vec<SignalHeader>,
    layout: RecordLayout,
    /// 顺序游标：已解码的记录数
    records_read: u64,
    /// 随机访问后需要重新定位顺序游标
    needs_seek: bool,
    end: Option<EndOfData>,
}

impl EdfReader<BufReader<File>> {
    /// Opens an EDF+ file and decodes its headers.
    ///
    /// # Errors
    ///
    /// * `DecodeError::FileNotFound` - the file can't be opened
    /// * `DecodeError::TruncatedRead` - the file is shorter than its headers
    /// * `DecodeError::HeaderInconsistency` - the declared header length is wrong
    /// * `DecodeError::InvalidField` - a header field is not ASCII or not a number
    /// * `DecodeError::UnsupportedRepresentation` - an EDF+D (discontinuous) file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)
            .map_err(|e| DecodeError::FileNotFound(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_reader(BufReader::new(file))
    }
}

impl<R: Read + Seek> EdfReader<R> {
    /// Decodes the headers from any seekable byte source, starting at offset 0.
    pub fn from_reader(mut reader: R) -> Result<Self> {
        reader.seek(SeekFrom::Start(0))?;

        let header = Self::parse_header(&mut reader)?;
        if reader.stream_position()? != EDF_HEADER_SIZE as u64 {
            return Err(DecodeError::TruncatedRead {
                what: "header",
                expected: EDF_HEADER_SIZE,
                actual: reader.stream_position()? as usize,
            });
        }

        let signal_block = read_block(
            &mut reader,
            header.signal_count * EDF_SIGNAL_HEADER_SIZE,
            "signal header",
        )?;

        // 头部读完后，位置必须等于声明的头部长度
        let position = reader.stream_position()?;
        if position != header.header_bytes {
            return Err(DecodeError::HeaderInconsistency {
                declared: header.header_bytes,
                actual: position,
            });
        }

        let (signals, layout) = Self::parse_signals(&signal_block, header.signal_count, position)?;

        debug!(
            "EDF header decoded: {} signals, {} records, record size {} bytes",
            signals.len(),
            header.datarecords,
            layout.record_size()
        );

        Ok(EdfReader {
            reader,
            header,
            signals,
            layout,
            records_read: 0,
            needs_seek: false,
            end: None,
        })
    }

    /// Decoded main header.
    pub fn header(&self) -> &EdfHeader {
        &self.header
    }

    /// Channel headers in channel-index order.
    pub fn signals(&self) -> &[SignalHeader] {
        &self.signals
    }

    /// Header of channel `index`, or `None` past the last channel.
    pub fn signal(&self, index: usize) -> Option<&SignalHeader> {
        self.signals.get(index)
    }

    /// Per-record offset table shared by every data record.
    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    /// Number of records produced by the sequential cursor so far.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Why the sequential cursor last returned `None`, if it has.
    pub fn end_of_data(&self) -> Option<EndOfData> {
        self.end
    }

    /// Decodes the next data record.
    ///
    /// Returns `Ok(None)` once the declared record count is reached, the stream
    /// is exhausted, or the remaining bytes are fewer than one full record. A
    /// truncated tail is discarded and logged, not reported as an error.
    ///
    /// ```rust
    /// use edfraw::{EdfReader, EndOfData};
    /// use edfraw::doctest_utils::EdfFixture;
    /// use std::io::Cursor;
    ///
    /// let bytes = EdfFixture::new(&[4, 4])
    ///     .with_records(vec![vec![1, 2, 3, 4, 5, 6, 7, 8]])
    ///     .to_bytes();
    /// let mut reader = EdfReader::from_reader(Cursor::new(bytes))?;
    ///
    /// let record = reader.next_record()?.unwrap();
    /// assert_eq!(record.channel(0), Some(&[1, 2, 3, 4][..]));
    /// assert_eq!(record.channel(1), Some(&[5, 6, 7, 8][..]));
    ///
    /// assert!(reader.next_record()?.is_none());
    /// assert_eq!(reader.end_of_data(), Some(EndOfData::DeclaredCount));
    /// # Ok::<(), edfraw::DecodeError>(())
    /// ```
    pub fn next_record(&mut self) -> Result<Option<DataRecord>> {
        if self.end.is_some() {
            return Ok(None);
        }

        if let Some(declared) = self.header.declared_records() {
            if self.records_read >= declared {
                self.end = Some(EndOfData::DeclaredCount);
                return Ok(None);
            }
        }

        let record_size = self.layout.record_size();
        if record_size == 0 {
            self.end = Some(EndOfData::Exhausted);
            return Ok(None);
        }

        if self.needs_seek {
            // 位置超出 u64 范围时文件不可能还有数据
            let Some(position) = self.layout.record_position(self.records_read) else {
                self.end = Some(EndOfData::Exhausted);
                return Ok(None);
            };
            self.reader.seek(SeekFrom::Start(position))?;
            self.needs_seek = false;
        }

        let buf = read_up_to(&mut self.reader, record_size)?;
        let got = buf.len();

        if got < record_size {
            if got > 0 {
                warn!(
                    "Reached end of file: {}/{} bytes of data record {} left, discarding",
                    got, record_size, self.records_read
                );
                self.end = Some(EndOfData::Truncated { remaining: got });
            } else {
                self.end = Some(EndOfData::Exhausted);
            }
            if let Some(declared) = self.header.declared_records() {
                warn!(
                    "File ended after {} of {} declared data records",
                    self.records_read, declared
                );
            }
            return Ok(None);
        }

        self.records_read += 1;
        Ok(Some(self.demultiplex(&buf)))
    }

    /// Decodes every data record from the first one onward.
    pub fn read_records(&mut self) -> Result<Vec<DataRecord>> {
        self.rewind();
        let mut records = Vec::new();
        while let Some(record) = self.next_record()? {
            records.push(record);
        }
        Ok(records)
    }

    /// Decodes every data record and concatenates the samples per channel.
    ///
    /// With a declared record count `ndata`, channel `i` holds
    /// `ndata * samples_per_record[i]` samples unless the file is truncated.
    pub fn read_all(&mut self) -> Result<Vec<Vec<i16>>> {
        let mut channels: Vec<Vec<i16>> = vec![Vec::new(); self.signals.len()];
        for record in self.read_records()? {
            for (all, samples) in channels.iter_mut().zip(record.into_channels()) {
                all.extend(samples);
            }
        }
        Ok(channels)
    }

    /// Reads one channel's samples from one data record, seeking straight to
    /// them through the offset table.
    ///
    /// Returns `Ok(None)` when `record` lies past the declared count or past
    /// the end of the file. The sequential cursor is unaffected.
    pub fn read_channel_record(&mut self, channel: usize, record: u64) -> Result<Option<Vec<i16>>> {
        let count = self
            .layout
            .sample_count(channel)
            .ok_or(DecodeError::InvalidSignalIndex(channel))?;

        if let Some(declared) = self.header.declared_records() {
            if record >= declared {
                return Ok(None);
            }
        }

        // channel 已校验，None 只可能是位置溢出
        let Some(position) = self.layout.channel_position(channel, record) else {
            return Ok(None);
        };

        self.needs_seek = true;
        self.reader.seek(SeekFrom::Start(position))?;

        let len = count * EDF_SAMPLE_WIDTH;
        let buf = read_up_to(&mut self.reader, len)?;
        if buf.len() < len {
            return Ok(None);
        }

        let mut samples = vec![0i16; count];
        LittleEndian::read_i16_into(&buf, &mut samples);
        Ok(Some(samples))
    }

    /// Moves the sequential cursor back to the first data record.
    pub fn rewind(&mut self) {
        self.records_read = 0;
        self.end = None;
        self.needs_seek = true;
    }

    /// Releases the underlying byte source.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn demultiplex(&self, buf: &[u8]) -> DataRecord {
        let channels = (0..self.layout.channel_count())
            .map(|i| {
                let range = self.layout.channel_range(i).unwrap_or(0..0);
                let mut samples = vec![0i16; range.len() / EDF_SAMPLE_WIDTH];
                LittleEndian::read_i16_into(&buf[range], &mut samples);
                samples
            })
            .collect();
        DataRecord::new(channels)
    }

    fn parse_header(reader: &mut R) -> Result<EdfHeader> {
        // 读取主头部（256字节）
        let block = read_block(reader, EDF_HEADER_SIZE, "header")?;

        let [version, patient_id, recording_id, start_date, start_time, nbyte, reserved, ndata, duration, nsignal] =
            split_fixed(&block, &EDF_HEADER_FIELDS);

        let header_bytes = parse_int_field(&ascii_field(nbyte, "header byte length")?, "header byte length")?;
        let header_bytes = u64::try_from(header_bytes)
            .map_err(|_| DecodeError::invalid_field("header byte length", header_bytes.to_string()))?;

        let datarecords = parse_int_field(&ascii_field(ndata, "number of data records")?, "number of data records")?;
        if datarecords < -1 {
            return Err(DecodeError::invalid_field("number of data records", datarecords.to_string()));
        }

        let signal_count = parse_count_field(&ascii_field(nsignal, "number of signals")?, "number of signals")?;
        if signal_count > EDF_MAX_SIGNALS {
            return Err(DecodeError::invalid_field("number of signals", signal_count.to_string()));
        }

        let header = EdfHeader {
            version: ascii_field(version, "version")?,
            patient_id: ascii_field(patient_id, "patient id")?,
            recording_id: ascii_field(recording_id, "recording id")?,
            start_date: ascii_field(start_date, "start date")?,
            start_time: ascii_field(start_time, "start time")?,
            header_bytes,
            reserved: ascii_field(reserved, "reserved")?,
            datarecords,
            record_duration: parse_float_field(&ascii_field(duration, "record duration")?, "record duration")?,
            signal_count,
        };

        // 只支持连续记录
        if header.is_discontinuous() {
            return Err(DecodeError::UnsupportedRepresentation(
                "discontinuous EDF+D recording".to_string(),
            ));
        }

        Ok(header)
    }

    fn parse_signals(
        block: &[u8],
        count: usize,
        data_start: u64,
    ) -> Result<(Vec<SignalHeader>, RecordLayout)> {
        let [labels, transducers, dimensions, physical_mins, physical_maxs, digital_mins, digital_maxs, prefilters, sample_counts, reserveds] =
            split_columns(block, &EDF_SIGNAL_FIELDS, count);

        let sample_counts = sample_counts
            .iter()
            .map(|field| {
                parse_count_field(&ascii_field(field, "samples per record")?, "samples per record")
            })
            .collect::<Result<Vec<usize>>>()?;

        let layout = RecordLayout::new(&sample_counts, EDF_SAMPLE_WIDTH, data_start).ok_or_else(|| {
            let total: u128 = sample_counts.iter().map(|&n| n as u128).sum();
            DecodeError::invalid_field("samples per record", total.to_string())
        })?;

        // 按列读出后转置为每个信号一条记录
        let mut signals = Vec::with_capacity(count);
        for i in 0..count {
            signals.push(SignalHeader {
                label: ascii_field(labels[i], "label")?,
                transducer: ascii_field(transducers[i], "transducer")?,
                physical_dimension: ascii_field(dimensions[i], "physical dimension")?,
                physical_min: parse_float_field(&ascii_field(physical_mins[i], "physical minimum")?, "physical minimum")?,
                physical_max: parse_float_field(&ascii_field(physical_maxs[i], "physical maximum")?, "physical maximum")?,
                digital_min: parse_digital(digital_mins[i], "digital minimum")?,
                digital_max: parse_digital(digital_maxs[i], "digital maximum")?,
                prefilter: ascii_field(prefilters[i], "prefilter")?,
                samples_per_record: sample_counts[i],
                reserved: ascii_field(reserveds[i], "signal reserved")?,
                offset: layout.offsets()[i],
            });
        }

        Ok((signals, layout))
    }
}

fn parse_digital(field: &[u8], name: &'static str) -> Result<i32> {
    let text = ascii_field(field, name)?;
    let value = parse_int_field(&text, name)?;
    i32::try_from(value).map_err(|_| DecodeError::invalid_field(name, text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doctest_utils::EdfFixture;
    use std::io::Cursor;

    fn reader_for(fixture: &EdfFixture) -> EdfReader<Cursor<Vec<u8>>> {
        EdfReader::from_reader(Cursor::new(fixture.to_bytes())).unwrap()
    }

    #[test]
    fn test_two_channel_record() {
        let fixture = EdfFixture::new(&[4, 4]).with_records(vec![vec![1, 2, 3, 4, 5, 6, 7, 8]]);
        let mut reader = reader_for(&fixture);

        assert_eq!(reader.header().signal_count, 2);
        assert_eq!(reader.header().header_bytes, 768);
        assert_eq!(reader.layout().offsets(), &[0, 8]);
        assert_eq!(reader.signals()[1].offset, 8);

        let channels = reader.read_all().unwrap();
        assert_eq!(channels, vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8]]);
    }

    #[test]
    fn test_signal_table_is_transposed() {
        let mut fixture = EdfFixture::new(&[2, 3]);
        fixture.signals[0].label = "EEG Fp1".to_string();
        fixture.signals[1].label = "ECG".to_string();
        fixture.signals[1].physical_min = -5.0;
        fixture.signals[1].digital_max = 2047;
        let reader = reader_for(&fixture);

        let signals = reader.signals();
        assert_eq!(signals[0].label, "EEG Fp1");
        assert_eq!(signals[0].samples_per_record, 2);
        assert_eq!(signals[1].label, "ECG");
        assert_eq!(signals[1].physical_min, -5.0);
        assert_eq!(signals[1].digital_max, 2047);
        assert_eq!(signals[1].samples_per_record, 3);
        assert_eq!(signals[1].physical_dimension, "uV");
    }

    #[test]
    fn test_truncated_header() {
        let bytes = EdfFixture::new(&[4]).to_bytes();
        for len in [0, 10, 255] {
            let result = EdfReader::from_reader(Cursor::new(bytes[..len].to_vec()));
            assert!(matches!(
                result,
                Err(DecodeError::TruncatedRead { what: "header", .. })
            ));
        }
    }

    #[test]
    fn test_truncated_signal_table() {
        let bytes = EdfFixture::new(&[4, 4]).to_bytes();
        let result = EdfReader::from_reader(Cursor::new(bytes[..600].to_vec()));
        assert!(matches!(
            result,
            Err(DecodeError::TruncatedRead { what: "signal header", .. })
        ));
    }

    #[test]
    fn test_header_length_mismatch() {
        let mut fixture = EdfFixture::new(&[4]);
        fixture.header_bytes = Some(1024);
        let result = EdfReader::from_reader(Cursor::new(fixture.to_bytes()));
        match result {
            Err(DecodeError::HeaderInconsistency { declared, actual }) => {
                assert_eq!(declared, 1024);
                assert_eq!(actual, 512);
            }
            other => panic!("unexpected result: {:?}", other.map(|r| r.header().clone())),
        }
    }

    #[test]
    fn test_non_numeric_field() {
        let mut fixture = EdfFixture::new(&[4]);
        fixture.record_duration = "one".to_string();
        assert!(matches!(
            EdfReader::from_reader(Cursor::new(fixture.to_bytes())),
            Err(DecodeError::InvalidField { field: "record duration", .. })
        ));
    }

    #[test]
    fn test_discontinuous_rejected() {
        let mut fixture = EdfFixture::new(&[4]);
        fixture.reserved = "EDF+D".to_string();
        assert!(matches!(
            EdfReader::from_reader(Cursor::new(fixture.to_bytes())),
            Err(DecodeError::UnsupportedRepresentation(_))
        ));
    }

    #[test]
    fn test_declared_count_stops_early() {
        let fixture = EdfFixture::new(&[2])
            .with_records(vec![vec![1, 2], vec![3, 4], vec![5, 6]])
            .with_datarecords(2);
        let mut reader = reader_for(&fixture);

        assert_eq!(reader.read_all().unwrap(), vec![vec![1, 2, 3, 4]]);
        assert_eq!(reader.end_of_data(), Some(EndOfData::DeclaredCount));
    }

    #[test]
    fn test_unknown_count_reads_to_eof() {
        let fixture = EdfFixture::new(&[2])
            .with_records(vec![vec![1, 2], vec![3, 4], vec![5, 6]])
            .with_datarecords(-1);
        let mut reader = reader_for(&fixture);

        let records = reader.read_records().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(reader.end_of_data(), Some(EndOfData::Exhausted));
    }

    #[test]
    fn test_truncated_tail_is_end_of_data() {
        let fixture = EdfFixture::new(&[2, 2])
            .with_records(vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8]])
            .with_datarecords(-1);
        let mut bytes = fixture.to_bytes();
        bytes.truncate(bytes.len() - 3);
        let mut reader = EdfReader::from_reader(Cursor::new(bytes)).unwrap();

        assert!(reader.next_record().unwrap().is_some());
        assert!(reader.next_record().unwrap().is_none());
        assert_eq!(reader.end_of_data(), Some(EndOfData::Truncated { remaining: 5 }));
        // 结束后继续调用仍然返回 None
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_random_access_does_not_move_cursor() {
        let fixture = EdfFixture::new(&[2, 3]).with_records(vec![
            vec![1, 2, 10, 11, 12],
            vec![3, 4, 13, 14, 15],
        ]);
        let mut reader = reader_for(&fixture);

        let first = reader.next_record().unwrap().unwrap();
        assert_eq!(first.channel(1), Some(&[10, 11, 12][..]));

        assert_eq!(reader.read_channel_record(1, 1).unwrap(), Some(vec![13, 14, 15]));
        assert_eq!(reader.read_channel_record(0, 0).unwrap(), Some(vec![1, 2]));
        assert_eq!(reader.read_channel_record(0, 2).unwrap(), None);
        assert!(matches!(
            reader.read_channel_record(5, 0),
            Err(DecodeError::InvalidSignalIndex(5))
        ));

        let second = reader.next_record().unwrap().unwrap();
        assert_eq!(second.channel(0), Some(&[3, 4][..]));
    }

    #[test]
    fn test_negative_samples_little_endian() {
        let fixture = EdfFixture::new(&[3]).with_records(vec![vec![-1, i16::MIN, i16::MAX]]);
        let mut reader = reader_for(&fixture);
        assert_eq!(reader.read_all().unwrap(), vec![vec![-1, i16::MIN, i16::MAX]]);
    }

    #[test]
    fn test_zero_signals_has_no_records() {
        let fixture = EdfFixture::new(&[]).with_datarecords(-1);
        let mut reader = reader_for(&fixture);
        assert_eq!(reader.header().header_bytes, 256);
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_huge_declared_record_reads_only_what_exists() {
        // 声明的记录长度远大于文件，不应按声明分配内存
        let fixture = EdfFixture::new(&vec![99_999_999; 4096]).with_datarecords(-1);
        let mut reader = reader_for(&fixture);
        assert_eq!(reader.layout().record_size(), 99_999_999 * 2 * 4096);

        assert!(reader.next_record().unwrap().is_none());
        assert_eq!(reader.end_of_data(), Some(EndOfData::Exhausted));
        assert_eq!(reader.read_channel_record(4095, 0).unwrap(), None);
    }

    #[test]
    fn test_far_record_index_is_none() {
        let fixture = EdfFixture::new(&[2])
            .with_records(vec![vec![1, 2]])
            .with_datarecords(-1);
        let mut reader = reader_for(&fixture);

        assert_eq!(reader.read_channel_record(0, u64::MAX / 2).unwrap(), None);
        assert_eq!(reader.read_channel_record(0, u64::MAX).unwrap(), None);
        // 顺序游标不受影响
        assert_eq!(reader.read_all().unwrap(), vec![vec![1, 2]]);
    }

    #[test]
    fn test_record_count_below_minus_one_rejected() {
        let fixture = EdfFixture::new(&[2]).with_datarecords(-2);
        assert!(matches!(
            EdfReader::from_reader(Cursor::new(fixture.to_bytes())),
            Err(DecodeError::InvalidField { field: "number of data records", .. })
        ));
    }

    #[test]
    fn test_too_many_signals_rejected() {
        let mut bytes = EdfFixture::new(&[2]).to_bytes();
        bytes[252..256].copy_from_slice(b"5000");
        match EdfReader::from_reader(Cursor::new(bytes)) {
            Err(DecodeError::InvalidField { field, value }) => {
                assert_eq!(field, "number of signals");
                assert_eq!(value, "5000");
            }
            other => panic!("unexpected result: {:?}", other.map(|r| r.header().clone())),
        }
    }

    #[test]
    fn test_non_ascii_header_byte_rejected() {
        let mut fixture = EdfFixture::new(&[2]);
        fixture.patient_id = "P001 F 01-JAN-1990 Hélène".to_string();
        assert!(matches!(
            EdfReader::from_reader(Cursor::new(fixture.to_bytes())),
            Err(DecodeError::InvalidField { field: "patient id", .. })
        ));
    }
}
