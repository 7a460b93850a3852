//! Fixed field schemas and per-record byte layout.
//!
//! Every header structure is described by a static table of named field
//! widths. Decoders split a block with [`split_fixed`] (row layout, used by
//! the 256-byte EDF+ main header) or [`split_columns`] (column-major layout,
//! used by the EDF+ signal table, where all channels' values for one field
//! precede the next field).

use std::ops::Range;

/// One fixed-width field of a header block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub width: usize,
}

impl FieldSpec {
    pub const fn new(name: &'static str, width: usize) -> Self {
        FieldSpec { name, width }
    }
}

/// EDF+ 主头部，共 256 字节
pub const EDF_HEADER_FIELDS: [FieldSpec; 10] = [
    FieldSpec::new("version", 8),
    FieldSpec::new("patient id", 80),
    FieldSpec::new("recording id", 80),
    FieldSpec::new("start date", 8),
    FieldSpec::new("start time", 8),
    FieldSpec::new("header byte length", 8),
    FieldSpec::new("reserved", 44),
    FieldSpec::new("number of data records", 8),
    FieldSpec::new("record duration", 8),
    FieldSpec::new("number of signals", 4),
];

/// EDF+ 信号头部，每个信号共 256 字节，按列存储
pub const EDF_SIGNAL_FIELDS: [FieldSpec; 10] = [
    FieldSpec::new("label", 16),
    FieldSpec::new("transducer", 80),
    FieldSpec::new("physical dimension", 8),
    FieldSpec::new("physical minimum", 8),
    FieldSpec::new("physical maximum", 8),
    FieldSpec::new("digital minimum", 8),
    FieldSpec::new("digital maximum", 8),
    FieldSpec::new("prefilter", 80),
    FieldSpec::new("samples per record", 8),
    FieldSpec::new("signal reserved", 32),
];

/// Sum of the widths of a field table.
pub const fn total_width(fields: &[FieldSpec]) -> usize {
    let mut total = 0;
    let mut i = 0;
    while i < fields.len() {
        total += fields[i].width;
        i += 1;
    }
    total
}

/// Splits a row-layout block into its fields, in table order.
///
/// `block` must be at least `total_width(fields)` bytes long.
pub fn split_fixed<'a, const N: usize>(block: &'a [u8], fields: &[FieldSpec; N]) -> [&'a [u8]; N] {
    let mut start = 0;
    std::array::from_fn(|i| {
        let end = start + fields[i].width;
        let field = &block[start..end];
        start = end;
        field
    })
}

/// Splits a column-major block holding `count` entries per field.
///
/// Column `k` starts after `count` entries of every earlier field; within a
/// column, entry `i` belongs to channel `i`.
pub fn split_columns<'a, const N: usize>(
    block: &'a [u8],
    fields: &[FieldSpec; N],
    count: usize,
) -> [Vec<&'a [u8]>; N] {
    let mut start = 0;
    std::array::from_fn(|k| {
        let width = fields[k].width;
        let end = start + width * count;
        let column = block[start..end].chunks_exact(width).collect();
        start = end;
        column
    })
}

/// Byte layout of one interleaved data record.
///
/// Offsets are relative to the start of a data record, not the file:
/// `offset[i + 1] == offset[i] + sample_count[i] * sample_width`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    offsets: Vec<usize>,
    sample_counts: Vec<usize>,
    sample_width: usize,
    record_size: usize,
    data_start: u64,
}

impl RecordLayout {
    /// Computes the offset table; `None` when the record size overflows `usize`.
    pub fn new(sample_counts: &[usize], sample_width: usize, data_start: u64) -> Option<Self> {
        let mut offsets = Vec::with_capacity(sample_counts.len());
        let mut offset: usize = 0;
        for &count in sample_counts {
            offsets.push(offset);
            offset = offset.checked_add(count.checked_mul(sample_width)?)?;
        }

        Some(RecordLayout {
            offsets,
            sample_counts: sample_counts.to_vec(),
            sample_width,
            record_size: offset,
            data_start,
        })
    }

    pub fn channel_count(&self) -> usize {
        self.offsets.len()
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn offset(&self, channel: usize) -> Option<usize> {
        self.offsets.get(channel).copied()
    }

    pub fn sample_count(&self, channel: usize) -> Option<usize> {
        self.sample_counts.get(channel).copied()
    }

    pub fn sample_width(&self) -> usize {
        self.sample_width
    }

    /// Size in bytes of one full data record.
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Total number of samples across all channels in one record.
    pub fn samples_per_record(&self) -> usize {
        self.sample_counts.iter().sum()
    }

    /// File position of the first data record.
    pub fn data_start(&self) -> u64 {
        self.data_start
    }

    /// Byte range of `channel` inside a record buffer.
    pub fn channel_range(&self, channel: usize) -> Option<Range<usize>> {
        let start = self.offset(channel)?;
        let len = self.sample_count(channel)? * self.sample_width;
        Some(start..start + len)
    }

    /// 文件中第 `record` 条记录的起始位置，溢出时为 `None`
    pub fn record_position(&self, record: u64) -> Option<u64> {
        record
            .checked_mul(self.record_size as u64)?
            .checked_add(self.data_start)
    }

    /// Absolute file position of `channel`'s first sample in `record`.
    ///
    /// `None` for an unknown channel or a position past `u64::MAX`.
    pub fn channel_position(&self, channel: usize, record: u64) -> Option<u64> {
        self.record_position(record)?
            .checked_add(self.offset(channel)? as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edf_field_tables_add_up() {
        assert_eq!(total_width(&EDF_HEADER_FIELDS), crate::EDF_HEADER_SIZE);
        assert_eq!(total_width(&EDF_SIGNAL_FIELDS), crate::EDF_SIGNAL_HEADER_SIZE);
    }

    #[test]
    fn test_split_fixed() {
        let fields = [FieldSpec::new("a", 2), FieldSpec::new("b", 3)];
        let [a, b] = split_fixed(b"xxyyy", &fields);
        assert_eq!(a, b"xx");
        assert_eq!(b, b"yyy");
    }

    #[test]
    fn test_split_columns_is_column_major() {
        let fields = [FieldSpec::new("a", 1), FieldSpec::new("b", 2)];
        // 两个通道：a 列 "12"，b 列 "xxyy"
        let [a, b] = split_columns(b"12xxyy", &fields, 2);
        assert_eq!(a, vec![&b"1"[..], &b"2"[..]]);
        assert_eq!(b, vec![&b"xx"[..], &b"yy"[..]]);
    }

    #[test]
    fn test_offsets_are_contiguous() {
        let counts = [4, 10, 0, 3];
        let layout = RecordLayout::new(&counts, 2, 1280).unwrap();
        assert_eq!(layout.offsets(), &[0, 8, 28, 28]);
        for i in 0..counts.len() - 1 {
            assert_eq!(layout.offsets()[i + 1] - layout.offsets()[i], counts[i] * 2);
        }
        assert_eq!(layout.record_size(), 34);
        assert_eq!(layout.samples_per_record(), 17);
    }

    #[test]
    fn test_positions() {
        let layout = RecordLayout::new(&[4, 4], 2, 768).unwrap();
        assert_eq!(layout.record_position(0), Some(768));
        assert_eq!(layout.record_position(2), Some(768 + 32));
        assert_eq!(layout.channel_position(1, 1), Some(768 + 16 + 8));
        assert_eq!(layout.channel_range(1), Some(8..16));
        assert_eq!(layout.channel_position(2, 0), None);
    }

    #[test]
    fn test_overflowing_layout_is_rejected() {
        assert!(RecordLayout::new(&[usize::MAX / 2, 1], 2, 0).is_none());
        assert!(RecordLayout::new(&[usize::MAX, 0], 2, 0).is_none());
    }

    #[test]
    fn test_positions_overflow_to_none() {
        let layout = RecordLayout::new(&[2], 2, 512).unwrap();
        assert_eq!(layout.record_position(u64::MAX / 2), None);
        assert_eq!(layout.channel_position(0, u64::MAX / 4), None);
        assert_eq!(layout.record_position(1000), Some(4512));
    }
}
