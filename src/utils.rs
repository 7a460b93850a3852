use std::io::{self, Read};

use crate::error::{DecodeError, Result};

/// 最多读取 `len` 字节；遇到 EOF 时返回的数据可能更短
///
/// The buffer grows only with bytes actually present, so a header that
/// declares an enormous block cannot force a matching allocation.
pub fn read_up_to<R: Read>(reader: &mut R, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.take(len as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

/// Reads exactly `len` bytes of a fixed-size block.
///
/// A short read is reported as [`DecodeError::TruncatedRead`] naming `what`;
/// no partial block is ever returned.
pub fn read_block<R: Read>(reader: &mut R, len: usize, what: &'static str) -> Result<Vec<u8>> {
    let buf = read_up_to(reader, len)?;
    if buf.len() != len {
        return Err(DecodeError::TruncatedRead {
            what,
            expected: len,
            actual: buf.len(),
        });
    }
    Ok(buf)
}

/// 将定长字段按 7-bit ASCII 解码并去除前后空格
pub fn ascii_field(bytes: &[u8], field: &'static str) -> Result<String> {
    if !bytes.is_ascii() {
        return Err(DecodeError::invalid_field(
            field,
            String::from_utf8_lossy(bytes).into_owned(),
        ));
    }
    // is_ascii 已保证是合法 UTF-8
    Ok(String::from_utf8_lossy(bytes).trim().to_string())
}

/// 严格整数解析，不接受空串，不回退为 0
pub fn parse_int_field(s: &str, field: &'static str) -> Result<i64> {
    s.trim()
        .parse::<i64>()
        .map_err(|_| DecodeError::invalid_field(field, s))
}

/// 严格浮点解析
pub fn parse_float_field(s: &str, field: &'static str) -> Result<f64> {
    let value = s
        .trim()
        .parse::<f64>()
        .map_err(|_| DecodeError::invalid_field(field, s))?;
    if !value.is_finite() {
        return Err(DecodeError::invalid_field(field, s));
    }
    Ok(value)
}

/// Parses a non-negative count, rejecting negative values.
pub fn parse_count_field(s: &str, field: &'static str) -> Result<usize> {
    let value = parse_int_field(s, field)?;
    usize::try_from(value).map_err(|_| DecodeError::invalid_field(field, s))
}
