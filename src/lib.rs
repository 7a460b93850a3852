//! # edfraw
//!
//! A read-only decoder for two fixed-layout biosignal recording formats:
//!
//! * **EDF+**: European Data Format Plus, continuous recordings (`EDF+C`
//!   and plain EDF). ASCII headers, column-major signal table, interleaved
//!   little-endian 16-bit data records.
//! * **RAW**: NetStation continuous binary files. Big-endian header, 4-byte
//!   event code table, one record per sample instant with per-event flags.
//!
//! Headers are decoded once at open and never change; data records are
//! decoded on demand and owned by the caller.
//!
//! ## Reading an EDF+ file
//!
//! ```rust
//! use edfraw::{EdfReader, Result};
//!
//! fn main() -> Result<()> {
//!     # let dir = tempfile::tempdir().unwrap();
//!     # let path = dir.path().join("test_data.edf");
//!     # edfraw::doctest_utils::create_simple_edf_file(&path)?;
//!     let mut reader = EdfReader::open(&path)?;
//!
//!     let header = reader.header();
//!     println!("Signals: {}", header.signal_count);
//!     println!("Records: {} x {} s", header.datarecords, header.record_duration);
//!
//!     // 每个通道一条样本序列
//!     let channels = reader.read_all()?;
//!     for (signal, samples) in reader.signals().iter().zip(&channels) {
//!         println!("{}: {} samples", signal.label, samples.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Streaming a RAW file
//!
//! ```rust
//! use edfraw::{RawReader, Result};
//!
//! fn main() -> Result<()> {
//!     # let dir = tempfile::tempdir().unwrap();
//!     # let path = dir.path().join("session.raw");
//!     # edfraw::doctest_utils::create_simple_raw_file(&path)?;
//!     let mut reader = RawReader::open(&path)?;
//!
//!     while let Some(record) = reader.next_record()? {
//!         for code in &record.events {
//!             println!("event {} at sample {}", code, reader.records_read() - 1);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Physical values
//!
//! Samples are returned as stored. Scaling to physical units is explicit:
//!
//! ```rust
//! use edfraw::scale;
//!
//! let uv = scale(16384.0, (-32768.0, 32767.0), (-100.0, 100.0)).unwrap();
//! assert!((uv - 50.0).abs() < 0.1);
//! ```

pub mod error;
pub mod types;
pub mod utils;
pub mod layout;
pub mod reader;
pub mod raw;

#[doc(hidden)]
pub mod doctest_utils; // For doctests and integration tests

// Re-export main types for convenience
pub use error::{DecodeError, Result};
pub use types::{
    scale, DataRecord, EdfHeader, EndOfData, EventCode, PatientInfo, RawHeader, RawRecord,
    RawSamples, RecordingInfo, SampleFormat, SignalHeader,
};
pub use layout::RecordLayout;
pub use reader::EdfReader;
pub use raw::{RawReader, RawRecords};

// Format constants
pub const EDF_HEADER_SIZE: usize = 256;
pub const EDF_SIGNAL_HEADER_SIZE: usize = 256;
pub const EDF_SAMPLE_WIDTH: usize = 2;
pub const EDF_MAX_SIGNALS: usize = 4096;
pub const RAW_HEADER_SIZE: usize = 36;
pub const RAW_EVENT_CODE_WIDTH: usize = 4;

/// Library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
