//! Checkpoint record layout
//!
//! A connection dump is a headerless sequence of fixed-size records, one per
//! live edge, in connector iteration order:
//!
//! | offset | width | field               |
//! |--------|-------|---------------------|
//! | 0      | 1     | `thread_id` (u8)    |
//! | 1      | 4     | `thread_local_slot` (u32) |
//! | 5      | 8     | `weight` (f64)      |
//! | 13     | 8     | `delay_ms` (f64)    |
//!
//! All multi-byte fields are little-endian. There is no padding.

use crate::{
    error::{Result, StorageError},
    sink::CheckpointSink,
};

use std::io::Read;

/// One serialized edge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckpointRecord {
    /// Thread that owns the target unit
    pub thread_id: u8,
    /// Thread-local slot of the target unit
    pub thread_local_slot: u32,
    /// Synaptic weight (`NaN` for unweighted synapse models)
    pub weight: f64,
    /// Delay in milliseconds
    pub delay_ms: f64,
}

impl CheckpointRecord {
    /// Encoded size of one record in bytes
    pub const SIZE: usize = 1 + 4 + 8 + 8;

    /// Create a new record
    pub fn new(thread_id: u8, thread_local_slot: u32, weight: f64, delay_ms: f64) -> Self {
        Self {
            thread_id,
            thread_local_slot,
            weight,
            delay_ms,
        }
    }

    /// Write the record field by field into a sink.
    ///
    /// Fields are handed over separately so that chunked sinks may split a
    /// record between two chunks at a field boundary.
    pub fn write_to(&self, sink: &mut dyn CheckpointSink) -> Result<()> {
        sink.write_field(&[self.thread_id])?;
        sink.write_field(&self.thread_local_slot.to_le_bytes())?;
        sink.write_field(&self.weight.to_le_bytes())?;
        sink.write_field(&self.delay_ms.to_le_bytes())?;
        Ok(())
    }

    /// Encode into a fixed byte array
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0] = self.thread_id;
        out[1..5].copy_from_slice(&self.thread_local_slot.to_le_bytes());
        out[5..13].copy_from_slice(&self.weight.to_le_bytes());
        out[13..21].copy_from_slice(&self.delay_ms.to_le_bytes());
        out
    }

    /// Decode from exactly [`Self::SIZE`] bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() != Self::SIZE {
            return Err(StorageError::invalid_format(format!(
                "record must be {} bytes, got {}",
                Self::SIZE,
                data.len()
            )));
        }

        let mut slot = [0u8; 4];
        slot.copy_from_slice(&data[1..5]);
        let mut weight = [0u8; 8];
        weight.copy_from_slice(&data[5..13]);
        let mut delay = [0u8; 8];
        delay.copy_from_slice(&data[13..21]);

        Ok(Self {
            thread_id: data[0],
            thread_local_slot: u32::from_le_bytes(slot),
            weight: f64::from_le_bytes(weight),
            delay_ms: f64::from_le_bytes(delay),
        })
    }
}

/// Decode a complete dump held in memory
pub fn decode_records(data: &[u8]) -> Result<Vec<CheckpointRecord>> {
    if data.len() % CheckpointRecord::SIZE != 0 {
        return Err(StorageError::invalid_format(format!(
            "dump length {} is not a multiple of the record size {}",
            data.len(),
            CheckpointRecord::SIZE
        )));
    }

    data.chunks_exact(CheckpointRecord::SIZE)
        .map(CheckpointRecord::from_bytes)
        .collect()
}

/// Streaming decoder over any reader
pub struct RecordReader<R> {
    inner: R,
    records_read: u64,
}

impl<R: Read> RecordReader<R> {
    /// Wrap a reader
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            records_read: 0,
        }
    }

    /// Number of records decoded so far
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    fn read_next(&mut self) -> Result<Option<CheckpointRecord>> {
        let mut buf = [0u8; CheckpointRecord::SIZE];
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.inner.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        match filled {
            0 => Ok(None),
            n if n == CheckpointRecord::SIZE => {
                self.records_read += 1;
                CheckpointRecord::from_bytes(&buf).map(Some)
            }
            n => Err(StorageError::invalid_format(format!(
                "truncated record {} ({} of {} bytes)",
                self.records_read,
                n,
                CheckpointRecord::SIZE
            ))),
        }
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<CheckpointRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::StreamSink;

    #[test]
    fn test_record_size_has_no_padding() {
        assert_eq!(CheckpointRecord::SIZE, 21);
        assert_eq!(CheckpointRecord::new(0, 0, 0.0, 0.0).to_bytes().len(), 21);
    }

    #[test]
    fn test_field_offsets() {
        let record = CheckpointRecord::new(7, 0x0102_0304, 1.0, 2.0);
        let bytes = record.to_bytes();
        assert_eq!(bytes[0], 7);
        assert_eq!(&bytes[1..5], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&bytes[5..13], &1.0f64.to_le_bytes());
        assert_eq!(&bytes[13..21], &2.0f64.to_le_bytes());
    }

    #[test]
    fn test_write_to_matches_to_bytes() {
        let record = CheckpointRecord::new(3, 42, -0.3, 1.5);
        let mut sink = StreamSink::new(Vec::new());
        record.write_to(&mut sink).unwrap();
        assert_eq!(sink.into_inner(), record.to_bytes().to_vec());
    }

    #[test]
    fn test_decode_rejects_partial_record() {
        let bytes = vec![0u8; CheckpointRecord::SIZE + 3];
        assert!(decode_records(&bytes).is_err());
    }

    #[test]
    fn test_reader_reports_truncation() {
        let mut bytes = CheckpointRecord::new(1, 2, 3.0, 4.0).to_bytes().to_vec();
        bytes.extend_from_slice(&[1, 2]);

        let mut reader = RecordReader::new(bytes.as_slice());
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().unwrap().is_err());
    }

    #[test]
    fn test_reader_preserves_nan_weight() {
        let bytes = CheckpointRecord::new(0, 9, f64::NAN, 0.1).to_bytes();
        let records: Vec<_> = RecordReader::new(&bytes[..])
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].weight.is_nan());
        assert_eq!(records[0].thread_local_slot, 9);
    }
}
