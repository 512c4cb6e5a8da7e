//! Primitive record I/O.
//!
//! Every record is a flat sequence of two field kinds:
//! - Fixed-width integers: 4 bytes, big-endian
//! - Blobs: 4-byte big-endian length followed by the raw bytes
//!
//! Records are small, so the whole file is read into memory and decoded from
//! a slice. Running off the end of the slice is reported as `Truncated` with
//! the name of the field being read.

use crate::codec::CodecError;

/// Size of a fixed-width integer field
pub const INT_SIZE: usize = 4;

/// Sequential reader over an in-memory record
pub struct RecordReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> RecordReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    /// Bytes not yet consumed
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    fn take(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], CodecError> {
        if len > self.remaining() {
            return Err(CodecError::Truncated { field });
        }
        let slice = &self.bytes[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    /// Read a big-endian u32
    pub fn read_u32(&mut self, field: &'static str) -> Result<u32, CodecError> {
        let bytes = self.take(INT_SIZE, field)?;
        let mut buf = [0u8; INT_SIZE];
        buf.copy_from_slice(bytes);
        Ok(u32::from_be_bytes(buf))
    }

    /// Read a u32 flag, true only when the stored value is exactly 1
    pub fn read_flag(&mut self, field: &'static str) -> Result<bool, CodecError> {
        Ok(self.read_u32(field)? == 1)
    }

    /// Read a length-prefixed blob
    pub fn read_blob(&mut self, field: &'static str) -> Result<Vec<u8>, CodecError> {
        let len = self.read_u32(field)? as usize;
        Ok(self.take(len, field)?.to_vec())
    }
}

/// Length prefix for a blob of `len` bytes
fn blob_len(len: usize) -> Result<u32, CodecError> {
    u32::try_from(len).map_err(|_| CodecError::BlobTooLarge { len })
}

/// Append-only writer producing a record
#[derive(Default)]
pub struct RecordWriter {
    buf: Vec<u8>,
}

impl RecordWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_flag(&mut self, value: bool) {
        self.write_u32(u32::from(value));
    }

    /// Write a length-prefixed blob
    pub fn write_blob(&mut self, blob: &[u8]) -> Result<(), CodecError> {
        self.write_u32(blob_len(blob.len())?);
        self.buf.extend_from_slice(blob);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u32_big_endian_format() {
        let mut writer = RecordWriter::new();
        writer.write_u32(0x0102_0304);
        assert_eq!(writer.into_bytes(), vec![0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_blob_is_length_prefixed() {
        let mut writer = RecordWriter::new();
        writer.write_blob(&[0xAA, 0xBB]).unwrap();
        assert_eq!(writer.into_bytes(), vec![0, 0, 0, 2, 0xAA, 0xBB]);
    }

    #[test]
    fn test_reader_consumes_fields_in_order() {
        let mut writer = RecordWriter::new();
        writer.write_u32(7);
        writer.write_blob(b"fp").unwrap();
        writer.write_flag(true);
        let bytes = writer.into_bytes();

        let mut reader = RecordReader::new(&bytes);
        assert_eq!(reader.read_u32("a").unwrap(), 7);
        assert_eq!(reader.read_blob("b").unwrap(), b"fp".to_vec());
        assert!(reader.read_flag("c").unwrap());
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_flag_only_true_for_one() {
        let bytes = 2u32.to_be_bytes();
        let mut reader = RecordReader::new(&bytes);
        assert!(!reader.read_flag("flag").unwrap());
    }

    #[test]
    fn test_short_integer_is_truncated() {
        let mut reader = RecordReader::new(&[0, 0, 1]);
        let err = reader.read_u32("counter").unwrap_err();
        assert!(matches!(err, CodecError::Truncated { field: "counter" }));
    }

    #[test]
    fn test_blob_longer_than_input_is_truncated() {
        // Claims 16 bytes, only 2 present
        let bytes = [0, 0, 0, 16, 1, 2];
        let mut reader = RecordReader::new(&bytes);
        let err = reader.read_blob("local fingerprint").unwrap_err();
        assert!(matches!(err, CodecError::Truncated { field: "local fingerprint" }));
    }

    #[test]
    fn test_blob_len_at_limit() {
        assert_eq!(blob_len(u32::MAX as usize).unwrap(), u32::MAX);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_blob_len_over_limit_is_rejected() {
        let len = u32::MAX as usize + 1;
        let err = blob_len(len).unwrap_err();
        assert!(matches!(err, CodecError::BlobTooLarge { len: l } if l == len));
    }
}
