//! Read cursor over an inbound frame payload.
//!
//! All multi-byte integers on the wire are little-endian. Strings are a
//! 16-bit length followed by that many raw bytes. A position is the triple
//! x:u16, y:u16, z:u8. The cursor never reads past the payload; every
//! accessor reports an underrun instead.

/// Error produced when a decode runs off the end of the payload.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReadError {
    /// More bytes were requested than the payload still holds.
    #[error("underrun at offset {offset}: needed {needed} bytes, {remaining} left")]
    Underrun {
        /// Cursor offset at the failed read.
        offset: usize,
        /// Bytes the accessor needed.
        needed: usize,
        /// Bytes left in the payload.
        remaining: usize,
    },
}

/// Little-endian read cursor over a single frame payload.
#[derive(Debug)]
pub struct PacketReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    /// Wrap a frame payload. The cursor starts at offset 0.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// True once every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Current cursor offset from the start of the payload.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8], ReadError> {
        if self.remaining() < needed {
            return Err(ReadError::Underrun {
                offset: self.pos,
                needed,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(slice)
    }

    pub fn get_u8(&mut self) -> Result<u8, ReadError> {
        Ok(self.take(1)?[0])
    }

    pub fn get_u16(&mut self) -> Result<u16, ReadError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn get_u32(&mut self) -> Result<u32, ReadError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn get_u64(&mut self) -> Result<u64, ReadError> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(u64::from_le_bytes(raw))
    }

    /// Read a 16-bit-length-prefixed string. Bytes outside UTF-8 are
    /// replaced rather than rejected; the legacy client charset is a
    /// superset of ASCII and names survive intact.
    pub fn get_string(&mut self) -> Result<String, ReadError> {
        let len = self.get_u16()? as usize;
        let bytes = self.take(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Borrow the next `len` bytes without copying.
    pub fn get_bytes(&mut self, len: usize) -> Result<&'a [u8], ReadError> {
        self.take(len)
    }

    /// Advance past `len` bytes the decoder does not care about.
    pub fn skip(&mut self, len: usize) -> Result<(), ReadError> {
        self.take(len).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers_are_little_endian() {
        let buf = [0x2A, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12];
        let mut r = PacketReader::new(&buf);
        assert_eq!(r.get_u8().unwrap(), 0x2A);
        assert_eq!(r.get_u16().unwrap(), 0x1234);
        assert_eq!(r.get_u32().unwrap(), 0x12345678);
        assert!(r.is_empty());
    }

    #[test]
    fn test_u64_roundtrip() {
        let buf = 0xDEAD_BEEF_0BAD_F00Du64.to_le_bytes();
        let mut r = PacketReader::new(&buf);
        assert_eq!(r.get_u64().unwrap(), 0xDEAD_BEEF_0BAD_F00D);
    }

    #[test]
    fn test_string_is_length_prefixed() {
        let mut buf = vec![5, 0];
        buf.extend_from_slice(b"Nyala");
        buf.push(0xFF); // trailing byte must not be consumed
        let mut r = PacketReader::new(&buf);
        assert_eq!(r.get_string().unwrap(), "Nyala");
        assert_eq!(r.remaining(), 1, "string read must stop at its length");
    }

    #[test]
    fn test_empty_string() {
        let buf = [0, 0];
        let mut r = PacketReader::new(&buf);
        assert_eq!(r.get_string().unwrap(), "");
        assert!(r.is_empty());
    }

    #[test]
    fn test_underrun_reports_offsets() {
        let buf = [1, 2];
        let mut r = PacketReader::new(&buf);
        r.get_u8().unwrap();
        let err = r.get_u32().unwrap_err();
        let ReadError::Underrun {
            offset,
            needed,
            remaining,
        } = err;
        assert_eq!(offset, 1);
        assert_eq!(needed, 4);
        assert_eq!(remaining, 1);
    }

    #[test]
    fn test_underrun_does_not_advance_cursor() {
        let buf = [1, 2, 3];
        let mut r = PacketReader::new(&buf);
        assert!(r.get_u32().is_err());
        assert_eq!(r.remaining(), 3, "failed read must leave the cursor put");
        assert_eq!(r.get_u16().unwrap(), 0x0201);
    }

    #[test]
    fn test_string_length_past_end_is_underrun() {
        let buf = [10, 0, b'a', b'b'];
        let mut r = PacketReader::new(&buf);
        assert!(r.get_string().is_err());
    }

    #[test]
    fn test_skip_and_bytes() {
        let buf = [9, 9, 9, 1, 2, 3];
        let mut r = PacketReader::new(&buf);
        r.skip(3).unwrap();
        assert_eq!(r.get_bytes(3).unwrap(), &[1, 2, 3]);
        assert!(r.skip(1).is_err());
    }
}
