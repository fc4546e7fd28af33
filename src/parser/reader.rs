//! Byte reader for the WebAssembly binary format
//!
//! Reads fixed-width little-endian values, LEB128 integers and names from a
//! borrowed byte slice. Every read is bounds-checked and reports the offset it
//! failed at.

use super::ParseError;
use byteorder::{ByteOrder, LittleEndian};

pub struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Reader<'a> {
        Reader { bytes, pos: 0 }
    }

    // Basic operations --------------------------------------------------------

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_byte(&mut self) -> Result<u8, ParseError> {
        let byte = *self
            .bytes
            .get(self.pos)
            .ok_or(ParseError::UnexpectedEof(self.pos))?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ParseError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(ParseError::UnexpectedEof(self.pos))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Split off the next `len` bytes as an independent reader, advancing past them.
    pub fn sub_reader(&mut self, len: usize) -> Result<Reader<'a>, ParseError> {
        Ok(Reader::new(self.read_bytes(len)?))
    }

    // Read and interpret types ------------------------------------------------

    pub fn read_u32(&mut self) -> Result<u32, ParseError> {
        Ok(LittleEndian::read_u32(self.read_bytes(4)?))
    }

    pub fn read_f32(&mut self) -> Result<f32, ParseError> {
        Ok(LittleEndian::read_f32(self.read_bytes(4)?))
    }

    pub fn read_f64(&mut self) -> Result<f64, ParseError> {
        Ok(LittleEndian::read_f64(self.read_bytes(8)?))
    }

    pub fn read_vu32(&mut self) -> Result<u32, ParseError> {
        self.read_unsigned(32).map(|v| v as u32)
    }

    pub fn read_vs32(&mut self) -> Result<i32, ParseError> {
        self.read_signed(32).map(|v| v as i32)
    }

    pub fn read_vs64(&mut self) -> Result<i64, ParseError> {
        self.read_signed(64)
    }

    /// Read a vector length, rejecting counts above `limit` or counts that
    /// could not possibly fit in the remaining input.
    pub fn read_count(&mut self, limit: u32, what: &'static str) -> Result<u32, ParseError> {
        let count = self.read_vu32()?;
        if count > limit {
            return Err(ParseError::TooMany(what));
        }
        if count as usize > self.remaining() {
            return Err(ParseError::UnexpectedEof(self.pos));
        }
        Ok(count)
    }

    pub fn read_name(&mut self) -> Result<String, ParseError> {
        let len = self.read_vu32()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ParseError::InvalidUtf8)
    }

    fn read_unsigned(&mut self, bits: u32) -> Result<u64, ParseError> {
        let mut result: u64 = 0;
        let mut shift: u32 = 0;

        loop {
            let byte = self.read_byte()?;
            let payload = (byte & 0x7f) as u64;

            // The final byte may only carry as many bits as are left
            let remaining = bits - shift;
            if remaining < 7 && (payload >> remaining) != 0 {
                return Err(ParseError::IntegerTooLarge);
            }

            result |= payload << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }

            shift += 7;
            if shift >= bits {
                return Err(ParseError::IntegerTooLong);
            }
        }
    }

    fn read_signed(&mut self, bits: u32) -> Result<i64, ParseError> {
        let mut result: i64 = 0;
        let mut shift: u32 = 0;

        loop {
            let byte = self.read_byte()?;
            let payload = (byte & 0x7f) as i64;

            // Unused high bits of the final byte must replicate the sign bit
            let remaining = bits - shift;
            if remaining < 7 {
                let mask = (-1i64 << (remaining - 1)) & 0x7f;
                let extension = payload & mask;
                if extension != 0 && extension != mask {
                    return Err(ParseError::IntegerTooLarge);
                }
            }

            result |= payload << shift;
            shift += 7;

            if byte & 0x80 == 0 {
                if shift < 64 && (byte & 0x40) != 0 {
                    result |= -1i64 << shift;
                }
                return Ok(result);
            }

            if shift >= bits {
                return Err(ParseError::IntegerTooLong);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vu32(bytes: &[u8]) -> Result<u32, ParseError> {
        Reader::new(bytes).read_vu32()
    }

    fn vs32(bytes: &[u8]) -> Result<i32, ParseError> {
        Reader::new(bytes).read_vs32()
    }

    fn vs64(bytes: &[u8]) -> Result<i64, ParseError> {
        Reader::new(bytes).read_vs64()
    }

    #[test]
    fn test_read_vu32() {
        assert_eq!(vu32(&[0]).unwrap(), 0);
        assert_eq!(vu32(&[1]).unwrap(), 1);
        assert_eq!(vu32(&[0b11100101, 0b10001110, 0b00100110]).unwrap(), 624485);
        assert_eq!(vu32(&[0x7f]).unwrap(), 127);
        assert_eq!(vu32(&[0x80, 0x7f]).unwrap(), 16256);
        assert_eq!(vu32(&[0xb4, 0x07]).unwrap(), 0x3b4);
        assert_eq!(vu32(&[0xff, 0xff, 0xff, 0xff, 0xf]).unwrap(), 0xffffffff);
        assert_eq!(vu32(&[128, 128, 128, 128, 8]).unwrap(), 0x80000000);
    }

    #[test]
    fn test_read_vu32_rejects_overlong_and_oversized() {
        assert_eq!(
            vu32(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x00]),
            Err(ParseError::IntegerTooLong)
        );
        assert_eq!(vu32(&[0xff, 0xff, 0xff, 0xff, 0x1f]), Err(ParseError::IntegerTooLarge));
        assert_eq!(vu32(&[0x80]), Err(ParseError::UnexpectedEof(1)));
    }

    #[test]
    fn test_read_vs32() {
        assert_eq!(vs32(&[0]).unwrap(), 0);
        assert_eq!(vs32(&[0x2a]).unwrap(), 42);
        assert_eq!(vs32(&[0x7f]).unwrap(), -1);
        assert_eq!(vs32(&[0x80, 0x7f]).unwrap(), -128);
        assert_eq!(vs32(&[0b10011011, 0b11110001, 0b01011001]).unwrap(), -624485);
        assert_eq!(vs32(&[0x80, 0x80, 0x80, 0x80, 0x78]).unwrap(), i32::MIN);
        assert_eq!(vs32(&[0xff, 0xff, 0xff, 0xff, 0x07]).unwrap(), i32::MAX);
        assert_eq!(vs32(&[0xff, 0xff, 0xff, 0xff, 0x0f]), Err(ParseError::IntegerTooLarge));
    }

    #[test]
    fn test_read_vs64() {
        assert_eq!(vs64(&[0x7f]).unwrap(), -1);
        assert_eq!(vs64(&[0xb4, 0x07]).unwrap(), 0x3b4);
        assert_eq!(
            vs64(&[128, 128, 128, 128, 128, 128, 128, 252, 255, 0]).unwrap(),
            0x7ff8000000000000
        );
        assert_eq!(
            vs64(&[128, 128, 128, 128, 128, 128, 128, 128, 128, 127]).unwrap(),
            i64::MIN
        );
    }

    #[test]
    fn test_fixed_width_reads() {
        let mut reader = Reader::new(&[0x00, 0x61, 0x73, 0x6d, 0x00, 0x00, 0x28, 0x42]);
        assert_eq!(reader.read_u32().unwrap(), 0x6d736100);
        assert_eq!(reader.read_f32().unwrap(), 42.0);
        assert!(reader.is_empty());
        assert_eq!(reader.read_byte(), Err(ParseError::UnexpectedEof(8)));
    }

    #[test]
    fn test_read_name() {
        let mut reader = Reader::new(&[0x03, b's', b'u', b'b', 0x02, 0xff, 0xfe]);
        assert_eq!(reader.read_name().unwrap(), "sub");
        assert_eq!(reader.read_name(), Err(ParseError::InvalidUtf8));
    }
}
