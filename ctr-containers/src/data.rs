//! Raw container bytes and the positioned, order-aware cursor.

use ctr_types::{ByteOrder, Scalar, Tag};

use crate::error::ParseError;

/// A reference to raw container data.
///
/// This is a wrapper around a byte slice that provides bounds-checked
/// reads at absolute offsets. All multi-byte reads take the byte order
/// as a parameter; the order is a property of the container, discovered
/// from its marker, not of the data.
#[derive(Debug, Default, Clone, Copy)]
pub struct ByteData<'a> {
    bytes: &'a [u8],
}

impl<'a> ByteData<'a> {
    pub const fn new(bytes: &'a [u8]) -> Self {
        ByteData { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Read a scalar at the provided offset.
    pub fn read_at<T: Scalar>(&self, offset: usize, order: ByteOrder) -> Result<T, ParseError> {
        self.bytes
            .get(offset..)
            .and_then(|bytes| T::from_raw(bytes, order))
            .ok_or(ParseError::OutOfBounds)
    }

    /// Read a four-byte magic at the provided offset.
    pub fn tag_at(&self, offset: usize) -> Result<Tag, ParseError> {
        let end = offset.checked_add(4).ok_or(ParseError::OutOfBounds)?;
        let raw: [u8; 4] = self
            .bytes
            .get(offset..end)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(ParseError::OutOfBounds)?;
        Ok(Tag::from(raw))
    }

    /// Return `self[start..start + len]`.
    pub fn slice(&self, start: usize, len: usize) -> Result<&'a [u8], ParseError> {
        let end = start.checked_add(len).ok_or(ParseError::OutOfBounds)?;
        self.bytes.get(start..end).ok_or(ParseError::OutOfBounds)
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Start a cursor over this data in the given order.
    pub fn cursor(&self, order: ByteOrder) -> Cursor<'a> {
        Cursor {
            data: *self,
            pos: 0,
            order,
        }
    }
}

impl<'a> From<&'a [u8]> for ByteData<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        ByteData::new(bytes)
    }
}

/// A cursor for sequential reads during parsing.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    data: ByteData<'a>,
    pos: usize,
    order: ByteOrder,
}

impl<'a> Cursor<'a> {
    pub fn order(&self) -> ByteOrder {
        self.order
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Jump to an absolute position.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn skip(&mut self, n_bytes: usize) {
        self.pos = self.pos.saturating_add(n_bytes);
    }

    /// Read a scalar and advance the cursor.
    pub fn read<T: Scalar>(&mut self) -> Result<T, ParseError> {
        let value = self.data.read_at(self.pos, self.order)?;
        self.pos += T::RAW_BYTE_LEN;
        Ok(value)
    }

    /// Read a four-byte magic and advance the cursor.
    pub fn read_tag(&mut self) -> Result<Tag, ParseError> {
        let tag = self.data.tag_at(self.pos)?;
        self.pos += 4;
        Ok(tag)
    }

    /// Read a fixed-length blob and advance the cursor.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ParseError> {
        let bytes = self.data.slice(self.pos, len)?;
        self.pos += len;
        Ok(bytes)
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_checked_reads() {
        let data = ByteData::new(&[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(data.read_at::<u16>(0, ByteOrder::Big).unwrap(), 0xDEAD);
        assert_eq!(data.read_at::<u16>(2, ByteOrder::Little).unwrap(), 0xEFBE);
        assert!(matches!(
            data.read_at::<u32>(2, ByteOrder::Big),
            Err(ParseError::OutOfBounds)
        ));
    }

    #[test]
    fn cursor_walks_and_seeks() {
        let bytes = [b'S', b'A', b'R', b'C', 0x14, 0x00, 0xFF, 0xFE];
        let data = ByteData::new(&bytes);
        let mut cursor = data.cursor(ByteOrder::Little);
        assert_eq!(cursor.read_tag().unwrap(), Tag::new(b"SARC"));
        assert_eq!(cursor.read::<u16>().unwrap(), 0x14);
        assert_eq!(cursor.position(), 6);
        cursor.seek(0);
        assert_eq!(cursor.read_bytes(4).unwrap(), b"SARC");
        cursor.seek(7);
        assert!(matches!(
            cursor.read::<u16>(),
            Err(ParseError::OutOfBounds)
        ));
    }
}
