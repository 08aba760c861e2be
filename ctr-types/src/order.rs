//! Byte order selection and endian-parameterized integer coding.

/// The byte order of a container, as declared by its byte-order marker.
///
/// The marker is the two raw bytes at a fixed position near the start of
/// every container header: `FE FF` selects big-endian and `FF FE`
/// little-endian for all multi-byte integer fields that follow. Magic
/// tags are raw bytes and are not affected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Big,
    Little,
}

impl ByteOrder {
    /// Interpret a raw two-byte marker, returning `None` for anything
    /// that is not one of the two valid patterns.
    pub fn from_bom(bytes: [u8; 2]) -> Option<ByteOrder> {
        match bytes {
            [0xFE, 0xFF] => Some(ByteOrder::Big),
            [0xFF, 0xFE] => Some(ByteOrder::Little),
            _ => None,
        }
    }

    /// The raw marker bytes for this order.
    pub fn to_bom(self) -> [u8; 2] {
        match self {
            ByteOrder::Big => [0xFE, 0xFF],
            ByteOrder::Little => [0xFF, 0xFE],
        }
    }
}

/// An integer that can be read from or written to raw bytes in a
/// runtime-selected byte order.
///
/// The containers handled here carry their byte order in-band, so unlike
/// formats with a fixed on-disk order the conversion cannot be baked
/// into a wrapper type; it is a parameter of every read and write.
pub trait Scalar: Copy {
    /// Size of the encoded value in bytes.
    const RAW_BYTE_LEN: usize;

    /// Decode a value from the start of `bytes`, returning `None` if
    /// fewer than [`RAW_BYTE_LEN`](Self::RAW_BYTE_LEN) bytes are available.
    fn from_raw(bytes: &[u8], order: ByteOrder) -> Option<Self>;

    /// Append the encoded value to `out`.
    fn put_raw(self, order: ByteOrder, out: &mut Vec<u8>);
}

macro_rules! int_scalar {
    ($ty:ty) => {
        impl Scalar for $ty {
            const RAW_BYTE_LEN: usize = std::mem::size_of::<$ty>();

            fn from_raw(bytes: &[u8], order: ByteOrder) -> Option<Self> {
                let raw = bytes.get(..Self::RAW_BYTE_LEN)?.try_into().ok()?;
                Some(match order {
                    ByteOrder::Big => <$ty>::from_be_bytes(raw),
                    ByteOrder::Little => <$ty>::from_le_bytes(raw),
                })
            }

            fn put_raw(self, order: ByteOrder, out: &mut Vec<u8>) {
                match order {
                    ByteOrder::Big => out.extend_from_slice(&self.to_be_bytes()),
                    ByteOrder::Little => out.extend_from_slice(&self.to_le_bytes()),
                }
            }
        }
    };
}

int_scalar!(u8);
int_scalar!(i8);
int_scalar!(u16);
int_scalar!(i16);
int_scalar!(u32);
int_scalar!(u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bom_round_trip() {
        for order in [ByteOrder::Big, ByteOrder::Little] {
            assert_eq!(ByteOrder::from_bom(order.to_bom()), Some(order));
        }
        assert_eq!(ByteOrder::from_bom([0x00, 0x00]), None);
        assert_eq!(ByteOrder::from_bom([0xFF, 0xFF]), None);
    }

    #[test]
    fn scalar_both_orders() {
        assert_eq!(
            u32::from_raw(&[0x12, 0x34, 0x56, 0x78], ByteOrder::Big),
            Some(0x12345678)
        );
        assert_eq!(
            u32::from_raw(&[0x12, 0x34, 0x56, 0x78], ByteOrder::Little),
            Some(0x78563412)
        );
        assert_eq!(u32::from_raw(&[0x12, 0x34], ByteOrder::Big), None);

        let mut out = Vec::new();
        0x0102u16.put_raw(ByteOrder::Little, &mut out);
        assert_eq!(out, [0x02, 0x01]);
    }

    #[test]
    fn signed_scalar() {
        assert_eq!(i8::from_raw(&[0xFF], ByteOrder::Big), Some(-1));
        let mut out = Vec::new();
        (-2i8).put_raw(ByteOrder::Little, &mut out);
        assert_eq!(out, [0xFE]);
    }
}
