//! The BFLIM layout image container.
//!
//! A BFLIM is a single tiled texture whose headers come *after* the
//! pixel data: the file is `[pixel data | FLIM header | imag header]`,
//! with both headers 0x14 bytes. Decoding therefore starts 0x28 bytes
//! from the end of the file.

use ctr_types::{ByteOrder, Tag};

use crate::data::ByteData;
use crate::error::{BuildError, ParseError};
use crate::pixel::{Bitmap, PixelFormat};
use crate::swizzle;
use crate::writer::Writer;

const FLIM_MAGIC: Tag = Tag::new(b"FLIM");
const IMAG_MAGIC: Tag = Tag::new(b"imag");

const FLIM_HEADER_LEN: usize = 0x14;
const IMAG_HEADER_LEN: usize = 0x14;
const FOOTER_LEN: usize = FLIM_HEADER_LEN + IMAG_HEADER_LEN;

/// The FLIM version constant observed in every known file.
const FLIM_VERSION: u32 = 0x0702_0000;

/// No reordering; the stored pixels are upright.
pub const SWIZZLE_NONE: u8 = 0;
/// The image is stored rotated 90 degrees.
pub const SWIZZLE_ROTATE_90: u8 = 4;
/// The image is stored transposed.
pub const SWIZZLE_TRANSPOSE: u8 = 8;

/// A decoded layout image.
///
/// The swizzle tag describes a display-time rotation; it is carried
/// through unchanged and never applied to the stored pixels.
#[derive(Debug, Clone)]
pub struct Bflim {
    pub order: ByteOrder,
    pub multiplier: u8,
    pub format: PixelFormat,
    /// The wire code of `format`; preserved because ETC1 has two
    /// aliases (0x0A and 0x13).
    pub format_code: u8,
    pub swizzle: u8,
    pub alignment: u16,
    pub image: Bitmap,
}

/// The BFLIM pixel-format code table. Codes are container-local and do
/// not match the BFFNT table for the same names.
pub fn format_from_code(code: u8) -> Option<PixelFormat> {
    Some(match code {
        0x00 => PixelFormat::L8,
        0x01 => PixelFormat::A8,
        0x02 => PixelFormat::La4,
        0x03 => PixelFormat::La8,
        0x04 => PixelFormat::Hilo8,
        0x05 => PixelFormat::Rgb565,
        0x06 => PixelFormat::Rgb8,
        0x07 => PixelFormat::Rgba5551,
        0x08 => PixelFormat::Rgba4,
        0x09 => PixelFormat::Rgba8,
        0x0A => PixelFormat::Etc1,
        0x0B => PixelFormat::Etc1A4,
        0x0C => PixelFormat::L4,
        0x0D => PixelFormat::A4,
        0x13 => PixelFormat::Etc1,
        _ => return None,
    })
}

pub fn format_code(format: PixelFormat) -> u8 {
    match format {
        PixelFormat::L8 => 0x00,
        PixelFormat::A8 => 0x01,
        PixelFormat::La4 => 0x02,
        PixelFormat::La8 => 0x03,
        PixelFormat::Hilo8 => 0x04,
        PixelFormat::Rgb565 => 0x05,
        PixelFormat::Rgb8 => 0x06,
        PixelFormat::Rgba5551 => 0x07,
        PixelFormat::Rgba4 => 0x08,
        PixelFormat::Rgba8 => 0x09,
        PixelFormat::Etc1 => 0x0A,
        PixelFormat::Etc1A4 => 0x0B,
        PixelFormat::L4 => 0x0C,
        PixelFormat::A4 => 0x0D,
    }
}

impl Bflim {
    /// Parse a BFLIM from its raw bytes.
    pub fn parse(bytes: &[u8]) -> Result<Bflim, ParseError> {
        let data = ByteData::new(bytes);
        let flim_start = bytes
            .len()
            .checked_sub(FOOTER_LEN)
            .ok_or(ParseError::TruncatedSection("FLIM"))?;

        // the BOM is a fixed two-byte pattern four bytes into the header
        let bom: [u8; 2] = [
            data.read_at::<u8>(flim_start + 4, ByteOrder::Big)?,
            data.read_at::<u8>(flim_start + 5, ByteOrder::Big)?,
        ];
        let order = ByteOrder::from_bom(bom).ok_or_else(|| {
            ParseError::BadBom(u16::from_be_bytes(bom))
        })?;

        let mut cursor = data.cursor(order);
        cursor.seek(flim_start);
        let magic = cursor.read_tag()?;
        if magic != FLIM_MAGIC {
            return Err(ParseError::BadMagic {
                container: "FLIM",
                found: magic.to_string(),
                expected: "FLIM",
            });
        }
        cursor.skip(2); // the marker we already read
        let header_size: u16 = cursor.read()?;
        if usize::from(header_size) != FLIM_HEADER_LEN {
            return Err(ParseError::BadHeaderSize {
                container: "FLIM",
                found: header_size.into(),
                expected: FLIM_HEADER_LEN as u32,
            });
        }
        let _version: u32 = cursor.read()?;
        let file_size: u32 = cursor.read()?;
        if file_size as usize != bytes.len() {
            log::warn!(
                "FLIM header disagrees with file size: header {file_size}, file {}",
                bytes.len()
            );
        }
        let _flags: u16 = cursor.read()?;
        let multiplier: u8 = cursor.read()?;
        let _reserved: u8 = cursor.read()?;

        let imag_magic = cursor.read_tag()?;
        if imag_magic != IMAG_MAGIC {
            return Err(ParseError::BadMagic {
                container: "FLIM",
                found: imag_magic.to_string(),
                expected: "imag",
            });
        }
        let parse_size: u32 = cursor.read()?;
        if parse_size != 0x10 {
            return Err(ParseError::BadHeaderSize {
                container: "imag",
                found: parse_size,
                expected: 0x10,
            });
        }
        let height: u16 = cursor.read()?;
        let width: u16 = cursor.read()?;
        let alignment: u16 = cursor.read()?;
        let format_code: u8 = cursor.read()?;
        let swizzle: u8 = cursor.read()?;
        let data_size: u32 = cursor.read()?;

        let format =
            format_from_code(format_code).ok_or(ParseError::UnknownPixelFormat(format_code))?;
        log::debug!(
            "imag: {width}x{height} format {} swizzle {swizzle} data {data_size}",
            format.name()
        );

        let pixel_data = data.slice(0, data_size as usize).map_err(|_| {
            ParseError::TruncatedSection("imag")
        })?;
        let image = swizzle::decode_sheet(pixel_data, width.into(), height.into(), format, order)?;

        Ok(Bflim {
            order,
            multiplier,
            format,
            format_code,
            swizzle,
            alignment,
            image,
        })
    }

    /// Serialize back to BFLIM bytes.
    pub fn build(&self) -> Result<Vec<u8>, BuildError> {
        let mut w = Writer::new(self.order);
        let pixel_data = swizzle::encode_sheet(&self.image, self.format, self.order)?;
        let data_size = pixel_data.len() as u32;
        w.write_bytes(&pixel_data);

        let file_size_pos = w.position() + 12;
        w.write_tag(FLIM_MAGIC);
        w.write_bytes(&self.order.to_bom());
        w.write(FLIM_HEADER_LEN as u16);
        w.write(FLIM_VERSION);
        w.write(0u32); // patched: total file size
        w.write(0x01u16);
        w.write(self.multiplier);
        w.write(0x00u8);

        w.write_tag(IMAG_MAGIC);
        w.write(0x10u32);
        w.write(self.image.height() as u16);
        w.write(self.image.width() as u16);
        w.write(self.alignment);
        w.write(self.format_code);
        w.write(self.swizzle);
        w.write(data_size);

        let total = w.position();
        w.patch(file_size_pos, total as u32);
        Ok(w.into_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctr_types::Rgba;

    fn checker(width: u32, height: u32) -> Bitmap {
        let mut bmp = Bitmap::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let on = (x + y) % 2 == 0;
                bmp.set_pixel(
                    x,
                    y,
                    if on {
                        Rgba::new(0xFF, 0x88, 0x00, 0xFF)
                    } else {
                        Rgba::new(0x11, 0x22, 0x33, 0x44)
                    },
                );
            }
        }
        bmp
    }

    fn sample(order: ByteOrder, format: PixelFormat, swizzle: u8) -> Bflim {
        Bflim {
            order,
            multiplier: 1,
            format,
            format_code: format_code(format),
            swizzle,
            alignment: 0x80,
            image: checker(64, 32),
        }
    }

    #[test]
    fn round_trip_both_orders() {
        for order in [ByteOrder::Big, ByteOrder::Little] {
            let original = sample(order, PixelFormat::Rgba8, SWIZZLE_NONE);
            let bytes = original.build().unwrap();
            let parsed = Bflim::parse(&bytes).unwrap();
            assert_eq!(parsed.order, order);
            assert_eq!(parsed.format, PixelFormat::Rgba8);
            assert_eq!(parsed.image, original.image);
            // and the re-encoded bytes are identical
            assert_eq!(parsed.build().unwrap(), bytes);
        }
    }

    #[test]
    fn header_reports_file_size() {
        let bytes = sample(ByteOrder::Little, PixelFormat::Rgba4, SWIZZLE_TRANSPOSE)
            .build()
            .unwrap();
        let len = bytes.len();
        let size_field =
            u32::from_le_bytes(bytes[len - 0x28 + 12..len - 0x28 + 16].try_into().unwrap());
        assert_eq!(size_field as usize, len);
    }

    #[test]
    fn rgba4_pixel_survives() {
        // transposed swizzle tag is metadata only; pixel (5,7) must
        // come back as its 4-bit-quantized self
        let original = sample(ByteOrder::Little, PixelFormat::Rgba4, SWIZZLE_TRANSPOSE);
        let bytes = original.build().unwrap();
        let parsed = Bflim::parse(&bytes).unwrap();
        assert_eq!(parsed.swizzle, SWIZZLE_TRANSPOSE);
        // (5,7) is an "on" checker pixel; every channel is a multiple
        // of 0x11, so 4-bit quantization is exact
        let px = parsed.image.pixel(5, 7);
        assert_eq!(px, Rgba::new(0xFF, 0x88, 0x00, 0xFF));
    }

    #[test]
    fn etc1_alias_code() {
        assert_eq!(format_from_code(0x13), Some(PixelFormat::Etc1));
        assert_eq!(format_from_code(0x0A), Some(PixelFormat::Etc1));
        assert_eq!(format_from_code(0x20), None);
    }

    #[test]
    fn rejects_bad_magic_and_bom() {
        let mut bytes = sample(ByteOrder::Little, PixelFormat::L8, SWIZZLE_NONE)
            .build()
            .unwrap();
        let flim = bytes.len() - 0x28;
        bytes[flim] = b'X';
        assert!(matches!(
            Bflim::parse(&bytes).unwrap_err(),
            ParseError::BadMagic { .. }
        ));
        bytes[flim] = b'F';
        bytes[flim + 4] = 0x00;
        assert!(matches!(
            Bflim::parse(&bytes).unwrap_err(),
            ParseError::BadBom(_)
        ));
    }
}
