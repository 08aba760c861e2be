//! The tiled texture layout shared by font sheets and layout images.
//!
//! GPU sheets store pixels in nested tiles: the canvas is rows of 8×8
//! tiles, a tile is 2×2 sub-tiles, a sub-tile 2×2 pixel groups, a group
//! 2×2 pixels. Equivalently, the low three bits of x and y interleave
//! into a 6-bit index within the tile. The canvas is padded up to
//! power-of-two extents (minimum 8) in both axes; pixels beyond the
//! declared size exist in storage but carry no image data.

use ctr_types::ByteOrder;

use crate::error::{BuildError, ParseError};
use crate::etc1;
use crate::pixel::{Bitmap, PixelFormat};

/// The padded extent of one axis: the next power of two, at least 8.
pub fn padded_extent(n: u32) -> u32 {
    n.next_power_of_two().max(8)
}

/// Map pixel coordinates to their index in tiled storage.
///
/// `padded_width` must be the [`padded_extent`] of the image width.
pub fn tiled_index(x: u32, y: u32, padded_width: u32) -> usize {
    let tile = (x / 8) + (y / 8) * (padded_width / 8);
    let within = (x % 2)
        + (x % 4 / 2) * 4
        + (x % 8 / 4) * 16
        + (y % 2) * 2
        + (y % 4 / 2) * 8
        + (y % 8 / 4) * 32;
    (tile * 64 + within) as usize
}

/// Map a tiled storage index back to pixel coordinates.
pub fn tiled_coords(index: usize, padded_width: u32) -> (u32, u32) {
    let tile = index as u32 / 64;
    let within = index as u32 % 64;
    let x = (within & 1) | ((within >> 2) & 1) << 1 | ((within >> 4) & 1) << 2;
    let y = ((within >> 1) & 1) | ((within >> 3) & 1) << 1 | ((within >> 5) & 1) << 2;
    let tiles_per_row = padded_width / 8;
    (
        x + (tile % tiles_per_row) * 8,
        y + (tile / tiles_per_row) * 8,
    )
}

/// Decode one stored sheet into a `width` × `height` RGBA8 bitmap,
/// dispatching block formats to the ETC1 decoder.
pub fn decode_sheet(
    data: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
    order: ByteOrder,
) -> Result<Bitmap, ParseError> {
    if format.is_compressed() {
        return etc1::decompress(data, width, height, format == PixelFormat::Etc1A4, order);
    }
    if data.len() < sheet_byte_len(width, height, format) {
        return Err(ParseError::TruncatedSection("sheet data"));
    }
    let padded_w = padded_extent(width);
    let mut bitmap = Bitmap::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let index = tiled_index(x, y, padded_w);
            bitmap.set_pixel(x, y, format.decode_pixel(data, index, order)?);
        }
    }
    Ok(bitmap)
}

/// Encode a bitmap into tiled sheet storage.
///
/// The output covers the whole padded canvas; padding pixels are
/// emitted as zeros. Returns the number of bytes such a sheet
/// occupies via the buffer length.
pub fn encode_sheet(
    bitmap: &Bitmap,
    format: PixelFormat,
    order: ByteOrder,
) -> Result<Vec<u8>, BuildError> {
    format.ensure_encodable()?;
    let padded_w = padded_extent(bitmap.width());
    let mut data = vec![0u8; sheet_byte_len(bitmap.width(), bitmap.height(), format)];
    for y in 0..bitmap.height() {
        for x in 0..bitmap.width() {
            let index = tiled_index(x, y, padded_w);
            format.encode_pixel(bitmap.pixel(x, y), &mut data, index, order);
        }
    }
    Ok(data)
}

/// Bytes occupied by the padded, tiled storage of a `width` × `height`
/// sheet in `format`.
pub fn sheet_byte_len(width: u32, height: u32, format: PixelFormat) -> usize {
    let pixels = padded_extent(width) as usize * padded_extent(height) as usize;
    pixels * format.bits_per_pixel() / 8
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctr_types::Rgba;

    #[test]
    fn padding_rule() {
        assert_eq!(padded_extent(1), 8);
        assert_eq!(padded_extent(8), 8);
        assert_eq!(padded_extent(12), 16);
        assert_eq!(padded_extent(17), 32);
        assert_eq!(padded_extent(256), 256);
    }

    #[test]
    fn index_is_morton_within_tile() {
        // the first pixel group of the first tile
        assert_eq!(tiled_index(0, 0, 8), 0);
        assert_eq!(tiled_index(1, 0, 8), 1);
        assert_eq!(tiled_index(0, 1, 8), 2);
        assert_eq!(tiled_index(1, 1, 8), 3);
        // next group to the right
        assert_eq!(tiled_index(2, 0, 8), 4);
        // second sub-tile row
        assert_eq!(tiled_index(0, 4, 8), 32);
        // second tile of a 16-wide canvas
        assert_eq!(tiled_index(8, 0, 16), 64);
        // second tile row
        assert_eq!(tiled_index(0, 8, 16), 128);
    }

    #[test]
    fn coords_invert_index() {
        for (width, height) in [(8u32, 8u32), (12, 17), (256, 512), (1024, 64)] {
            let padded_w = padded_extent(width);
            for y in 0..height {
                for x in 0..width {
                    let index = tiled_index(x, y, padded_w);
                    assert_eq!(tiled_coords(index, padded_w), (x, y));
                }
            }
        }
    }

    #[test]
    fn sheet_round_trip_odd_size() {
        // 12x17 forces padding to 16x32 in storage
        let mut bmp = Bitmap::new(12, 17);
        for y in 0..17 {
            for x in 0..12 {
                bmp.set_pixel(x, y, Rgba::new(x as u8 * 16, y as u8 * 12, 7, 255));
            }
        }
        for order in [ByteOrder::Big, ByteOrder::Little] {
            let data = encode_sheet(&bmp, PixelFormat::Rgba8, order).unwrap();
            assert_eq!(data.len(), 16 * 32 * 4);
            let back = decode_sheet(&data, 12, 17, PixelFormat::Rgba8, order).unwrap();
            assert_eq!(back, bmp);
        }
    }

    #[test]
    fn four_bit_sheets_share_bytes() {
        let mut bmp = Bitmap::new(8, 8);
        for y in 0..8 {
            for x in 0..8 {
                let a = ((x + y * 8) % 16) as u8 * 0x11;
                bmp.set_pixel(x, y, Rgba::new(0, 0, 0, a));
            }
        }
        let data = encode_sheet(&bmp, PixelFormat::A4, ByteOrder::Little).unwrap();
        assert_eq!(data.len(), 8 * 8 / 2);
        let back = decode_sheet(&data, 8, 8, PixelFormat::A4, ByteOrder::Little).unwrap();
        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(back.pixel(x, y).a, bmp.pixel(x, y).a, "at ({x},{y})");
            }
        }
    }
}
