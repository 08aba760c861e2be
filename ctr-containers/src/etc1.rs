//! ETC1 and ETC1A4 block decompression.
//!
//! Each 8-byte block covers a 4×4 pixel tile: two base colors, two
//! modifier-table selectors and per-pixel modifier bits. ETC1A4 blocks
//! are 16 bytes, the first 8 being a 4-bit-per-pixel alpha plane.
//! Blocks are stored in the same nested tile order as the linear
//! formats' swizzle: rows of 8×8 tiles, each tile holding 2×2 blocks.
//!
//! There is no compressor; sheets in these formats cannot be rebuilt
//! from RGBA8 input.

use ctr_types::{ByteOrder, Rgba, Scalar};

use crate::error::ParseError;
use crate::pixel::{expand4, expand5, Bitmap};
use crate::swizzle::padded_extent;

/// Bytes per block without the alpha plane.
pub const BLOCK_LEN: usize = 8;
/// Bytes per block with the alpha plane.
pub const ALPHA_BLOCK_LEN: usize = 16;

/// Modifier magnitudes, indexed by table selector then magnitude bit.
const MODIFIERS: [[i32; 2]; 8] = [
    [2, 8],
    [5, 17],
    [9, 29],
    [13, 42],
    [18, 60],
    [24, 80],
    [33, 106],
    [47, 183],
];

/// Decompress a stream of blocks into a `width` × `height` bitmap.
///
/// The block grid covers the power-of-two padded canvas; pixels
/// outside the declared size are decoded and discarded. The alpha
/// plane is a little-endian word regardless of the container order;
/// the color word follows the container.
pub fn decompress(
    data: &[u8],
    width: u32,
    height: u32,
    with_alpha: bool,
    order: ByteOrder,
) -> Result<Bitmap, ParseError> {
    let block_len = if with_alpha { ALPHA_BLOCK_LEN } else { BLOCK_LEN };
    let padded_w = padded_extent(width);
    let padded_h = padded_extent(height);
    let grid_len = (padded_w / 8) as usize * (padded_h / 8) as usize * 4 * block_len;
    if data.len() < grid_len {
        return Err(ParseError::TruncatedBlock);
    }
    let mut bitmap = Bitmap::new(width, height);
    let mut offset = 0usize;

    for tile_y in 0..padded_h / 8 {
        for tile_x in 0..padded_w / 8 {
            for block_y in 0..2u32 {
                for block_x in 0..2u32 {
                    let block = data
                        .get(offset..offset + block_len)
                        .ok_or(ParseError::TruncatedBlock)?;
                    offset += block_len;

                    let (alpha_word, color_bytes) = if with_alpha {
                        // this can't fail, the slice is exactly 8 bytes
                        let raw: [u8; 8] = block[..8].try_into().unwrap_or_default();
                        (u64::from_le_bytes(raw), &block[8..])
                    } else {
                        (!0u64, block)
                    };
                    let color_word = u64::from_raw(color_bytes, order)
                        .ok_or(ParseError::TruncatedBlock)?;
                    let pixels = decode_block(color_word, alpha_word);

                    for px in 0..4u32 {
                        for py in 0..4u32 {
                            let x = tile_x * 8 + block_x * 4 + px;
                            let y = tile_y * 8 + block_y * 4 + py;
                            if x < width && y < height {
                                bitmap.set_pixel(x, y, pixels[(px * 4 + py) as usize]);
                            }
                        }
                    }
                }
            }
        }
    }
    Ok(bitmap)
}

/// Decode one block into its 16 pixels, indexed column-major as
/// `px * 4 + py`.
fn decode_block(word: u64, alpha_word: u64) -> [Rgba; 16] {
    let differential = (word >> 33) & 1 == 1;
    let orientation = (word >> 32) & 1 == 1;
    let table1 = ((word >> 37) & 0x7) as usize;
    let table2 = ((word >> 34) & 0x7) as usize;

    let (base1, base2) = if differential {
        let r1 = ((word >> 59) & 0x1F) as i32;
        let g1 = ((word >> 51) & 0x1F) as i32;
        let b1 = ((word >> 43) & 0x1F) as i32;
        let r2 = (r1 + sign_extend3((word >> 56) & 0x7)).clamp(0, 31);
        let g2 = (g1 + sign_extend3((word >> 48) & 0x7)).clamp(0, 31);
        let b2 = (b1 + sign_extend3((word >> 40) & 0x7)).clamp(0, 31);
        (
            [expand5(r1 as u8), expand5(g1 as u8), expand5(b1 as u8)],
            [expand5(r2 as u8), expand5(g2 as u8), expand5(b2 as u8)],
        )
    } else {
        (
            [
                expand4(((word >> 60) & 0xF) as u8),
                expand4(((word >> 52) & 0xF) as u8),
                expand4(((word >> 44) & 0xF) as u8),
            ],
            [
                expand4(((word >> 56) & 0xF) as u8),
                expand4(((word >> 48) & 0xF) as u8),
                expand4(((word >> 40) & 0xF) as u8),
            ],
        )
    };

    let mut pixels = [Rgba::TRANSPARENT; 16];
    for px in 0..4u32 {
        for py in 0..4u32 {
            let i = px * 4 + py;
            // orientation 1 splits the block into 4x2 halves chosen by
            // row, orientation 0 into 2x4 halves chosen by column
            let first_half = if orientation { py < 2 } else { px < 2 };
            let (base, table) = if first_half {
                (base1, table1)
            } else {
                (base2, table2)
            };
            let magnitude = ((word >> i) & 1) as usize;
            let negative = (word >> (i + 16)) & 1 == 1;
            let mut modifier = MODIFIERS[table][magnitude];
            if negative {
                modifier = -modifier;
            }
            let alpha = expand4(((alpha_word >> (i * 4)) & 0xF) as u8);
            pixels[i as usize] = Rgba::new(
                (i32::from(base[0]) + modifier).clamp(0, 255) as u8,
                (i32::from(base[1]) + modifier).clamp(0, 255) as u8,
                (i32::from(base[2]) + modifier).clamp(0, 255) as u8,
                alpha,
            );
        }
    }
    pixels
}

fn sign_extend3(v: u64) -> i32 {
    let v = v as i32;
    if v & 0x4 != 0 {
        v - 8
    } else {
        v
    }
}
