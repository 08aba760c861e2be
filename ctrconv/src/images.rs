//! The PNG boundary: sheets cross it as 8-bit RGBA rows.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use ctr_containers::Bitmap;

use crate::BoxError;

pub fn write_rgba(path: &Path, bitmap: &Bitmap) -> Result<(), BoxError> {
    let file = File::create(path)?;
    let w = BufWriter::new(file);
    let mut encoder = png::Encoder::new(w, bitmap.width(), bitmap.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&bitmap.to_rgba_bytes())?;
    Ok(())
}

pub fn read_rgba(path: &Path) -> Result<Bitmap, BoxError> {
    let decoder = png::Decoder::new(File::open(path)?);
    let mut reader = decoder.read_info()?;
    let mut buf = vec![0u8; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf)?;
    if info.color_type != png::ColorType::Rgba || info.bit_depth != png::BitDepth::Eight {
        return Err(format!(
            "{}: input images must be 8-bit RGBA (found {:?}/{:?})",
            path.display(),
            info.color_type,
            info.bit_depth
        )
        .into());
    }
    buf.truncate(info.buffer_size());
    Ok(Bitmap::from_rgba_bytes(info.width, info.height, &buf)?)
}
