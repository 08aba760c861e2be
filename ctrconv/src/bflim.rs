//! `ctrconv bflim`: layout images to and from PNG.

use std::fs;
use std::path::{Path, PathBuf};

use ctr_containers::containers::bflim::{self, Bflim};
use ctr_containers::PixelFormat;

use crate::{images, prompt, BoxError, CommonArgs, EndianArgs};

#[derive(Debug, clap::Args)]
#[command(group = clap::ArgGroup::new("mode").required(true))]
pub struct BflimArgs {
    /// Create a BFLIM from a PNG
    #[arg(short, long, group = "mode")]
    pub create: bool,

    /// Extract a BFLIM into a PNG
    #[arg(short = 'x', long, group = "mode")]
    pub extract: bool,

    /// The BFLIM file
    #[arg(short, long)]
    pub file: PathBuf,

    /// The PNG to read or write (default: the BFLIM's name with .png)
    #[arg(long)]
    pub png: Option<PathBuf>,

    /// Pixel format name when creating (e.g. RGBA8, RGB565, LA4)
    #[arg(long, default_value = "RGBA8")]
    pub format: String,

    /// Swizzle tag when creating: 0 none, 4 rotated, 8 transposed
    #[arg(long, default_value_t = 0)]
    pub swizzle: u8,

    #[command(flatten)]
    pub endian: EndianArgs,

    #[command(flatten)]
    pub common: CommonArgs,
}

fn png_path(args: &BflimArgs) -> PathBuf {
    args.png
        .clone()
        .unwrap_or_else(|| Path::new(&args.file).with_extension("png"))
}

pub fn run(args: &BflimArgs) -> Result<(), BoxError> {
    if args.extract {
        extract(args)
    } else {
        create(args)
    }
}

fn extract(args: &BflimArgs) -> Result<(), BoxError> {
    let bytes = fs::read(&args.file)?;
    let image = Bflim::parse(&bytes)?;
    log::info!(
        "{}: {}x{} {}",
        args.file.display(),
        image.image.width(),
        image.image.height(),
        image.format.name()
    );
    if image.swizzle != bflim::SWIZZLE_NONE {
        // the stored pixels are left as-is; viewers are expected to
        // apply the rotation the tag describes
        log::info!("image carries swizzle tag {}", image.swizzle);
    }
    let out = png_path(args);
    prompt::check_overwrite(&out, args.common.yes)?;
    images::write_rgba(&out, &image.image)?;
    println!("Extracted {}", out.display());
    Ok(())
}

fn create(args: &BflimArgs) -> Result<(), BoxError> {
    let format = PixelFormat::from_name(&args.format)
        .ok_or_else(|| format!("unknown pixel format name \"{}\"", args.format))?;
    let bitmap = images::read_rgba(&png_path(args))?;
    let image = Bflim {
        order: args.endian.order(),
        multiplier: 1,
        format,
        format_code: bflim::format_code(format),
        swizzle: args.swizzle,
        alignment: 0x80,
        image: bitmap,
    };
    let bytes = image.build()?;
    prompt::check_overwrite(&args.file, args.common.yes)?;
    fs::write(&args.file, bytes)?;
    println!("Created {}", args.file.display());
    Ok(())
}
