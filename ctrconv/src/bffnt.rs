//! `ctrconv bffnt`: fonts to and from a manifest plus sheet images.

use std::fs;
use std::path::{Path, PathBuf};

use ctr_containers::containers::bffnt::{Bffnt, Manifest};

use crate::{images, prompt, BoxError, CommonArgs, EndianArgs};

#[derive(Debug, clap::Args)]
#[command(group = clap::ArgGroup::new("mode").required(true))]
pub struct BffntArgs {
    /// Create a BFFNT from a manifest and sheet images
    #[arg(short, long, group = "mode")]
    pub create: bool,

    /// Extract a BFFNT into a manifest and sheet images
    #[arg(short = 'x', long, group = "mode")]
    pub extract: bool,

    /// The BFFNT file
    #[arg(short, long)]
    pub file: PathBuf,

    #[command(flatten)]
    pub endian: EndianArgs,

    #[command(flatten)]
    pub common: CommonArgs,
}

pub fn run(args: &BffntArgs) -> Result<(), BoxError> {
    if args.extract {
        extract(args)
    } else {
        create(args)
    }
}

fn manifest_path(file: &Path) -> PathBuf {
    sibling(file, "_manifest.json")
}

fn sheet_path(file: &Path, index: usize) -> PathBuf {
    sibling(file, &format!("_sheet{index}.png"))
}

fn sibling(file: &Path, suffix: &str) -> PathBuf {
    let stem = file.file_stem().unwrap_or_default().to_string_lossy();
    file.with_file_name(format!("{stem}{suffix}"))
}

fn extract(args: &BffntArgs) -> Result<(), BoxError> {
    let bytes = fs::read(&args.file)?;
    let font = Bffnt::parse(&bytes)?;
    log::info!(
        "{}: {} sheets, {} width sections, {} code maps",
        args.file.display(),
        font.sheets.len(),
        font.widths.len(),
        font.maps.len()
    );

    let manifest_out = manifest_path(&args.file);
    prompt::check_overwrite(&manifest_out, args.common.yes)?;
    for index in 0..font.sheets.len() {
        prompt::check_overwrite(&sheet_path(&args.file, index), args.common.yes)?;
    }

    let manifest = font.to_manifest();
    let mut json = serde_json::to_string_pretty(&manifest)?;
    json.push('\n');
    fs::write(&manifest_out, json)?;
    for (index, sheet) in font.sheets.iter().enumerate() {
        images::write_rgba(&sheet_path(&args.file, index), sheet)?;
    }
    println!("Extracted {}", args.file.display());
    Ok(())
}

fn create(args: &BffntArgs) -> Result<(), BoxError> {
    let manifest_in = manifest_path(&args.file);
    let manifest: Manifest = serde_json::from_str(&fs::read_to_string(&manifest_in)?)?;

    let mut sheets = Vec::with_capacity(manifest.texture_info.sheet_count.into());
    for index in 0..usize::from(manifest.texture_info.sheet_count) {
        sheets.push(images::read_rgba(&sheet_path(&args.file, index))?);
    }

    let font = Bffnt::from_manifest(&manifest, sheets, args.endian.order())?;
    let bytes = font.build()?;
    prompt::check_overwrite(&args.file, args.common.yes)?;
    fs::write(&args.file, bytes)?;
    println!("Created {}", args.file.display());
    Ok(())
}
