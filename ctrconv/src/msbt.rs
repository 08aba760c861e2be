//! `ctrconv msbt`: message tables to and from a JSON document.

use std::fs;
use std::path::PathBuf;

use ctr_containers::containers::msbt::{Document, Msbt};

use crate::{prompt, BoxError, CommonArgs, EndianArgs};

#[derive(Debug, clap::Args)]
#[command(group = clap::ArgGroup::new("mode").required(true))]
pub struct MsbtArgs {
    /// Pack a JSON document into an MSBT file
    #[arg(short, long, group = "mode")]
    pub create: bool,

    /// Extract an MSBT file into a JSON document
    #[arg(short = 'x', long, group = "mode")]
    pub extract: bool,

    /// The MSBT file
    #[arg(short, long)]
    pub file: PathBuf,

    /// The JSON document to read from or write to
    #[arg(short, long)]
    pub json: PathBuf,

    /// Translate color escapes to and from [#rrggbbaa] markers
    #[arg(long)]
    pub colors: bool,

    #[command(flatten)]
    pub endian: EndianArgs,

    #[command(flatten)]
    pub common: CommonArgs,
}

pub fn run(args: &MsbtArgs) -> Result<(), BoxError> {
    if args.extract {
        extract(args)
    } else {
        create(args)
    }
}

fn extract(args: &MsbtArgs) -> Result<(), BoxError> {
    let bytes = fs::read(&args.file)?;
    let table = Msbt::parse(&bytes)?;
    log::info!("{}: {} texts", args.file.display(), table.text_count());
    let document = table.to_document(args.colors);
    prompt::check_overwrite(&args.json, args.common.yes)?;
    let mut json = serde_json::to_string_pretty(&document)?;
    json.push('\n');
    fs::write(&args.json, json)?;
    println!("Saved to file: {}", args.json.display());
    Ok(())
}

fn create(args: &MsbtArgs) -> Result<(), BoxError> {
    let document: Document = serde_json::from_str(&fs::read_to_string(&args.json)?)?;
    let table = Msbt::from_document(&document, args.endian.order(), args.colors)?;
    let bytes = table.build();
    prompt::check_overwrite(&args.file, args.common.yes)?;
    fs::write(&args.file, bytes)?;
    println!("Created {}", args.file.display());
    Ok(())
}
