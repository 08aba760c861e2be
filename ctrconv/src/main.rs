//! Command-line conversion between CTR containers and editable files.
//!
//! One subcommand per container, one direction flag per invocation:
//! `ctrconv bffnt -x -f font.bffnt` extracts a font into a JSON
//! manifest and PNG sheets; `-c` reverses the trip. SARC adds a list
//! mode and the optional zlib wrapping.

use clap::Parser;

mod bffnt;
mod bflim;
mod images;
mod msbt;
mod prompt;
mod sarc;

pub type BoxError = Box<dyn std::error::Error>;

#[derive(Debug, Parser)]
#[command(name = "ctrconv", version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Extract or create BFFNT bitmap fonts
    Bffnt(bffnt::BffntArgs),
    /// Extract or create BFLIM images
    Bflim(bflim::BflimArgs),
    /// Extract or pack MSBT message tables
    Msbt(msbt::MsbtArgs),
    /// Create, extract or list SARC archives
    Sarc(sarc::SarcArgs),
}

/// Flags shared by every subcommand.
#[derive(Debug, clap::Args)]
pub struct CommonArgs {
    /// Print more information while working
    #[arg(short, long)]
    pub verbose: bool,

    /// Print debug information
    #[arg(short, long)]
    pub debug: bool,

    /// Answer yes to questions (overwriting files)
    #[arg(short, long)]
    pub yes: bool,
}

/// Byte-order selection for the create modes.
#[derive(Debug, clap::Args)]
pub struct EndianArgs {
    /// Use little-endian encoding when creating (default)
    #[arg(short = 'l', long, group = "endian")]
    pub little_endian: bool,

    /// Use big-endian encoding when creating
    #[arg(short = 'b', long, group = "endian")]
    pub big_endian: bool,
}

impl EndianArgs {
    pub fn order(&self) -> ctr_types::ByteOrder {
        if self.big_endian {
            ctr_types::ByteOrder::Big
        } else {
            ctr_types::ByteOrder::Little
        }
    }
}

fn init_logging(common: &CommonArgs) {
    let level = if common.debug {
        log::LevelFilter::Debug
    } else if common.verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn main() {
    let args = Args::parse();
    let common = match &args.command {
        Command::Bffnt(a) => &a.common,
        Command::Bflim(a) => &a.common,
        Command::Msbt(a) => &a.common,
        Command::Sarc(a) => &a.common,
    };
    init_logging(common);

    let result = match &args.command {
        Command::Bffnt(a) => bffnt::run(a),
        Command::Bflim(a) => bflim::run(a),
        Command::Msbt(a) => msbt::run(a),
        Command::Sarc(a) => sarc::run(a),
    };
    if let Err(err) = result {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
