//! `ctrconv sarc`: archives to and from loose files.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};

use ctr_containers::containers::sarc::{self, Archive, ArchiveEntry};

use crate::{prompt, BoxError, CommonArgs, EndianArgs};

const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

#[derive(Debug, clap::Args)]
#[command(group = clap::ArgGroup::new("mode").required(true))]
pub struct SarcArgs {
    /// Create a SARC from files and directories
    #[arg(short, long, group = "mode")]
    pub create: bool,

    /// Extract the SARC
    #[arg(short = 'x', long, group = "mode")]
    pub extract: bool,

    /// List contents
    #[arg(short = 't', long, group = "mode")]
    pub list: bool,

    /// The SARC filename
    #[arg(short = 'f', long = "archive")]
    pub archive: PathBuf,

    /// Use zlib to compress or decompress the archive
    #[arg(short = 'z', long)]
    pub zlib: bool,

    /// zlib compression level
    #[arg(long, value_name = "LEVEL", default_value_t = DEFAULT_COMPRESSION_LEVEL)]
    pub compression_level: u32,

    /// Files to add to an archive
    pub file: Vec<PathBuf>,

    #[command(flatten)]
    pub endian: EndianArgs,

    #[command(flatten)]
    pub common: CommonArgs,
}

pub fn run(args: &SarcArgs) -> Result<(), BoxError> {
    if args.create {
        create(args)
    } else {
        read(args)
    }
}

/// Where nameless members land: `<archive stem>_/`.
fn noname_dir(archive: &Path) -> PathBuf {
    let stem = archive.file_stem().unwrap_or_default().to_string_lossy();
    archive.with_file_name(format!("{stem}_"))
}

/// Reject member names that would escape the working directory.
fn safe_member_path(name: &str) -> Option<PathBuf> {
    let path = Path::new(name);
    let ok = path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    ok.then(|| path.to_path_buf())
}

fn read(args: &SarcArgs) -> Result<(), BoxError> {
    let file = File::open(&args.archive)?;
    let physical_size = file.metadata()?.len();
    let reader = BufReader::new(file);
    let outdir = noname_dir(&args.archive);

    let nodes = sarc::read_archive(
        reader,
        args.zlib,
        args.extract,
        (!args.zlib).then_some(physical_size),
        |entry| {
            let target = match &entry.name {
                Some(name) => match safe_member_path(name) {
                    Some(path) => path,
                    None => {
                        log::warn!("skipping member with unsafe name: {name}");
                        return Ok(());
                    }
                },
                None => outdir.join(entry.display_name()),
            };
            log::info!("{}", target.display());
            if let Some(parent) = target.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            fs::write(&target, &entry.data)?;
            Ok(())
        },
    )?;

    if args.list {
        for node in &nodes {
            println!("{}", node.display_name());
        }
    } else {
        println!("Extracted {} files", nodes.len());
    }
    Ok(())
}

fn create(args: &SarcArgs) -> Result<(), BoxError> {
    let mut paths = Vec::new();
    for path in &args.file {
        collect(path, &mut paths)?;
    }
    if paths.is_empty() {
        return Err("nothing to archive".into());
    }

    let mut entries = Vec::with_capacity(paths.len());
    for path in paths {
        let data = fs::read(&path)?;
        let name = path.to_string_lossy().into_owned();
        match noname_hash(&path) {
            Some(hash) => entries.push(ArchiveEntry::hash_only(hash, data)),
            None => entries.push(ArchiveEntry::named(name, data)),
        }
    }

    let archive = Archive {
        order: args.endian.order(),
        entries,
    };
    let mut bytes = archive.build();
    if args.zlib {
        bytes = Archive::compress(&bytes, args.compression_level)?;
    }
    prompt::check_overwrite(&args.archive, args.common.yes)?;
    fs::write(&args.archive, bytes)?;
    println!("Created {}", args.archive.display());
    Ok(())
}

fn collect(path: &Path, out: &mut Vec<PathBuf>) -> Result<(), BoxError> {
    if path.is_dir() {
        let mut children: Vec<PathBuf> = fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<_, _>>()?;
        children.sort();
        for child in children {
            collect(&child, out)?;
        }
    } else {
        out.push(path.to_path_buf());
    }
    Ok(())
}

/// Sources named `0x<hex>.noname.bin` contribute only their hash.
fn noname_hash(path: &Path) -> Option<u32> {
    let name = path.file_name()?.to_str()?;
    let hex = name.strip_suffix(".noname.bin")?.strip_prefix("0x")?;
    u32::from_str_radix(hex, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noname_sources() {
        assert_eq!(
            noname_hash(Path::new("dir/0x00000042.noname.bin")),
            Some(0x42)
        );
        assert_eq!(noname_hash(Path::new("0xDEADBEEF.noname.bin")), Some(0xDEADBEEF));
        assert_eq!(noname_hash(Path::new("font.bffnt")), None);
        assert_eq!(noname_hash(Path::new("0xZZ.noname.bin")), None);
    }

    #[test]
    fn unsafe_member_names() {
        assert!(safe_member_path("textures/icon.bflim").is_some());
        assert!(safe_member_path("../escape").is_none());
        assert!(safe_member_path("/absolute").is_none());
    }
}
