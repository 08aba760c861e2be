//! The interactive overwrite prompt.

use std::io::{self, BufRead, Write};
use std::path::Path;

use crate::BoxError;

/// Ask before clobbering `path`, unless `--yes` was given or the file
/// does not exist. An error with a plain "Aborted." message bubbles up
/// as the process's failure line.
pub fn check_overwrite(path: &Path, yes: bool) -> Result<(), BoxError> {
    if yes || !path.exists() {
        return Ok(());
    }
    println!("File exists: {}", path.display());
    let stdin = io::stdin();
    loop {
        print!("Overwrite existing file? (y/N) ");
        io::stdout().flush()?;
        let mut answer = String::new();
        stdin.lock().read_line(&mut answer)?;
        match answer.trim().to_ascii_lowercase().as_str() {
            "y" => return Ok(()),
            "" | "n" => return Err("Aborted.".into()),
            _ => println!("Please answer \"y\" or \"n\""),
        }
    }
}
