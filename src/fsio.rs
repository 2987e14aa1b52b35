//! Thin file-content interface.
//!
//! Preview and replace surfaces in the embedding shell consume these
//! primitives; the core pipeline itself never calls them, but the
//! controller's results feed their arguments.

use crate::error::Result;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub trait FileAccess: Send + Sync {
    fn read_full(&self, path: &Path) -> Result<String>;

    /// Read a 1-based inclusive line range. Lines past the end of the file
    /// are simply absent from the result.
    fn read_range(&self, path: &Path, start_line: usize, end_line: usize) -> Result<String>;

    fn write(&self, path: &Path, content: &str) -> Result<()>;
}

/// Local-filesystem implementation.
pub struct LocalFiles;

impl FileAccess for LocalFiles {
    fn read_full(&self, path: &Path) -> Result<String> {
        Ok(fs::read_to_string(path)?)
    }

    fn read_range(&self, path: &Path, start_line: usize, end_line: usize) -> Result<String> {
        let start = start_line.max(1);
        if end_line < start {
            return Ok(String::new());
        }
        let file = fs::File::open(path)?;
        let reader = BufReader::new(file);

        // take() stops reading as soon as the range is satisfied.
        let lines: Vec<String> = reader
            .lines()
            .skip(start - 1)
            .take(end_line - start + 1)
            .collect::<std::io::Result<_>>()?;
        Ok(lines.join("\n"))
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        fs::write(path, content)?;
        Ok(())
    }
}
