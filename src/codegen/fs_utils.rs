//! Filesystem utilities for generated output

use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Create (or truncate) a file, creating parent directories if needed
pub fn create_file<P: AsRef<Path>>(path: P) -> io::Result<fs::File> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::File::create(path)
}

/// Write `contents` to `path`, replacing any existing file.
///
/// The handle is flushed and dropped before returning, on success and on
/// failure alike. Returns the number of bytes written.
pub fn write_file<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> io::Result<usize> {
    let contents = contents.as_ref();
    let mut file = create_file(path)?;
    file.write_all(contents)?;
    file.flush()?;
    Ok(contents.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_file_creates_parents_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("users.go");

        assert_eq!(write_file(&path, "first version").unwrap(), 13);
        assert_eq!(write_file(&path, "second").unwrap(), 6);
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }
}
