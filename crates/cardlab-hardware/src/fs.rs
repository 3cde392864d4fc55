//! [`Storage`] backed by the local filesystem.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::traits::Storage;

/// Plain filesystem store. Parent directories are created on write.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStorage;

impl FsStorage {
    pub fn new() -> Self {
        Self
    }
}

impl Storage for FsStorage {
    fn open_read(&mut self, path: &Path) -> io::Result<Box<dyn BufRead + '_>> {
        debug!(path = %path.display(), "Opening file for read");
        Ok(Box::new(BufReader::new(File::open(path)?)))
    }

    fn open_new(&mut self, path: &Path) -> io::Result<Box<dyn Write + '_>> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        debug!(path = %path.display(), "Creating file");
        Ok(Box::new(BufWriter::new(File::create(path)?)))
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("card.nfc");
        let mut storage = FsStorage::new();

        {
            let mut writer = storage.open_new(&path).unwrap();
            writer.write_all(b"Filetype: M1 NFC device\r\n").unwrap();
            writer.write_all(b"Version: 4\r\n").unwrap();
            writer.flush().unwrap();
        }
        assert!(storage.exists(&path));

        let reader = storage.open_read(&path).unwrap();
        let lines: Vec<String> = reader.lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].trim_end(), "Version: 4");
    }

    #[test]
    fn test_open_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let mut storage = FsStorage::new();
        let err = storage.open_read(&dir.path().join("missing.nfc")).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
