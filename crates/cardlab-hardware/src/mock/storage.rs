//! In-memory [`Storage`] and a recording [`Notifier`].

use std::collections::{HashMap, HashSet};
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};

use cardlab_core::CardSummary;

use crate::traits::{Notifier, Storage};

/// File store kept in a map. Paths are used verbatim as keys.
///
/// # Examples
///
/// ```
/// use cardlab_hardware::mock::MemoryStorage;
/// use cardlab_hardware::traits::Storage;
/// use std::io::{BufRead, Write};
/// use std::path::Path;
///
/// let mut storage = MemoryStorage::new();
/// storage.open_new(Path::new("/ext/a.nfc")).unwrap().write_all(b"line\r\n").unwrap();
///
/// let mut line = String::new();
/// storage.open_read(Path::new("/ext/a.nfc")).unwrap().read_line(&mut line).unwrap();
/// assert_eq!(line, "line\r\n");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    files: HashMap<PathBuf, Vec<u8>>,
    read_faults: HashSet<PathBuf>,
    write_faults: HashSet<PathBuf>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `contents` at `path`, replacing any previous file.
    pub fn insert(&mut self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), contents.into());
    }

    pub fn contents(&self, path: &Path) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    /// File contents as UTF-8 text.
    pub fn text(&self, path: &Path) -> Option<String> {
        self.contents(path)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Make reads of `path` fail after the file opens.
    pub fn fail_reads(&mut self, path: impl Into<PathBuf>) {
        self.read_faults.insert(path.into());
    }

    /// Make writes to `path` fail after the file is created.
    pub fn fail_writes(&mut self, path: impl Into<PathBuf>) {
        self.write_faults.insert(path.into());
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Storage for MemoryStorage {
    fn open_read(&mut self, path: &Path) -> io::Result<Box<dyn BufRead + '_>> {
        let Some(contents) = self.files.get(path) else {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            ));
        };
        if self.read_faults.contains(path) {
            return Ok(Box::new(FaultyIo));
        }
        Ok(Box::new(contents.as_slice()))
    }

    fn open_new(&mut self, path: &Path) -> io::Result<Box<dyn Write + '_>> {
        let file = self.files.entry(path.to_path_buf()).or_default();
        file.clear();
        if self.write_faults.contains(path) {
            return Ok(Box::new(FaultyIo));
        }
        Ok(Box::new(file))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }
}

/// Reader/writer whose every operation fails.
struct FaultyIo;

fn injected() -> io::Error {
    io::Error::other("injected I/O fault")
}

impl Read for FaultyIo {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(injected())
    }
}

impl BufRead for FaultyIo {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        Err(injected())
    }

    fn consume(&mut self, _amt: usize) {}
}

impl Write for FaultyIo {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(injected())
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(injected())
    }
}

/// Notifier that keeps every summary it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    updates: Vec<CardSummary>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> &[CardSummary] {
        &self.updates
    }

    pub fn last(&self) -> Option<&CardSummary> {
        self.updates.last()
    }
}

impl Notifier for RecordingNotifier {
    fn card_updated(&mut self, summary: &CardSummary) {
        self.updates.push(summary.clone());
    }
}
