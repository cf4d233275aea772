//! Output sinks and the factory that names them
//!
//! Each slice is written to its own sink. A [`SinkFactory`] hands out one
//! sink per call, numbered 0, 1, 2, ... without gaps. The controller calls it
//! under the same lock that bumps the slice sequence number.

use crate::error::{PipelineError, Result};
use std::collections::HashSet;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Cursor, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

/// Placeholder replaced by the sequence number in an output pattern
pub const SEQUENCE_PLACEHOLDER: &str = "{n}";

/// Byte destination a slice can be encoded into
pub trait SliceSink: Write + Seek + Send {}

impl<T: Write + Seek + Send> SliceSink for T {}

/// An allocated output destination
pub struct SinkHandle {
    sequence: u64,
    location: String,
    inner: Box<dyn SliceSink>,
}

impl SinkHandle {
    /// Wrap a sink
    pub fn new(sequence: u64, location: impl Into<String>, inner: Box<dyn SliceSink>) -> Self {
        Self {
            sequence,
            location: location.into(),
            inner,
        }
    }

    /// Sequence number the sink was allocated for
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Human-readable destination
    pub fn location(&self) -> &str {
        &self.location
    }
}

impl fmt::Debug for SinkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkHandle")
            .field("sequence", &self.sequence)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl Write for SinkHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Seek for SinkHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

/// Allocates a fresh, uniquely named sink per slice
pub trait SinkFactory: Send {
    /// Allocate the sink for the next sequence number
    fn next(&mut self) -> Result<SinkHandle>;
}

/// Creates one file per slice from a pattern such as `./{n}.wav`
///
/// Files are opened with exclusive create: an existing file is never
/// overwritten, and a location is never issued twice.
#[derive(Debug)]
pub struct FileSinkFactory {
    pattern: String,
    next_sequence: u64,
    issued: HashSet<PathBuf>,
}

impl FileSinkFactory {
    /// Create a factory; the pattern must contain `{n}`
    pub fn new(pattern: impl Into<String>) -> Result<Self> {
        let pattern = pattern.into();
        if !pattern.contains(SEQUENCE_PLACEHOLDER) {
            return Err(PipelineError::InvalidConfig(format!(
                "output pattern {pattern:?} has no {SEQUENCE_PLACEHOLDER} placeholder"
            )));
        }
        Ok(Self {
            pattern,
            next_sequence: 0,
            issued: HashSet::new(),
        })
    }

    /// Path a given sequence number maps to
    pub fn location_for(&self, sequence: u64) -> PathBuf {
        PathBuf::from(
            self.pattern
                .replace(SEQUENCE_PLACEHOLDER, &sequence.to_string()),
        )
    }

    /// Sequence number the next call to `next` will use
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }
}

impl SinkFactory for FileSinkFactory {
    fn next(&mut self) -> Result<SinkHandle> {
        let sequence = self.next_sequence;
        let path = self.location_for(sequence);
        let location = path.display().to_string();

        if self.issued.contains(&path) {
            return Err(PipelineError::SinkCreationFailed {
                location,
                source: io::Error::new(io::ErrorKind::AlreadyExists, "location already issued"),
            });
        }

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| PipelineError::SinkCreationFailed {
                location: location.clone(),
                source,
            })?;

        tracing::debug!(sequence, %location, "Slice sink created");
        self.issued.insert(path);
        self.next_sequence += 1;

        Ok(SinkHandle::new(sequence, location, Box::new(file)))
    }
}

type SharedBuffer = Arc<Mutex<Cursor<Vec<u8>>>>;

/// In-memory sink whose bytes stay readable through a [`MemoryStore`]
struct MemorySink(SharedBuffer);

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemorySink {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).seek(pos)
    }
}

/// Shared view of every slice a [`MemorySinkFactory`] produced
#[derive(Clone, Default)]
pub struct MemoryStore {
    slices: Arc<Mutex<Vec<SharedBuffer>>>,
}

impl MemoryStore {
    /// Number of sinks allocated so far
    pub fn len(&self) -> usize {
        self.slices.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True when no sink was allocated
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes written to slice `sequence`
    pub fn bytes(&self, sequence: u64) -> Option<Vec<u8>> {
        let slices = self.slices.lock().unwrap_or_else(PoisonError::into_inner);
        let buffer = slices.get(usize::try_from(sequence).ok()?)?;
        let bytes = buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_ref()
            .clone();
        Some(bytes)
    }

    fn push(&self, buffer: SharedBuffer) {
        self.slices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(buffer);
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("slices", &self.len())
            .finish()
    }
}

/// Factory keeping slices in memory, locations `mem://{n}`
#[derive(Debug, Default)]
pub struct MemorySinkFactory {
    store: MemoryStore,
}

impl MemorySinkFactory {
    /// Create a factory with an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for reading slices back
    pub fn store(&self) -> MemoryStore {
        self.store.clone()
    }
}

impl SinkFactory for MemorySinkFactory {
    fn next(&mut self) -> Result<SinkHandle> {
        let sequence = self.store.len() as u64;
        let buffer: SharedBuffer = Arc::default();
        self.store.push(Arc::clone(&buffer));

        Ok(SinkHandle::new(
            sequence,
            format!("mem://{sequence}"),
            Box::new(MemorySink(buffer)),
        ))
    }
}
