//! Scoped byte source over a raw waveform file

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::trace;

use crate::types::{RawError, Result};

/// Bytes examined by the format probe before the header scan.
pub const PROBE_LEN: usize = 10;

/// Exclusive handle on one input file for the duration of a parse.
///
/// The file is closed when the source is dropped, which covers every exit
/// path of the parse, success or failure.
pub struct ByteSource {
    inner: BufReader<File>,
}

impl ByteSource {
    /// Open a file, distinguishing missing files from other open failures.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => RawError::NotFound(path.to_path_buf()),
            _ => RawError::OpenFailed {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        trace!(path = %path.display(), "byte source opened");
        Ok(Self {
            inner: BufReader::new(file),
        })
    }

    /// Read the first [`PROBE_LEN`] bytes and rewind to the start of the file.
    pub fn probe(&mut self) -> Result<[u8; PROBE_LEN]> {
        let mut buf = [0u8; PROBE_LEN];
        self.inner.read_exact(&mut buf)?;
        self.rewind_to_start()?;
        Ok(buf)
    }

    pub fn rewind_to_start(&mut self) -> Result<()> {
        self.inner.seek(SeekFrom::Start(0))?;
        Ok(())
    }
}

impl Read for ByteSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Seek for ByteSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}
