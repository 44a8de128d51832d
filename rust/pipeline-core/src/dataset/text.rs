// rust/pipeline-core/src/dataset/text.rs

//! Line-oriented text file sources.
//!
//! Every source yields UTF-8 lines with the trailing `\n` (or `\r\n`)
//! removed. Paths are checked when the source is built; files are opened
//! only when a traversal starts and closed when its iterator is dropped.
//!
//! - [`TextDataset`]: one file, sharded by line position modulo workers.
//! - [`ConcatTextDataset`]: several files read back to back as one line
//!   stream, sharded by position in the combined stream.
//! - [`ZipTextDataset`]: several files read in lockstep, one row per step,
//!   sharded by step.
//! - [`IndexedTextDataset`]: one file with a line-offset index, sharded into
//!   contiguous spans without scanning other workers' lines.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::{debug, trace};

use crate::config::TextConfig;
use crate::error::{PipelineError, Result};

use super::source::{SliceDataset, StreamDataset};
use super::traits::{IndexableSource, Records, StreamingSource};

pub type TextDataset = StreamDataset<TextLines>;
pub type ConcatTextDataset = StreamDataset<ConcatTextLines>;
pub type ZipTextDataset = StreamDataset<ZipTextLines>;
pub type IndexedTextDataset = SliceDataset<IndexedTextFile>;

impl TextDataset {
    /// # Errors
    ///
    /// Returns an error if `path` is missing or unreadable.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, &TextConfig::default())
    }

    pub fn open_with_config(path: impl AsRef<Path>, config: &TextConfig) -> Result<Self> {
        Ok(Self::new(TextLines::new(path, config)?))
    }
}

impl ConcatTextDataset {
    /// # Errors
    ///
    /// Returns an error if any path is missing or unreadable.
    pub fn open<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>) -> Result<Self> {
        Self::open_with_config(paths, &TextConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(
        paths: impl IntoIterator<Item = P>,
        config: &TextConfig,
    ) -> Result<Self> {
        Ok(Self::new(ConcatTextLines::new(paths, config)?))
    }
}

impl ZipTextDataset {
    /// # Errors
    ///
    /// Returns an error if any path is missing or unreadable.
    pub fn open<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>) -> Result<Self> {
        Self::open_with_config(paths, &TextConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(
        paths: impl IntoIterator<Item = P>,
        config: &TextConfig,
    ) -> Result<Self> {
        Ok(Self::new(ZipTextLines::new(paths, config)?))
    }
}

impl IndexedTextDataset {
    /// Builds the line index of `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is missing or cannot be read.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, &TextConfig::default())
    }

    pub fn open_with_config(path: impl AsRef<Path>, config: &TextConfig) -> Result<Self> {
        Ok(Self::new(IndexedTextFile::new(path, config)?))
    }
}

/// Lines of a single file.
#[derive(Debug, Clone)]
pub struct TextLines {
    path: PathBuf,
    buffer_size: usize,
}

impl TextLines {
    pub fn new(path: impl AsRef<Path>, config: &TextConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        check_readable(&path)?;
        Ok(Self {
            path,
            buffer_size: config.buffer_size,
        })
    }
}

impl StreamingSource for TextLines {
    type Item = String;

    fn stream(&self) -> Result<Records<'_, String>> {
        let file = open_file(&self.path)?;
        let reader = BufReader::with_capacity(self.buffer_size, file);
        Ok(Box::new(LineReader::new(reader, &self.path, 0)))
    }
}

/// Lines of several files, back to back.
#[derive(Debug, Clone)]
pub struct ConcatTextLines {
    paths: Vec<PathBuf>,
    buffer_size: usize,
}

impl ConcatTextLines {
    pub fn new<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>, config: &TextConfig) -> Result<Self> {
        let paths = checked_paths(paths)?;
        Ok(Self {
            paths,
            buffer_size: config.buffer_size,
        })
    }
}

impl StreamingSource for ConcatTextLines {
    type Item = String;

    fn stream(&self) -> Result<Records<'_, String>> {
        Ok(Box::new(ConcatLines {
            pending: self.paths.iter(),
            current: None,
            buffer_size: self.buffer_size,
            failed: false,
        }))
    }
}

struct ConcatLines<'a> {
    pending: std::slice::Iter<'a, PathBuf>,
    current: Option<LineReader<'a, BufReader<File>>>,
    buffer_size: usize,
    failed: bool,
}

impl Iterator for ConcatLines<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.failed {
                return None;
            }
            if let Some(lines) = self.current.as_mut() {
                if let Some(line) = lines.next() {
                    return Some(line);
                }
                // drop the exhausted file before opening the next one
                self.current = None;
            }

            let path = self.pending.next()?;
            trace!(path = %path.display(), "opening next file");
            match open_file(path) {
                Ok(file) => {
                    let reader = BufReader::with_capacity(self.buffer_size, file);
                    self.current = Some(LineReader::new(reader, path, 0));
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Lines of several files in lockstep; one row per step.
#[derive(Debug, Clone)]
pub struct ZipTextLines {
    paths: Vec<PathBuf>,
    buffer_size: usize,
}

impl ZipTextLines {
    pub fn new<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>, config: &TextConfig) -> Result<Self> {
        let paths = checked_paths(paths)?;
        Ok(Self {
            paths,
            buffer_size: config.buffer_size,
        })
    }
}

impl StreamingSource for ZipTextLines {
    type Item = Vec<String>;

    fn stream(&self) -> Result<Records<'_, Vec<String>>> {
        if self.paths.is_empty() {
            return Ok(Box::new(std::iter::empty()));
        }

        let mut readers = Vec::with_capacity(self.paths.len());
        for path in &self.paths {
            let reader = BufReader::with_capacity(self.buffer_size, open_file(path)?);
            readers.push(LineReader::new(reader, path, 0));
        }

        Ok(Box::new(std::iter::from_fn(move || {
            let mut row = Vec::with_capacity(readers.len());
            for reader in readers.iter_mut() {
                row.push(reader.next()?);
            }
            Some(row.into_iter().collect::<Result<Vec<_>>>())
        })))
    }
}

/// A text file with a line-offset index, readable by line range.
///
/// The index is built once when the source is opened: through a memory map
/// for files at or above the configured threshold, otherwise with a buffered
/// scan. The map is released as soon as the index is built.
#[derive(Debug, Clone)]
pub struct IndexedTextFile {
    path: PathBuf,
    // byte offset where each line starts, followed by the end of the last line
    offsets: Vec<u64>,
    buffer_size: usize,
}

impl IndexedTextFile {
    pub fn new(path: impl AsRef<Path>, config: &TextConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = open_file(&path)?;
        let size = file
            .metadata()
            .map_err(|e| PipelineError::source_with_io(&path, "failed to read file metadata", e))?
            .len();

        let offsets = if config.use_mmap && size > 0 && size >= config.mmap_threshold {
            // SAFETY: The file is opened read-only and the map is dropped
            // before this function returns.
            let mmap = unsafe { Mmap::map(&file) }
                .map_err(|e| PipelineError::source_with_io(&path, "failed to memory-map file", e))?;
            line_offsets(&mmap)
        } else {
            scan_line_offsets(BufReader::with_capacity(config.buffer_size, file), &path)?
        };

        debug!(path = %path.display(), lines = offsets.len() - 1, size, "indexed text file");
        Ok(Self {
            path,
            offsets,
            buffer_size: config.buffer_size,
        })
    }
}

impl IndexableSource for IndexedTextFile {
    type Item = String;

    fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    fn slice(&self, start: usize, end: usize) -> Result<Records<'_, String>> {
        let end = end.min(self.len());
        let start = start.min(end);
        if start == end {
            return Ok(Box::new(std::iter::empty()));
        }

        let byte_start = self.offsets[start];
        let byte_len = self.offsets[end] - byte_start;

        let mut file = open_file(&self.path)?;
        file.seek(SeekFrom::Start(byte_start)).map_err(|e| {
            PipelineError::source_with_io(&self.path, format!("failed to seek to position {byte_start}"), e)
        })?;
        let reader = BufReader::with_capacity(self.buffer_size, file.take(byte_len));
        Ok(Box::new(LineReader::new(reader, &self.path, start)))
    }
}

/// Reads `\n`-terminated lines, stripping the terminator and an optional
/// preceding `\r`.
struct LineReader<'a, R> {
    reader: R,
    path: &'a Path,
    line: usize,
    buf: Vec<u8>,
    failed: bool,
}

impl<'a, R: BufRead> LineReader<'a, R> {
    fn new(reader: R, path: &'a Path, first_line: usize) -> Self {
        Self {
            reader,
            path,
            line: first_line,
            buf: Vec::new(),
            failed: false,
        }
    }
}

impl<R: BufRead> Iterator for LineReader<'_, R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                let line = self.line;
                self.line += 1;
                Some(
                    std::str::from_utf8(strip_terminator(&self.buf))
                        .map(str::to_owned)
                        .map_err(|e| PipelineError::decode(self.path, line, e)),
                )
            }
            Err(e) => {
                // an I/O failure leaves the reader position undefined
                self.failed = true;
                Some(Err(PipelineError::source_with_io(
                    self.path,
                    format!("failed to read line {}", self.line),
                    e,
                )))
            }
        }
    }
}

fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn push_line_starts(chunk: &[u8], base: u64, offsets: &mut Vec<u64>) {
    offsets.extend(
        chunk
            .iter()
            .enumerate()
            .filter(|&(_, &byte)| byte == b'\n')
            .map(|(i, _)| base + i as u64 + 1),
    );
}

fn finish_offsets(mut offsets: Vec<u64>, size: u64) -> Vec<u64> {
    // a final line without a terminator still counts
    if offsets.last() != Some(&size) {
        offsets.push(size);
    }
    offsets
}

fn line_offsets(data: &[u8]) -> Vec<u64> {
    let mut offsets = vec![0];
    push_line_starts(data, 0, &mut offsets);
    finish_offsets(offsets, data.len() as u64)
}

fn scan_line_offsets<R: BufRead>(mut reader: R, path: &Path) -> Result<Vec<u64>> {
    let mut offsets = vec![0];
    let mut position = 0u64;

    loop {
        let chunk = reader
            .fill_buf()
            .map_err(|e| PipelineError::source_with_io(path, "failed to scan for line offsets", e))?;
        if chunk.is_empty() {
            break;
        }
        push_line_starts(chunk, position, &mut offsets);
        let consumed = chunk.len();
        position += consumed as u64;
        reader.consume(consumed);
    }

    Ok(finish_offsets(offsets, position))
}

fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| PipelineError::source_with_io(path, "failed to open file", e))
}

fn check_readable(path: &Path) -> Result<()> {
    let meta = std::fs::metadata(path)
        .map_err(|e| PipelineError::source_with_io(path, "failed to read file metadata", e))?;
    if meta.is_dir() {
        return Err(PipelineError::source(path, "path is a directory"));
    }
    open_file(path).map(drop)
}

fn checked_paths<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>) -> Result<Vec<PathBuf>> {
    paths
        .into_iter()
        .map(|p| {
            let path = p.as_ref().to_path_buf();
            check_readable(&path)?;
            Ok(path)
        })
        .collect()
}
