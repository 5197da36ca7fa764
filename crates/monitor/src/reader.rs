use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Upper bound on lines handed back by a single `LogReader::read_from` call.
pub const DEFAULT_BATCH_LINES: usize = 1024;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("failed to open `{}`: {source}", path.display())]
    Access {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("offset {offset} is past the end of the file ({len} bytes)")]
    Seek { offset: u64, len: u64 },
    #[error("read failed: {0}")]
    Io(#[from] io::Error),
}

/// Complete lines from an open file, starting at a byte offset.
///
/// Only newline-terminated lines are yielded. A trailing fragment without a
/// terminator is left in place and `offset()` stays in front of it, so the
/// whole line is picked up once it is finished.
pub struct NewLines {
    reader: BufReader<File>,
    offset: u64,
    buf: Vec<u8>,
}

impl NewLines {
    pub fn open(path: &Path, offset: u64) -> Result<Self, ReadError> {
        let mut file = File::open(path).map_err(|source| ReadError::Access {
            path: path.to_path_buf(),
            source,
        })?;
        let len = file.metadata()?.len();
        if offset > len {
            return Err(ReadError::Seek { offset, len });
        }
        file.seek(SeekFrom::Start(offset))?;

        Ok(Self {
            reader: BufReader::new(file),
            offset,
            buf: Vec::new(),
        })
    }

    /// Position just after the last line yielded.
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl Iterator for NewLines {
    type Item = Result<String, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(read) => {
                if self.buf.last() != Some(&b'\n') {
                    return None;
                }
                self.offset += read as u64;
                self.buf.pop();
                if self.buf.last() == Some(&b'\r') {
                    self.buf.pop();
                }
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(err) => Some(Err(err.into())),
        }
    }
}

/// Lines read by one call plus the offset to resume from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadBatch {
    pub lines: Vec<String>,
    pub end_offset: u64,
    /// `false` when the batch stopped at the line limit and more may follow.
    pub exhausted: bool,
}

/// Reopens its file on every call, so a reader never holds a descriptor
/// between poll cycles.
#[derive(Debug, Clone)]
pub struct LogReader {
    path: PathBuf,
    batch_lines: usize,
}

impl LogReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            batch_lines: DEFAULT_BATCH_LINES,
        }
    }

    pub fn with_batch_lines(mut self, batch_lines: usize) -> Self {
        self.batch_lines = batch_lines.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_from(&self, offset: u64) -> Result<ReadBatch, ReadError> {
        let mut lines_iter = NewLines::open(&self.path, offset)?;
        let mut lines = Vec::new();
        let mut exhausted = true;

        while lines.len() < self.batch_lines {
            match lines_iter.next() {
                Some(line) => lines.push(line?),
                None => break,
            }
        }
        if lines.len() == self.batch_lines {
            exhausted = false;
        }

        Ok(ReadBatch {
            lines,
            end_offset: lines_iter.offset(),
            exhausted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn reads_complete_lines_from_start() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "line 1\nline 2\n").unwrap();
        file.flush().unwrap();

        let batch = LogReader::new(file.path()).read_from(0).unwrap();
        assert_eq!(batch.lines, vec!["line 1", "line 2"]);
        assert_eq!(batch.end_offset, 14);
        assert!(batch.exhausted);
    }

    #[test]
    fn resumes_from_offset() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "line 1\nline 2\n").unwrap();
        file.flush().unwrap();

        let batch = LogReader::new(file.path()).read_from(7).unwrap();
        assert_eq!(batch.lines, vec!["line 2"]);
        assert_eq!(batch.end_offset, 14);
    }

    #[test]
    fn trailing_fragment_is_left_for_next_read() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "done\npart").unwrap();
        file.flush().unwrap();

        let reader = LogReader::new(file.path());
        let batch = reader.read_from(0).unwrap();
        assert_eq!(batch.lines, vec!["done"]);
        assert_eq!(batch.end_offset, 5);

        write!(file, "ial\n").unwrap();
        file.flush().unwrap();
        let batch = reader.read_from(batch.end_offset).unwrap();
        assert_eq!(batch.lines, vec!["partial"]);
        assert_eq!(batch.end_offset, 13);
    }

    #[test]
    fn crlf_terminator_is_stripped_but_counted() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "windows\r\n").unwrap();
        file.flush().unwrap();

        let batch = LogReader::new(file.path()).read_from(0).unwrap();
        assert_eq!(batch.lines, vec!["windows"]);
        assert_eq!(batch.end_offset, 9);
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"bad \xff byte\n").unwrap();
        file.flush().unwrap();

        let batch = LogReader::new(file.path()).read_from(0).unwrap();
        assert_eq!(batch.lines, vec!["bad \u{fffd} byte"]);
        assert_eq!(batch.end_offset, 11);
    }

    #[test]
    fn offset_past_end_is_a_seek_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "short\n").unwrap();
        file.flush().unwrap();

        let err = LogReader::new(file.path()).read_from(100).unwrap_err();
        assert!(matches!(err, ReadError::Seek { offset: 100, len: 6 }));
    }

    #[test]
    fn offset_at_end_yields_nothing() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "short\n").unwrap();
        file.flush().unwrap();

        let batch = LogReader::new(file.path()).read_from(6).unwrap();
        assert!(batch.lines.is_empty());
        assert_eq!(batch.end_offset, 6);
        assert!(batch.exhausted);
    }

    #[test]
    fn missing_file_is_an_access_error() {
        let err = LogReader::new("/definitely/not/here.log")
            .read_from(0)
            .unwrap_err();
        assert!(matches!(err, ReadError::Access { .. }));
    }

    #[test]
    fn batches_stop_at_line_limit() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "a\nb\nc\n").unwrap();
        file.flush().unwrap();

        let reader = LogReader::new(file.path()).with_batch_lines(2);
        let first = reader.read_from(0).unwrap();
        assert_eq!(first.lines, vec!["a", "b"]);
        assert!(!first.exhausted);

        let second = reader.read_from(first.end_offset).unwrap();
        assert_eq!(second.lines, vec!["c"]);
        assert_eq!(second.end_offset, 6);
        assert!(second.exhausted);
    }
}
