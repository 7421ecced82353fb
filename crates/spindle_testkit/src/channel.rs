//! Scripted non-blocking channels.
//!
//! Both ends behave like a non-blocking socket: when nothing can move they
//! return [`io::ErrorKind::WouldBlock`] rather than blocking or reporting
//! end of stream.

use std::collections::VecDeque;
use std::io::{self, Read, Write};

#[derive(Debug)]
enum Step {
    Data(Vec<u8>),
    Gap,
    Fail(io::ErrorKind),
}

/// A reader that replays a script of chunks, gaps and failures.
///
/// A gap ends the current readiness callback: the read that hits it
/// returns `WouldBlock`. [`ScriptedReader::chunked`] puts a gap after every
/// chunk, so each callback sees exactly one chunk.
#[derive(Debug, Default)]
pub struct ScriptedReader {
    script: VecDeque<Step>,
    delivered: usize,
    closed: bool,
}

impl ScriptedReader {
    /// Creates an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits `bytes` into chunks of the given sizes, one per callback.
    ///
    /// Whatever the sizes leave over becomes a final chunk.
    #[must_use]
    pub fn chunked(bytes: &[u8], sizes: &[usize]) -> Self {
        let mut reader = Self::new();
        let mut rest = bytes;
        for &size in sizes {
            if rest.is_empty() {
                break;
            }
            let (head, tail) = rest.split_at(size.min(rest.len()));
            reader = reader.chunk(head).gap();
            rest = tail;
        }
        if !rest.is_empty() {
            reader = reader.chunk(rest).gap();
        }
        reader
    }

    /// Appends a chunk of bytes.
    #[must_use]
    pub fn chunk(mut self, bytes: &[u8]) -> Self {
        if !bytes.is_empty() {
            self.script.push_back(Step::Data(bytes.to_vec()));
        }
        self
    }

    /// Appends a would-block.
    #[must_use]
    pub fn gap(mut self) -> Self {
        self.script.push_back(Step::Gap);
        self
    }

    /// Appends a read failure.
    #[must_use]
    pub fn fail(mut self, kind: io::ErrorKind) -> Self {
        self.script.push_back(Step::Fail(kind));
        self
    }

    /// Reports end of stream once the script is exhausted.
    #[must_use]
    pub fn then_close(mut self) -> Self {
        self.closed = true;
        self
    }

    /// Bytes handed out so far.
    #[must_use]
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    /// Returns true once every scripted byte has been read.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        !self.script.iter().any(|step| matches!(step, Step::Data(_)))
    }
}

impl Read for ScriptedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.script.pop_front() {
            None if self.closed => Ok(0),
            None => Err(io::ErrorKind::WouldBlock.into()),
            Some(Step::Gap) => Err(io::ErrorKind::WouldBlock.into()),
            Some(Step::Fail(kind)) => Err(io::Error::new(kind, "scripted failure")),
            Some(Step::Data(mut data)) => {
                let n = buf.len().min(data.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    data.drain(..n);
                    self.script.push_front(Step::Data(data));
                }
                self.delivered += n;
                Ok(n)
            }
        }
    }
}

/// A writer with a byte budget per readiness callback.
///
/// Each write accepts at most `per_call` bytes; once the budget is spent,
/// writes would block until [`ThrottledWriter::grant`] refills it.
#[derive(Debug)]
pub struct ThrottledWriter {
    written: Vec<u8>,
    per_call: usize,
    budget: usize,
    fail: Option<io::ErrorKind>,
}

impl ThrottledWriter {
    /// Creates a writer accepting at most `per_call` bytes per write and an
    /// unlimited budget.
    #[must_use]
    pub fn new(per_call: usize) -> Self {
        Self {
            written: Vec::new(),
            per_call: per_call.max(1),
            budget: usize::MAX,
            fail: None,
        }
    }

    /// Creates a writer that accepts `budget` bytes before blocking.
    #[must_use]
    pub fn with_budget(budget: usize) -> Self {
        let mut writer = Self::new(usize::MAX);
        writer.budget = budget;
        writer
    }

    /// Sets the bytes accepted before the next would-block.
    pub fn grant(&mut self, budget: usize) {
        self.budget = budget;
    }

    /// Makes every following write fail with `kind`.
    pub fn fail_with(&mut self, kind: io::ErrorKind) {
        self.fail = Some(kind);
    }

    /// Everything accepted so far.
    #[must_use]
    pub fn written(&self) -> &[u8] {
        &self.written
    }
}

impl Default for ThrottledWriter {
    fn default() -> Self {
        Self::new(usize::MAX)
    }
}

impl Write for ThrottledWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(kind) = self.fail {
            return Err(io::Error::new(kind, "scripted failure"));
        }
        if self.budget == 0 {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        let n = buf.len().min(self.per_call).min(self.budget);
        self.written.extend_from_slice(&buf[..n]);
        self.budget -= n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_callback(reader: &mut ScriptedReader) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 4];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => out.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => panic!("unexpected {e}"),
            }
        }
        out
    }

    #[test]
    fn one_chunk_per_callback() {
        let mut reader = ScriptedReader::chunked(b"abcdefghij", &[3, 5]);
        assert_eq!(read_callback(&mut reader), b"abc");
        assert_eq!(read_callback(&mut reader), b"defgh");
        assert_eq!(read_callback(&mut reader), b"ij");
        assert!(reader.is_drained());
        assert_eq!(read_callback(&mut reader), b"");
        assert_eq!(reader.delivered(), 10);
    }

    #[test]
    fn closed_reader_reports_eof() {
        let mut reader = ScriptedReader::new().chunk(b"xy").then_close();
        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).unwrap(), 2);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn scripted_failure() {
        let mut reader = ScriptedReader::new().fail(io::ErrorKind::ConnectionReset);
        let mut buf = [0u8; 8];
        assert_eq!(
            reader.read(&mut buf).unwrap_err().kind(),
            io::ErrorKind::ConnectionReset
        );
    }

    #[test]
    fn writer_budget() {
        let mut writer = ThrottledWriter::with_budget(5);
        assert_eq!(writer.write(b"abcdefg").unwrap(), 5);
        assert_eq!(
            writer.write(b"fg").unwrap_err().kind(),
            io::ErrorKind::WouldBlock
        );
        writer.grant(10);
        assert_eq!(writer.write(b"fg").unwrap(), 2);
        assert_eq!(writer.written(), b"abcdefg");
    }

    #[test]
    fn writer_per_call_limit() {
        let mut writer = ThrottledWriter::new(2);
        assert_eq!(writer.write(b"abc").unwrap(), 2);
        writer.fail_with(io::ErrorKind::BrokenPipe);
        assert!(writer.write(b"c").is_err());
    }
}
