//! File-backed append-only log segment.
//!
//! Transfers between a segment and a channel copy through a caller-owned
//! scratch buffer. Channels are plain [`Read`]/[`Write`] trait objects, so
//! there is no descriptor to hand to `splice` or `sendfile`.

use crate::error::{StorageError, StorageResult, TransferError};
use crate::pio;
use bytes::Bytes;
use spindle_codec::{Event, EventHeader, Tag, MAX_HEADER_LEN};
use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// A single append-only file holding a contiguous run of framed events.
///
/// All I/O is positional, so one writer and any number of readers can share
/// a handle without coordinating a file cursor. Readers only touch byte
/// ranges that were published after being written, which keeps them clear
/// of the writer's append region.
///
/// # Example
///
/// ```no_run
/// use spindle_storage::Segment;
/// use std::path::Path;
///
/// let segment = Segment::open(Path::new("channel.seg")).unwrap();
/// let offset = segment.reserve(5);
/// segment.write_at(b"hello", offset).unwrap();
/// segment.sync_data().unwrap();
/// ```
#[derive(Debug)]
pub struct Segment {
    path: PathBuf,
    file: File,
    /// End of the reserved append region.
    len: AtomicU64,
}

impl Segment {
    /// Opens or creates a segment at the given path.
    ///
    /// Existing content is kept; appends continue after it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            len: AtomicU64::new(len),
        })
    }

    /// Opens or creates a segment, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or file cannot be opened.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current segment length: the offset the next append will use.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len.load(Ordering::Acquire)
    }

    /// Returns true if nothing has been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Claims `frame_len` bytes at the end of the segment.
    ///
    /// Returns the segment length before the claim, which becomes the
    /// offset of the frame. Two claims never overlap.
    pub fn reserve(&self, frame_len: u64) -> u64 {
        self.len.fetch_add(frame_len, Ordering::AcqRel)
    }

    /// Writes all of `buf` at `offset`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error from the file.
    pub fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<()> {
        pio::write_all_at(&self.file, buf, offset)
    }

    /// Reads into `buf` from `offset`, returning fewer bytes only at end of file.
    ///
    /// # Errors
    ///
    /// Returns the I/O error from the file.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        pio::read_full_at(&self.file, buf, offset)
    }

    /// Moves up to `count` bytes from `src` into the segment at `position`.
    ///
    /// Reads as much as `src` currently offers, using `scratch` as the copy
    /// buffer. A would-block or end of stream ends the transfer early; the
    /// return value is the number of bytes actually moved, which may be zero.
    ///
    /// # Errors
    ///
    /// Returns a [`TransferError`] carrying the bytes consumed from `src`
    /// before the failure, including any chunk that was read but could not be
    /// written.
    pub fn transfer_from<R: Read + ?Sized>(
        &self,
        src: &mut R,
        position: u64,
        count: u64,
        scratch: &mut [u8],
    ) -> Result<u64, TransferError> {
        let mut moved = 0u64;
        while moved < count && !scratch.is_empty() {
            let want = chunk_len(count - moved, scratch.len());
            let n = match src.read(&mut scratch[..want]) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransferError::new(moved, e)),
            };
            if let Err(e) = self.write_at(&scratch[..n], position + moved) {
                return Err(TransferError::new(moved + n as u64, e));
            }
            moved += n as u64;
        }
        Ok(moved)
    }

    /// Moves up to `count` bytes starting at `position` into `dst`.
    ///
    /// Stops early when `dst` would block or accepts a short write. Returns
    /// the number of bytes `dst` accepted, which may be zero.
    ///
    /// # Errors
    ///
    /// Returns a [`TransferError`] carrying the bytes delivered to `dst`
    /// before the failure. Reading past the end of the file is reported as
    /// [`ErrorKind::UnexpectedEof`].
    pub fn transfer_to<W: Write + ?Sized>(
        &self,
        position: u64,
        count: u64,
        dst: &mut W,
        scratch: &mut [u8],
    ) -> Result<u64, TransferError> {
        let mut moved = 0u64;
        while moved < count && !scratch.is_empty() {
            let want = chunk_len(count - moved, scratch.len());
            let read = self
                .read_at(&mut scratch[..want], position + moved)
                .map_err(|e| TransferError::new(moved, e))?;
            if read == 0 {
                return Err(TransferError::new(
                    moved,
                    io::Error::new(
                        ErrorKind::UnexpectedEof,
                        format!("segment ends before offset {}", position + moved),
                    ),
                ));
            }

            let mut sent = 0;
            while sent < read {
                match dst.write(&scratch[sent..read]) {
                    Ok(0) => break,
                    Ok(n) => sent += n,
                    Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => return Err(TransferError::new(moved + sent as u64, e)),
                }
            }
            moved += sent as u64;
            if sent < read {
                break;
            }
        }
        Ok(moved)
    }

    /// Flushes appended data (but not necessarily metadata) to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    pub fn sync_data(&self) -> io::Result<()> {
        self.file.sync_data()
    }

    /// Size of the file on disk, which lags [`Segment::len`] while an
    /// append is in flight.
    ///
    /// # Errors
    ///
    /// Returns an error if the file metadata cannot be read.
    pub fn file_len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Reads the event whose header starts at `offset`.
    ///
    /// The payload checksum is not verified.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadPastEnd`] if the frame is incomplete and
    /// [`StorageError::CorruptEvent`] if the header cannot be decoded.
    pub fn read_event<T: Tag>(&self, offset: u64) -> StorageResult<Event<T>> {
        let header = self.read_header::<T>(offset)?;
        let len = header.size() as usize;
        let mut payload = vec![0u8; len];
        let read = self.read_at(&mut payload, EventHeader::<T>::payload_offset(offset))?;
        if read < len {
            return Err(StorageError::ReadPastEnd {
                offset,
                len: header.frame_len(),
                size: self.file_len()?,
            });
        }
        Event::from_parts(header, Bytes::from(payload)).map_err(|source| self.corrupt(offset, source))
    }

    /// Reads only the header at `offset`.
    ///
    /// # Errors
    ///
    /// See [`Segment::read_event`].
    pub fn read_header<T: Tag>(&self, offset: u64) -> StorageResult<EventHeader<T>> {
        let mut buf = [0u8; MAX_HEADER_LEN];
        let header_len = EventHeader::<T>::LEN;
        let read = self.read_at(&mut buf[..header_len], offset)?;
        if read < header_len {
            return Err(StorageError::ReadPastEnd {
                offset,
                len: header_len as u64,
                size: self.file_len()?,
            });
        }
        EventHeader::decode(&buf[..header_len]).map_err(|source| self.corrupt(offset, source))
    }

    /// Iterates the events stored in this segment from the start.
    ///
    /// # Errors
    ///
    /// Returns an error if the file size cannot be determined.
    pub fn events<T: Tag>(&self) -> StorageResult<SegmentEvents<'_, T>> {
        Ok(SegmentEvents {
            segment: self,
            end: self.file_len()?,
            offset: 0,
            finished: false,
            _tag: PhantomData,
        })
    }

    fn corrupt(&self, offset: u64, source: spindle_codec::CodecError) -> StorageError {
        StorageError::CorruptEvent {
            offset,
            segment: self.path.clone(),
            source,
        }
    }
}

fn chunk_len(remaining: u64, scratch: usize) -> usize {
    usize::try_from(remaining).map_or(scratch, |r| r.min(scratch))
}

/// A streaming iterator over the `(offset, event)` pairs of a segment.
///
/// # Error Handling
///
/// - A truncated header or payload at the tail is treated as the end of the
///   segment (an append that never completed)
/// - A checksum mismatch or undecodable header yields an error and ends
///   iteration
pub struct SegmentEvents<'a, T: Tag = u64> {
    segment: &'a Segment,
    end: u64,
    offset: u64,
    finished: bool,
    _tag: PhantomData<T>,
}

impl<T: Tag> SegmentEvents<'_, T> {
    fn read_next(&mut self) -> StorageResult<Option<(u64, Event<T>)>> {
        let offset = self.offset;
        if offset + EventHeader::<T>::LEN as u64 > self.end {
            return Ok(None);
        }
        let header = self.segment.read_header::<T>(offset)?;
        if offset + header.frame_len() > self.end {
            return Ok(None);
        }
        let event = self.segment.read_event::<T>(offset)?;
        event
            .verify()
            .map_err(|source| self.segment.corrupt(offset, source))?;
        self.offset += header.frame_len();
        Ok(Some((offset, event)))
    }
}

impl<T: Tag> Iterator for SegmentEvents<'_, T> {
    type Item = StorageResult<(u64, Event<T>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_next() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
