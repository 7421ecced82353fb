//! Directory-backed segment provider.

use crate::error::StorageResult;
use crate::provider::SegmentProvider;
use crate::segment::Segment;
use parking_lot::RwLock;
use spindle_codec::{EventHeader, Tag};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// File extension used for segment files.
pub const SEGMENT_EXTENSION: &str = "seg";

/// The set of channel segments a node stores, one file per tag.
///
/// Segments are opened lazily on first use and then shared, so every
/// caller asking for the same tag gets the same handle.
///
/// # Example
///
/// ```no_run
/// use spindle_codec::EventHeader;
/// use spindle_storage::{Bundle, SegmentProvider};
/// use std::path::Path;
///
/// let bundle: Bundle<u64> = Bundle::open(Path::new("/var/lib/spindle")).unwrap();
/// let header = EventHeader::new(5, 1, 42_u64, 0).unwrap();
/// let segment = bundle.segment_for(&header).unwrap();
/// ```
#[derive(Debug)]
pub struct Bundle<T: Tag = u64> {
    root: PathBuf,
    segments: RwLock<HashMap<T, Arc<Segment>>>,
}

impl<T: Tag> Bundle<T> {
    /// Opens a bundle rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: &Path) -> StorageResult<Self> {
        std::fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            segments: RwLock::new(HashMap::new()),
        })
    }

    /// Directory holding the segment files.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the segment file for a tag.
    #[must_use]
    pub fn segment_path(&self, tag: &T) -> PathBuf {
        self.root
            .join(tag.file_stem())
            .with_extension(SEGMENT_EXTENSION)
    }

    /// Returns the segment for a tag, opening it on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment file cannot be opened.
    pub fn segment(&self, tag: T) -> StorageResult<Arc<Segment>> {
        if let Some(segment) = self.segments.read().get(&tag) {
            return Ok(Arc::clone(segment));
        }

        let mut segments = self.segments.write();
        if let Some(segment) = segments.get(&tag) {
            return Ok(Arc::clone(segment));
        }
        let path = self.segment_path(&tag);
        let segment = Arc::new(Segment::open_with_create_dirs(&path)?);
        debug!(?tag, path = %path.display(), len = segment.len(), "opened segment");
        segments.insert(tag, Arc::clone(&segment));
        Ok(segment)
    }

    /// Tags of the segments opened so far.
    #[must_use]
    pub fn channels(&self) -> Vec<T> {
        self.segments.read().keys().copied().collect()
    }
}

impl<T: Tag> SegmentProvider<T> for Bundle<T> {
    fn segment_for(&self, header: &EventHeader<T>) -> StorageResult<Arc<Segment>> {
        self.segment(header.tag())
    }
}
