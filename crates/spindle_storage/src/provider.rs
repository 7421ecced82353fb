//! Mapping from a decoded header to its channel's segment.

use crate::error::StorageResult;
use crate::segment::Segment;
use spindle_codec::{EventHeader, Tag};
use std::sync::Arc;

/// Resolves the writable segment for the channel a header belongs to.
///
/// Providers own segment lifecycle. They must hand out a single shared
/// handle per channel so that each channel has one append region; the
/// handle reports its current length through [`Segment::len`].
///
/// # Implementors
///
/// - [`super::Bundle`] - one segment file per tag under a directory
/// - any `Fn(&EventHeader<T>) -> StorageResult<Arc<Segment>>`
pub trait SegmentProvider<T: Tag>: Send + Sync {
    /// Returns the segment events with this header are appended to.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment cannot be opened or created.
    fn segment_for(&self, header: &EventHeader<T>) -> StorageResult<Arc<Segment>>;
}

impl<T, F> SegmentProvider<T> for F
where
    T: Tag,
    F: Fn(&EventHeader<T>) -> StorageResult<Arc<Segment>> + Send + Sync,
{
    fn segment_for(&self, header: &EventHeader<T>) -> StorageResult<Arc<Segment>> {
        self(header)
    }
}
