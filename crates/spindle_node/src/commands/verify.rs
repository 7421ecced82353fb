//! Verify command implementation.

use spindle_codec::Tag;
use spindle_storage::{Segment, SEGMENT_EXTENSION};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Verification result for one segment.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of intact events.
    pub events: usize,
    /// Bytes covered by intact events.
    pub valid_bytes: u64,
    /// Bytes after the last intact event.
    pub trailing_bytes: u64,
    /// Error that stopped the scan, if any.
    pub error: Option<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs the verify command.
pub fn run(paths: &[PathBuf], wide: bool) -> Result<(), Box<dyn std::error::Error>> {
    let segments = collect_segments(paths)?;
    if segments.is_empty() {
        println!("No segment files found");
        return Ok(());
    }

    let mut failed = 0;
    for path in &segments {
        let result = if wide {
            verify_segment::<Uuid>(path)?
        } else {
            verify_segment::<u64>(path)?
        };
        print_result(path, &result);
        if !result.is_ok() {
            failed += 1;
        }
    }

    println!();
    if failed == 0 {
        println!("✓ {} segments verified", segments.len());
        Ok(())
    } else {
        println!("✗ {} of {} segments failed verification", failed, segments.len());
        Err("Verification failed".into())
    }
}

/// Expands directories into the segment files they hold.
pub fn collect_segments(paths: &[PathBuf]) -> std::io::Result<Vec<PathBuf>> {
    let mut segments = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|ext| ext == SEGMENT_EXTENSION))
                .collect();
            found.sort();
            segments.extend(found);
        } else {
            segments.push(path.clone());
        }
    }
    Ok(segments)
}

/// Scans a segment, checking every event's checksum.
pub fn verify_segment<T: Tag>(path: &Path) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let segment = Segment::open(path)?;
    let mut result = VerifyResult::default();

    for item in segment.events::<T>()? {
        match item {
            Ok((offset, event)) => {
                result.events += 1;
                result.valid_bytes = offset + event.header().frame_len();
            }
            Err(e) => {
                result.error = Some(e.to_string());
                break;
            }
        }
    }
    result.trailing_bytes = segment.file_len()? - result.valid_bytes;
    Ok(result)
}

fn print_result(path: &Path, result: &VerifyResult) {
    println!("{}:", path.display());
    println!("  Events: {}", result.events);
    println!("  Valid bytes: {}", result.valid_bytes);
    if result.trailing_bytes > 0 && result.is_ok() {
        println!("  Incomplete tail: {} bytes", result.trailing_bytes);
    }
    if let Some(error) = &result.error {
        println!("  ✗ {}", error);
    }
}
