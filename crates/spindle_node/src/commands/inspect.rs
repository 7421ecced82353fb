//! Inspect command implementation.

use spindle_codec::Tag;
use spindle_storage::Segment;
use std::path::Path;
use uuid::Uuid;

/// Runs the inspect command.
pub fn run(
    path: &Path,
    limit: Option<usize>,
    payloads: bool,
    wide: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Segment {:?}", path);
    println!();

    let listed = if wide {
        list::<Uuid>(path, limit, payloads)?
    } else {
        list::<u64>(path, limit, payloads)?
    };

    println!();
    println!("{} events listed", listed);
    Ok(())
}

fn list<T: Tag>(
    path: &Path,
    limit: Option<usize>,
    payloads: bool,
) -> Result<usize, Box<dyn std::error::Error>> {
    let segment = Segment::open(path)?;
    let mut listed = 0;

    println!(
        "{:>12}  {:>10}  {:>11}  {:>10}  TAG",
        "OFFSET", "SIZE", "MAGIC", "CRC32"
    );
    for item in segment.events::<T>()?.take(limit.unwrap_or(usize::MAX)) {
        let (offset, event) = item?;
        println!(
            "{:>12}  {:>10}  {:>11}  {:#010x}  {:?}",
            offset,
            event.size(),
            event.magic(),
            event.header().crc32(),
            event.tag()
        );
        if payloads {
            println!("{:>14}{}", "", String::from_utf8_lossy(event.payload()));
        }
        listed += 1;
    }
    Ok(listed)
}
