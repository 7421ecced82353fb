//! Send command implementation.

use spindle_codec::Event;
use spindle_node::Producer;
use std::io::BufRead;
use std::net::SocketAddr;

/// Runs the send command.
///
/// Each payload becomes one event. Without payloads, every stdin line does.
pub fn run(
    to: SocketAddr,
    tag: u64,
    magic: i32,
    payloads: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let payloads = if payloads.is_empty() {
        std::io::stdin().lock().lines().collect::<Result<Vec<_>, _>>()?
    } else {
        payloads
    };
    let events = payloads
        .into_iter()
        .map(|payload| Event::new(magic, tag, payload.into_bytes()))
        .collect::<Result<Vec<_>, _>>()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let sent = runtime.block_on(async {
        let mut producer = Producer::connect(to).await?;
        for event in &events {
            producer.send(event).await?;
        }
        producer.finish().await
    })?;

    println!("✓ Sent {} events to {} on channel {}", sent, to, tag);
    Ok(())
}
