use anyhow::{Context, Result};
use clap::Parser;

use rdpinspector::capture::codec;
use rdpinspector::capture::filter::filter_packets;
use rdpinspector::models::packet::PacketBody;
use rdpinspector::utils::logging;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Print the contents of a packet dump file")]
struct Args {
    /// Dump file to read
    path: String,

    /// Include packets hidden by the inspector filter
    #[clap(long)]
    all: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[clap(long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_logger(logging::get_log_level(&args.log_level));

    let text = std::fs::read_to_string(&args.path)
        .with_context(|| format!("Failed to read {}", args.path))?;
    let session = codec::decode(&text).with_context(|| format!("Failed to decode {}", args.path))?;

    let buffer = &session.buffer;
    let packets: Vec<_> = if args.all {
        buffer.packets().iter().collect()
    } else {
        filter_packets(buffer.packets())
    };

    println!("Dump file: {}", args.path);
    println!(
        "Packets: {} buffered, {} shown, {} removed, last id {}",
        buffer.len(),
        packets.len(),
        buffer.removed_packets(),
        buffer.unique_id()
    );
    println!(
        "Traffic: sent {} packets / {} bytes, received {} packets / {} bytes ({} packets / {} bytes total)",
        session.summary.packets.sent,
        session.summary.data.sent,
        session.summary.packets.received,
        session.summary.data.received,
        session.summary.total_packets(),
        session.summary.total_bytes()
    );
    println!();

    for packet in packets {
        let time = packet.time.format("%H:%M:%S%.3f");
        match &packet.body {
            PacketBody::Send(wire) => println!(
                "{:>6} {} -> {:<40} {:>6}B {}",
                packet.id,
                time,
                wire.to().unwrap_or("?"),
                wire.size,
                wire.message_type().unwrap_or("")
            ),
            PacketBody::Receive(wire) => println!(
                "{:>6} {} <- {:<40} {:>6}B {}",
                packet.id,
                time,
                wire.from().unwrap_or("?"),
                wire.size,
                wire.message_type().unwrap_or("")
            ),
            PacketBody::Summary(summary) => println!(
                "{:>6} {} == summary: {} sent, {} received ({} bytes)",
                packet.id,
                time,
                summary.packets.sent,
                summary.packets.received,
                summary.total_bytes()
            ),
            PacketBody::Message { message } => {
                println!("{:>6} {} ** {}", packet.id, time, message)
            }
        }
    }

    Ok(())
}
