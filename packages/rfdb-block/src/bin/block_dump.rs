//! Block dump: map a window of a file and print a hex preview.
//!
//! Run: cargo run --bin rfdb-block-dump -- <location> [--offset N] [--length N] [--populate]

use anyhow::{bail, Context};
use rfdb_block::{map_file_with, Location, MapConfig};

const PREVIEW_BYTES: usize = 256;
const BYTES_PER_LINE: usize = 16;

fn print_usage() {
    println!("Usage: rfdb-block-dump <location> [--offset <bytes>] [--length <bytes>] [--populate]");
    println!();
    println!("Arguments:");
    println!("  <location>     File path or file:// location to map");
    println!("  --offset       Start offset in bytes (default: 0)");
    println!("  --length       Window length in bytes (default: to end of file)");
    println!("  --populate     Pre-fault the mapping");
    println!();
    println!("A map_config.json next to the file supplies defaults for mapping options.");
}

fn flag_value(args: &[String], flag: &str) -> anyhow::Result<Option<u64>> {
    match args.iter().position(|a| a == flag) {
        None => Ok(None),
        Some(i) => {
            let raw = args
                .get(i + 1)
                .with_context(|| format!("{} requires a value", flag))?;
            let value = raw
                .parse::<u64>()
                .with_context(|| format!("invalid value for {}: '{}'", flag, raw))?;
            Ok(Some(value))
        }
    }
}

fn hex_line(offset: usize, chunk: &[u8]) -> String {
    let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
    let ascii: String = chunk
        .iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
        .collect();
    format!("{:08x}  {:<48}  {}", offset, hex.join(" "), ascii)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("rfdb-block-dump {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }
    if args.len() < 2 || args[1].starts_with("--") {
        print_usage();
        bail!("missing <location> argument");
    }

    let location = Location::parse(&args[1])?;
    let offset = flag_value(&args, "--offset")?.unwrap_or(0);
    let length = flag_value(&args, "--length")?;

    let mut config = match location.path().parent() {
        Some(dir) if location.is_local_file() => MapConfig::read_from(dir)?.unwrap_or_default(),
        _ => MapConfig::default(),
    };
    if args.iter().any(|a| a == "--populate") {
        config.populate = true;
    }

    let region = map_file_with(&location, offset, length, &config)
        .with_context(|| format!("mapping {}", location))?;

    println!("{}: {} bytes from offset {}", location, region.len(), offset);
    let preview = &region.data()[..region.len().min(PREVIEW_BYTES)];
    for (i, chunk) in preview.chunks(BYTES_PER_LINE).enumerate() {
        println!("{}", hex_line(offset as usize + i * BYTES_PER_LINE, chunk));
    }
    if region.len() > PREVIEW_BYTES {
        println!("... {} more bytes", region.len() - PREVIEW_BYTES);
    }
    Ok(())
}
