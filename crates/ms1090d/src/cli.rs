//! Command-line surface, in `jet1090::main::Options`'s derive style:
//! one flat struct, `clap` doing the parsing, a couple of fields with
//! light post-parse validation done by the caller rather than here.

use std::path::PathBuf;

use clap::Parser;
use ms1090::prelude::Position;

#[derive(Debug, Parser)]
#[command(name = "ms1090d", version, about = "Mode S / ADS-B receiver daemon")]
pub struct Options {
    /// SDR device selector, e.g. "0" or "rtlsdr:00000001"; ignored in
    /// `--infile`/`--loop` replay mode.
    #[arg(long, default_value = "0")]
    pub device: String,

    /// Tuner frequency in Hz.
    #[arg(long, default_value_t = 1_090_000_000)]
    pub freq: u64,

    /// Tuner gain in tenths of a dB, or "auto".
    #[arg(long, default_value = "auto")]
    pub gain: String,

    /// Sample rate in Hz.
    #[arg(long, default_value_t = 2_000_000)]
    pub sample_rate: u32,

    #[arg(long, default_value_t = 30001)]
    pub raw_in_port: u16,

    #[arg(long, default_value_t = 30002)]
    pub raw_out_port: u16,

    #[arg(long, default_value_t = 30003)]
    pub sbs_port: u16,

    #[arg(long, default_value_t = 8080)]
    pub http_port: u16,

    /// Path to an aircraft-metadata CSV; accepted and passed through, the
    /// loader itself is an external collaborator.
    #[arg(long)]
    pub aircraft_db: Option<PathBuf>,

    #[arg(long, default_value = "web")]
    pub web_root: PathBuf,

    #[arg(long, default_value = "/")]
    pub web_page: String,

    #[arg(short = 'i', long)]
    pub interactive: bool,

    /// Registry eviction TTL in seconds.
    #[arg(long, default_value_t = 60)]
    pub ttl: u64,

    #[arg(long, default_value_t = 25)]
    pub rows: u16,

    /// Replay the `--infile` capture this many times, 0 = forever.
    #[arg(long = "loop")]
    pub loop_count: Option<u32>,

    /// Read I/Q samples from a file instead of a live device; "-" is stdin.
    #[arg(long)]
    pub infile: Option<String>,

    /// Strip the AGC-scaled sample width down to this many bits.
    #[arg(long)]
    pub strip: Option<u8>,

    /// Single-letter debug toggles: E D c C p n N j g G.
    #[arg(short = 'd', long, default_value = "")]
    pub debug: String,

    /// Search the two-bit error budget as well as the single-bit one.
    #[arg(long)]
    pub aggressive: bool,

    /// Disable CRC bit-fix attempts entirely.
    #[arg(long)]
    pub no_fix: bool,

    /// Accept CRC-bad frames into the registry (tagged `crc_ok=false`).
    #[arg(long)]
    pub no_crc_check: bool,

    /// Only show the given ICAO addresses (hex, comma-separated).
    #[arg(long)]
    pub only_addr: Option<String>,

    /// Print raw accepted frames to stdout as well as decoding them.
    #[arg(long)]
    pub raw: bool,

    /// Report altitude/speed in metric units on the JSON/SBS surfaces.
    #[arg(long)]
    pub metric: bool,

    #[arg(long)]
    pub net: bool,

    #[arg(long)]
    pub net_only: bool,

    #[arg(long)]
    pub net_active: bool,

    #[arg(long)]
    pub max_messages: Option<u64>,

    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Options {
    /// `DUMP1090_HOMEPOS=<lat>,<lon>`, read once at startup.
    pub fn home_position() -> Option<Position> {
        let raw = std::env::var("DUMP1090_HOMEPOS").ok()?;
        let (lat, lon) = raw.split_once(',')?;
        Some(Position {
            latitude: lat.trim().parse().ok()?,
            longitude: lon.trim().parse().ok()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_invocation() {
        let opts = Options::parse_from(["ms1090d"]);
        assert_eq!(opts.raw_out_port, 30002);
        assert_eq!(opts.http_port, 8080);
        assert!(!opts.aggressive);
    }

    #[test]
    fn parses_service_ports_and_flags() {
        let opts = Options::parse_from([
            "ms1090d",
            "--raw-in-port",
            "10001",
            "--aggressive",
            "--no-crc-check",
            "-vv",
        ]);
        assert_eq!(opts.raw_in_port, 10001);
        assert!(opts.aggressive);
        assert!(opts.no_crc_check);
        assert_eq!(opts.verbose, 2);
    }
}
