//! RawOut/RawIn framing: `"*" + upper_hex(payload) + ";\n"`. RawIn is
//! line-oriented, accepts LF and CRLF, and never closes a connection over
//! a malformed record — it just counts it and moves on.

use ms1090::decode::decode;
use ms1090::prelude::AircraftRegistry;

use super::DecodeContext;

/// `"*" + upper_hex(payload) + ";\n"`, the exact bytes a RawOut client
/// receives for one decoded message.
pub fn format_line(payload: &[u8]) -> String {
    let mut line = String::with_capacity(payload.len() * 2 + 3);
    line.push('*');
    for byte in payload {
        line.push_str(&format!("{byte:02X}"));
    }
    line.push_str(";\n");
    line
}

/// Splits `buf` into complete `*...;` records on LF/CRLF boundaries,
/// leaving any trailing partial record in place for the next pump.
pub fn drain_records(buf: &mut Vec<u8>) -> Vec<String> {
    let mut records = Vec::new();
    let mut start = 0;
    for i in 0..buf.len() {
        if buf[i] == b'\n' {
            let end = if i > start && buf[i - 1] == b'\r' { i - 1 } else { i };
            if let Ok(text) = std::str::from_utf8(&buf[start..end]) {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    records.push(trimmed.to_string());
                }
            }
            start = i + 1;
        }
    }
    buf.drain(0..start);
    records
}

/// Parses one `*<hex>;` record (optional surrounding whitespace already
/// trimmed by `drain_records`) into a raw payload, or `None` on any
/// malformation — the caller counts this as a bad record.
pub fn parse_record(record: &str) -> Option<Vec<u8>> {
    let record = record.strip_prefix('*')?;
    let record = record.strip_suffix(';')?;
    if !matches!(record.len(), 14 | 28) {
        return None;
    }
    hex::decode(record).ok()
}

/// Feeds a record accepted off the wire to `FrameDecoder` as if it had
/// arrived from the demodulator, then into the registry.
pub fn inject(
    payload: &[u8],
    ctx: &mut DecodeContext,
    registry: &mut AircraftRegistry,
    now_ms: u64,
) {
    if let Some(msg) = decode(payload, ctx.now_epoch_s, ctx.icao_cache, ctx.opts) {
        registry.ingest(&msg, now_ms);
    }
}
