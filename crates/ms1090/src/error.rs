//! Error kinds shared across the demodulator, decoder, registry and
//! network fan-out. Frame-level rejects (bad CRC, preamble miss, unknown
//! `me_type`) never travel through this enum — they are represented as
//! `Option`/`Result` returns consumed locally and counted as statistics;
//! only device-, connection- and configuration-level failures end up here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to open device {device}: {reason}")]
    DeviceOpenFailed { device: String, reason: String },

    #[error("device stream failed: {0}")]
    DeviceStreamFailed(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("temporary I/O error on connection {connection_id}: {source}")]
    IoTemporary {
        connection_id: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("fatal reactor I/O error: {0}")]
    IoFatal(#[source] std::io::Error),

    #[error("malformed protocol frame on {service}: {detail}")]
    ProtocolFrameMalformed { service: &'static str, detail: String },

    #[error("CRC unrecoverable for a {bits}-bit frame")]
    CrcUnrecoverable { bits: usize },

    #[error("CPR position ambiguous: NL(rlat0)={nl0} != NL(rlat1)={nl1}")]
    PositionAmbiguous { nl0: i32, nl1: i32 },

    #[error("CPR position stale: pair age {age_ms} ms exceeds gate")]
    PositionStale { age_ms: u64 },

    #[error("ICAO cache miss for address {0:06x}")]
    CacheMiss(u32),

    #[error("receive buffer overflow on connection {connection_id} ({service})")]
    BufferOverflow { connection_id: u64, service: &'static str },
}

pub type Result<T> = std::result::Result<T, Error>;
