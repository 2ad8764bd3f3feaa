//! Bits-to-typed-`Message` decoding for every Downlink Format this
//! receiver supports, including CRC check/fix, AP (Address/Parity)
//! recovery, and DF17 extended-squitter submessage extraction.

pub mod identification;
pub mod velocity;

use tracing::{debug, trace};

use crate::crc;
use crate::icao_cache::IcaoCache;

pub const LONG_BITS: usize = 112;
pub const SHORT_BITS: usize = 56;

fn is_long_df(df: u8) -> bool {
    matches!(df, 16 | 17 | 19 | 20 | 21)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AltitudeUnit {
    Feet,
    Meters,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedBitIndex(pub i32);

impl FixedBitIndex {
    pub const NONE: FixedBitIndex = FixedBitIndex(-1);

    pub fn single(i: usize) -> Self {
        FixedBitIndex(i as i32)
    }

    pub fn double(j_or_ij: u32) -> Self {
        FixedBitIndex(j_or_ij as i32)
    }
}

/// A decoded Mode S / ADS-B frame. Mirrors the wire-level fields; a
/// `bits == 56` frame never carries a DF from `{16,17,19,20,21}`.
#[derive(Debug, Clone)]
pub struct Message {
    pub payload: Vec<u8>,
    pub df: u8,
    pub bits: usize,
    pub crc_declared: u32,
    pub crc_computed: u32,
    pub crc_ok: bool,
    pub fixed_bit_index: FixedBitIndex,
    pub icao: u32,
    pub ca: u8,
    pub me_type: u8,
    pub me_subtype: u8,
    pub altitude: Option<i32>,
    pub altitude_unit: AltitudeUnit,
    pub identity: Option<u16>,
    pub flight: Option<String>,
    pub raw_lat: Option<u32>,
    pub raw_lon: Option<u32>,
    pub odd_flag: bool,
    pub speed_kt: Option<f64>,
    pub heading: Option<f64>,
    pub heading_valid: bool,
    pub vertical_rate: Option<i16>,
    pub signal_power: f64,
}

impl Message {
    fn empty(payload: Vec<u8>, df: u8, bits: usize) -> Self {
        Message {
            payload,
            df,
            bits,
            crc_declared: 0,
            crc_computed: 0,
            crc_ok: false,
            fixed_bit_index: FixedBitIndex::NONE,
            icao: 0,
            ca: 0,
            me_type: 0,
            me_subtype: 0,
            altitude: None,
            altitude_unit: AltitudeUnit::Feet,
            identity: None,
            flight: None,
            raw_lat: None,
            raw_lon: None,
            odd_flag: false,
            speed_kt: None,
            heading: None,
            heading_valid: false,
            vertical_rate: None,
            signal_power: 0.0,
        }
    }

    /// 24-bit ICAO address as the 6-char lowercase hex string used on the
    /// wire and in the registry's external representations.
    pub fn icao_hex(&self) -> String {
        format!("{:06x}", self.icao)
    }
}

pub struct DecodeOptions {
    pub fix_single_bit: bool,
    pub fix_two_bit: bool,
    pub no_crc_check: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            fix_single_bit: true,
            fix_two_bit: false,
            no_crc_check: false,
        }
    }
}

/// Decodes a raw payload (already sliced to at least the frame's
/// declared length) into a `Message`. `icao_cache` is used for AP
/// recovery on DF0/4/5/16/20/21/24 and updated on a trusted DF11/17.
pub fn decode(
    raw: &[u8],
    now_epoch_s: u32,
    icao_cache: &mut IcaoCache,
    opts: &DecodeOptions,
) -> Option<Message> {
    let df = raw[0] >> 3;
    let bits = if is_long_df(df) { LONG_BITS } else { SHORT_BITS };
    let bytes = bits / 8;
    if raw.len() < bytes {
        return None;
    }

    let mut payload = raw[..bytes].to_vec();
    let mut msg = Message::empty(payload.clone(), df, bits);

    msg.crc_declared = crc::declared_crc(&payload, bits);
    msg.crc_computed = crc::modes_checksum(&payload, bits);
    msg.crc_ok = msg.crc_declared == msg.crc_computed;

    if !msg.crc_ok && matches!(df, 11 | 17) {
        if opts.fix_single_bit {
            if let Some(bit) = crc::try_fix_one(&mut payload, bits) {
                debug!(df, bit, "recovered frame via single-bit fix");
                msg.fixed_bit_index = FixedBitIndex::single(bit);
                msg.crc_declared = crc::declared_crc(&payload, bits);
                msg.crc_computed = crc::modes_checksum(&payload, bits);
                msg.crc_ok = true;
            }
        }
        if !msg.crc_ok && opts.fix_two_bit && df == 17 {
            if let Some(combined) = crc::try_fix_two(&mut payload, bits) {
                debug!(df, combined, "recovered frame via two-bit fix");
                msg.fixed_bit_index = FixedBitIndex::double(combined);
                msg.crc_declared = crc::declared_crc(&payload, bits);
                msg.crc_computed = crc::modes_checksum(&payload, bits);
                msg.crc_ok = true;
            }
        }
    }

    msg.payload = payload.clone();

    if matches!(df, 11 | 17) {
        msg.icao = ((payload[1] as u32) << 16) | ((payload[2] as u32) << 8) | payload[3] as u32;
        if msg.crc_ok {
            icao_cache.add(msg.icao, now_epoch_s);
        }
    } else {
        // AP recovery: the declared "CRC" on these formats is CRC XOR ICAO.
        let recovered = msg.crc_declared ^ msg.crc_computed;
        msg.icao = recovered;
        msg.crc_ok = icao_cache.recent(recovered, now_epoch_s);
    }

    if !msg.crc_ok && !opts.no_crc_check {
        trace!(df, bits, "dropping frame: CRC unrecoverable");
        return None;
    }

    extract_common_fields(&mut msg, &payload);

    if matches!(df, 0 | 4 | 16 | 20) {
        decode_ac13(&mut msg, &payload);
    }

    if df == 17 {
        decode_extended_squitter(&mut msg, &payload);
    }

    Some(msg)
}

fn extract_common_fields(msg: &mut Message, payload: &[u8]) {
    msg.ca = payload[0] & 0x07;

    if matches!(msg.df, 5 | 21) {
        let id13 = (((payload[2] & 0x1F) as u16) << 8) | payload[3] as u16;
        msg.identity = Some(squawk_octal(decode_id13(id13)));
    }
}

/// Turns a decoded Gillham hex nibble pattern into the 4-digit octal
/// squawk value dispatchers read off a transponder (e.g. 0x1200 -> 1200).
fn squawk_octal(hex_gillham: u16) -> u16 {
    let a = (hex_gillham >> 12) & 0xF;
    let b = (hex_gillham >> 8) & 0xF;
    let c = (hex_gillham >> 4) & 0xF;
    let d = hex_gillham & 0xF;
    a * 1000 + b * 100 + c * 10 + d
}

fn decode_ac13(msg: &mut Message, payload: &[u8]) {
    let m_bit = (payload[3] & 0x40) != 0;
    let q_bit = (payload[3] & 0x10) != 0;

    if m_bit {
        msg.altitude_unit = AltitudeUnit::Meters;
        return;
    }

    msg.altitude_unit = AltitudeUnit::Feet;
    if q_bit {
        let n = (((payload[2] & 0x1F) as i32) << 6)
            | (((payload[3] & 0x80) >> 2) as i32)
            | (((payload[3] & 0x20) >> 1) as i32)
            | ((payload[3] & 0x0F) as i32);
        msg.altitude = Some(n * 25 - 1000);
    }
}

fn decode_ac12(msg: &mut Message, payload: &[u8]) {
    let q_bit = (payload[5] & 0x01) != 0;
    msg.altitude_unit = AltitudeUnit::Feet;
    if q_bit {
        let n = ((payload[5] >> 1) as i32) << 4 | ((payload[6] & 0xF0) >> 4) as i32;
        msg.altitude = Some(n * 25 - 1000);
    }
}

fn decode_extended_squitter(msg: &mut Message, payload: &[u8]) {
    msg.me_type = payload[4] >> 3;
    msg.me_subtype = payload[4] & 0x07;

    match msg.me_type {
        1..=4 => {
            msg.flight = Some(identification::callsign(payload));
        }
        9..=18 | 20..=22 => {
            msg.odd_flag = (payload[6] & 0x04) != 0;
            decode_ac12(msg, payload);
            msg.raw_lat = Some(
                (((payload[6] & 0x03) as u32) << 15)
                    | ((payload[7] as u32) << 7)
                    | ((payload[8] >> 1) as u32),
            );
            msg.raw_lon = Some(
                (((payload[8] & 0x01) as u32) << 16)
                    | ((payload[9] as u32) << 8)
                    | (payload[10] as u32),
            );
        }
        19 => match msg.me_subtype {
            1 | 2 => {
                let v = velocity::ground_velocity(payload);
                msg.speed_kt = Some(v.speed_kt);
                msg.heading = Some(v.heading_deg);
                msg.heading_valid = true;
                msg.vertical_rate = v.vertical_rate;
            }
            3 | 4 => {
                let v = velocity::heading_velocity(payload);
                msg.heading = Some(v.heading_deg);
                msg.heading_valid = v.heading_valid;
                msg.vertical_rate = v.vertical_rate;
            }
            _ => {}
        },
        _ => {}
    }
}

/// Un-interleaves a 13-bit Mode A/C identity field into the Gillham C1
/// A1 C2 A2 C4 A4 (ZERO) B1 D1 B2 D2 B4 D4 bit order used by both the
/// squawk and the non-Q-bit altitude encodings.
#[rustfmt::skip]
pub fn decode_id13(id13_field: u16) -> u16 {
    let mut hex_gillham: u16 = 0;

    if id13_field & 0x1000 != 0 { hex_gillham |= 0x0010; } // Bit 12 = C1
    if id13_field & 0x0800 != 0 { hex_gillham |= 0x1000; } // Bit 11 = A1
    if id13_field & 0x0400 != 0 { hex_gillham |= 0x0020; } // Bit 10 = C2
    if id13_field & 0x0200 != 0 { hex_gillham |= 0x2000; } // Bit  9 = A2
    if id13_field & 0x0100 != 0 { hex_gillham |= 0x0040; } // Bit  8 = C4
    if id13_field & 0x0080 != 0 { hex_gillham |= 0x4000; } // Bit  7 = A4
    if id13_field & 0x0020 != 0 { hex_gillham |= 0x0100; } // Bit  5 = B1
    if id13_field & 0x0010 != 0 { hex_gillham |= 0x0001; } // Bit  4 = D1
    if id13_field & 0x0008 != 0 { hex_gillham |= 0x0200; } // Bit  3 = B2
    if id13_field & 0x0004 != 0 { hex_gillham |= 0x0002; } // Bit  2 = D2
    if id13_field & 0x0002 != 0 { hex_gillham |= 0x0400; } // Bit  1 = B4
    if id13_field & 0x0001 != 0 { hex_gillham |= 0x0004; } // Bit  0 = D4

    hex_gillham
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexlit::hex;

    #[test]
    fn decodes_df17_identification() {
        let raw: [u8; 14] = hex!("8D4840D6202CC371C32CE0576098");
        let mut cache = IcaoCache::new();
        let msg = decode(&raw, 0, &mut cache, &DecodeOptions::default()).expect("decodes");
        assert_eq!(msg.df, 17);
        assert_eq!(msg.icao, 0x4840D6);
        assert!(msg.crc_ok);
    }

    #[test]
    fn short_frame_decodes_df4_altitude() {
        let raw: [u8; 7] = [0x20, 0x00, 0x18, 0x38, 0xFA, 0x6D, 0x91];
        let mut cache = IcaoCache::new();
        let msg = decode(
            &raw,
            0,
            &mut cache,
            &DecodeOptions {
                no_crc_check: true,
                ..Default::default()
            },
        )
        .expect("decodes");
        assert_eq!(msg.bits, 56);
        assert!(!matches!(msg.df, 16 | 17 | 19 | 20 | 21));
        assert_eq!(msg.df, 4);
        assert_eq!(msg.altitude, Some(38_000));
        assert_eq!(msg.altitude_unit, AltitudeUnit::Feet);
    }

    #[test]
    fn aggressive_two_bit_fix_recovers_frame_and_matches_scenario_index() {
        let good: [u8; 14] = hex!("8D4840D6202CC371C32CE0576098");
        let mut corrupted = good;
        corrupted[10 / 8] ^= 0x80 >> (10 % 8);
        corrupted[77 / 8] ^= 0x80 >> (77 % 8);

        let mut cache = IcaoCache::new();
        let rejected = decode(
            &corrupted,
            0,
            &mut cache,
            &DecodeOptions {
                fix_two_bit: false,
                ..Default::default()
            },
        );
        assert!(rejected.is_none());

        let mut cache = IcaoCache::new();
        let msg = decode(
            &corrupted,
            0,
            &mut cache,
            &DecodeOptions {
                fix_two_bit: true,
                ..Default::default()
            },
        )
        .expect("recovered via two-bit fix");
        assert!(msg.crc_ok);
        assert_eq!(msg.fixed_bit_index, FixedBitIndex::double(77 | (10 << 8)));
    }

    #[test]
    fn decode_id13_zero_is_fixed_point() {
        assert_eq!(decode_id13(0), 0);
    }

    #[test]
    fn ac13_q_bit_resolution() {
        // m_bit=0 (bit6 of payload[3] clear), q_bit=1 (bit4 set), n encoded
        // so that 25*n - 1000 == 5000 ft, i.e. n == 240 == 0b011_11_0000.
        let mut msg = Message::empty(vec![0u8; 7], 4, 56);
        let payload = [0x20u8, 0x00, 0b0000_0011, 0b1011_0000, 0, 0, 0];
        decode_ac13(&mut msg, &payload);
        assert_eq!(msg.altitude, Some(5000));
    }
}
