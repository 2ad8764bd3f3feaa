//! 24-bit Mode S CRC: the 112-entry parity table, checksum computation,
//! and brute-force single/double bit-flip recovery.
//!
//! The table is generated at startup with the same generator polynomial
//! dump1090/readsb use (ported from the byte-table construction in
//! `asmarques-adsb/src/crc.rs`, adapted to the bit-indexed 112-entry
//! table this wire format requires): entry `i` is the CRC syndrome of a
//! message with a single one-bit at position `i` and zeroes elsewhere.

use once_cell::sync::Lazy;

const MODES_GENERATOR_POLY: u32 = 0xfff409;
const TABLE_LEN: usize = 112;

pub static CHECKSUM_TABLE: Lazy<[u32; TABLE_LEN]> = Lazy::new(build_table);

fn build_table() -> [u32; TABLE_LEN] {
    let mut table = [0u32; TABLE_LEN];
    // Bit positions TABLE_LEN-24..TABLE_LEN fall inside the message's own
    // CRC field; modes_checksum sums every set bit's table entry across
    // the whole message, so those positions must contribute nothing —
    // only the data bits before them drive the remainder.
    for (bitpos, entry) in table.iter_mut().take(TABLE_LEN - 24).enumerate() {
        // Binary polynomial long division of a 112-bit dividend with
        // exactly one set bit at `bitpos`, zeroes elsewhere: XOR the
        // generator into the 24 bits following every 1 the division scan
        // finds, cascading through bitpos's descendants, then read the
        // trailing 24 bits off as the remainder.
        let mut bits = [0u8; TABLE_LEN];
        bits[bitpos] = 1;
        for i in 0..(TABLE_LEN - 24) {
            if bits[i] != 0 {
                for j in 0..24 {
                    bits[i + 1 + j] ^= ((MODES_GENERATOR_POLY >> (23 - j)) & 1) as u8;
                }
            }
        }
        let mut value = 0u32;
        for &b in &bits[TABLE_LEN - 24..] {
            value = (value << 1) | b as u32;
        }
        *entry = value;
    }
    table
}

/// Extracts the declared 24-bit CRC: the last three bytes of the payload.
pub fn declared_crc(msg: &[u8], bits: usize) -> u32 {
    let bytes = bits / 8;
    ((msg[bytes - 3] as u32) << 16) | ((msg[bytes - 2] as u32) << 8) | (msg[bytes - 1] as u32)
}

/// Computes the 24-bit CRC by XOR-reducing table entries selected by set
/// bits in the message. For 56-bit frames the last 56 entries are used.
pub fn modes_checksum(msg: &[u8], bits: usize) -> u32 {
    let offset = TABLE_LEN - bits;
    let mut rem: u32 = 0;
    for byte_idx in 0..(bits / 8) {
        let byte = msg[byte_idx];
        for bit in 0..8 {
            if byte & (0x80 >> bit) != 0 {
                let table_idx = offset + byte_idx * 8 + bit;
                rem ^= CHECKSUM_TABLE[table_idx];
            }
        }
    }
    rem
}

pub fn crc_ok(msg: &[u8], bits: usize) -> bool {
    modes_checksum(msg, bits) == declared_crc(msg, bits)
}

fn flip_bit(msg: &mut [u8], bit: usize) {
    msg[bit / 8] ^= 0x80 >> (bit % 8);
}

/// Flips each of `bits` bits in turn, returning the first index whose CRC
/// then matches (and leaving that flip applied). Returns `None`, with
/// `msg` unchanged, if no single-bit flip recovers the frame.
pub fn try_fix_one(msg: &mut [u8], bits: usize) -> Option<usize> {
    for i in 0..bits {
        flip_bit(msg, i);
        if crc_ok(msg, bits) {
            return Some(i);
        }
        flip_bit(msg, i);
    }
    None
}

/// Tries every unordered pair `(i, j)`, `i < j`, returning `j | (i << 8)`
/// on success. Only ever invoked for DF17 in aggressive mode: expensive.
///
/// The `i << 8` encoding is preserved exactly as the source expresses it
/// even though it is lossy for `i >= 256` — see DESIGN.md's open-question
/// record; within this 112-bit wire format `i` never reaches 256, so the
/// literal values in the testable-properties scenarios still hold.
pub fn try_fix_two(msg: &mut [u8], bits: usize) -> Option<u32> {
    for i in 0..bits {
        flip_bit(msg, i);
        for j in (i + 1)..bits {
            flip_bit(msg, j);
            if crc_ok(msg, bits) {
                return Some((j as u32) | ((i as u32) << 8));
            }
            flip_bit(msg, j);
        }
        flip_bit(msg, i);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexlit::hex;

    fn good_df17() -> [u8; 14] {
        hex!("8D4840D6202CC371C32CE0576098")
    }

    #[test]
    fn crc_round_trip() {
        let msg = good_df17();
        assert_eq!(modes_checksum(&msg, 112), declared_crc(&msg, 112));
        assert!(crc_ok(&msg, 112));
    }

    #[test]
    fn single_bit_recoverability() {
        for i in 0..112 {
            let mut msg = good_df17();
            flip_bit(&mut msg, i);
            assert_eq!(try_fix_one(&mut msg, 112), Some(i), "bit {i}");
            assert!(crc_ok(&msg, 112));
        }
    }

    #[test]
    fn two_bit_recoverability_sample() {
        let mut msg = good_df17();
        flip_bit(&mut msg, 10);
        flip_bit(&mut msg, 77);
        let fixed = try_fix_two(&mut msg, 112);
        assert_eq!(fixed, Some(77 | (10 << 8)));
        assert!(crc_ok(&msg, 112));
    }

    #[test]
    fn corrupted_frame_without_fix_is_rejected() {
        let mut msg = good_df17();
        flip_bit(&mut msg, 5);
        flip_bit(&mut msg, 6);
        assert!(!crc_ok(&msg, 112));
    }
}
