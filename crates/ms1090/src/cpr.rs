//! Compact Position Reporting: pairs a recent odd and even DF17 airborne
//! position message for one aircraft into a globally unambiguous
//! latitude/longitude. Formulas and the NL step table are kept verbatim
//! from the Mode S specification (1090-WP-9-14), per design note: this is
//! part of the wire contract, not an implementation choice.

const AIR_DLAT0: f64 = 360.0 / 60.0;
const AIR_DLAT1: f64 = 360.0 / 59.0;
const CPR_MAX: f64 = 131_072.0; // 2^17

/// Pair-age gate: discard position pairs older than 10 minutes apart.
pub const MAX_PAIR_AGE_MS: u64 = 10 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CprFormat {
    Even,
    Odd,
}

#[derive(Debug, Clone, Copy)]
pub struct CprFrame {
    pub format: CprFormat,
    pub raw_lat: u32,
    pub raw_lon: u32,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

fn modulo(a: f64, b: f64) -> f64 {
    // Rust's `%` keeps the sign of the dividend; CPR needs a mathematical
    // modulo that is always non-negative for positive `b`.
    a - b * (a / b).floor()
}

/// Number of longitude zones at a given latitude. 59 steps at the
/// equator down to 1 near the poles. Kept verbatim.
pub fn nl(lat: f64) -> i32 {
    let lat = lat.abs();
    const BREAKPOINTS: [(f64, i32); 58] = [
        (10.47047130, 59),
        (14.82817437, 58),
        (18.18626357, 57),
        (21.02939493, 56),
        (23.54504487, 55),
        (25.82924707, 54),
        (27.93898710, 53),
        (29.91135686, 52),
        (31.77209708, 51),
        (33.53993436, 50),
        (35.22899598, 49),
        (36.85025108, 48),
        (38.41241892, 47),
        (39.92256684, 46),
        (41.38651832, 45),
        (42.80914012, 44),
        (44.19454951, 43),
        (45.54626723, 42),
        (46.86733252, 41),
        (48.16039128, 40),
        (49.42776439, 39),
        (50.67150166, 38),
        (51.89342469, 37),
        (53.09516153, 36),
        (54.27817472, 35),
        (55.44378444, 34),
        (56.59318756, 33),
        (57.72747354, 32),
        (58.84763776, 31),
        (59.95459277, 30),
        (61.04917774, 29),
        (62.13216659, 28),
        (63.20427479, 27),
        (64.26616523, 26),
        (65.31845310, 25),
        (66.36171008, 24),
        (67.39646774, 23),
        (68.42322022, 22),
        (69.44242631, 21),
        (70.45451075, 20),
        (71.45986473, 19),
        (72.45884545, 18),
        (73.45177442, 17),
        (74.43893416, 16),
        (75.42056257, 15),
        (76.39684391, 14),
        (77.36789461, 13),
        (78.33374083, 12),
        (79.29428225, 11),
        (80.24923213, 10),
        (81.19801349, 9),
        (82.13956981, 8),
        (83.07199445, 7),
        (83.99173563, 6),
        (84.89166191, 5),
        (85.75541621, 4),
        (86.53536998, 3),
        (87.00000000, 2),
    ];
    for (bound, zones) in BREAKPOINTS {
        if lat < bound {
            return zones;
        }
    }
    1
}

fn cpr_n(lat: f64, odd: bool) -> i32 {
    let n = nl(lat) - if odd { 1 } else { 0 };
    n.max(1)
}

/// Globally unambiguous decode from one even and one odd CPR frame.
/// Returns `None` if the pair falls in different NL zones (ambiguous) or
/// exceeds the 10-minute pair-age gate.
pub fn global_position(even: &CprFrame, odd: &CprFrame) -> Option<Position> {
    debug_assert_eq!(even.format, CprFormat::Even);
    debug_assert_eq!(odd.format, CprFormat::Odd);

    let age_ms = even.timestamp_ms.abs_diff(odd.timestamp_ms);
    if age_ms > MAX_PAIR_AGE_MS {
        return None;
    }

    let lat_e = even.raw_lat as f64;
    let lat_o = odd.raw_lat as f64;
    let lon_e = even.raw_lon as f64;
    let lon_o = odd.raw_lon as f64;

    let j = ((59.0 * lat_e - 60.0 * lat_o) / CPR_MAX + 0.5).floor();

    let mut rlat0 = AIR_DLAT0 * (modulo(j, 60.0) + lat_e / CPR_MAX);
    let mut rlat1 = AIR_DLAT1 * (modulo(j, 59.0) + lat_o / CPR_MAX);
    if rlat0 >= 270.0 {
        rlat0 -= 360.0;
    }
    if rlat1 >= 270.0 {
        rlat1 -= 360.0;
    }

    if nl(rlat0) != nl(rlat1) {
        return None;
    }

    let (lat, lon) = if even.timestamp_ms >= odd.timestamp_ms {
        let ni = cpr_n(rlat0, false);
        let m = ((lon_e * (nl(rlat0) - 1) as f64 - lon_o * nl(rlat0) as f64) / CPR_MAX + 0.5).floor();
        let lon = (360.0 / ni as f64) * (modulo(m, ni as f64) + lon_e / CPR_MAX);
        (rlat0, lon)
    } else {
        let ni = cpr_n(rlat1, true);
        let m = ((lon_e * (nl(rlat1) - 1) as f64 - lon_o * nl(rlat1) as f64) / CPR_MAX + 0.5).floor();
        let lon = (360.0 / ni as f64) * (modulo(m, ni as f64) + lon_o / CPR_MAX);
        (rlat1, lon)
    };

    let lon = if lon > 180.0 { lon - 360.0 } else { lon };
    Some(Position {
        latitude: lat,
        longitude: lon,
    })
}

/// Encodes a (lat, lon) into a CPR frame for the given format, the
/// inverse used only by tests to build self-consistent fixtures.
#[cfg(test)]
pub fn encode(position: Position, format: CprFormat, timestamp_ms: u64) -> CprFrame {
    let nb = match format {
        CprFormat::Even => 0.0,
        CprFormat::Odd => 1.0,
    };
    let dlat = 360.0 / (60.0 - nb);
    let lat = position.latitude;
    let yz = libm::floor(CPR_MAX * (modulo(lat, dlat) / dlat) + 0.5);
    let rlat = dlat * (yz / CPR_MAX + libm::floor(lat / dlat));

    let ni = cpr_n(rlat, format == CprFormat::Odd).max(1);
    let dlon = 360.0 / ni as f64;
    let lon = position.longitude;
    let xz = libm::floor(CPR_MAX * (modulo(lon, dlon) / dlon) + 0.5);

    CprFrame {
        format,
        raw_lat: (yz as i64).rem_euclid(131_072) as u32,
        raw_lon: (xz as i64).rem_euclid(131_072) as u32,
        timestamp_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn nl_boundaries() {
        assert_eq!(nl(0.0), 59);
        assert_eq!(nl(45.0), 42);
        assert_eq!(nl(89.0), 1);
    }

    #[test]
    fn cpr_idempotence() {
        let target = Position {
            latitude: 51.990,
            longitude: 4.375,
        };
        let even = encode(target, CprFormat::Even, 0);
        let odd = encode(target, CprFormat::Odd, 5_000);
        let decoded = global_position(&even, &odd).expect("pair resolves");
        assert_relative_eq!(decoded.latitude, target.latitude, epsilon = 5.2 / 111_320.0);
        assert_relative_eq!(decoded.longitude, target.longitude, epsilon = 1e-3);
    }

    #[test]
    fn zone_rejection() {
        // Construct a pair whose encoded latitudes fall in different NL
        // zones by combining an equatorial even frame with a near-polar
        // odd frame.
        let even = encode(
            Position {
                latitude: 0.0,
                longitude: 0.0,
            },
            CprFormat::Even,
            0,
        );
        let odd = encode(
            Position {
                latitude: 85.0,
                longitude: 0.0,
            },
            CprFormat::Odd,
            1_000,
        );
        assert!(global_position(&even, &odd).is_none());
    }

    #[test]
    fn stale_pair_rejected() {
        let target = Position {
            latitude: 51.990,
            longitude: 4.375,
        };
        let even = encode(target, CprFormat::Even, 0);
        let odd = encode(target, CprFormat::Odd, MAX_PAIR_AGE_MS + 1);
        assert!(global_position(&even, &odd).is_none());
    }
}
