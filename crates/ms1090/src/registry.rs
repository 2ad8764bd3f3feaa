//! Tracks one `Aircraft` record per ICAO address: CPR pairing, identity
//! and altitude updates, signal-strength averaging, TTL eviction, and the
//! dead-reckoned "estimated position" used once an aircraft goes quiet.

use std::collections::HashMap;

use tracing::debug;

use crate::cpr::{global_position, CprFormat, CprFrame, Position};
use crate::decode::{AltitudeUnit, Message};

pub const DEFAULT_TTL_MS: u64 = 60_000;
const SIGNAL_RING_SIZE: usize = 4;
const KNOTS_TO_M_PER_MS: f64 = 0.001852;
const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowState {
    FirstTime,
    Normal,
    LastTime,
    None,
}

#[derive(Debug, Clone)]
pub struct Aircraft {
    pub icao: u32,
    pub flight: Option<String>,
    pub altitude: Option<i32>,
    pub altitude_unit: AltitudeUnit,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub heading_valid: bool,
    pub identity: Option<u16>,
    pub position: Position,
    pub odd_cpr: Option<CprFrame>,
    pub even_cpr: Option<CprFrame>,
    pub signal_levels: [f64; SIGNAL_RING_SIZE],
    pub signal_idx: usize,
    pub messages: u64,
    pub seen_first_ms: u64,
    pub seen_last_ms: u64,
    pub distance_m: Option<f64>,
    pub est_position: Option<Position>,
    pub est_seen_last_ms: u64,
    pub est_distance_m: Option<f64>,
    pub show_state: ShowState,
}

impl Aircraft {
    fn new(icao: u32, now_ms: u64) -> Self {
        const _: () = assert!(SIGNAL_RING_SIZE.is_power_of_two());
        Aircraft {
            icao,
            flight: None,
            altitude: None,
            altitude_unit: AltitudeUnit::Feet,
            speed: None,
            heading: None,
            heading_valid: false,
            identity: None,
            position: Position {
                latitude: 0.0,
                longitude: 0.0,
            },
            odd_cpr: None,
            even_cpr: None,
            signal_levels: [0.0; SIGNAL_RING_SIZE],
            signal_idx: 0,
            messages: 0,
            seen_first_ms: now_ms,
            seen_last_ms: now_ms,
            distance_m: None,
            est_position: None,
            est_seen_last_ms: now_ms,
            est_distance_m: None,
            show_state: ShowState::FirstTime,
        }
    }

    pub fn has_position(&self) -> bool {
        self.position.latitude != 0.0 || self.position.longitude != 0.0
    }

    fn push_signal(&mut self, power: f64) {
        self.signal_levels[self.signal_idx & (SIGNAL_RING_SIZE - 1)] = power;
        self.signal_idx = self.signal_idx.wrapping_add(1);
    }
}

pub struct AircraftRegistry {
    aircraft: HashMap<u32, Aircraft>,
    ttl_ms: u64,
    home: Option<Position>,
}

impl AircraftRegistry {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL_MS)
    }

    pub fn with_ttl(ttl_ms: u64) -> Self {
        AircraftRegistry {
            aircraft: HashMap::new(),
            ttl_ms,
            home: None,
        }
    }

    pub fn set_home(&mut self, home: Position) {
        self.home = Some(home);
    }

    /// Looks up or inserts by `msg.icao`, applies the message's fields,
    /// and returns the updated record. Drops silently if the CRC did not
    /// validate (the caller is expected to have already filtered these).
    pub fn ingest(&mut self, msg: &Message, now_ms: u64) -> Option<&Aircraft> {
        if !msg.crc_ok {
            return None;
        }

        let is_new = !self.aircraft.contains_key(&msg.icao);
        let aircraft = self
            .aircraft
            .entry(msg.icao)
            .or_insert_with(|| Aircraft::new(msg.icao, now_ms));

        if is_new {
            aircraft.show_state = ShowState::FirstTime;
        } else if aircraft.show_state == ShowState::FirstTime {
            aircraft.show_state = ShowState::Normal;
        }

        aircraft.seen_last_ms = now_ms;
        aircraft.messages += 1;
        aircraft.push_signal(msg.signal_power);

        match msg.df {
            5 | 21 => {
                if let Some(identity) = msg.identity {
                    aircraft.identity = Some(identity);
                }
            }
            0 | 4 | 20 => {
                if let Some(altitude) = msg.altitude {
                    aircraft.altitude = Some(altitude);
                    aircraft.altitude_unit = msg.altitude_unit;
                }
            }
            17 => match msg.me_type {
                1..=4 => {
                    if let Some(flight) = &msg.flight {
                        aircraft.flight = Some(flight.trim_end().to_string());
                    }
                }
                9..=18 | 20..=22 => {
                    if let Some(altitude) = msg.altitude {
                        aircraft.altitude = Some(altitude);
                        aircraft.altitude_unit = msg.altitude_unit;
                    }
                    if let (Some(raw_lat), Some(raw_lon)) = (msg.raw_lat, msg.raw_lon) {
                        let frame = CprFrame {
                            format: if msg.odd_flag {
                                CprFormat::Odd
                            } else {
                                CprFormat::Even
                            },
                            raw_lat,
                            raw_lon,
                            timestamp_ms: now_ms,
                        };
                        if msg.odd_flag {
                            aircraft.odd_cpr = Some(frame);
                        } else {
                            aircraft.even_cpr = Some(frame);
                        }

                        if let (Some(even), Some(odd)) = (aircraft.even_cpr, aircraft.odd_cpr) {
                            if let Some(pos) = global_position(&even, &odd) {
                                aircraft.position = pos;
                            }
                        }
                    }
                }
                19 => {
                    if matches!(msg.me_subtype, 1 | 2) {
                        aircraft.speed = msg.speed_kt;
                    }
                    if let Some(heading) = msg.heading {
                        aircraft.heading = Some(heading);
                        aircraft.heading_valid = msg.heading_valid;
                    }
                }
                _ => {}
            },
            _ => {}
        }

        if let Some(home) = self.home {
            if aircraft.has_position() {
                aircraft.distance_m = Some(haversine_m(home, aircraft.position));
            }
        }

        self.aircraft.get(&msg.icao)
    }

    /// Transitions `Normal -> LastTime` past `ttl - 1000ms` of silence and
    /// removes records entirely past `ttl`. Returns the single aircraft
    /// that was just marked `LastTime`, if any.
    pub fn evict(&mut self, now_ms: u64) -> Option<u32> {
        let mut just_marked = None;
        self.aircraft.retain(|&icao, a| {
            let age = now_ms.saturating_sub(a.seen_last_ms);
            if age > self.ttl_ms {
                debug!(icao = format!("{icao:06x}"), age, "evicting aircraft past TTL");
                return false;
            }
            if age > self.ttl_ms.saturating_sub(1_000)
                && matches!(a.show_state, ShowState::FirstTime | ShowState::Normal)
            {
                a.show_state = ShowState::LastTime;
                just_marked = Some(icao);
            }
            true
        });
        just_marked
    }

    pub fn get(&self, icao: u32) -> Option<&Aircraft> {
        self.aircraft.get(&icao)
    }

    pub fn len(&self) -> usize {
        self.aircraft.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aircraft.is_empty()
    }

    /// Aircraft with a CPR-resolved position, in a stable (ICAO-sorted)
    /// order. One bounded pass; never blocks ingestion beyond its own
    /// lock hold.
    pub fn snapshot_for_json(&self, _now_ms: u64) -> Vec<&Aircraft> {
        let mut snapshot: Vec<&Aircraft> = self
            .aircraft
            .values()
            .filter(|a| a.has_position())
            .collect();
        snapshot.sort_by_key(|a| a.icao);
        snapshot
    }

    /// Dead-reckons from the last known good position using `heading` and
    /// `speed`, taking the closer of the great-circle and flat-Cartesian
    /// estimate to home.
    pub fn compute_est_distance(&mut self, icao: u32, now_ms: u64) -> Option<f64> {
        let home = self.home?;
        let aircraft = self.aircraft.get_mut(&icao)?;
        if !aircraft.has_position() {
            return None;
        }
        let heading = aircraft.heading?;
        let speed = aircraft.speed?;

        let elapsed_ms = now_ms.saturating_sub(aircraft.seen_last_ms) as f64;
        let distance_m = speed * KNOTS_TO_M_PER_MS * elapsed_ms;
        let heading_rad = heading.to_radians();

        let est = project_position(aircraft.position, heading_rad, distance_m);

        let great_circle = haversine_m(home, est);
        let cartesian = cartesian_distance_m(home, est);
        let closer = great_circle.min(cartesian);

        aircraft.est_position = Some(est);
        aircraft.est_seen_last_ms = now_ms;
        aircraft.est_distance_m = Some(closer);
        Some(closer)
    }
}

impl Default for AircraftRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn project_position(origin: Position, heading_rad: f64, distance_m: f64) -> Position {
    let angular = distance_m / EARTH_RADIUS_M;
    let lat1 = origin.latitude.to_radians();
    let lon1 = origin.longitude.to_radians();

    let lat2 = libm::asin(
        libm::sin(lat1) * libm::cos(angular)
            + libm::cos(lat1) * libm::sin(angular) * libm::cos(heading_rad),
    );
    let lon2 = lon1
        + libm::atan2(
            libm::sin(heading_rad) * libm::sin(angular) * libm::cos(lat1),
            libm::cos(angular) - libm::sin(lat1) * libm::sin(lat2),
        );

    Position {
        latitude: lat2.to_degrees(),
        longitude: lon2.to_degrees(),
    }
}

fn haversine_m(a: Position, b: Position) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = libm::sin(dlat / 2.0).powi(2)
        + libm::cos(lat1) * libm::cos(lat2) * libm::sin(dlon / 2.0).powi(2);
    2.0 * EARTH_RADIUS_M * libm::atan2(libm::sqrt(h), libm::sqrt(1.0 - h))
}

/// Flat-earth approximation, cheap to compute alongside the great-circle
/// distance so the registry can take whichever is closer.
fn cartesian_distance_m(a: Position, b: Position) -> f64 {
    let lat_mid = ((a.latitude + b.latitude) / 2.0).to_radians();
    let m_per_deg_lat = 111_320.0;
    let m_per_deg_lon = 111_320.0 * libm::cos(lat_mid);

    let dy = (b.latitude - a.latitude) * m_per_deg_lat;
    let dx = (b.longitude - a.longitude) * m_per_deg_lon;
    libm::hypot(dx, dy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{AltitudeUnit, FixedBitIndex};

    fn base_message(icao: u32) -> Message {
        Message {
            payload: vec![],
            df: 17,
            bits: 112,
            crc_declared: 0,
            crc_computed: 0,
            crc_ok: true,
            fixed_bit_index: FixedBitIndex::NONE,
            icao,
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
            signal_power: 0.5,
        }
    }

    #[test]
    fn new_aircraft_starts_first_time() {
        let mut reg = AircraftRegistry::new();
        let msg = base_message(0x4840D6);
        let a = reg.ingest(&msg, 1_000).expect("ingested");
        assert_eq!(a.show_state, ShowState::FirstTime);
        assert_eq!(a.messages, 1);
    }

    #[test]
    fn second_message_transitions_to_normal() {
        let mut reg = AircraftRegistry::new();
        let msg = base_message(0x4840D6);
        reg.ingest(&msg, 1_000);
        let a = reg.ingest(&msg, 1_100).expect("ingested");
        assert_eq!(a.show_state, ShowState::Normal);
        assert_eq!(a.messages, 2);
    }

    #[test]
    fn dropped_if_crc_not_ok() {
        let mut reg = AircraftRegistry::new();
        let mut msg = base_message(0x4840D6);
        msg.crc_ok = false;
        assert!(reg.ingest(&msg, 1_000).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn eviction_marks_then_removes() {
        let mut reg = AircraftRegistry::with_ttl(10_000);
        let msg = base_message(0x4840D6);
        reg.ingest(&msg, 0);

        assert_eq!(reg.evict(5_000), None);
        assert_eq!(reg.evict(9_500), Some(0x4840D6));
        assert!(reg.get(0x4840D6).is_some());

        assert_eq!(reg.evict(10_001), None);
        assert!(reg.get(0x4840D6).is_none());
    }

    #[test]
    fn signal_ring_wraps_at_power_of_two() {
        let mut reg = AircraftRegistry::new();
        let msg = base_message(0x4840D6);
        for i in 0..6 {
            reg.ingest(&msg, 1_000 + i);
        }
        let a = reg.get(0x4840D6).unwrap();
        assert_eq!(a.signal_idx, 6);
    }

    #[test]
    fn cpr_pair_resolves_position_on_second_frame() {
        use crate::cpr::encode;

        let target = Position { latitude: 51.990, longitude: 4.375 };
        let even = encode(target, CprFormat::Even, 0);
        let odd = encode(target, CprFormat::Odd, 5_000);

        let mut reg = AircraftRegistry::new();
        let mut msg = base_message(0x4840D6);
        msg.me_type = 11;

        msg.odd_flag = false;
        msg.raw_lat = Some(even.raw_lat);
        msg.raw_lon = Some(even.raw_lon);
        reg.ingest(&msg, 0);

        msg.odd_flag = true;
        msg.raw_lat = Some(odd.raw_lat);
        msg.raw_lon = Some(odd.raw_lon);
        let a = reg.ingest(&msg, 5_000).expect("ingested");

        assert!((a.position.latitude - target.latitude).abs() < 1e-3);
        assert!((a.position.longitude - target.longitude).abs() < 1e-3);
    }
}
