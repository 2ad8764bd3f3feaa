//! SbsOut: BaseStation CSV, 22 comma-separated fields, one line per
//! eligible decoded message. SbsIn is reserved — a line-oriented consumer
//! that counts records but need not replay their effects (the upstream
//! source stubs this too).

use chrono::{DateTime, Utc};

use ms1090::cpr::Position;
use ms1090::decode::{AltitudeUnit, Message};

fn timestamp_fields(now_ms: u64) -> (String, String) {
    let dt: DateTime<Utc> = DateTime::from_timestamp(
        (now_ms / 1000) as i64,
        ((now_ms % 1000) * 1_000_000) as u32,
    )
    .unwrap_or_else(Utc::now);
    (
        dt.format("%Y/%m/%d").to_string(),
        dt.format("%H:%M:%S%.3f").to_string(),
    )
}

/// One BaseStation CSV line for `msg`, or `None` if this message/DF
/// combination has no SBS emission (§6 lists only a subset of DFs).
/// `position`, if given, is the CPR-resolved fix for `msg.icao` — only
/// DF17 position reports (me_type 9..=18) use it.
pub fn format_line(msg: &Message, position: Option<Position>, now_ms: u64) -> Option<String> {
    let icao = msg.icao_hex().to_uppercase();
    let (date, time) = timestamp_fields(now_ms);

    let base = |msg_type: u32| -> Vec<String> {
        vec![
            "MSG".to_string(),
            msg_type.to_string(),
            "".to_string(),
            "".to_string(),
            icao.clone(),
            "".to_string(),
            date.clone(),
            time.clone(),
            date.clone(),
            time.clone(),
        ]
    };

    let tail: Vec<String> = match (msg.df, msg.me_type) {
        (0, _) => {
            // callsign, altitude, then speed/track/lat/lon/vrate/squawk/flags (10 blanks)
            let mut f = base(5);
            f.push(String::new());
            f.push(msg.altitude.map(|a| a.to_string()).unwrap_or_default());
            f.extend(std::iter::repeat(String::new()).take(10));
            f
        }
        (4, _) => {
            // callsign, altitude, speed/track/lat/lon/vrate/squawk (6 blanks), then flags
            let mut f = base(5);
            f.push(String::new());
            f.push(msg.altitude.map(|a| a.to_string()).unwrap_or_default());
            f.extend(std::iter::repeat(String::new()).take(6));
            f.push("0".to_string());
            f.push("0".to_string());
            f.push("0".to_string());
            f.push("0".to_string());
            f
        }
        (5, _) => {
            // callsign/altitude/speed/track/lat/lon/vrate (7 blanks), squawk, flags
            let mut f = base(6);
            f.extend(std::iter::repeat(String::new()).take(7));
            f.push(
                msg.identity
                    .map(|id| format!("{id:04}"))
                    .unwrap_or_default(),
            );
            f.push("0".to_string());
            f.push("0".to_string());
            f.push("0".to_string());
            f.push("0".to_string());
            f
        }
        (11, _) => {
            let mut f = base(8);
            f.extend(std::iter::repeat(String::new()).take(12));
            f
        }
        (17, 1..=4) => {
            // callsign, then altitude/speed/track/lat/lon/vrate/squawk (7 blanks), literal flags
            let mut f = base(1);
            f.push(msg.flight.clone().unwrap_or_default());
            f.extend(std::iter::repeat(String::new()).take(7));
            f.push("0".to_string());
            f.push("0".to_string());
            f.push("0".to_string());
            f.push("0".to_string());
            f
        }
        (17, 9..=18) => {
            // callsign blank, altitude, speed/track blank, lat/lon (if resolved), vrate/squawk blank, flags
            let mut f = base(3);
            f.push(String::new());
            f.push(msg.altitude.map(|a| a.to_string()).unwrap_or_default());
            f.extend(std::iter::repeat(String::new()).take(2));
            match position {
                Some(p) => {
                    f.push(format!("{:.5}", p.latitude));
                    f.push(format!("{:.5}", p.longitude));
                }
                None => {
                    f.push(String::new());
                    f.push(String::new());
                }
            }
            f.extend(std::iter::repeat(String::new()).take(2));
            f.push("0".to_string());
            f.push("0".to_string());
            f.push("0".to_string());
            f.push("0".to_string());
            f
        }
        (17, 19) if msg.me_subtype == 1 => {
            // callsign/altitude blank, speed, track, lat/lon blank, vrate, squawk blank, flags
            let mut f = base(4);
            f.push(String::new());
            f.push(String::new());
            f.push(msg.speed_kt.map(|s| format!("{s:.0}")).unwrap_or_default());
            f.push(
                msg.heading
                    .map(|h| format!("{h:.0}"))
                    .unwrap_or_default(),
            );
            f.extend(std::iter::repeat(String::new()).take(2));
            f.push(
                msg.vertical_rate
                    .map(|vr| vr.to_string())
                    .unwrap_or_default(),
            );
            f.push(String::new());
            f.push("0".to_string());
            f.push("0".to_string());
            f.push("0".to_string());
            f.push("0".to_string());
            f
        }
        (21, _) => {
            // same layout as DF5
            let mut f = base(6);
            f.extend(std::iter::repeat(String::new()).take(7));
            f.push(
                msg.identity
                    .map(|id| format!("{id:04}"))
                    .unwrap_or_default(),
            );
            f.push("0".to_string());
            f.push("0".to_string());
            f.push("0".to_string());
            f.push("0".to_string());
            f
        }
        _ => return None,
    };

    let _ = msg.altitude_unit;
    Some(tail.join(","))
}

/// Consumes complete lines from `buf`, returning them for a counting-only
/// caller (per the open question, SbsIn need not replay effects).
pub fn drain_lines(buf: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    let mut start = 0;
    for i in 0..buf.len() {
        if buf[i] == b'\n' {
            let end = if i > start && buf[i - 1] == b'\r' { i - 1 } else { i };
            if let Ok(text) = std::str::from_utf8(&buf[start..end]) {
                if !text.trim().is_empty() {
                    lines.push(text.trim().to_string());
                }
            }
            start = i + 1;
        }
    }
    buf.drain(0..start);
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use ms1090::decode::FixedBitIndex;

    fn base_message(df: u8, icao: u32) -> Message {
        Message {
            payload: vec![],
            df,
            bits: if df == 0 || df == 4 || df == 5 { 56 } else { 112 },
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
    fn df17_identification_emits_msg_type_1_with_flight() {
        let mut msg = base_message(17, 0x4B9696);
        msg.me_type = 4;
        msg.flight = Some("KLM1023".to_string());
        let line = format_line(&msg, None, 0).expect("sbs line");
        let fields: Vec<&str> = line.split(',').collect();
        assert_eq!(fields.len(), 22);
        assert_eq!(fields[0], "MSG");
        assert_eq!(fields[1], "1");
        assert_eq!(fields[4], "4B9696");
        assert_eq!(fields[10], "KLM1023");
        assert_eq!(&fields[18..22], ["0", "0", "0", "0"]);
    }

    #[test]
    fn df4_emits_msg_type_5_with_altitude() {
        let mut msg = base_message(4, 0x4840D6);
        msg.altitude = Some(38000);
        let line = format_line(&msg, None, 0).expect("sbs line");
        let fields: Vec<&str> = line.split(',').collect();
        assert_eq!(fields.len(), 22);
        assert_eq!(fields[0], "MSG");
        assert_eq!(fields[1], "5");
        assert_eq!(fields[4], "4840D6");
        assert_eq!(fields[11], "38000");
        assert_eq!(&fields[18..22], ["0", "0", "0", "0"]);
    }

    #[test]
    fn df0_emits_msg_type_5_with_altitude_only() {
        let mut msg = base_message(0, 0x4840D6);
        msg.altitude = Some(5000);
        let line = format_line(&msg, None, 0).expect("sbs line");
        let fields: Vec<&str> = line.split(',').collect();
        assert_eq!(fields.len(), 22);
        assert_eq!(fields[1], "5");
        assert_eq!(fields[11], "5000");
    }

    #[test]
    fn df5_emits_msg_type_6_with_identity_in_field_17() {
        let mut msg = base_message(5, 0x4840D6);
        msg.identity = Some(1200);
        let line = format_line(&msg, None, 0).expect("sbs line");
        let fields: Vec<&str> = line.split(',').collect();
        assert_eq!(fields.len(), 22);
        assert_eq!(fields[1], "6");
        assert_eq!(fields[17], "1200");
        assert_eq!(&fields[18..22], ["0", "0", "0", "0"]);
    }

    #[test]
    fn df11_emits_msg_type_8_with_no_payload_fields() {
        let msg = base_message(11, 0x4840D6);
        let line = format_line(&msg, None, 0).expect("sbs line");
        let fields: Vec<&str> = line.split(',').collect();
        assert_eq!(fields.len(), 22);
        assert_eq!(fields[1], "8");
    }

    #[test]
    fn df17_position_emits_resolved_lat_lon() {
        let mut msg = base_message(17, 0x4840D6);
        msg.me_type = 11;
        msg.altitude = Some(35000);
        let position = Position { latitude: 51.99, longitude: 4.375 };
        let line = format_line(&msg, Some(position), 0).expect("sbs line");
        let fields: Vec<&str> = line.split(',').collect();
        assert_eq!(fields.len(), 22);
        assert_eq!(fields[1], "3");
        assert_eq!(fields[11], "35000");
        assert_eq!(fields[14], "51.99000");
        assert_eq!(fields[15], "4.37500");
        assert_eq!(&fields[18..22], ["0", "0", "0", "0"]);
    }

    #[test]
    fn df17_position_leaves_lat_lon_blank_when_unresolved() {
        let mut msg = base_message(17, 0x4840D6);
        msg.me_type = 11;
        let line = format_line(&msg, None, 0).expect("sbs line");
        let fields: Vec<&str> = line.split(',').collect();
        assert_eq!(fields.len(), 22);
        assert_eq!(fields[14], "");
        assert_eq!(fields[15], "");
    }

    #[test]
    fn df17_velocity_emits_speed_track_and_vertical_rate() {
        let mut msg = base_message(17, 0x4840D6);
        msg.me_type = 19;
        msg.me_subtype = 1;
        msg.speed_kt = Some(420.0);
        msg.heading = Some(270.0);
        msg.vertical_rate = Some(-64);
        let line = format_line(&msg, None, 0).expect("sbs line");
        let fields: Vec<&str> = line.split(',').collect();
        assert_eq!(fields.len(), 22);
        assert_eq!(fields[1], "4");
        assert_eq!(fields[12], "420");
        assert_eq!(fields[13], "270");
        assert_eq!(fields[16], "-64");
        assert_eq!(&fields[18..22], ["0", "0", "0", "0"]);
    }

    #[test]
    fn df21_emits_msg_type_6_like_df5() {
        let mut msg = base_message(21, 0x4840D6);
        msg.identity = Some(7500);
        let line = format_line(&msg, None, 0).expect("sbs line");
        let fields: Vec<&str> = line.split(',').collect();
        assert_eq!(fields.len(), 22);
        assert_eq!(fields[1], "6");
        assert_eq!(fields[17], "7500");
    }

    #[test]
    fn unsupported_df_emits_nothing() {
        let msg = base_message(16, 0x123456);
        assert!(format_line(&msg, None, 0).is_none());
    }

    #[test]
    fn drains_lines_leaving_partial_tail() {
        let mut buf = b"one\r\ntwo\nthre".to_vec();
        let lines = drain_lines(&mut buf);
        assert_eq!(lines, vec!["one", "two"]);
        assert_eq!(buf, b"thre");
    }
}
