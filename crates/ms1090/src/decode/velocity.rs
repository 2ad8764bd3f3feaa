//! Airborne velocity (DF17 me_type == 19): ground-speed subtypes 1/2 and
//! airspeed/heading subtypes 3/4.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundVelocity {
    pub speed_kt: f64,
    pub heading_deg: f64,
    pub vertical_rate: Option<i16>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingVelocity {
    pub heading_valid: bool,
    pub heading_deg: f64,
    pub vertical_rate: Option<i16>,
}

fn vertical_rate(msg: &[u8]) -> Option<i16> {
    // source_geo (msg[8] & 0x10) distinguishes geometric from barometric
    // rate; it's metadata only and doesn't gate whether a rate is decoded.
    let sign = if (msg[8] & 0x08) != 0 { -1i32 } else { 1 };
    let raw = (((msg[8] & 0x07) as i32) << 6) | (((msg[9] & 0xFC) >> 2) as i32);
    if raw == 0 {
        return None;
    }
    Some((sign * (raw - 1) * 64) as i16)
}

/// Ground speed subtypes 1 (subsonic) and 2 (supersonic) share layout.
pub fn ground_velocity(msg: &[u8]) -> GroundVelocity {
    let ew_sign = if (msg[5] & 0x04) != 0 { -1.0 } else { 1.0 };
    let ew_raw = ((((msg[5] & 0x03) as u16) << 8) | (msg[6] as u16)) as f64;
    let ns_sign = if (msg[7] & 0x80) != 0 { -1.0 } else { 1.0 };
    let ns_raw =
        ((((msg[7] & 0x7F) as u16) << 3) | (((msg[8] & 0xE0) >> 5) as u16)) as f64;

    let ew = ew_sign * (ew_raw - 1.0).max(0.0);
    let ns = ns_sign * (ns_raw - 1.0).max(0.0);

    let speed = libm::hypot(ew, ns);
    let mut heading = libm::atan2(ew, ns) * 180.0 / std::f64::consts::PI;
    if heading < 0.0 {
        heading += 360.0;
    }

    GroundVelocity {
        speed_kt: speed,
        heading_deg: heading,
        vertical_rate: vertical_rate(msg),
    }
}

/// Airspeed/heading subtypes 3 (subsonic) and 4 (supersonic).
pub fn heading_velocity(msg: &[u8]) -> HeadingVelocity {
    let heading_valid = (msg[5] & 0x04) != 0;
    let raw = (((msg[5] & 0x03) as u16) << 5) | ((msg[6] >> 3) as u16);
    let heading_deg = (360.0 / 128.0) * raw as f64;

    HeadingVelocity {
        heading_valid,
        heading_deg,
        vertical_rate: vertical_rate(msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ground_velocity_heading_is_normalized() {
        let mut msg = [0u8; 14];
        // subsonic ground speed subtype, EW=east, positive magnitude
        msg[5] = 0b000_00_001; // ew_sign=0 (east), ew high bits = 01
        msg[6] = 0x00;
        msg[7] = 0x00; // ns_sign=0 (north)
        let v = ground_velocity(&msg);
        assert!((0.0..360.0).contains(&v.heading_deg));
        assert!(v.speed_kt >= 0.0);
    }

    #[test]
    fn heading_subtype_scales_to_degrees() {
        let mut msg = [0u8; 14];
        msg[5] = 0x04; // heading_valid bit set, raw high bits 0
        msg[6] = 0x00;
        let v = heading_velocity(&msg);
        assert!(v.heading_valid);
        assert_eq!(v.heading_deg, 0.0);
    }

    #[test]
    fn vertical_rate_decodes_regardless_of_geometric_source() {
        let mut msg = [0u8; 14];
        msg[8] = 0x10 | 0x01; // source_geo set, sign positive, raw high bits = 1
        msg[9] = 0x00;
        let v = ground_velocity(&msg);
        assert_eq!(v.vertical_rate, Some(4032));
    }
}
