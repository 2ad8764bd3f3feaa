//! Minimal `GET <path> HTTP/1.x` server: three JSON endpoints read from
//! the registry, a 303 redirect to the configured web page, static
//! serving from `web_root` with inferred Content-Type, and two embedded
//! favicon assets. Runs on the same cooperative reactor as the other
//! services rather than a per-connection task.

use std::path::{Path, PathBuf};

use serde::Serialize;

use ms1090::prelude::{AircraftRegistry, Position};

static FAVICON_PNG: &[u8] = include_bytes!("../../assets/favicon.png");
static FAVICON_ICO: &[u8] = include_bytes!("../../assets/favicon.ico");

pub struct HttpConfig {
    pub web_root: PathBuf,
    pub web_page: String,
    pub version: String,
    pub refresh_ms: u64,
    pub history: usize,
    pub home: Option<Position>,
}

pub struct Request {
    pub method: String,
    pub path: String,
    pub keep_alive: bool,
}

/// Pulls one complete `\r\n\r\n`-terminated request out of `buf`, if any.
/// Bodies are never expected (GET-only), so headers-end is the whole
/// message.
pub fn take_request(buf: &mut Vec<u8>) -> Option<Request> {
    let text = std::str::from_utf8(buf).ok()?;
    let header_end = text.find("\r\n\r\n")?;
    let head = &text[..header_end];
    let mut lines = head.lines();
    let request_line = lines.next()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let keep_alive = lines
        .find_map(|l| l.to_lowercase().strip_prefix("connection:").map(|v| v.trim().to_string()))
        .map(|v| v.eq_ignore_ascii_case("keep-alive"))
        .unwrap_or(true);

    let consumed = header_end + 4;
    buf.drain(0..consumed);
    Some(Request { method, path, keep_alive })
}

#[derive(Serialize)]
struct ReceiverJson {
    version: String,
    refresh: u64,
    history: usize,
    lat: f64,
    lon: f64,
}

#[derive(Serialize)]
struct LegacyAircraftJson {
    hex: String,
    flight: Option<String>,
    lat: f64,
    lon: f64,
    altitude: Option<i32>,
    track: Option<f64>,
    speed: Option<f64>,
}

#[derive(Serialize)]
struct ExtendedAircraftJson {
    hex: String,
    flight: Option<String>,
    lat: f64,
    lon: f64,
    altitude: Option<i32>,
    track: Option<f64>,
    speed: Option<f64>,
    #[serde(rename = "type")]
    kind: &'static str,
    messages: u64,
    seen: f64,
    seen_pos: f64,
}

#[derive(Serialize)]
struct AircraftJsonDoc {
    now: f64,
    messages: u64,
    aircraft: Vec<ExtendedAircraftJson>,
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

fn response(status: u16, reason: &str, content_type: &str, body: &[u8], keep_alive: bool) -> Vec<u8> {
    let mut head = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: {}\r\n\r\n",
        body.len(),
        if keep_alive { "keep-alive" } else { "close" }
    )
    .into_bytes();
    head.extend_from_slice(body);
    head
}

fn redirect(location: &str, keep_alive: bool) -> Vec<u8> {
    format!(
        "HTTP/1.1 303 See Other\r\nLocation: {location}\r\nContent-Length: 0\r\nConnection: {}\r\n\r\n",
        if keep_alive { "keep-alive" } else { "close" }
    )
    .into_bytes()
}

fn not_found(keep_alive: bool) -> Vec<u8> {
    response(404, "Not Found", "text/plain", b"not found", keep_alive)
}

/// Dispatches one parsed request against the registry/config, returning
/// the full byte response (status line, headers, body).
pub fn handle(
    request: &Request,
    registry: &AircraftRegistry,
    now_ms: u64,
    config: &HttpConfig,
) -> Vec<u8> {
    if request.method != "GET" {
        return response(405, "Method Not Allowed", "text/plain", b"GET only", request.keep_alive);
    }

    match request.path.as_str() {
        "/" => redirect(&config.web_page, request.keep_alive),
        "/data/receiver.json" => {
            let home = config.home.unwrap_or(Position { latitude: 0.0, longitude: 0.0 });
            let doc = ReceiverJson {
                version: config.version.clone(),
                refresh: config.refresh_ms,
                history: config.history,
                lat: home.latitude,
                lon: home.longitude,
            };
            let body = serde_json::to_vec(&doc).unwrap_or_default();
            response(200, "OK", "application/json", &body, request.keep_alive)
        }
        "/data.json" => {
            let snapshot = registry.snapshot_for_json(now_ms);
            let docs: Vec<LegacyAircraftJson> = snapshot
                .iter()
                .map(|a| LegacyAircraftJson {
                    hex: format!("{:06x}", a.icao),
                    flight: a.flight.clone(),
                    lat: a.position.latitude,
                    lon: a.position.longitude,
                    altitude: a.altitude,
                    track: a.heading,
                    speed: a.speed,
                })
                .collect();
            let body = serde_json::to_vec(&docs).unwrap_or_default();
            response(200, "OK", "application/json", &body, request.keep_alive)
        }
        "/data/aircraft.json" => {
            let snapshot = registry.snapshot_for_json(now_ms);
            let messages: u64 = snapshot.iter().map(|a| a.messages).sum();
            let docs: Vec<ExtendedAircraftJson> = snapshot
                .iter()
                .map(|a| ExtendedAircraftJson {
                    hex: format!("{:06x}", a.icao),
                    flight: a.flight.clone(),
                    lat: a.position.latitude,
                    lon: a.position.longitude,
                    altitude: a.altitude,
                    track: a.heading,
                    speed: a.speed,
                    kind: "adsb_icao",
                    messages: a.messages,
                    seen: now_ms.saturating_sub(a.seen_last_ms) as f64 / 1000.0,
                    seen_pos: now_ms.saturating_sub(a.seen_last_ms) as f64 / 1000.0,
                })
                .collect();
            let doc = AircraftJsonDoc {
                now: now_ms as f64 / 1000.0,
                messages,
                aircraft: docs,
            };
            let body = serde_json::to_vec(&doc).unwrap_or_default();
            response(200, "OK", "application/json", &body, request.keep_alive)
        }
        "/favicon.png" => response(200, "OK", "image/png", FAVICON_PNG, request.keep_alive),
        "/favicon.ico" => response(200, "OK", "image/png", FAVICON_ICO, request.keep_alive),
        other => serve_static(other, config, request.keep_alive),
    }
}

fn serve_static(path: &str, config: &HttpConfig, keep_alive: bool) -> Vec<u8> {
    let relative = path.trim_start_matches('/');
    if relative.contains("..") {
        return not_found(keep_alive);
    }
    let full = config.web_root.join(relative);
    match std::fs::read(&full) {
        Ok(body) => response(200, "OK", content_type(&full), &body, keep_alive),
        Err(_) => not_found(keep_alive),
    }
}
