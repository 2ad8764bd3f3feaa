//! Single-threaded cooperative event loop: one `TcpListener` per service,
//! non-blocking sockets, polled from the consumer thread at >=4 Hz. No
//! per-connection OS thread or task is ever spawned — a handler just
//! gets re-entered with more bytes on the next `poll`.

pub mod http;
pub mod raw;
pub mod sbs;

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use uuid::Uuid;

use ms1090::decode::DecodeOptions;
use ms1090::prelude::{AircraftRegistry, IcaoCache};

/// What RawIn/SbsIn need in order to turn bytes back into `Message`s and
/// feed them to the same registry the sample pipeline uses.
pub struct DecodeContext<'a> {
    pub icao_cache: &'a mut IcaoCache,
    pub opts: &'a DecodeOptions,
    pub now_epoch_s: u32,
}

/// Per-connection receive buffer cap for line protocols (RawIn/SbsIn).
/// Excess input is discarded wholesale rather than grown unboundedly.
pub const LINE_BUF_CAP: usize = 1024;
const POLL_INTERVAL: Duration = Duration::from_millis(250);
const ACTIVE_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    RawOut,
    RawIn,
    SbsOut,
    SbsIn,
    Http,
}

pub struct Connection {
    pub id: Uuid,
    pub service: Service,
    pub peer_addr: String,
    pub keep_alive: bool,
    pub buf: Vec<u8>,
    stream: TcpStream,
    closed: bool,
}

impl Connection {
    fn new(id: Uuid, service: Service, stream: TcpStream) -> Self {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "?".to_string());
        stream.set_nonblocking(true).ok();
        Connection {
            id,
            service,
            peer_addr,
            keep_alive: true,
            buf: Vec::new(),
            stream,
            closed: false,
        }
    }

    /// Non-blocking read; appends to `buf`, discarding (and counting as a
    /// buffer overflow) anything past `LINE_BUF_CAP` for line services.
    fn pump_read(&mut self) -> bool {
        let mut chunk = [0u8; 512];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    self.closed = true;
                    return true;
                }
                Ok(n) => {
                    if self.service != Service::Http && self.buf.len() + n > LINE_BUF_CAP {
                        warn!(connection = %self.id, service = ?self.service, "receive buffer overflow, dropping buffer");
                        self.buf.clear();
                        continue;
                    }
                    self.buf.extend_from_slice(&chunk[..n]);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return false,
                Err(_) => {
                    self.closed = true;
                    return true;
                }
            }
        }
    }

    pub fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        match self.stream.write_all(data) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.closed = true;
                Err(e)
            }
        }
    }
}

struct ServiceListener {
    service: Service,
    listener: Option<TcpListener>,
    last_err: Option<String>,
}

/// Owns every listener and every live connection. `poll` is the single
/// non-blocking tick; callers run it from the consumer loop at the pace
/// spec'd by `POLL_INTERVAL`.
pub struct NetReactor {
    listeners: Vec<ServiceListener>,
    connections: HashMap<Uuid, Connection>,
    last_poll: Instant,
    raw_in_bad_records: u64,
    sbs_in_records: u64,
    http_config: http::HttpConfig,
}

impl NetReactor {
    pub fn new(http_config: http::HttpConfig) -> Self {
        NetReactor {
            listeners: Vec::new(),
            connections: HashMap::new(),
            last_poll: Instant::now(),
            raw_in_bad_records: 0,
            sbs_in_records: 0,
            http_config,
        }
    }

    pub fn listen(&mut self, service: Service, port: u16) {
        match TcpListener::bind(("0.0.0.0", port)) {
            Ok(listener) => {
                listener.set_nonblocking(true).ok();
                self.listeners.push(ServiceListener {
                    service,
                    listener: Some(listener),
                    last_err: None,
                });
            }
            Err(e) => {
                warn!(%port, service = ?service, error = %e, "failed to bind service listener");
                self.listeners.push(ServiceListener {
                    service,
                    listener: None,
                    last_err: Some(e.to_string()),
                });
            }
        }
    }

    /// Returns `true` once at least `POLL_INTERVAL` has elapsed since the
    /// previous call; callers should skip a tick's work otherwise.
    pub fn due(&mut self) -> bool {
        if self.last_poll.elapsed() >= POLL_INTERVAL {
            self.last_poll = Instant::now();
            true
        } else {
            false
        }
    }

    fn accept_all(&mut self) {
        for svc in &mut self.listeners {
            let Some(listener) = svc.listener.as_ref() else {
                continue;
            };
            loop {
                match listener.accept() {
                    Ok((stream, _addr)) => {
                        let id = Uuid::new_v4();
                        debug!(connection = %id, service = ?svc.service, "accepted connection");
                        self.connections
                            .insert(id, Connection::new(id, svc.service, stream));
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(e) => {
                        svc.last_err = Some(e.to_string());
                        break;
                    }
                }
            }
        }
    }

    /// One reactor tick: accept new connections, pump reads, dispatch
    /// RawIn/SbsIn full records into the registry, and drop closed peers.
    pub fn poll(&mut self, ctx: &mut DecodeContext, registry: &mut AircraftRegistry, now_ms: u64) {
        self.accept_all();

        let ids: Vec<Uuid> = self.connections.keys().copied().collect();
        let mut to_remove = Vec::new();
        for id in ids {
            let Some(conn) = self.connections.get_mut(&id) else {
                continue;
            };
            let hung_up = conn.pump_read();

            match conn.service {
                Service::RawIn => {
                    let records = raw::drain_records(&mut conn.buf);
                    for record in records {
                        match raw::parse_record(&record) {
                            Some(payload) => {
                                raw::inject(&payload, ctx, registry, now_ms);
                            }
                            None => self.raw_in_bad_records += 1,
                        }
                    }
                }
                Service::SbsIn => {
                    let lines = sbs::drain_lines(&mut conn.buf);
                    self.sbs_in_records += lines.len() as u64;
                }
                Service::Http => {
                    if let Some(request) = http::take_request(&mut conn.buf) {
                        let response = http::handle(&request, registry, now_ms, &self.http_config);
                        let _ = conn.write_all(&response);
                        if !request.keep_alive {
                            conn.closed = true;
                        }
                    }
                }
                Service::RawOut | Service::SbsOut => {}
            }

            if hung_up || conn.closed {
                to_remove.push(id);
            }
        }

        for id in to_remove {
            self.connections.remove(&id);
        }
    }

    pub fn broadcast_raw(&mut self, payload: &[u8]) {
        let line = raw::format_line(payload);
        self.broadcast_to(Service::RawOut, line.as_bytes());
    }

    pub fn broadcast_sbs(&mut self, line: &str) {
        let mut framed = String::with_capacity(line.len() + 2);
        framed.push_str(line);
        framed.push_str("\r\n");
        self.broadcast_to(Service::SbsOut, framed.as_bytes());
    }

    fn broadcast_to(&mut self, service: Service, bytes: &[u8]) {
        let mut dead = Vec::new();
        for (id, conn) in self.connections.iter_mut() {
            if conn.service != service {
                continue;
            }
            if conn.write_all(bytes).is_err() {
                dead.push(*id);
            }
        }
        for id in dead {
            self.connections.remove(&id);
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn raw_in_bad_records(&self) -> u64 {
        self.raw_in_bad_records
    }

    pub fn sbs_in_records(&self) -> u64 {
        self.sbs_in_records
    }
}

/// Attempts an outbound (active) connection for the given service with a
/// 5 s timeout, matching the reactor's repeating-timer contract for
/// active-connect attempts.
pub fn connect_active(service: Service, addr: &str) -> io::Result<Connection> {
    let socket_addr: std::net::SocketAddr = addr
        .parse()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "bad address"))?;
    let stream = TcpStream::connect_timeout(&socket_addr, ACTIVE_CONNECT_TIMEOUT)?;
    Ok(Connection::new(Uuid::new_v4(), service, stream))
}
