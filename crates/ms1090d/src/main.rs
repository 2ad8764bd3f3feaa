mod cli;
mod net;

use std::fs::File;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use tracing::{info, warn};

use ms1090::decode::{decode, DecodeOptions};
use ms1090::icao_cache::IcaoCache;
use ms1090::magnitude::MagnitudeMap;
use ms1090::pipeline::{self, DATA_LEN};
use ms1090::registry::AircraftRegistry;

use net::{http::HttpConfig, DecodeContext, NetReactor, Service};

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "ms1090d=info,ms1090=info",
        1 => "ms1090d=debug,ms1090=debug",
        _ => "ms1090d=trace,ms1090=trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn now_epoch_s() -> u32 {
    (now_ms() / 1000) as u32
}

/// Reads I/Q bytes from a file (or stdin via `-`), optionally looping.
/// This is the one supported `SampleSource` in this build: the RTLSDR/
/// SDRplay device drivers are an out-of-scope external collaborator.
fn run_infile_producer(
    path: String,
    loop_count: Option<u32>,
    mut producer: pipeline::Producer,
    exit: Arc<AtomicBool>,
) {
    std::thread::spawn(move || {
        let mut passes = 0u32;
        loop {
            let mut reader: Box<dyn Read> = if path == "-" {
                Box::new(std::io::stdin())
            } else {
                match File::open(&path) {
                    Ok(f) => Box::new(f),
                    Err(e) => {
                        let err = ms1090::error::Error::DeviceOpenFailed {
                            device: path.clone(),
                            reason: e.to_string(),
                        };
                        warn!(%err, "failed to open sample file");
                        exit.store(true, Ordering::SeqCst);
                        return;
                    }
                }
            };

            let mut chunk = vec![0u8; DATA_LEN];
            loop {
                if exit.load(Ordering::SeqCst) {
                    return;
                }
                match reader.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => producer.produce(&chunk[..n]),
                    Err(_) => break,
                }
            }

            passes += 1;
            match loop_count {
                Some(0) => continue,
                Some(n) if passes < n => continue,
                Some(_) => break,
                None => break,
            }
        }
        exit.store(true, Ordering::SeqCst);
    });
}

fn main() {
    let opts = cli::Options::parse();
    init_tracing(opts.verbose);

    let home = cli::Options::home_position();
    if let Some(home) = home {
        info!(lat = home.latitude, lon = home.longitude, "home position configured");
    }

    let decode_opts = DecodeOptions {
        fix_single_bit: !opts.no_fix,
        fix_two_bit: opts.aggressive,
        no_crc_check: opts.no_crc_check,
    };

    let mut icao_cache = IcaoCache::new();
    let mut registry = AircraftRegistry::with_ttl(opts.ttl * 1000);
    if let Some(home) = home {
        registry.set_home(home);
    }

    let mag_map = MagnitudeMap::new();
    let demod_opts = ms1090::demod::DemodOptions { aggressive: opts.aggressive };

    let http_config = HttpConfig {
        web_root: opts.web_root.clone(),
        web_page: opts.web_page.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        refresh_ms: 1000,
        history: 120,
        home,
    };
    let mut reactor = NetReactor::new(http_config);

    if opts.net || opts.net_only {
        reactor.listen(Service::RawOut, opts.raw_out_port);
        reactor.listen(Service::RawIn, opts.raw_in_port);
        reactor.listen(Service::SbsOut, opts.sbs_port);
        reactor.listen(Service::Http, opts.http_port);
    }

    let exit = Arc::new(AtomicBool::new(false));
    let (producer, consumer) = pipeline::channel();

    match opts.infile.clone() {
        Some(path) => run_infile_producer(path, opts.loop_count, producer, exit.clone()),
        None => {
            warn!("no --infile given and the RTLSDR/SDRplay device drivers are out of this build's scope; idling");
        }
    }

    let mut message_count = 0u64;
    while !exit.load(Ordering::SeqCst) {
        let Some(buffer) = consumer.consume_blocking() else {
            break;
        };

        let frames = pipeline::process_buffer(&mag_map, &buffer, &demod_opts);
        let now = now_ms();
        let epoch_s = now_epoch_s();

        for frame in &frames {
            let Some(mut msg) = decode(&frame.payload, epoch_s, &mut icao_cache, &decode_opts)
            else {
                continue;
            };
            msg.signal_power = frame.signal_power;

            if opts.raw {
                println!("{}", net::raw::format_line(&msg.payload).trim_end());
            }

            let aircraft = registry.ingest(&msg, now);
            let position = aircraft.filter(|a| a.has_position()).map(|a| a.position);

            if opts.net || opts.net_only {
                reactor.broadcast_raw(&msg.payload);
                if let Some(line) = net::sbs::format_line(&msg, position, now) {
                    reactor.broadcast_sbs(&line);
                }
            }

            message_count += 1;
            if let Some(max) = opts.max_messages {
                if message_count >= max {
                    exit.store(true, Ordering::SeqCst);
                    break;
                }
            }
        }

        registry.evict(now);

        if reactor.due() {
            let mut ctx = DecodeContext {
                icao_cache: &mut icao_cache,
                opts: &decode_opts,
                now_epoch_s: epoch_s,
            };
            reactor.poll(&mut ctx, &mut registry, now);
        }
    }

    info!(messages = message_count, connections = reactor.connection_count(), "exiting");
}
