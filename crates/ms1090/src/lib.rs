#![doc = include_str!("../readme.md")]

pub mod cpr;
pub mod crc;
pub mod decode;
pub mod demod;
pub mod error;
pub mod icao_cache;
pub mod magnitude;
pub mod pipeline;
pub mod registry;

pub mod prelude {
    pub use crate::cpr::{CprFormat, CprFrame, Position};
    pub use crate::decode::{decode, AltitudeUnit, DecodeOptions, Message};
    pub use crate::demod::{demodulate, DemodOptions, RawFrame};
    pub use crate::error::{Error, Result};
    pub use crate::icao_cache::IcaoCache;
    pub use crate::magnitude::MagnitudeMap;
    pub use crate::registry::{Aircraft, AircraftRegistry, ShowState};
}
