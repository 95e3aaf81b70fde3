//! Simrad echosounder raw data stream decoding.
//!
//! Decodes the length-framed datagram streams written by Simrad EK60,
//! ES60, ME70 and EK80 fisheries echosounders into per-file telemetry:
//! acquisition time span, navigation track, per-channel frequency
//! configuration, transducer hardware parameters, and a derived maximum
//! recording depth. Sample power data is framed over but not decoded.
//!
//! Decoding is a strict single pass per file. Structural damage partway
//! through a file does not discard it: the stream is truncated at the
//! failing datagram and the telemetry accumulated up to that point is
//! returned with the error attached.
//!
//! # Example
//! ```no_run
//! use simrad::{read_telemetry_file, Instrument};
//!
//! let report = read_telemetry_file("DY1706_EK60-D20170625-T062521.raw", Instrument::Ek60)?;
//! println!(
//!     "{}: {} channels, range {} m",
//!     report.format,
//!     report.channels.len(),
//!     report.recording_range,
//! );
//! # Ok::<(), simrad::Error>(())
//! ```

mod error;
mod nmea;
mod raw;
mod session;
mod telemetry;
mod xml;

pub mod config;
pub mod datagram;
pub mod timecode;

pub use error::{Error, Result};
pub use session::{read_telemetry, read_telemetry_file};
pub use telemetry::{Channel, ConfigSummary, FileFormat, Instrument, Report};
