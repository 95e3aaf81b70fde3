//! Per-file telemetry accumulation and the finalized report.
//!
//! A [`Telemetry`] value is created empty when a session opens, mutated in
//! place by exactly one datagram handler at a time in stream order, and
//! reduced into an immutable [`Report`] exactly once, either at end of
//! stream or at the first recovered structural error.

use std::collections::HashMap;
use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use tracing::warn;

use crate::config::{ConfigDatagram, Transceiver};
use crate::nmea::NavLog;
use crate::Error;

/// The echosounder hardware family the caller declares for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instrument {
    #[serde(rename = "EK60")]
    Ek60,
    #[serde(rename = "ES60")]
    Es60,
    #[serde(rename = "EK80")]
    Ek80,
    #[serde(rename = "ME70")]
    Me70,
}

impl Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Instrument::Ek60 => "EK60",
            Instrument::Es60 => "ES60",
            Instrument::Ek80 => "EK80",
            Instrument::Me70 => "ME70",
        };
        f.write_str(name)
    }
}

/// The format variant detected from the first datagram of a file.
///
/// `Ek60Ek80` marks EK60 hardware recording in the EK80 (XML-configured)
/// file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileFormat {
    #[serde(rename = "EK60")]
    Ek60,
    #[serde(rename = "ES60")]
    Es60,
    #[serde(rename = "EK80")]
    Ek80,
    #[serde(rename = "ME70")]
    Me70,
    #[serde(rename = "EK60_EK80")]
    Ek60Ek80,
}

impl FileFormat {
    /// True for variants that carry their configuration in embedded XML
    /// rather than in CON-family binary datagrams.
    #[must_use]
    pub fn is_xml_configured(&self) -> bool {
        matches!(self, FileFormat::Ek80 | FileFormat::Ek60Ek80)
    }
}

impl Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FileFormat::Ek60 => "EK60",
            FileFormat::Es60 => "ES60",
            FileFormat::Ek80 => "EK80",
            FileFormat::Me70 => "ME70",
            FileFormat::Ek60Ek80 => "EK60_EK80",
        };
        f.write_str(name)
    }
}

/// One acoustic channel's frequency span and beam type.
///
/// The span starts at the transducer's base frequency and is only ever
/// widened by wideband parameter records, never narrowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub min_frequency: f64,
    pub max_frequency: f64,
    pub beam_type: i32,
}

impl Channel {
    /// Widen the span to include `[min, max]`.
    pub(crate) fn widen(&mut self, min: f64, max: f64) {
        if min < self.min_frequency {
            self.min_frequency = min;
        }
        if max > self.max_frequency {
            self.max_frequency = max;
        }
    }
}

/// Mutable per-file state, updated by the datagram handlers.
#[derive(Debug, Default)]
pub(crate) struct Telemetry {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Estimated maximum depth of each processed ping, in meters.
    pub ranges: Vec<i64>,
    pub channels: HashMap<String, Channel>,
    pub nav: NavLog,
    /// Decoded CON-family datagrams keyed by their originating tag.
    pub configs: HashMap<String, ConfigDatagram>,
    /// Environment/parameter values carried to the next EK80 ping record.
    pub sound_speed: Option<f64>,
    pub sample_interval: Option<f64>,
    pub transducer_depth: Option<f64>,
}

impl Telemetry {
    /// Fold a datagram timestamp into the file time bounds.
    ///
    /// `start_time` only ever decreases, and only for instants strictly
    /// after the unix epoch; bad clocks on acquisition PCs produce
    /// pre-1970 timestamps that must not drag the start of the file back.
    /// `end_time` is an unconditional running maximum.
    pub fn update_bounds(&mut self, ts: DateTime<Utc>) {
        if ts > DateTime::UNIX_EPOCH && self.start_time.map_or(true, |start| ts < start) {
            self.start_time = Some(ts);
        }
        if self.end_time.map_or(true, |end| ts > end) {
            self.end_time = Some(ts);
        }
    }

    /// Reduce the accumulated state into the immutable report.
    pub fn finalize(mut self, format: FileFormat, error: Option<Error>) -> Report {
        let (latitudes, longitudes) = self.nav.resolve();

        let config = if format.is_xml_configured() {
            None
        } else {
            self.take_config()
        };

        let recording_range = self.ranges.iter().copied().fold(0, i64::max) / 5 * 5;

        Report {
            format,
            start_time: self.start_time,
            end_time: self.end_time,
            latitudes,
            longitudes,
            channels: self.channels,
            recording_range,
            config,
            error,
        }
    }

    fn take_config(&mut self) -> Option<ConfigSummary> {
        let Some(ConfigDatagram::Configuration(config)) = self.configs.remove("CON0") else {
            warn!("no CON0 datagram decoded, omitting configuration block");
            return None;
        };

        let beam_config = if matches!(config.sounder_name.as_str(), "MBES" | "ME70") {
            Some(match self.configs.remove("CON1") {
                Some(ConfigDatagram::BeamGeometry(text)) => text,
                _ => {
                    warn!("ME70 (MBES) data but no CON1 datagram found, no beam config available");
                    String::new()
                }
            })
        } else {
            None
        };

        Some(ConfigSummary {
            sounder_name: config.sounder_name,
            transceivers: config.transceivers,
            beam_config,
        })
    }
}

/// Hardware configuration block of the finalized report.
///
/// Present only for format variants that configure through CON-family
/// datagrams; `beam_config` is attached exactly when the sounder family is
/// multibeam (MBES/ME70), and is empty if the geometry datagram was absent.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub sounder_name: String,
    pub transceivers: Vec<Transceiver>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beam_config: Option<String>,
}

/// Telemetry decoded from one raw file.
#[derive(Debug, Serialize)]
pub struct Report {
    pub format: FileFormat,
    /// Earliest post-1970 datagram timestamp, if any datagram was read.
    pub start_time: Option<DateTime<Utc>>,
    /// Latest datagram timestamp, if any datagram was read.
    pub end_time: Option<DateTime<Utc>>,
    /// Resolved coordinates in raw sentence append order; the two
    /// sequences are index-aligned with each other, not with pings.
    pub latitudes: Vec<f64>,
    pub longitudes: Vec<f64>,
    pub channels: HashMap<String, Channel>,
    /// Maximum ping depth over the file in meters, on a 5-meter grid.
    pub recording_range: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigSummary>,
    /// The structural error that truncated decoding, when the report holds
    /// partial state.
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "error_display")]
    pub error: Option<Error>,
}

fn error_display<S: Serializer>(error: &Option<Error>, s: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(err) => s.serialize_some(&err.to_string()),
        None => s.serialize_none(),
    }
}
