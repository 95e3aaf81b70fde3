//! Binary configuration datagram decoding (the CON tag family).
//!
//! Pre-EK80 instruments write their hardware configuration as fixed-width
//! binary datagrams. The tag's trailing digit is the version: `CON0` is the
//! full configuration (header plus one record per transceiver), `CON1` is
//! the ME70-only beam-geometry extension. Within a CON0 datagram the
//! sounder name selects which of two transceiver record layouts applies:
//! the standard single-frequency layout used by the ER60/ES60 line, or the
//! multibeam layout used by MBES/ME70 systems.

use serde::Serialize;
use tracing::warn;

use crate::telemetry::Instrument;
use crate::{Error, Result};

const NAME_LEN: usize = 128;
const VERSION_LEN: usize = 30;
const SPARE_LEN: usize = 98;
const GPT_VERSION_LEN: usize = 16;
/// Bytes of the spare block occupied by the multibeam sub-record.
const MULTIBEAM_INFO_LEN: usize = 14;

/// A decoded CON-family datagram, stored in the accumulator keyed by its
/// originating tag.
#[derive(Debug, Clone, Serialize)]
pub enum ConfigDatagram {
    /// Version 0: the full configuration.
    Configuration(Configuration),
    /// Version 1: free-text beam geometry (ME70 only).
    BeamGeometry(String),
}

/// CON0 header and transceiver array.
#[derive(Debug, Clone, Serialize)]
pub struct Configuration {
    pub survey_name: String,
    pub transect_name: String,
    /// The transceiver-layout discriminator.
    pub sounder_name: String,
    /// Firmware version string.
    pub version: String,
    /// Spare-block text after any multibeam sub-record.
    pub spare: String,
    pub transceiver_count: i32,
    /// Present when the sounder family is multibeam (MBES/ME70).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multibeam: Option<MultibeamInfo>,
    pub transceivers: Vec<Transceiver>,
}

/// Multibeam extension decoded from the front of the CON0 spare block.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MultibeamInfo {
    /// Always 0 on known firmware.
    pub multiplexing: i16,
    /// UTC-to-local difference in minutes.
    pub time_bias: i32,
    pub sound_velocity_avg: f32,
    pub sound_velocity_transducer: f32,
}

/// One acoustic channel's hardware configuration.
#[derive(Debug, Clone, Serialize)]
pub enum Transceiver {
    Standard(StandardTransceiver),
    Multibeam(MultibeamTransceiver),
}

impl Transceiver {
    /// The channel identifier, common to both layouts.
    #[must_use]
    pub fn channel_id(&self) -> &str {
        match self {
            Transceiver::Standard(t) => &t.channel_id,
            Transceiver::Multibeam(t) => &t.channel_id,
        }
    }
}

/// ER60/ES60 transceiver record: a single operating frequency with
/// five-element calibration tables.
#[derive(Debug, Clone, Serialize)]
pub struct StandardTransceiver {
    pub channel_id: String,
    /// 0 = single beam, 1 = split beam.
    pub beam_type: i32,
    pub frequency: f32,
    pub gain: f32,
    pub equivalent_beam_angle: f32,
    pub beamwidth_alongship: f32,
    pub beamwidth_athwartship: f32,
    pub angle_sensitivity_alongship: f32,
    pub angle_sensitivity_athwartship: f32,
    pub angle_offset_alongship: f32,
    pub angle_offset_athwartship: f32,
    pub pos_x: f32,
    pub pos_y: f32,
    pub pos_z: f32,
    pub dir_x: f32,
    pub dir_y: f32,
    pub dir_z: f32,
    pub pulse_length_table: [f32; 5],
    pub gain_table: [f32; 5],
    pub sa_correction_table: [f32; 5],
    pub gpt_software_version: String,
}

/// MBES/ME70 transceiver record: per-element scalars plus beam-steering
/// angles.
#[derive(Debug, Clone, Serialize)]
pub struct MultibeamTransceiver {
    pub channel_id: String,
    pub beam_type: i32,
    pub frequency: f32,
    pub equivalent_beam_angle: f32,
    pub beamwidth_alongship: f32,
    pub beamwidth_athwartship: f32,
    pub angle_sensitivity_alongship: f32,
    pub angle_sensitivity_athwartship: f32,
    pub angle_offset_alongship: f32,
    pub angle_offset_athwartship: f32,
    pub pos_x: f32,
    pub pos_y: f32,
    pub pos_z: f32,
    pub beam_steering_angle_alongship: f32,
    pub beam_steering_angle_athwartship: f32,
    pub pulse_length: f32,
    pub gain: f32,
    pub sa_correction: f32,
    pub gpt_software_version: String,
}

impl StandardTransceiver {
    /// Record size on the wire.
    pub const LEN: usize = 320;
}

impl MultibeamTransceiver {
    /// Record size on the wire.
    pub const LEN: usize = 320;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransceiverLayout {
    Standard,
    Multibeam,
}

impl TransceiverLayout {
    /// Select the layout once per file from the decoded sounder name.
    /// Unrecognized names fall back to the standard layout.
    fn for_sounder(name: &str) -> Self {
        match name {
            "ER60" | "ES60" => TransceiverLayout::Standard,
            "MBES" | "ME70" => TransceiverLayout::Multibeam,
            other => {
                warn!(
                    sounder_name = other,
                    "unknown sounder name, using the standard transceiver layout"
                );
                TransceiverLayout::Standard
            }
        }
    }

    fn record_len(self) -> usize {
        match self {
            TransceiverLayout::Standard => StandardTransceiver::LEN,
            TransceiverLayout::Multibeam => MultibeamTransceiver::LEN,
        }
    }
}

/// Decode a CON-family datagram payload (the bytes following the datagram
/// header) for the declared instrument.
///
/// # Errors
/// [`Error::FileType`] when the version digit is not 0 or 1, or a version 1
/// datagram appears in a non-ME70 file; [`Error::NotEnoughData`] when the
/// payload is shorter than the fixed layout requires.
pub(crate) fn decode(tag: [u8; 4], instrument: Instrument, payload: &[u8]) -> Result<ConfigDatagram> {
    let mismatch = || Error::FileType {
        tag: String::from_utf8_lossy(&tag).into_owned(),
        instrument,
    };
    let version = match tag[3] {
        b'0' => 0,
        b'1' => 1,
        _ => return Err(mismatch()),
    };
    if version == 1 && instrument != Instrument::Me70 {
        return Err(mismatch());
    }

    match version {
        0 => Ok(ConfigDatagram::Configuration(Configuration::decode(payload)?)),
        _ => Ok(ConfigDatagram::BeamGeometry(trim_nul(payload))),
    }
}

impl Configuration {
    /// Decode a CON0 payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut fields = Fields::new(payload);
        let survey_name = fields.text(NAME_LEN)?;
        let transect_name = fields.text(NAME_LEN)?;
        let sounder_name = fields.text(NAME_LEN)?;
        let version = fields.text(VERSION_LEN)?;
        let spare_block = fields.take(SPARE_LEN)?;
        let transceiver_count = fields.i32()?;

        let layout = TransceiverLayout::for_sounder(&sounder_name);

        // Multibeam systems pack an extra sub-record into the front of the
        // otherwise-spare block.
        let (multibeam, spare) = if layout == TransceiverLayout::Multibeam {
            let mut sub = Fields::new(&spare_block[..MULTIBEAM_INFO_LEN]);
            let info = MultibeamInfo {
                multiplexing: sub.i16()?,
                time_bias: sub.i32()?,
                sound_velocity_avg: sub.f32()?,
                sound_velocity_transducer: sub.f32()?,
            };
            (Some(info), trim_nul(&spare_block[MULTIBEAM_INFO_LEN..]))
        } else {
            (None, trim_nul(spare_block))
        };

        let mut transceivers = Vec::new();
        for _ in 0..transceiver_count.max(0) {
            let record = fields.take(layout.record_len())?;
            transceivers.push(match layout {
                TransceiverLayout::Standard => {
                    Transceiver::Standard(StandardTransceiver::decode(record)?)
                }
                TransceiverLayout::Multibeam => {
                    Transceiver::Multibeam(MultibeamTransceiver::decode(record)?)
                }
            });
        }

        Ok(Configuration {
            survey_name,
            transect_name,
            sounder_name,
            version,
            spare,
            transceiver_count,
            multibeam,
            transceivers,
        })
    }
}

impl StandardTransceiver {
    fn decode(record: &[u8]) -> Result<Self> {
        let mut fields = Fields::new(record);
        Ok(StandardTransceiver {
            channel_id: fields.text(NAME_LEN)?,
            beam_type: fields.i32()?,
            frequency: fields.f32()?,
            gain: fields.f32()?,
            equivalent_beam_angle: fields.f32()?,
            beamwidth_alongship: fields.f32()?,
            beamwidth_athwartship: fields.f32()?,
            angle_sensitivity_alongship: fields.f32()?,
            angle_sensitivity_athwartship: fields.f32()?,
            angle_offset_alongship: fields.f32()?,
            angle_offset_athwartship: fields.f32()?,
            pos_x: fields.f32()?,
            pos_y: fields.f32()?,
            pos_z: fields.f32()?,
            dir_x: fields.f32()?,
            dir_y: fields.f32()?,
            dir_z: fields.f32()?,
            pulse_length_table: fields.f32_table()?,
            gain_table: {
                fields.skip(8)?;
                fields.f32_table()?
            },
            sa_correction_table: {
                fields.skip(8)?;
                fields.f32_table()?
            },
            gpt_software_version: {
                fields.skip(8)?;
                fields.text(GPT_VERSION_LEN)?
            },
        })
    }
}

impl MultibeamTransceiver {
    fn decode(record: &[u8]) -> Result<Self> {
        let mut fields = Fields::new(record);
        Ok(MultibeamTransceiver {
            channel_id: fields.text(NAME_LEN)?,
            beam_type: fields.i32()?,
            frequency: fields.f32()?,
            equivalent_beam_angle: {
                fields.skip(4)?; // reserved
                fields.f32()?
            },
            beamwidth_alongship: fields.f32()?,
            beamwidth_athwartship: fields.f32()?,
            angle_sensitivity_alongship: fields.f32()?,
            angle_sensitivity_athwartship: fields.f32()?,
            angle_offset_alongship: fields.f32()?,
            angle_offset_athwartship: fields.f32()?,
            pos_x: fields.f32()?,
            pos_y: fields.f32()?,
            pos_z: fields.f32()?,
            beam_steering_angle_alongship: fields.f32()?,
            beam_steering_angle_athwartship: fields.f32()?,
            pulse_length: {
                fields.skip(4)?; // unused steering angle
                fields.f32()?
            },
            gain: {
                fields.skip(24)?; // reserved + spare
                fields.f32()?
            },
            sa_correction: {
                fields.skip(24)?; // reserved + spare
                fields.f32()?
            },
            gpt_software_version: {
                fields.skip(24)?; // reserved + spare
                fields.text(GPT_VERSION_LEN)?
            },
        })
    }
}

/// Sequential fixed-width field reader over a payload slice.
struct Fields<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Fields<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Fields { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let remaining = self.buf.len() - self.pos;
        if remaining < n {
            return Err(Error::NotEnoughData {
                actual: remaining,
                minimum: n,
            });
        }
        let field = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(field)
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    fn text(&mut self, n: usize) -> Result<String> {
        Ok(trim_nul(self.take(n)?))
    }

    fn i16(&mut self) -> Result<i16> {
        let b = self.take(2)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    fn i32(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn f32(&mut self) -> Result<f32> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn f32_table(&mut self) -> Result<[f32; 5]> {
        let mut table = [0f32; 5];
        for value in &mut table {
            *value = self.f32()?;
        }
        Ok(table)
    }
}

fn trim_nul(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf).trim_matches('\0').to_string()
}
