//! Per-ping recording range estimation.
//!
//! Sample datagrams are not decoded into sample data here; each one only
//! contributes an estimated maximum depth,
//!
//! ```text
//! max_depth = transducer_depth + count * (sound_speed / 2 * sample_interval)
//! ```
//!
//! rounded to the nearest meter. Legacy RAW0 datagrams carry all four
//! inputs at fixed offsets; EK80 RAW3 datagrams carry only the sample
//! count, the rest having arrived in earlier Environment/Parameter XML
//! records.

use std::io::{Read, Seek};

use crate::datagram::{skip, DatagramHeader};
use crate::telemetry::Telemetry;
use crate::{Error, Result};

/// Bytes of a RAW0 datagram covered by the fixed sample header, up to and
/// including the sample count, counting from the start of the declared
/// length.
const RAW0_FIXED_LEN: u32 = 84;
/// Same for RAW3, whose channel-id/datatype prefix is much larger.
const RAW3_FIXED_LEN: u32 = 152;

/// Estimate the range of a legacy sample datagram from its own header
/// fields. The cursor is expected just past the datagram header and is
/// left past the trailer.
pub(crate) fn raw0<R: Read + Seek>(
    r: &mut R,
    header: &DatagramHeader,
    telemetry: &mut Telemetry,
) -> Result<()> {
    if header.length < RAW0_FIXED_LEN {
        return Err(Error::malformed(
            "RAW0",
            format!("declared length {} too short", header.length),
        ));
    }

    skip(r, 4)?; // channel, mode
    let transducer_depth = read_f32(r)?;
    skip(r, 16)?; // frequency, transmit power, pulse length, bandwidth
    let sample_interval = read_f32(r)?;
    let sound_velocity = read_f32(r)?;
    skip(r, 36)?; // absorption through receiver offsets
    let count = read_i32(r)?;

    telemetry.ranges.push(max_depth(
        f64::from(transducer_depth),
        f64::from(sample_interval),
        f64::from(sound_velocity),
        f64::from(count),
    ));

    // Sample data and trailer
    skip(r, i64::from(header.length) - i64::from(RAW0_FIXED_LEN) + 4)
        .map_err(Error::from)
}

/// Estimate the range of an EK80 sample datagram. Only the sample count is
/// read from the datagram; sound speed, sample interval and transducer
/// depth come from the accumulator.
pub(crate) fn raw3<R: Read + Seek>(
    r: &mut R,
    header: &DatagramHeader,
    telemetry: &mut Telemetry,
) -> Result<()> {
    if header.length < RAW3_FIXED_LEN {
        return Err(Error::malformed(
            "RAW3",
            format!("declared length {} too short", header.length),
        ));
    }

    skip(r, 136)?; // channel id, datatype, spare, sample offset
    let count = read_u32(r)?;

    let sound_speed = telemetry
        .sound_speed
        .ok_or_else(|| Error::malformed("RAW3", "sample datagram before environment record"))?;
    let sample_interval = telemetry
        .sample_interval
        .ok_or_else(|| Error::malformed("RAW3", "sample datagram before parameter record"))?;
    let transducer_depth = telemetry
        .transducer_depth
        .ok_or_else(|| Error::malformed("RAW3", "sample datagram before parameter record"))?;

    telemetry.ranges.push(max_depth(
        transducer_depth,
        sample_interval,
        sound_speed,
        f64::from(count),
    ));

    skip(r, i64::from(header.length) - i64::from(RAW3_FIXED_LEN) + 4)
        .map_err(Error::from)
}

fn max_depth(transducer_depth: f64, sample_interval: f64, sound_speed: f64, count: f64) -> i64 {
    let meters_per_sample = sound_speed / 2.0 * sample_interval;
    (transducer_depth + count * meters_per_sample).round() as i64
}

fn read_f32<R: Read>(r: &mut R) -> Result<f32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

fn read_i32<R: Read>(r: &mut R) -> Result<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}
