//! File sessions: first-datagram validation, the sequential datagram loop,
//! and the finalize-on-error recovery policy.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use tracing::trace;

use crate::datagram::{self, skip, DatagramHeader};
use crate::telemetry::{FileFormat, Instrument, Report, Telemetry};
use crate::{config, raw, timecode, xml, Error, Result};

/// Decode the telemetry of one raw file on disk.
///
/// The file handle lives in this scope, so it is released on every exit
/// path: fatal-no-data, partial-with-error, and clean end-of-stream alike.
///
/// # Errors
/// [`Error::FileType`] when the file does not carry the format `instrument`
/// writes, or any `std::io::Error` opening/validating the file. All other
/// decode failures are attached to the returned partial [`Report`].
pub fn read_telemetry_file<P: AsRef<Path>>(path: P, instrument: Instrument) -> Result<Report> {
    let file = File::open(path)?;
    read_telemetry(BufReader::new(file), instrument)
}

/// Decode the telemetry of one raw datagram stream.
///
/// `Seek` is required because the format demands a peek-rewind at open and
/// declared-length skips over unrecognized datagrams and sample data.
///
/// # Errors
/// See [`read_telemetry_file`].
pub fn read_telemetry<R: Read + Seek>(mut reader: R, instrument: Instrument) -> Result<Report> {
    let format = open_session(&mut reader, instrument)?;
    let session = Session {
        reader,
        instrument,
        format,
        telemetry: Telemetry::default(),
    };
    session.run()
}

/// Validate the first datagram tag against the declared instrument and
/// detect the format variant, leaving the cursor back at offset 0.
fn open_session<R: Read + Seek>(r: &mut R, instrument: Instrument) -> Result<FileFormat> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    let tag = [buf[4], buf[5], buf[6], buf[7]];

    let format = match (&tag, instrument) {
        (b"XML0", Instrument::Ek80) => FileFormat::Ek80,
        (b"CON0", Instrument::Ek60) => FileFormat::Ek60,
        (b"CON0", Instrument::Es60) => FileFormat::Es60,
        (b"CON0", Instrument::Me70) => FileFormat::Me70,
        // EK60 hardware recording in the EK80 file format
        (b"XML0", Instrument::Ek60) => FileFormat::Ek60Ek80,
        _ => {
            return Err(Error::FileType {
                tag: String::from_utf8_lossy(&tag).into_owned(),
                instrument,
            })
        }
    };

    r.seek(SeekFrom::Start(0))?;
    Ok(format)
}

struct Session<R> {
    reader: R,
    instrument: Instrument,
    format: FileFormat,
    telemetry: Telemetry,
}

impl<R: Read + Seek> Session<R> {
    fn run(mut self) -> Result<Report> {
        match self.scan() {
            Ok(()) => Ok(self.telemetry.finalize(self.format, None)),
            Err(err) if err.is_fatal() => Err(err),
            // Truncate at the failing datagram and salvage whatever was
            // accumulated before it.
            Err(err) => Ok(self.telemetry.finalize(self.format, Some(err))),
        }
    }

    /// The decode loop: one datagram per iteration until end-of-stream.
    fn scan(&mut self) -> Result<()> {
        while let Some(header) = DatagramHeader::read_opt(&mut self.reader)? {
            self.telemetry.update_bounds(timecode::decode(header.timestamp));

            match header.tag {
                datagram::XML0 => {
                    let payload = self.payload(&header)?;
                    let text = String::from_utf8(payload)
                        .map_err(|_| Error::malformed("XML0", "payload is not UTF-8"))?;
                    xml::apply(text.trim_end_matches('\0'), &mut self.telemetry)?;
                }
                datagram::NME0 => {
                    let payload = self.payload(&header)?;
                    let sentence = String::from_utf8_lossy(&payload)
                        .trim_end_matches('\0')
                        .to_string();
                    self.telemetry.nav.route(sentence);
                }
                datagram::RAW3 => raw::raw3(&mut self.reader, &header, &mut self.telemetry)?,
                datagram::RAW0 => raw::raw0(&mut self.reader, &header, &mut self.telemetry)?,
                tag if tag.starts_with(&datagram::CON_FAMILY) => {
                    let payload = self.payload(&header)?;
                    let decoded = config::decode(header.tag, self.instrument, &payload)?;
                    self.telemetry.configs.insert(header.tag_str(), decoded);
                }
                _ => {
                    trace!(tag = %header.tag_str(), length = header.length, "skipping datagram");
                    let remaining = header.length.checked_sub(8).ok_or_else(|| {
                        Error::malformed(
                            "datagram",
                            format!("declared length {} shorter than its header", header.length),
                        )
                    })?;
                    skip(&mut self.reader, i64::from(remaining))?;
                }
            }
        }
        Ok(())
    }

    /// Read a datagram's payload (declared length minus the 12 prefix
    /// bytes the header already counted) and discard the 4-byte trailer.
    fn payload(&mut self, header: &DatagramHeader) -> Result<Vec<u8>> {
        let len = header
            .length
            .checked_sub(DatagramHeader::PREFIX_LEN)
            .ok_or_else(|| {
                Error::malformed(
                    "datagram",
                    format!("declared length {} shorter than its header", header.length),
                )
            })?;
        let mut payload = vec![0u8; len as usize];
        self.reader.read_exact(&mut payload)?;
        skip(&mut self.reader, i64::from(DatagramHeader::TRAILER_LEN))?;
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const UNIX_EPOCH_TICKS: u64 = 116_444_736_000_000_000;

    fn ticks(unix_seconds: u64) -> u64 {
        UNIX_EPOCH_TICKS + unix_seconds * 10_000_000
    }

    fn datagram(tag: &[u8; 4], timestamp: u64, payload: &[u8]) -> Vec<u8> {
        let length = 12 + payload.len() as u32;
        let mut dat = length.to_le_bytes().to_vec();
        dat.extend(tag);
        dat.extend(timestamp.to_le_bytes());
        dat.extend(payload);
        dat.extend(length.to_le_bytes());
        dat
    }

    #[test]
    fn open_detects_format_and_rewinds() {
        let dat = datagram(b"XML0", ticks(1_500_000_000), b"<Configuration/>");
        let mut r = Cursor::new(dat);
        assert_eq!(open_session(&mut r, Instrument::Ek80).unwrap(), FileFormat::Ek80);
        assert_eq!(r.position(), 0);

        assert_eq!(
            open_session(&mut r, Instrument::Ek60).unwrap(),
            FileFormat::Ek60Ek80
        );
    }

    #[test]
    fn open_rejects_wrong_first_tag() {
        let dat = datagram(b"NME0", ticks(1_500_000_000), b"$GPGGA,");
        let mut r = Cursor::new(dat);
        let result = open_session(&mut r, Instrument::Ek80);
        assert!(matches!(result, Err(Error::FileType { .. })));
    }

    #[test]
    fn open_rejects_con0_for_ek80() {
        let dat = datagram(b"CON0", ticks(1_500_000_000), &[0u8; 516]);
        let mut r = Cursor::new(dat);
        assert!(matches!(
            open_session(&mut r, Instrument::Ek80),
            Err(Error::FileType { .. })
        ));
    }

    #[test]
    fn unknown_tags_are_skipped_wholesale() {
        let mut dat = datagram(b"XML0", ticks(1_500_000_000), b"<Environment SoundSpeed=\"1500\"/>");
        dat.extend(datagram(b"TAG0", ticks(1_500_000_100), &[0xab; 40]));
        dat.extend(datagram(b"NME0", ticks(1_500_000_200), b"$GPGGA,123519,4916.45,N,12311.12,W,1,08"));

        let report = read_telemetry(Cursor::new(dat), Instrument::Ek80).unwrap();
        assert!(report.error.is_none());
        assert_eq!(report.latitudes.len(), 1);
        assert_eq!(
            report.end_time.unwrap() - report.start_time.unwrap(),
            chrono::Duration::seconds(200)
        );
    }

    #[test]
    fn structural_error_yields_partial_report() {
        let mut dat = datagram(b"XML0", ticks(1_500_000_000), b"<Environment SoundSpeed=\"1500\"/>");
        dat.extend(datagram(b"NME0", ticks(1_500_000_100), b"$GPGGA,123519,4916.45,N,12311.12,W,1,08"));
        // Declared length promises a payload the stream does not hold
        dat.extend(1000u32.to_le_bytes());
        dat.extend(b"NME0");
        dat.extend(ticks(1_500_000_200).to_le_bytes());
        dat.extend(b"$GP");

        let report = read_telemetry(Cursor::new(dat), Instrument::Ek80).unwrap();
        assert!(matches!(report.error, Some(Error::Io(_))));
        assert_eq!(report.latitudes.len(), 1, "state before the failure is kept");
    }

    #[test]
    fn con1_outside_me70_is_fatal_with_no_report() {
        let mut dat = datagram(b"CON0", ticks(1_500_000_000), &[0u8; 516]);
        dat.extend(datagram(b"CON1", ticks(1_500_000_100), b"<BeamGeometry/>"));

        let result = read_telemetry(Cursor::new(dat), Instrument::Ek60);
        assert!(matches!(result, Err(Error::FileType { .. })));
    }

    #[test]
    fn truncated_trailing_header_is_clean_eof() {
        let mut dat = datagram(b"XML0", ticks(1_500_000_000), b"<Environment SoundSpeed=\"1500\"/>");
        dat.extend(100u32.to_le_bytes());
        dat.extend(b"NME");

        let report = read_telemetry(Cursor::new(dat), Instrument::Ek80).unwrap();
        assert!(report.error.is_none());
    }
}
