//! Datagram framing.
//!
//! A raw file is a sequence of length-framed datagrams:
//!
//! ```text
//! +-------------+---------------+--------------------+---------+-------------+
//! | length: u32 | tag: [u8; 4]  | timestamp: u64     | payload | length: u32 |
//! +-------------+---------------+--------------------+---------+-------------+
//! ```
//!
//! All integers are little-endian. `length` counts the tag, timestamp, and
//! payload bytes, but not itself and not the duplicate trailing copy. The
//! timestamp is an NT filetime; see [`crate::timecode`].

use std::io::{ErrorKind, Read, Seek, SeekFrom};

/// Tag of the embedded-XML configuration datagrams (EK80 family).
pub const XML0: [u8; 4] = *b"XML0";
/// Tag of the NMEA text datagrams.
pub const NME0: [u8; 4] = *b"NME0";
/// Tag of the EK80 sample datagrams.
pub const RAW3: [u8; 4] = *b"RAW3";
/// Tag of the legacy sample datagrams.
pub const RAW0: [u8; 4] = *b"RAW0";
/// Tag of the binary configuration datagrams.
pub const CON0: [u8; 4] = *b"CON0";
/// Tag of the ME70 beam-geometry extension datagrams.
pub const CON1: [u8; 4] = *b"CON1";
/// Tag-family prefix shared by the binary configuration datagram versions.
pub const CON_FAMILY: [u8; 3] = *b"CON";

/// The fixed-width header common to every datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatagramHeader {
    /// Declared datagram length: tag + timestamp + payload.
    pub length: u32,
    /// Four ASCII characters identifying the datagram kind.
    pub tag: [u8; 4],
    /// NT filetime the datagram was written.
    pub timestamp: u64,
}

impl DatagramHeader {
    /// Size of a `DatagramHeader` on the wire.
    pub const LEN: usize = 16;
    /// Header bytes `length` already accounts for (tag + timestamp).
    pub const PREFIX_LEN: u32 = 12;
    /// Size of the duplicate-length trailer following every payload.
    pub const TRAILER_LEN: u32 = 4;

    /// Decode from bytes. Returns `None` if there are not enough bytes to
    /// construct the header.
    #[must_use]
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::LEN {
            return None;
        }
        Some(DatagramHeader {
            length: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            tag: [buf[4], buf[5], buf[6], buf[7]],
            timestamp: u64::from_le_bytes([
                buf[8], buf[9], buf[10], buf[11], buf[12], buf[13], buf[14], buf[15],
            ]),
        })
    }

    /// Read the next header from `r`, or `None` at end-of-stream.
    ///
    /// A short read at a header boundary is not an error; truncated files
    /// simply end at the last whole datagram.
    ///
    /// # Errors
    /// Any `std::io::Error` other than an EOF while reading header bytes.
    pub fn read_opt<R: Read>(r: &mut R) -> std::io::Result<Option<Self>> {
        let mut buf = [0u8; Self::LEN];
        match r.read_exact(&mut buf) {
            // Can't be None, we just read LEN bytes
            Ok(()) => Ok(Self::decode(&buf)),
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// The tag as text, for messages and config-store keys.
    #[must_use]
    pub fn tag_str(&self) -> String {
        String::from_utf8_lossy(&self.tag).into_owned()
    }
}

/// Advance the cursor by `n` bytes without reading them.
///
/// Seeking past end-of-stream is not an error; the next header read simply
/// hits end-of-stream, which ends the file cleanly.
pub(crate) fn skip<R: Seek>(r: &mut R, n: i64) -> std::io::Result<()> {
    r.seek(SeekFrom::Current(n))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes() -> Vec<u8> {
        let mut dat = vec![];
        dat.extend(100u32.to_le_bytes());
        dat.extend(b"NME0");
        dat.extend(116_444_736_000_000_000u64.to_le_bytes());
        dat
    }

    #[test]
    fn decode_header() {
        let hdr = DatagramHeader::decode(&header_bytes()).unwrap();
        assert_eq!(hdr.length, 100);
        assert_eq!(&hdr.tag, b"NME0");
        assert_eq!(hdr.timestamp, 116_444_736_000_000_000);
    }

    #[test]
    fn decode_short_buffer() {
        assert!(DatagramHeader::decode(&header_bytes()[..15]).is_none());
    }

    #[test]
    fn read_consumes_exactly_len_bytes() {
        let mut dat = header_bytes();
        dat.extend(b"extra");
        let mut r = &dat[..];
        let hdr = DatagramHeader::read_opt(&mut r).unwrap().unwrap();
        assert_eq!(&hdr.tag, b"NME0");
        assert_eq!(r.len(), 5, "header read must consume exactly 16 bytes");
    }

    #[test]
    fn read_partial_header_is_eof() {
        let dat = &header_bytes()[..7];
        let mut r = &dat[..];
        assert!(DatagramHeader::read_opt(&mut r).unwrap().is_none());
    }

    #[test]
    fn read_empty_is_eof() {
        let mut r: &[u8] = &[];
        assert!(DatagramHeader::read_opt(&mut r).unwrap().is_none());
    }
}
