use crate::telemetry::Instrument;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The file does not carry the format the declared instrument writes,
    /// either at open time or via a configuration datagram version that is
    /// invalid for the instrument. Fatal; no partial report is produced.
    #[error("file type mismatch: {tag} datagram not valid for {instrument}")]
    FileType { tag: String, instrument: Instrument },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("not enough bytes: wanted {minimum}, have {actual}")]
    NotEnoughData { actual: usize, minimum: usize },

    #[error("malformed {kind} datagram: {reason}")]
    Malformed { kind: &'static str, reason: String },
}

impl Error {
    pub(crate) fn malformed(kind: &'static str, reason: impl Into<String>) -> Self {
        Error::Malformed {
            kind,
            reason: reason.into(),
        }
    }

    /// True for errors that terminate a session without producing a partial
    /// report. Everything else truncates the stream and the telemetry
    /// accumulated so far is still finalized.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::FileType { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
