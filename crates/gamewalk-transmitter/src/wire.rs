//! Wire format: one datagram per step, payload is the ASCII bytes `STEP`.
//! No header, no sequence number, no acknowledgement.

/// The only message on the wire.
pub const STEP_PAYLOAD: &[u8; 4] = b"STEP";

/// A received datagram, decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datagram {
    Step,
    /// Anything else, lossily decoded for logging.
    Unknown(String),
}

/// Decode a received datagram.
///
/// Surrounding ASCII whitespace is ignored so that senders appending a
/// newline are still understood.
pub fn decode(bytes: &[u8]) -> Datagram {
    let trimmed = bytes.trim_ascii();
    if trimmed == STEP_PAYLOAD {
        Datagram::Step
    } else {
        Datagram::Unknown(String::from_utf8_lossy(trimmed).into_owned())
    }
}
