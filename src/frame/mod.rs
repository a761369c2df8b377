//! Wire frame codec for hub/backend traffic.
//!
//! A frame is a binary payload: a block of `Name:Value` header lines, each
//! terminated by CRLF, then a lone CRLF, then the body. Repeating a name
//! produces a multi-valued header. A small set of `X-Hub-*` control headers
//! drives the protocol; everything else passes through untouched.

use std::collections::HashMap;

use bytes::Bytes;
use rand::RngCore;

/// Correlation id minted by the gateway. Mandatory on every request frame
/// and every reply or ack frame.
pub const HEADER_ID: &str = "X-Hub-Id";
/// Queue name. Present on request frames only.
pub const HEADER_QUEUE: &str = "X-Hub-Queue";
/// Control operation marker; see [`CONTROL_OP_ACK`].
pub const HEADER_CONTROL_OP: &str = "X-Hub-ControlOp";
/// HTTP status a reply maps to at the external boundary. Absent means 200.
pub const HEADER_STATUS: &str = "X-Hub-Status";
/// Prefix shared by all control headers. Stripped from external responses.
pub const INTERNAL_PREFIX: &str = "X-Hub-";
/// Value of [`HEADER_CONTROL_OP`] on an acknowledgement frame.
pub const CONTROL_OP_ACK: &str = "ack";

const CRLF: &[u8] = b"\r\n";

/// Multi-valued header map carried by frames, requests and replies.
///
/// Names are case-sensitive; values for one name keep insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameHeaders {
    entries: HashMap<String, Vec<String>>,
}

impl FrameHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value under `name`, preserving any existing values.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries
            .entry(name.into())
            .or_default()
            .push(value.into());
    }

    /// Replace all values under `name` with a single value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(name.into(), vec![value.into()]);
    }

    /// First value under `name`, if any.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.entries
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values under `name`.
    pub fn all(&self, name: &str) -> Option<&[String]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Serialize a header block and body into one frame payload.
pub fn encode(headers: &FrameHeaders, body: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(body.len() + 64);
    for (name, values) in headers.iter() {
        for value in values {
            buf.extend_from_slice(name.as_bytes());
            buf.push(b':');
            buf.extend_from_slice(value.as_bytes());
            buf.extend_from_slice(CRLF);
        }
    }
    buf.extend_from_slice(CRLF);
    buf.extend_from_slice(body);
    buf
}

/// Split a frame payload into its header block and body.
///
/// Each header line is split on the first colon with whitespace trimmed
/// around name and value. Lines without a colon (or with nothing after it)
/// are ignored. The first empty line ends the header block; the rest of the
/// payload is the body, returned as a zero-copy slice.
pub fn decode(data: Bytes) -> (FrameHeaders, Bytes) {
    let mut headers = FrameHeaders::new();
    let mut pos = 0;
    let mut line_start = 0;
    while pos + 1 < data.len() {
        if &data[pos..pos + 2] != CRLF {
            pos += 1;
            continue;
        }
        if pos == line_start {
            return (headers, data.slice(pos + 2..));
        }
        if let Ok(line) = std::str::from_utf8(&data[line_start..pos]) {
            if let Some(split) = line.find(':') {
                if split + 1 < line.len() {
                    let name = line[..split].trim();
                    let value = line[split + 1..].trim();
                    headers.append(name, value);
                }
            }
        }
        pos += 2;
        line_start = pos;
    }
    // no blank line terminator; treat the unterminated tail as body
    (headers, data.slice(line_start..))
}

/// Random lowercase hex string covering `bytes` random bytes.
pub fn rand_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    buf.iter().map(|b| format!("{b:02x}")).collect()
}
