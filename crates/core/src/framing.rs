//! Token framing: turning backend fragments into server-sent-event records.
//!
//! Each fragment is framed on its own, with no memory of earlier fragments:
//!
//! 1. `" "`  becomes the sentinel `@#$`
//! 2. `"\n"` becomes `<br/>`
//! 3. any other whitespace-only fragment (including `""`) is dropped
//! 4. everything else is forwarded with each space replaced by `@#$`
//!
//! A record on the wire is `data: <payload>\n\n`. The stream always closes
//! with a single `data: [DONE]\n\n` record, so a text fragment that reads
//! exactly `[DONE]` goes out as `b'[DONE]'` instead.
//!
//! Payloads never contain `\r`: line endings are normalized to `\n` when a
//! record is built, and each line becomes its own `data:` field.

use serde::{Deserialize, Serialize};

/// Substituted for spaces so clients that collapse whitespace keep them.
pub const SPACE_SENTINEL: &str = "@#$";

/// Substituted for a lone newline fragment.
pub const LINE_BREAK: &str = "<br/>";

/// Payload of the terminal record.
pub const DONE_PAYLOAD: &str = "[DONE]";

/// How text payloads are written on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadEncoding {
    /// Text goes out as UTF-8.
    #[default]
    Utf8,
    /// Text goes out as a byte-string literal of its UTF-8 encoding,
    /// e.g. `b'caf\xc3\xa9'`. Kept for clients written against that format.
    BytesRepr,
}

/// One server-sent-event record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireEvent {
    event: Option<&'static str>,
    payload: String,
}

impl WireEvent {
    /// A plain `data:` record.
    pub fn data(payload: impl Into<String>) -> Self {
        Self {
            event: None,
            payload: normalize_line_endings(payload.into()),
        }
    }

    /// The terminal `[DONE]` record.
    pub fn done() -> Self {
        Self::data(DONE_PAYLOAD)
    }

    /// An `event: error` record carrying a backend failure message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            event: Some("error"),
            payload: normalize_line_endings(message.into()),
        }
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn event(&self) -> Option<&str> {
        self.event
    }

    pub fn is_done(&self) -> bool {
        self.event.is_none() && self.payload == DONE_PAYLOAD
    }
}

fn normalize_line_endings(payload: String) -> String {
    if payload.contains('\r') {
        payload.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        payload
    }
}

/// Stateless fragment framer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenFramer {
    encoding: PayloadEncoding,
}

impl TokenFramer {
    pub fn new(encoding: PayloadEncoding) -> Self {
        Self { encoding }
    }

    /// Frame one fragment. `None` means the fragment is suppressed.
    pub fn frame(&self, fragment: &str) -> Option<WireEvent> {
        match fragment {
            " " => Some(WireEvent::data(SPACE_SENTINEL)),
            "\n" => Some(WireEvent::data(LINE_BREAK)),
            f if f.chars().all(char::is_whitespace) => None,
            f => {
                let text = f.replace(' ', SPACE_SENTINEL);
                let payload = match self.encoding {
                    PayloadEncoding::Utf8 if text != DONE_PAYLOAD => text,
                    _ => bytes_repr(text.as_bytes()),
                };
                Some(WireEvent::data(payload))
            }
        }
    }
}

/// Frame one fragment with UTF-8 payloads.
pub fn frame(fragment: &str) -> Option<WireEvent> {
    TokenFramer::default().frame(fragment)
}

/// Render bytes as a byte-string literal: `b'...'`, switching to double
/// quotes when the bytes contain a single quote but no double quote.
pub fn bytes_repr(bytes: &[u8]) -> String {
    let quote = if bytes.contains(&b'\'') && !bytes.contains(&b'"') {
        b'"'
    } else {
        b'\''
    };

    let mut out = String::with_capacity(bytes.len() + 3);
    out.push('b');
    out.push(char::from(quote));
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\t' => out.push_str("\\t"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            _ if b == quote => {
                out.push('\\');
                out.push(char::from(b));
            }
            0x20..=0x7e => out.push(char::from(b)),
            _ => out.push_str(&format!("\\x{b:02x}")),
        }
    }
    out.push(char::from(quote));
    out
}
