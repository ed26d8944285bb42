use std::collections::BTreeMap;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{FrameError, Result};
use crate::frame::{Frame, FrameKind};

/// Default maximum body size: 16 MiB.
pub const DEFAULT_MAX_BODY: usize = 16 * 1024 * 1024;

/// Default maximum size of the header section, terminating blank line included.
pub const DEFAULT_MAX_HEADER: usize = 64 * 1024;

const PORT: &str = "Port";
const CONTENT_TYPE: &str = "Content-Type";
const CONTENT_LENGTH: &str = "Content-Length";

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum body size in bytes. Default: 16 MiB.
    pub max_body_size: usize,
    /// Maximum header section size in bytes. Default: 64 KiB.
    pub max_header_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY,
            max_header_size: DEFAULT_MAX_HEADER,
        }
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// data.TextMessage\r\n          <kind>.<subtype>
/// Port: IN\r\n
/// Content-Type: text/plain\r\n  (omitted when empty)
/// Content-Length: 5\r\n
/// Tcp-Id: 3\r\n                 (extensions, sorted by name)
/// \r\n
/// hello                         (Content-Length bytes)
/// ```
///
/// The whole frame lands in `dst` in one piece, so a single write of the
/// buffer never interleaves with another frame.
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    check_subtype(&frame.subtype)?;
    if frame.port.is_empty() {
        return Err(FrameError::InvalidHeaderValue {
            name: PORT.to_string(),
            reason: "must not be empty",
        });
    }
    check_value(PORT, &frame.port)?;
    check_value(CONTENT_TYPE, &frame.content_type)?;
    if let Some(extensions) = &frame.extensions {
        for (name, value) in extensions {
            check_extension_name(name)?;
            check_value(name, value)?;
        }
    }

    let length = frame.body.len().to_string();
    let mut header_len = frame.kind.as_str().len() + 1 + frame.subtype.len() + 2;
    header_len += header_line_len(PORT, &frame.port);
    if !frame.content_type.is_empty() {
        header_len += header_line_len(CONTENT_TYPE, &frame.content_type);
    }
    header_len += header_line_len(CONTENT_LENGTH, &length);
    if let Some(extensions) = &frame.extensions {
        header_len += extensions
            .iter()
            .map(|(name, value)| header_line_len(name, value))
            .sum::<usize>();
    }
    dst.reserve(header_len + 2 + frame.body.len());

    dst.put_slice(frame.kind.as_str().as_bytes());
    dst.put_u8(b'.');
    dst.put_slice(frame.subtype.as_bytes());
    dst.put_slice(b"\r\n");
    put_header(dst, PORT, &frame.port);
    if !frame.content_type.is_empty() {
        put_header(dst, CONTENT_TYPE, &frame.content_type);
    }
    put_header(dst, CONTENT_LENGTH, &length);
    if let Some(extensions) = &frame.extensions {
        for (name, value) in extensions {
            put_header(dst, name, value);
        }
    }
    dst.put_slice(b"\r\n");
    dst.put_slice(&frame.body);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, config: &FrameConfig) -> Result<Option<Frame>> {
    let header_len = match find_header_end(src) {
        Some(len) => len,
        None if src.len() > config.max_header_size => {
            return Err(FrameError::HeaderTooLarge {
                max: config.max_header_size,
            })
        }
        None => return Ok(None), // Need more data
    };
    if header_len > config.max_header_size {
        return Err(FrameError::HeaderTooLarge {
            max: config.max_header_size,
        });
    }

    let header = parse_header(&src[..header_len])?;
    if header.body_len > config.max_body_size {
        return Err(FrameError::BodyTooLarge {
            size: header.body_len,
            max: config.max_body_size,
        });
    }

    let total = header_len + header.body_len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None); // Need more data
    }

    src.advance(header_len);
    let body = src.split_to(header.body_len).freeze();

    Ok(Some(Frame {
        kind: header.kind,
        subtype: header.subtype,
        port: header.port,
        content_type: header.content_type,
        extensions: header.extensions,
        body,
    }))
}

struct Header {
    kind: FrameKind,
    subtype: String,
    port: String,
    content_type: String,
    extensions: Option<BTreeMap<String, String>>,
    body_len: usize,
}

/// Length of the header section including the blank line, if complete.
fn find_header_end(src: &[u8]) -> Option<usize> {
    let mut line_start = 0;
    for (idx, byte) in src.iter().enumerate() {
        if *byte != b'\n' {
            continue;
        }
        let line = &src[line_start..idx];
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() && line_start > 0 {
            return Some(idx + 1);
        }
        line_start = idx + 1;
    }
    None
}

fn parse_header(raw: &[u8]) -> Result<Header> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| FrameError::MalformedHeader("header is not valid UTF-8".to_string()))?;
    let mut lines = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line));

    let start = lines.next().unwrap_or_default();
    if start.is_empty() {
        return Err(FrameError::MalformedHeader(
            "frame starts with an empty line".to_string(),
        ));
    }
    let (kind, subtype) = start.split_once('.').ok_or_else(|| {
        FrameError::MalformedHeader(format!("start line {start:?} is not <kind>.<subtype>"))
    })?;
    let kind: FrameKind = kind.parse()?;
    if subtype.is_empty() {
        return Err(FrameError::MalformedHeader("empty subtype".to_string()));
    }

    let mut port = None;
    let mut content_type = String::new();
    let mut body_len = None;
    let mut extensions: Option<BTreeMap<String, String>> = None;

    for line in lines.take_while(|line| !line.is_empty()) {
        let (name, value) = line.split_once(':').ok_or_else(|| {
            FrameError::MalformedHeader(format!("header line {line:?} has no ':'"))
        })?;
        let name = name.trim();
        let value = value.strip_prefix(' ').unwrap_or(value);
        if name.is_empty() {
            return Err(FrameError::MalformedHeader("empty header name".to_string()));
        }

        if name.eq_ignore_ascii_case(PORT) {
            port = Some(value.to_string());
        } else if name.eq_ignore_ascii_case(CONTENT_TYPE) {
            content_type = value.to_string();
        } else if name.eq_ignore_ascii_case(CONTENT_LENGTH) {
            let len = value.trim().parse::<usize>().map_err(|_| {
                FrameError::MalformedHeader(format!("invalid {CONTENT_LENGTH} {value:?}"))
            })?;
            body_len = Some(len);
        } else {
            extensions
                .get_or_insert_with(BTreeMap::new)
                .insert(name.to_string(), value.to_string());
        }
    }

    let port = port
        .filter(|port| !port.is_empty())
        .ok_or(FrameError::MissingHeader(PORT))?;
    let body_len = body_len.ok_or(FrameError::MissingHeader(CONTENT_LENGTH))?;

    Ok(Header {
        kind,
        subtype: subtype.to_string(),
        port,
        content_type,
        extensions,
        body_len,
    })
}

fn header_line_len(name: &str, value: &str) -> usize {
    name.len() + 2 + value.len() + 2
}

fn put_header(dst: &mut BytesMut, name: &str, value: &str) {
    dst.put_slice(name.as_bytes());
    dst.put_slice(b": ");
    dst.put_slice(value.as_bytes());
    dst.put_slice(b"\r\n");
}

fn check_subtype(subtype: &str) -> Result<()> {
    if subtype.is_empty() {
        return Err(FrameError::InvalidHeaderValue {
            name: "subtype".to_string(),
            reason: "must not be empty",
        });
    }
    check_value("subtype", subtype)
}

fn check_value(name: &str, value: &str) -> Result<()> {
    if value.contains(['\r', '\n']) {
        return Err(FrameError::InvalidHeaderValue {
            name: name.to_string(),
            reason: "contains a line break",
        });
    }
    Ok(())
}

fn check_extension_name(name: &str) -> Result<()> {
    let invalid = |reason| FrameError::InvalidHeaderValue {
        name: name.to_string(),
        reason,
    };
    if name.trim().is_empty() {
        return Err(invalid("extension name must not be blank"));
    }
    if name.trim() != name {
        return Err(invalid("extension name has surrounding whitespace"));
    }
    if name.contains([':', '\r', '\n']) {
        return Err(invalid("extension name contains ':' or a line break"));
    }
    if [PORT, CONTENT_TYPE, CONTENT_LENGTH]
        .iter()
        .any(|reserved| name.eq_ignore_ascii_case(reserved))
    {
        return Err(invalid("extension name collides with a standard header"));
    }
    Ok(())
}
