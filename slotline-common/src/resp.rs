//! # RESP Encoding and Parsing
//!
//! Purpose: Encode command frames and parse server replies for the
//! line- and length-prefixed Redis wire protocol.
//!
//! ## Design Principles
//! 1. **State-Free Parsing**: Replies are parsed top-down with minimal state.
//! 2. **Buffer Reuse**: Caller provides buffers to avoid per-call allocations.
//! 3. **Binary-Safe**: Bulk strings are treated as raw bytes, never escaped.
//! 4. **Fail Fast**: Invalid framing returns protocol errors immediately.
//!
//! ## Wire Format
//!
//! ```text
//! request:  *<argc>\r\n ( $<len>\r\n <bytes>\r\n )*
//! replies:  +<status>\r\n
//!           -<error>\r\n
//!           :<i64>\r\n
//!           $<len>\r\n<bytes>\r\n     ($-1\r\n is nil)
//!           *<count>\r\n<reply>*      (*-1\r\n is nil)
//! ```

use std::io::{BufRead, Read};

use thiserror::Error;

pub const DOLLAR_BYTE: u8 = b'$';
pub const ASTERISK_BYTE: u8 = b'*';
pub const PLUS_BYTE: u8 = b'+';
pub const MINUS_BYTE: u8 = b'-';
pub const COLON_BYTE: u8 = b':';

const CRLF: &[u8] = b"\r\n";

// Upper bound on buffer space reserved before any bulk payload has arrived.
const MAX_BULK_PREALLOC: usize = 64 * 1024;

/// Result type for codec operations.
pub type RespResult<T> = Result<T, RespError>;

/// Errors raised while encoding or decoding RESP.
#[derive(Debug, Error)]
pub enum RespError {
    /// The underlying stream failed or hit EOF mid-reply.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed bytes on the wire; the stream can no longer be trusted.
    #[error("protocol error: {0}")]
    Protocol(&'static str),
    /// The server answered with a `-` error reply.
    #[error("server error: {0}")]
    Server(String),
}

/// One decoded reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+OK` or `+PONG` style replies.
    Status(String),
    /// `:123` replies.
    Integer(i64),
    /// `$...` bulk strings, with `None` for nil.
    Bulk(Option<Vec<u8>>),
    /// A `-ERR ...` reply captured as an element of a multi-bulk reply.
    Error(String),
    /// `*...` multi-bulk replies, with `None` for nil.
    Array(Option<Vec<Reply>>),
}

impl Reply {
    /// Returns the payload of a status or non-nil bulk reply.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Reply::Status(text) => Some(text.as_bytes()),
            Reply::Bulk(Some(data)) => Some(data),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Reply::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Consumes the reply and returns its elements if it is a non-nil array.
    pub fn into_array(self) -> Option<Vec<Reply>> {
        match self {
            Reply::Array(items) => items,
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Reply::Bulk(None) | Reply::Array(None))
    }
}

/// Encodes a command frame as a RESP array of bulk strings.
///
/// A frame must carry at least the command name; an empty frame is rejected
/// before anything is written to `out`.
pub fn encode_command<A: AsRef<[u8]>>(args: &[A], out: &mut Vec<u8>) -> RespResult<()> {
    if args.is_empty() {
        return Err(RespError::Protocol("empty command frame"));
    }

    out.push(ASTERISK_BYTE);
    push_usize(out, args.len());
    out.extend_from_slice(CRLF);
    for arg in args {
        let arg = arg.as_ref();
        out.push(DOLLAR_BYTE);
        push_usize(out, arg.len());
        out.extend_from_slice(CRLF);
        out.extend_from_slice(arg);
        out.extend_from_slice(CRLF);
    }
    Ok(())
}

/// Serializes a reply the way a server would put it on the wire.
pub fn encode_reply(reply: &Reply, out: &mut Vec<u8>) {
    match reply {
        Reply::Status(text) => {
            out.push(PLUS_BYTE);
            out.extend_from_slice(text.as_bytes());
            out.extend_from_slice(CRLF);
        }
        Reply::Error(text) => {
            out.push(MINUS_BYTE);
            out.extend_from_slice(text.as_bytes());
            out.extend_from_slice(CRLF);
        }
        Reply::Integer(value) => {
            out.push(COLON_BYTE);
            out.extend_from_slice(value.to_string().as_bytes());
            out.extend_from_slice(CRLF);
        }
        Reply::Bulk(None) => out.extend_from_slice(b"$-1\r\n"),
        Reply::Bulk(Some(data)) => {
            out.push(DOLLAR_BYTE);
            push_usize(out, data.len());
            out.extend_from_slice(CRLF);
            out.extend_from_slice(data);
            out.extend_from_slice(CRLF);
        }
        Reply::Array(None) => out.extend_from_slice(b"*-1\r\n"),
        Reply::Array(Some(items)) => {
            out.push(ASTERISK_BYTE);
            push_usize(out, items.len());
            out.extend_from_slice(CRLF);
            for item in items {
                encode_reply(item, out);
            }
        }
    }
}

/// Reads one reply from the buffered reader.
///
/// A top-level `-` reply is returned as `Err(RespError::Server)`. Inside a
/// multi-bulk reply the same condition becomes a `Reply::Error` element so the
/// remaining elements are still read.
pub fn read_reply<R: BufRead>(reader: &mut R, line_buf: &mut Vec<u8>) -> RespResult<Reply> {
    read_line(reader, line_buf)?;
    if line_buf.is_empty() {
        return Err(RespError::Protocol("empty reply line"));
    }

    match line_buf[0] {
        PLUS_BYTE => Ok(Reply::Status(lossy(&line_buf[1..]))),
        MINUS_BYTE => Err(RespError::Server(lossy(&line_buf[1..]))),
        COLON_BYTE => Ok(Reply::Integer(parse_i64(&line_buf[1..])?)),
        DOLLAR_BYTE => {
            let len = parse_i64(&line_buf[1..])?;
            read_bulk(reader, len)
        }
        ASTERISK_BYTE => {
            let count = parse_i64(&line_buf[1..])?;
            read_array(reader, count, line_buf)
        }
        _ => Err(RespError::Protocol("unknown reply type byte")),
    }
}

fn read_bulk<R: BufRead>(reader: &mut R, len: i64) -> RespResult<Reply> {
    if len == -1 {
        return Ok(Reply::Bulk(None));
    }
    if len < 0 {
        return Err(RespError::Protocol("negative bulk length"));
    }

    // The declared length is untrusted; grow the buffer as bytes arrive.
    let len = len as u64;
    let mut data = Vec::with_capacity(usize::try_from(len).unwrap_or(usize::MAX).min(MAX_BULK_PREALLOC));
    let read = reader.by_ref().take(len).read_to_end(&mut data)?;
    if (read as u64) < len {
        return Err(RespError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "bulk reply truncated",
        )));
    }

    let mut crlf = [0u8; 2];
    reader.read_exact(&mut crlf)?;
    if crlf != [b'\r', b'\n'] {
        return Err(RespError::Protocol("bulk reply missing terminator"));
    }

    Ok(Reply::Bulk(Some(data)))
}

fn read_array<R: BufRead>(reader: &mut R, count: i64, line_buf: &mut Vec<u8>) -> RespResult<Reply> {
    if count == -1 {
        return Ok(Reply::Array(None));
    }
    if count < 0 {
        return Err(RespError::Protocol("negative multi-bulk count"));
    }

    let mut items = Vec::with_capacity((count as usize).min(1024));
    for _ in 0..count {
        match read_reply(reader, line_buf) {
            Ok(item) => items.push(item),
            Err(RespError::Server(message)) => items.push(Reply::Error(message)),
            Err(err) => return Err(err),
        }
    }
    Ok(Reply::Array(Some(items)))
}

fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> RespResult<()> {
    buf.clear();
    let bytes = reader.read_until(b'\n', buf)?;
    if bytes == 0 {
        return Err(RespError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection closed by peer",
        )));
    }
    if buf.len() < 2 || buf[buf.len() - 2] != b'\r' {
        return Err(RespError::Protocol("line missing CRLF"));
    }
    buf.truncate(buf.len() - 2);
    Ok(())
}

fn parse_i64(data: &[u8]) -> RespResult<i64> {
    let text = std::str::from_utf8(data).map_err(|_| RespError::Protocol("non-numeric value"))?;
    text.parse::<i64>()
        .map_err(|_| RespError::Protocol("non-numeric value"))
}

fn lossy(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}

fn push_usize(out: &mut Vec<u8>, mut value: usize) {
    // Write digits into a small stack buffer to avoid heap allocations.
    let mut buf = [0u8; 20];
    let mut len = 0;
    if value == 0 {
        buf[0] = b'0';
        len = 1;
    } else {
        while value > 0 {
            buf[len] = b'0' + (value % 10) as u8;
            value /= 10;
            len += 1;
        }
    }
    for idx in (0..len).rev() {
        out.push(buf[idx]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn decode(bytes: &[u8]) -> RespResult<Reply> {
        let mut reader = Cursor::new(bytes.to_vec());
        let mut line = Vec::new();
        read_reply(&mut reader, &mut line)
    }

    #[test]
    fn encodes_set_command() {
        let mut buf = Vec::new();
        let args: [&[u8]; 3] = [b"SET", b"foo", b"bar"];
        encode_command(&args, &mut buf).unwrap();
        assert_eq!(&buf, b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n");
    }

    #[test]
    fn encodes_binary_arguments_verbatim() {
        let mut buf = Vec::new();
        let args: [&[u8]; 3] = [b"SET", b"k\r\n", b""];
        encode_command(&args, &mut buf).unwrap();
        assert_eq!(&buf, b"*3\r\n$3\r\nSET\r\n$3\r\nk\r\n\r\n$0\r\n\r\n");
    }

    #[test]
    fn rejects_empty_frame() {
        let mut buf = Vec::new();
        let empty: [&[u8]; 0] = [];
        assert!(matches!(
            encode_command(&empty, &mut buf),
            Err(RespError::Protocol(_))
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn parses_status() {
        assert_eq!(decode(b"+OK\r\n").unwrap(), Reply::Status("OK".into()));
    }

    #[test]
    fn parses_bulk_string() {
        assert_eq!(
            decode(b"$3\r\nbar\r\n").unwrap(),
            Reply::Bulk(Some(b"bar".to_vec()))
        );
    }

    #[test]
    fn parses_nil_bulk_and_nil_array() {
        assert_eq!(decode(b"$-1\r\n").unwrap(), Reply::Bulk(None));
        assert_eq!(decode(b"*-1\r\n").unwrap(), Reply::Array(None));
    }

    #[test]
    fn parses_negative_integer() {
        assert_eq!(decode(b":-42\r\n").unwrap(), Reply::Integer(-42));
    }

    #[test]
    fn top_level_error_is_raised() {
        match decode(b"-ERR wrong type\r\n") {
            Err(RespError::Server(message)) => assert_eq!(message, "ERR wrong type"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn error_inside_array_is_captured() {
        let reply = decode(b"*3\r\n:1\r\n-ERR nope\r\n$1\r\nx\r\n").unwrap();
        assert_eq!(
            reply,
            Reply::Array(Some(vec![
                Reply::Integer(1),
                Reply::Error("ERR nope".into()),
                Reply::Bulk(Some(b"x".to_vec())),
            ]))
        );
    }

    #[test]
    fn unknown_type_byte_is_fatal() {
        assert!(matches!(decode(b"?what\r\n"), Err(RespError::Protocol(_))));
    }

    #[test]
    fn non_numeric_length_is_fatal() {
        assert!(matches!(decode(b"$abc\r\n"), Err(RespError::Protocol(_))));
        assert!(matches!(decode(b":12x\r\n"), Err(RespError::Protocol(_))));
    }

    #[test]
    fn bulk_without_terminator_is_fatal() {
        assert!(matches!(decode(b"$3\r\nbarXY"), Err(RespError::Protocol(_))));
    }

    #[test]
    fn truncated_stream_is_io_error() {
        assert!(matches!(decode(b"$10\r\nshort\r\n"), Err(RespError::Io(_))));
        assert!(matches!(decode(b""), Err(RespError::Io(_))));
    }

    #[test]
    fn status_and_error_lines_decode_lossily() {
        assert_eq!(decode(b"+ok\xff\r\n").unwrap(), Reply::Status("ok\u{fffd}".to_string()));
        assert_eq!(
            decode(b"*1\r\n-ERR \xfe\r\n").unwrap(),
            Reply::Array(Some(vec![Reply::Error("ERR \u{fffd}".to_string())]))
        );
        // Bulk payloads are not touched.
        assert_eq!(decode(b"$1\r\n\xff\r\n").unwrap(), Reply::Bulk(Some(vec![0xff])));
    }

    #[test]
    fn huge_declared_bulk_length_is_io_error() {
        assert!(matches!(
            decode(b"$9223372036854775807\r\nabc\r\n"),
            Err(RespError::Io(_))
        ));
    }

    #[test]
    fn large_bulk_is_read_completely() {
        let payload = vec![b'x'; MAX_BULK_PREALLOC * 2 + 3];
        let mut buf = Vec::new();
        encode_reply(&Reply::Bulk(Some(payload.clone())), &mut buf);
        assert_eq!(decode(&buf).unwrap(), Reply::Bulk(Some(payload)));
    }

    #[test]
    fn reply_roundtrip_preserves_nested_nils() {
        let reply = Reply::Array(Some(vec![
            Reply::Status("OK".into()),
            Reply::Integer(i64::MIN),
            Reply::Bulk(None),
            Reply::Bulk(Some(vec![0, 13, 10, 255])),
            Reply::Array(None),
            Reply::Array(Some(vec![Reply::Array(Some(Vec::new())), Reply::Error("ERR x".into())])),
        ]));
        let mut buf = Vec::new();
        encode_reply(&reply, &mut buf);
        assert_eq!(decode(&buf).unwrap(), reply);
    }

    #[test]
    fn reads_consecutive_replies_from_one_stream() {
        let mut reader = Cursor::new(b"+PONG\r\n:7\r\n".to_vec());
        let mut line = Vec::new();
        assert_eq!(read_reply(&mut reader, &mut line).unwrap(), Reply::Status("PONG".into()));
        assert_eq!(read_reply(&mut reader, &mut line).unwrap(), Reply::Integer(7));
    }
}
