//! Status line and header block parsing.
//!
//! The same grammar serves WARC container headers, embedded HTTP response
//! headers and encapsulated HTTP requests: a first line, then `name: value`
//! lines up to a blank line.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::io::{BufRead, Write};

/// Protocols accepted on the first line of a WARC record.
pub const WARC_PROTOCOLS: &[&str] = &["WARC/1.0", "WARC/0.17", "WARC/0.18"];
/// Protocols accepted on the status line of an embedded HTTP response.
pub const HTTP_PROTOCOLS: &[&str] = &["HTTP/1.0", "HTTP/1.1"];
/// Field names of an ARC header line, in order.
pub const ARC_FIELDS: [&str; 5] = ["uri", "ip-address", "archive-date", "content-type", "length"];
/// Protocol reported for parsed ARC headers.
pub const ARC_PROTOCOL: &str = "ARC/1.0";

/// A status line plus an ordered header block.
///
/// Header names keep their original case and duplicates are preserved;
/// lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusAndHeaders {
    /// First token of the status line (`HTTP/1.1`, `WARC/1.0`, `ARC/1.0`, ...).
    pub protocol: String,
    /// Remainder of the status line (`200 OK`); empty for WARC and ARC.
    pub status: String,
    pub headers: Vec<(String, String)>,
    /// Bytes consumed from the stream while parsing; zero when synthesized.
    pub total_len: u64,
}

impl StatusAndHeaders {
    /// Build a header block that was not read from a stream.
    pub fn new(protocol: impl Into<String>, status: impl Into<String>, headers: Vec<(String, String)>) -> Self {
        Self {
            protocol: protocol.into(),
            status: status.into(),
            headers,
            total_len: 0,
        }
    }

    /// First value for `name`, compared case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str())
    }

    /// Every value for `name`, in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers.iter().filter(move |(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Replace every value of `name` with a single header, keeping the
    /// position of the first occurrence. Appends when absent.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.headers.iter().position(|(key, _)| key.eq_ignore_ascii_case(name)) {
            Some(index) => {
                self.headers[index].1 = value;
                let mut seen = 0usize;
                self.headers.retain(|(key, _)| {
                    let matches = key.eq_ignore_ascii_case(name);
                    seen += usize::from(matches);
                    !matches || seen == 1
                });
            },
            None => self.headers.push((name.to_string(), value)),
        }
    }

    /// Remove every value of `name`, returning how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.headers.len();
        self.headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        before - self.headers.len()
    }

    /// Numeric status code, when the status text starts with one.
    pub fn status_code(&self) -> Option<u16> {
        self.status.split_whitespace().next()?.parse().ok()
    }

    /// The full status line without its terminator.
    pub fn status_line(&self) -> String {
        match self.status.is_empty() {
            true => self.protocol.clone(),
            false => format!("{} {}", self.protocol, self.status),
        }
    }

    /// Serialize as a header block: status line, headers and the terminating
    /// blank line, all CRLF-delimited.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> std::io::Result<()> {
        write!(writer, "{}\r\n", self.status_line())?;
        for (name, value) in &self.headers {
            write!(writer, "{name}: {value}\r\n")?;
        }
        writer.write_all(b"\r\n")
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_to(&mut buffer);
        buffer
    }
}

/// Decode header bytes as UTF-8, falling back to Latin-1.
pub(crate) fn decode_line(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap_or_else(|err| err.into_bytes().into_iter().map(char::from).collect())
}

/// Read one line, terminator included. An empty string means EOF.
fn read_line<R: BufRead + ?Sized>(reader: &mut R) -> Result<String> {
    let mut buffer = Vec::new();
    reader.read_until(b'\n', &mut buffer).or_raise(|| ErrorKind::Io)?;
    Ok(decode_line(buffer))
}

fn strip_terminator(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

/// Parser for a status line followed by `name: value` headers.
#[derive(Debug, Clone)]
pub struct StatusAndHeadersParser {
    protocols: &'static [&'static str],
    verify: bool,
}

impl StatusAndHeadersParser {
    /// A parser that only accepts status lines starting with one of
    /// `protocols`.
    pub fn new(protocols: &'static [&'static str]) -> Self {
        Self { protocols, verify: true }
    }

    /// A parser that accepts any first line, as found in encapsulated
    /// requests (`POST /path HTTP/1.1`).
    pub fn unverified() -> Self {
        Self { protocols: &[], verify: false }
    }

    /// Parse a header block.
    ///
    /// `first_line` is a status line already read from `reader` by someone
    /// else; it is counted towards `total_len`. Otherwise leading blank lines
    /// are skipped (and counted) before the status line is read.
    ///
    /// # Errors
    /// [`ProtocolMismatch`](ErrorKind::ProtocolMismatch) carrying the raw
    /// status line when verification is on and the protocol is not accepted.
    pub fn parse<R: BufRead + ?Sized>(&self, reader: &mut R, first_line: Option<String>) -> Result<StatusAndHeaders> {
        let mut total_len = 0u64;
        let status_line = match first_line {
            Some(line) => line,
            None => loop {
                let line = read_line(reader)?;
                if line.is_empty() || !line.trim().is_empty() {
                    break line;
                }
                total_len += line.len() as u64;
            },
        };
        total_len += status_line.len() as u64;

        let trimmed = strip_terminator(&status_line).trim_start();
        let (protocol, status) = match trimmed.split_once(' ') {
            Some((protocol, status)) => (protocol, status.trim()),
            None => (trimmed, ""),
        };
        if self.verify && !self.protocols.contains(&protocol) {
            exn::bail!(ErrorKind::ProtocolMismatch(status_line));
        }
        let (protocol, status) = (protocol.to_string(), status.to_string());

        let mut headers: Vec<(String, String)> = Vec::new();
        loop {
            let line = read_line(reader)?;
            total_len += line.len() as u64;
            let content = strip_terminator(&line);
            if content.trim().is_empty() {
                // Blank line or EOF.
                break;
            }
            if content.starts_with([' ', '\t']) {
                if let Some((_, value)) = headers.last_mut() {
                    value.push(' ');
                    value.push_str(content.trim());
                }
                continue;
            }
            match content.split_once(':') {
                Some((name, value)) => headers.push((name.trim().to_string(), value.trim().to_string())),
                None => tracing::trace!(line = content, "ignoring header line without a colon"),
            }
        }

        Ok(StatusAndHeaders {
            protocol,
            status,
            headers,
            total_len,
        })
    }
}

/// Parser for the single-line, whitespace-delimited ARC record header.
#[derive(Debug, Clone, Default)]
pub struct ArcHeadersParser;

impl ArcHeadersParser {
    /// Parse an ARC header line, either `first_line` (typically the line a
    /// failed WARC parse already consumed) or the next line of `reader`.
    pub fn parse<R: BufRead + ?Sized>(&self, reader: &mut R, first_line: Option<String>) -> Result<StatusAndHeaders> {
        let line = match first_line {
            Some(line) => line,
            None => read_line(reader)?,
        };
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != ARC_FIELDS.len() {
            exn::bail!(ErrorKind::ArcFieldCount(parts.len()));
        }
        let headers = ARC_FIELDS.iter().zip(parts).map(|(name, value)| (name.to_string(), value.to_string())).collect();
        Ok(StatusAndHeaders {
            protocol: ARC_PROTOCOL.to_string(),
            status: String::new(),
            headers,
            total_len: line.len() as u64,
        })
    }
}
