//! Key/value message channel between the device and its host.
//!
//! Both directions carry printable `(key, value)` pairs. Raw bytes must be
//! passed through [`crate::codec`] first.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

/// Blocking, synchronous key/value transport.
pub trait MessageChannel {
    fn send_pair(&mut self, key: &str, value: &str) -> io::Result<()>;

    /// Block until one pair arrives. Keys and values longer than the limits
    /// are cut to fit, the way fixed-size receive buffers would cut them.
    fn receive_pair(&mut self, max_key: usize, max_value: usize) -> io::Result<(String, String)>;
}

/// One `{{key;value}}` pair per line. Anything else on the line stream is
/// treated as console noise and skipped.
pub struct TextChannel<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> TextChannel<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl<R: BufRead, W: Write> MessageChannel for TextChannel<R, W> {
    fn send_pair(&mut self, key: &str, value: &str) -> io::Result<()> {
        writeln!(self.writer, "{}", format_pair(key, value))?;
        self.writer.flush()
    }

    fn receive_pair(&mut self, max_key: usize, max_value: usize) -> io::Result<(String, String)> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "channel closed before a key/value pair arrived",
                ));
            }
            match parse_pair(&line) {
                Some((key, value)) => return Ok(bound_pair(key, value, max_key, max_value)),
                None => log::trace!("channel: skipping non-pair line {:?}", line.trim_end()),
            }
        }
    }
}

/// Render a pair in line framing.
pub fn format_pair(key: &str, value: &str) -> String {
    format!("{{{{{key};{value}}}}}")
}

/// Parse `{{key;value}}`, ignoring surrounding whitespace.
pub fn parse_pair(line: &str) -> Option<(&str, &str)> {
    let body = line.trim().strip_prefix("{{")?.strip_suffix("}}")?;
    body.split_once(';')
}

fn bound_pair(key: &str, value: &str, max_key: usize, max_value: usize) -> (String, String) {
    (truncate(key, max_key, "key"), truncate(value, max_value, "value"))
}

fn truncate(s: &str, max: usize, what: &str) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    log::warn!("channel: {what} of {} bytes cut to {max}", s.len());
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// In-process channel: a scripted inbound queue and a record of everything
/// sent.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    inbound: VecDeque<(String, String)>,
    sent: Vec<(String, String)>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a pair for the next `receive_pair`.
    pub fn push_inbound(&mut self, key: &str, value: &str) {
        self.inbound.push_back((key.to_string(), value.to_string()));
    }

    pub fn sent(&self) -> &[(String, String)] {
        &self.sent
    }

    /// Most recent value sent under `key`.
    pub fn last_sent(&self, key: &str) -> Option<&str> {
        self.sent
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl MessageChannel for MemoryChannel {
    fn send_pair(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.sent.push((key.to_string(), value.to_string()));
        Ok(())
    }

    fn receive_pair(&mut self, max_key: usize, max_value: usize) -> io::Result<(String, String)> {
        let (key, value) = self.inbound.pop_front().ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "no scripted pair left")
        })?;
        Ok(bound_pair(&key, &value, max_key, max_value))
    }
}
