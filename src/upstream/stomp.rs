//! Minimal STOMP 1.2 text-frame codec.
//!
//! Frames look like `COMMAND\nheader:value\n...\n\nbody\0`. Only what a
//! subscribing client needs is covered: building CONNECT / SUBSCRIBE /
//! DISCONNECT and parsing CONNECTED / MESSAGE / ERROR / RECEIPT.

use crate::error::{FeedError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    /// First value of a header. Repeated headers keep their first occurrence.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn connect(host: &str) -> Self {
        Frame::new("CONNECT")
            .header("accept-version", "1.2")
            .header("host", host)
            .header("heart-beat", "0,0")
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new("SUBSCRIBE")
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    pub fn disconnect() -> Self {
        Frame::new("DISCONNECT")
    }

    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(self.command.len() + self.body.len() + 64);
        out.push_str(&self.command);
        out.push('\n');
        // CONNECT/CONNECTED headers are not escaped in 1.2
        let escape_headers = self.command != "CONNECT" && self.command != "CONNECTED";
        for (name, value) in &self.headers {
            if escape_headers {
                out.push_str(&escape(name));
                out.push(':');
                out.push_str(&escape(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        if !self.body.is_empty() {
            out.push_str("content-length:");
            out.push_str(&self.body.len().to_string());
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Parse one frame. Returns `Ok(None)` for heart-beat EOLs.
    pub fn decode(raw: &str) -> Result<Option<Frame>> {
        let raw = raw.trim_start_matches(['\r', '\n']);
        if raw.is_empty() || raw == "\0" {
            return Ok(None);
        }

        let (head, rest) = split_head(raw)
            .ok_or_else(|| FeedError::Stomp("frame has no header terminator".to_string()))?;

        let mut lines = head.lines();
        let command = lines
            .next()
            .map(|l| l.trim_end_matches('\r'))
            .filter(|c| !c.is_empty())
            .ok_or_else(|| FeedError::Stomp("frame has no command".to_string()))?
            .to_string();

        let unescape_headers = command != "CONNECTED" && command != "CONNECT";
        let mut headers = Vec::new();
        for line in lines {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| FeedError::Stomp(format!("malformed header line: {line}")))?;
            if unescape_headers {
                headers.push((unescape(name)?, unescape(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let mut frame = Frame {
            command,
            headers,
            body: String::new(),
        };

        let body = match frame.get("content-length").map(str::parse::<usize>) {
            Some(Ok(len)) => rest
                .get(..len)
                .ok_or_else(|| FeedError::Stomp("body shorter than content-length".to_string()))?,
            Some(Err(_)) => return Err(FeedError::Stomp("invalid content-length".to_string())),
            None => rest.split('\0').next().unwrap_or_default(),
        };
        frame.body = body.to_string();
        Ok(Some(frame))
    }
}

fn split_head(raw: &str) -> Option<(&str, &str)> {
    if let Some(idx) = raw.find("\n\n") {
        return Some((&raw[..idx], &raw[idx + 2..]));
    }
    raw.find("\r\n\r\n")
        .map(|idx| (&raw[..idx], &raw[idx + 4..]))
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(value: &str) -> Result<String> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(FeedError::Stomp(format!(
                    "undefined escape sequence \\{}",
                    other.map(String::from).unwrap_or_default()
                )))
            }
        }
    }
    Ok(out)
}
