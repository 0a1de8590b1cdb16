//! Startup-notification wire messages.
//!
//! Launchers announce `new:`, `change:` and `remove:` messages as
//! `KEY=value` lists, split into 20 byte client messages on the root window.
//! The first piece goes out as `_NET_STARTUP_INFO_BEGIN`, the rest as
//! `_NET_STARTUP_INFO`, and a NUL byte ends the message.

use thiserror::Error;
use tracing::{debug, trace};

use crate::common::collections::HashMap;
use crate::sys::window_system::{Timestamp, WindowId};

/// Payload bytes per client message.
pub const CHUNK_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    New,
    Change,
    Remove,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageFields {
    pub name: Option<String>,
    pub wmclass: Option<String>,
    pub workspace: Option<u32>,
    pub timestamp: Option<Timestamp>,
    pub screen: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupMessage {
    pub kind: MessageKind,
    pub id: String,
    pub fields: MessageFields,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("message has no type prefix")]
    MissingPrefix,
    #[error("unknown message type {0:?}")]
    UnknownKind(String),
    #[error("message has no ID")]
    MissingId,
    #[error("unterminated quoted value for {0}")]
    Unterminated(String),
    #[error("expected KEY=value, found {0:?}")]
    Malformed(String),
}

pub fn parse(text: &str) -> Result<StartupMessage, MessageError> {
    let (prefix, body) = text.split_once(':').ok_or(MessageError::MissingPrefix)?;
    let kind = match prefix.trim() {
        "new" => MessageKind::New,
        "change" => MessageKind::Change,
        "remove" => MessageKind::Remove,
        other => return Err(MessageError::UnknownKind(other.to_string())),
    };

    let mut id = None;
    let mut fields = MessageFields::default();
    for (key, value) in pairs(body)? {
        match key.as_str() {
            "ID" => id = Some(value),
            "NAME" => fields.name = Some(value),
            "WMCLASS" => fields.wmclass = Some(value),
            "DESKTOP" => fields.workspace = value.parse().ok(),
            "TIMESTAMP" => fields.timestamp = value.parse().ok(),
            "SCREEN" => fields.screen = value.parse().ok(),
            _ => trace!(key = %key, "ignoring startup message key"),
        }
    }

    let id = id.filter(|id| !id.is_empty()).ok_or(MessageError::MissingId)?;
    if fields.timestamp.is_none() {
        fields.timestamp = timestamp_from_id(&id);
    }
    Ok(StartupMessage { kind, id, fields })
}

/// Launchers that predate the `TIMESTAMP` key encode it as `..._TIME<n>`.
pub fn timestamp_from_id(id: &str) -> Option<Timestamp> {
    let (_, rest) = id.rsplit_once("_TIME")?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

fn pairs(body: &str) -> Result<Vec<(String, String)>, MessageError> {
    let mut out = Vec::new();
    let mut chars = body.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_ascii_whitespace()).is_some() {}
        if chars.peek().is_none() {
            return Ok(out);
        }

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| *c != '=' && !c.is_ascii_whitespace()) {
            key.push(c);
        }
        if chars.next() != Some('=') {
            return Err(MessageError::Malformed(key));
        }

        let mut value = String::new();
        let mut quoted = false;
        loop {
            match chars.next() {
                None if quoted => return Err(MessageError::Unterminated(key)),
                None => break,
                Some('"') => quoted = !quoted,
                Some('\\') => match chars.next() {
                    Some(escaped) => value.push(escaped),
                    None => break,
                },
                Some(c) if c.is_ascii_whitespace() && !quoted => break,
                Some(c) => value.push(c),
            }
        }
        out.push((key, value));
    }
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// The `remove:` message that ends sequence `id`.
pub fn format_remove(id: &str) -> String { format!("remove: ID={}", quote(id)) }

/// Splits a message into NUL terminated, zero padded pieces.
pub fn chunks(message: &str) -> Vec<[u8; CHUNK_LEN]> {
    let mut bytes = message.as_bytes().to_vec();
    bytes.push(0);
    bytes
        .chunks(CHUNK_LEN)
        .map(|piece| {
            let mut chunk = [0u8; CHUNK_LEN];
            chunk[..piece.len()].copy_from_slice(piece);
            chunk
        })
        .collect()
}

/// Longest message we are willing to buffer for one sender.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Senders with a message in flight at once. Past this the oldest partial
/// message is dropped.
pub const MAX_PENDING_SENDERS: usize = 64;

#[derive(Debug)]
struct Partial {
    started: u64,
    bytes: Vec<u8>,
}

/// Reassembles messages from pieces, keyed by the window that sent them.
#[derive(Debug, Default)]
pub struct MessageAssembler {
    pending: HashMap<WindowId, Partial>,
    next_start: u64,
}

impl MessageAssembler {
    pub fn new() -> Self { Self::default() }

    /// Feeds one piece. Returns the text once a terminating NUL arrives.
    pub fn push(&mut self, source: WindowId, begin: bool, data: &[u8]) -> Option<String> {
        if begin {
            self.begin(source);
        }
        let Some(partial) = self.pending.get_mut(&source) else {
            debug!(?source, "startup message piece without a beginning");
            return None;
        };
        let (piece, done) = match data.iter().position(|b| *b == 0) {
            Some(end) => (&data[..end], true),
            None => (data, false),
        };
        if partial.bytes.len() + piece.len() > MAX_MESSAGE_LEN {
            debug!(?source, "dropping startup message longer than {MAX_MESSAGE_LEN} bytes");
            self.pending.remove(&source);
            return None;
        }
        partial.bytes.extend_from_slice(piece);
        if !done {
            return None;
        }

        let partial = self.pending.remove(&source)?;
        match String::from_utf8(partial.bytes) {
            Ok(text) => Some(text),
            Err(e) => {
                debug!(?source, "dropping startup message that is not UTF-8: {e}");
                None
            }
        }
    }

    /// Drops whatever `source` had in flight.
    pub fn forget(&mut self, source: WindowId) { self.pending.remove(&source); }

    pub fn pending_len(&self) -> usize { self.pending.len() }

    fn begin(&mut self, source: WindowId) {
        if !self.pending.contains_key(&source) && self.pending.len() >= MAX_PENDING_SENDERS {
            let oldest = self.pending.iter().min_by_key(|(_, p)| p.started).map(|(w, _)| *w);
            if let Some(oldest) = oldest {
                debug!(?oldest, "too many partial startup messages, dropping the oldest");
                self.pending.remove(&oldest);
            }
        }
        let started = self.next_start;
        self.next_start += 1;
        self.pending.insert(source, Partial { started, bytes: Vec::new() });
    }
}
