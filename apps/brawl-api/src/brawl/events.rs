//! Brawl wire format: `tag_payload` text frames.

use std::collections::BTreeMap;

use serde_json::Value;

/// Separator between a frame's tag and its payload.
pub const SEPARATOR: char = '_';

// ---------------------------------------------------------------------------
// Client → Server tags
// ---------------------------------------------------------------------------

pub const TAG_BEGIN: &str = "begin";
pub const TAG_DATA: &str = "data";

// ---------------------------------------------------------------------------
// Server → Client frames
// ---------------------------------------------------------------------------

/// First frame on an accepted connection.
pub const VALIDATE: &str = "validate";
/// Sent to every member when play begins.
pub const ACTIVATE: &str = "activate";

const ROSTER_PREFIX: &str = "idList_";
const ERROR_PREFIX: &str = "error_";

/// A frame received from a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientFrame<'a> {
    Begin,
    /// Opaque payload to relay to the whole room. Empty when absent.
    Data(&'a str),
    Unknown(&'a str),
}

impl<'a> ClientFrame<'a> {
    /// Split on the first separator only; the payload may contain more.
    pub fn parse(raw: &'a str) -> Self {
        let (tag, payload) = raw.split_once(SEPARATOR).unwrap_or((raw, ""));
        match tag {
            TAG_BEGIN => ClientFrame::Begin,
            TAG_DATA => ClientFrame::Data(payload),
            other => ClientFrame::Unknown(other),
        }
    }
}

/// `idList_{"<id>":"<name>",...}`.
pub fn roster(names: &BTreeMap<String, String>) -> String {
    let object: serde_json::Map<String, Value> = names
        .iter()
        .map(|(id, name)| (id.clone(), Value::String(name.clone())))
        .collect();
    format!("{ROSTER_PREFIX}{}", Value::Object(object))
}

/// `error_<message>`.
pub fn error(message: &str) -> String {
    format!("{ERROR_PREFIX}{message}")
}
