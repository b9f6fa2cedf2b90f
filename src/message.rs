/*!
The text that travels over the wire, and the type that carries it from
session readers to the hub.
*/
use std::sync::Arc;

use chrono::{DateTime, TimeZone};

use crate::registry::SessionId;

pub static NAME_TAKEN_TEXT: &str = "Name already in use, please choose another.\n";
pub static SERVER_FULL_TEXT: &str = "Server is full. Please try again later.\n";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A fully formatted, newline-terminated line of output.
///
/// Shared rather than cloned, since every line is handed to every session.
pub type Line = Arc<str>;

/// One line headed for the hub's fan-out loop.
#[derive(Clone, Debug)]
pub struct Broadcast {
    /// Session that said it, if any. Notices have no origin and reach
    /// everyone; chat lines are not echoed back to their origin.
    pub origin: Option<SessionId>,
    pub text: Line,
}

impl Broadcast {
    pub fn notice(text: String) -> Broadcast {
        Broadcast { origin: None, text: text.into() }
    }

    pub fn chat(origin: SessionId, text: String) -> Broadcast {
        Broadcast { origin: Some(origin), text: text.into() }
    }

    /// Whether this line should be delivered to the given session.
    pub fn is_for(&self, id: SessionId) -> bool {
        self.origin != Some(id)
    }
}

pub fn joined(name: &str) -> String {
    format!("{} has joined our chat...\n", name)
}

pub fn left(name: &str) -> String {
    format!("{} has left our chat...\n", name)
}

/// `[YYYY-MM-DD HH:MM:SS][name]: text`
pub fn chat_line<Tz>(when: &DateTime<Tz>, name: &str, text: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("[{}][{}]: {}\n", when.format(TIMESTAMP_FORMAT), name, text)
}
