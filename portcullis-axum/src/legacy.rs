//! Colon-delimited throttle messages understood by older login clients.
//!
//! `LOCKED:<seconds>:<message>` and `ATTEMPTS:<attempts_left>:<message>`.
//! The message part may itself contain colons.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegacyMessage {
    Locked { seconds_remaining: u64, message: String },
    Attempts { attempts_left: u32, message: String },
}

impl fmt::Display for LegacyMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegacyMessage::Locked {
                seconds_remaining,
                message,
            } => write!(f, "LOCKED:{seconds_remaining}:{message}"),
            LegacyMessage::Attempts {
                attempts_left,
                message,
            } => write!(f, "ATTEMPTS:{attempts_left}:{message}"),
        }
    }
}
