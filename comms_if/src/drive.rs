//! # Drive Command Protocol
//!
//! Commands are sent to the drive executable as short text datagrams. The first character of the
//! trimmed datagram is the command tag (case-insensitive), optionally followed by a comma and an
//! intensity percentage:
//!
//! | Datagram       | Command                                   | Reply    |
//! |----------------|-------------------------------------------|----------|
//! | `F`, `F,<pct>` | Drive forwards, default 70 %              | `ACK\n`  |
//! | `B`, `B,<pct>` | Drive backwards, default 60 %             | `ACK\n`  |
//! | `S`            | Stop both channels                        | `ACK\n`  |
//! | `T`            | Liveness probe, no actuator effect        | `OK\n`   |
//!
//! Anything else is dropped without a reply.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{fmt, num::IntErrorKind};
use serde::{Serialize, Deserialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Maximum length of a command datagram in bytes. Longer datagrams are rejected.
pub const MAX_DATAGRAM_LEN: usize = 128;

/// Intensity used for a forward command which doesn't specify one.
pub const DEFAULT_FORWARD_INTENSITY: Intensity = Intensity(70);

/// Intensity used for a backward command which doesn't specify one.
pub const DEFAULT_BACKWARD_INTENSITY: Intensity = Intensity(60);

/// Separator between the command tag and the intensity field.
const FIELD_SEPARATOR: char = ',';

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A drive intensity in percent, always within `[0, 100]`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Intensity(u8);

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A command recieved by the drive executable.
///
/// Forward and backward commands carry the intensity given in the datagram, or `None` if the
/// datagram didn't include a valid one. The command-specific default is applied by the executor,
/// see [`Command::resolved_intensity`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Drive both channels forwards.
    Forward(Option<Intensity>),

    /// Drive both channels backwards.
    Backward(Option<Intensity>),

    /// Stop both channels.
    Stop,

    /// Liveness probe. Resets the watchdog but doesn't move anything.
    Ping,
}

/// A reply sent by the drive executable to the sender of a valid command.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    /// Sent in response to forward, backward and stop commands
    Ack,

    /// Sent in response to a ping
    Ok,
}

/// Reasons a datagram couldn't be decoded into a [`Command`].
///
/// None of these are faults, the datagram is simply dropped.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Datagram is {0} bytes long, the maximum is {}", MAX_DATAGRAM_LEN)]
    Oversized(usize),

    #[error("Datagram is not valid UTF-8")]
    NotUtf8,

    #[error("Datagram contains no command")]
    Empty,

    #[error("Unrecognised command tag {0:?}")]
    UnknownTag(char),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Intensity {
    /// The maximum intensity, 100 %.
    pub const MAX: Intensity = Intensity(100);

    /// The minimum intensity, 0 %.
    pub const MIN: Intensity = Intensity(0);

    /// Create a new intensity from a percentage, clamping it into `[0, 100]`.
    pub fn new(percent: i64) -> Self {
        Self(percent.clamp(0, Self::MAX.0 as i64) as u8)
    }

    /// Get the intensity as a percentage.
    pub fn percent(&self) -> u8 {
        self.0
    }

    /// Parse an intensity field.
    ///
    /// Values which overflow an `i64` are clamped like any other out of range value. Anything that
    /// isn't an integer gives `None`.
    fn parse_field(field: &str) -> Option<Self> {
        match field.trim().parse::<i64>() {
            Ok(p) => Some(Self::new(p)),
            Err(e) => match e.kind() {
                IntErrorKind::PosOverflow => Some(Self::MAX),
                IntErrorKind::NegOverflow => Some(Self::MIN),
                _ => None
            }
        }
    }
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} %", self.0)
    }
}

impl Command {

    /// Decode a command from a recieved datagram.
    ///
    /// A missing or malformed intensity field never fails the decode, the intensity is just left
    /// unset.
    pub fn decode(datagram: &[u8]) -> Result<Self, DecodeError> {
        if datagram.len() > MAX_DATAGRAM_LEN {
            return Err(DecodeError::Oversized(datagram.len()))
        }

        let msg = std::str::from_utf8(datagram)
            .map_err(|_| DecodeError::NotUtf8)?
            .trim();

        let tag = match msg.chars().next() {
            Some(c) => c.to_ascii_uppercase(),
            None => return Err(DecodeError::Empty)
        };

        // The intensity is the field following the first separator, any later fields are ignored
        let intensity = msg
            .split(FIELD_SEPARATOR)
            .nth(1)
            .and_then(Intensity::parse_field);

        match tag {
            'F' => Ok(Command::Forward(intensity)),
            'B' => Ok(Command::Backward(intensity)),
            'S' => Ok(Command::Stop),
            'T' => Ok(Command::Ping),
            c => Err(DecodeError::UnknownTag(c))
        }
    }

    /// Encode the command into its canonical datagram text.
    pub fn encode(&self) -> String {
        match self {
            Command::Forward(Some(i)) => format!("F{}{}", FIELD_SEPARATOR, i.percent()),
            Command::Forward(None) => String::from("F"),
            Command::Backward(Some(i)) => format!("B{}{}", FIELD_SEPARATOR, i.percent()),
            Command::Backward(None) => String::from("B"),
            Command::Stop => String::from("S"),
            Command::Ping => String::from("T"),
        }
    }

    /// The intensity this command should be executed at, applying the default for forward and
    /// backward commands that didn't specify one.
    ///
    /// Returns `None` for commands which don't drive the actuators.
    pub fn resolved_intensity(&self) -> Option<Intensity> {
        match self {
            Command::Forward(i) => Some(i.unwrap_or(DEFAULT_FORWARD_INTENSITY)),
            Command::Backward(i) => Some(i.unwrap_or(DEFAULT_BACKWARD_INTENSITY)),
            Command::Stop | Command::Ping => None
        }
    }

    /// The reply that must be sent to the sender of this command.
    pub fn reply(&self) -> Reply {
        match self {
            Command::Ping => Reply::Ok,
            _ => Reply::Ack
        }
    }
}

impl Reply {
    /// The bytes sent on the wire for this reply.
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Reply::Ack => b"ACK\n",
            Reply::Ok => b"OK\n",
        }
    }

    /// Parse a reply datagram, returning `None` if it isn't a known reply.
    pub fn parse(datagram: &[u8]) -> Option<Self> {
        match std::str::from_utf8(datagram).ok()?.trim() {
            "ACK" => Some(Reply::Ack),
            "OK" => Some(Reply::Ok),
            _ => None
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
