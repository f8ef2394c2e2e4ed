//! Error type shared by the catalog, engine, output and control surface.

use std::error::Error;
use std::fmt;

pub type RcmpResult<T> = Result<T, RcmpError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RcmpError {
    Io(String),
    DirectoryScan(String),
    InvalidMidi(String),
    InvalidSelection(String),
    NothingSelected,
    BadArgument(String),
    NoOutput(String),
    Output(String),
    Osc(String),
}

impl fmt::Display for RcmpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RcmpError::Io(msg) => write!(f, "I/O error: {}", msg),
            RcmpError::DirectoryScan(dir) => write!(f, "Can not scan directory: '{}'", dir),
            RcmpError::InvalidMidi(msg) => write!(f, "Not a readable MIDI file: {}", msg),
            RcmpError::InvalidSelection(key) => write!(f, "Invalid media name: {}", key),
            RcmpError::NothingSelected => write!(f, "No media selected"),
            RcmpError::BadArgument(msg) => write!(f, "Bad argument: {}", msg),
            RcmpError::NoOutput(msg) => write!(f, "Can not set MIDI output: {}", msg),
            RcmpError::Output(msg) => write!(f, "MIDI output failed: {}", msg),
            RcmpError::Osc(msg) => write!(f, "OSC failed: {}", msg),
        }
    }
}

impl Error for RcmpError {}

impl From<std::io::Error> for RcmpError {
    fn from(e: std::io::Error) -> Self {
        RcmpError::Io(e.to_string())
    }
}
