//! MIDI output sinks and device selection.

use std::fmt;

use log::{info, warn};
use midir::{MidiOutput, MidiOutputConnection};

use crate::error::{RcmpError, RcmpResult};
use crate::media::MidiEvent;

const CLIENT_NAME: &str = "rcmp";

/// Anything the playback engine can write MIDI events to
pub trait OutputSink: Send {
    fn name(&self) -> &str;
    fn send(&mut self, event: &MidiEvent) -> RcmpResult<()>;
}

/// How the user picked an output device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelector {
    ByIndex(usize),
    ByName(String),
}

impl DeviceSelector {
    /// All-digit strings select by position, anything else by exact name
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        match value.parse::<usize>() {
            Ok(index) => DeviceSelector::ByIndex(index),
            Err(_) => DeviceSelector::ByName(value.to_string()),
        }
    }

    pub fn resolve(&self, names: &[String]) -> Option<usize> {
        match self {
            DeviceSelector::ByIndex(index) => (*index < names.len()).then_some(*index),
            DeviceSelector::ByName(name) => names.iter().position(|n| n == name),
        }
    }

    /// Resolve, falling back to the first device when the selection does not match
    pub fn resolve_or_default(&self, names: &[String]) -> RcmpResult<usize> {
        if names.is_empty() {
            return Err(RcmpError::NoOutput("no MIDI outputs available".to_string()));
        }
        match self.resolve(names) {
            Some(index) => Ok(index),
            None => {
                warn!("Invalid MIDI output {}, using default 0.", self);
                Ok(0)
            }
        }
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSelector::ByIndex(index) => write!(f, "number: {}", index),
            DeviceSelector::ByName(name) => write!(f, "name: '{}'", name),
        }
    }
}

/// Names of the available MIDI output ports, in enumeration order
pub fn list_output_names() -> RcmpResult<Vec<String>> {
    let midi_out =
        MidiOutput::new(CLIENT_NAME).map_err(|e| RcmpError::NoOutput(e.to_string()))?;
    Ok(midi_out
        .ports()
        .iter()
        .map(|port| {
            midi_out
                .port_name(port)
                .unwrap_or_else(|_| "<Unknown>".to_string())
        })
        .collect())
}

/// A connected hardware or virtual MIDI port
pub struct MidiOutputSink {
    name: String,
    conn: MidiOutputConnection,
}

impl MidiOutputSink {
    pub fn open(selector: &DeviceSelector) -> RcmpResult<Self> {
        let midi_out =
            MidiOutput::new(CLIENT_NAME).map_err(|e| RcmpError::NoOutput(e.to_string()))?;
        let ports = midi_out.ports();
        let names: Vec<String> = ports
            .iter()
            .map(|port| {
                midi_out
                    .port_name(port)
                    .unwrap_or_else(|_| "<Unknown>".to_string())
            })
            .collect();

        let index = selector.resolve_or_default(&names)?;
        let port = ports
            .get(index)
            .ok_or_else(|| RcmpError::NoOutput("missing MIDI output port".to_string()))?;
        let name = names[index].clone();
        let conn = midi_out
            .connect(port, CLIENT_NAME)
            .map_err(|e| RcmpError::NoOutput(e.to_string()))?;
        info!("Connected to MIDI port: {}", name);
        Ok(MidiOutputSink { name, conn })
    }
}

impl OutputSink for MidiOutputSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, event: &MidiEvent) -> RcmpResult<()> {
        self.conn
            .send(&event.to_bytes())
            .map_err(|e| RcmpError::Output(e.to_string()))
    }
}

impl fmt::Debug for MidiOutputSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MidiOutputSink")
            .field("name", &self.name)
            .finish()
    }
}
