//! rcmp: a terminal MIDI file player under remote OSC control.
//!
//! Two loops share one [`transport::TransportState`]: the
//! [`engine::PlaybackEngine`] streams the selected file to a MIDI output, and
//! the [`osc::ControlSurface`] turns incoming OSC commands into transport and
//! catalog changes. [`app::App`] wires them together.

pub mod app;
pub mod cli;
pub mod config;
pub mod docs;
pub mod engine;
pub mod error;
pub mod media;
pub mod osc;
pub mod output;
pub mod transport;

pub use app::App;
pub use config::PlayerConfig;
pub use engine::{EngineState, PassOutcome, PlaybackEngine};
pub use error::{RcmpError, RcmpResult};
pub use media::{EventStream, MediaCatalog, MediaItem, MidiEvent};
pub use osc::{Ack, Command, ControlSurface, OscServer};
pub use output::{DeviceSelector, MidiOutputSink, OutputSink};
pub use transport::{TransportFlags, TransportState};
