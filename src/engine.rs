//! Playback engine: streams the selected file to the output sink.
//!
//! The engine only reacts to the shared [`TransportState`]; the control surface
//! never calls into it. Every pass ends by releasing the notes it left sounding,
//! and a pass that reached the end of the file is followed by a full device
//! reset (or by exiting, when auto-exit is on). Leaving the main cycle always
//! resets the device once more so no controller stays latched after exit.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread::sleep;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::config::PlayerConfig;
use crate::media::{self, EventKind, EventStream, MidiEvent, SharedCatalog};
use crate::output::OutputSink;
use crate::transport::TransportState;

pub const CHANNELS: u8 = 16;
pub const KEYS: u8 = 128;
pub const CC_MODULATION: u8 = 1;
pub const CC_SUSTAIN: u8 = 64;
pub const CC_ALL_NOTES_OFF: u8 = 123;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Playing,
    Exiting,
}

/// How a play pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// No selection, unreadable file, or no output
    NothingToPlay,
    /// Reached the end of the stream
    Finished,
    /// Stopped or exited mid-stream
    Cancelled,
}

/// (channel, key) pairs switched on and not yet switched off
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoundingNotes {
    notes: BTreeSet<(u8, u8)>,
}

impl SoundingNotes {
    pub fn track(&mut self, event: &MidiEvent) {
        if let Some(note) = event.starts_note() {
            self.notes.insert(note);
        } else if let Some(note) = event.ends_note() {
            self.notes.remove(&note);
        }
    }

    pub fn contains(&self, channel: u8, key: u8) -> bool {
        self.notes.contains(&(channel, key))
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn clear(&mut self) {
        self.notes.clear();
    }

    pub fn drain(&mut self) -> Vec<(u8, u8)> {
        std::mem::take(&mut self.notes).into_iter().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineTiming {
    /// Pause between note-offs when releasing stuck notes
    pub note_off_spacing: Duration,
    /// Pause after every 10 keys of a full reset
    pub reset_throttle: Duration,
}

impl Default for EngineTiming {
    fn default() -> Self {
        EngineTiming {
            note_off_spacing: Duration::from_millis(1),
            reset_throttle: Duration::from_millis(1),
        }
    }
}

impl From<&PlayerConfig> for EngineTiming {
    fn from(config: &PlayerConfig) -> Self {
        EngineTiming {
            note_off_spacing: config.note_off_spacing(),
            reset_throttle: config.reset_throttle(),
        }
    }
}

pub struct PlaybackEngine {
    transport: Arc<TransportState>,
    catalog: SharedCatalog,
    sink: Option<Box<dyn OutputSink>>,
    sounding: SoundingNotes,
    timing: EngineTiming,
    state: EngineState,
}

impl PlaybackEngine {
    pub fn new(
        transport: Arc<TransportState>,
        catalog: SharedCatalog,
        sink: Option<Box<dyn OutputSink>>,
    ) -> Self {
        PlaybackEngine {
            transport,
            catalog,
            sink,
            sounding: SoundingNotes::default(),
            timing: EngineTiming::default(),
            state: EngineState::Stopped,
        }
    }

    pub fn with_timing(mut self, timing: EngineTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn sounding_notes(&self) -> &SoundingNotes {
        &self.sounding
    }

    /// Give the sink back, e.g. to close the port after the loop ends
    pub fn into_sink(self) -> Option<Box<dyn OutputSink>> {
        self.sink
    }

    /// Main cycle. Blocks while stopped, returns once `exiting` is observed
    /// and the device has been reset.
    pub fn run(&mut self) {
        info!("Playback engine started");
        loop {
            let flags = self.transport.wait_for_play();
            if flags.exiting {
                break;
            }
            self.play_pass();
        }
        self.state = EngineState::Exiting;
        self.release_sounding_notes();
        self.reset_device();
        info!("Playback engine finished");
    }

    /// Play the selected item once, then clean up after it.
    pub fn play_pass(&mut self) -> PassOutcome {
        let Some(stream) = self.load_stream() else {
            self.transport.stop();
            self.state = self.idle_state();
            return PassOutcome::NothingToPlay;
        };

        self.state = EngineState::Playing;
        let outcome = self.stream_events(stream);

        self.transport.stop();
        self.release_sounding_notes();
        if outcome == PassOutcome::Finished {
            if self.transport.auto_exit() {
                info!("End of file, exiting");
                self.transport.exit();
            } else {
                self.reset_device();
            }
        }
        self.state = self.idle_state();
        outcome
    }

    fn idle_state(&self) -> EngineState {
        if self.transport.is_exiting() {
            EngineState::Exiting
        } else {
            EngineState::Stopped
        }
    }

    fn load_stream(&self) -> Option<EventStream> {
        if self.sink.is_none() {
            warn!("No MIDI output, nothing to play");
            return None;
        }
        let catalog = media::lock(&self.catalog);
        let stream = catalog.current_event_stream()?;
        if let Some(item) = catalog.selected() {
            info!("Playing '{}' ({} events)", item.alias(), stream.len());
        }
        Some(stream)
    }

    fn stream_events(&mut self, stream: EventStream) -> PassOutcome {
        // Deadlines are absolute so dispatch time does not accumulate as drift
        let mut deadline = Instant::now();
        for event in stream {
            deadline += event.delay;
            if !self.transport.wait_until(deadline) {
                debug!("Pass cancelled while waiting");
                return PassOutcome::Cancelled;
            }
            if let EventKind::Sounding(msg) = &event.kind {
                self.dispatch(msg);
            }
            if !self.transport.snapshot().is_active() {
                debug!("Pass cancelled after dispatch");
                return PassOutcome::Cancelled;
            }
        }
        PassOutcome::Finished
    }

    fn dispatch(&mut self, event: &MidiEvent) {
        self.send(event);
        self.sounding.track(event);
    }

    fn send(&mut self, event: &MidiEvent) {
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.send(event) {
                warn!("{}", e);
            }
        }
    }

    /// Note-off for every note this pass left on
    pub fn release_sounding_notes(&mut self) {
        let notes = self.sounding.drain();
        if notes.is_empty() {
            return;
        }
        debug!("Releasing {} sounding notes", notes.len());
        for (channel, key) in notes {
            self.send(&MidiEvent::note_off(channel, key));
            pause(self.timing.note_off_spacing);
        }
    }

    /// System reset, then controllers and every key off on all channels
    pub fn reset_device(&mut self) {
        info!("MIDI reset");
        self.send(&MidiEvent::Reset);
        for channel in 0..CHANNELS {
            self.send(&MidiEvent::control_change(channel, CC_MODULATION, 0));
            self.send(&MidiEvent::control_change(channel, CC_SUSTAIN, 0));
            self.send(&MidiEvent::control_change(channel, CC_ALL_NOTES_OFF, 0));
            for key in 0..KEYS {
                self.send(&MidiEvent::note_off(channel, key));
                if key % 10 == 0 {
                    pause(self.timing.reset_throttle);
                }
            }
        }
        self.sounding.clear();
    }
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        sleep(duration);
    }
}
