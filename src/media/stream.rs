//! Timed event streams decoded from Standard MIDI Files.

use std::fs;
use std::path::Path;
use std::time::Duration;

use midly::{Fps, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

use crate::error::{RcmpError, RcmpResult};

/// Microseconds per quarter note until the file says otherwise (120 BPM)
pub const DEFAULT_TEMPO_USEC: u32 = 500_000;

/// A message that can be written to a MIDI output
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MidiEvent {
    NoteOn { channel: u8, key: u8, velocity: u8 },
    NoteOff { channel: u8, key: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    /// System reset (0xFF)
    Reset,
    /// Program change, pitch bend, aftertouch and SysEx, sent as-is
    Raw(Vec<u8>),
}

impl MidiEvent {
    pub fn note_off(channel: u8, key: u8) -> Self {
        MidiEvent::NoteOff {
            channel,
            key,
            velocity: 0,
        }
    }

    pub fn control_change(channel: u8, controller: u8, value: u8) -> Self {
        MidiEvent::ControlChange {
            channel,
            controller,
            value,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            MidiEvent::NoteOn {
                channel,
                key,
                velocity,
            } => vec![0x90 | (channel & 0x0F), key & 0x7F, velocity & 0x7F],
            MidiEvent::NoteOff {
                channel,
                key,
                velocity,
            } => vec![0x80 | (channel & 0x0F), key & 0x7F, velocity & 0x7F],
            MidiEvent::ControlChange {
                channel,
                controller,
                value,
            } => vec![0xB0 | (channel & 0x0F), controller & 0x7F, value & 0x7F],
            MidiEvent::Reset => vec![0xFF],
            MidiEvent::Raw(bytes) => bytes.clone(),
        }
    }

    /// The (channel, key) this event starts sounding
    pub fn starts_note(&self) -> Option<(u8, u8)> {
        match *self {
            MidiEvent::NoteOn {
                channel,
                key,
                velocity,
            } if velocity > 0 => Some((channel, key)),
            _ => None,
        }
    }

    /// The (channel, key) this event silences; a zero-velocity note-on counts
    pub fn ends_note(&self) -> Option<(u8, u8)> {
        match *self {
            MidiEvent::NoteOff { channel, key, .. } => Some((channel, key)),
            MidiEvent::NoteOn {
                channel,
                key,
                velocity: 0,
            } => Some((channel, key)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Metadata only, never sent to the output
    Meta,
    Sounding(MidiEvent),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedEvent {
    /// Time since the previous event
    pub delay: Duration,
    pub kind: EventKind,
}

impl TimedEvent {
    pub fn meta(delay: Duration) -> Self {
        TimedEvent {
            delay,
            kind: EventKind::Meta,
        }
    }

    pub fn sounding(delay: Duration, event: MidiEvent) -> Self {
        TimedEvent {
            delay,
            kind: EventKind::Sounding(event),
        }
    }

    pub fn is_meta(&self) -> bool {
        matches!(self.kind, EventKind::Meta)
    }
}

/// Ordered, replay-only events of one file. Built fresh for every play pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventStream {
    events: Vec<TimedEvent>,
}

enum Decoded {
    Tempo(u32),
    Meta,
    Sounding(MidiEvent),
}

impl EventStream {
    pub fn from_events(events: Vec<TimedEvent>) -> Self {
        EventStream { events }
    }

    /// Read and decode a MIDI file
    pub fn open<P: AsRef<Path>>(path: P) -> RcmpResult<Self> {
        let path = path.as_ref();
        let data = fs::read(path)
            .map_err(|e| RcmpError::InvalidMidi(format!("{}: {}", path.display(), e)))?;
        Self::parse(&data)
            .map_err(|e| RcmpError::InvalidMidi(format!("{}: {}", path.display(), e)))
    }

    /// Decode SMF bytes. All tracks are merged into one chronological stream.
    pub fn parse(data: &[u8]) -> RcmpResult<Self> {
        let smf = Smf::parse(data).map_err(|e| RcmpError::InvalidMidi(e.to_string()))?;

        let mut merged: Vec<(u64, usize, Decoded)> = Vec::new();
        for (track_index, track) in smf.tracks.iter().enumerate() {
            let mut tick = 0u64;
            for event in track.iter() {
                tick += u64::from(event.delta.as_int());
                merged.push((tick, track_index, decode(&event.kind)));
            }
        }
        // Stable, so simultaneous events keep their in-track order
        merged.sort_by_key(|(tick, track, _)| (*tick, *track));

        let mut tempo = DEFAULT_TEMPO_USEC;
        let mut last_tick = 0u64;
        let mut events = Vec::with_capacity(merged.len());
        for (tick, _, decoded) in merged {
            let delay = ticks_to_duration(tick - last_tick, smf.header.timing, tempo);
            last_tick = tick;
            match decoded {
                Decoded::Tempo(usec) => {
                    events.push(TimedEvent::meta(delay));
                    tempo = usec;
                }
                Decoded::Meta => events.push(TimedEvent::meta(delay)),
                Decoded::Sounding(msg) => events.push(TimedEvent::sounding(delay, msg)),
            }
        }
        Ok(EventStream { events })
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TimedEvent> {
        self.events.iter()
    }

    /// Sum of all event delays
    pub fn duration(&self) -> Duration {
        self.events.iter().map(|e| e.delay).sum()
    }
}

impl IntoIterator for EventStream {
    type Item = TimedEvent;
    type IntoIter = std::vec::IntoIter<TimedEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

impl<'a> IntoIterator for &'a EventStream {
    type Item = &'a TimedEvent;
    type IntoIter = std::slice::Iter<'a, TimedEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

fn decode(kind: &TrackEventKind) -> Decoded {
    match kind {
        TrackEventKind::Midi { channel, message } => {
            let ch = channel.as_int();
            let event = match *message {
                MidiMessage::NoteOn { key, vel } => MidiEvent::NoteOn {
                    channel: ch,
                    key: key.as_int(),
                    velocity: vel.as_int(),
                },
                MidiMessage::NoteOff { key, vel } => MidiEvent::NoteOff {
                    channel: ch,
                    key: key.as_int(),
                    velocity: vel.as_int(),
                },
                MidiMessage::Controller { controller, value } => {
                    MidiEvent::control_change(ch, controller.as_int(), value.as_int())
                }
                MidiMessage::Aftertouch { key, vel } => {
                    MidiEvent::Raw(vec![0xA0 | ch, key.as_int(), vel.as_int()])
                }
                MidiMessage::ProgramChange { program } => {
                    MidiEvent::Raw(vec![0xC0 | ch, program.as_int()])
                }
                MidiMessage::ChannelAftertouch { vel } => {
                    MidiEvent::Raw(vec![0xD0 | ch, vel.as_int()])
                }
                MidiMessage::PitchBend { bend } => {
                    let value = bend.0.as_int();
                    MidiEvent::Raw(vec![0xE0 | ch, (value & 0x7F) as u8, (value >> 7) as u8])
                }
            };
            Decoded::Sounding(event)
        }
        TrackEventKind::SysEx(data) => {
            let mut bytes = Vec::with_capacity(data.len() + 2);
            bytes.push(0xF0);
            bytes.extend_from_slice(data);
            if bytes.last() != Some(&0xF7) {
                bytes.push(0xF7);
            }
            Decoded::Sounding(MidiEvent::Raw(bytes))
        }
        TrackEventKind::Escape(_) => Decoded::Meta,
        TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => Decoded::Tempo(tempo.as_int()),
        TrackEventKind::Meta(_) => Decoded::Meta,
    }
}

fn ticks_to_duration(ticks: u64, timing: Timing, tempo_usec: u32) -> Duration {
    if ticks == 0 {
        return Duration::ZERO;
    }
    match timing {
        Timing::Metrical(ticks_per_q) => {
            let ticks_per_q = u128::from(ticks_per_q.as_int());
            if ticks_per_q == 0 {
                return Duration::ZERO;
            }
            let nanos = u128::from(ticks) * u128::from(tempo_usec) * 1000 / ticks_per_q;
            Duration::from_nanos(nanos.min(u128::from(u64::MAX)) as u64)
        }
        Timing::Timecode(fps, subframes) => {
            let frames_per_sec = match fps {
                Fps::Fps24 => 24.0,
                Fps::Fps25 => 25.0,
                Fps::Fps29 => 29.97,
                Fps::Fps30 => 30.0,
            };
            let ticks_per_sec = frames_per_sec * f64::from(subframes);
            if ticks_per_sec <= 0.0 {
                return Duration::ZERO;
            }
            Duration::from_secs_f64(ticks as f64 / ticks_per_sec)
        }
    }
}
