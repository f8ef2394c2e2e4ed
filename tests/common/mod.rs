#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::sleep;
use std::time::{Duration, Instant};

use rcmp::engine::EngineTiming;
use rcmp::{MidiEvent, OutputSink, RcmpResult};

/// Output sink that records every event with the time it was sent
#[derive(Clone, Default)]
pub struct RecordingSink {
    log: Arc<Mutex<Vec<(Instant, MidiEvent)>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn boxed(&self) -> Box<dyn OutputSink> {
        Box::new(self.clone())
    }

    pub fn sent(&self) -> Vec<(Instant, MidiEvent)> {
        self.log.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<MidiEvent> {
        self.sent().into_iter().map(|(_, e)| e).collect()
    }

    pub fn len(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    /// Poll until `cond` holds for the recorded events or `timeout` passes
    pub fn wait_for<F: Fn(&[MidiEvent]) -> bool>(&self, timeout: Duration, cond: F) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if cond(&self.events()) {
                return true;
            }
            sleep(Duration::from_millis(2));
        }
        cond(&self.events())
    }
}

impl OutputSink for RecordingSink {
    fn name(&self) -> &str {
        "recorder"
    }

    fn send(&mut self, event: &MidiEvent) -> RcmpResult<()> {
        self.log.lock().unwrap().push((Instant::now(), event.clone()));
        Ok(())
    }
}

pub fn zero_timing() -> EngineTiming {
    EngineTiming {
        note_off_spacing: Duration::ZERO,
        reset_throttle: Duration::ZERO,
    }
}

pub fn poll_until<F: Fn() -> bool>(timeout: Duration, cond: F) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        sleep(Duration::from_millis(2));
    }
    cond()
}

pub fn note_on(channel: u8, key: u8, velocity: u8) -> Vec<u8> {
    vec![0x90 | channel, key, velocity]
}

pub fn note_off(channel: u8, key: u8) -> Vec<u8> {
    vec![0x80 | channel, key, 0]
}

pub fn on(channel: u8, key: u8, velocity: u8) -> MidiEvent {
    MidiEvent::NoteOn {
        channel,
        key,
        velocity,
    }
}

pub fn off(channel: u8, key: u8) -> MidiEvent {
    MidiEvent::note_off(channel, key)
}

fn vlq(mut value: u32) -> Vec<u8> {
    let mut out = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        out.insert(0, ((value & 0x7F) as u8) | 0x80);
        value >>= 7;
    }
    out
}

/// Type-0 SMF where one tick is one millisecond (96 ticks per quarter at 96000 usec)
pub fn smf_ms(events: &[(u32, Vec<u8>)]) -> Vec<u8> {
    let mut body = vec![0x00, 0xFF, 0x51, 0x03, 0x01, 0x77, 0x00];
    for (delta, bytes) in events {
        body.extend(vlq(*delta));
        body.extend_from_slice(bytes);
    }
    body.extend([0x00, 0xFF, 0x2F, 0x00]);

    let mut data = b"MThd".to_vec();
    data.extend(6u32.to_be_bytes());
    data.extend(0u16.to_be_bytes());
    data.extend(1u16.to_be_bytes());
    data.extend(96u16.to_be_bytes());
    data.extend(b"MTrk");
    data.extend((body.len() as u32).to_be_bytes());
    data.extend(body);
    data
}

pub fn write_song(dir: &Path, name: &str, events: &[(u32, Vec<u8>)]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, smf_ms(events)).unwrap();
    path
}
