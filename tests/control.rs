mod common;

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rcmp::media::{self, MediaCatalog, SharedCatalog};
use rcmp::{
    Ack, ControlSurface, MidiEvent, OscServer, PassOutcome, PlaybackEngine, TransportState,
};
use rosc::{encoder, OscMessage, OscPacket, OscType};
use tempfile::TempDir;

use common::{note_off, note_on, off, on, poll_until, write_song, zero_timing, RecordingSink};

const WAIT: Duration = Duration::from_secs(2);

struct Remote {
    socket: UdpSocket,
    server: SocketAddr,
}

impl Remote {
    fn send(&self, addr: &str, args: Vec<OscType>) {
        let packet = OscPacket::Message(OscMessage {
            addr: addr.to_string(),
            args,
        });
        let data = encoder::encode(&packet).unwrap();
        self.socket.send_to(&data, self.server).unwrap();
    }

    fn send_str(&self, addr: &str, arg: &str) {
        self.send(addr, vec![OscType::String(arg.to_string())]);
    }
}

fn start(
    transport: &Arc<TransportState>,
    catalog: &SharedCatalog,
) -> (Remote, JoinHandle<()>) {
    let surface = ControlSurface::new(
        "/rcmp",
        Arc::clone(transport),
        Arc::clone(catalog),
        "recorder",
    );
    let server = OscServer::bind(
        "127.0.0.1:0".parse().unwrap(),
        Duration::from_millis(10),
        surface,
    )
    .unwrap();
    let addr = server.local_addr().unwrap();
    let handle = thread::spawn(move || server.run());
    let remote = Remote {
        socket: UdpSocket::bind("127.0.0.1:0").unwrap(),
        server: addr,
    };
    (remote, handle)
}

fn datagram(addr: &str, args: Vec<OscType>) -> Vec<u8> {
    encoder::encode(&OscPacket::Message(OscMessage {
        addr: addr.to_string(),
        args,
    }))
    .unwrap()
}

fn song_dir(names: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for name in names {
        write_song(dir.path(), name, &[(0, note_on(0, 60, 100)), (1, note_off(0, 60))]);
    }
    dir
}

fn selected(catalog: &SharedCatalog) -> Option<String> {
    media::lock(catalog).selected().map(|i| i.alias().to_string())
}

#[test]
fn transport_commands_over_udp() {
    let transport = Arc::new(TransportState::new(false));
    let catalog = media::shared(MediaCatalog::new());
    let (remote, handle) = start(&transport, &catalog);

    remote.send("/rcmp/play", vec![]);
    assert!(poll_until(WAIT, || transport.is_playing()));

    remote.send("/rcmp/stop", vec![]);
    assert!(poll_until(WAIT, || !transport.is_playing()));

    remote.send("/rcmp/exit", vec![]);
    assert!(poll_until(WAIT, || transport.is_exiting()));
    handle.join().unwrap();
    assert!(!transport.is_playing());
}

#[test]
fn scan_and_select_over_udp() {
    let dir = TempDir::new().unwrap();
    write_song(dir.path(), "b.mid", &[(0, note_on(0, 60, 100))]);
    write_song(dir.path(), "a.mid", &[(0, note_on(0, 60, 100))]);
    std::fs::write(dir.path().join("readme.txt"), "hello").unwrap();

    let transport = Arc::new(TransportState::new(false));
    let catalog = media::shared(MediaCatalog::new());
    let (remote, handle) = start(&transport, &catalog);

    remote.send_str("/rcmp/scan", dir.path().to_str().unwrap());
    assert!(poll_until(WAIT, || media::lock(&catalog).len() == 2));
    assert_eq!(media::lock(&catalog).aliases(), vec!["a", "b"]);
    assert_eq!(selected(&catalog).as_deref(), Some("a"));

    remote.send_str("/rcmp/select", "b");
    assert!(poll_until(WAIT, || selected(&catalog).as_deref() == Some("b")));

    remote.send_str("/rcmp/select", "0");
    assert!(poll_until(WAIT, || selected(&catalog).as_deref() == Some("a")));

    // Out of range and unknown keys leave the selection alone
    remote.send_str("/rcmp/select", "5");
    remote.send_str("/rcmp/select", "missing");
    remote.send("/rcmp/select", vec![OscType::Int(1)]);
    remote.send("/rcmp/dance", vec![]);
    remote.send("/rcmp/play", vec![]);
    assert!(poll_until(WAIT, || transport.is_playing()));
    assert_eq!(selected(&catalog).as_deref(), Some("a"));

    remote.send("/rcmp/exit", vec![]);
    handle.join().unwrap();
}

#[test]
fn failed_scan_empties_the_catalog() {
    let dir = song_dir(&["one.mid", "two.mid"]);
    let transport = Arc::new(TransportState::new(false));
    let mut initial = MediaCatalog::new();
    assert!(initial.scan(dir.path()));
    let catalog = media::shared(initial);
    let (remote, handle) = start(&transport, &catalog);

    remote.send_str("/rcmp/scan", "/nonexistent/rcmp/songs");
    assert!(poll_until(WAIT, || media::lock(&catalog).is_empty()));
    assert!(selected(&catalog).is_none());

    remote.send("/rcmp/exit", vec![]);
    handle.join().unwrap();
}

#[test]
fn remote_play_stop_and_exit_drive_the_engine() {
    let dir = TempDir::new().unwrap();
    write_song(
        dir.path(),
        "long.mid",
        &[(0, note_on(2, 70, 100)), (10_000, note_off(2, 70))],
    );
    let mut initial = MediaCatalog::new();
    assert!(initial.scan(dir.path()));
    let catalog = media::shared(initial);
    let transport = Arc::new(TransportState::new(false));
    let (remote, control) = start(&transport, &catalog);

    let sink = RecordingSink::new();
    let mut engine = PlaybackEngine::new(
        Arc::clone(&transport),
        Arc::clone(&catalog),
        Some(sink.boxed()),
    )
    .with_timing(zero_timing());
    let engine = thread::spawn(move || {
        engine.run();
        engine.state()
    });

    remote.send("/rcmp/play", vec![]);
    assert!(sink.wait_for(WAIT, |e| e.len() == 1));

    remote.send("/rcmp/stop", vec![]);
    assert!(sink.wait_for(WAIT, |e| e.len() == 2));
    assert_eq!(sink.events(), vec![on(2, 70, 100), off(2, 70)]);

    remote.send("/rcmp/play", vec![]);
    assert!(sink.wait_for(WAIT, |e| e.len() == 3));

    remote.send("/rcmp/exit", vec![]);
    assert_eq!(engine.join().unwrap(), rcmp::EngineState::Exiting);
    control.join().unwrap();
    let events = sink.events();
    assert_eq!(&events[2..4], &[on(2, 70, 100), off(2, 70)]);
    assert_eq!(events[4], MidiEvent::Reset);
    assert_eq!(events.iter().filter(|e| **e == MidiEvent::Reset).count(), 1);
}

#[test]
fn pass_outcome_is_nothing_to_play_after_remote_clear() {
    let dir = song_dir(&["only.mid"]);
    let transport = Arc::new(TransportState::new(false));
    let catalog = media::shared(MediaCatalog::new());
    let (remote, handle) = start(&transport, &catalog);

    remote.send_str("/rcmp/scan", dir.path().join("missing").to_str().unwrap());
    remote.send("/rcmp/play", vec![]);
    assert!(poll_until(WAIT, || transport.is_playing()));

    let sink = RecordingSink::new();
    let mut engine =
        PlaybackEngine::new(Arc::clone(&transport), Arc::clone(&catalog), Some(sink.boxed()));
    assert_eq!(engine.play_pass(), PassOutcome::NothingToPlay);
    assert!(!transport.is_playing());
    assert_eq!(sink.len(), 0);

    remote.send("/rcmp/exit", vec![]);
    handle.join().unwrap();
}

#[test]
fn acknowledgements_carry_the_marked_listing() {
    let dir = song_dir(&["a.mid", "b.mid"]);
    let transport = Arc::new(TransportState::new(false));
    let catalog = media::shared(MediaCatalog::new());
    let surface = ControlSurface::new("/rcmp", transport, Arc::clone(&catalog), "recorder");
    let server = OscServer::bind(
        "127.0.0.1:0".parse().unwrap(),
        Duration::from_millis(10),
        surface,
    )
    .unwrap();
    let from: SocketAddr = "127.0.0.1:9".parse().unwrap();
    let path = dir.path().to_str().unwrap().to_string();

    let acks = server.handle_datagram(
        &datagram("/rcmp/scan", vec![OscType::String(path.clone())]),
        from,
    );
    assert_eq!(acks.len(), 1);
    let text = acks[0].text();
    assert!(!acks[0].is_error());
    assert!(text.starts_with(&format!("Scanning directory '{}'", path)), "{}", text);
    assert!(text.contains("Media list"));
    assert!(text.contains("[ 0] * a "), "{}", text);
    assert!(text.contains("[ 1]   b "), "{}", text);

    let acks = server.handle_datagram(
        &datagram("/rcmp/select", vec![OscType::String("1".into())]),
        from,
    );
    let text = acks[0].text();
    assert!(text.starts_with("Select '1'"), "{}", text);
    assert!(text.contains("[ 0]   a "), "{}", text);
    assert!(text.contains("[ 1] * b "), "{}", text);

    let acks = server.handle_datagram(&datagram("/rcmp/list", vec![]), from);
    assert_eq!(acks, vec![Ack::Ok(media::lock(&catalog).listing())]);
    assert!(acks[0].text().contains("[ 1] * b "));

    let acks = server.handle_datagram(
        &datagram("/rcmp/select", vec![OscType::String("5".into())]),
        from,
    );
    assert_eq!(acks, vec![Ack::Error("Invalid media name: 5".to_string())]);

    let acks = server.handle_datagram(
        &datagram("/rcmp/scan", vec![OscType::String("/nonexistent/rcmp".into())]),
        from,
    );
    assert_eq!(
        acks,
        vec![Ack::Error(
            "Can not scan directory: '/nonexistent/rcmp'".to_string()
        )]
    );
}
