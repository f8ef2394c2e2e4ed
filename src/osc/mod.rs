//! Remote control surface: maps `<prefix>/<command>` OSC messages onto the
//! transport flags and the media catalog.
//!
//! Handlers never touch the output device. They only flip transport flags or
//! edit the catalog, and answer with a status line.

pub mod server;

use std::collections::HashMap;
use std::fmt;
use std::io::{stdout, IsTerminal, Write};
use std::sync::Arc;

use ansi_term::Colour::Red;
use log::{debug, info};
use rosc::{OscMessage, OscType};

use crate::docs;
use crate::error::{RcmpError, RcmpResult};
use crate::media::{self, SharedCatalog};
use crate::transport::TransportState;

pub use server::OscServer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Exit,
    Play,
    Stop,
    List,
    Info,
    Select,
    Scan,
    Help,
}

impl Command {
    pub const ALL: [Command; 8] = [
        Command::Exit,
        Command::Play,
        Command::Stop,
        Command::List,
        Command::Info,
        Command::Select,
        Command::Scan,
        Command::Help,
    ];

    /// Path suffix of the command
    pub fn name(self) -> &'static str {
        match self {
            Command::Exit => "exit",
            Command::Play => "play",
            Command::Stop => "stop",
            Command::List => "list",
            Command::Info => "info",
            Command::Select => "select",
            Command::Scan => "scan",
            Command::Help => "help",
        }
    }
}

/// Status line produced by a handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    Ok(String),
    Error(String),
}

impl Ack {
    pub fn text(&self) -> &str {
        match self {
            Ack::Ok(text) | Ack::Error(text) => text,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Ack::Error(_))
    }
}

impl fmt::Display for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ack::Ok(text) => write!(f, "{}", text),
            Ack::Error(text) => write!(f, "ERROR: {}", text),
        }
    }
}

pub struct ControlSurface {
    prefix: String,
    routes: HashMap<String, Command>,
    transport: Arc<TransportState>,
    catalog: SharedCatalog,
    output_name: String,
}

impl ControlSurface {
    pub fn new<S: Into<String>>(
        prefix: &str,
        transport: Arc<TransportState>,
        catalog: SharedCatalog,
        output_name: S,
    ) -> Self {
        let prefix = crate::config::normalize_prefix(prefix);
        let routes = Command::ALL
            .iter()
            .map(|cmd| (format!("{}/{}", prefix, cmd.name()), *cmd))
            .collect();
        ControlSurface {
            prefix,
            routes,
            transport,
            catalog,
            output_name: output_name.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn transport(&self) -> &Arc<TransportState> {
        &self.transport
    }

    /// Command bound to an OSC address, if any
    pub fn route(&self, addr: &str) -> Option<Command> {
        self.routes.get(addr).copied()
    }

    /// Handle one OSC message. Unknown addresses yield None and change nothing.
    pub fn handle_message(&self, msg: &OscMessage) -> Option<Ack> {
        let command = self.route(&msg.addr)?;
        debug!("OSC {} {:?}", msg.addr, msg.args);
        Some(self.execute(command, &msg.args))
    }

    pub fn execute(&self, command: Command, args: &[OscType]) -> Ack {
        let result = match command {
            Command::Exit => Ok(self.exit()),
            Command::Play => Ok(self.play()),
            Command::Stop => Ok(self.stop()),
            Command::List => Ok(media::lock(&self.catalog).listing()),
            Command::Info => Ok(self.info()),
            Command::Select => self
                .string_argument(command, args)
                .and_then(|key| self.select(key)),
            Command::Scan => self
                .string_argument(command, args)
                .and_then(|dir| self.scan(dir)),
            Command::Help => Ok(docs::osc_commands(&self.prefix)),
        };
        match result {
            Ok(text) => Ack::Ok(text),
            Err(e) => Ack::Error(e.to_string()),
        }
    }

    fn string_argument<'a>(&self, command: Command, args: &'a [OscType]) -> RcmpResult<&'a str> {
        match args {
            [OscType::String(value)] => Ok(value.as_str()),
            _ => Err(RcmpError::BadArgument(format!(
                "{}/{} expects one string argument",
                self.prefix,
                command.name()
            ))),
        }
    }

    fn exit(&self) -> String {
        self.transport.exit();
        "Exit".to_string()
    }

    fn play(&self) -> String {
        self.transport.play();
        "Play".to_string()
    }

    fn stop(&self) -> String {
        self.transport.stop();
        "Stop".to_string()
    }

    fn info(&self) -> String {
        let catalog = media::lock(&self.catalog);
        format!(
            "Info\nMIDI Output: '{}'\n{}",
            self.output_name,
            catalog.selected_file_info()
        )
    }

    fn select(&self, key: &str) -> RcmpResult<String> {
        let mut catalog = media::lock(&self.catalog);
        let alias = catalog.try_select(key)?.alias().to_string();
        info!("Selected '{}'", alias);
        Ok(format!("Select '{}'\n{}", key, catalog.listing()))
    }

    fn scan(&self, directory: &str) -> RcmpResult<String> {
        // Held for the whole rescan so the engine sees the old list or the new one
        let mut catalog = media::lock(&self.catalog);
        catalog.clear();
        let count = catalog.try_scan(directory)?;
        info!("Scanned {} media items", count);
        Ok(format!(
            "Scanning directory '{}'\n{}",
            directory,
            catalog.listing()
        ))
    }

    /// Print an acknowledgement followed by the prompt
    pub fn report(&self, ack: &Ack) {
        if ack.is_error() && stdout().is_terminal() {
            println!("{}", Red.paint(ack.to_string()));
        } else {
            println!("{}", ack);
        }
        print_prompt(&self.prefix);
    }
}

pub fn print_prompt(prefix: &str) {
    print!("{} : ", prefix);
    let _ = stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaCatalog;
    use crate::transport::TransportFlags;

    fn surface() -> ControlSurface {
        ControlSurface::new(
            "/rcmp",
            Arc::new(TransportState::new(false)),
            media::shared(MediaCatalog::new()),
            "Test Output",
        )
    }

    #[test]
    fn routes_cover_the_vocabulary() {
        let surface = surface();
        for cmd in Command::ALL {
            assert_eq!(surface.route(&format!("/rcmp/{}", cmd.name())), Some(cmd));
        }
        assert_eq!(surface.route("/rcmp/pause"), None);
        assert_eq!(surface.route("/other/play"), None);
        assert_eq!(surface.route("/rcmp/play/extra"), None);
    }

    #[test]
    fn unknown_address_is_ignored() {
        let surface = surface();
        let msg = OscMessage {
            addr: "/rcmp/dance".to_string(),
            args: vec![],
        };
        assert!(surface.handle_message(&msg).is_none());
        assert_eq!(surface.transport().snapshot(), TransportFlags::default());
    }

    #[test]
    fn transport_commands_flip_flags() {
        let surface = surface();
        assert_eq!(surface.execute(Command::Play, &[]), Ack::Ok("Play".into()));
        assert!(surface.transport().is_playing());
        surface.execute(Command::Stop, &[]);
        assert!(!surface.transport().is_playing());
        surface.execute(Command::Play, &[]);
        surface.execute(Command::Exit, &[]);
        let flags = surface.transport().snapshot();
        assert!(!flags.playing);
        assert!(flags.exiting);
    }

    #[test]
    fn argument_commands_reject_bad_arguments() {
        let surface = surface();
        for args in [
            vec![],
            vec![OscType::Int(1)],
            vec![OscType::String("a".into()), OscType::String("b".into())],
        ] {
            let ack = surface.execute(Command::Select, &args);
            assert!(ack.is_error(), "{:?}", args);
            let ack = surface.execute(Command::Scan, &args);
            assert!(ack.is_error(), "{:?}", args);
        }
        assert_eq!(surface.transport().snapshot(), TransportFlags::default());
    }

    #[test]
    fn prefix_is_normalized() {
        let surface = ControlSurface::new(
            "adar/",
            Arc::new(TransportState::new(false)),
            media::shared(MediaCatalog::new()),
            "",
        );
        assert_eq!(surface.prefix(), "/adar");
        assert_eq!(surface.route("/adar/help"), Some(Command::Help));
    }

    #[test]
    fn help_lists_commands() {
        let ack = surface().execute(Command::Help, &[]);
        assert!(ack.text().contains("/rcmp/select file"));
    }

    #[test]
    fn failed_scan_is_reported_once_and_clears() {
        let surface = surface();
        let ack = surface.execute(
            Command::Scan,
            &[OscType::String("/nonexistent/rcmp".into())],
        );
        assert_eq!(
            ack,
            Ack::Error(RcmpError::DirectoryScan("/nonexistent/rcmp".into()).to_string())
        );
        assert!(media::lock(&surface.catalog).is_empty());
        assert_eq!(surface.transport().snapshot(), TransportFlags::default());
    }

    #[test]
    fn info_without_selection() {
        let ack = surface().execute(Command::Info, &[]);
        assert!(ack.text().contains("MIDI Output: 'Test Output'"));
        assert!(ack.text().contains("<none selected>"));
    }
}
