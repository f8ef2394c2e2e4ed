//! Composition root: one catalog, one engine, one control surface and the
//! transport flags they share.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use log::{info, warn};
use serde::Serialize;

use crate::config::PlayerConfig;
use crate::engine::{EngineTiming, PlaybackEngine};
use crate::error::RcmpResult;
use crate::media::{self, MediaCatalog, MediaItem, SharedCatalog};
use crate::osc::{self, ControlSurface, OscServer};
use crate::output::OutputSink;
use crate::transport::{TransportFlags, TransportState};

/// State printed by `--dump`
#[derive(Debug, Serialize)]
pub struct AppSnapshot {
    pub config: PlayerConfig,
    pub transport: TransportFlags,
    pub media: MediaCatalog,
}

pub struct App {
    config: PlayerConfig,
    transport: Arc<TransportState>,
    catalog: SharedCatalog,
}

impl App {
    pub fn new(config: PlayerConfig) -> Self {
        let transport = Arc::new(TransportState::new(config.auto_exit));
        App {
            config,
            transport,
            catalog: media::shared(MediaCatalog::new()),
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<TransportState> {
        &self.transport
    }

    pub fn catalog(&self) -> &SharedCatalog {
        &self.catalog
    }

    /// Load the command line target.
    ///
    /// A file scans its parent directory and selects the file, a directory is
    /// scanned and its first alias selected.
    pub fn load_media<P: AsRef<Path>>(&self, target: P) -> bool {
        let target = target.as_ref();
        let mut catalog = media::lock(&self.catalog);
        if target.is_file() {
            let path = absolute(target);
            let alias = MediaItem::new(&path).alias().to_string();
            let Some(parent) = path.parent() else {
                return false;
            };
            catalog.scan(parent) && catalog.select(&alias).is_some()
        } else if target.is_dir() {
            catalog.scan(absolute(target))
        } else {
            warn!(
                "'{}' is neither a MIDI file nor a directory",
                target.display()
            );
            false
        }
    }

    pub fn snapshot(&self) -> AppSnapshot {
        AppSnapshot {
            config: self.config.clone(),
            transport: self.transport.snapshot(),
            media: media::lock(&self.catalog).clone(),
        }
    }

    /// Run both loops until exit. The engine runs on the calling thread, the
    /// control surface on its own; both are finished when this returns.
    pub fn run(self, sink: Box<dyn OutputSink>) -> RcmpResult<()> {
        let surface = ControlSurface::new(
            &self.config.prefix,
            Arc::clone(&self.transport),
            Arc::clone(&self.catalog),
            sink.name(),
        );
        let prefix = surface.prefix().to_string();
        let server = OscServer::bind(
            self.config.osc_address()?,
            self.config.receive_timeout(),
            surface,
        )?;
        println!(
            "OSC: udp://{}  prefix: {}",
            server.local_addr()?,
            prefix
        );

        let ctrlc_transport = Arc::clone(&self.transport);
        if let Err(e) = ctrlc::set_handler(move || ctrlc_transport.exit()) {
            warn!("Ctrl+C handler not installed: {}", e);
        }

        let control = thread::Builder::new()
            .name("rcmp-osc".to_string())
            .spawn(move || server.run())?;

        if self.config.play {
            if media::lock(&self.catalog).selected().is_some() {
                self.transport.play();
            } else {
                warn!("--play ignored, nothing selected");
            }
        }
        osc::print_prompt(&prefix);

        let mut engine = PlaybackEngine::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.catalog),
            Some(sink),
        )
        .with_timing(EngineTiming::from(&self.config));
        engine.run();

        // The engine may have stopped on its own (auto-exit), release the control loop too
        self.transport.exit();
        if control.join().is_err() {
            warn!("OSC control thread panicked");
        }
        drop(engine.into_sink());
        info!("Exit");
        println!("\nExit");
        Ok(())
    }
}

fn absolute(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TINY_SMF: &[u8] = &[
        b'M', b'T', b'h', b'd', 0, 0, 0, 6, 0, 0, 0, 1, 0x01, 0xE0, b'M', b'T', b'r', b'k', 0, 0,
        0, 4, 0x00, 0xFF, 0x2F, 0x00,
    ];

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        for name in ["one.mid", "two.mid", "three.mid"] {
            fs::write(dir.path().join(name), TINY_SMF).unwrap();
        }
        dir
    }

    #[test]
    fn file_target_selects_the_file() {
        let dir = fixture();
        let app = App::new(PlayerConfig::default());
        assert!(app.load_media(dir.path().join("two.mid")));
        let catalog = media::lock(app.catalog());
        assert_eq!(catalog.aliases(), vec!["one", "three", "two"]);
        assert_eq!(catalog.selected().unwrap().alias(), "two");
    }

    #[test]
    fn directory_target_selects_first_alias() {
        let dir = fixture();
        let app = App::new(PlayerConfig::default());
        assert!(app.load_media(dir.path()));
        assert_eq!(
            media::lock(app.catalog()).selected().unwrap().alias(),
            "one"
        );
    }

    #[test]
    fn missing_target_is_ignored() {
        let app = App::new(PlayerConfig::default());
        assert!(!app.load_media("/nonexistent/rcmp"));
        assert!(media::lock(app.catalog()).is_empty());
    }

    #[test]
    fn snapshot_serializes() {
        let dir = fixture();
        let app = App::new(PlayerConfig {
            auto_exit: true,
            ..PlayerConfig::default()
        });
        app.load_media(dir.path());
        let json = serde_json::to_value(app.snapshot()).unwrap();
        assert_eq!(json["config"]["prefix"], "/rcmp");
        assert_eq!(json["transport"]["auto_exit"], true);
        assert_eq!(json["media"]["selected"], "one");
    }
}
