//! Media catalog: the playable MIDI files of one directory, keyed by alias.

pub mod stream;

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, error, info, warn};
use serde::Serialize;

use crate::error::{RcmpError, RcmpResult};
pub use stream::{EventKind, EventStream, MidiEvent, TimedEvent};

/// Recognized file extensions, compared case-insensitively
pub const EXTENSIONS: [&str; 2] = ["mid", "syx"];

/// Catalog shared between the control surface and the playback engine
pub type SharedCatalog = Arc<Mutex<MediaCatalog>>;

pub fn shared(catalog: MediaCatalog) -> SharedCatalog {
    Arc::new(Mutex::new(catalog))
}

/// Lock a shared catalog, recovering the data if a holder panicked
pub fn lock(catalog: &SharedCatalog) -> MutexGuard<'_, MediaCatalog> {
    catalog.lock().unwrap_or_else(PoisonError::into_inner)
}

/// True if the filename carries one of the recognized extensions
pub fn accept<P: AsRef<Path>>(filename: P) -> bool {
    filename
        .as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaItem {
    filename: PathBuf,
    alias: String,
}

impl MediaItem {
    /// Item whose alias is the file stem
    pub fn new<P: Into<PathBuf>>(filename: P) -> Self {
        let filename = filename.into();
        let alias = filename
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| filename.to_string_lossy().to_string());
        MediaItem { filename, alias }
    }

    pub fn with_alias<P: Into<PathBuf>, S: Into<String>>(filename: P, alias: S) -> Self {
        MediaItem {
            filename: filename.into(),
            alias: alias.into(),
        }
    }

    pub fn filename(&self) -> &Path {
        &self.filename
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Re-read the file; changes on disk show up on the next call
    pub fn event_stream(&self) -> RcmpResult<EventStream> {
        EventStream::open(&self.filename)
    }
}

impl fmt::Display for MediaItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:16} --> {}", self.alias, self.filename.display())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MediaCatalog {
    directory: Option<PathBuf>,
    items: BTreeMap<String, MediaItem>,
    selected: Option<String>,
}

impl MediaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, alias: &str) -> Option<&MediaItem> {
        self.items.get(alias)
    }

    pub fn selected(&self) -> Option<&MediaItem> {
        self.selected.as_ref().and_then(|alias| self.items.get(alias))
    }

    /// Sorted aliases; index-based selection uses the same order
    pub fn aliases(&self) -> Vec<String> {
        self.items.keys().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.directory = None;
        self.selected = None;
    }

    /// Replace the catalog with the MIDI files found in `directory`.
    ///
    /// Returns false and leaves the catalog untouched if the directory can not
    /// be listed.
    pub fn scan<P: AsRef<Path>>(&mut self, directory: P) -> bool {
        match self.try_scan(directory) {
            Ok(count) => {
                info!("Scanned {} media items", count);
                true
            }
            Err(e) => {
                error!("{}", e);
                false
            }
        }
    }

    /// Like [`MediaCatalog::scan`], returning the failure instead of reporting it
    pub fn try_scan<P: AsRef<Path>>(&mut self, directory: P) -> RcmpResult<usize> {
        let directory = directory.as_ref();
        let entries = fs::read_dir(directory)
            .map_err(|_| RcmpError::DirectoryScan(directory.display().to_string()))?;

        let mut scanned = MediaCatalog {
            directory: Some(directory.to_path_buf()),
            ..MediaCatalog::default()
        };
        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", directory.display(), e);
                    continue;
                }
            };
            if accept(&path) {
                scanned.add(path);
            }
        }
        scanned.auto_select();

        let count = scanned.len();
        *self = scanned;
        Ok(count)
    }

    /// Add a file if it decodes as MIDI; anything else is skipped.
    pub fn add<P: Into<PathBuf>>(&mut self, filename: P) -> bool {
        self.add_item(MediaItem::new(filename))
    }

    pub fn add_item(&mut self, item: MediaItem) -> bool {
        match item.event_stream() {
            Ok(_) => {
                debug!("Added {}", item);
                self.items.insert(item.alias.clone(), item);
                true
            }
            Err(e) => {
                debug!("Skipped {}: {}", item.filename.display(), e);
                false
            }
        }
    }

    fn auto_select(&mut self) {
        if self.selected().is_none() {
            self.selected = self.items.keys().next().cloned();
        }
    }

    /// Select by alias or by position in `aliases()`.
    ///
    /// A key that parses as an in-range index is resolved to the alias at that
    /// position; anything else is looked up as an alias.
    pub fn try_select(&mut self, key: &str) -> RcmpResult<&MediaItem> {
        let alias = match key.trim().parse::<usize>() {
            Ok(index) if index < self.items.len() => self.items.keys().nth(index).cloned(),
            _ => self.items.contains_key(key).then(|| key.to_string()),
        };
        let alias = alias.ok_or_else(|| RcmpError::InvalidSelection(key.to_string()))?;
        self.selected = Some(alias);
        self.selected().ok_or(RcmpError::NothingSelected)
    }

    /// Like [`MediaCatalog::try_select`], reporting failures instead of returning them
    pub fn select(&mut self, key: &str) -> Option<&MediaItem> {
        match self.try_select(key) {
            Ok(item) => Some(item),
            Err(e) => {
                error!("{}", e);
                None
            }
        }
    }

    /// Scan the remembered directory again, keeping the selection if its alias survived.
    pub fn rescan(&mut self) {
        let Some(directory) = self.directory.clone() else {
            return;
        };
        let previous = self.selected.clone();
        if !self.scan(&directory) {
            return;
        }
        match previous {
            Some(alias) if self.items.contains_key(&alias) => self.selected = Some(alias),
            _ => self.selected = self.items.keys().next().cloned(),
        }
    }

    pub fn try_current_event_stream(&self) -> RcmpResult<EventStream> {
        self.selected()
            .ok_or(RcmpError::NothingSelected)?
            .event_stream()
    }

    /// Event stream of the selected item, or None if nothing is playable
    pub fn current_event_stream(&self) -> Option<EventStream> {
        match self.try_current_event_stream() {
            Ok(stream) => Some(stream),
            Err(e) => {
                error!("{}", e);
                None
            }
        }
    }

    /// Catalog listing with the selected entry marked by '*'
    pub fn listing(&self) -> String {
        let mut out = String::from("Media list\n");
        match &self.directory {
            Some(dir) => out.push_str(&format!("Directory : {}\n", dir.display())),
            None => out.push_str("Directory : <none>\n"),
        }
        for (n, (alias, item)) in self.items.iter().enumerate() {
            let marker = if self.selected.as_deref() == Some(alias.as_str()) {
                "*"
            } else {
                " "
            };
            out.push_str(&format!("[{:2}] {} {}\n", n, marker, item));
        }
        out
    }

    pub fn selected_file_info(&self) -> String {
        match self.selected() {
            Some(item) => format!("MIDI File: {}", item.filename.display()),
            None => "MIDI File: <none selected>".to_string(),
        }
    }
}

impl fmt::Display for MediaCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let directory = self
            .directory
            .as_ref()
            .map(|d| d.display().to_string())
            .unwrap_or_else(|| "None".to_string());
        let selected = self.selected.as_deref().unwrap_or("None");
        write!(
            f,
            "MediaCatalog directory: '{}'  selected: {}",
            directory, selected
        )
    }
}
