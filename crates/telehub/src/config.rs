//! Hub configuration file.
//!
//! ```json
//! {
//!   "hub": { "loglevel": "info" },
//!   "readers": {
//!     "rfm2pi": { "type": "radio", "init": { "baud": 0 }, "runtime": { "group": 210 } }
//!   },
//!   "nodes": { "10": { "datacodes": ["h", "h", "L"] } }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use serde::{Deserialize, Serialize};
use telehub_frame::NodeTable;
use telehub_reader::{ReaderInit, ReaderKind, Result as ReaderResult, SettingsMap};
use tracing::{debug, warn};

/// How often the file's modification time is checked.
pub const CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Back-off after the file could not be read or parsed.
pub const RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub hub: HubSection,
    pub readers: BTreeMap<String, ReaderConfig>,
    pub nodes: NodeTable,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubSection {
    /// Log level applied on every (re)load; the command line value otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loglevel: Option<String>,
}

/// One reader section. A section without `type` is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReaderConfig {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ReaderKind>,
    #[serde(default)]
    pub init: serde_json::Value,
    #[serde(default)]
    pub runtime: SettingsMap,
}

impl ReaderConfig {
    /// Typed init settings, or `None` when the section has no `type`.
    pub fn reader_init(&self) -> ReaderResult<Option<ReaderInit>> {
        self.kind
            .map(|kind| ReaderInit::from_parts(kind, &self.init))
            .transpose()
    }
}

impl HubConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &text)
    }

    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Detects changes to the configuration file by modification time.
pub struct ConfigWatcher {
    path: PathBuf,
    modified: Option<SystemTime>,
    next_check: Option<Instant>,
}

impl ConfigWatcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            modified: None,
            next_check: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file unconditionally and remember its modification time.
    pub fn load(&mut self) -> Result<HubConfig> {
        let modified = self.modification_time()?;
        let config = HubConfig::load(&self.path)?;
        self.modified = Some(modified);
        Ok(config)
    }

    /// Return the new configuration if the file changed since the last load.
    ///
    /// Checks at most once per [`CHECK_INTERVAL`]. Read and parse failures
    /// are logged and retried after [`RETRY_AFTER`]; the caller keeps its
    /// current configuration meanwhile.
    pub fn poll(&mut self, now: Instant) -> Option<HubConfig> {
        if self.next_check.is_some_and(|next| now < next) {
            return None;
        }
        self.next_check = Some(now + CHECK_INTERVAL);

        let modified = match self.modification_time() {
            Ok(modified) => modified,
            Err(err) => {
                warn!(error = %err, "configuration unavailable, retrying later");
                self.next_check = Some(now + RETRY_AFTER);
                return None;
            }
        };
        if self.modified == Some(modified) {
            return None;
        }

        debug!(path = %self.path.display(), "configuration file changed");
        match HubConfig::load(&self.path) {
            Ok(config) => {
                self.modified = Some(modified);
                Some(config)
            }
            Err(err) => {
                warn!(error = %err, "keeping previous configuration");
                self.next_check = Some(now + RETRY_AFTER);
                None
            }
        }
    }

    fn modification_time(&self) -> Result<SystemTime> {
        fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .map_err(|source| ConfigError::Io {
                path: self.path.clone(),
                source,
            })
    }
}
