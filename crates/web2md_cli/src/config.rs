//! RON configuration file with command-line overrides.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use web2md_engine::{
    FetchSettings, MaterializeSettings, PipelineSettings, DEFAULT_MAX_BYTES,
    DEFAULT_MAX_CONCURRENT,
};

use crate::cli::Args;

pub const DEFAULT_CONFIG_FILENAME: &str = "web2md.ron";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub out_dir: PathBuf,
    pub concurrency: usize,
    pub download_media: bool,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub item_timeout_secs: u64,
    pub max_bytes: u64,
    pub log_file: Option<PathBuf>,
    /// CSS selector of the element to convert instead of the detected main content.
    pub selector: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("output"),
            concurrency: DEFAULT_MAX_CONCURRENT,
            download_media: true,
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            item_timeout_secs: 60,
            max_bytes: DEFAULT_MAX_BYTES,
            log_file: None,
            selector: None,
        }
    }
}

impl Config {
    /// The file to read: `explicit`, or `./web2md.ron` when it exists.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILENAME);
                fallback.is_file().then_some(fallback)
            }
        }
    }

    /// Read the located file, or fall back to defaults. Runs before logging is
    /// set up, so the caller reports the returned path.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        match Self::locate(explicit) {
            Some(path) => Ok((Self::from_file(&path)?, Some(path))),
            None => Ok((Self::default(), None)),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(ron::from_str(content)?)
    }

    pub fn apply_overrides(&mut self, args: &Args) {
        if let Some(out) = &args.out {
            self.out_dir = out.clone();
        }
        if let Some(concurrency) = args.concurrency {
            self.concurrency = usize::from(concurrency);
        }
        if args.no_media {
            self.download_media = false;
        }
        if let Some(log_file) = &args.log_file {
            self.log_file = Some(log_file.clone());
        }
        if let Some(selector) = &args.selector {
            self.selector = Some(selector.clone());
        }
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_bytes: self.max_bytes,
            ..FetchSettings::default()
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            fetch: self.fetch_settings(),
            materialize: MaterializeSettings {
                max_concurrent: self.concurrency,
                item_timeout: Duration::from_secs(self.item_timeout_secs),
            },
            download_media: self.download_media,
        }
    }
}
