//! Configuration for kmspipe.
//!
//! The configuration is a KDL document. Everything is optional; an empty file (or no file at
//! all) gives [`Config::default()`], which probes every GPU on the default seat.

#[macro_use]
extern crate tracing;

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use miette::{Context, IntoDiagnostic};

pub const DEFAULT_SEAT: &str = "seat0";

#[derive(knuffel::Decode, Debug, Default, Clone, PartialEq)]
pub struct Config {
    #[knuffel(child, default)]
    pub drm: Drm,
}

/// The `drm {}` section: which device nodes to probe and how.
#[derive(knuffel::Decode, Debug, Default, Clone, PartialEq)]
pub struct Drm {
    /// Device nodes to probe, in order. When empty, all GPUs on the seat are probed with the
    /// primary GPU first.
    #[knuffel(children(name = "device"), unwrap(argument))]
    pub devices: Vec<PathBuf>,
    #[knuffel(children(name = "ignore-device"), unwrap(argument))]
    pub ignored_devices: Vec<PathBuf>,
    #[knuffel(child, unwrap(argument))]
    pub seat: Option<String>,
    #[knuffel(child)]
    pub scale_with_gpu: bool,
}

impl Drm {
    pub fn seat(&self) -> &str {
        self.seat.as_deref().unwrap_or(DEFAULT_SEAT)
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        self.ignored_devices.iter().any(|ignored| ignored == path)
    }
}

impl Config {
    pub fn load(path: &Path) -> miette::Result<Self> {
        let _span = tracy_client::span!("Config::load");
        Self::load_internal(path).context("error loading config")
    }

    fn load_internal(path: &Path) -> miette::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .into_diagnostic()
            .with_context(|| format!("error reading {path:?}"))?;

        let filename = path
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or("config.kdl");
        let config = Self::parse(filename, &contents).context("error parsing")?;
        debug!("loaded config from {path:?}");
        Ok(config)
    }

    pub fn parse(filename: &str, text: &str) -> Result<Self, knuffel::Error> {
        let _span = tracy_client::span!("Config::parse");
        knuffel::parse(filename, text)
    }
}
