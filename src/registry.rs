//! Device registry.
//!
//! The registry owns every initialized [`DisplayDevice`] and numbers displays globally: each
//! device continues the display id sequence where the previous one stopped. All access goes
//! through one coarse lock.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{bail, Context};
use serde::Serialize;
use smithay::backend::udev;

use crate::drm::{has_kms_resources, Card, DisplayDevice, DisplayId, DisplayPipeline, KmsCard};

/// Devices in probe order.
pub struct Devices<C: KmsCard = Card> {
    entries: Vec<(PathBuf, DisplayDevice<C>)>,
    /// Ids of removed devices are not reused.
    next_display: DisplayId,
}

impl<C: KmsCard> Devices<C> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_display: DisplayId(0),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &DisplayDevice<C>)> {
        self.entries
            .iter()
            .map(|(path, device)| (path.as_path(), device))
    }

    pub fn get(&self, path: &Path) -> Option<&DisplayDevice<C>> {
        self.entries
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, device)| device)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn display_count(&self) -> usize {
        self.entries
            .iter()
            .map(|(_, device)| device.display_count())
            .sum()
    }

    /// Device driving `display`, and its path.
    pub fn device_for_display(&self, display: DisplayId) -> Option<(&Path, &DisplayDevice<C>)> {
        self.iter().find(|(_, device)| device.handles_display(display))
    }

    pub fn pipeline(&self, display: DisplayId) -> Option<DisplayPipeline<'_>> {
        let (_, device) = self.device_for_display(display)?;
        device.pipeline(display)
    }

    pub fn next_display(&self) -> DisplayId {
        self.next_display
    }
}

/// Plain snapshot of one pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineInfo {
    pub display: u32,
    pub device: PathBuf,
    pub driver: String,
    pub connector: String,
    pub connector_id: u32,
    pub connected: bool,
    pub internal: bool,
    pub encoder_id: u32,
    pub crtc_id: u32,
    pub crtc_index: usize,
    pub mode_size: Option<(u16, u16)>,
}

impl PipelineInfo {
    fn new(
        path: &Path,
        device: &DisplayDevice<impl KmsCard>,
        pipeline: &DisplayPipeline<'_>,
    ) -> Self {
        Self {
            display: pipeline.display.get(),
            device: path.to_owned(),
            driver: device.name(),
            connector: pipeline.connector.name(),
            connector_id: pipeline.connector.id(),
            connected: pipeline.connector.is_connected(),
            internal: pipeline.connector.is_internal(),
            encoder_id: pipeline.encoder.id(),
            crtc_id: pipeline.crtc.id(),
            crtc_index: pipeline.crtc.index(),
            mode_size: pipeline.crtc.mode_size(),
        }
    }
}

pub struct DeviceRegistry<C: KmsCard = Card> {
    devices: Mutex<Devices<C>>,
    scale_with_gpu: bool,
}

impl<C: KmsCard> DeviceRegistry<C> {
    pub fn new(scale_with_gpu: bool) -> Self {
        Self {
            devices: Mutex::new(Devices::new()),
            scale_with_gpu,
        }
    }

    /// The registry lock. Hold it to get a consistent view across several lookups.
    pub fn lock(&self) -> MutexGuard<'_, Devices<C>> {
        self.devices.lock().unwrap()
    }

    // === Device Lifecycle ===

    /// Initializes `card` and registers it under `path`.
    ///
    /// Returns the number of displays the device brought. A device that fails to initialize is
    /// not registered and doesn't consume display ids.
    pub fn add_device(&self, path: PathBuf, card: C) -> anyhow::Result<usize> {
        debug!("adding device: {path:?}");

        let mut devices = self.lock();

        if devices.get(&path).is_some() {
            bail!("device {path:?} is already registered");
        }

        if !has_kms_resources(&card) {
            bail!("{path:?} is not a mode-setting device");
        }

        let first = devices.next_display;
        let device = DisplayDevice::init(card, first)
            .with_context(|| format!("error initializing {path:?}"))?;

        let count = device.display_count();
        info!(
            "{path:?}: {count} displays starting at {first}, driver {}",
            device.name()
        );

        devices.next_display = device.next_display();
        devices.entries.push((path, device));

        Ok(count)
    }

    /// Drops the device at `path` together with its displays.
    pub fn remove_device(&self, path: &Path) -> Option<DisplayDevice<C>> {
        debug!("removing device: {path:?}");

        let mut devices = self.lock();
        let Some(pos) = devices.entries.iter().position(|(p, _)| p == path) else {
            warn!("unknown device {path:?}");
            return None;
        };

        let (_, device) = devices.entries.remove(pos);
        Some(device)
    }

    // === Display Access ===

    pub fn display_count(&self) -> usize {
        self.lock().display_count()
    }

    pub fn handles_display(&self, display: DisplayId) -> bool {
        self.lock().device_for_display(display).is_some()
    }

    pub fn pipeline_info(&self, display: DisplayId) -> Option<PipelineInfo> {
        let devices = self.lock();
        let (path, device) = devices.device_for_display(display)?;
        let pipeline = device.pipeline(display)?;
        Some(PipelineInfo::new(path, device, &pipeline))
    }

    /// Snapshots of every pipeline, in display id order.
    pub fn pipelines(&self) -> Vec<PipelineInfo> {
        let devices = self.lock();
        let mut pipelines: Vec<_> = devices
            .iter()
            .flat_map(|(path, device)| {
                device
                    .pipelines()
                    .map(move |pipeline| PipelineInfo::new(path, device, &pipeline))
            })
            .collect();
        pipelines.sort_by_key(|info| info.display);
        pipelines
    }

    /// Whether composition should be scaled on the GPU rather than by the display hardware.
    pub fn forced_scaling_with_gpu(&self) -> bool {
        self.scale_with_gpu
    }
}

impl DeviceRegistry<Card> {
    /// Probes and initializes the devices selected by `config`.
    ///
    /// Devices that fail are logged and skipped.
    pub fn init(config: &kmspipe_config::Drm) -> anyhow::Result<Self> {
        let _span = tracy_client::span!("DeviceRegistry::init");

        let registry = Self::new(config.scale_with_gpu);

        for path in device_paths(config)? {
            if config.is_ignored(&path) {
                debug!("{path:?} is ignored, skipping");
                continue;
            }

            let card = match Card::open(&path) {
                Ok(card) => card,
                Err(err) => {
                    warn!("{:?}", anyhow::Error::new(err));
                    continue;
                }
            };

            if let Err(err) = registry.add_device(path, card) {
                warn!("{err:?}");
            }
        }

        Ok(registry)
    }
}

/// Device nodes to probe: the configured ones, or every GPU on the seat with the primary first.
fn device_paths(config: &kmspipe_config::Drm) -> anyhow::Result<Vec<PathBuf>> {
    if !config.devices.is_empty() {
        return Ok(config.devices.clone());
    }

    let seat = config.seat();
    let mut paths = udev::all_gpus(seat).context("error enumerating GPUs")?;

    match udev::primary_gpu(seat) {
        Ok(Some(primary)) => {
            debug!("primary GPU: {primary:?}");
            if let Some(pos) = paths.iter().position(|p| *p == primary) {
                let primary = paths.remove(pos);
                paths.insert(0, primary);
            }
        }
        Ok(None) => debug!("no primary GPU on {seat}"),
        Err(err) => warn!("error getting the primary GPU: {err:?}"),
    }

    Ok(paths)
}
