//! The kernel mode-setting surface.
//!
//! [`KmsCard`] is the seam between the assignment logic and the kernel: everything the device
//! needs from the ioctl interface goes through it. [`Card`] implements it on top of an opened
//! device node.

use std::io;
use std::ops::{Bound, RangeBounds};
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};

use smithay::backend::drm::DrmDeviceFd;
use drm_ffi::drm_sys::{drm_mode_get_encoder, drm_mode_get_plane};
use smithay::reexports::drm::control::{
    connector, crtc, from_u32, plane, property, Device as ControlDevice, RawResourceHandle,
};
use smithay::reexports::drm::{ClientCapability, Device as BasicDevice, DriverCapability};
use smithay::reexports::rustix::fs::{self as rfs, Mode, OFlags};
use smithay::utils::DeviceFd;

use super::error::DrmError;
use super::types::{
    ConnectorInfo, CrtcInfo, EncoderInfo, ObjectType, PlaneInfo, PropertyInfo, PropertyKind,
    ResolutionBounds, ResourceSnapshot,
};

/// Access to the kernel mode-setting interface of one device.
///
/// Object ids are the raw kernel ids; all calls are synchronous.
pub trait KmsCard {
    fn set_client_capability(&self, cap: ClientCapability, enable: bool) -> io::Result<()>;
    fn driver_capability(&self, cap: DriverCapability) -> io::Result<u64>;
    fn acquire_master(&self) -> io::Result<()>;
    fn driver_name(&self) -> io::Result<String>;

    fn resources(&self) -> io::Result<ResourceSnapshot>;
    fn plane_ids(&self) -> io::Result<Vec<u32>>;
    fn connector_info(&self, id: u32) -> io::Result<ConnectorInfo>;
    fn encoder_info(&self, id: u32) -> io::Result<EncoderInfo>;
    fn crtc_info(&self, id: u32) -> io::Result<CrtcInfo>;
    fn plane_info(&self, id: u32) -> io::Result<PlaneInfo>;

    /// All `(property id, current value)` pairs of an object.
    fn object_properties(&self, id: u32, ty: ObjectType) -> io::Result<Vec<(u32, u64)>>;
    fn property_info(&self, id: u32) -> io::Result<PropertyInfo>;

    fn create_property_blob(&self, data: &[u8]) -> io::Result<u32>;
    fn destroy_property_blob(&self, id: u32) -> io::Result<()>;
}

/// An opened DRM device node.
///
/// The file descriptor is closed when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct Card {
    fd: DrmDeviceFd,
    path: PathBuf,
}

impl Card {
    /// Opens the node read-write and close-on-exec.
    pub fn open(path: &Path) -> Result<Self, DrmError> {
        let _span = tracy_client::span!("Card::open");

        let flags = OFlags::RDWR | OFlags::CLOEXEC | OFlags::NOCTTY;
        let fd = rfs::open(path, flags, Mode::empty()).map_err(|err| DrmError::NoDevice {
            path: path.to_owned(),
            source: io::Error::from(err),
        })?;

        Ok(Self {
            fd: DrmDeviceFd::new(DeviceFd::from(fd)),
            path: path.to_owned(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn fd(&self) -> &DrmDeviceFd {
        &self.fd
    }
}

/// Zero means "no object" in kernel replies.
fn object_id(raw: u32) -> Option<u32> {
    (raw != 0).then_some(raw)
}

// Possible-CRTC masks in raw replies are indexed like the resource query.

fn encoder_info_from_raw(raw: &drm_mode_get_encoder) -> EncoderInfo {
    EncoderInfo {
        current_crtc: object_id(raw.crtc_id),
        possible_crtcs: raw.possible_crtcs,
    }
}

fn plane_info_from_raw(raw: &drm_mode_get_plane) -> PlaneInfo {
    PlaneInfo {
        current_crtc: object_id(raw.crtc_id),
        possible_crtcs: raw.possible_crtcs,
    }
}

fn handle<H: From<RawResourceHandle>>(id: u32) -> io::Result<H> {
    from_u32(id).ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "zero object id"))
}

fn range_ends(range: impl RangeBounds<u32>) -> (u32, u32) {
    let start = match range.start_bound() {
        Bound::Included(&x) | Bound::Excluded(&x) => x,
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&x) | Bound::Excluded(&x) => x,
        Bound::Unbounded => u32::MAX,
    };
    (start, end)
}

impl KmsCard for Card {
    fn set_client_capability(&self, cap: ClientCapability, enable: bool) -> io::Result<()> {
        self.fd.set_client_capability(cap, enable)
    }

    fn driver_capability(&self, cap: DriverCapability) -> io::Result<u64> {
        self.fd.get_driver_capability(cap)
    }

    fn acquire_master(&self) -> io::Result<()> {
        self.fd.acquire_master_lock()
    }

    fn driver_name(&self) -> io::Result<String> {
        let driver = self.fd.get_driver()?;
        Ok(driver.name().to_string_lossy().into_owned())
    }

    fn resources(&self) -> io::Result<ResourceSnapshot> {
        let res = self.fd.resource_handles()?;

        let (min_width, max_width) = range_ends(res.supported_fb_width());
        let (min_height, max_height) = range_ends(res.supported_fb_height());

        Ok(ResourceSnapshot {
            crtcs: res.crtcs().iter().map(|&h| u32::from(h)).collect(),
            encoders: res.encoders().iter().map(|&h| u32::from(h)).collect(),
            connectors: res.connectors().iter().map(|&h| u32::from(h)).collect(),
            bounds: ResolutionBounds {
                min: (min_width, min_height),
                max: (max_width, max_height),
            },
        })
    }

    fn plane_ids(&self) -> io::Result<Vec<u32>> {
        let planes = self.fd.plane_handles()?;
        Ok(planes.into_iter().map(u32::from).collect())
    }

    fn connector_info(&self, id: u32) -> io::Result<ConnectorInfo> {
        let info = self.fd.get_connector(handle::<connector::Handle>(id)?, true)?;

        Ok(ConnectorInfo {
            interface: info.interface(),
            interface_id: info.interface_id(),
            state: info.state(),
            current_encoder: info.current_encoder().map(u32::from),
            encoders: info.encoders().iter().map(|&h| u32::from(h)).collect(),
        })
    }

    fn encoder_info(&self, id: u32) -> io::Result<EncoderInfo> {
        let raw = drm_ffi::mode::get_encoder(self.fd.as_fd(), id)?;
        Ok(encoder_info_from_raw(&raw))
    }

    fn crtc_info(&self, id: u32) -> io::Result<CrtcInfo> {
        let info = self.fd.get_crtc(handle::<crtc::Handle>(id)?)?;
        Ok(CrtcInfo {
            mode_size: info.mode().map(|mode| mode.size()),
        })
    }

    fn plane_info(&self, id: u32) -> io::Result<PlaneInfo> {
        let raw = drm_ffi::mode::get_plane(self.fd.as_fd(), id, None)?;
        Ok(plane_info_from_raw(&raw))
    }

    fn object_properties(&self, id: u32, ty: ObjectType) -> io::Result<Vec<(u32, u64)>> {
        let props = match ty {
            ObjectType::Connector => self.fd.get_properties(handle::<connector::Handle>(id)?)?,
            ObjectType::Crtc => self.fd.get_properties(handle::<crtc::Handle>(id)?)?,
            ObjectType::Plane => self.fd.get_properties(handle::<plane::Handle>(id)?)?,
        };

        Ok(props
            .into_iter()
            .map(|(prop, value)| (u32::from(prop), value))
            .collect())
    }

    fn property_info(&self, id: u32) -> io::Result<PropertyInfo> {
        let info = self.fd.get_property(handle::<property::Handle>(id)?)?;

        let kind = match info.value_type() {
            property::ValueType::Unknown => PropertyKind::Unknown,
            property::ValueType::Boolean => PropertyKind::Boolean,
            property::ValueType::UnsignedRange(..) => PropertyKind::Range,
            property::ValueType::SignedRange(..) => PropertyKind::SignedRange,
            property::ValueType::Enum(_) => PropertyKind::Enum,
            property::ValueType::Bitmask => PropertyKind::Bitmask,
            property::ValueType::Blob => PropertyKind::Blob,
            _ => PropertyKind::Object,
        };

        Ok(PropertyInfo {
            name: info.name().to_string_lossy().into_owned(),
            kind,
            immutable: !info.mutable(),
            atomic: info.atomic(),
        })
    }

    fn create_property_blob(&self, data: &[u8]) -> io::Result<u32> {
        // The ioctl wants a mutable buffer even though it only reads from it.
        let mut data = data.to_vec();
        let blob = drm_ffi::mode::create_property_blob(self.fd.as_fd(), &mut data)?;
        Ok(blob.blob_id)
    }

    fn destroy_property_blob(&self, id: u32) -> io::Result<()> {
        self.fd.destroy_property_blob(u64::from(id))
    }
}
