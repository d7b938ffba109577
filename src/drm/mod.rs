//! Kernel mode-setting devices.
//!
//! This module contains:
//! - `kernel` - the [`KmsCard`] seam and the real [`Card`]
//! - `caps` - client capability negotiation
//! - `resources` - enumeration of CRTCs, encoders, connectors and planes
//! - `pipeline` - assignment of connectors to encoder/CRTC pairs
//! - `device` - [`DisplayDevice`], which ties the above together
//! - `blob`, `helpers` - property blobs and property lookup

mod blob;
mod caps;
mod device;
mod error;
mod helpers;
mod kernel;
mod pipeline;
mod resources;
#[cfg(test)]
pub(crate) mod testing;
mod types;

pub use blob::ScopedBlob;
pub use caps::{negotiate, Capabilities};
pub use device::DisplayDevice;
pub use error::DrmError;
pub use helpers::{get_property, has_kms_resources};
pub use kernel::{Card, KmsCard};
pub use pipeline::{assign, display_order, Assignment, DisplayPipe};
pub use resources::{enumerate, Resources};
pub use types::{
    Connector, ConnectorInfo, Crtc, CrtcInfo, DisplayId, DisplayPipeline, Encoder, EncoderInfo,
    ObjectType, Plane, PlaneInfo, PropertyDescriptor, PropertyInfo, PropertyKind,
    ResolutionBounds, ResourceSnapshot,
};
