//! Client capability negotiation.

use bitflags::bitflags;
use smithay::reexports::drm::{ClientCapability, DriverCapability};

use super::error::DrmError;
use super::kernel::KmsCard;

bitflags! {
    /// Optional capabilities that were successfully negotiated.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct Capabilities: u8 {
        /// The kernel will report writeback connectors.
        const WRITEBACK_CONNECTORS = 1 << 0;
        /// Framebuffers can be added with explicit format modifiers.
        const ADDFB2_MODIFIERS = 1 << 1;
    }
}

/// Enables the capabilities a device needs and takes DRM master.
///
/// Universal planes, atomic and master are required; writeback connectors and modifier support
/// are optional and only recorded in the returned flags.
pub fn negotiate(card: &impl KmsCard) -> Result<Capabilities, DrmError> {
    let _span = tracy_client::span!("negotiate");

    card.set_client_capability(ClientCapability::UniversalPlanes, true)
        .map_err(|source| DrmError::CapabilityUnsupported {
            capability: "universal planes",
            source,
        })?;

    card.set_client_capability(ClientCapability::Atomic, true)
        .map_err(|source| DrmError::CapabilityUnsupported {
            capability: "atomic",
            source,
        })?;

    let mut caps = Capabilities::empty();

    match card.set_client_capability(ClientCapability::WritebackConnectors, true) {
        Ok(()) => caps |= Capabilities::WRITEBACK_CONNECTORS,
        Err(err) => info!("writeback connectors are unavailable: {err}"),
    }

    match card.driver_capability(DriverCapability::AddFB2Modifiers) {
        Ok(0) => (),
        Ok(_) => caps |= Capabilities::ADDFB2_MODIFIERS,
        Err(err) => {
            warn!("error getting the AddFB2 modifiers capability, assuming no modifiers: {err:?}")
        }
    }

    card.acquire_master().map_err(DrmError::AccessDenied)?;

    debug!("negotiated capabilities: {caps:?}");
    Ok(caps)
}
