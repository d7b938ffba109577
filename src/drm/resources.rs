//! Resource enumeration.
//!
//! One typed object is built per kernel id. A single object that can't be built is skipped,
//! only a failure of the resource queries themselves stops the device.

use anyhow::Context;
use smithay::reexports::drm::control::PlaneType;

use super::error::DrmError;
use super::helpers::get_property;
use super::kernel::KmsCard;
use super::types::{Connector, Crtc, Encoder, ObjectType, Plane, ResolutionBounds};

/// Everything the kernel reported for a device, in kernel order.
#[derive(Debug, Default)]
pub struct Resources {
    pub(super) connectors: Vec<Connector>,
    pub(super) writeback_connectors: Vec<Connector>,
    pub(super) encoders: Vec<Encoder>,
    pub(super) crtcs: Vec<Crtc>,
    pub(super) planes: Vec<Plane>,
    pub(super) bounds: ResolutionBounds,
}

pub fn enumerate(card: &impl KmsCard) -> Result<Resources, DrmError> {
    let _span = tracy_client::span!("enumerate");

    let res = card.resources().map_err(|source| DrmError::NoResources {
        query: "resources",
        source,
    })?;
    let plane_ids = card.plane_ids().map_err(|source| DrmError::NoResources {
        query: "plane resources",
        source,
    })?;

    let mut resources = Resources {
        bounds: res.bounds,
        ..Resources::default()
    };

    for (index, &id) in res.crtcs.iter().enumerate() {
        match Crtc::create(card, id, index) {
            Ok(crtc) => resources.crtcs.push(crtc),
            Err(err) => warn!("skipping CRTC {id}: {err:?}"),
        }
    }

    for (index, &id) in res.encoders.iter().enumerate() {
        match Encoder::create(card, id, index) {
            Ok(encoder) => resources.encoders.push(encoder),
            Err(err) => warn!("skipping encoder {id}: {err:?}"),
        }
    }

    for (index, &id) in res.connectors.iter().enumerate() {
        let connector = match Connector::create(card, id, index) {
            Ok(connector) => connector,
            Err(err) => {
                warn!("skipping connector {id}: {err:?}");
                continue;
            }
        };

        if connector.is_writeback() {
            resources.writeback_connectors.push(connector);
        } else {
            resources.connectors.push(connector);
        }
    }

    for id in plane_ids {
        match Plane::create(card, id) {
            Ok(plane) => resources.planes.push(plane),
            Err(err) => warn!("skipping plane {id}: {err:?}"),
        }
    }

    debug!(
        "found {} CRTCs, {} encoders, {} connectors ({} writeback), {} planes",
        resources.crtcs.len(),
        resources.encoders.len(),
        resources.connectors.len() + resources.writeback_connectors.len(),
        resources.writeback_connectors.len(),
        resources.planes.len(),
    );

    Ok(resources)
}

// =============================================================================
// Object Factories
// =============================================================================

impl Crtc {
    pub(super) fn create(card: &impl KmsCard, id: u32, index: usize) -> anyhow::Result<Self> {
        let info = card.crtc_info(id).context("error getting CRTC info")?;
        let active = get_property(card, id, ObjectType::Crtc, "ACTIVE")?;
        let mode_id = get_property(card, id, ObjectType::Crtc, "MODE_ID")?;

        Ok(Self {
            id,
            index,
            mode_size: info.mode_size,
            active_prop: active.id,
            mode_id_prop: mode_id.id,
        })
    }
}

impl Encoder {
    pub(super) fn create(card: &impl KmsCard, id: u32, index: usize) -> anyhow::Result<Self> {
        let info = card.encoder_info(id).context("error getting encoder info")?;

        Ok(Self {
            id,
            index,
            current_crtc: info.current_crtc,
            possible_crtcs: info.possible_crtcs,
        })
    }
}

impl Connector {
    pub(super) fn create(card: &impl KmsCard, id: u32, index: usize) -> anyhow::Result<Self> {
        let info = card
            .connector_info(id)
            .context("error getting connector info")?;
        let crtc_id = get_property(card, id, ObjectType::Connector, "CRTC_ID")?;

        Ok(Self {
            id,
            index,
            interface: info.interface,
            interface_id: info.interface_id,
            state: info.state,
            current_encoder: info.current_encoder,
            encoders: info.encoders,
            crtc_id_prop: crtc_id.id,
        })
    }
}

impl Plane {
    pub(super) fn create(card: &impl KmsCard, id: u32) -> anyhow::Result<Self> {
        let info = card.plane_info(id).context("error getting plane info")?;
        let ty = get_property(card, id, ObjectType::Plane, "type")?;

        let ty = match ty.value {
            x if x == PlaneType::Overlay as u64 => PlaneType::Overlay,
            x if x == PlaneType::Primary as u64 => PlaneType::Primary,
            x if x == PlaneType::Cursor as u64 => PlaneType::Cursor,
            x => anyhow::bail!("unknown plane type {x}"),
        };

        Ok(Self {
            id,
            ty,
            current_crtc: info.current_crtc,
            possible_crtcs: info.possible_crtcs,
        })
    }
}
