//! In-memory kernel used by the unit tests.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::io;

use smithay::reexports::drm::control::connector::{Interface, State as ConnectionState};
use smithay::reexports::drm::control::PlaneType;
use smithay::reexports::drm::{ClientCapability, DriverCapability};

use super::kernel::KmsCard;
use super::types::{
    ConnectorInfo, CrtcInfo, EncoderInfo, ObjectType, PlaneInfo, PropertyInfo, PropertyKind,
    ResolutionBounds, ResourceSnapshot,
};

/// Kernel calls that a [`FakeCard`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fail {
    UniversalPlanes,
    Atomic,
    Writeback,
    ModifiersQuery,
    Master,
    Resources,
    Planes,
    DriverName,
    BlobCreate,
    BlobDestroy,
}

#[derive(Debug, Default)]
pub struct FakeCard {
    crtcs: Vec<u32>,
    encoders: Vec<(u32, EncoderInfo)>,
    connectors: Vec<(u32, ConnectorInfo)>,
    planes: Vec<(u32, PlaneInfo)>,
    properties: HashMap<(ObjectType, u32), Vec<(u32, u64)>>,
    property_infos: HashMap<u32, PropertyInfo>,
    failures: HashSet<Fail>,
    modifiers: bool,

    writeback_enabled: Cell<bool>,
    master: Cell<bool>,
    next_blob: Cell<u32>,
    live_blobs: RefCell<Vec<u32>>,
    destroyed_blobs: RefCell<Vec<u32>>,
}

impl FakeCard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, fail: Fail) -> Self {
        self.failures.insert(fail);
        self
    }

    pub fn modifiers(mut self, supported: bool) -> Self {
        self.modifiers = supported;
        self
    }

    /// A CRTC with the properties an atomic driver exposes.
    pub fn crtc(self, id: u32) -> Self {
        self.bare_crtc(id)
            .property(id, ObjectType::Crtc, "ACTIVE", 0)
            .property(id, ObjectType::Crtc, "MODE_ID", 0)
    }

    /// A CRTC without any properties, which can't be constructed.
    pub fn bare_crtc(mut self, id: u32) -> Self {
        self.crtcs.push(id);
        self.properties.entry((ObjectType::Crtc, id)).or_default();
        self
    }

    pub fn encoder(mut self, id: u32, current_crtc: Option<u32>, possible_crtcs: u32) -> Self {
        self.encoders.push((
            id,
            EncoderInfo {
                current_crtc,
                possible_crtcs,
            },
        ));
        self
    }

    pub fn connector(
        self,
        id: u32,
        interface: Interface,
        state: ConnectionState,
        current_encoder: Option<u32>,
        encoders: &[u32],
    ) -> Self {
        self.bare_connector(id, interface, state, current_encoder, encoders)
            .property(id, ObjectType::Connector, "CRTC_ID", 0)
    }

    /// A connector without `CRTC_ID`, which can't be constructed.
    pub fn bare_connector(
        mut self,
        id: u32,
        interface: Interface,
        state: ConnectionState,
        current_encoder: Option<u32>,
        encoders: &[u32],
    ) -> Self {
        let interface_id = self
            .connectors
            .iter()
            .filter(|(_, info)| info.interface == interface)
            .count() as u32
            + 1;

        self.connectors.push((
            id,
            ConnectorInfo {
                interface,
                interface_id,
                state,
                current_encoder,
                encoders: encoders.to_vec(),
            },
        ));
        self.properties.entry((ObjectType::Connector, id)).or_default();
        self
    }

    pub fn plane(self, id: u32, ty: PlaneType, possible_crtcs: u32) -> Self {
        self.raw_plane(id, ty as u64, possible_crtcs)
    }

    /// A plane whose `type` property holds `type_value` as is.
    pub fn raw_plane(mut self, id: u32, type_value: u64, possible_crtcs: u32) -> Self {
        self.planes.push((
            id,
            PlaneInfo {
                current_crtc: None,
                possible_crtcs,
            },
        ));
        self.property(id, ObjectType::Plane, "type", type_value)
    }

    pub fn property(mut self, object: u32, ty: ObjectType, name: &str, value: u64) -> Self {
        let prop = 1000 + self.property_infos.len() as u32;
        self.property_infos.insert(
            prop,
            PropertyInfo {
                name: name.to_owned(),
                kind: if name == "type" {
                    PropertyKind::Enum
                } else {
                    PropertyKind::Range
                },
                immutable: false,
                atomic: true,
            },
        );
        self.properties
            .entry((ty, object))
            .or_default()
            .push((prop, value));
        self
    }

    pub fn is_master(&self) -> bool {
        self.master.get()
    }

    pub fn live_blobs(&self) -> Vec<u32> {
        self.live_blobs.borrow().clone()
    }

    pub fn destroyed_blobs(&self) -> Vec<u32> {
        self.destroyed_blobs.borrow().clone()
    }

    fn check(&self, fail: Fail) -> io::Result<()> {
        if self.failures.contains(&fail) {
            Err(io::Error::from_raw_os_error(22))
        } else {
            Ok(())
        }
    }
}

fn not_found() -> io::Error {
    io::Error::from(io::ErrorKind::NotFound)
}

impl KmsCard for FakeCard {
    fn set_client_capability(&self, cap: ClientCapability, enable: bool) -> io::Result<()> {
        match cap {
            ClientCapability::UniversalPlanes => self.check(Fail::UniversalPlanes),
            ClientCapability::Atomic => self.check(Fail::Atomic),
            ClientCapability::WritebackConnectors => {
                self.check(Fail::Writeback)?;
                self.writeback_enabled.set(enable);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn driver_capability(&self, cap: DriverCapability) -> io::Result<u64> {
        match cap {
            DriverCapability::AddFB2Modifiers => {
                self.check(Fail::ModifiersQuery)?;
                Ok(u64::from(self.modifiers))
            }
            _ => Ok(0),
        }
    }

    fn acquire_master(&self) -> io::Result<()> {
        self.check(Fail::Master)?;
        self.master.set(true);
        Ok(())
    }

    fn driver_name(&self) -> io::Result<String> {
        self.check(Fail::DriverName)?;
        Ok(String::from("fake"))
    }

    fn resources(&self) -> io::Result<ResourceSnapshot> {
        self.check(Fail::Resources)?;

        // Like the kernel, hide writeback connectors until the client asks for them.
        let connectors = self
            .connectors
            .iter()
            .filter(|(_, info)| {
                self.writeback_enabled.get() || info.interface != Interface::Writeback
            })
            .map(|(id, _)| *id)
            .collect();

        Ok(ResourceSnapshot {
            crtcs: self.crtcs.clone(),
            encoders: self.encoders.iter().map(|(id, _)| *id).collect(),
            connectors,
            bounds: ResolutionBounds {
                min: (1, 1),
                max: (16384, 16384),
            },
        })
    }

    fn plane_ids(&self) -> io::Result<Vec<u32>> {
        self.check(Fail::Planes)?;
        Ok(self.planes.iter().map(|(id, _)| *id).collect())
    }

    fn connector_info(&self, id: u32) -> io::Result<ConnectorInfo> {
        self.connectors
            .iter()
            .find(|(c, _)| *c == id)
            .map(|(_, info)| info.clone())
            .ok_or_else(not_found)
    }

    fn encoder_info(&self, id: u32) -> io::Result<EncoderInfo> {
        self.encoders
            .iter()
            .find(|(e, _)| *e == id)
            .map(|(_, info)| *info)
            .ok_or_else(not_found)
    }

    fn crtc_info(&self, id: u32) -> io::Result<CrtcInfo> {
        if self.crtcs.contains(&id) {
            Ok(CrtcInfo::default())
        } else {
            Err(not_found())
        }
    }

    fn plane_info(&self, id: u32) -> io::Result<PlaneInfo> {
        self.planes
            .iter()
            .find(|(p, _)| *p == id)
            .map(|(_, info)| *info)
            .ok_or_else(not_found)
    }

    fn object_properties(&self, id: u32, ty: ObjectType) -> io::Result<Vec<(u32, u64)>> {
        self.properties.get(&(ty, id)).cloned().ok_or_else(not_found)
    }

    fn property_info(&self, id: u32) -> io::Result<PropertyInfo> {
        self.property_infos.get(&id).cloned().ok_or_else(not_found)
    }

    fn create_property_blob(&self, _data: &[u8]) -> io::Result<u32> {
        self.check(Fail::BlobCreate)?;
        let id = self.next_blob.get() + 1;
        self.next_blob.set(id);
        self.live_blobs.borrow_mut().push(id);
        Ok(id)
    }

    fn destroy_property_blob(&self, id: u32) -> io::Result<()> {
        self.destroyed_blobs.borrow_mut().push(id);
        self.check(Fail::BlobDestroy)?;
        let mut live = self.live_blobs.borrow_mut();
        let pos = live.iter().position(|&b| b == id).ok_or_else(not_found)?;
        live.remove(pos);
        Ok(())
    }
}

/// Two CRTCs, two encoders each tied to one CRTC, an internal panel already lit through the
/// first encoder and an external monitor with nothing configured.
pub fn scenario_a() -> FakeCard {
    FakeCard::new()
        .crtc(20)
        .crtc(21)
        .encoder(30, Some(20), 0b01)
        .encoder(31, None, 0b10)
        .connector(
            40,
            Interface::EmbeddedDisplayPort,
            ConnectionState::Connected,
            Some(30),
            &[30],
        )
        .connector(
            41,
            Interface::HDMIA,
            ConnectionState::Connected,
            None,
            &[30, 31],
        )
        .plane(50, PlaneType::Primary, 0b01)
        .plane(51, PlaneType::Primary, 0b10)
        .plane(52, PlaneType::Cursor, 0b11)
}
