//! Type definitions for the DRM subsystem.
//!
//! Owned kernel objects (`Connector`, `Encoder`, `Crtc`, `Plane`) live in the device's
//! collections; everything else refers to them by kernel id or by index into those collections.

use std::fmt;

use smithay::reexports::drm::control::connector::{Interface, State as ConnectionState};
use smithay::reexports::drm::control::PlaneType;

// =============================================================================
// Identifiers
// =============================================================================

/// Logical display slot. Ordinal, not a kernel id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DisplayId(pub u32);

impl fmt::Display for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl DisplayId {
    pub fn get(self) -> u32 {
        self.0
    }

    /// The following id, or `None` once the id space is exhausted.
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

/// Kernel object types that carry properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Connector,
    Crtc,
    Plane,
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectType::Connector => "connector",
            ObjectType::Crtc => "CRTC",
            ObjectType::Plane => "plane",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Kernel Snapshots
// =============================================================================

/// Minimum and maximum framebuffer size reported by the resource query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionBounds {
    pub min: (u32, u32),
    pub max: (u32, u32),
}

/// Raw result of the card resource query. Ids are in kernel order.
#[derive(Debug, Clone, Default)]
pub struct ResourceSnapshot {
    pub crtcs: Vec<u32>,
    pub encoders: Vec<u32>,
    pub connectors: Vec<u32>,
    pub bounds: ResolutionBounds,
}

#[derive(Debug, Clone)]
pub struct ConnectorInfo {
    pub interface: Interface,
    pub interface_id: u32,
    pub state: ConnectionState,
    pub current_encoder: Option<u32>,
    pub encoders: Vec<u32>,
}

#[derive(Debug, Clone, Copy)]
pub struct EncoderInfo {
    pub current_crtc: Option<u32>,
    /// Bit `n` set means the encoder can be driven by the CRTC with index `n`.
    pub possible_crtcs: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CrtcInfo {
    /// Size of the currently programmed mode, if any.
    pub mode_size: Option<(u16, u16)>,
}

#[derive(Debug, Clone, Copy)]
pub struct PlaneInfo {
    pub current_crtc: Option<u32>,
    pub possible_crtcs: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Unknown,
    Boolean,
    Range,
    SignedRange,
    Enum,
    Bitmask,
    Blob,
    Object,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    pub name: String,
    pub kind: PropertyKind,
    pub immutable: bool,
    pub atomic: bool,
}

/// A property resolved on a specific object, together with its current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDescriptor {
    pub object_id: u32,
    pub id: u32,
    pub name: String,
    pub kind: PropertyKind,
    pub immutable: bool,
    pub atomic: bool,
    pub value: u64,
}

// =============================================================================
// Owned Objects
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crtc {
    pub(crate) id: u32,
    pub(crate) index: usize,
    pub(crate) mode_size: Option<(u16, u16)>,
    pub(crate) active_prop: u32,
    pub(crate) mode_id_prop: u32,
}

impl Crtc {
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Position of this CRTC in the kernel's list; the bit it occupies in possible-CRTC masks.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn mode_size(&self) -> Option<(u16, u16)> {
        self.mode_size
    }

    pub fn active_property(&self) -> u32 {
        self.active_prop
    }

    pub fn mode_id_property(&self) -> u32 {
        self.mode_id_prop
    }

    pub(crate) fn mask(&self) -> u32 {
        1u32.checked_shl(self.index as u32).unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoder {
    pub(crate) id: u32,
    pub(crate) index: usize,
    pub(crate) current_crtc: Option<u32>,
    pub(crate) possible_crtcs: u32,
}

impl Encoder {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current_crtc(&self) -> Option<u32> {
        self.current_crtc
    }

    pub fn possible_crtcs(&self) -> u32 {
        self.possible_crtcs
    }

    pub fn supports_crtc(&self, crtc: &Crtc) -> bool {
        self.possible_crtcs & crtc.mask() != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connector {
    pub(crate) id: u32,
    pub(crate) index: usize,
    pub(crate) interface: Interface,
    pub(crate) interface_id: u32,
    pub(crate) state: ConnectionState,
    pub(crate) current_encoder: Option<u32>,
    pub(crate) encoders: Vec<u32>,
    pub(crate) crtc_id_prop: u32,
}

impl Connector {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn interface(&self) -> Interface {
        self.interface
    }

    /// Connector name as the kernel reports it, e.g. `eDP-1`.
    pub fn name(&self) -> String {
        format!("{}-{}", self.interface.as_str(), self.interface_id)
    }

    /// Connection state sampled at enumeration time.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Built-in panels: laptop screens, phone and tablet displays, virtual outputs.
    pub fn is_internal(&self) -> bool {
        matches!(
            self.interface,
            Interface::LVDS
                | Interface::EmbeddedDisplayPort
                | Interface::DSI
                | Interface::DPI
                | Interface::Virtual
        )
    }

    pub fn is_external(&self) -> bool {
        !self.is_internal() && !self.is_writeback()
    }

    pub fn is_writeback(&self) -> bool {
        self.interface == Interface::Writeback
    }

    pub fn current_encoder(&self) -> Option<u32> {
        self.current_encoder
    }

    pub fn encoders(&self) -> &[u32] {
        &self.encoders
    }

    pub fn supports_encoder(&self, encoder: &Encoder) -> bool {
        self.encoders.contains(&encoder.id)
    }

    pub fn crtc_id_property(&self) -> u32 {
        self.crtc_id_prop
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plane {
    pub(crate) id: u32,
    pub(crate) ty: PlaneType,
    pub(crate) current_crtc: Option<u32>,
    pub(crate) possible_crtcs: u32,
}

impl Plane {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn plane_type(&self) -> PlaneType {
        self.ty
    }

    pub fn current_crtc(&self) -> Option<u32> {
        self.current_crtc
    }

    pub fn supports_crtc(&self, crtc: &Crtc) -> bool {
        self.possible_crtcs & crtc.mask() != 0
    }
}

/// A display slot together with the objects that drive it.
#[derive(Debug, Clone, Copy)]
pub struct DisplayPipeline<'a> {
    pub display: DisplayId,
    pub connector: &'a Connector,
    pub encoder: &'a Encoder,
    pub crtc: &'a Crtc,
}
