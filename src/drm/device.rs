//! A single mode-setting device.
//!
//! `DisplayDevice` owns the kernel handle and every object enumerated from it. Initialization
//! negotiates capabilities, enumerates resources and assigns pipelines in one step; a device
//! that exists has a complete, immutable assignment.

use std::path::Path;

use super::blob::ScopedBlob;
use super::caps::{negotiate, Capabilities};
use super::error::DrmError;
use super::helpers::get_property;
use super::kernel::{Card, KmsCard};
use super::pipeline::{assign, Assignment, DisplayPipe};
use super::resources::{enumerate, Resources};
use super::types::{
    Connector, Crtc, DisplayId, DisplayPipeline, Encoder, ObjectType, Plane, PropertyDescriptor,
};

/// Driver name reported when the kernel version query fails.
const FALLBACK_DRIVER_NAME: &str = "generic";

pub struct DisplayDevice<C: KmsCard = Card> {
    card: C,
    capabilities: Capabilities,
    resources: Resources,
    assignment: Assignment,
}

impl DisplayDevice<Card> {
    /// Opens the node at `path` and initializes it.
    pub fn open(path: &Path, first_display: DisplayId) -> Result<Self, DrmError> {
        let card = Card::open(path)?;
        Self::init(card, first_display)
    }

    pub fn path(&self) -> &Path {
        self.card.path()
    }
}

impl<C: KmsCard> DisplayDevice<C> {
    /// Negotiates capabilities, enumerates resources and assigns a pipeline to every connector.
    ///
    /// Display ids are allocated starting at `first_display`.
    pub fn init(card: C, first_display: DisplayId) -> Result<Self, DrmError> {
        let _span = tracy_client::span!("DisplayDevice::init");

        let capabilities = negotiate(&card)?;
        let resources = enumerate(&card)?;
        let assignment = assign(
            &resources.connectors,
            &resources.encoders,
            &resources.crtcs,
            first_display,
        )?;

        let device = Self {
            card,
            capabilities,
            resources,
            assignment,
        };

        for pipeline in device.pipelines() {
            debug!(
                "display {}: {} on CRTC {} (encoder {})",
                pipeline.display,
                pipeline.connector.name(),
                pipeline.crtc.id(),
                pipeline.encoder.id(),
            );
        }

        Ok(device)
    }

    // === Core Accessors ===

    pub fn card(&self) -> &C {
        &self.card
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Kernel driver name, or `"generic"` if it can't be queried.
    pub fn name(&self) -> String {
        match self.card.driver_name() {
            Ok(name) => name,
            Err(err) => {
                debug!("error getting driver name: {err:?}");
                String::from(FALLBACK_DRIVER_NAME)
            }
        }
    }

    pub fn has_addfb2_modifiers_support(&self) -> bool {
        self.capabilities.contains(Capabilities::ADDFB2_MODIFIERS)
    }

    pub fn min_resolution(&self) -> (u32, u32) {
        self.resources.bounds.min
    }

    pub fn max_resolution(&self) -> (u32, u32) {
        self.resources.bounds.max
    }

    pub fn connectors(&self) -> &[Connector] {
        &self.resources.connectors
    }

    pub fn writeback_connectors(&self) -> &[Connector] {
        &self.resources.writeback_connectors
    }

    pub fn encoders(&self) -> &[Encoder] {
        &self.resources.encoders
    }

    pub fn crtcs(&self) -> &[Crtc] {
        &self.resources.crtcs
    }

    pub fn planes(&self) -> &[Plane] {
        &self.resources.planes
    }

    pub fn find_crtc_by_id(&self, id: u32) -> Option<&Crtc> {
        self.resources.crtcs.iter().find(|crtc| crtc.id() == id)
    }

    pub fn find_encoder_by_id(&self, id: u32) -> Option<&Encoder> {
        self.resources.encoders.iter().find(|enc| enc.id() == id)
    }

    // === Display Pipelines ===

    pub fn handles_display(&self, display: DisplayId) -> bool {
        self.assignment.pipe(display).is_some()
    }

    /// Number of displays this device drives.
    pub fn display_count(&self) -> usize {
        self.assignment.len()
    }

    /// Display ids of this device, in order.
    pub fn displays(&self) -> impl Iterator<Item = DisplayId> + '_ {
        self.assignment.iter().map(|(display, _)| display)
    }

    /// First display id after the ones this device allocated.
    pub fn next_display(&self) -> DisplayId {
        self.assignment.next_display()
    }

    fn resolve(&self, display: DisplayId, pipe: &DisplayPipe) -> DisplayPipeline<'_> {
        DisplayPipeline {
            display,
            connector: &self.resources.connectors[pipe.connector],
            encoder: &self.resources.encoders[pipe.encoder],
            crtc: &self.resources.crtcs[pipe.crtc],
        }
    }

    pub fn pipeline(&self, display: DisplayId) -> Option<DisplayPipeline<'_>> {
        let pipe = self.assignment.pipe(display)?;
        Some(self.resolve(display, pipe))
    }

    pub fn pipelines(&self) -> impl Iterator<Item = DisplayPipeline<'_>> + '_ {
        self.assignment
            .iter()
            .map(|(display, pipe)| self.resolve(display, pipe))
    }

    pub fn connector_for_display(&self, display: DisplayId) -> Option<&Connector> {
        self.pipeline(display).map(|pipeline| pipeline.connector)
    }

    pub fn encoder_for_display(&self, display: DisplayId) -> Option<&Encoder> {
        self.pipeline(display).map(|pipeline| pipeline.encoder)
    }

    pub fn crtc_for_display(&self, display: DisplayId) -> Option<&Crtc> {
        self.pipeline(display).map(|pipeline| pipeline.crtc)
    }

    /// Display id driven through the connector with kernel id `connector`.
    pub fn display_for_connector(&self, connector: u32) -> Option<DisplayId> {
        let idx = self
            .resources
            .connectors
            .iter()
            .position(|conn| conn.id() == connector)?;
        self.assignment.display_for_connector(idx)
    }

    // === Kernel Services ===

    pub fn property(
        &self,
        object_id: u32,
        ty: ObjectType,
        name: &str,
    ) -> Result<PropertyDescriptor, DrmError> {
        get_property(&self.card, object_id, ty, name)
    }

    /// Uploads a blob that lives until the returned handle is dropped.
    pub fn register_user_property_blob(
        &self,
        data: &[u8],
    ) -> Result<ScopedBlob<'_, C>, DrmError> {
        ScopedBlob::create(&self.card, data)
    }
}
