//! Display pipeline assignment.
//!
//! Every display connector gets a display id and an encoder/CRTC pair to drive it:
//!
//! - Display ids go to connectors by priority class (internal connected, external connected,
//!   internal disconnected, external disconnected), so the first display is a lit built-in
//!   panel whenever there is one. Within a class the kernel order is kept.
//! - Pipes are then created connector by connector in kernel order. The configuration the kernel
//!   already has (connector → encoder → CRTC) is preferred; otherwise the first free compatible
//!   encoder and CRTC win.
//! - A connector that can't get a pipe fails the whole assignment.
//!
//! All objects are referenced by index into the device-owned slices.

use std::collections::{BTreeMap, HashMap};

use super::error::DrmError;
use super::types::{Connector, Crtc, DisplayId, Encoder};

/// Indices of the objects driving one display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayPipe {
    pub connector: usize,
    pub encoder: usize,
    pub crtc: usize,
}

/// The result of a successful assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    pipes: BTreeMap<DisplayId, DisplayPipe>,
    connector_displays: HashMap<usize, DisplayId>,
    next_display: DisplayId,
}

impl Assignment {
    pub fn pipe(&self, display: DisplayId) -> Option<&DisplayPipe> {
        self.pipes.get(&display)
    }

    pub fn display_for_connector(&self, connector: usize) -> Option<DisplayId> {
        self.connector_displays.get(&connector).copied()
    }

    /// Pipes in display id order.
    pub fn iter(&self) -> impl Iterator<Item = (DisplayId, &DisplayPipe)> {
        self.pipes.iter().map(|(display, pipe)| (*display, pipe))
    }

    pub fn len(&self) -> usize {
        self.pipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipes.is_empty()
    }

    /// First display id after the ones this assignment allocated.
    pub fn next_display(&self) -> DisplayId {
        self.next_display
    }
}

/// Outcome of trying to drive a display through one encoder.
#[derive(Debug)]
enum EncoderBinding {
    Bound { crtc: usize },
    /// This encoder has no free CRTC; another encoder may still work.
    TryNext,
    Fatal(DrmError),
}

/// Connector priority class, lower is preferred.
fn priority_class(connector: &Connector) -> u8 {
    match (connector.is_internal(), connector.is_connected()) {
        (true, true) => 0,
        (false, true) => 1,
        (true, false) => 2,
        (false, false) => 3,
    }
}

/// Connector indices in the order display ids are handed out.
pub fn display_order(connectors: &[Connector]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..connectors.len()).collect();
    // Stable, so kernel order is kept within a class.
    order.sort_by_key(|&idx| priority_class(&connectors[idx]));
    order
}

/// Binding state for one assignment run.
struct PipelineAssigner<'a> {
    connectors: &'a [Connector],
    encoders: &'a [Encoder],
    crtcs: &'a [Crtc],

    /// Display ids handed out by priority, before any pipe exists.
    planned: HashMap<usize, DisplayId>,

    display_connectors: BTreeMap<DisplayId, usize>,
    display_crtcs: BTreeMap<DisplayId, usize>,
    crtc_encoders: HashMap<usize, usize>,
    encoder_displays: HashMap<usize, DisplayId>,
}

impl<'a> PipelineAssigner<'a> {
    fn new(connectors: &'a [Connector], encoders: &'a [Encoder], crtcs: &'a [Crtc]) -> Self {
        Self {
            connectors,
            encoders,
            crtcs,
            planned: HashMap::new(),
            display_connectors: BTreeMap::new(),
            display_crtcs: BTreeMap::new(),
            crtc_encoders: HashMap::new(),
            encoder_displays: HashMap::new(),
        }
    }

    fn find_encoder(&self, id: u32) -> Option<usize> {
        self.encoders.iter().position(|enc| enc.id == id)
    }

    fn find_crtc(&self, id: u32) -> Option<usize> {
        self.crtcs.iter().position(|crtc| crtc.id == id)
    }

    fn is_crtc_claimed(&self, crtc: usize) -> bool {
        self.crtc_encoders.contains_key(&crtc)
    }

    fn is_encoder_claimed(&self, encoder: usize) -> bool {
        self.encoder_displays.contains_key(&encoder)
    }

    /// Hands out display ids starting at `first`, returns the next free one.
    fn plan_displays(&mut self, first: DisplayId) -> Result<DisplayId, DrmError> {
        let mut display = first;
        for idx in display_order(self.connectors) {
            self.planned.insert(idx, display);
            display = display
                .next()
                .ok_or(DrmError::DisplayIdsExhausted { last: display })?;
        }
        Ok(display)
    }

    fn try_encoder_for_display(&self, display: DisplayId, encoder: usize) -> EncoderBinding {
        if self.display_crtcs.contains_key(&display) {
            return EncoderBinding::Fatal(DrmError::DisplayAlreadyBound { display });
        }

        let enc = &self.encoders[encoder];

        // Keep what the kernel already has set up.
        if let Some(crtc) = enc.current_crtc.and_then(|id| self.find_crtc(id)) {
            if !self.is_crtc_claimed(crtc) {
                return EncoderBinding::Bound { crtc };
            }
        }

        for (idx, crtc) in self.crtcs.iter().enumerate() {
            if !enc.supports_crtc(crtc) || Some(crtc.id) == enc.current_crtc {
                continue;
            }

            if !self.is_crtc_claimed(idx) {
                return EncoderBinding::Bound { crtc: idx };
            }
        }

        EncoderBinding::TryNext
    }

    fn bind(&mut self, display: DisplayId, connector: usize, encoder: usize, crtc: usize) {
        // tracing's macros bring `field::display` into scope, shadowing the parameter.
        let display_id = display;
        trace!(
            "display {display_id}: connector {}, encoder {}, CRTC {}",
            self.connectors[connector].id,
            self.encoders[encoder].id,
            self.crtcs[crtc].id,
        );

        self.display_connectors.insert(display, connector);
        self.display_crtcs.insert(display, crtc);
        self.crtc_encoders.insert(crtc, encoder);
        self.encoder_displays.insert(encoder, display);
    }

    fn create_display_pipe(&mut self, connector: usize) -> Result<(), DrmError> {
        let connectors = self.connectors;
        let conn = &connectors[connector];
        let display = self.planned[&connector];

        let current = conn
            .current_encoder
            .and_then(|id| self.find_encoder(id))
            .filter(|&enc| !self.is_encoder_claimed(enc));

        if let Some(encoder) = current {
            match self.try_encoder_for_display(display, encoder) {
                EncoderBinding::Bound { crtc } => {
                    self.bind(display, connector, encoder, crtc);
                    return Ok(());
                }
                EncoderBinding::TryNext => {
                    debug!(
                        "current encoder of connector {} has no free CRTC, searching",
                        conn.id
                    );
                }
                EncoderBinding::Fatal(err) => return Err(err),
            }
        }

        for encoder in 0..self.encoders.len() {
            if Some(encoder) == current
                || !conn.supports_encoder(&self.encoders[encoder])
                || self.is_encoder_claimed(encoder)
            {
                continue;
            }

            match self.try_encoder_for_display(display, encoder) {
                EncoderBinding::Bound { crtc } => {
                    self.bind(display, connector, encoder, crtc);
                    return Ok(());
                }
                EncoderBinding::TryNext => (),
                EncoderBinding::Fatal(err) => return Err(err),
            }
        }

        Err(DrmError::NoSuitableEncoder {
            connector: conn.id,
            display,
        })
    }

    fn finish(self, next_display: DisplayId) -> Assignment {
        let pipes = self
            .display_connectors
            .iter()
            .map(|(&display, &connector)| {
                let crtc = self.display_crtcs[&display];
                let encoder = self.crtc_encoders[&crtc];
                (
                    display,
                    DisplayPipe {
                        connector,
                        encoder,
                        crtc,
                    },
                )
            })
            .collect();

        let connector_displays = self
            .display_connectors
            .iter()
            .map(|(&display, &connector)| (connector, display))
            .collect();

        Assignment {
            pipes,
            connector_displays,
            next_display,
        }
    }
}

/// Assigns a pipe to every connector, numbering displays from `first_display`.
pub fn assign(
    connectors: &[Connector],
    encoders: &[Encoder],
    crtcs: &[Crtc],
    first_display: DisplayId,
) -> Result<Assignment, DrmError> {
    let _span = tracy_client::span!("assign");

    let mut assigner = PipelineAssigner::new(connectors, encoders, crtcs);
    let next_display = assigner.plan_displays(first_display)?;

    for connector in 0..connectors.len() {
        assigner.create_display_pipe(connector)?;
    }

    Ok(assigner.finish(next_display))
}
