#[macro_use]
extern crate tracing;

pub mod drm;
pub mod registry;
