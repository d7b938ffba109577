use std::path::PathBuf;
use std::{error, fmt, io};

use super::types::DisplayId;

/// Errors from device initialization and the services a device exposes.
#[derive(Debug)]
pub enum DrmError {
    /// The device node could not be opened.
    NoDevice { path: PathBuf, source: io::Error },
    /// A required client capability was refused by the driver.
    CapabilityUnsupported {
        capability: &'static str,
        source: io::Error,
    },
    /// DRM master could not be acquired.
    AccessDenied(io::Error),
    /// The resource or plane-resource query failed.
    NoResources {
        query: &'static str,
        source: io::Error,
    },
    /// A connector exhausted every encoder/CRTC candidate.
    NoSuitableEncoder { connector: u32, display: DisplayId },
    /// A display was offered a second CRTC.
    DisplayAlreadyBound { display: DisplayId },
    /// No display id is left after `last`.
    DisplayIdsExhausted { last: DisplayId },
    PropertyNotFound { object: u32, name: String },
    PropertyQueryFailed { object: u32, source: io::Error },
    BlobCreateFailed(io::Error),
}

impl fmt::Display for DrmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrmError::NoDevice { path, .. } => write!(f, "error opening DRM device {path:?}"),
            DrmError::CapabilityUnsupported { capability, .. } => {
                write!(f, "error enabling the {capability} client capability")
            }
            DrmError::AccessDenied(_) => f.write_str("DRM master access is required"),
            DrmError::NoResources { query, .. } => write!(f, "error getting {query}"),
            DrmError::NoSuitableEncoder { connector, display } => {
                write!(f, "no free encoder/CRTC for connector {connector} (display {display})")
            }
            DrmError::DisplayAlreadyBound { display } => {
                write!(f, "display {display} already has a CRTC")
            }
            DrmError::DisplayIdsExhausted { last } => {
                write!(f, "no display ids left after {last}")
            }
            DrmError::PropertyNotFound { object, name } => {
                write!(f, "couldn't find property {name:?} on object {object}")
            }
            DrmError::PropertyQueryFailed { object, .. } => {
                write!(f, "error getting properties for object {object}")
            }
            DrmError::BlobCreateFailed(_) => f.write_str("error creating property blob"),
        }
    }
}

impl error::Error for DrmError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            DrmError::NoDevice { source, .. }
            | DrmError::CapabilityUnsupported { source, .. }
            | DrmError::NoResources { source, .. }
            | DrmError::PropertyQueryFailed { source, .. }
            | DrmError::AccessDenied(source)
            | DrmError::BlobCreateFailed(source) => Some(source),
            DrmError::NoSuitableEncoder { .. }
            | DrmError::DisplayAlreadyBound { .. }
            | DrmError::DisplayIdsExhausted { .. }
            | DrmError::PropertyNotFound { .. } => None,
        }
    }
}
