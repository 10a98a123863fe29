use crate::dom::{FrameHost, ProbeError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginMode {
    Unknown,
    SameOrigin,
    CrossOrigin,
}

/// Probes whether the frame's document is scriptable from the parent.
///
/// Only a readable, non-null `contentDocument` counts as same-origin. A
/// security error, a null document, or any other failure resolves to
/// cross-origin, the more restrictive mode.
pub fn probe_origin<H: FrameHost>(host: &H) -> (OriginMode, Option<H::Document>) {
    match host.content_document() {
        Ok(Some(document)) => {
            debug!("frame document readable, same-origin");
            (OriginMode::SameOrigin, Some(document))
        }
        Ok(None) => {
            debug!("frame document is null, treating as cross-origin");
            (OriginMode::CrossOrigin, None)
        }
        Err(ProbeError::Security(reason)) => {
            debug!(%reason, "frame document blocked, cross-origin");
            (OriginMode::CrossOrigin, None)
        }
        Err(ProbeError::Other(reason)) => {
            warn!(%reason, "origin probe failed, falling back to cross-origin");
            (OriginMode::CrossOrigin, None)
        }
    }
}
