// SPDX-License-Identifier: CEPL-1.0
use thiserror::Error;

use crate::frame::FramePhase;

/// Steady-state failures of the frame cycle. Every variant is fatal: stale
/// or suboptimal surfaces never reach this type, they only schedule a rebuild.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("{call} failed: {code}")]
    Api { call: &'static str, code: String },

    #[error("{call} did not complete within {timeout_ms} ms")]
    Timeout { call: &'static str, timeout_ms: u64 },

    #[error("overlay recording failed: {0}")]
    Overlay(String),

    #[error("swapchain unusable: {0}")]
    Swapchain(String),

    #[error("{op} called in phase {phase:?}")]
    OutOfSequence { op: &'static str, phase: FramePhase },
}

impl FrameError {
    pub fn api(call: &'static str, code: impl std::fmt::Debug) -> Self {
        Self::Api {
            call,
            code: format!("{code:?}"),
        }
    }
}
