// SPDX-License-Identifier: CEPL-1.0
mod clear;
mod error;
pub mod frame;

pub use clear::ClearColor;
pub use error::FrameError;
pub use frame::{
    Acquired, FrameCycle, FramePhase, FrameStatus, Presented, SwapchainBackend,
};

/// Pixel dimensions of a drawable surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A zero in either dimension means there is nothing to draw into.
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for RenderSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
