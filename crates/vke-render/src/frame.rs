// SPDX-License-Identifier: CEPL-1.0
//! Swapchain frame lifecycle: acquire → record → submit → present, plus the
//! rebuild path taken on resize or when the surface goes stale.
//!
//! The cycle is backend-agnostic. A [`SwapchainBackend`] owns the actual
//! images, fences and semaphores; [`FrameCycle`] owns the indices and the
//! decision of when to rebuild.

use tracing::{debug, info, warn};

use crate::{FrameError, RenderSize};

/// Result of asking the swapchain for its next image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquired {
    Ready(u32),
    /// Usable once more, but the swapchain should be rebuilt.
    Suboptimal(u32),
    /// No image was acquired; the swapchain must be rebuilt.
    OutOfDate,
}

/// Result of queueing an image for presentation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presented {
    Done,
    Suboptimal,
    OutOfDate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    Acquiring,
    Recording,
    Submitted,
    Presenting,
}

/// How a cycle ended, for callers that care (frame counters, logging).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    /// Zero-area surface; nothing was touched.
    Skipped,
    /// Acquire reported a stale surface; nothing was recorded.
    Dropped,
    /// Recorded and submitted, but not shown because a rebuild is pending.
    Deferred,
    Presented,
}

/// Per-window presentation resources, driven by [`FrameCycle`].
///
/// Implementations translate "stale" and "suboptimal" API results into the
/// [`Acquired`]/[`Presented`] variants and everything else into a
/// [`FrameError`].
pub trait SwapchainBackend {
    /// Finalized draw list handed to the overlay recorder.
    type DrawList: ?Sized;

    fn image_count(&self) -> u32;

    /// Number of semaphore pairs rotated by the frame slot index.
    fn slot_count(&self) -> u32;

    /// Dimensions the current swapchain was built for.
    fn size(&self) -> RenderSize;

    /// Requests the next image, signalling `slot`'s image-acquired semaphore.
    fn acquire(&mut self, slot: u32) -> Result<Acquired, FrameError>;

    /// Blocks on `image`'s fence from its previous submission, then resets
    /// the fence and the image's command pool.
    fn wait_and_reset(&mut self, image: u32) -> Result<(), FrameError>;

    fn record_and_submit(
        &mut self,
        slot: u32,
        image: u32,
        clear: [f32; 4],
        draw: &Self::DrawList,
    ) -> Result<(), FrameError>;

    fn present(&mut self, slot: u32, image: u32) -> Result<Presented, FrameError>;

    /// Waits until the queue has drained.
    fn wait_idle(&mut self) -> Result<(), FrameError>;

    /// Destroys and recreates every per-image and per-slot resource.
    /// Only called after [`SwapchainBackend::wait_idle`].
    fn rebuild(&mut self, size: RenderSize) -> Result<(), FrameError>;
}

pub struct FrameCycle<B: SwapchainBackend> {
    backend: B,
    slot: u32,
    image: u32,
    rebuild_pending: bool,
    phase: FramePhase,
    size: RenderSize,
}

impl<B: SwapchainBackend> FrameCycle<B> {
    pub fn new(backend: B) -> Self {
        let size = backend.size();
        debug_assert!(backend.image_count() >= 2, "swapchain needs two images");
        Self {
            backend,
            slot: 0,
            image: 0,
            rebuild_pending: false,
            phase: FramePhase::Idle,
            size,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }

    pub fn image(&self) -> u32 {
        self.image
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    pub fn size(&self) -> RenderSize {
        self.size
    }

    pub fn rebuild_pending(&self) -> bool {
        self.rebuild_pending
    }

    /// Forces a rebuild at the top of the next cycle.
    pub fn request_rebuild(&mut self) {
        self.rebuild_pending = true;
    }

    fn expect_phase(&self, op: &'static str, want: FramePhase) -> Result<(), FrameError> {
        if self.phase == want {
            Ok(())
        } else {
            Err(FrameError::OutOfSequence {
                op,
                phase: self.phase,
            })
        }
    }

    /// Rebuilds the swapchain when a rebuild is pending or `size` differs
    /// from the current one. Zero-area sizes never rebuild. Returns whether
    /// a rebuild happened.
    pub fn rebuild_if_needed(&mut self, size: RenderSize) -> Result<bool, FrameError> {
        self.expect_phase("rebuild_if_needed", FramePhase::Idle)?;
        if size.is_empty() || (!self.rebuild_pending && size == self.size) {
            return Ok(false);
        }

        info!(
            "swapchain rebuild {} -> {} (pending={})",
            self.size, size, self.rebuild_pending
        );
        self.backend.wait_idle()?;
        self.backend.rebuild(size)?;

        self.size = size;
        self.image = 0;
        self.slot = 0;
        self.rebuild_pending = false;
        Ok(true)
    }

    /// Acquires the next image and makes its command resources reusable.
    /// `Ok(None)` means the surface went stale and this cycle must not render.
    pub fn begin_frame(&mut self) -> Result<Option<u32>, FrameError> {
        self.expect_phase("begin_frame", FramePhase::Idle)?;
        self.phase = FramePhase::Acquiring;

        let image = match self.backend.acquire(self.slot) {
            Ok(Acquired::Ready(image)) => image,
            Ok(Acquired::Suboptimal(image)) => {
                debug!("acquire: suboptimal surface, rebuild scheduled");
                self.rebuild_pending = true;
                image
            }
            Ok(Acquired::OutOfDate) => {
                warn!("acquire: surface out of date, frame dropped");
                self.rebuild_pending = true;
                self.phase = FramePhase::Idle;
                return Ok(None);
            }
            Err(e) => {
                self.phase = FramePhase::Idle;
                return Err(e);
            }
        };

        if let Err(e) = self.backend.wait_and_reset(image) {
            self.phase = FramePhase::Idle;
            return Err(e);
        }

        self.image = image;
        self.phase = FramePhase::Recording;
        Ok(Some(image))
    }

    pub fn record_and_submit(
        &mut self,
        clear: [f32; 4],
        draw: &B::DrawList,
    ) -> Result<(), FrameError> {
        self.expect_phase("record_and_submit", FramePhase::Recording)?;
        if let Err(e) = self
            .backend
            .record_and_submit(self.slot, self.image, clear, draw)
        {
            self.phase = FramePhase::Idle;
            return Err(e);
        }
        self.phase = FramePhase::Submitted;
        Ok(())
    }

    /// Presents the submitted image. Skipped while a rebuild is pending.
    /// Returns whether the image was queued for presentation.
    pub fn present_frame(&mut self) -> Result<bool, FrameError> {
        self.expect_phase("present_frame", FramePhase::Submitted)?;
        if self.rebuild_pending {
            self.phase = FramePhase::Idle;
            return Ok(false);
        }

        self.phase = FramePhase::Presenting;
        let outcome = self.backend.present(self.slot, self.image);
        self.phase = FramePhase::Idle;

        match outcome? {
            Presented::Done => {}
            Presented::Suboptimal => {
                debug!("present: suboptimal surface, rebuild scheduled");
                self.rebuild_pending = true;
            }
            Presented::OutOfDate => {
                warn!("present: surface out of date");
                self.rebuild_pending = true;
                return Ok(false);
            }
        }
        self.slot = (self.slot + 1) % self.backend.slot_count();
        Ok(true)
    }

    /// Acquire, record, submit and present one frame against the current
    /// swapchain.
    pub fn draw_frame(
        &mut self,
        clear: [f32; 4],
        draw: &B::DrawList,
    ) -> Result<FrameStatus, FrameError> {
        if self.begin_frame()?.is_none() {
            return Ok(FrameStatus::Dropped);
        }
        self.record_and_submit(clear, draw)?;
        Ok(if self.present_frame()? {
            FrameStatus::Presented
        } else {
            FrameStatus::Deferred
        })
    }

    /// One full cycle for a window currently reporting `size`.
    pub fn run_frame(
        &mut self,
        size: RenderSize,
        clear: [f32; 4],
        draw: &B::DrawList,
    ) -> Result<FrameStatus, FrameError> {
        if size.is_empty() {
            return Ok(FrameStatus::Skipped);
        }
        self.rebuild_if_needed(size)?;
        self.draw_frame(clear, draw)
    }
}
