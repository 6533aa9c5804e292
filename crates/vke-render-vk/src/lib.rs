// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
//! Vulkan presentation backend: device bootstrap, window swapchain and the
//! Dear ImGui overlay, exposed to the frame cycle as a [`SwapchainBackend`].

mod context;
mod debug;
mod overlay;
pub mod result;
mod rollback;
pub mod select;
mod surface;

use std::time::Duration;

use anyhow::{Context, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::info;
use vke_render::{Acquired, FrameError, Presented, RenderSize, SwapchainBackend};

pub use context::{ContextOptions, DeviceContext};
pub use overlay::Overlay;
pub use result::WaitTimeout;
pub use select::PresentPreference;
pub use surface::{PresentationSurface, SurfaceOptions};

/// Vulkan header version this crate was built against.
pub const VK_HEADER_VERSION: u32 = ash::vk::HEADER_VERSION;

#[derive(Clone, Debug)]
pub struct VkOptions {
    pub app_name: String,
    pub validation: bool,
    pub min_image_count: u32,
    pub present_mode: PresentPreference,
    /// Bound on acquire and fence waits; `None` waits forever.
    pub wait_timeout: Option<Duration>,
}

impl Default for VkOptions {
    fn default() -> Self {
        Self {
            app_name: "vke".to_owned(),
            validation: cfg!(debug_assertions),
            min_image_count: 2,
            present_mode: PresentPreference::default(),
            wait_timeout: None,
        }
    }
}

/// Everything the frame cycle needs to put one window on screen.
///
/// Field order is teardown order: overlay, then surface, then device.
pub struct VkBackend {
    overlay: Overlay,
    surface: PresentationSurface,
    ctx: DeviceContext,
    timeout: WaitTimeout,
}

impl Drop for VkBackend {
    fn drop(&mut self) {
        unsafe { self.ctx.device().device_wait_idle().ok() };
    }
}

impl VkBackend {
    pub fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        opts: &VkOptions,
        imgui: &mut imgui::Context,
    ) -> Result<Self> {
        let raw_display = display.display_handle().context("display handle")?.as_raw();
        let raw_window = window.window_handle().context("window handle")?.as_raw();

        let ctx = unsafe {
            DeviceContext::new(
                raw_display,
                &ContextOptions {
                    app_name: &opts.app_name,
                    validation: opts.validation,
                },
            )
        }?;
        let surface = unsafe {
            PresentationSurface::new(
                &ctx,
                raw_display,
                raw_window,
                size,
                SurfaceOptions {
                    min_image_count: opts.min_image_count,
                    present_mode: opts.present_mode,
                },
            )
        }?;
        let overlay = Overlay::new(
            &ctx,
            surface.render_pass(),
            surface.slot_count() as usize,
            imgui,
        )?;

        info!(
            "vk: backend ready ({size}, validation={})",
            ctx.validation_enabled()
        );
        Ok(Self {
            overlay,
            surface,
            ctx,
            timeout: WaitTimeout(opts.wait_timeout),
        })
    }
}

impl SwapchainBackend for VkBackend {
    type DrawList = imgui::DrawData;

    fn image_count(&self) -> u32 {
        self.surface.image_count()
    }

    fn slot_count(&self) -> u32 {
        self.surface.slot_count()
    }

    fn size(&self) -> RenderSize {
        self.surface.size()
    }

    fn acquire(&mut self, slot: u32) -> Result<Acquired, FrameError> {
        unsafe { self.surface.acquire(slot, self.timeout) }
    }

    fn wait_and_reset(&mut self, image: u32) -> Result<(), FrameError> {
        unsafe { self.surface.wait_and_reset(image, self.timeout) }
    }

    fn record_and_submit(
        &mut self,
        slot: u32,
        image: u32,
        clear: [f32; 4],
        draw: &imgui::DrawData,
    ) -> Result<(), FrameError> {
        let overlay = &mut self.overlay;
        unsafe {
            self.surface
                .record_and_submit(self.ctx.queue(), slot, image, clear, |cmd| {
                    overlay.record(cmd, draw)
                })
        }
    }

    fn present(&mut self, slot: u32, image: u32) -> Result<Presented, FrameError> {
        unsafe { self.surface.present(self.ctx.queue(), slot, image) }
    }

    fn wait_idle(&mut self) -> Result<(), FrameError> {
        result::check("queue_wait_idle", unsafe {
            self.ctx.device().queue_wait_idle(self.ctx.queue())
        })
    }

    fn rebuild(&mut self, size: RenderSize) -> Result<(), FrameError> {
        unsafe { self.surface.rebuild(size) }?;
        overlay::check_in_flight(self.surface.image_count(), self.overlay.in_flight_frames())
    }
}
