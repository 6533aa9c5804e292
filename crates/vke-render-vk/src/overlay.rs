// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use ash::vk;
use imgui_rs_vulkan_renderer::{Options, Renderer};
use tracing::info;
use vke_render::FrameError;

use crate::context::DeviceContext;

/// Dear ImGui draw-list recorder bound to the surface's render pass.
pub struct Overlay {
    renderer: Renderer,
    in_flight_frames: usize,
}

/// The renderer rotates `in_flight_frames` vertex/index buffers, one per
/// draw. With one fence per image, up to `image_count` draws can still be
/// read by the GPU, so the rotation must be longer than that.
pub fn check_in_flight(image_count: u32, in_flight_frames: usize) -> Result<(), FrameError> {
    if image_count as usize >= in_flight_frames {
        return Err(FrameError::Overlay(format!(
            "swapchain has {image_count} images but the overlay only buffers \
             {in_flight_frames} frames"
        )));
    }
    Ok(())
}

impl Overlay {
    /// Builds the pipeline and uploads the font atlas of `imgui`.
    ///
    /// `in_flight_frames` must cover every frame that can be in flight at
    /// once, so vertex buffers are never overwritten while the GPU reads them.
    pub fn new(
        ctx: &DeviceContext,
        render_pass: vk::RenderPass,
        in_flight_frames: usize,
        imgui: &mut imgui::Context,
    ) -> Result<Self> {
        let upload_pool = ctx.create_transient_pool()?;
        let renderer = Renderer::with_default_allocator(
            ctx.instance(),
            ctx.physical_device(),
            ctx.device().clone(),
            ctx.queue(),
            upload_pool,
            render_pass,
            imgui,
            Some(Options {
                in_flight_frames,
                ..Default::default()
            }),
        );
        // The font upload has completed by the time the renderer returns.
        unsafe { ctx.device().destroy_command_pool(upload_pool, None) };
        let renderer = renderer.context("create imgui renderer")?;
        info!("vk: overlay ready ({in_flight_frames} frames in flight)");
        Ok(Self {
            renderer,
            in_flight_frames,
        })
    }

    pub fn in_flight_frames(&self) -> usize {
        self.in_flight_frames
    }

    /// Records `draw_data` into `cmd`, which must be inside the render pass.
    pub fn record(
        &mut self,
        cmd: vk::CommandBuffer,
        draw_data: &imgui::DrawData,
    ) -> Result<(), FrameError> {
        self.renderer
            .cmd_draw(cmd, draw_data)
            .map_err(|e| FrameError::Overlay(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_must_outlast_images() {
        assert!(check_in_flight(2, 3).is_ok());
        assert!(check_in_flight(3, 4).is_ok());
        assert!(matches!(check_in_flight(3, 3), Err(FrameError::Overlay(_))));
        assert!(matches!(check_in_flight(4, 3), Err(FrameError::Overlay(_))));
    }
}
