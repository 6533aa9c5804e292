// SPDX-License-Identifier: CEPL-1.0
use anyhow::{bail, Context, Result};
use ash::khr::{surface, swapchain};
use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use tracing::info;
use vke_render::{Acquired, FrameError, Presented, RenderSize};

use crate::context::DeviceContext;
use crate::result::{self, check, WaitTimeout};
use crate::rollback::Rollback;
use crate::select::{self, PresentPreference};

#[derive(Clone, Copy, Debug)]
pub struct SurfaceOptions {
    pub min_image_count: u32,
    pub present_mode: PresentPreference,
}

/// Everything tied to one swapchain image.
struct ImageFrame {
    view: vk::ImageView,
    framebuffer: vk::Framebuffer,
    pool: vk::CommandPool,
    cmd: vk::CommandBuffer,
    fence: vk::Fence,
}

/// Semaphore pair rotated by the frame slot index.
struct SlotSync {
    image_acquired: vk::Semaphore,
    render_complete: vk::Semaphore,
}

/// Window surface, swapchain, render pass and the per-image/per-slot
/// resources built on top of them.
///
/// Must be dropped before the [`DeviceContext`] it was created from.
pub struct PresentationSurface {
    device: ash::Device,
    surface_loader: surface::Instance,
    swapchain_loader: swapchain::Device,
    phys: vk::PhysicalDevice,
    queue_family: u32,

    surface: vk::SurfaceKHR,
    format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    min_image_count: u32,
    render_pass: vk::RenderPass,

    swapchain: vk::SwapchainKHR,
    extent: vk::Extent2D,
    size: RenderSize,
    frames: Vec<ImageFrame>,
    slots: Vec<SlotSync>,
}

// STRICT TEARDOWN ORDER:
// - device idle
// - per-image (framebuffer, view, pool, fence) and per-slot semaphores
// - render pass, then swapchain, then surface
impl Drop for PresentationSurface {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();
            self.destroy_frames();
            self.device.destroy_render_pass(self.render_pass, None);
            self.swapchain_loader
                .destroy_swapchain(self.swapchain, None);
            self.surface_loader.destroy_surface(self.surface, None);
        }
        info!("vk: presentation surface destroyed");
    }
}

unsafe fn create_render_pass(
    device: &ash::Device,
    format: vk::Format,
) -> Result<vk::RenderPass, FrameError> {
    let color_att = vk::AttachmentDescription {
        format,
        samples: vk::SampleCountFlags::TYPE_1,
        load_op: vk::AttachmentLoadOp::CLEAR,
        store_op: vk::AttachmentStoreOp::STORE,
        stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
        stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
        initial_layout: vk::ImageLayout::UNDEFINED,
        final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
        ..Default::default()
    };
    let att_ref = vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    };
    let subpass = vk::SubpassDescription {
        pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
        color_attachment_count: 1,
        p_color_attachments: &att_ref,
        ..Default::default()
    };
    // Acquire signals at COLOR_ATTACHMENT_OUTPUT; the layout transition must
    // not start before that.
    let dependency = vk::SubpassDependency {
        src_subpass: vk::SUBPASS_EXTERNAL,
        dst_subpass: 0,
        src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        src_access_mask: vk::AccessFlags::empty(),
        dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        ..Default::default()
    };
    let info = vk::RenderPassCreateInfo {
        attachment_count: 1,
        p_attachments: &color_att,
        subpass_count: 1,
        p_subpasses: &subpass,
        dependency_count: 1,
        p_dependencies: &dependency,
        ..Default::default()
    };
    check("create_render_pass", unsafe {
        device.create_render_pass(&info, None)
    })
}

impl PresentationSurface {
    pub unsafe fn new(
        ctx: &DeviceContext,
        display: RawDisplayHandle,
        window: RawWindowHandle,
        size: RenderSize,
        opts: SurfaceOptions,
    ) -> Result<Self> {
        if opts.min_image_count < 2 {
            bail!("min_image_count must be at least 2 (got {})", opts.min_image_count);
        }

        let surface_loader = surface::Instance::new(ctx.entry(), ctx.instance());
        let surface = unsafe {
            ash_window::create_surface(ctx.entry(), ctx.instance(), display, window, None)
        }
        .context("ash_window::create_surface")?;
        let mut undo = Rollback::new();
        undo.push(|| unsafe { surface_loader.destroy_surface(surface, None) });

        let phys = ctx.physical_device();
        let supported = unsafe {
            surface_loader.get_physical_device_surface_support(phys, ctx.queue_family(), surface)
        }
        .unwrap_or(false);
        if !supported {
            bail!(
                "no WSI support for queue family {} on the selected device",
                ctx.queue_family()
            );
        }

        let formats = unsafe { surface_loader.get_physical_device_surface_formats(phys, surface) }
            .context("get_physical_device_surface_formats")?;
        let modes =
            unsafe { surface_loader.get_physical_device_surface_present_modes(phys, surface) }
                .context("get_physical_device_surface_present_modes")?;
        let format = select::select_surface_format(
            &formats,
            &select::REQUESTED_FORMATS,
            select::REQUESTED_COLOR_SPACE,
        );
        let present_mode = select::select_present_mode(
            &modes,
            &[opts.present_mode.to_vk(), vk::PresentModeKHR::FIFO],
        );
        info!(
            "vk: surface format {:?}/{:?}, present mode {}",
            format.format,
            format.color_space,
            select::present_mode_name(present_mode)
        );

        let device = ctx.device().clone();
        let render_pass = unsafe { create_render_pass(&device, format.format) }?;
        undo.commit();

        let mut s = Self {
            swapchain_loader: swapchain::Device::new(ctx.instance(), &device),
            device,
            surface_loader,
            phys,
            queue_family: ctx.queue_family(),
            surface,
            format,
            present_mode,
            min_image_count: opts.min_image_count,
            render_pass,
            swapchain: vk::SwapchainKHR::null(),
            extent: vk::Extent2D::default(),
            size,
            frames: Vec::new(),
            slots: Vec::new(),
        };
        // From here on `Drop` cleans up whatever was created.
        unsafe { s.build(size) }?;
        Ok(s)
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Size the swapchain was last built for.
    pub fn size(&self) -> RenderSize {
        self.size
    }

    pub fn image_count(&self) -> u32 {
        self.frames.len() as u32
    }

    pub fn slot_count(&self) -> u32 {
        self.slots.len() as u32
    }

    unsafe fn destroy_frames(&mut self) {
        let d = &self.device;
        for f in self.frames.drain(..) {
            unsafe {
                d.destroy_fence(f.fence, None);
                // frees f.cmd with it
                d.destroy_command_pool(f.pool, None);
                d.destroy_framebuffer(f.framebuffer, None);
                d.destroy_image_view(f.view, None);
            }
        }
        for s in self.slots.drain(..) {
            unsafe {
                d.destroy_semaphore(s.image_acquired, None);
                d.destroy_semaphore(s.render_complete, None);
            }
        }
    }

    /// Creates a swapchain for `size` (retiring the current one) and every
    /// per-image and per-slot resource. Per-image resources of the old
    /// swapchain must already be gone.
    unsafe fn build(&mut self, size: RenderSize) -> Result<(), FrameError> {
        let caps = check("get_physical_device_surface_capabilities", unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(self.phys, self.surface)
        })?;
        let min_count = select::image_count(self.min_image_count, &caps);
        let extent = select::extent_from_caps(&caps, size);

        let old = self.swapchain;
        let info = vk::SwapchainCreateInfoKHR {
            surface: self.surface,
            min_image_count: min_count,
            image_format: self.format.format,
            image_color_space: self.format.color_space,
            image_extent: extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode: vk::SharingMode::EXCLUSIVE,
            pre_transform: caps.current_transform,
            composite_alpha: select::composite_alpha(caps.supported_composite_alpha),
            present_mode: self.present_mode,
            clipped: vk::TRUE,
            old_swapchain: old,
            ..Default::default()
        };
        let swapchain = check("create_swapchain", unsafe {
            self.swapchain_loader.create_swapchain(&info, None)
        })?;
        if old != vk::SwapchainKHR::null() {
            unsafe { self.swapchain_loader.destroy_swapchain(old, None) };
        }
        self.swapchain = swapchain;
        self.extent = extent;
        self.size = size;

        let images = check("get_swapchain_images", unsafe {
            self.swapchain_loader.get_swapchain_images(swapchain)
        })?;
        select::usable_image_count(images.len())?;

        for &image in &images {
            let frame = unsafe { self.create_frame(image) }?;
            self.frames.push(frame);
        }
        for _ in 0..=images.len() {
            let sem_ci = vk::SemaphoreCreateInfo::default();
            let image_acquired = check("create_semaphore", unsafe {
                self.device.create_semaphore(&sem_ci, None)
            })?;
            let render_complete = match unsafe { self.device.create_semaphore(&sem_ci, None) } {
                Ok(s) => s,
                Err(code) => {
                    unsafe { self.device.destroy_semaphore(image_acquired, None) };
                    return Err(FrameError::api("create_semaphore", code));
                }
            };
            self.slots.push(SlotSync {
                image_acquired,
                render_complete,
            });
        }

        info!(
            "vk: swapchain ready ({}x{}, {} images, {} slots)",
            extent.width,
            extent.height,
            self.frames.len(),
            self.slots.len()
        );
        Ok(())
    }

    unsafe fn create_frame(&self, image: vk::Image) -> Result<ImageFrame, FrameError> {
        let d = &self.device;
        let mut undo = Rollback::new();
        let iv_info = vk::ImageViewCreateInfo {
            image,
            view_type: vk::ImageViewType::TYPE_2D,
            format: self.format.format,
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
            ..Default::default()
        };
        let view = check("create_image_view", unsafe { d.create_image_view(&iv_info, None) })?;
        undo.push(move || unsafe { d.destroy_image_view(view, None) });

        let fb_info = vk::FramebufferCreateInfo {
            render_pass: self.render_pass,
            attachment_count: 1,
            p_attachments: &view,
            width: self.extent.width,
            height: self.extent.height,
            layers: 1,
            ..Default::default()
        };
        let framebuffer =
            check("create_framebuffer", unsafe { d.create_framebuffer(&fb_info, None) })?;
        undo.push(move || unsafe { d.destroy_framebuffer(framebuffer, None) });

        let pool_info = vk::CommandPoolCreateInfo {
            queue_family_index: self.queue_family,
            ..Default::default()
        };
        let pool = check("create_command_pool", unsafe {
            d.create_command_pool(&pool_info, None)
        })?;
        undo.push(move || unsafe { d.destroy_command_pool(pool, None) });
        let alloc_info = vk::CommandBufferAllocateInfo {
            command_pool: pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: 1,
            ..Default::default()
        };
        let cmd = check("allocate_command_buffers", unsafe {
            d.allocate_command_buffers(&alloc_info)
        })?[0];

        // Signalled so the first wait on this image returns immediately.
        let fence_info = vk::FenceCreateInfo {
            flags: vk::FenceCreateFlags::SIGNALED,
            ..Default::default()
        };
        let fence = check("create_fence", unsafe { d.create_fence(&fence_info, None) })?;
        undo.commit();

        Ok(ImageFrame {
            view,
            framebuffer,
            pool,
            cmd,
            fence,
        })
    }

    /// Recreates the swapchain and all per-image/per-slot resources for
    /// `size`. The queue must be idle.
    pub unsafe fn rebuild(&mut self, size: RenderSize) -> Result<(), FrameError> {
        unsafe {
            self.destroy_frames();
            self.build(size)
        }
    }

    pub unsafe fn acquire(&self, slot: u32, timeout: WaitTimeout) -> Result<Acquired, FrameError> {
        let sem = self.slots[slot as usize].image_acquired;
        let r = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                timeout.as_nanos(),
                sem,
                vk::Fence::null(),
            )
        };
        result::acquire_outcome(r, timeout)
    }

    pub unsafe fn wait_and_reset(&self, image: u32, timeout: WaitTimeout) -> Result<(), FrameError> {
        let f = &self.frames[image as usize];
        unsafe {
            self.device
                .wait_for_fences(&[f.fence], true, timeout.as_nanos())
                .map_err(|code| result::fatal("wait_for_fences", code, timeout))?;
            check("reset_fences", self.device.reset_fences(&[f.fence]))?;
            check(
                "reset_command_pool",
                self.device
                    .reset_command_pool(f.pool, vk::CommandPoolResetFlags::empty()),
            )
        }
    }

    /// Records one render pass into `image`'s command buffer, letting `draw`
    /// fill it, and submits it to `queue`.
    pub unsafe fn record_and_submit(
        &self,
        queue: vk::Queue,
        slot: u32,
        image: u32,
        clear: [f32; 4],
        draw: impl FnOnce(vk::CommandBuffer) -> Result<(), FrameError>,
    ) -> Result<(), FrameError> {
        let f = &self.frames[image as usize];
        let s = &self.slots[slot as usize];
        let d = &self.device;

        let begin = vk::CommandBufferBeginInfo {
            flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            ..Default::default()
        };
        check("begin_command_buffer", unsafe {
            d.begin_command_buffer(f.cmd, &begin)
        })?;

        let clears = [vk::ClearValue {
            color: vk::ClearColorValue { float32: clear },
        }];
        let rp_begin = vk::RenderPassBeginInfo {
            render_pass: self.render_pass,
            framebuffer: f.framebuffer,
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.extent,
            },
            clear_value_count: clears.len() as u32,
            p_clear_values: clears.as_ptr(),
            ..Default::default()
        };
        unsafe { d.cmd_begin_render_pass(f.cmd, &rp_begin, vk::SubpassContents::INLINE) };
        draw(f.cmd)?;
        unsafe { d.cmd_end_render_pass(f.cmd) };
        check("end_command_buffer", unsafe { d.end_command_buffer(f.cmd) })?;

        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let submit = vk::SubmitInfo {
            wait_semaphore_count: 1,
            p_wait_semaphores: &s.image_acquired,
            p_wait_dst_stage_mask: wait_stages.as_ptr(),
            command_buffer_count: 1,
            p_command_buffers: &f.cmd,
            signal_semaphore_count: 1,
            p_signal_semaphores: &s.render_complete,
            ..Default::default()
        };
        check("queue_submit", unsafe {
            d.queue_submit(queue, std::slice::from_ref(&submit), f.fence)
        })
    }

    pub unsafe fn present(
        &self,
        queue: vk::Queue,
        slot: u32,
        image: u32,
    ) -> Result<Presented, FrameError> {
        let s = &self.slots[slot as usize];
        let present = vk::PresentInfoKHR {
            wait_semaphore_count: 1,
            p_wait_semaphores: &s.render_complete,
            swapchain_count: 1,
            p_swapchains: &self.swapchain,
            p_image_indices: &image,
            ..Default::default()
        };
        result::present_outcome(unsafe { self.swapchain_loader.queue_present(queue, &present) })
    }
}
