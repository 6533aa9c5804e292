// SPDX-License-Identifier: CEPL-1.0
//! Capability-driven choices made once per device or per swapchain.
use ash::vk;
use vke_render::{FrameError, RenderSize};

/// Formats tried in order for the swapchain, all with sRGB-nonlinear.
pub const REQUESTED_FORMATS: [vk::Format; 4] = [
    vk::Format::B8G8R8A8_UNORM,
    vk::Format::R8G8B8A8_UNORM,
    vk::Format::B8G8R8_UNORM,
    vk::Format::R8G8B8_UNORM,
];
pub const REQUESTED_COLOR_SPACE: vk::ColorSpaceKHR = vk::ColorSpaceKHR::SRGB_NONLINEAR;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PresentPreference {
    #[default]
    Fifo,
    FifoRelaxed,
    Mailbox,
    Immediate,
}

impl PresentPreference {
    pub fn to_vk(self) -> vk::PresentModeKHR {
        match self {
            PresentPreference::Fifo => vk::PresentModeKHR::FIFO,
            PresentPreference::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
            PresentPreference::Mailbox => vk::PresentModeKHR::MAILBOX,
            PresentPreference::Immediate => vk::PresentModeKHR::IMMEDIATE,
        }
    }
}

/// Prefers a discrete GPU, otherwise the first device listed.
pub fn pick_physical_device(kinds: &[vk::PhysicalDeviceType]) -> Option<usize> {
    kinds
        .iter()
        .position(|&k| k == vk::PhysicalDeviceType::DISCRETE_GPU)
        .or(if kinds.is_empty() { None } else { Some(0) })
}

/// First queue family able to run graphics work.
pub fn pick_queue_family(families: &[vk::QueueFamilyProperties]) -> Option<u32> {
    families
        .iter()
        .position(|f| f.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|i| i as u32)
}

pub fn select_surface_format(
    available: &[vk::SurfaceFormatKHR],
    requested: &[vk::Format],
    color_space: vk::ColorSpaceKHR,
) -> vk::SurfaceFormatKHR {
    let fallback = vk::SurfaceFormatKHR {
        format: requested.first().copied().unwrap_or(vk::Format::B8G8R8A8_UNORM),
        color_space,
    };

    // A lone UNDEFINED entry means the surface takes any format.
    if let [only] = available {
        return if only.format == vk::Format::UNDEFINED {
            fallback
        } else {
            *only
        };
    }

    requested
        .iter()
        .find_map(|&want| {
            available
                .iter()
                .copied()
                .find(|f| f.format == want && f.color_space == color_space)
        })
        .or_else(|| available.first().copied())
        .unwrap_or(fallback)
}

/// First requested mode the surface supports; FIFO is always available.
pub fn select_present_mode(
    available: &[vk::PresentModeKHR],
    requested: &[vk::PresentModeKHR],
) -> vk::PresentModeKHR {
    requested
        .iter()
        .copied()
        .find(|m| available.contains(m))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

pub fn image_count(min_wanted: u32, caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = min_wanted.max(caps.min_image_count);
    if caps.max_image_count != 0 {
        count.min(caps.max_image_count)
    } else {
        count
    }
}

/// A swapchain needs one image on screen and one to render into.
pub fn usable_image_count(images: usize) -> Result<u32, FrameError> {
    if images < 2 {
        return Err(FrameError::Swapchain(format!(
            "{images} image(s) returned, at least 2 required"
        )));
    }
    Ok(images as u32)
}

pub fn extent_from_caps(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: want
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: want
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

pub fn composite_alpha(supported: vk::CompositeAlphaFlagsKHR) -> vk::CompositeAlphaFlagsKHR {
    [
        vk::CompositeAlphaFlagsKHR::OPAQUE,
        vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::INHERIT,
    ]
    .into_iter()
    .find(|&a| supported.contains(a))
    .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE)
}

// Info only
pub fn present_mode_name(m: vk::PresentModeKHR) -> &'static str {
    match m {
        vk::PresentModeKHR::FIFO => "FIFO",
        vk::PresentModeKHR::MAILBOX => "MAILBOX",
        vk::PresentModeKHR::IMMEDIATE => "IMMEDIATE",
        vk::PresentModeKHR::FIFO_RELAXED => "FIFO_RELAXED",
        _ => "OTHER",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    fn caps(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        }
    }

    #[test]
    fn discrete_gpu_wins() {
        let kinds = [
            vk::PhysicalDeviceType::INTEGRATED_GPU,
            vk::PhysicalDeviceType::CPU,
            vk::PhysicalDeviceType::DISCRETE_GPU,
        ];
        assert_eq!(pick_physical_device(&kinds), Some(2));
    }

    #[test]
    fn first_device_without_discrete() {
        let kinds = [
            vk::PhysicalDeviceType::INTEGRATED_GPU,
            vk::PhysicalDeviceType::VIRTUAL_GPU,
        ];
        assert_eq!(pick_physical_device(&kinds), Some(0));
        assert_eq!(pick_physical_device(&[]), None);
    }

    #[test]
    fn graphics_queue_family_is_found() {
        let families = [
            vk::QueueFamilyProperties {
                queue_flags: vk::QueueFlags::TRANSFER,
                ..Default::default()
            },
            vk::QueueFamilyProperties {
                queue_flags: vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE,
                ..Default::default()
            },
        ];
        assert_eq!(pick_queue_family(&families), Some(1));
        assert_eq!(pick_queue_family(&families[..1]), None);
    }

    #[test]
    fn undefined_surface_format_takes_first_request() {
        let got = select_surface_format(
            &[fmt(vk::Format::UNDEFINED, REQUESTED_COLOR_SPACE)],
            &REQUESTED_FORMATS,
            REQUESTED_COLOR_SPACE,
        );
        assert_eq!(
            (got.format, got.color_space),
            (vk::Format::B8G8R8A8_UNORM, REQUESTED_COLOR_SPACE)
        );
    }

    #[test]
    fn request_order_beats_surface_order() {
        let available = [
            fmt(vk::Format::B8G8R8A8_SRGB, REQUESTED_COLOR_SPACE),
            fmt(vk::Format::R8G8B8A8_UNORM, REQUESTED_COLOR_SPACE),
            fmt(vk::Format::B8G8R8A8_UNORM, REQUESTED_COLOR_SPACE),
        ];
        let got = select_surface_format(&available, &REQUESTED_FORMATS, REQUESTED_COLOR_SPACE);
        assert_eq!(got.format, vk::Format::B8G8R8A8_UNORM);
    }

    #[test]
    fn color_space_must_match_or_first_is_used() {
        let available = [
            fmt(
                vk::Format::R16G16B16A16_SFLOAT,
                vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
            ),
            fmt(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::HDR10_ST2084_EXT),
        ];
        let got = select_surface_format(&available, &REQUESTED_FORMATS, REQUESTED_COLOR_SPACE);
        assert_eq!(
            (got.format, got.color_space),
            (available[0].format, available[0].color_space)
        );
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let available = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(
            select_present_mode(&available, &[vk::PresentModeKHR::MAILBOX]),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(
            select_present_mode(
                &available,
                &[vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO]
            ),
            vk::PresentModeKHR::IMMEDIATE
        );
    }

    #[test]
    fn image_count_respects_caps() {
        assert_eq!(image_count(2, &caps(3, 8)), 3);
        assert_eq!(image_count(4, &caps(2, 3)), 3);
        assert_eq!(image_count(2, &caps(1, 0)), 2);
    }

    #[test]
    fn single_image_swapchain_is_rejected() {
        assert!(matches!(usable_image_count(1), Err(FrameError::Swapchain(_))));
        assert!(matches!(usable_image_count(0), Err(FrameError::Swapchain(_))));
        assert_eq!(usable_image_count(3).unwrap(), 3);
    }

    #[test]
    fn extent_follows_surface_when_defined() {
        let mut c = caps(2, 0);
        assert_eq!(
            extent_from_caps(&c, RenderSize::new(8000, 600)),
            vk::Extent2D {
                width: 4096,
                height: 600
            }
        );
        c.current_extent = vk::Extent2D {
            width: 1280,
            height: 720,
        };
        assert_eq!(extent_from_caps(&c, RenderSize::new(1, 1)), c.current_extent);
    }

    #[test]
    fn opaque_alpha_preferred() {
        let supported = vk::CompositeAlphaFlagsKHR::INHERIT | vk::CompositeAlphaFlagsKHR::OPAQUE;
        assert_eq!(composite_alpha(supported), vk::CompositeAlphaFlagsKHR::OPAQUE);
        assert_eq!(
            composite_alpha(vk::CompositeAlphaFlagsKHR::INHERIT),
            vk::CompositeAlphaFlagsKHR::INHERIT
        );
    }
}
