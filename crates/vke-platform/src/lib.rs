// SPDX-License-Identifier: CEPL-1.0
//! Window-system side of the app: winit re-export plus the few facts the
//! frame loop consumes (pixel size, minimized, quit requests).
pub use winit;

use tracing::info;
use winit::{
    dpi::{LogicalSize, PhysicalPosition},
    event::{ElementState, WindowEvent},
    event_loop::ActiveEventLoop,
    keyboard::{Key, NamedKey},
    window::{Window, WindowAttributes},
};

/// Interval used to poll a minimized window until it has area again.
pub const MINIMIZED_POLL: std::time::Duration = std::time::Duration::from_millis(10);

/// Attributes for the main window. The window starts hidden; call
/// [`center_and_show`] once the renderer is up.
pub fn main_window_attributes(title: &str, width: u32, height: u32) -> WindowAttributes {
    Window::default_attributes()
        .with_title(title)
        .with_inner_size(LogicalSize::new(width, height))
        .with_resizable(true)
        .with_visible(false)
}

pub fn center_and_show(event_loop: &ActiveEventLoop, window: &Window) {
    let monitor = window
        .current_monitor()
        .or_else(|| event_loop.primary_monitor());
    if let Some(monitor) = monitor {
        let area = monitor.size();
        let outer = window.outer_size();
        let origin = monitor.position();
        let x = origin.x + (area.width.saturating_sub(outer.width) / 2) as i32;
        let y = origin.y + (area.height.saturating_sub(outer.height) / 2) as i32;
        window.set_outer_position(PhysicalPosition::new(x, y));
    }
    window.set_visible(true);
    info!("window shown (scale factor {:.2})", window.scale_factor());
}

/// What the frame loop needs to know about the window this iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceSnapshot {
    pub width: u32,
    pub height: u32,
    pub minimized: bool,
}

impl SurfaceSnapshot {
    pub fn of(window: &Window) -> Self {
        let size = window.inner_size();
        Self {
            width: size.width,
            height: size.height,
            minimized: window.is_minimized().unwrap_or(false),
        }
    }

    /// False for minimized or zero-area windows; no frame may be issued then.
    pub fn is_drawable(&self) -> bool {
        !self.minimized && self.width > 0 && self.height > 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowSignal {
    Quit,
    Resized { width: u32, height: u32 },
    Redraw,
    Ignored,
}

/// Reduces a window event to what the frame loop reacts to. Close requests,
/// destruction and Escape all count as quit.
pub fn classify_window_event(event: &WindowEvent) -> WindowSignal {
    match event {
        WindowEvent::CloseRequested | WindowEvent::Destroyed => WindowSignal::Quit,
        WindowEvent::KeyboardInput { event, .. }
            if event.state == ElementState::Pressed
                && event.logical_key == Key::Named(NamedKey::Escape) =>
        {
            WindowSignal::Quit
        }
        WindowEvent::Resized(size) => WindowSignal::Resized {
            width: size.width,
            height: size.height,
        },
        WindowEvent::RedrawRequested => WindowSignal::Redraw,
        _ => WindowSignal::Ignored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalSize;

    #[test]
    fn close_and_destroy_quit() {
        assert_eq!(
            classify_window_event(&WindowEvent::CloseRequested),
            WindowSignal::Quit
        );
        assert_eq!(
            classify_window_event(&WindowEvent::Destroyed),
            WindowSignal::Quit
        );
    }

    #[test]
    fn resize_carries_pixel_size() {
        let ev = WindowEvent::Resized(PhysicalSize::new(800, 0));
        assert_eq!(
            classify_window_event(&ev),
            WindowSignal::Resized {
                width: 800,
                height: 0
            }
        );
    }

    #[test]
    fn focus_is_ignored() {
        assert_eq!(
            classify_window_event(&WindowEvent::Focused(false)),
            WindowSignal::Ignored
        );
    }

    #[test]
    fn zero_area_or_minimized_is_not_drawable() {
        let base = SurfaceSnapshot {
            width: 1280,
            height: 720,
            minimized: false,
        };
        assert!(base.is_drawable());
        assert!(!SurfaceSnapshot { width: 0, ..base }.is_drawable());
        assert!(!SurfaceSnapshot { height: 0, ..base }.is_drawable());
        assert!(!SurfaceSnapshot {
            minimized: true,
            ..base
        }
        .is_drawable());
    }
}
