// SPDX-License-Identifier: CEPL-1.0
use std::time::Instant;

use anyhow::{Context, Result};
use imgui::{DrawData, FontConfig, FontSource, Ui};
use imgui_winit_support::{HiDpiMode, WinitPlatform};
use vke_platform::winit::{
    event::{Event, WindowEvent},
    window::{Window, WindowId},
};
use vke_render::ClearColor;

const BASE_FONT_PX: f32 = 13.0;

/// Mutable state edited through the panels.
#[derive(Clone, Debug, PartialEq)]
pub struct PanelState {
    pub clear_color: ClearColor,
    pub show_demo: bool,
    pub show_another: bool,
    pub slider: f32,
    pub counter: i32,
}

impl PanelState {
    pub fn new(clear_color: ClearColor, show_demo: bool) -> Self {
        Self {
            clear_color,
            show_demo,
            show_another: false,
            slider: 0.0,
            counter: 0,
        }
    }
}

pub fn build_panels(ui: &Ui, state: &mut PanelState) {
    let framerate = ui.io().framerate;
    let mut rgb = state.clear_color.rgb();

    ui.window("Hello, Window!").build(|| {
        ui.color_edit3("clear color", &mut rgb);
        ui.checkbox("Demo Window", &mut state.show_demo);
        if framerate > 0.0 {
            ui.text(format!(
                "Application average {:.3} ms/frame ({:.1} FPS)",
                1000.0 / framerate,
                framerate
            ));
        }
    });
    state.clear_color = state.clear_color.with_rgb(rgb);

    if state.show_demo {
        ui.show_demo_window(&mut state.show_demo);
    }

    ui.window("Hello, world!").build(|| {
        ui.text("This is some useful text.");
        ui.checkbox("Another Window", &mut state.show_another);
        ui.slider("float", 0.0, 1.0, &mut state.slider);
        if ui.button("Button") {
            state.counter += 1;
        }
        ui.same_line();
        ui.text(format!("counter = {}", state.counter));
    });

    if state.show_another {
        let mut open = true;
        let mut close = false;
        ui.window("Another Window").opened(&mut open).build(|| {
            ui.text("Hello from another window!");
            close = ui.button("Close Me");
        });
        state.show_another = open && !close;
    }
}

/// One finished GUI frame: what to draw and what to clear to.
pub struct GuiFrame<'a> {
    pub draw: &'a DrawData,
    pub clear: ClearColor,
}

/// Dear ImGui context plus its winit glue.
pub struct Gui {
    imgui: imgui::Context,
    platform: WinitPlatform,
    pub state: PanelState,
    last_frame: Instant,
}

impl Gui {
    pub fn new(window: &Window, state: PanelState) -> Self {
        let mut imgui = imgui::Context::create();
        imgui.set_ini_filename(None);

        let mut platform = WinitPlatform::new(&mut imgui);
        platform.attach_window(imgui.io_mut(), window, HiDpiMode::Default);

        let scale = window.scale_factor() as f32;
        imgui.fonts().add_font(&[FontSource::DefaultFontData {
            config: Some(FontConfig {
                size_pixels: BASE_FONT_PX * scale,
                ..FontConfig::default()
            }),
        }]);
        imgui.io_mut().font_global_scale = 1.0 / scale;
        imgui.style_mut().scale_all_sizes(scale);

        Self {
            imgui,
            platform,
            state,
            last_frame: Instant::now(),
        }
    }

    /// Needed by the renderer to upload the font atlas.
    pub fn context_mut(&mut self) -> &mut imgui::Context {
        &mut self.imgui
    }

    pub fn handle_event(&mut self, window: &Window, window_id: WindowId, event: &WindowEvent) {
        let event: Event<()> = Event::WindowEvent {
            window_id,
            event: event.clone(),
        };
        self.platform
            .handle_event(self.imgui.io_mut(), window, &event);
    }

    /// Builds this frame's panels. `None` when the display has no area and
    /// nothing should be rendered.
    pub fn frame(&mut self, window: &Window) -> Result<Option<GuiFrame<'_>>> {
        let now = Instant::now();
        self.imgui.io_mut().update_delta_time(now - self.last_frame);
        self.last_frame = now;

        self.platform
            .prepare_frame(self.imgui.io_mut(), window)
            .context("imgui prepare_frame")?;
        let [w, h] = self.imgui.io().display_size;
        if w <= 0.0 || h <= 0.0 {
            return Ok(None);
        }

        let ui = self.imgui.new_frame();
        build_panels(ui, &mut self.state);
        self.platform.prepare_render(ui, window);
        Ok(Some(GuiFrame {
            clear: self.state.clear_color,
            draw: self.imgui.render(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn panels_produce_draw_lists_without_touching_state() {
        let mut imgui = imgui::Context::create();
        imgui.set_ini_filename(None);
        imgui.io_mut().display_size = [1280.0, 720.0];
        imgui.fonts().build_rgba32_texture();

        let mut state = PanelState::new(ClearColor::DEFAULT, false);
        for _ in 0..2 {
            imgui.io_mut().update_delta_time(Duration::from_millis(16));
            let ui = imgui.new_frame();
            build_panels(ui, &mut state);
            let draw = imgui.render();
            assert!(draw.draw_lists_count() > 0);
        }
        assert_eq!(state, PanelState::new(ClearColor::DEFAULT, false));
    }
}
