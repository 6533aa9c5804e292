// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
mod config;
mod ui;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, error, info};
use vke_core::{init_tracing, init_tracing_with};
use vke_platform::{
    center_and_show, classify_window_event, main_window_attributes, SurfaceSnapshot,
    WindowSignal, MINIMIZED_POLL,
};
use vke_render::{FrameCycle, FrameStatus, RenderSize};
use vke_render_vk::{VkBackend, VK_HEADER_VERSION};

use vke_platform::winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use crate::config::{AppCfg, PresentModeCfg};
use crate::ui::{Gui, PanelState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config file; missing file means defaults
    #[arg(long, default_value = config::DEFAULT_PATH)]
    config: PathBuf,
    /// Skip the Khronos validation layer even in debug builds
    #[arg(long)]
    no_validation: bool,
    /// Override render.present_mode
    #[arg(long, value_enum)]
    present_mode: Option<PresentModeCfg>,
    /// tracing filter directive, e.g. "debug" or "vke_render=trace"
    #[arg(long)]
    log: Option<String>,
}

/// GPU side of the window. The frame cycle owns the Vulkan backend, which
/// must go before the GUI context and the window.
struct Gfx {
    cycle: FrameCycle<VkBackend>,
    gui: Gui,
}

impl Gfx {
    fn frame(&mut self, window: &Window, size: RenderSize) -> Result<FrameStatus> {
        self.cycle.rebuild_if_needed(size)?;
        let Some(frame) = self.gui.frame(window)? else {
            return Ok(FrameStatus::Skipped);
        };
        Ok(self
            .cycle
            .draw_frame(frame.clear.premultiplied(), frame.draw)?)
    }
}

struct App {
    cfg: AppCfg,
    gfx: Option<Gfx>,
    window: Option<Window>,
    fatal: Option<anyhow::Error>,

    exiting: bool,
    paused: bool,
    frames: u32,
    last_fps_instant: Instant,
}

impl App {
    fn new(cfg: AppCfg) -> Self {
        App {
            cfg,
            gfx: None,
            window: None,
            fatal: None,
            exiting: false,
            paused: false,
            frames: 0,
            last_fps_instant: Instant::now(),
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let w = &self.cfg.window;
        let window = event_loop.create_window(main_window_attributes(&w.title, w.width, w.height))?;

        let mut gui = Gui::new(
            &window,
            PanelState::new(self.cfg.clear_color(), self.cfg.ui.demo_window),
        );
        let size = window.inner_size();
        let backend = VkBackend::new(
            &window,
            &window,
            RenderSize::new(size.width, size.height),
            &self.cfg.vk_options(),
            gui.context_mut(),
        )?;
        let cycle = FrameCycle::new(backend);

        center_and_show(event_loop, &window);
        window.request_redraw();

        self.gfx = Some(Gfx { cycle, gui });
        self.window = Some(window);
        Ok(())
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if self.exiting {
            return;
        }
        self.exiting = true;
        // device first, window last
        self.gfx = None;
        self.window = None;
        event_loop.exit();
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, e: anyhow::Error) {
        error!("fatal: {e:#}");
        self.fatal = Some(e);
        self.shutdown(event_loop);
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(window), Some(gfx)) = (&self.window, &mut self.gfx) else {
            return;
        };
        let snap = SurfaceSnapshot::of(window);
        let now_paused = !snap.is_drawable();
        if self.paused != now_paused {
            self.paused = now_paused;
            info!("{}x{} minimized={} → paused={}", snap.width, snap.height, snap.minimized, self.paused);
        }
        if self.paused {
            return;
        }

        match gfx.frame(window, RenderSize::new(snap.width, snap.height)) {
            Ok(FrameStatus::Presented) => self.frames = self.frames.saturating_add(1),
            Ok(status) => debug!("frame {status:?}"),
            Err(e) => self.fail(event_loop, e),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() && !self.exiting {
            if let Err(e) = self.init(event_loop) {
                self.fail(event_loop, e.context("startup"));
                return;
            }
        }
        event_loop.set_control_flow(ControlFlow::Poll);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(window) = &self.window else {
            return;
        };
        if window_id != window.id() {
            return;
        }
        if let Some(gfx) = &mut self.gfx {
            gfx.gui.handle_event(window, window_id, &event);
        }

        match classify_window_event(&event) {
            WindowSignal::Quit => {
                info!("quit requested");
                self.shutdown(event_loop);
            }
            WindowSignal::Resized { width, height } => {
                debug!("resized → {width}x{height}");
                window.request_redraw();
            }
            WindowSignal::Redraw => self.redraw(event_loop),
            WindowSignal::Ignored => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exiting {
            return;
        }

        if self.paused {
            // Nothing to draw into; check back shortly.
            event_loop.set_control_flow(ControlFlow::WaitUntil(Instant::now() + MINIMIZED_POLL));
            self.frames = 0;
        } else {
            event_loop.set_control_flow(ControlFlow::Poll);
        }
        if let Some(w) = &self.window {
            w.request_redraw();
        }

        let now = Instant::now();
        if now.duration_since(self.last_fps_instant).as_secs_f32() >= 1.0 {
            debug!("fps ~ {}", self.frames);
            self.frames = 0;
            self.last_fps_instant = now;
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // Event loop may end without a quit signal; keep the teardown order.
        self.gfx = None;
        self.window = None;
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    match &args.log {
        Some(directive) => init_tracing_with(directive),
        None => init_tracing(),
    }
    info!(
        "vke {} (Dear ImGui {}, Vulkan headers v{})",
        env!("CARGO_PKG_VERSION"),
        imgui::dear_imgui_version(),
        VK_HEADER_VERSION
    );

    let mut cfg = config::load_cfg(&args.config)?;
    if args.no_validation {
        cfg.render.validation = false;
    }
    if let Some(mode) = args.present_mode {
        cfg.render.present_mode = mode;
    }

    let event_loop: EventLoop<()> = EventLoop::new()?;
    let mut app = App::new(cfg);
    event_loop.run_app(&mut app)?;

    if let Some(e) = app.fatal.take() {
        return Err(e);
    }
    info!("clean shutdown");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_parse() {
        let args = Args::parse_from([
            "vke",
            "--config",
            "other.toml",
            "--no-validation",
            "--present-mode",
            "fifo-relaxed",
            "--log",
            "debug",
        ]);
        assert_eq!(args.config, PathBuf::from("other.toml"));
        assert!(args.no_validation);
        assert_eq!(args.present_mode, Some(PresentModeCfg::FifoRelaxed));
        assert_eq!(args.log.as_deref(), Some("debug"));
    }

    #[test]
    fn cli_defaults() {
        let args = Args::parse_from(["vke"]);
        assert_eq!(args.config, PathBuf::from("vke.toml"));
        assert!(!args.no_validation);
        assert!(args.present_mode.is_none());
    }
}
