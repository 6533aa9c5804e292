// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{info, warn};
use vke_render::ClearColor;
use vke_render_vk::{PresentPreference, VkOptions};

pub const DEFAULT_PATH: &str = "vke.toml";

#[derive(Debug, Deserialize, Default, Clone)]
pub struct AppCfg {
    #[serde(default)]
    pub window: WindowCfg,
    #[serde(default)]
    pub render: RenderCfg,
    #[serde(default)]
    pub ui: UiCfg,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WindowCfg {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct RenderCfg {
    #[serde(default = "default_clear")]
    pub clear_color: [f32; 4],
    #[serde(default = "default_min_image_count")]
    pub min_image_count: u32,
    #[serde(default)]
    pub present_mode: PresentModeCfg,
    #[serde(default = "default_validation")]
    pub validation: bool,
    /// 0 waits forever.
    #[serde(default)]
    pub wait_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct UiCfg {
    #[serde(default = "default_demo_window")]
    pub demo_window: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PresentModeCfg {
    #[default]
    Fifo,
    FifoRelaxed,
    Mailbox,
    Immediate,
}

impl From<PresentModeCfg> for PresentPreference {
    fn from(m: PresentModeCfg) -> Self {
        match m {
            PresentModeCfg::Fifo => PresentPreference::Fifo,
            PresentModeCfg::FifoRelaxed => PresentPreference::FifoRelaxed,
            PresentModeCfg::Mailbox => PresentPreference::Mailbox,
            PresentModeCfg::Immediate => PresentPreference::Immediate,
        }
    }
}

impl Default for WindowCfg {
    fn default() -> Self {
        WindowCfg {
            title: default_title(),
            width: default_width(),
            height: default_height(),
        }
    }
}

impl Default for RenderCfg {
    fn default() -> Self {
        RenderCfg {
            clear_color: default_clear(),
            min_image_count: default_min_image_count(),
            present_mode: PresentModeCfg::Fifo,
            validation: default_validation(),
            wait_timeout_ms: 0,
        }
    }
}

impl Default for UiCfg {
    fn default() -> Self {
        UiCfg {
            demo_window: default_demo_window(),
        }
    }
}

fn default_title() -> String {
    "VulkanEngine 2.0".to_owned()
}
fn default_width() -> u32 {
    1280
}
fn default_height() -> u32 {
    720
}
fn default_clear() -> [f32; 4] {
    ClearColor::DEFAULT.0.to_array()
}
fn default_min_image_count() -> u32 {
    2
}
fn default_validation() -> bool {
    cfg!(debug_assertions)
}
fn default_demo_window() -> bool {
    true
}

impl AppCfg {
    pub fn parse(text: &str) -> Result<Self> {
        let cfg: AppCfg = toml::from_str(text).context("malformed config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.render.min_image_count < 2 {
            bail!(
                "render.min_image_count must be at least 2 (got {})",
                self.render.min_image_count
            );
        }
        if self.window.width == 0 || self.window.height == 0 {
            bail!(
                "window size must be non-zero (got {}x{})",
                self.window.width,
                self.window.height
            );
        }
        Ok(())
    }

    pub fn clear_color(&self) -> ClearColor {
        ClearColor::from(self.render.clear_color)
    }

    pub fn wait_timeout(&self) -> Option<Duration> {
        match self.render.wait_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn vk_options(&self) -> VkOptions {
        VkOptions {
            app_name: self.window.title.clone(),
            validation: self.render.validation,
            min_image_count: self.render.min_image_count,
            present_mode: self.render.present_mode.into(),
            wait_timeout: self.wait_timeout(),
        }
    }
}

/// Missing or unreadable file means defaults; a file that exists but does not
/// parse is an error.
pub fn load_cfg(path: &Path) -> Result<AppCfg> {
    match fs::read_to_string(path) {
        Ok(s) => {
            let cfg = AppCfg::parse(&s).with_context(|| format!("config {}", path.display()))?;
            info!("config loaded from {}", path.display());
            Ok(cfg)
        }
        Err(e) => {
            warn!("config {} not read ({e}); using defaults", path.display());
            Ok(AppCfg::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = AppCfg::parse("").unwrap();
        assert_eq!(cfg.window.title, "VulkanEngine 2.0");
        assert_eq!((cfg.window.width, cfg.window.height), (1280, 720));
        assert_eq!(cfg.render.clear_color, [0.45, 0.55, 0.60, 1.0]);
        assert_eq!(cfg.render.min_image_count, 2);
        assert_eq!(cfg.render.present_mode, PresentModeCfg::Fifo);
        assert_eq!(cfg.wait_timeout(), None);
        assert!(cfg.ui.demo_window);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = AppCfg::parse(
            r#"
            [render]
            present_mode = "mailbox"
            wait_timeout_ms = 500

            [ui]
            demo_window = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.render.present_mode, PresentModeCfg::Mailbox);
        assert_eq!(cfg.wait_timeout(), Some(Duration::from_millis(500)));
        assert_eq!(cfg.render.min_image_count, 2);
        assert_eq!(cfg.window.width, 1280);
        assert!(!cfg.ui.demo_window);
    }

    #[test]
    fn fifo_relaxed_is_snake_case() {
        let cfg = AppCfg::parse("[render]\npresent_mode = \"fifo_relaxed\"\n").unwrap();
        assert_eq!(
            PresentPreference::from(cfg.render.present_mode),
            PresentPreference::FifoRelaxed
        );
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(AppCfg::parse("[render\nclear_color = 3").is_err());
        assert!(AppCfg::parse("[render]\npresent_mode = \"vsync\"\n").is_err());
    }

    #[test]
    fn too_few_images_rejected() {
        let err = AppCfg::parse("[render]\nmin_image_count = 1\n").unwrap_err();
        assert!(err.to_string().contains("min_image_count"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = load_cfg(Path::new("definitely/not/here/vke.toml")).unwrap();
        assert_eq!(cfg.window.height, 720);
    }

    #[test]
    fn vk_options_follow_config() {
        let cfg = AppCfg::parse("[render]\nvalidation = false\nmin_image_count = 3\n").unwrap();
        let opts = cfg.vk_options();
        assert!(!opts.validation);
        assert_eq!(opts.min_image_count, 3);
        assert_eq!(opts.app_name, "VulkanEngine 2.0");
    }
}
