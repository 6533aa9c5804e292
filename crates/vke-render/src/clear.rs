// SPDX-License-Identifier: CEPL-1.0
use glam::{Vec3, Vec4};

/// Straight-alpha RGBA clear color.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClearColor(pub Vec4);

impl ClearColor {
    pub const DEFAULT: Self = Self(Vec4::new(0.45, 0.55, 0.60, 1.0));

    pub fn rgb(&self) -> [f32; 3] {
        self.0.truncate().to_array()
    }

    pub fn with_rgb(self, rgb: [f32; 3]) -> Self {
        Self(Vec3::from_array(rgb).extend(self.0.w))
    }

    /// Value written into the render pass clear: color scaled by alpha.
    pub fn premultiplied(&self) -> [f32; 4] {
        let c = self.0;
        (c.truncate() * c.w).extend(c.w).to_array()
    }
}

impl Default for ClearColor {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<[f32; 4]> for ClearColor {
    fn from(rgba: [f32; 4]) -> Self {
        Self(Vec4::from_array(rgba))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn premultiplies_by_alpha() {
        let c = ClearColor::from([0.5, 1.0, 0.25, 0.5]);
        assert_eq!(c.premultiplied(), [0.25, 0.5, 0.125, 0.5]);
    }

    #[test]
    fn opaque_is_unchanged() {
        assert_eq!(ClearColor::DEFAULT.premultiplied(), [0.45, 0.55, 0.60, 1.0]);
    }

    #[test]
    fn editing_rgb_keeps_alpha() {
        let c = ClearColor::from([0.0, 0.0, 0.0, 0.75]).with_rgb([1.0, 0.5, 0.0]);
        assert_eq!(c.0.to_array(), [1.0, 0.5, 0.0, 0.75]);
        assert_eq!(c.rgb(), [1.0, 0.5, 0.0]);
    }
}
