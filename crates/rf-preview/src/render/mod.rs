//! Render backends and the draw list they consume
//!
//! The scene is flattened into a `DrawList` every frame; backends only know
//! how to clear, fill rectangles and blit textured quads. Coordinates are CSS
//! pixels, backends scale by the device pixel ratio.

pub mod software;

#[cfg(feature = "gpu")]
pub mod gpu;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Viewport;
use crate::error::PreviewResult;
use crate::texture::Texture;

pub use software::{SoftwareBackend, SoftwareFactory};

#[cfg(feature = "gpu")]
pub use gpu::{GpuBackend, GpuFactory};

/// Color in linear RGBA
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "gpu", derive(bytemuck::Pod, bytemuck::Zeroable))]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// From hex color (e.g., 0x4A9EFF)
    pub fn from_hex(hex: u32) -> Self {
        let r = ((hex >> 16) & 0xFF) as f32 / 255.0;
        let g = ((hex >> 8) & 0xFF) as f32 / 255.0;
        let b = (hex & 0xFF) as f32 / 255.0;
        Self { r, g, b, a: 1.0 }
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    pub const BLUE: Self = Self::new(0.290, 0.620, 1.0, 1.0); // #4A9EFF
    pub const GREEN: Self = Self::new(0.251, 1.0, 0.565, 1.0); // #40FF90
    pub const RED: Self = Self::new(1.0, 0.251, 0.376, 1.0); // #FF4060
}

/// Axis-aligned rectangle in CSS pixels
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Grow (or shrink, for negative `by`) on every side
    pub fn inflate(&self, by: f32) -> Self {
        Self::new(
            self.x - by,
            self.y - by,
            self.width + 2.0 * by,
            self.height + 2.0 * by,
        )
    }

    /// Scale about the centre
    pub fn scaled(&self, factor: f32) -> Self {
        let (cx, cy) = self.center();
        let w = self.width * factor;
        let h = self.height * factor;
        Self::new(cx - w / 2.0, cy - h / 2.0, w, h)
    }

    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        (x1 > x0 && y1 > y0).then(|| Rect::new(x0, y0, x1 - x0, y1 - y0))
    }
}

/// One draw operation
#[derive(Clone, Debug)]
pub enum DrawCommand {
    FillRect {
        rect: Rect,
        color: Color,
    },
    /// Rectangle outline drawn inside `rect`
    StrokeRect {
        rect: Rect,
        color: Color,
        thickness: f32,
    },
    /// Textured quad, optionally clipped
    Sprite {
        texture: Arc<Texture>,
        rect: Rect,
        alpha: f32,
        clip: Option<Rect>,
    },
}

/// Flattened scene for one frame, in paint order
#[derive(Clone, Debug, Default)]
pub struct DrawList {
    pub clear_color: Option<Color>,
    pub commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn new(clear_color: Color) -> Self {
        Self {
            clear_color: Some(clear_color),
            commands: Vec::new(),
        }
    }

    pub fn push(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    pub fn sprite_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Sprite { .. }))
            .count()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Backend type, ordered by capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BackendKind {
    Software,
    Gpu,
}

/// Drawable surface as seen by the host
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceInfo {
    pub kind: BackendKind,
    /// Physical pixels
    pub width: u32,
    pub height: u32,
    pub device_pixel_ratio: f32,
    /// Surface generation, bumped whenever the surface is recreated
    pub generation: u32,
}

/// A render backend bound to one surface
pub trait RenderBackend {
    fn kind(&self) -> BackendKind;

    /// Resize the backing store (physical pixels)
    fn resize(&mut self, width: u32, height: u32, device_pixel_ratio: f32) -> PreviewResult<()>;

    /// Draw one frame. `PreviewError::ContextLost` means the surface is gone.
    fn render(&mut self, list: &DrawList) -> PreviewResult<()>;

    fn surface(&self) -> SurfaceInfo;

    /// Copy of the last frame as tightly packed RGBA8
    fn read_pixels(&mut self) -> PreviewResult<Vec<u8>>;
}

/// Creates backends of one kind
pub trait BackendFactory {
    fn kind(&self) -> BackendKind;

    /// Create a backend with a fresh surface sized for `viewport`
    fn create(&self, viewport: &Viewport, generation: u32) -> PreviewResult<Box<dyn RenderBackend>>;
}

/// Factories in preference order for this build
pub fn default_factories() -> Vec<Box<dyn BackendFactory>> {
    let mut factories: Vec<Box<dyn BackendFactory>> = Vec::new();
    #[cfg(feature = "gpu")]
    factories.push(Box::new(GpuFactory::default()));
    factories.push(Box::new(SoftwareFactory));
    factories
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_from_hex() {
        let c = Color::from_hex(0x4A9EFF);
        assert_eq!(c.to_rgba8(), [0x4A, 0x9E, 0xFF, 0xFF]);
    }

    #[test]
    fn test_rect_intersect() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);
        assert_eq!(a.intersect(&b), Some(Rect::new(5.0, 5.0, 5.0, 5.0)));
        assert_eq!(a.intersect(&Rect::new(20.0, 0.0, 1.0, 1.0)), None);
    }

    #[test]
    fn test_rect_scaled_keeps_center() {
        let r = Rect::new(10.0, 10.0, 20.0, 20.0).scaled(1.5);
        assert_eq!(r.center(), (20.0, 20.0));
        assert_eq!(r.width, 30.0);
    }

    #[test]
    fn test_backend_capability_order() {
        assert!(BackendKind::Gpu > BackendKind::Software);
        let factories = default_factories();
        assert_eq!(factories.last().map(|f| f.kind()), Some(BackendKind::Software));
    }
}
