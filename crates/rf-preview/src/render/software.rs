//! CPU rasteriser into an RGBA8 framebuffer
//!
//! Always available, so it is the last entry in backend negotiation.

use crate::config::{MAX_SURFACE_DIM, Viewport};
use crate::error::{PreviewError, PreviewResult};
use crate::render::{
    BackendFactory, BackendKind, Color, DrawCommand, DrawList, Rect, RenderBackend, SurfaceInfo,
};

/// Software renderer
pub struct SoftwareBackend {
    width: u32,
    height: u32,
    device_pixel_ratio: f32,
    pixels: Vec<u8>,
    generation: u32,
}

impl SoftwareBackend {
    pub fn new(width: u32, height: u32, device_pixel_ratio: f32, generation: u32) -> PreviewResult<Self> {
        let mut backend = Self {
            width: 0,
            height: 0,
            device_pixel_ratio: 1.0,
            pixels: Vec::new(),
            generation,
        };
        backend.resize(width, height, device_pixel_ratio)?;
        Ok(backend)
    }

    /// Current framebuffer (RGBA8, row-major)
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Pixel at physical (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 4) as usize;
        Some([
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ])
    }

    fn to_physical(&self, rect: &Rect) -> Rect {
        let s = self.device_pixel_ratio;
        Rect::new(rect.x * s, rect.y * s, rect.width * s, rect.height * s)
    }

    /// Integer pixel span covered by `rect`, clipped to the surface
    fn span(&self, rect: &Rect) -> Option<(u32, u32, u32, u32)> {
        let x0 = rect.x.max(0.0).round() as u32;
        let y0 = rect.y.max(0.0).round() as u32;
        let x1 = (rect.right().round().max(0.0) as u32).min(self.width);
        let y1 = (rect.bottom().round().max(0.0) as u32).min(self.height);
        (x1 > x0 && y1 > y0).then_some((x0, y0, x1, y1))
    }

    #[inline]
    fn blend(&mut self, x: u32, y: u32, src: [u8; 4], alpha: f32) {
        let a = (src[3] as f32 / 255.0) * alpha;
        if a <= 0.0 {
            return;
        }
        let idx = ((y * self.width + x) * 4) as usize;
        let dst = &mut self.pixels[idx..idx + 4];
        for c in 0..3 {
            dst[c] = (src[c] as f32 * a + dst[c] as f32 * (1.0 - a)).round() as u8;
        }
        dst[3] = ((a + dst[3] as f32 / 255.0 * (1.0 - a)) * 255.0).round() as u8;
    }

    fn fill(&mut self, rect: &Rect, color: Color) {
        let Some((x0, y0, x1, y1)) = self.span(&self.to_physical(rect)) else {
            return;
        };
        let src = color.with_alpha(1.0).to_rgba8();
        for y in y0..y1 {
            for x in x0..x1 {
                self.blend(x, y, src, color.a);
            }
        }
    }

    fn stroke(&mut self, rect: &Rect, color: Color, thickness: f32) {
        let t = thickness.min(rect.width / 2.0).min(rect.height / 2.0).max(0.0);
        if t <= 0.0 {
            return;
        }
        let inner_h = rect.height - 2.0 * t;
        self.fill(&Rect::new(rect.x, rect.y, rect.width, t), color);
        self.fill(&Rect::new(rect.x, rect.bottom() - t, rect.width, t), color);
        self.fill(&Rect::new(rect.x, rect.y + t, t, inner_h), color);
        self.fill(&Rect::new(rect.right() - t, rect.y + t, t, inner_h), color);
    }

    fn blit(&mut self, texture: &crate::texture::Texture, rect: &Rect, alpha: f32, clip: Option<&Rect>) {
        if alpha <= 0.0 || rect.width <= 0.0 || rect.height <= 0.0 {
            return;
        }
        let dest = self.to_physical(rect);
        let visible = match clip {
            Some(clip) => match dest.intersect(&self.to_physical(clip)) {
                Some(r) => r,
                None => return,
            },
            None => dest,
        };
        let Some((x0, y0, x1, y1)) = self.span(&visible) else {
            return;
        };
        for y in y0..y1 {
            let v = (y as f32 + 0.5 - dest.y) / dest.height;
            for x in x0..x1 {
                let u = (x as f32 + 0.5 - dest.x) / dest.width;
                let texel = texture.sample(u, v);
                self.blend(x, y, texel, alpha);
            }
        }
    }
}

impl RenderBackend for SoftwareBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Software
    }

    fn resize(&mut self, width: u32, height: u32, device_pixel_ratio: f32) -> PreviewResult<()> {
        if width == 0 || height == 0 || width > MAX_SURFACE_DIM || height > MAX_SURFACE_DIM {
            return Err(PreviewError::Render(format!(
                "surface {}x{} out of range",
                width, height
            )));
        }
        self.width = width;
        self.height = height;
        self.device_pixel_ratio = device_pixel_ratio;
        self.pixels = vec![0u8; width as usize * height as usize * 4];
        Ok(())
    }

    fn render(&mut self, list: &DrawList) -> PreviewResult<()> {
        if let Some(clear) = list.clear_color {
            let rgba = clear.to_rgba8();
            for pixel in self.pixels.chunks_exact_mut(4) {
                pixel.copy_from_slice(&rgba);
            }
        }

        for command in &list.commands {
            match command {
                DrawCommand::FillRect { rect, color } => self.fill(rect, *color),
                DrawCommand::StrokeRect {
                    rect,
                    color,
                    thickness,
                } => self.stroke(rect, *color, *thickness),
                DrawCommand::Sprite {
                    texture,
                    rect,
                    alpha,
                    clip,
                } => self.blit(texture, rect, *alpha, clip.as_ref()),
            }
        }
        Ok(())
    }

    fn surface(&self) -> SurfaceInfo {
        SurfaceInfo {
            kind: BackendKind::Software,
            width: self.width,
            height: self.height,
            device_pixel_ratio: self.device_pixel_ratio,
            generation: self.generation,
        }
    }

    fn read_pixels(&mut self) -> PreviewResult<Vec<u8>> {
        Ok(self.pixels.clone())
    }
}

/// Creates `SoftwareBackend`s
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareFactory;

impl BackendFactory for SoftwareFactory {
    fn kind(&self) -> BackendKind {
        BackendKind::Software
    }

    fn create(&self, viewport: &Viewport, generation: u32) -> PreviewResult<Box<dyn RenderBackend>> {
        let (width, height) = viewport.physical_size();
        let backend = SoftwareBackend::new(width, height, viewport.effective_pixel_ratio(), generation)?;
        Ok(Box::new(backend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::{Texture, TextureOrigin};
    use std::sync::Arc;

    #[test]
    fn test_clear_and_fill() {
        let mut backend = SoftwareBackend::new(10, 10, 1.0, 0).unwrap();
        let mut list = DrawList::new(Color::BLACK);
        list.push(DrawCommand::FillRect {
            rect: Rect::new(2.0, 2.0, 4.0, 4.0),
            color: Color::WHITE,
        });
        backend.render(&list).unwrap();

        assert_eq!(backend.pixel(0, 0), Some([0, 0, 0, 255]));
        assert_eq!(backend.pixel(3, 3), Some([255, 255, 255, 255]));
        assert_eq!(backend.pixel(6, 6), Some([0, 0, 0, 255]));
    }

    #[test]
    fn test_sprite_scales_with_dpr() {
        let mut backend = SoftwareBackend::new(20, 20, 2.0, 0).unwrap();
        let tex = Arc::new(Texture::solid(1, 1, Color::RED, TextureOrigin::Loaded));
        let mut list = DrawList::new(Color::BLACK);
        list.push(DrawCommand::Sprite {
            texture: tex,
            rect: Rect::new(5.0, 5.0, 2.0, 2.0),
            alpha: 1.0,
            clip: None,
        });
        backend.render(&list).unwrap();

        assert_eq!(backend.pixel(11, 11), Some(Color::RED.to_rgba8()));
        assert_eq!(backend.pixel(9, 9), Some([0, 0, 0, 255]));
    }

    #[test]
    fn test_sprite_clip_and_alpha() {
        let mut backend = SoftwareBackend::new(10, 10, 1.0, 0).unwrap();
        let tex = Arc::new(Texture::solid(1, 1, Color::WHITE, TextureOrigin::Loaded));
        let mut list = DrawList::new(Color::BLACK);
        list.push(DrawCommand::Sprite {
            texture: tex,
            rect: Rect::new(0.0, 0.0, 10.0, 10.0),
            alpha: 0.5,
            clip: Some(Rect::new(0.0, 0.0, 5.0, 10.0)),
        });
        backend.render(&list).unwrap();

        let inside = backend.pixel(2, 2).unwrap();
        assert!((inside[0] as i32 - 128).abs() <= 1);
        assert_eq!(backend.pixel(7, 2), Some([0, 0, 0, 255]));
    }

    #[test]
    fn test_rejects_zero_surface() {
        assert!(SoftwareBackend::new(0, 10, 1.0, 0).is_err());
        assert!(SoftwareBackend::new(MAX_SURFACE_DIM + 1, 10, 1.0, 0).is_err());
    }

    #[test]
    fn test_factory_caps_pixel_ratio_for_large_viewports() {
        let viewport = Viewport::new(2500.0, 100.0, 8.0);
        let backend = SoftwareFactory.create(&viewport, 0).unwrap();
        let surface = backend.surface();
        assert!(surface.width <= MAX_SURFACE_DIM);
        assert_eq!(surface.height, 656);
        assert!(surface.device_pixel_ratio < 8.0);
        assert!(surface.device_pixel_ratio > 6.5);
    }
}
