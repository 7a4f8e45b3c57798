//! Ink renderer.
//!
//! Rasterizes committed and in-progress strokes through the shared viewport
//! into a tiny-skia pixmap sized for the device pixel ratio. Rendering is a
//! pure function of the viewport, the stroke store, the logical size and the
//! ratio; it is cheap enough to be repeated after every change.

use std::path::Path;

use docanvas_core::{Error, Result};
use tiny_skia::{
    BlendMode, LineCap, LineJoin, Paint, PathBuilder, Pixmap, Stroke as SkStroke, Transform,
};

use crate::strokes::{Stroke, StrokeStore, Tool, ToolPresets};
use crate::viewport::ViewportTransform;

/// Raster target for freehand ink.
pub struct DrawingSurface {
    pixmap: Pixmap,
    logical_width: f64,
    logical_height: f64,
    device_pixel_ratio: f64,
    render_count: u64,
}

fn buffer_size(logical: f64, dpr: f64) -> u32 {
    let px = (logical * dpr).ceil();
    if px.is_finite() && px >= 1.0 {
        px.min(u32::MAX as f64) as u32
    } else {
        1
    }
}

fn allocate(width: u32, height: u32) -> Result<Pixmap> {
    Pixmap::new(width, height)
        .ok_or_else(|| Error::other(format!("Cannot allocate {}x{} surface", width, height)))
}

impl DrawingSurface {
    /// Creates a surface for a canvas of the given logical size.
    pub fn new(logical_width: f64, logical_height: f64, device_pixel_ratio: f64) -> Result<Self> {
        let dpr = sanitize_dpr(device_pixel_ratio);
        let pixmap = allocate(
            buffer_size(logical_width, dpr),
            buffer_size(logical_height, dpr),
        )?;
        Ok(Self {
            pixmap,
            logical_width,
            logical_height,
            device_pixel_ratio: dpr,
            render_count: 0,
        })
    }

    /// Reallocates the backing buffer. Contents are cleared until the next render.
    pub fn resize(
        &mut self,
        logical_width: f64,
        logical_height: f64,
        device_pixel_ratio: f64,
    ) -> Result<()> {
        let dpr = sanitize_dpr(device_pixel_ratio);
        let width = buffer_size(logical_width, dpr);
        let height = buffer_size(logical_height, dpr);
        if width != self.pixmap.width() || height != self.pixmap.height() {
            self.pixmap = allocate(width, height)?;
            tracing::debug!("Surface buffer resized to {}x{}", width, height);
        }
        self.logical_width = logical_width;
        self.logical_height = logical_height;
        self.device_pixel_ratio = dpr;
        Ok(())
    }

    pub fn logical_size(&self) -> (f64, f64) {
        (self.logical_width, self.logical_height)
    }

    pub fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
    }

    /// Backing buffer size in device pixels.
    pub fn buffer_size(&self) -> (u32, u32) {
        (self.pixmap.width(), self.pixmap.height())
    }

    /// How many times the surface has been rendered.
    pub fn render_count(&self) -> u64 {
        self.render_count
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// Demultiplied RGBA at a device pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.pixmap.pixel(x, y).map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
    }

    /// Clears and replays all strokes through the viewport.
    pub fn render(&mut self, viewport: &ViewportTransform, strokes: &StrokeStore) {
        self.pixmap.fill(tiny_skia::Color::TRANSPARENT);

        let dpr = self.device_pixel_ratio as f32;
        let zoom = viewport.zoom() as f32;
        let transform = Transform::from_scale(dpr, dpr)
            .pre_translate(viewport.pan_x() as f32, viewport.pan_y() as f32)
            .pre_scale(zoom, zoom);

        let presets = strokes.presets();
        for stroke in strokes.strokes() {
            draw_stroke(&mut self.pixmap, stroke, presets, transform);
        }
        if let Some(stroke) = strokes.in_progress() {
            draw_stroke(&mut self.pixmap, stroke, presets, transform);
        }

        self.render_count += 1;
    }

    /// Encodes the current buffer as PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        self.pixmap
            .encode_png()
            .map_err(|e| Error::other(format!("PNG encoding failed: {}", e)))
    }

    /// Writes the current buffer to a PNG file.
    pub fn save_png(&self, path: &Path) -> Result<()> {
        let bytes = self.encode_png()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

impl std::fmt::Debug for DrawingSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawingSurface")
            .field("buffer", &self.buffer_size())
            .field("device_pixel_ratio", &self.device_pixel_ratio)
            .field("render_count", &self.render_count)
            .finish()
    }
}

fn sanitize_dpr(dpr: f64) -> f64 {
    if dpr.is_finite() && dpr > 0.0 {
        dpr
    } else {
        1.0
    }
}

fn paint_for(stroke: &Stroke, presets: &ToolPresets) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.anti_alias = true;
    let c = stroke.color;
    match stroke.tool {
        Tool::Pen => {
            paint.set_color_rgba8(c.r, c.g, c.b, 255);
            paint.blend_mode = BlendMode::SourceOver;
        }
        Tool::Highlighter => {
            let alpha = (presets.highlighter_opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
            paint.set_color_rgba8(c.r, c.g, c.b, alpha);
            paint.blend_mode = BlendMode::Multiply;
        }
        Tool::Eraser => {
            paint.set_color_rgba8(0, 0, 0, 255);
            paint.blend_mode = BlendMode::DestinationOut;
        }
    }
    paint
}

fn draw_stroke(pixmap: &mut Pixmap, stroke: &Stroke, presets: &ToolPresets, transform: Transform) {
    let mut points = stroke.points.iter();
    let Some(first) = points.next() else {
        return;
    };

    let mut pb = PathBuilder::new();
    pb.move_to(first.x as f32, first.y as f32);
    for p in points {
        pb.line_to(p.x as f32, p.y as f32);
    }
    let Some(path) = pb.finish() else {
        return;
    };

    let sk_stroke = SkStroke {
        width: stroke.width as f32,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Default::default()
    };
    pixmap.stroke_path(&path, &paint_for(stroke, presets), &sk_stroke, transform, None);
}
