use tiny_skia::{
    BlendMode, Color, FillRule, GradientStop, LineCap, LineJoin, LinearGradient, Path,
    PathBuilder, Pixmap, RadialGradient, Rect, Shader, SpreadMode, Stroke, Transform,
};

use super::{Affine, Blend, Brush, Paint, Point, Shape, Size, Surface};
use crate::{Result, Rgba, VibeError};

/// Halo layers drawn under a glowing primitive: stroke width as a share of
/// the blur radius, and opacity of that layer.
const GLOW_LAYERS: [(f32, f32); 3] = [(1.0, 0.08), (0.6, 0.12), (0.3, 0.18)];

// Circle approximation constant for cubic Béziers.
const KAPPA: f32 = 0.552_284_8;

/// CPU raster surface backed by a `tiny_skia::Pixmap`.
///
/// Pixel data is premultiplied RGBA. Every frame starts with an opaque clear,
/// so presented pixels are opaque and can be copied straight into an RGBA8
/// frame buffer.
pub struct PixmapSurface {
    pixmap: Pixmap,
    blend: BlendMode,
}

impl std::fmt::Debug for PixmapSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixmapSurface")
            .field("width", &self.pixmap.width())
            .field("height", &self.pixmap.height())
            .finish()
    }
}

impl PixmapSurface {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        Ok(Self {
            pixmap: allocate(width, height)?,
            blend: BlendMode::SourceOver,
        })
    }

    /// Reallocates the backing pixmap. Contents are discarded.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == self.width() && height == self.height() {
            return Ok(());
        }
        self.pixmap = allocate(width, height)?;
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn data(&self) -> &[u8] {
        self.pixmap.data()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        let pixel = self.pixmap.pixel(x, y)?.demultiply();
        Some(Rgba {
            r: pixel.red(),
            g: pixel.green(),
            b: pixel.blue(),
            a: pixel.alpha(),
        })
    }

    fn fill(&mut self, path: &Path, shader: Shader<'_>, transform: Transform) {
        let paint = self.paint(shader);
        self.pixmap
            .fill_path(path, &paint, FillRule::Winding, transform, None);
    }

    fn stroke(&mut self, path: &Path, shader: Shader<'_>, width: f32, transform: Transform) {
        let paint = self.paint(shader);
        let stroke = Stroke {
            width: width.max(0.1),
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Stroke::default()
        };
        self.pixmap
            .stroke_path(path, &paint, &stroke, transform, None);
    }

    fn paint<'a>(&self, shader: Shader<'a>) -> tiny_skia::Paint<'a> {
        tiny_skia::Paint {
            shader,
            blend_mode: self.blend,
            anti_alias: true,
            ..tiny_skia::Paint::default()
        }
    }

    fn draw_glow(&mut self, path: &Path, brush: &Brush, transform: Transform) {
        let Some(glow) = brush.glow else {
            return;
        };
        if glow.blur <= 0.0 {
            return;
        }
        let base = brush.stroke.unwrap_or(0.0);
        for (share, opacity) in GLOW_LAYERS {
            let color = color(glow.color.with_opacity(opacity * brush.alpha));
            self.stroke(
                path,
                Shader::SolidColor(color),
                base + glow.blur * share * 2.0,
                transform,
            );
        }
    }
}

impl Surface for PixmapSurface {
    fn size(&self) -> Size {
        Size::new(self.width() as f32, self.height() as f32)
    }

    fn clear(&mut self, rgba: Rgba) {
        self.pixmap.fill(color(rgba));
    }

    fn set_blend(&mut self, blend: Blend) {
        self.blend = match blend {
            Blend::Normal => BlendMode::SourceOver,
            Blend::Screen => BlendMode::Screen,
        };
    }

    fn draw(&mut self, shape: &Shape, brush: &Brush) {
        let Some((path, transform)) = build_path(shape) else {
            return;
        };
        // Polylines are never filled.
        let stroke = match (shape, brush.stroke) {
            (Shape::Polyline(_), None) => Some(1.0),
            (_, width) => width,
        };

        self.draw_glow(&path, brush, transform);
        let shader = shader(&brush.paint, brush.alpha);
        match stroke {
            Some(width) => self.stroke(&path, shader, width, transform),
            None => self.fill(&path, shader, transform),
        }
    }
}

fn allocate(width: u32, height: u32) -> Result<Pixmap> {
    Pixmap::new(width.max(1), height.max(1)).ok_or_else(|| {
        VibeError::InvalidConfig(format!("cannot allocate a {width}x{height} surface"))
    })
}

fn color(rgba: Rgba) -> Color {
    Color::from_rgba8(rgba.r, rgba.g, rgba.b, rgba.a)
}

fn point(p: Point) -> tiny_skia::Point {
    tiny_skia::Point::from_xy(p.x, p.y)
}

fn transform(affine: Affine) -> Transform {
    Transform::from_row(
        affine.sx, affine.ky, affine.kx, affine.sy, affine.tx, affine.ty,
    )
}

fn shader(paint: &Paint, alpha: f32) -> Shader<'static> {
    let stops = |stops: &[(f32, Rgba)]| -> Vec<GradientStop> {
        stops
            .iter()
            .map(|&(offset, rgba)| GradientStop::new(offset, color(rgba.with_opacity(alpha))))
            .collect()
    };
    // Gradients collapse to a solid colour when tiny-skia rejects them
    // (degenerate line, zero radius or a single stop).
    let fallback = |stops: &[(f32, Rgba)]| {
        let first = stops.first().map(|&(_, c)| c).unwrap_or(Rgba::TRANSPARENT);
        Shader::SolidColor(color(first.with_opacity(alpha)))
    };

    match paint {
        Paint::Solid(rgba) => Shader::SolidColor(color(rgba.with_opacity(alpha))),
        Paint::Linear {
            start,
            end,
            stops: list,
        } => LinearGradient::new(
            point(*start),
            point(*end),
            stops(list),
            SpreadMode::Pad,
            Transform::identity(),
        )
        .unwrap_or_else(|| fallback(list)),
        Paint::Radial {
            center,
            radius,
            stops: list,
        } => RadialGradient::new(
            point(*center),
            point(*center),
            *radius,
            stops(list),
            SpreadMode::Pad,
            Transform::identity(),
        )
        .unwrap_or_else(|| fallback(list)),
    }
}

fn build_path(shape: &Shape) -> Option<(Path, Transform)> {
    match shape {
        Shape::Circle { center, radius } => {
            if radius.is_nan() || *radius <= 0.0 {
                return None;
            }
            let path = PathBuilder::from_circle(center.x, center.y, *radius)?;
            Some((path, Transform::identity()))
        }
        Shape::Rect {
            origin,
            width,
            height,
        } => {
            let rect = Rect::from_xywh(origin.x, origin.y, *width, *height)?;
            Some((PathBuilder::from_rect(rect), Transform::identity()))
        }
        Shape::RoundRect {
            origin,
            width,
            height,
            radius,
            transform: placement,
        } => {
            let path = round_rect(*origin, *width, *height, *radius)?;
            Some((path, transform(*placement)))
        }
        Shape::Ellipse {
            center,
            radius_x,
            radius_y,
            rotation,
        } => {
            let rect = Rect::from_xywh(
                center.x - radius_x,
                center.y - radius_y,
                radius_x * 2.0,
                radius_y * 2.0,
            )?;
            let path = PathBuilder::from_oval(rect)?;
            let spin = Transform::from_rotate_at(rotation.to_degrees(), center.x, center.y);
            Some((path, spin))
        }
        Shape::Polyline(points) => {
            let (first, rest) = points.split_first()?;
            let mut builder = PathBuilder::new();
            builder.move_to(first.x, first.y);
            for p in rest {
                builder.line_to(p.x, p.y);
            }
            Some((builder.finish()?, Transform::identity()))
        }
    }
}

fn round_rect(origin: Point, width: f32, height: f32, radius: f32) -> Option<Path> {
    if width.is_nan() || height.is_nan() || width <= 0.0 || height <= 0.0 {
        return None;
    }
    let r = radius.clamp(0.0, width.min(height) / 2.0);
    let (left, top) = (origin.x, origin.y);
    let (right, bottom) = (left + width, top + height);
    let k = r * KAPPA;

    let mut pb = PathBuilder::new();
    pb.move_to(left + r, top);
    pb.line_to(right - r, top);
    pb.cubic_to(right - r + k, top, right, top + r - k, right, top + r);
    pb.line_to(right, bottom - r);
    pb.cubic_to(right, bottom - r + k, right - r + k, bottom, right - r, bottom);
    pb.line_to(left + r, bottom);
    pb.cubic_to(left + r - k, bottom, left, bottom - r + k, left, bottom - r);
    pb.line_to(left, top + r);
    pb.cubic_to(left, top + r - k, left + r - k, top, left + r, top);
    pb.close();
    pb.finish()
}
