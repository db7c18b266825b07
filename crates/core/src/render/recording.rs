use super::{Blend, Brush, Shape, Size, Surface};
use crate::Rgba;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Clear(Rgba),
    Blend(Blend),
    Draw {
        shape: Shape,
        brush: Brush,
        blend: Blend,
    },
}

/// Surface that remembers every call instead of rasterising.
#[derive(Debug)]
pub struct RecordingSurface {
    size: Size,
    blend: Blend,
    calls: Vec<Call>,
}

impl RecordingSurface {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            size: Size::new(width, height),
            blend: Blend::Normal,
            calls: Vec::new(),
        }
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.size = Size::new(width, height);
    }

    pub fn reset(&mut self) {
        self.calls.clear();
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn draws(&self) -> Vec<(Shape, Brush, Blend)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Draw {
                    shape,
                    brush,
                    blend,
                } => Some((shape.clone(), brush.clone(), *blend)),
                _ => None,
            })
            .collect()
    }
}

impl Surface for RecordingSurface {
    fn size(&self) -> Size {
        self.size
    }

    fn clear(&mut self, color: Rgba) {
        self.calls.push(Call::Clear(color));
    }

    fn set_blend(&mut self, blend: Blend) {
        self.blend = blend;
        self.calls.push(Call::Blend(blend));
    }

    fn draw(&mut self, shape: &Shape, brush: &Brush) {
        self.calls.push(Call::Draw {
            shape: shape.clone(),
            brush: brush.clone(),
            blend: self.blend,
        });
    }
}
