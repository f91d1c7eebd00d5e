use egui::{pos2, vec2, Color32, Rect, Vec2};

use crate::config::{BAR_FILL_RATIO, GRADIENT_STOPS};

/// Vertical gradient, offset 0.0 at the bottom of the surface and 1.0 at the top
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Gradient {
    pub stops: &'static [(f32, Color32)],
}

impl Gradient {
    pub const BARS: Self = Self { stops: &GRADIENT_STOPS };
}

/// One frequency bucket laid out on the surface
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bar {
    /// Painted area, anchored at the bottom edge
    pub rect: Rect,
    /// `(value / 255) * surface height`
    pub height: f32,
    /// Full slot width including the gap
    pub slot_width: f32,
}

/// Lay out one bar per bucket across `size`, reusing `bars`.
///
/// Heights are linear in the byte value; there is no dB scaling.
pub fn layout_bars_into(data: &[u8], size: Vec2, bars: &mut Vec<Bar>) {
    bars.clear();
    if data.is_empty() {
        return;
    }
    let slot_width = size.x / data.len() as f32;
    bars.extend(data.iter().enumerate().map(|(i, &value)| {
        let height = f32::from(value) / 255.0 * size.y;
        let x = i as f32 * slot_width;
        Bar {
            rect: Rect::from_min_size(
                pos2(x, size.y - height),
                vec2(slot_width * BAR_FILL_RATIO, height),
            ),
            height,
            slot_width,
        }
    }));
}
