use crate::analysis::BoundingBox;

pub const LABEL_HEIGHT: f32 = 20.0;
/// Total horizontal padding around the label text; half of it on each side.
pub const LABEL_PADDING: f32 = 12.0;
pub const LABEL_MARGIN: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelPlacement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// The label sits inside the top of the box instead of above it.
    pub inside: bool,
}

impl LabelPlacement {
    pub fn text_x(&self) -> f32 {
        self.x + LABEL_PADDING / 2.0
    }

    /// Baseline that centres a line of `font_size` text vertically.
    pub fn text_baseline(&self, font_size: f32) -> f32 {
        self.y + self.height / 2.0 + font_size * 0.35
    }
}

/// Places the label for `bbox`, whose text measures `text_width` pixels.
///
/// Labels go above the box. A box too close to the top edge gets its label
/// inside, and a label running past the right edge shifts left, never past
/// x = 0. Nothing is done for the bottom edge or for labels overlapping
/// each other.
pub fn resolve_label(bbox: &BoundingBox, text_width: f32, image_width: f32) -> LabelPlacement {
    let width = text_width.max(0.0) + LABEL_PADDING;
    let height = LABEL_HEIGHT;

    let mut x = bbox.x;
    let mut y = bbox.y - height - LABEL_MARGIN;
    let mut inside = false;

    if bbox.y < height + 2.0 * LABEL_MARGIN {
        y = bbox.y + LABEL_MARGIN;
        inside = true;
    }

    if x + width > image_width {
        x = (image_width - width - LABEL_MARGIN).max(0.0);
    }

    LabelPlacement {
        x,
        y,
        width,
        height,
        inside,
    }
}
