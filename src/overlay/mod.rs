mod geometry;
mod render;
mod surface;

pub use geometry::{LABEL_HEIGHT, LABEL_MARGIN, LABEL_PADDING, LabelPlacement, resolve_label};
pub use render::{OverlayMark, OverlayStyle, overlay_svg, plan_overlays, render};
pub use surface::RenderedSurface;
